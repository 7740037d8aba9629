pub mod template;
pub mod title;

pub use template::{compile, Placeholder, TitlePattern};
pub use title::{extract, ParsedTitle};
