use std::collections::HashSet;

use regex::Regex;

/// Recognized `%`-tokens in a title template. Anything else after a `%` is
/// kept as literal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    P1,
    P2,
    C1,
    C2,
    Event,
    Round,
    /// "vs." separator in any of its spellings. Not captured.
    Versus,
    /// Win/loss marker next to a player. Not captured.
    Side,
    /// Optional game-title tag ("RoA2", "Rivals II", ...). Not captured.
    GameTitle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// Longest token first so %ROA wins over %R and %SIDE is never split.
const TOKENS: &[(&str, Placeholder)] = &[
    ("%SIDE", Placeholder::Side),
    ("%ROA", Placeholder::GameTitle),
    ("%P1", Placeholder::P1),
    ("%P2", Placeholder::P2),
    ("%C1", Placeholder::C1),
    ("%C2", Placeholder::C2),
    ("%E", Placeholder::Event),
    ("%R", Placeholder::Round),
    ("%V", Placeholder::Versus),
];

// Capture classes deliberately exclude the characters that delimit the next
// field: player tags stop at parens, character listings keep their commas and
// slashes for the extractor to split.
const PLAYER_CLASS: &str = r"[\w\s*$|&;:~!?#.@+-]+";
const CHARACTER_CLASS: &str = r"[\w\s*/,]+";
const EVENT_CLASS: &str = r"[\w\s*#()~&;:.-]+";
const ROUND_CLASS: &str = r"[\w\s*()#&;-]+";

const VERSUS: &str = r"(?:vs\.|Vs\.|VS\.|vs|Vs|VS)";
const SIDE: &str = r"(?:\s*[WL]\s*)";
const GAME_TITLE: &str = "(?:Rivals of Aether II|Rivals of Aether 2\
|RIVALS OF AETHER II|RIVALS OF AETHER 2|Rivals 2 Tournament|Rivals II Bracket\
|Rivals 2 Bracket|Rivals II|Rivals 2|RIVALS II|RIVALS 2\
|RoA 2|ROA 2|RoAII|ROAII|RoA2|ROA2)?";

/// A regex that can never match, used if an expanded template somehow fails
/// to compile. Keeps `compile` total.
const NEVER_MATCH: &str = r"[^\s\S]";

/// A compiled title template: the parsed segments and the anchored regex they
/// expand to. Immutable; compile once per ingestion run and reuse.
#[derive(Debug, Clone)]
pub struct TitlePattern {
    segments: Vec<Segment>,
    regex: Regex,
}

impl TitlePattern {
    pub fn captures<'t>(&self, title: &'t str) -> Option<regex::Captures<'t>> {
        self.regex.captures(title)
    }

    pub fn has(&self, placeholder: Placeholder) -> bool {
        self.segments.contains(&Segment::Placeholder(placeholder))
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Compile a template like "%P1 (%C1) %V %P2 (%C2)" into a matcher. Never
/// fails: unknown tokens become literals, and a template whose expansion is
/// somehow invalid compiles to a pattern that matches nothing.
pub fn compile(template: &str) -> TitlePattern {
    let segments = scan(template);

    let mut pattern = String::from("^");
    let mut named = HashSet::new();
    for segment in &segments {
        match segment {
            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
            Segment::Placeholder(ph) => pattern.push_str(&expand(*ph, &mut named)),
        }
    }
    pattern.push('$');

    let regex = Regex::new(&pattern).unwrap_or_else(|_| Regex::new(NEVER_MATCH).unwrap());
    TitlePattern { segments, regex }
}

/// Split a template into literal and placeholder segments.
pub fn scan(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    'outer: while !rest.is_empty() {
        if rest.starts_with('%') {
            for &(token, placeholder) in TOKENS {
                if rest.starts_with(token) {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(placeholder));
                    rest = &rest[token.len()..];
                    continue 'outer;
                }
            }
        }
        let ch = rest.chars().next().unwrap();
        literal.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

fn expand(placeholder: Placeholder, named: &mut HashSet<&'static str>) -> String {
    let (name, body) = match placeholder {
        Placeholder::P1 => (Some("p1"), PLAYER_CLASS),
        Placeholder::P2 => (Some("p2"), PLAYER_CLASS),
        Placeholder::C1 => (Some("c1"), CHARACTER_CLASS),
        Placeholder::C2 => (Some("c2"), CHARACTER_CLASS),
        Placeholder::Event => (Some("event"), EVENT_CLASS),
        Placeholder::Round => (Some("round"), ROUND_CLASS),
        Placeholder::Versus => (None, VERSUS),
        Placeholder::Side => (None, SIDE),
        Placeholder::GameTitle => (None, GAME_TITLE),
    };
    match name {
        // A repeated placeholder would produce a duplicate group name, which
        // the regex engine rejects; only the first occurrence is captured.
        Some(n) if named.insert(n) => format!("(?P<{}>{})", n, body),
        _ => body.to_string(),
    }
}
