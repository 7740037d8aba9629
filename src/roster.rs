use std::collections::HashMap;

/// The playable cast with their stable catalog ids.
const CHARACTERS: &[(&str, i64)] = &[
    ("clairen", 1),
    ("ranno", 2),
    ("zetterburn", 3),
    ("forsburn", 4),
    ("orcane", 5),
    ("fleet", 6),
    ("kragg", 7),
    ("wrastor", 8),
    ("loxodont", 9),
    ("maypul", 10),
    ("etalus", 11),
    ("olympia", 12),
    ("absa", 13),
];

/// Nicknames and misspellings that show up in video titles.
const ALIASES: &[(&str, &str)] = &[
    ("clarien", "clairen"),
    ("eta", "etalus"),
    ("zetter", "zetterburn"),
    ("zettersburn", "zetterburn"),
    ("fors", "forsburn"),
    ("oly", "olympia"),
    ("maple", "maypul"),
    ("mapul", "maypul"),
];

/// The fixed character roster plus its alias table. Built once at startup and
/// passed by reference to whatever needs to resolve a character name.
#[derive(Debug, Clone)]
pub struct Roster {
    ids: HashMap<&'static str, i64>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Roster {
    pub fn rivals2() -> Self {
        Self {
            ids: CHARACTERS.iter().copied().collect(),
            aliases: ALIASES.iter().copied().collect(),
        }
    }

    /// Resolve a raw character string to its id. Trims, lowercases, and maps
    /// known aliases to canonical names before the lookup. Unknown names
    /// return None; that is a data-quality signal, not an error.
    pub fn resolve(&self, name: &str) -> Option<i64> {
        let name = name.trim().to_lowercase();
        let canonical = self.aliases.get(name.as_str()).copied().unwrap_or(&name);
        self.ids.get(canonical).copied()
    }

    /// Canonical (name, id) pairs for seeding the character table.
    pub fn characters(&self) -> &'static [(&'static str, i64)] {
        CHARACTERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_resolve() {
        let roster = Roster::rivals2();
        assert_eq!(roster.resolve("zetterburn"), Some(3));
        assert_eq!(roster.resolve("absa"), Some(13));
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let roster = Roster::rivals2();
        let id = roster.resolve("zetterburn");
        assert_eq!(roster.resolve(" Zetter "), id);
        assert_eq!(roster.resolve("ZETTER"), id);
        assert_eq!(roster.resolve("Zetterburn"), id);
    }

    #[test]
    fn aliases_map_to_canonical() {
        let roster = Roster::rivals2();
        assert_eq!(roster.resolve("oly"), roster.resolve("olympia"));
        assert_eq!(roster.resolve("eta"), roster.resolve("etalus"));
        assert_eq!(roster.resolve("maple"), roster.resolve("maypul"));
        assert_eq!(roster.resolve("mapul"), roster.resolve("maypul"));
        assert_eq!(roster.resolve("fors"), roster.resolve("forsburn"));
        assert_eq!(roster.resolve("clarien"), roster.resolve("clairen"));
        assert_eq!(roster.resolve("zettersburn"), roster.resolve("zetterburn"));
    }

    #[test]
    fn every_alias_targets_a_roster_entry() {
        let roster = Roster::rivals2();
        for (alias, canonical) in ALIASES {
            assert!(
                roster.resolve(canonical).is_some(),
                "alias {} points at unknown character {}",
                alias,
                canonical
            );
        }
    }

    #[test]
    fn unknown_character_is_none() {
        let roster = Roster::rivals2();
        assert_eq!(roster.resolve("shovel knight"), None);
        assert_eq!(roster.resolve(""), None);
    }
}
