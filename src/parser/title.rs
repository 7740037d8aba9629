use super::template::TitlePattern;

/// Structured fields pulled out of one video title. Character names are the
/// normalized strings, not yet resolved against the roster; a template
/// without %C1/%C2 leaves them None and the caller supplies them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTitle {
    pub p1: String,
    pub p2: String,
    pub c1: Option<String>,
    pub c2: Option<String>,
    pub event: String,
    pub round: String,
}

/// Match a title against a compiled template. Returns None when the title
/// does not fit; with uncurated human-written titles that is the common case,
/// and callers log and skip.
pub fn extract(title: &str, pattern: &TitlePattern, default_event: &str) -> Option<ParsedTitle> {
    let caps = pattern.captures(title.trim())?;

    let p1 = caps.name("p1")?.as_str().to_string();
    let p2 = caps.name("p2")?.as_str().to_string();
    let c1 = caps.name("c1").map(|m| normalize_character(m.as_str()));
    let c2 = caps.name("c2").map(|m| normalize_character(m.as_str()));
    let event = caps
        .name("event")
        .map(|m| m.as_str().trim().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| default_event.to_string());
    let round = caps
        .name("round")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Some(ParsedTitle {
        p1,
        p2,
        c1,
        c2,
        event,
        round,
    })
}

/// Normalize a raw character capture: lowercase, keep only the first entry of
/// a multi-character listing ("Zetterburn, Orcane" or "Zetterburn/Orcane"),
/// and drop a leading side prefix ("p1 " / "p2 ").
pub fn normalize_character(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let first = lowered
        .split(',')
        .next()
        .unwrap_or("")
        .split('/')
        .next()
        .unwrap_or("")
        .trim();
    first
        .strip_prefix("p1 ")
        .or_else(|| first.strip_prefix("p2 "))
        .unwrap_or(first)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::template::compile;

    #[test]
    fn basic_template_extracts_all_fields() {
        let pattern = compile("%P1 (%C1) %V %P2 (%C2)");
        let parsed = extract("Alex (Zetterburn) vs. Bob (Olympia)", &pattern, "Unknown").unwrap();
        assert_eq!(parsed.p1, "Alex");
        assert_eq!(parsed.c1.as_deref(), Some("zetterburn"));
        assert_eq!(parsed.p2, "Bob");
        assert_eq!(parsed.c2.as_deref(), Some("olympia"));
        assert_eq!(parsed.event, "Unknown");
        assert_eq!(parsed.round, "");
    }

    #[test]
    fn title_is_trimmed_before_matching() {
        let pattern = compile("%P1 %V %P2");
        let parsed = extract("  Alex vs Bob  ", &pattern, "Unknown").unwrap();
        assert_eq!(parsed.p1, "Alex");
        assert_eq!(parsed.p2, "Bob");
    }

    #[test]
    fn non_matching_title_is_none() {
        let pattern = compile("%P1 (%C1) %V %P2 (%C2)");
        assert!(extract("Patch 2.1.3 Overview", &pattern, "Unknown").is_none());
    }

    #[test]
    fn event_and_round_captures() {
        let pattern = compile("%E: %P1 (%C1) %V %P2 (%C2) - %R");
        let parsed = extract(
            "Genesis X: Alex (Kragg) vs Bob (Fleet) - Grand Finals",
            &pattern,
            "Unknown",
        )
        .unwrap();
        assert_eq!(parsed.event, "Genesis X");
        assert_eq!(parsed.round, "Grand Finals");
    }

    #[test]
    fn missing_event_uses_default() {
        let pattern = compile("%P1 %V %P2");
        let parsed = extract("Alex vs Bob", &pattern, "Weekly #12").unwrap();
        assert_eq!(parsed.event, "Weekly #12");
    }

    #[test]
    fn template_without_characters_leaves_them_none() {
        let pattern = compile("%P1 %V %P2");
        let parsed = extract("Alex vs Bob", &pattern, "Unknown").unwrap();
        assert_eq!(parsed.c1, None);
        assert_eq!(parsed.c2, None);
    }

    #[test]
    fn comma_listing_keeps_first_character() {
        assert_eq!(
            normalize_character("P1 Zetterburn, P2 Orcane"),
            "zetterburn"
        );
    }

    #[test]
    fn slash_listing_keeps_first_character() {
        assert_eq!(normalize_character("Zetterburn/Orcane"), "zetterburn");
    }

    #[test]
    fn side_prefix_is_stripped() {
        assert_eq!(normalize_character("p2 Olympia"), "olympia");
        assert_eq!(normalize_character("Olympia"), "olympia");
    }

    #[test]
    fn multi_character_title_end_to_end() {
        let pattern = compile("%P1 (%C1) %V %P2 (%C2)");
        let parsed = extract(
            "Alex (Zetterburn, Orcane) vs Bob (Fleet/Kragg)",
            &pattern,
            "Unknown",
        )
        .unwrap();
        assert_eq!(parsed.c1.as_deref(), Some("zetterburn"));
        assert_eq!(parsed.c2.as_deref(), Some("fleet"));
    }
}
