use crate::models::same_name;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, PartialEq)]
pub struct ParsedEntry {
    pub name: String,
    pub tags: Vec<String>,
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)#([^\s#,]+)").unwrap())
}

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Quick-add: `Ship release #urgent #ops` names the record and lists tags.
pub fn parse_entry_input(input: &str) -> ParsedEntry {
    let mut tags: Vec<String> = Vec::new();

    // Tags
    for caps in tag_re().captures_iter(input) {
        if let Some(tag_match) = caps.get(1) {
            let tag = tag_match.as_str().to_string();
            if !tags.iter().any(|t| same_name(t, &tag)) {
                tags.push(tag);
            }
        }
    }

    let name = tag_re().replace_all(input, " ");

    let name = space_re().replace_all(&name, " ").trim().to_string();

    ParsedEntry { name, tags }
}
