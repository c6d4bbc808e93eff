//! Archetype display names.

use std::sync::OnceLock;

use regex::Regex;

fn set_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[a-z]\d+[a-z]?$").expect("set code pattern"))
}

/// Whether a slug segment looks like a set code (`a2`, `A3b`).
pub fn is_set_code(part: &str) -> bool {
    set_code_regex().is_match(part)
}

/// Normalize a set code to `A3b` form.
pub fn format_set_code(code: &str) -> String {
    title_case(code)
}

/// Turn an archetype slug into a display name.
///
/// `garchomp-ex-a2a-rampardos-a2` becomes `Garchomp Ex (A2a) Rampardos (A2)`.
pub fn format_archetype_name(slug: &str) -> String {
    let parts: Vec<&str> = slug.split('-').filter(|p| !p.is_empty()).collect();
    let mut words: Vec<String> = Vec::new();

    for part in parts {
        if is_set_code(part) {
            let code = format_set_code(part);
            match words.last_mut() {
                Some(last) if !last.ends_with(')') => last.push_str(&format!(" ({})", code)),
                _ => words.push(format!("({})", code)),
            }
        } else {
            words.push(title_case(part));
        }
    }

    words.join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
