//! Option matching against configured aliases
//!
//! Matches a listing's equipment list (and, as a fallback, its description
//! text) against the configured required and nice-to-have options. Bundles
//! expand into their contents before matching, so a package name counts as
//! every option it includes.

use crate::config::{OptionEntry, OptionsConfig};
use std::collections::HashSet;

/// Outcome of matching one listing against the options config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub matched_required: Vec<String>,
    pub matched_nice_to_have: Vec<String>,
    pub missing_required: Vec<String>,
    pub has_dealbreaker: bool,
    pub dealbreaker_found: Option<String>,
}

/// Matches listing options against config aliases
///
/// # Arguments
///
/// * `raw_options` - Equipment strings as extracted from the listing
/// * `config` - Required/nice-to-have/dealbreaker configuration
/// * `description` - Optional free text searched for option names and codes
pub fn match_options(
    raw_options: &[String],
    config: &OptionsConfig,
    description: Option<&str>,
) -> MatchResult {
    let expanded = expand_bundles(raw_options, config);
    let normalized_options: HashSet<String> =
        expanded.iter().map(|opt| normalize_text(opt)).collect();

    let mut matched_required = Vec::new();
    let mut missing_required = Vec::new();
    for entry in &config.required {
        if entry_matches(entry, &normalized_options, description) {
            matched_required.push(entry.name.clone());
        } else {
            missing_required.push(entry.name.clone());
        }
    }

    let mut matched_nice_to_have = Vec::new();
    for entry in &config.nice_to_have {
        if entry_matches(entry, &normalized_options, description) {
            matched_nice_to_have.push(entry.name.clone());
        }
    }

    let dealbreaker_found = config.dealbreakers.iter().find(|phrase| {
        normalized_options.contains(&normalize_text(phrase))
            || description
                .map(|d| d.to_lowercase().contains(&phrase.to_lowercase()))
                .unwrap_or(false)
    });

    MatchResult {
        matched_required,
        matched_nice_to_have,
        missing_required,
        has_dealbreaker: dealbreaker_found.is_some(),
        dealbreaker_found: dealbreaker_found.cloned(),
    }
}

/// Expands bundle options into their contents
///
/// A raw option naming a configured bundle (by name or alias) contributes
/// both itself and every option the bundle includes.
fn expand_bundles(raw_options: &[String], config: &OptionsConfig) -> Vec<String> {
    let bundles: Vec<&OptionEntry> = config
        .required
        .iter()
        .chain(config.nice_to_have.iter())
        .filter(|entry| entry.is_bundle)
        .collect();

    let mut expanded: Vec<String> = raw_options.to_vec();
    for raw in raw_options {
        let normalized = normalize_text(raw);
        for bundle in &bundles {
            let is_this_bundle = normalize_text(&bundle.name) == normalized
                || bundle
                    .aliases
                    .iter()
                    .any(|alias| normalize_text(alias) == normalized);
            if is_this_bundle {
                expanded.extend(bundle.bundle_contents.iter().cloned());
            }
        }
    }
    expanded
}

fn entry_matches(
    entry: &OptionEntry,
    normalized_options: &HashSet<String>,
    description: Option<&str>,
) -> bool {
    let names = std::iter::once(&entry.name).chain(entry.aliases.iter());

    for name in names.clone() {
        if normalized_options.contains(&normalize_text(name)) {
            return true;
        }
    }

    if let Some(desc) = description {
        let desc_lower = desc.to_lowercase();
        for name in names {
            if is_short_code(name) {
                // Short manufacturer codes ("337", "7A2") need word
                // boundaries to avoid matching inside longer tokens
                if contains_word(desc, name) {
                    return true;
                }
            } else if desc_lower.contains(&name.to_lowercase()) {
                return true;
            }
        }
    }

    false
}

/// Lowercases, strips punctuation, and collapses whitespace
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                normalized.push(lower);
            }
            last_was_space = false;
        } else if !last_was_space {
            normalized.push(' ');
            last_was_space = true;
        }
    }
    normalized.trim_end().to_string()
}

fn is_short_code(name: &str) -> bool {
    name.len() <= 4 && !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Case-insensitive substring search with word boundaries on both sides
fn contains_word(haystack: &str, needle: &str) -> bool {
    let hay = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return false;
    }

    let bytes = hay.as_bytes();
    let mut start = 0;
    while let Some(pos) = hay[start..].find(&needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let boundary_before = begin == 0 || !bytes[begin - 1].is_ascii_alphanumeric();
        let boundary_after = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if boundary_before && boundary_after {
            return true;
        }
        // Needle is ASCII-only, so begin + 1 stays on a char boundary
        start = begin + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, aliases: &[&str]) -> OptionEntry {
        OptionEntry {
            name: name.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            is_bundle: false,
            bundle_contents: vec![],
        }
    }

    fn bundle(name: &str, aliases: &[&str], contents: &[&str]) -> OptionEntry {
        OptionEntry {
            name: name.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            is_bundle: true,
            bundle_contents: contents.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn config(
        required: Vec<OptionEntry>,
        nice_to_have: Vec<OptionEntry>,
        dealbreakers: Vec<&str>,
    ) -> OptionsConfig {
        OptionsConfig {
            required,
            nice_to_have,
            dealbreakers: dealbreakers.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Head-Up Display"), "head up display");
        assert_eq!(normalize_text("  LASER  Licht "), "laser licht");
        assert_eq!(normalize_text("M-Sportpaket!"), "m sportpaket");
    }

    #[test]
    fn test_direct_option_match() {
        let cfg = config(vec![entry("Head-Up Display", &["HUD"])], vec![], vec![]);
        let options = vec!["head up display".to_string()];

        let result = match_options(&options, &cfg, None);

        assert_eq!(result.matched_required, vec!["Head-Up Display"]);
        assert!(result.missing_required.is_empty());
    }

    #[test]
    fn test_alias_match() {
        let cfg = config(vec![entry("Head-Up Display", &["HUD"])], vec![], vec![]);
        let options = vec!["HUD".to_string()];

        let result = match_options(&options, &cfg, None);

        assert_eq!(result.matched_required, vec!["Head-Up Display"]);
    }

    #[test]
    fn test_missing_required_reported() {
        let cfg = config(
            vec![entry("Head-Up Display", &[]), entry("Harman Kardon", &[])],
            vec![],
            vec![],
        );
        let options = vec!["Harman Kardon".to_string()];

        let result = match_options(&options, &cfg, None);

        assert_eq!(result.matched_required, vec!["Harman Kardon"]);
        assert_eq!(result.missing_required, vec!["Head-Up Display"]);
    }

    #[test]
    fn test_description_long_phrase_match() {
        let cfg = config(vec![entry("Laserlicht", &[])], vec![], vec![]);

        let result = match_options(&[], &cfg, Some("Ausstattung inkl. Laserlicht und mehr"));

        assert_eq!(result.matched_required, vec!["Laserlicht"]);
    }

    #[test]
    fn test_description_code_needs_word_boundary() {
        let cfg = config(vec![entry("Driving Assistant", &["5AS"])], vec![], vec![]);

        let hit = match_options(&[], &cfg, Some("Pakete: 5AS, 337"));
        assert_eq!(hit.matched_required, vec!["Driving Assistant"]);

        let miss = match_options(&[], &cfg, Some("Sondermodell X5AS9"));
        assert!(miss.matched_required.is_empty());
    }

    #[test]
    fn test_bundle_expansion() {
        let cfg = config(
            vec![entry("Heated Seats", &[])],
            vec![bundle("Winter Package", &["Winterpaket"], &["Heated Seats"])],
            vec![],
        );
        let options = vec!["Winterpaket".to_string()];

        let result = match_options(&options, &cfg, None);

        // The bundle itself matches as nice-to-have, its contents satisfy
        // the required entry
        assert_eq!(result.matched_required, vec!["Heated Seats"]);
        assert_eq!(result.matched_nice_to_have, vec!["Winter Package"]);
    }

    #[test]
    fn test_dealbreaker_in_options() {
        let cfg = config(vec![], vec![], vec!["Unfallwagen"]);
        let options = vec!["unfallwagen".to_string()];

        let result = match_options(&options, &cfg, None);

        assert!(result.has_dealbreaker);
        assert_eq!(result.dealbreaker_found, Some("Unfallwagen".to_string()));
    }

    #[test]
    fn test_dealbreaker_in_description() {
        let cfg = config(vec![], vec![], vec!["Unfallwagen"]);

        let result = match_options(&[], &cfg, Some("Leider ein Unfallwagen mit Historie"));

        assert!(result.has_dealbreaker);
    }

    #[test]
    fn test_no_dealbreaker() {
        let cfg = config(vec![], vec![], vec!["Unfallwagen"]);

        let result = match_options(&["Leder".to_string()], &cfg, Some("Top Zustand"));

        assert!(!result.has_dealbreaker);
        assert!(result.dealbreaker_found.is_none());
    }

    #[test]
    fn test_contains_word() {
        assert!(contains_word("codes 337 and 5AS", "337"));
        assert!(contains_word("(337)", "337"));
        assert!(!contains_word("13370", "337"));
        assert!(!contains_word("x337", "337"));
        assert!(contains_word("5as", "5AS"));
    }
}
