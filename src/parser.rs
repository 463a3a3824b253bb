//! Free-text order parsing
//!
//! Turns `"2 burgers with no onion and extra sauce, bruschetta"` into one
//! [`ParsedLineItem`] per comma-separated segment. Parsing is total: any input,
//! however malformed, produces a best-effort list and never an error.

use serde::{Deserialize, Serialize};

/// One line of the order, as it will be added to the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLineItem {
    /// The segment as the caller wrote it
    pub raw_text: String,
    /// Menu name to search for on the site
    pub canonical_name: String,
    /// Always at least 1
    pub quantity: u32,
    pub modifications: Vec<String>,
}

/// Substring rule mapping free text onto a menu name. Every needle must occur.
struct MenuRule {
    all_of: &'static [&'static str],
    name: &'static str,
}

/// Checked in order; first match wins
const MENU_VOCABULARY: &[MenuRule] = &[
    MenuRule { all_of: &["bruschetta"], name: "Bruschetta" },
    MenuRule { all_of: &["wing", "2lb"], name: "Wings (2lb)" },
    MenuRule { all_of: &["wing", "2 lb"], name: "Wings (2lb)" },
    MenuRule { all_of: &["wing"], name: "Wings (1lb)" },
    MenuRule { all_of: &["quesadilla"], name: "Quesadilla" },
    MenuRule { all_of: &["burger"], name: "Angus Burger" },
    MenuRule { all_of: &["caesar"], name: "Caesar Salad" },
    MenuRule { all_of: &["garlic bread"], name: "Garlic Bread" },
];

const WITH_DELIMITER: &str = " with ";
const AND_DELIMITER: &str = " and ";

/// Parse the free-text item list, one item per non-blank comma-separated
/// segment. Empty segments such as the middle of `"burger, , wings"` name no
/// item and are skipped, so that input yields two items.
pub fn parse_items(input: &str) -> Vec<ParsedLineItem> {
    input
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(parse_segment)
        .collect()
}

/// Map a free-text name onto the menu vocabulary, or return it unchanged
pub fn canonicalize(name: &str) -> String {
    let lower = name.to_lowercase();
    MENU_VOCABULARY
        .iter()
        .find(|rule| rule.all_of.iter().all(|needle| lower.contains(needle)))
        .map(|rule| rule.name.to_string())
        .unwrap_or_else(|| name.trim().to_string())
}

fn parse_segment(segment: &str) -> ParsedLineItem {
    let (quantity, rest) = split_quantity(segment);

    let (name, modifications) = match find_ignore_ascii_case(rest, WITH_DELIMITER) {
        Some(idx) => (
            &rest[..idx],
            split_modifications(&rest[idx + WITH_DELIMITER.len()..]),
        ),
        None => (rest, Vec::new()),
    };

    ParsedLineItem {
        raw_text: segment.to_string(),
        canonical_name: canonicalize(name.trim()),
        quantity,
        modifications,
    }
}

/// Leading integer followed by whitespace is the quantity
fn split_quantity(segment: &str) -> (u32, &str) {
    let digits_end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());

    if digits_end == 0 {
        return (1, segment);
    }
    match segment[digits_end..].chars().next() {
        Some(c) if c.is_whitespace() => {
            let quantity = segment[..digits_end]
                .parse::<u32>()
                .unwrap_or(u32::MAX)
                .max(1);
            (quantity, segment[digits_end..].trim_start())
        }
        _ => (1, segment),
    }
}

/// Split a segment's `with ...` tail on " and ". Commas never reach here:
/// they already separate items.
fn split_modifications(text: &str) -> Vec<String> {
    let mut mods = Vec::new();
    let mut rest = text;
    while let Some(idx) = find_ignore_ascii_case(rest, AND_DELIMITER) {
        mods.push(rest[..idx].trim().to_string());
        rest = &rest[idx + AND_DELIMITER.len()..];
    }
    mods.push(rest.trim().to_string());
    mods.retain(|m| !m.is_empty());
    mods
}

/// Byte offset of `needle` in `haystack`, ignoring ASCII case.
/// ASCII lowercasing keeps byte offsets aligned with the original.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_plain_item() {
        let items = parse_items("bruschetta");
        assert_eq!(
            items,
            vec![ParsedLineItem {
                raw_text: "bruschetta".into(),
                canonical_name: "Bruschetta".into(),
                quantity: 1,
                modifications: vec![],
            }]
        );
    }

    #[test]
    fn quantity_and_modifications() {
        let items = parse_items("2 burgers with no onion and extra sauce");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].canonical_name, "Angus Burger");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].modifications, vec!["no onion", "extra sauce"]);
    }

    #[test]
    fn one_item_per_segment_in_order() {
        let items = parse_items("garlic bread, 3 quesadilla ,caesar salad with no croutons");
        let names: Vec<_> = items.iter().map(|i| i.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["Garlic Bread", "Quesadilla", "Caesar Salad"]);
        assert_eq!(items[1].quantity, 3);
        assert_eq!(items[2].modifications, vec!["no croutons"]);
        assert!(items[0].modifications.is_empty());
    }

    #[test]
    fn blank_segments_name_no_item() {
        let items = parse_items("burger, , wings,");
        let names: Vec<_> = items.iter().map(|i| i.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["Angus Burger", "Wings (1lb)"]);
    }

    #[test]
    fn modifications_split_on_every_and() {
        let items = parse_items("burger with no onion AND extra sauce and  and pickles");
        assert_eq!(items[0].modifications, vec!["no onion", "extra sauce", "pickles"]);
    }

    #[test]
    fn wing_sizes() {
        assert_eq!(canonicalize("2lb wings"), "Wings (2lb)");
        assert_eq!(canonicalize("wings 2 lb"), "Wings (2lb)");
        assert_eq!(canonicalize("hot wings"), "Wings (1lb)");
    }

    #[test]
    fn unknown_names_pass_through() {
        let items = parse_items("2 lobster rolls");
        assert_eq!(items[0].canonical_name, "lobster rolls");
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn canonicalization_is_stable() {
        for rule in MENU_VOCABULARY {
            assert_eq!(canonicalize(rule.name), rule.name);
        }
    }

    #[test]
    fn digits_without_whitespace_are_not_quantity() {
        let items = parse_items("2lb wings");
        assert_eq!(items[0].quantity, 1);
        assert_eq!(items[0].canonical_name, "Wings (2lb)");
    }

    #[test]
    fn zero_quantity_becomes_one() {
        assert_eq!(parse_items("0 burger")[0].quantity, 1);
    }

    #[test]
    fn with_is_case_insensitive() {
        let items = parse_items("Burger WITH cheese AND bacon");
        assert_eq!(items[0].canonical_name, "Angus Burger");
        assert_eq!(items[0].modifications, vec!["cheese", "bacon"]);
    }

    #[test]
    fn malformed_input_never_panics() {
        assert!(parse_items("").is_empty());
        assert!(parse_items(" , ,, ").is_empty());

        let items = parse_items("with with, 7 ,  and");
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.quantity >= 1));
    }

    #[test]
    fn non_ascii_text_survives() {
        let items = parse_items("1 crème brûlée with extra crème");
        assert_eq!(items[0].canonical_name, "crème brûlée");
        assert_eq!(items[0].modifications, vec!["extra crème"]);
    }
}
