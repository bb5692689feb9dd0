//! Card-identity normalization.
//!
//! Pure string heuristics for matching one card across catalogs that
//! disagree on naming, numbering and set labels. Every function here is
//! stateless and idempotent.

use lazy_static::lazy_static;
use regex::Regex;

/// Rarity and variant suffix tokens stripped from raw titles. Longer
/// tokens must come before their substrings so alternation matches them
/// first.
const RARITY_TOKENS: &[&str] = &[
    "reverse holofoil",
    "reverse holo",
    "secret rare",
    "rainbow rare",
    "amazing rare",
    "ultra rare",
    "hyper rare",
    "illustration rare",
    "special art",
    "full art",
    "1st edition",
    "first edition",
    "shadowless",
    "unlimited",
    "holofoil",
    "holo",
    "foil",
    "vmax",
    "vstar",
    "v-union",
    "gx",
    "ex",
    "radiant",
    "shiny",
    "promo",
];

/// Set names commonly embedded in listing titles.
const SET_NAME_TOKENS: &[&str] = &[
    "evolving skies",
    "fusion strike",
    "brilliant stars",
    "astral radiance",
    "lost origin",
    "silver tempest",
    "crown zenith",
    "paldea evolved",
    "obsidian flames",
    "paradox rift",
    "temporal forces",
    "twilight masquerade",
    "hidden fates",
    "shining fates",
    "champion's path",
    "vivid voltage",
    "darkness ablaze",
    "rebel clash",
    "sword & shield",
    "sword and shield",
    "scarlet & violet",
    "scarlet and violet",
    "sun & moon",
    "celebrations",
    "base set",
    "team rocket",
    "neo genesis",
    "jungle",
    "fossil",
];

/// Filler words ignored when comparing titles word-by-word.
const FILLER_WORDS: &[&str] = &["the", "and", "pokemon", "card", "tcg", "mint"];

lazy_static! {
    /// Card numbers embedded in titles: "074/189", "12 / 203", "#12", "#GG44".
    static ref CARD_NUMBER: Regex = Regex::new(
        r"(?i)#?\s*\b[a-z]{0,4}\d{1,4}[a-z]?\s*/\s*[a-z]{0,4}\d{1,4}[a-z]?\b|#\s*[a-z]{0,4}\d+[a-z]?\b"
    )
    .unwrap();
    static ref RARITY: Regex = Regex::new(&token_pattern(RARITY_TOKENS)).unwrap();
    static ref SET_NAMES: Regex = Regex::new(&token_pattern(SET_NAME_TOKENS)).unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9 ]").unwrap();
}

fn token_pattern(tokens: &[&str]) -> String {
    let escaped: Vec<String> = tokens.iter().map(|t| regex::escape(t)).collect();
    format!(r"(?i)\b(?:{})\b", escaped.join("|"))
}

/// Clean a raw card or product title into a canonical name: strips
/// embedded card numbers, known set-name substrings and rarity/variant
/// suffix tokens, then collapses whitespace.
pub fn clean_name(raw: &str) -> String {
    let no_numbers = CARD_NUMBER.replace_all(raw, " ");
    let no_sets = SET_NAMES.replace_all(&no_numbers, " ");
    let no_rarity = RARITY.replace_all(&no_sets, " ");
    let no_brackets: String = no_rarity
        .chars()
        .map(|c| match c {
            '(' | ')' | '[' | ']' | '#' | '|' | ',' => ' ',
            other => other,
        })
        .collect();
    WHITESPACE.replace_all(no_brackets.trim(), " ").to_string()
}

/// Normalize an alphanumeric card number for cross-system comparison:
/// keeps the segment before any "/" separator, upper-cases alphabetic
/// prefixes and strips leading zeros from the numeric segment.
pub fn normalize_card_number(raw: &str) -> String {
    let head = raw.split('/').next().unwrap_or(raw);
    let head = head.trim().trim_start_matches('#').trim();
    let upper = head.to_uppercase();
    match upper.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => {
            let (prefix, digits) = upper.split_at(idx);
            let stripped = digits.trim_start_matches('0');
            if stripped.is_empty() {
                format!("{}0", prefix)
            } else {
                format!("{}{}", prefix, stripped)
            }
        }
        None => upper,
    }
}

/// Ranking of a candidate set name against the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetNameMatch {
    Exact,
    Partial,
    None,
}

/// Case-insensitive equality first, then substring containment in either
/// direction.
pub fn set_name_match(candidate: &str, wanted: &str) -> SetNameMatch {
    let a = candidate.trim().to_lowercase();
    let b = wanted.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return SetNameMatch::None;
    }
    if a == b {
        SetNameMatch::Exact
    } else if a.contains(&b) || b.contains(&a) {
        SetNameMatch::Partial
    } else {
        SetNameMatch::None
    }
}

/// Words of a title that carry identity: lowercased, at least three
/// characters, minus filler.
pub fn significant_words(s: &str) -> Vec<String> {
    let lowered = s.to_lowercase().replace('é', "e");
    let cleaned = NON_ALNUM.replace_all(&lowered, " ");
    cleaned
        .split_whitespace()
        .filter(|w| w.len() >= 3 && !FILLER_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// First card number embedded in a title, normalized; None when the title
/// carries no recognizable number.
pub fn extract_card_number(title: &str) -> Option<String> {
    let hit = CARD_NUMBER.find(title)?;
    let raw = hit.as_str().trim().trim_start_matches('#').trim();
    Some(normalize_card_number(raw))
}
