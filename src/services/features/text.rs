// Text Features
// Predicates over a single line's raw text and its word tokens

use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

use crate::services::config_store::ThresholdConfig;
use crate::services::lexicon::{Lexicon, Vocabulary, Wordlist};

/// Everything a text predicate may look at for one line.
#[derive(Debug, Clone, Copy)]
pub struct TextInput<'a> {
    pub text: &'a str,
    pub words: &'a [String],
    pub lexicon: &'a Lexicon,
    pub thresholds: &'a ThresholdConfig,
}

const YEAR: &str = r"(?:1[89][0-9]{2}|20[01][0-9])";

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*\)").expect("parenthetical regex"))
}

fn bracketing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[.*\]").expect("bracketing regex"))
}

fn numbering_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\(?[0-9a-z]+[\)\.]").expect("numbering regex"))
}

fn leading_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+").expect("leading whitespace regex"))
}

fn quotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"‘`“]\S+\s+.+['"’”]"#).expect("quotation regex"))
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\b{}\b", YEAR)).expect("year regex"))
}

fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\([^,]+, {}\)", YEAR)).expect("citation regex"))
}

pub fn has_parenthetical(text: &str) -> bool {
    parenthetical_re().is_match(text)
}

pub fn has_bracketing(text: &str) -> bool {
    bracketing_re().is_match(text)
}

pub fn has_numbering(text: &str) -> bool {
    numbering_re().is_match(text)
}

pub fn has_leading_whitespace(text: &str) -> bool {
    leading_ws_re().is_match(text)
}

pub fn has_quotation(text: &str) -> bool {
    quotation_re().is_match(text)
}

pub fn has_year(text: &str) -> bool {
    year_re().is_match(text)
}

/// `(Author, 1998)` style references.
pub fn has_citation(text: &str) -> bool {
    citation_re().is_match(text)
}

pub fn has_asterisk(text: &str) -> bool {
    text.contains('*')
}

pub fn has_underscore(text: &str) -> bool {
    text.contains('_')
}

// Unicode script blocks

const CYRILLIC: &[RangeInclusive<char>] = &['\u{0400}'..='\u{04FF}'];
const GREEK: &[RangeInclusive<char>] = &['\u{0370}'..='\u{03FF}', '\u{1F00}'..='\u{1FFF}'];
const JAPANESE: &[RangeInclusive<char>] = &[
    '\u{4E00}'..='\u{9FBF}',
    '\u{3040}'..='\u{309F}',
    '\u{30A0}'..='\u{30FF}',
];
const KOREAN: &[RangeInclusive<char>] = &['\u{AC00}'..='\u{D7A3}'];
const ACCENTED_LATIN: &[RangeInclusive<char>] = &['\u{00C0}'..='\u{00FF}'];
const DIACRITICS: &[RangeInclusive<char>] = &[
    '\u{0300}'..='\u{036F}',
    '\u{1AB0}'..='\u{1AFF}',
    '\u{1DC0}'..='\u{1DFF}',
    '\u{20D0}'..='\u{20FF}',
    '\u{FE20}'..='\u{FE2F}',
];

fn any_in(text: &str, ranges: &[RangeInclusive<char>]) -> bool {
    text.chars().any(|c| ranges.iter().any(|r| r.contains(&c)))
}

pub fn has_cyrillic(text: &str) -> bool {
    any_in(text, CYRILLIC)
}

pub fn has_greek(text: &str) -> bool {
    any_in(text, GREEK)
}

pub fn has_japanese(text: &str) -> bool {
    any_in(text, JAPANESE)
}

pub fn has_korean(text: &str) -> bool {
    any_in(text, KOREAN)
}

pub fn has_accented_latin(text: &str) -> bool {
    any_in(text, ACCENTED_LATIN)
}

pub fn has_diacritic(text: &str) -> bool {
    any_in(text, DIACRITICS)
}

/// Any of the script or diacritic ranges above.
pub fn has_unicode(text: &str) -> bool {
    [CYRILLIC, GREEK, JAPANESE, KOREAN, ACCENTED_LATIN, DIACRITICS]
        .iter()
        .any(|ranges| any_in(text, ranges))
}

// Out-of-vocabulary rates

/// Fraction of tokens missing from `vocabulary`. 0.0 when there is no
/// vocabulary or no tokens.
pub fn oov_rate(vocabulary: Option<&Wordlist>, words: &[String]) -> f64 {
    let Some(vocabulary) = vocabulary else {
        return 0.0;
    };
    if words.is_empty() {
        return 0.0;
    }
    let oov = words.iter().filter(|w| !vocabulary.contains(w)).count();
    oov as f64 / words.len() as f64
}

/// `None` when the vocabulary is absent or the line has no tokens; the
/// OOV predicates are then false whatever the thresholds.
fn rate(t: &TextInput<'_>, vocabulary: Vocabulary) -> Option<f64> {
    let words = t.lexicon.wordlist(vocabulary)?;
    if t.words.is_empty() {
        return None;
    }
    Some(oov_rate(Some(words), t.words))
}

fn is_high(rate: Option<f64>, thresholds: &ThresholdConfig) -> bool {
    rate.map_or(false, |r| r >= thresholds.high_oov)
}

fn is_med(rate: Option<f64>, thresholds: &ThresholdConfig) -> bool {
    rate.map_or(false, |r| thresholds.med_oov < r && r < thresholds.high_oov)
}

pub fn high_en_oov_rate(t: &TextInput<'_>) -> bool {
    is_high(rate(t, Vocabulary::English), t.thresholds)
}

pub fn med_en_oov_rate(t: &TextInput<'_>) -> bool {
    is_med(rate(t, Vocabulary::English), t.thresholds)
}

pub fn high_gls_oov_rate(t: &TextInput<'_>) -> bool {
    is_high(rate(t, Vocabulary::Gloss), t.thresholds)
}

pub fn med_gls_oov_rate(t: &TextInput<'_>) -> bool {
    is_med(rate(t, Vocabulary::Gloss), t.thresholds)
}

pub fn high_met_oov_rate(t: &TextInput<'_>) -> bool {
    is_high(rate(t, Vocabulary::Meta), t.thresholds)
}

pub fn med_met_oov_rate(t: &TextInput<'_>) -> bool {
    is_med(rate(t, Vocabulary::Meta), t.thresholds)
}
