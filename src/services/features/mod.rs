// Feature Module
// Per-line feature functions and their assembly into sparse vectors:
// - text: pattern, script, lexicon and OOV predicates over raw line text
// - layout: block, page and font predicates needing document statistics
// - statistics: per-document modal font and left margin
// - assembler: enabled-feature evaluation plus neighbouring-line context

pub mod assembler;
pub mod layout;
pub mod statistics;
pub mod text;

use serde::{Deserialize, Serialize};

pub use assembler::{combine_line_features, FeatureExtractor};
pub use layout::LayoutInput;
pub use statistics::{safe_mode_by, DocumentStatistics};
pub use text::{oov_rate, TextInput};

/// Prefix of the per-token word presence features.
pub const WORD_FEATURE_PREFIX: &str = "word_";

pub type TextPredicate = fn(&TextInput<'_>) -> bool;
pub type LayoutPredicate = fn(&LayoutInput<'_>) -> bool;

/// Text feature identifiers as they appear in configuration and vector files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFeature {
    Words,
    HasLangname,
    HasGrams,
    HasParenthetical,
    HasCitation,
    HasAsterisk,
    HasUnderscore,
    HasBracketing,
    HasQuotation,
    HasNumbering,
    HasLeadingWhitespace,
    HighOovRate,
    MedOovRate,
    HighGlsOov,
    MedGlsOov,
    HighMetOov,
    MedMetOov,
    HasJpn,
    HasGrk,
    HasKor,
    HasCyr,
    HasAccLat,
    HasDia,
    HasUni,
    HasYear,
}

impl TextFeature {
    pub const ALL: [TextFeature; 25] = [
        TextFeature::Words,
        TextFeature::HasLangname,
        TextFeature::HasGrams,
        TextFeature::HasParenthetical,
        TextFeature::HasCitation,
        TextFeature::HasAsterisk,
        TextFeature::HasUnderscore,
        TextFeature::HasBracketing,
        TextFeature::HasQuotation,
        TextFeature::HasNumbering,
        TextFeature::HasLeadingWhitespace,
        TextFeature::HighOovRate,
        TextFeature::MedOovRate,
        TextFeature::HighGlsOov,
        TextFeature::MedGlsOov,
        TextFeature::HighMetOov,
        TextFeature::MedMetOov,
        TextFeature::HasJpn,
        TextFeature::HasGrk,
        TextFeature::HasKor,
        TextFeature::HasCyr,
        TextFeature::HasAccLat,
        TextFeature::HasDia,
        TextFeature::HasUni,
        TextFeature::HasYear,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TextFeature::Words => "words",
            TextFeature::HasLangname => "has_langname",
            TextFeature::HasGrams => "has_grams",
            TextFeature::HasParenthetical => "has_parenthetical",
            TextFeature::HasCitation => "has_citation",
            TextFeature::HasAsterisk => "has_asterisk",
            TextFeature::HasUnderscore => "has_underscore",
            TextFeature::HasBracketing => "has_bracketing",
            TextFeature::HasQuotation => "has_quotation",
            TextFeature::HasNumbering => "has_numbering",
            TextFeature::HasLeadingWhitespace => "has_leading_whitespace",
            TextFeature::HighOovRate => "high_oov_rate",
            TextFeature::MedOovRate => "med_oov_rate",
            TextFeature::HighGlsOov => "high_gls_oov",
            TextFeature::MedGlsOov => "med_gls_oov",
            TextFeature::HighMetOov => "high_met_oov",
            TextFeature::MedMetOov => "med_met_oov",
            TextFeature::HasJpn => "has_jpn",
            TextFeature::HasGrk => "has_grk",
            TextFeature::HasKor => "has_kor",
            TextFeature::HasCyr => "has_cyr",
            TextFeature::HasAccLat => "has_acc_lat",
            TextFeature::HasDia => "has_dia",
            TextFeature::HasUni => "has_uni",
            TextFeature::HasYear => "has_year",
        }
    }

    /// The boolean predicate behind a feature. `Words` expands to one key per
    /// token instead and has no single predicate.
    pub fn predicate(self) -> Option<TextPredicate> {
        let f: TextPredicate = match self {
            TextFeature::Words => return None,
            TextFeature::HasLangname => |t| t.lexicon.has_langname(t.text),
            TextFeature::HasGrams => |t| t.lexicon.has_grams(t.text),
            TextFeature::HasParenthetical => |t| text::has_parenthetical(t.text),
            TextFeature::HasCitation => |t| text::has_citation(t.text),
            TextFeature::HasAsterisk => |t| text::has_asterisk(t.text),
            TextFeature::HasUnderscore => |t| text::has_underscore(t.text),
            TextFeature::HasBracketing => |t| text::has_bracketing(t.text),
            TextFeature::HasQuotation => |t| text::has_quotation(t.text),
            TextFeature::HasNumbering => |t| text::has_numbering(t.text),
            TextFeature::HasLeadingWhitespace => |t| text::has_leading_whitespace(t.text),
            TextFeature::HighOovRate => text::high_en_oov_rate,
            TextFeature::MedOovRate => text::med_en_oov_rate,
            TextFeature::HighGlsOov => text::high_gls_oov_rate,
            TextFeature::MedGlsOov => text::med_gls_oov_rate,
            TextFeature::HighMetOov => text::high_met_oov_rate,
            TextFeature::MedMetOov => text::med_met_oov_rate,
            TextFeature::HasJpn => |t| text::has_japanese(t.text),
            TextFeature::HasGrk => |t| text::has_greek(t.text),
            TextFeature::HasKor => |t| text::has_korean(t.text),
            TextFeature::HasCyr => |t| text::has_cyrillic(t.text),
            TextFeature::HasAccLat => |t| text::has_accented_latin(t.text),
            TextFeature::HasDia => |t| text::has_diacritic(t.text),
            TextFeature::HasUni => |t| text::has_unicode(t.text),
            TextFeature::HasYear => |t| text::has_year(t.text),
        };
        Some(f)
    }
}

/// Layout feature identifiers as they appear in configuration and vector files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutFeature {
    IsIndented,
    IsFirstPage,
    PrevLineSameBlock,
    NextLineSameBlock,
    HasNonstandardFont,
    HasSmallerFont,
    HasLargerFont,
}

impl LayoutFeature {
    pub const ALL: [LayoutFeature; 7] = [
        LayoutFeature::IsIndented,
        LayoutFeature::IsFirstPage,
        LayoutFeature::PrevLineSameBlock,
        LayoutFeature::NextLineSameBlock,
        LayoutFeature::HasNonstandardFont,
        LayoutFeature::HasSmallerFont,
        LayoutFeature::HasLargerFont,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayoutFeature::IsIndented => "is_indented",
            LayoutFeature::IsFirstPage => "is_first_page",
            LayoutFeature::PrevLineSameBlock => "prev_line_same_block",
            LayoutFeature::NextLineSameBlock => "next_line_same_block",
            LayoutFeature::HasNonstandardFont => "has_nonstandard_font",
            LayoutFeature::HasSmallerFont => "has_smaller_font",
            LayoutFeature::HasLargerFont => "has_larger_font",
        }
    }

    pub fn predicate(self) -> LayoutPredicate {
        match self {
            LayoutFeature::IsIndented => layout::is_indented,
            LayoutFeature::IsFirstPage => layout::is_first_page,
            LayoutFeature::PrevLineSameBlock => layout::prev_line_same_block,
            LayoutFeature::NextLineSameBlock => layout::next_line_same_block,
            LayoutFeature::HasNonstandardFont => layout::has_nonstandard_font,
            LayoutFeature::HasSmallerFont => layout::has_smaller_font,
            LayoutFeature::HasLargerFont => layout::has_larger_font,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_serde_identifiers() {
        for feat in TextFeature::ALL {
            let json = serde_json::to_string(&feat).unwrap();
            assert_eq!(json, format!("\"{}\"", feat.name()));
        }
        for feat in LayoutFeature::ALL {
            let json = serde_json::to_string(&feat).unwrap();
            assert_eq!(json, format!("\"{}\"", feat.name()));
        }
    }

    #[test]
    fn test_only_words_lacks_predicate() {
        let missing: Vec<_> = TextFeature::ALL
            .into_iter()
            .filter(|f| f.predicate().is_none())
            .collect();
        assert_eq!(missing, vec![TextFeature::Words]);
    }
}
