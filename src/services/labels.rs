// Label Normalizer
// Canonical logical labels and BIO prefixes derived from span continuity

use crate::models::{is_outside, Document, Line, OUTSIDE_LABEL};
use crate::services::config_store::LabelConfig;

pub const BEGIN_PREFIX: &str = "B-";
pub const INSIDE_PREFIX: &str = "I-";

const NOISY_MARKER: char = '*';
const FLAG_SEPARATOR: char = '+';
const MULTI_SEPARATOR: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelOptions {
    pub use_bi_labels: bool,
    pub use_multi_labels: bool,
    pub strip_flags: bool,
    /// Drop `*`-marked lines entirely instead of just stripping the marker.
    pub skip_noisy: bool,
}

impl LabelOptions {
    pub fn from_config(config: &LabelConfig, skip_noisy: bool) -> Self {
        Self {
            use_bi_labels: config.use_bi_labels,
            use_multi_labels: config.use_multi_labels,
            strip_flags: config.strip_flags,
            skip_noisy,
        }
    }
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self::from_config(&LabelConfig::default(), false)
    }
}

/// Canonical logical label for a raw tag, without any BIO prefix.
/// `None` means the line must be left out of training data.
pub fn normalize_label(raw: &str, opts: &LabelOptions) -> Option<String> {
    let raw = raw.trim();
    let body = match raw.strip_prefix(NOISY_MARKER) {
        Some(_) if opts.skip_noisy => return None,
        Some(rest) => rest,
        None => raw,
    };

    let body = if opts.strip_flags {
        body.split(FLAG_SEPARATOR).next().unwrap_or(body)
    } else {
        body
    };

    let body = if opts.use_multi_labels {
        body
    } else {
        body.split(MULTI_SEPARATOR).next().unwrap_or(body)
    };

    if is_outside(body) {
        Some(OUTSIDE_LABEL.to_string())
    } else {
        Some(body.to_string())
    }
}

/// `I-` when the immediately preceding line (by number) carries the same
/// span id and a non-outside tag; otherwise `B-`.
pub fn span_prefix(doc: &Document, line: &Line) -> &'static str {
    let Some(span_id) = line.span_id() else {
        return BEGIN_PREFIX;
    };
    let continues = line
        .lineno
        .checked_sub(1)
        .and_then(|n| doc.get_line(n))
        .map_or(false, |prev| !is_outside(prev.tag()) && prev.span_id() == Some(span_id));
    if continues && !is_outside(line.tag()) {
        INSIDE_PREFIX
    } else {
        BEGIN_PREFIX
    }
}

/// Final training label for a line: normalized, then BIO-prefixed when BI
/// mode is on. The outside class is never prefixed.
pub fn line_label(doc: &Document, line: &Line, opts: &LabelOptions) -> Option<String> {
    let label = normalize_label(line.tag(), opts)?;
    if !opts.use_bi_labels || label == OUTSIDE_LABEL {
        return Some(label);
    }
    Some(format!("{}{}", span_prefix(doc, line), label))
}

/// Split a `B-`/`I-` prefix off a label, if it has one.
pub fn split_bio(label: &str) -> (Option<&str>, &str) {
    for prefix in [BEGIN_PREFIX, INSIDE_PREFIX] {
        if let Some(rest) = label.strip_prefix(prefix) {
            return (Some(prefix), rest);
        }
    }
    (None, label)
}

pub fn strip_bio(label: &str) -> &str {
    split_bio(label).1
}

/// Label as compared during evaluation. Flag and multi-label rules are
/// applied to the body; an existing BIO prefix is kept only in BI mode and
/// is never re-derived.
pub fn normalize_for_eval(label: &str, opts: &LabelOptions) -> String {
    let label = label.trim();
    let label = label.strip_prefix(NOISY_MARKER).unwrap_or(label);
    let (prefix, body) = split_bio(label);
    let opts = LabelOptions {
        skip_noisy: false,
        ..*opts
    };
    let body = normalize_label(body, &opts).unwrap_or_else(|| OUTSIDE_LABEL.to_string());
    match prefix {
        Some(prefix) if opts.use_bi_labels && body != OUTSIDE_LABEL => format!("{}{}", prefix, body),
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Block;
    use crate::services::spans::assign_spans;

    fn opts() -> LabelOptions {
        LabelOptions {
            use_bi_labels: true,
            use_multi_labels: false,
            strip_flags: true,
            skip_noisy: false,
        }
    }

    fn doc_with(tags: &[&str]) -> Document {
        let mut doc = Document::new("d");
        doc.push_block(Block { block_id: "b".into(), page: 1, llx: 0.0 });
        for (i, tag) in tags.iter().enumerate() {
            doc.push_line(Line::new(i + 1, "b", "text").with_label(tag, None)).unwrap();
        }
        assign_spans(&mut doc);
        doc
    }

    #[test]
    fn test_normalize_label_rules() {
        assert_eq!(normalize_label("L+AC+LN", &opts()).as_deref(), Some("L"));
        assert_eq!(normalize_label("L-G-T", &opts()).as_deref(), Some("L"));
        assert_eq!(normalize_label("*G", &opts()).as_deref(), Some("G"));
        assert_eq!(normalize_label("O+CR", &opts()).as_deref(), Some("O"));

        let multi = LabelOptions { use_multi_labels: true, ..opts() };
        assert_eq!(normalize_label("L-G-T+AC", &multi).as_deref(), Some("L-G-T"));

        let keep_flags = LabelOptions { strip_flags: false, use_multi_labels: true, ..opts() };
        assert_eq!(normalize_label("T+LN", &keep_flags).as_deref(), Some("T+LN"));
    }

    #[test]
    fn test_noisy_labels_skipped_when_requested() {
        let skip = LabelOptions { skip_noisy: true, ..opts() };
        assert_eq!(normalize_label("*G", &skip), None);
        assert_eq!(normalize_label("G", &skip).as_deref(), Some("G"));
    }

    #[test]
    fn test_bio_prefixes_follow_span_continuity() {
        let doc = doc_with(&["O", "L", "G", "T", "O", "M"]);
        let labels: Vec<_> = doc
            .lines()
            .map(|l| line_label(&doc, l, &opts()).unwrap())
            .collect();
        assert_eq!(labels, vec!["O", "B-L", "I-G", "I-T", "O", "B-M"]);
    }

    #[test]
    fn test_bio_invariant_holds_for_every_adjacent_pair() {
        let doc = doc_with(&["L", "G", "O", "O", "T", "L+LN", "O", "*G", "G", "O+CR", "T"]);
        let lines: Vec<_> = doc.lines().collect();
        for pair in lines.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            let label = line_label(&doc, cur, &opts()).unwrap();
            let same_span = !is_outside(prev.tag())
                && !is_outside(cur.tag())
                && prev.span_id().is_some()
                && prev.span_id() == cur.span_id();
            if same_span {
                assert!(label.starts_with(INSIDE_PREFIX), "line {} -> {}", cur.lineno, label);
            } else if is_outside(cur.tag()) {
                assert_eq!(label, OUTSIDE_LABEL);
            } else {
                assert!(label.starts_with(BEGIN_PREFIX), "line {} -> {}", cur.lineno, label);
            }
        }
    }

    #[test]
    fn test_line_without_span_is_begin() {
        let mut doc = Document::new("d");
        doc.push_block(Block { block_id: "b".into(), page: 1, llx: 0.0 });
        doc.push_line(Line::new(1, "b", "x").with_label("G", None)).unwrap();
        doc.push_line(Line::new(2, "b", "y").with_label("T", None)).unwrap();
        let line = doc.get_line(2).unwrap();
        assert_eq!(line_label(&doc, line, &opts()).as_deref(), Some("B-T"));
    }

    #[test]
    fn test_bi_mode_off_has_no_prefix() {
        let doc = doc_with(&["L", "G"]);
        let plain = LabelOptions { use_bi_labels: false, ..opts() };
        let line = doc.get_line(2).unwrap();
        assert_eq!(line_label(&doc, line, &plain).as_deref(), Some("G"));
    }

    #[test]
    fn test_normalize_for_eval() {
        assert_eq!(normalize_for_eval("I-G+CR", &opts()), "I-G");
        assert_eq!(normalize_for_eval("B-L-G", &opts()), "B-L");
        assert_eq!(normalize_for_eval("*T", &opts()), "T");
        assert_eq!(normalize_for_eval("O", &opts()), "O");
        let plain = LabelOptions { use_bi_labels: false, ..opts() };
        assert_eq!(normalize_for_eval("I-G", &plain), "G");
    }

    #[test]
    fn test_split_bio() {
        assert_eq!(split_bio("B-G"), (Some("B-"), "G"));
        assert_eq!(split_bio("G"), (None, "G"));
        assert_eq!(strip_bio("I-L-T"), "L-T");
    }
}
