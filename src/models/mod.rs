// IGT Data Models
// Layout-aware documents, per-line labels, spans and feature vectors

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// The outside class. Never BIO-prefixed and never part of a span.
pub const OUTSIDE_LABEL: &str = "O";

/// True when a raw or normalized tag denotes the outside class. Only the
/// leading component counts: `*O`, `O+CR` and `O-L` are all outside.
pub fn is_outside(tag: &str) -> bool {
    let tag = tag.trim().trim_start_matches('*');
    let head = tag.split('+').next().unwrap_or(tag);
    let head = head.split('-').next().unwrap_or(head);
    head.is_empty() || head == OUTSIDE_LABEL
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("line {lineno} references unknown block \"{block_id}\"")]
    UnknownBlock { lineno: usize, block_id: String },
    #[error("duplicate line number {0}")]
    DuplicateLine(usize),
    #[error("invalid font descriptor \"{0}\"")]
    InvalidFont(String),
}

// ============ Fonts & Blocks ============

/// A (family, style, size) descriptor. Equality and hashing use the exact
/// bit pattern of the size so fonts can live in sets and mode counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    #[serde(default)]
    pub style: Option<String>,
    pub size: f64,
}

impl Font {
    pub fn new(family: impl Into<String>, style: Option<&str>, size: f64) -> Self {
        Self {
            family: family.into(),
            style: style.map(|s| s.to_string()),
            size,
        }
    }
}

impl PartialEq for Font {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family
            && self.style == other.style
            && self.size.to_bits() == other.size.to_bits()
    }
}

impl Eq for Font {}

impl Hash for Font {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family.hash(state);
        self.style.hash(state);
        self.size.to_bits().hash(state);
    }
}

impl fmt::Display for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.style {
            Some(style) => write!(f, "{}-{}-{:?}", self.family, style, self.size),
            None => write!(f, "{}-{:?}", self.family, self.size),
        }
    }
}

impl FromStr for Font {
    type Err = DocumentError;

    /// Parses `Family-Size` or `Family-Style-Size`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DocumentError::InvalidFont(s.to_string());
        let (name, size) = s.trim().rsplit_once('-').ok_or_else(invalid)?;
        let size: f64 = size.parse().map_err(|_| invalid())?;
        if name.is_empty() {
            return Err(invalid());
        }
        let font = match name.split_once('-') {
            Some((family, style)) if !style.is_empty() => Font::new(family, Some(style), size),
            _ => Font::new(name, None, size),
        };
        Ok(font)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_id: String,
    pub page: u32,
    /// Left margin (lower-left x) of the block.
    pub llx: f64,
}

// ============ Lines ============

/// The mutable labeling state of one line. Relabeling always drops the span
/// id so that a stale span can never outlive the label it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineLabel {
    tag: String,
    span_id: Option<String>,
}

impl LineLabel {
    pub fn new(tag: impl Into<String>, span_id: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            span_id,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    pub fn relabel(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
        self.span_id = None;
    }

    /// Outside-class lines never carry a span id.
    pub fn set_span(&mut self, span_id: Option<String>) {
        self.span_id = if is_outside(&self.tag) { None } else { span_id };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub lineno: usize,
    pub text: String,
    pub block_id: String,
    #[serde(default)]
    pub fonts: Vec<Font>,
    pub label: LineLabel,
}

impl Line {
    pub fn new(lineno: usize, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            lineno,
            text: text.into(),
            block_id: block_id.into(),
            fonts: Vec::new(),
            label: LineLabel::new(OUTSIDE_LABEL, None),
        }
    }

    pub fn with_label(mut self, tag: &str, span_id: Option<&str>) -> Self {
        self.label = LineLabel::new(tag, None);
        self.label.set_span(span_id.map(|s| s.to_string()));
        self
    }

    pub fn with_fonts(mut self, fonts: impl IntoIterator<Item = Font>) -> Self {
        for font in fonts {
            self.add_font(font);
        }
        self
    }

    /// Fonts form a set; duplicates are ignored.
    pub fn add_font(&mut self, font: Font) {
        if !self.fonts.contains(&font) {
            self.fonts.push(font);
        }
    }

    pub fn tag(&self) -> &str {
        self.label.tag()
    }

    pub fn span_id(&self) -> Option<&str> {
        self.label.span_id()
    }
}

// ============ Spans ============

/// An ordered run of line numbers sharing one span id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    pub lines: Vec<usize>,
}

impl Span {
    pub fn start(&self) -> usize {
        self.lines.first().copied().unwrap_or_default()
    }

    pub fn end(&self) -> usize {
        self.lines.last().copied().unwrap_or_default()
    }

    pub fn contains_line(&self, lineno: usize) -> bool {
        (self.start()..=self.end()).contains(&lineno)
    }
}

// ============ Document ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub doc_id: String,
    blocks: Vec<Block>,
    lines: BTreeMap<usize, Line>,
}

impl Document {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            blocks: Vec::new(),
            lines: BTreeMap::new(),
        }
    }

    /// Re-adding a block id replaces the earlier block.
    pub fn push_block(&mut self, block: Block) {
        match self.blocks.iter_mut().find(|b| b.block_id == block.block_id) {
            Some(existing) => *existing = block,
            None => self.blocks.push(block),
        }
    }

    pub fn push_line(&mut self, line: Line) -> Result<(), DocumentError> {
        if self.block(&line.block_id).is_none() {
            return Err(DocumentError::UnknownBlock {
                lineno: line.lineno,
                block_id: line.block_id,
            });
        }
        if self.lines.contains_key(&line.lineno) {
            return Err(DocumentError::DuplicateLine(line.lineno));
        }
        self.lines.insert(line.lineno, line);
        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.block_id == block_id)
    }

    pub fn block_of(&self, line: &Line) -> Option<&Block> {
        self.block(&line.block_id)
    }

    /// Line lookup by number; absent lines are `None`, never an error.
    pub fn get_line(&self, lineno: usize) -> Option<&Line> {
        self.lines.get(&lineno)
    }

    /// Lines in line-number order.
    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.lines.values()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Every font occurrence across all lines, in line order.
    pub fn fonts(&self) -> Vec<Font> {
        self.lines().flat_map(|l| l.fonts.iter().cloned()).collect()
    }

    /// The block left margin of every line, in line order.
    pub fn llxs(&self) -> Vec<f64> {
        self.lines()
            .filter_map(|l| self.block_of(l).map(|b| b.llx))
            .collect()
    }

    /// Rewrites a line's tag. The line's span id is cleared until spans are
    /// reassigned. Returns false when the line does not exist.
    pub fn set_label(&mut self, lineno: usize, tag: &str) -> bool {
        match self.lines.get_mut(&lineno) {
            Some(line) => {
                line.label.relabel(tag);
                true
            }
            None => false,
        }
    }

    pub fn set_span(&mut self, lineno: usize, span_id: Option<String>) -> bool {
        match self.lines.get_mut(&lineno) {
            Some(line) => {
                line.label.set_span(span_id);
                true
            }
            None => false,
        }
    }

    /// Span id to member lines, ordered by first appearance.
    pub fn spans(&self) -> Vec<Span> {
        let mut spans: Vec<Span> = Vec::new();
        for line in self.lines() {
            let Some(span_id) = line.span_id() else {
                continue;
            };
            match spans.iter_mut().find(|s| s.id == span_id) {
                Some(span) => span.lines.push(line.lineno),
                None => spans.push(Span {
                    id: span_id.to_string(),
                    lines: vec![line.lineno],
                }),
            }
        }
        spans
    }
}

// ============ Features ============

/// Sparse boolean feature vector: a name is present iff its value is true.
/// Backed by an ordered set so serialisation is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    names: BTreeSet<String>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: bool) {
        let name = name.into();
        if value {
            self.names.insert(name);
        } else {
            self.names.remove(&name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Feature names in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn extend(&mut self, other: &FeatureVector) {
        self.names.extend(other.names.iter().cloned());
    }

    pub fn extend_prefixed(&mut self, other: &FeatureVector, prefix: &str) {
        self.names
            .extend(other.names.iter().map(|n| format!("{}{}", prefix, n)));
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// One training or inference row: final label plus the line's features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledInstance {
    pub label: String,
    pub features: FeatureVector,
}

impl LabeledInstance {
    pub fn new(label: impl Into<String>, features: FeatureVector) -> Self {
        Self {
            label: label.into(),
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> Document {
        let mut doc = Document::new("doc");
        doc.push_block(Block { block_id: "1-1".into(), page: 1, llx: 72.0 });
        doc.push_line(Line::new(1, "1-1", "a").with_label("L", Some("s1"))).unwrap();
        doc.push_line(Line::new(2, "1-1", "b").with_label("G", Some("s1"))).unwrap();
        doc.push_line(Line::new(3, "1-1", "c")).unwrap();
        doc.push_line(Line::new(4, "1-1", "d").with_label("T", Some("s2"))).unwrap();
        doc
    }

    #[test]
    fn test_font_round_trip() {
        let font: Font = "Times-Italic-10.5".parse().unwrap();
        assert_eq!(font.family, "Times");
        assert_eq!(font.style.as_deref(), Some("Italic"));
        assert_eq!(font.size, 10.5);
        assert_eq!(font.to_string(), "Times-Italic-10.5");

        let plain: Font = "Courier-12.0".parse().unwrap();
        assert_eq!(plain.style, None);
        assert_eq!(plain.to_string(), "Courier-12.0");
        assert!("nosize".parse::<Font>().is_err());
    }

    #[test]
    fn test_get_line_absent_is_none() {
        let doc = sample_doc();
        assert!(doc.get_line(0).is_none());
        assert!(doc.get_line(99).is_none());
        assert_eq!(doc.get_line(2).map(|l| l.text.as_str()), Some("b"));
    }

    #[test]
    fn test_push_line_rejects_unknown_block_and_duplicates() {
        let mut doc = sample_doc();
        assert!(matches!(
            doc.push_line(Line::new(5, "9-9", "x")),
            Err(DocumentError::UnknownBlock { .. })
        ));
        assert!(matches!(
            doc.push_line(Line::new(1, "1-1", "x")),
            Err(DocumentError::DuplicateLine(1))
        ));
    }

    #[test]
    fn test_spans_grouped_in_first_appearance_order() {
        let spans = sample_doc().spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].id, "s1");
        assert_eq!(spans[0].lines, vec![1, 2]);
        assert_eq!((spans[1].start(), spans[1].end()), (4, 4));
    }

    #[test]
    fn test_relabel_clears_span() {
        let mut doc = sample_doc();
        assert!(doc.set_label(2, "T"));
        assert_eq!(doc.get_line(2).unwrap().span_id(), None);
        assert!(!doc.set_label(42, "T"));
    }

    #[test]
    fn test_is_outside_reads_leading_component() {
        for tag in ["O", "*O", "O+CR", "O-L", " O+AC ", ""] {
            assert!(is_outside(tag), "{tag:?}");
        }
        for tag in ["L", "G+CR", "*T", "B-G", "L-G-T"] {
            assert!(!is_outside(tag), "{tag:?}");
        }
    }

    #[test]
    fn test_flagged_outside_lines_never_get_span() {
        let mut line = Line::new(1, "b", "x").with_label("O+CR", Some("s1"));
        assert_eq!(line.span_id(), None);
        line.label.set_span(Some("s2".into()));
        assert_eq!(line.span_id(), None);
    }

    #[test]
    fn test_outside_lines_never_get_span() {
        let mut doc = sample_doc();
        doc.set_span(3, Some("s9".into()));
        assert_eq!(doc.get_line(3).unwrap().span_id(), None);
    }

    #[test]
    fn test_feature_vector_sparse_and_sorted() {
        let mut fv = FeatureVector::new();
        fv.set("zeta", true);
        fv.set("alpha", true);
        fv.set("beta", false);
        assert_eq!(fv.iter().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
        fv.set("zeta", false);
        assert_eq!(fv.len(), 1);
    }
}
