// Document Statistics
// Modal font and left margin computed once per document for layout features

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{Document, Font};

/// The most frequent value by `key`. Ties go to the value seen first;
/// an empty input yields `None`.
pub fn safe_mode_by<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Option<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut counts: Vec<(T, usize)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    for item in items {
        match index.entry(key(&item)) {
            Entry::Occupied(e) => counts[*e.get()].1 += 1,
            Entry::Vacant(e) => {
                e.insert(counts.len());
                counts.push((item, 1));
            }
        }
    }

    let mut best: Option<(T, usize)> = None;
    for (item, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((item, count));
        }
    }
    best.map(|(item, _)| item)
}

/// Per-document layout reference points. Either field is `None` when the
/// document has no fonts or no positioned lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStatistics {
    pub default_font: Option<Font>,
    pub llx: Option<f64>,
}

impl DocumentStatistics {
    pub fn compute(doc: &Document) -> Self {
        Self {
            default_font: safe_mode_by(doc.fonts(), |f| f.clone()),
            llx: safe_mode_by(doc.llxs(), |x| x.to_bits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, Line};

    #[test]
    fn test_safe_mode_prefers_first_on_tie() {
        assert_eq!(safe_mode_by(vec!["b", "a", "a", "b"], |s| *s), Some("b"));
        assert_eq!(safe_mode_by(vec![1, 2, 2, 3], |n| *n), Some(2));
        assert_eq!(safe_mode_by(Vec::<u8>::new(), |n| *n), None);
    }

    #[test]
    fn test_compute_statistics() {
        let mut doc = Document::new("d1");
        doc.push_block(Block { block_id: "1-1".into(), page: 1, llx: 72.0 });
        doc.push_block(Block { block_id: "1-2".into(), page: 1, llx: 90.0 });
        let body = Font::new("Times", None, 10.0);
        let small = Font::new("Times", Some("Italic"), 8.0);
        doc.push_line(Line::new(1, "1-1", "a").with_fonts([body.clone()])).unwrap();
        doc.push_line(Line::new(2, "1-1", "b").with_fonts([body.clone(), small])).unwrap();
        doc.push_line(Line::new(3, "1-2", "c").with_fonts([body.clone()])).unwrap();

        let stats = DocumentStatistics::compute(&doc);
        assert_eq!(stats.default_font, Some(body));
        assert_eq!(stats.llx, Some(72.0));
    }

    #[test]
    fn test_empty_document_has_no_statistics() {
        assert_eq!(DocumentStatistics::compute(&Document::new("d")), DocumentStatistics::default());
    }
}
