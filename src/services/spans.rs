// Span Assigner
// Rebuilds span ids from per-line labels alone

use crate::models::{is_outside, Document, Span};

fn span_id(n: usize) -> String {
    format!("s{}", n)
}

/// Label-driven spans: a new span opens at every non-outside line that
/// follows an outside line (or starts the document); later non-outside
/// lines join the open span. Block and layout metadata are ignored.
pub fn auto_spans(doc: &Document) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut prev_outside = true;

    for line in doc.lines() {
        if is_outside(line.tag()) {
            prev_outside = true;
            continue;
        }
        if prev_outside || spans.is_empty() {
            spans.push(Span {
                id: span_id(spans.len() + 1),
                lines: Vec::new(),
            });
        }
        if let Some(span) = spans.last_mut() {
            span.lines.push(line.lineno);
        }
        prev_outside = false;
    }
    spans
}

/// Rewrite every line's span id from [`auto_spans`]. Returns the span count.
pub fn assign_spans(doc: &mut Document) -> usize {
    let spans = auto_spans(doc);
    let linenos: Vec<usize> = doc.lines().map(|l| l.lineno).collect();
    for lineno in linenos {
        doc.set_span(lineno, None);
    }
    for span in &spans {
        for &lineno in &span.lines {
            doc.set_span(lineno, Some(span.id.clone()));
        }
    }
    spans.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, Line};
    use crate::services::labels::{line_label, LabelOptions};

    fn doc_with(tags: &[&str]) -> Document {
        let mut doc = Document::new("d");
        doc.push_block(Block { block_id: "b".into(), page: 1, llx: 0.0 });
        for (i, tag) in tags.iter().enumerate() {
            doc.push_line(Line::new(i + 1, "b", "text").with_label(tag, Some("stale"))).unwrap();
        }
        doc
    }

    fn members(spans: &[Span]) -> Vec<Vec<usize>> {
        spans.iter().map(|s| s.lines.clone()).collect()
    }

    #[test]
    fn test_auto_spans_follow_outside_boundaries() {
        let doc = doc_with(&["L", "G", "T", "O", "O", "G", "O", "L", "T"]);
        let spans = auto_spans(&doc);
        assert_eq!(members(&spans), vec![vec![1, 2, 3], vec![6], vec![8, 9]]);
        assert_eq!(spans[0].id, "s1");
        assert_eq!(spans[2].id, "s3");
    }

    #[test]
    fn test_assign_spans_rewrites_ids() {
        let mut doc = doc_with(&["O", "L", "G", "O", "T"]);
        assert_eq!(assign_spans(&mut doc), 2);
        assert_eq!(doc.get_line(1).unwrap().span_id(), None);
        assert_eq!(doc.get_line(2).unwrap().span_id(), Some("s1"));
        assert_eq!(doc.get_line(3).unwrap().span_id(), Some("s1"));
        assert_eq!(doc.get_line(5).unwrap().span_id(), Some("s2"));
        assert_eq!(members(&doc.spans()), vec![vec![2, 3], vec![5]]);
    }

    #[test]
    fn test_assign_spans_is_idempotent() {
        let mut doc = doc_with(&["G", "O", "L", "*G", "T+AC", "O", "O", "M"]);
        assign_spans(&mut doc);
        let first = doc.spans();
        assign_spans(&mut doc);
        assert_eq!(members(&doc.spans()), members(&first));
        assert_eq!(members(&auto_spans(&doc)), members(&first));
    }

    #[test]
    fn test_flagged_outside_line_splits_spans() {
        let mut doc = doc_with(&["L", "O+CR", "G"]);
        assert_eq!(assign_spans(&mut doc), 2);
        assert_eq!(members(&doc.spans()), vec![vec![1], vec![3]]);

        let opts = LabelOptions::default();
        let labels: Vec<String> = doc
            .lines()
            .filter_map(|l| line_label(&doc, l, &opts))
            .collect();
        assert_eq!(labels, vec!["B-L", "O", "B-G"]);
    }

    #[test]
    fn test_all_outside_has_no_spans() {
        let mut doc = doc_with(&["O", "O"]);
        assert_eq!(assign_spans(&mut doc), 0);
        assert!(doc.spans().is_empty());
    }
}
