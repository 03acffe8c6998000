// Span Evaluator
// Exact and partial (endpoint containment) span agreement counts

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::Span;

use super::label_eval::f_measure;

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Spans present in both collections with identical member lines,
/// regardless of their ids.
pub fn exact_span_matches(system: &[Span], gold: &[Span]) -> usize {
    let system: HashSet<&[usize]> = system.iter().map(|s| s.lines.as_slice()).collect();
    let gold: HashSet<&[usize]> = gold.iter().map(|s| s.lines.as_slice()).collect();
    system.intersection(&gold).count()
}

/// Spans in `spans` with a start or end line inside some span of `others`.
/// Each span counts at most once.
pub fn partial_span_matches(spans: &[Span], others: &[Span]) -> usize {
    spans
        .iter()
        .filter(|s| {
            others
                .iter()
                .any(|o| o.contains_line(s.start()) || o.contains_line(s.end()))
        })
        .count()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanEvaluator {
    pub exact_matches: usize,
    pub partial_precision_matches: usize,
    pub partial_recall_matches: usize,
    pub system_spans: usize,
    pub gold_spans: usize,
}

impl SpanEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_spans(&mut self, system: &[Span], gold: &[Span]) {
        self.exact_matches += exact_span_matches(system, gold);
        self.partial_precision_matches += partial_span_matches(system, gold);
        self.partial_recall_matches += partial_span_matches(gold, system);
        self.system_spans += system.len();
        self.gold_spans += gold.len();
    }

    pub fn merge(&mut self, other: &SpanEvaluator) {
        self.exact_matches += other.exact_matches;
        self.partial_precision_matches += other.partial_precision_matches;
        self.partial_recall_matches += other.partial_recall_matches;
        self.system_spans += other.system_spans;
        self.gold_spans += other.gold_spans;
    }

    pub fn exact_precision(&self) -> f64 {
        ratio(self.exact_matches, self.system_spans)
    }

    pub fn exact_recall(&self) -> f64 {
        ratio(self.exact_matches, self.gold_spans)
    }

    pub fn exact_prf(&self) -> [f64; 3] {
        let (p, r) = (self.exact_precision(), self.exact_recall());
        [p, r, f_measure(p, r)]
    }

    pub fn partial_precision(&self) -> f64 {
        ratio(self.partial_precision_matches, self.system_spans)
    }

    pub fn partial_recall(&self) -> f64 {
        ratio(self.partial_recall_matches, self.gold_spans)
    }

    pub fn partial_prf(&self) -> [f64; 3] {
        let (p, r) = (self.partial_precision(), self.partial_recall());
        [p, r, f_measure(p, r)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(id: &str, lines: &[usize]) -> Span {
        Span {
            id: id.to_string(),
            lines: lines.to_vec(),
        }
    }

    #[test]
    fn test_exact_matches_ignore_ids() {
        let system = vec![span("a", &[2, 3]), span("b", &[5])];
        let gold = vec![span("s1", &[2, 3]), span("s2", &[5, 6])];
        assert_eq!(exact_span_matches(&system, &gold), 1);
    }

    #[test]
    fn test_exact_matches_bounded_by_smaller_side() {
        let system = vec![span("a", &[1]), span("b", &[1]), span("c", &[3])];
        let gold = vec![span("x", &[1])];
        let n = exact_span_matches(&system, &gold);
        assert!(n <= system.len().min(gold.len()));
        assert_eq!(n, 1);
    }

    #[test]
    fn test_partial_matches_endpoint_containment() {
        let system = vec![span("a", &[2, 3, 4]), span("b", &[8, 9])];
        let gold = vec![span("x", &[4, 5]), span("y", &[1, 2])];
        // "a" starts inside y and ends inside x but counts once
        assert_eq!(partial_span_matches(&system, &gold), 1);
        assert_eq!(partial_span_matches(&gold, &system), 2);
    }

    #[test]
    fn test_containment_without_endpoint_overlap_is_missed() {
        let system = vec![span("a", &[1, 2, 3, 4, 5, 6])];
        let gold = vec![span("x", &[3, 4])];
        assert_eq!(partial_span_matches(&system, &gold), 0);
        assert_eq!(partial_span_matches(&gold, &system), 1);
    }

    #[test]
    fn test_prf_and_zero_spans() {
        let mut se = SpanEvaluator::new();
        assert_eq!(se.exact_prf(), [0.0, 0.0, 0.0]);
        assert_eq!(se.partial_prf(), [0.0, 0.0, 0.0]);

        let spans = vec![span("s1", &[2, 3]), span("s2", &[5])];
        se.add_spans(&spans, &spans);
        assert_eq!(se.exact_prf(), [1.0, 1.0, 1.0]);
        assert_eq!(se.partial_prf(), [1.0, 1.0, 1.0]);

        let mut total = SpanEvaluator::new();
        total.merge(&se);
        total.merge(&se);
        assert_eq!(total.system_spans, 4);
        assert_eq!(total.exact_matches, 4);
    }
}
