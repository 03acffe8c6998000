// Evaluation Report
// Serialisable batch figures and their tab/comma delimited text rendering

use serde::{Deserialize, Serialize};

use crate::models::OUTSIDE_LABEL;

use super::label_eval::LabelEvaluator;
use super::span_eval::SpanEvaluator;
use super::Evaluator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prf {
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

impl From<[f64; 3]> for Prf {
    fn from([precision, recall, f_measure]: [f64; 3]) -> Self {
        Self {
            precision,
            recall,
            f_measure,
        }
    }
}

impl Prf {
    fn render(&self, delimiter: &str) -> String {
        [self.precision, self.recall, self.f_measure]
            .iter()
            .map(|x| format!("{:.2}", x))
            .collect::<Vec<_>>()
            .join(delimiter)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanFigures {
    pub exact: Prf,
    pub partial: Prf,
}

impl From<&SpanEvaluator> for SpanFigures {
    fn from(se: &SpanEvaluator) -> Self {
        Self {
            exact: se.exact_prf().into(),
            partial: se.partial_prf().into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub labels: Vec<String>,
    pub confusion: LabelEvaluator,
    pub accuracy: f64,
    pub non_outside: Prf,
    pub spans: SpanFigures,
    pub auto_spans: SpanFigures,
}

impl EvaluationReport {
    pub fn from_evaluator(ev: &Evaluator) -> Self {
        Self {
            labels: ev.labels.labels(),
            confusion: ev.labels.clone(),
            accuracy: ev.labels.precision(&[]),
            non_outside: ev.labels.prf(&[OUTSIDE_LABEL]).into(),
            spans: SpanFigures::from(&ev.spans),
            auto_spans: SpanFigures::from(&ev.auto_spans),
        }
    }

    pub fn render(&self, delimiter: &str) -> String {
        let mut out = self.confusion.render_matrix(delimiter);
        out.push('\n');
        out.push_str("----- Labels -----\n");
        out.push_str(&format!("Classification Acc: {:.2}\n", self.accuracy));
        out.push_str(&format!("       Non-O P/R/F: {}\n\n", self.non_outside.render(delimiter)));
        out.push_str("----- Spans ------\n");
        render_spans(&mut out, &self.spans, delimiter);
        out.push_str("\n--- Auto-Spans ---\n");
        render_spans(&mut out, &self.auto_spans, delimiter);
        out
    }
}

fn render_spans(out: &mut String, figures: &SpanFigures, delimiter: &str) {
    out.push_str(&format!("  Exact-span P/R/F: {}\n", figures.exact.render(delimiter)));
    out.push_str(&format!("Partial-span P/R/F: {}\n", figures.partial.render(delimiter)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Evaluator {
        let mut ev = Evaluator::new();
        for (gold, guess) in [("O", "O"), ("B-G", "B-G"), ("I-G", "O"), ("B-T", "B-T")] {
            ev.labels.add_eval_pair(gold, guess);
        }
        ev.spans.exact_matches = 1;
        ev.spans.partial_precision_matches = 2;
        ev.spans.partial_recall_matches = 2;
        ev.spans.system_spans = 2;
        ev.spans.gold_spans = 2;
        ev
    }

    #[test]
    fn test_report_figures() {
        let report = sample().report();
        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.spans.exact, Prf { precision: 0.5, recall: 0.5, f_measure: 0.5 });
        assert_eq!(report.spans.partial.f_measure, 1.0);
        assert_eq!(report.auto_spans, SpanFigures::default());
    }

    #[test]
    fn test_render_sections() {
        let text = sample().report().render(",");
        assert!(text.starts_with(", COLS: Gold --- ROWS: Predicted\n"));
        assert!(text.contains("Classification Acc: 0.75\n"));
        assert!(text.contains("  Exact-span P/R/F: 0.50,0.50,0.50\n"));
        assert!(text.contains("\n--- Auto-Spans ---\n  Exact-span P/R/F: 0.00,0.00,0.00\n"));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let json = serde_json::to_value(sample().report()).unwrap();
        assert!(json.get("nonOutside").is_some());
        assert_eq!(json["autoSpans"]["partial"]["fMeasure"], 0.0);
        assert_eq!(json["confusion"]["O"]["O"], 1);
    }
}
