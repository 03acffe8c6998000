// Evaluation Engine
// Per-document label and span comparison, merged into batch totals

pub mod label_eval;
pub mod report;
pub mod span_eval;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Document;
use crate::services::labels::{normalize_for_eval, LabelOptions};
use crate::services::spans::auto_spans;

pub use label_eval::LabelEvaluator;
pub use report::EvaluationReport;
pub use span_eval::SpanEvaluator;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("system document has {system} lines but gold has {gold}")]
    LineCountMismatch { system: usize, gold: usize },
    #[error("gold document has no line {0}")]
    MissingGoldLine(usize),
}

/// Label matrix plus span counts under annotated ids and under
/// label-only auto-spans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluator {
    pub labels: LabelEvaluator,
    pub spans: SpanEvaluator,
    pub auto_spans: SpanEvaluator,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &Evaluator) {
        self.labels.merge(&other.labels);
        self.spans.merge(&other.spans);
        self.auto_spans.merge(&other.auto_spans);
    }

    pub fn report(&self) -> EvaluationReport {
        EvaluationReport::from_evaluator(self)
    }
}

/// Compare one system document against its gold counterpart. Nothing is
/// counted when the documents do not line up.
pub fn evaluate_pair(
    system: &Document,
    gold: &Document,
    opts: &LabelOptions,
) -> Result<Evaluator, EvaluationError> {
    if system.len() != gold.len() {
        return Err(EvaluationError::LineCountMismatch {
            system: system.len(),
            gold: gold.len(),
        });
    }

    let mut ev = Evaluator::new();
    for line in system.lines() {
        let gold_line = gold
            .get_line(line.lineno)
            .ok_or(EvaluationError::MissingGoldLine(line.lineno))?;
        ev.labels.add_eval_pair(
            &normalize_for_eval(gold_line.tag(), opts),
            &normalize_for_eval(line.tag(), opts),
        );
    }

    ev.spans.add_spans(&system.spans(), &gold.spans());
    ev.auto_spans.add_spans(&auto_spans(system), &auto_spans(gold));
    Ok(ev)
}
