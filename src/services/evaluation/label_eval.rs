// Label Evaluator
// Growable gold -> guess confusion matrix with micro-averaged P/R/F

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Display priority for well-known labels; anything else sorts after these.
pub const LABEL_PRIORITY: [&str; 8] = ["O", "B", "I", "L", "L-T", "G", "T", "M"];

fn label_rank(label: &str) -> usize {
    LABEL_PRIORITY
        .iter()
        .position(|l| *l == label)
        .unwrap_or(LABEL_PRIORITY.len())
}

/// Priority order first, then natural string order.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    label_rank(a).cmp(&label_rank(b)).then_with(|| a.cmp(b))
}

pub fn f_measure(p: f64, r: f64) -> f64 {
    if p + r > 0.0 {
        2.0 * p * r / (p + r)
    } else {
        0.0
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelEvaluator {
    matrix: BTreeMap<String, BTreeMap<String, usize>>,
}

impl LabelEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_eval_pair(&mut self, gold: &str, guess: &str) {
        *self
            .matrix
            .entry(gold.to_string())
            .or_default()
            .entry(guess.to_string())
            .or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &LabelEvaluator) {
        for (gold, row) in &other.matrix {
            let target = self.matrix.entry(gold.clone()).or_default();
            for (guess, count) in row {
                *target.entry(guess.clone()).or_insert(0) += count;
            }
        }
    }

    pub fn count(&self, gold: &str, guess: &str) -> usize {
        self.matrix
            .get(gold)
            .and_then(|row| row.get(guess))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.matrix.values().flat_map(|row| row.values()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Every label seen as gold or guess, in display order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .matrix
            .iter()
            .flat_map(|(gold, row)| std::iter::once(gold).chain(row.keys()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        labels.sort_by(|a, b| compare_labels(a, b));
        labels
    }

    fn matches(&self, exclude: &[&str]) -> usize {
        self.matrix
            .keys()
            .filter(|l| !exclude.contains(&l.as_str()))
            .map(|l| self.count(l, l))
            .sum()
    }

    fn gold_total(&self, exclude: &[&str]) -> usize {
        self.matrix
            .iter()
            .filter(|(gold, _)| !exclude.contains(&gold.as_str()))
            .flat_map(|(_, row)| row.values())
            .sum()
    }

    fn guess_total(&self, exclude: &[&str]) -> usize {
        self.matrix
            .values()
            .flat_map(|row| row.iter())
            .filter(|(guess, _)| !exclude.contains(&guess.as_str()))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn precision(&self, exclude: &[&str]) -> f64 {
        ratio(self.matches(exclude), self.guess_total(exclude))
    }

    pub fn recall(&self, exclude: &[&str]) -> f64 {
        ratio(self.matches(exclude), self.gold_total(exclude))
    }

    pub fn f_measure(&self, exclude: &[&str]) -> f64 {
        f_measure(self.precision(exclude), self.recall(exclude))
    }

    pub fn prf(&self, exclude: &[&str]) -> [f64; 3] {
        [
            self.precision(exclude),
            self.recall(exclude),
            self.f_measure(exclude),
        ]
    }

    /// Per-label recall in display order.
    pub fn recalls(&self) -> Vec<f64> {
        self.labels()
            .iter()
            .map(|l| {
                let gold_sum: usize = self.matrix.get(l).map_or(0, |row| row.values().sum());
                ratio(self.count(l, l), gold_sum)
            })
            .collect()
    }

    /// Columns are gold labels, rows are guesses. Each row ends with that
    /// guess's precision; the last row holds per-gold recall.
    pub fn render_matrix(&self, delimiter: &str) -> String {
        let labels = self.labels();
        let mut out = format!("{} COLS: Gold --- ROWS: Predicted\n", delimiter);

        let header: Vec<String> = std::iter::once(String::new())
            .chain(labels.iter().map(|l| format!("{:<4}", l)))
            .collect();
        out.push_str(&header.join(delimiter));
        out.push('\n');

        for guess in &labels {
            let vals: Vec<usize> = labels.iter().map(|gold| self.count(gold, guess)).collect();
            let precision = ratio(self.count(guess, guess), vals.iter().sum());
            let row: Vec<String> = std::iter::once(guess.clone())
                .chain(vals.iter().map(|v| format!("{:>4}", v)))
                .chain(std::iter::once(format!("{:.2}", precision)))
                .collect();
            out.push_str(&row.join(delimiter));
            out.push('\n');
        }

        let recalls: Vec<String> = std::iter::once(String::new())
            .chain(self.recalls().iter().map(|r| format!("{:4.2}", r)))
            .collect();
        out.push_str(&recalls.join(delimiter));
        out.push('\n');
        out
    }
}
