// Classifier Service
// External sequence classifier driven over stdin/stdout, plus weight inspection
//
// Protocol of the external program:
//   <program> [args] train <model> [--max-features N]   stdin: vector file lines
//   <program> [args] classify <model>                    stdin: vector file lines
//   <program> [args] weights <model>                     no stdin
// `classify` prints one line per instance: `label score label score ...`.
// `weights` prints `feature<TAB>label<TAB>weight` lines.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::models::LabeledInstance;
use crate::services::config_store::RuntimeConfig;
use crate::services::evaluation::label_eval::compare_labels;
use crate::services::text_processor::preview;
use crate::services::vector_file::format_instance;

/// Bias rows in a weight listing.
pub const DEFAULT_FEATURE: &str = "<default>";

/// Default number of features shown by [`ClassifierInfo::render`].
pub const DEFAULT_WEIGHT_LIMIT: usize = 30;

/// Per-label scores for one instance, in the order the classifier gave them.
pub type Distribution = Vec<(String, f64)>;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to start classifier {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("classifier I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("classifier exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("malformed classifier output at line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("classifier returned {got} results for {expected} instances")]
    CountMismatch { expected: usize, got: usize },
}

/// The black-box learner. Training is one call per batch; classification
/// returns one distribution per submitted instance.
pub trait Classifier: Send + Sync {
    fn train(
        &self,
        model: &Path,
        instances: &[LabeledInstance],
        max_features: Option<usize>,
    ) -> impl Future<Output = Result<(), ClassifierError>> + Send;

    fn classify(
        &self,
        model: &Path,
        instances: &[LabeledInstance],
    ) -> impl Future<Output = Result<Vec<Distribution>, ClassifierError>> + Send;

    /// Feature weights of a trained model, when the learner exposes them.
    fn weights(
        &self,
        _model: &Path,
    ) -> impl Future<Output = Result<Option<ClassifierInfo>, ClassifierError>> + Send {
        async { Ok(None) }
    }
}

/// Highest-scoring label; ties go to the first occurrence.
pub fn best_label(distribution: &[(String, f64)]) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;
    for (label, score) in distribution {
        if best.map_or(true, |(_, top)| *score > top) {
            best = Some((label.as_str(), *score));
        }
    }
    best.map(|(label, _)| label)
}

/// Parse `label score label score ...` lines, skipping blank lines.
pub fn parse_distributions(output: &str) -> Result<Vec<Distribution>, ClassifierError> {
    let mut distributions = Vec::new();
    for (idx, line) in output.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() % 2 != 0 {
            return Err(ClassifierError::Malformed {
                line: idx + 1,
                message: format!("odd number of fields in \"{}\"", preview(line, 60)),
            });
        }
        let mut dist = Distribution::with_capacity(tokens.len() / 2);
        for pair in tokens.chunks(2) {
            let score: f64 = pair[1].parse().map_err(|_| ClassifierError::Malformed {
                line: idx + 1,
                message: format!("score \"{}\" for label {} is not a number", pair[1], pair[0]),
            })?;
            dist.push((pair[0].to_string(), score));
        }
        distributions.push(dist);
    }
    Ok(distributions)
}

/// Runs an external classifier program per call.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(runtime: &RuntimeConfig) -> Self {
        Self::new(runtime.classifier_program.clone(), runtime.classifier_args.clone())
    }

    async fn run(
        &self,
        subcommand: &str,
        model: &Path,
        extra: &[String],
        input: Option<String>,
    ) -> Result<String, ClassifierError> {
        let started = Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(subcommand)
            .arg(model)
            .args(extra)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ClassifierError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Feed stdin concurrently so a chatty child cannot block on a full pipe.
        let writer = match (child.stdin.take(), input) {
            (Some(mut stdin), Some(input)) => Some(tokio::spawn(async move {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await
            })),
            _ => None,
        };

        let output = child.wait_with_output().await?;
        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("[CLASSIFIER] stdin write failed: {}", e),
                Err(e) => warn!("[CLASSIFIER] stdin writer task failed: {}", e),
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClassifierError::Failed {
                status: output.status.to_string(),
                stderr: preview(stderr.trim(), 500),
            });
        }

        debug!(
            "[CLASSIFIER] {} {} finished in {}ms",
            subcommand,
            model.display(),
            started.elapsed().as_millis()
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn vector_input(instances: &[LabeledInstance]) -> String {
    let mut input = String::new();
    for instance in instances {
        input.push_str(&format_instance(instance));
        input.push('\n');
    }
    input
}

impl Classifier for CommandClassifier {
    async fn train(
        &self,
        model: &Path,
        instances: &[LabeledInstance],
        max_features: Option<usize>,
    ) -> Result<(), ClassifierError> {
        let extra: Vec<String> = match max_features {
            Some(n) => vec!["--max-features".to_string(), n.to_string()],
            None => Vec::new(),
        };
        info!(
            "[CLASSIFIER] training {} on {} instances",
            model.display(),
            instances.len()
        );
        self.run("train", model, &extra, Some(vector_input(instances)))
            .await
            .map(|_| ())
    }

    async fn classify(
        &self,
        model: &Path,
        instances: &[LabeledInstance],
    ) -> Result<Vec<Distribution>, ClassifierError> {
        let stdout = self
            .run("classify", model, &[], Some(vector_input(instances)))
            .await?;
        let distributions = parse_distributions(&stdout)?;
        if distributions.len() != instances.len() {
            return Err(ClassifierError::CountMismatch {
                expected: instances.len(),
                got: distributions.len(),
            });
        }
        Ok(distributions)
    }

    async fn weights(&self, model: &Path) -> Result<Option<ClassifierInfo>, ClassifierError> {
        let stdout = self.run("weights", model, &[], None).await?;
        ClassifierInfo::parse(&stdout).map(Some)
    }
}

// ============ Weight inspection ============

/// Feature -> label -> weight table of a trained model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierInfo {
    weights: BTreeMap<String, BTreeMap<String, f64>>,
    labels: BTreeSet<String>,
}

impl ClassifierInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feat(&mut self, label: &str, feat: &str, weight: f64) {
        self.weights
            .entry(feat.to_string())
            .or_default()
            .insert(label.to_string(), weight);
        self.labels.insert(label.to_string());
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.iter().map(|s| s.as_str())
    }

    pub fn weight(&self, feat: &str, label: &str) -> Option<f64> {
        self.weights.get(feat).and_then(|row| row.get(label)).copied()
    }

    /// Parse a `feature<TAB>label<TAB>weight` listing.
    pub fn parse(content: &str) -> Result<Self, ClassifierError> {
        let mut info = Self::new();
        for (idx, line) in content.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [] => continue,
                [feat, label, weight] => {
                    let weight: f64 = weight.parse().map_err(|_| ClassifierError::Malformed {
                        line: idx + 1,
                        message: format!("weight \"{}\" is not a number", weight),
                    })?;
                    info.add_feat(label, feat, weight);
                }
                _ => {
                    return Err(ClassifierError::Malformed {
                        line: idx + 1,
                        message: format!("expected 3 fields, got {}", fields.len()),
                    })
                }
            }
        }
        Ok(info)
    }

    /// Bias rows first (by label priority), then the `limit` heaviest
    /// features by absolute weight. `None` shows every feature.
    pub fn render(&self, limit: Option<usize>) -> String {
        let mut defaults: Vec<(&str, &str, f64)> = Vec::new();
        let mut vals: Vec<(&str, &str, f64)> = Vec::new();
        for (feat, row) in &self.weights {
            for (label, weight) in row {
                let entry = (feat.as_str(), label.as_str(), *weight);
                if feat == DEFAULT_FEATURE {
                    defaults.push(entry);
                } else {
                    vals.push(entry);
                }
            }
        }
        defaults.sort_by(|a, b| compare_labels(a.1, b.1));
        vals.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
        vals.truncate(limit.unwrap_or(vals.len()));

        let feat_width = vals
            .iter()
            .chain(defaults.iter())
            .map(|v| v.0.chars().count())
            .chain(std::iter::once("feature".len()))
            .max()
            .unwrap_or(0);
        let label_width = vals
            .iter()
            .chain(defaults.iter())
            .map(|v| v.1.chars().count())
            .chain(std::iter::once(5))
            .max()
            .unwrap_or(5);

        let row = |feat: &str, label: &str, weight: &str| {
            format!("{:<fw$}\t{:<lw$}\t{}\n", feat, label, weight, fw = feat_width, lw = label_width)
        };
        let separator = format!("{}\n", "-".repeat(feat_width + label_width + 10));

        let mut out = row("feature", "label", "weight");
        out.push_str(&separator);
        for &(feat, label, weight) in &defaults {
            out.push_str(&row(feat, label, &format!("{:.6}", weight)));
        }
        out.push_str(&separator);
        for &(feat, label, weight) in &vals {
            out.push_str(&row(feat, label, &format!("{:.6}", weight)));
        }
        out
    }
}
