// Line Feature Assembler
// Evaluates the enabled feature registry per line, then folds in neighbours

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::models::{Document, FeatureVector, Line};
use crate::services::config_store::{FeatureSetConfig, IgtConfig, ThresholdConfig};
use crate::services::lexicon::Lexicon;
use crate::services::text_processor::split_words;

use super::layout::LayoutInput;
use super::statistics::DocumentStatistics;
use super::text::TextInput;
use super::{LayoutFeature, TextFeature, WORD_FEATURE_PREFIX};

pub const PREV_PREFIX: &str = "prev_";
pub const PREV_PREV_PREFIX: &str = "prev_prev_";
pub const NEXT_PREFIX: &str = "next_";

/// Builds per-line feature vectors from an explicit set of enabled features
/// and a shared, read-only lexicon.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    lexicon: Arc<Lexicon>,
    text_features: BTreeSet<TextFeature>,
    layout_features: BTreeSet<LayoutFeature>,
    context: FeatureSetConfig,
    thresholds: ThresholdConfig,
}

impl FeatureExtractor {
    pub fn new(lexicon: Arc<Lexicon>, config: &IgtConfig) -> Self {
        Self {
            lexicon,
            text_features: config.text_features.clone(),
            layout_features: config.layout_features.clone(),
            context: config.featuresets.clone(),
            thresholds: config.thresholds.clone(),
        }
    }

    pub fn with_features(
        mut self,
        text_features: impl IntoIterator<Item = TextFeature>,
        layout_features: impl IntoIterator<Item = LayoutFeature>,
    ) -> Self {
        self.text_features = text_features.into_iter().collect();
        self.layout_features = layout_features.into_iter().collect();
        self
    }

    pub fn with_context(mut self, context: FeatureSetConfig) -> Self {
        self.context = context;
        self
    }

    /// A line's own features, without any neighbour context.
    pub fn line_features(
        &self,
        line: &Line,
        doc: &Document,
        stats: Option<&DocumentStatistics>,
    ) -> FeatureVector {
        let mut feats = FeatureVector::new();

        if !self.text_features.is_empty() {
            let words = split_words(&line.text);
            let input = TextInput {
                text: &line.text,
                words: &words,
                lexicon: &self.lexicon,
                thresholds: &self.thresholds,
            };
            for feat in &self.text_features {
                match feat.predicate() {
                    Some(predicate) => feats.set(feat.name(), predicate(&input)),
                    None => {
                        for word in &words {
                            feats.set(format!("{}{}", WORD_FEATURE_PREFIX, word), true);
                        }
                    }
                }
            }
        }

        if !self.layout_features.is_empty() {
            let input = LayoutInput { line, doc, stats };
            for feat in &self.layout_features {
                feats.set(feat.name(), (feat.predicate())(&input));
            }
        }

        feats
    }

    /// Own features for every line, keyed by line number.
    pub fn own_features(&self, doc: &Document) -> BTreeMap<usize, FeatureVector> {
        let stats = (!self.layout_features.is_empty()).then(|| DocumentStatistics::compute(doc));
        doc.lines()
            .map(|line| (line.lineno, self.line_features(line, doc, stats.as_ref())))
            .collect()
    }

    /// Final per-line vectors with neighbour context folded in.
    pub fn document_features(&self, doc: &Document) -> BTreeMap<usize, FeatureVector> {
        let own = self.own_features(doc);
        let combined: BTreeMap<usize, FeatureVector> = own
            .keys()
            .map(|&lineno| (lineno, combine_line_features(&own, lineno, &self.context)))
            .collect();
        debug!(
            "[FEATURES] doc={} lines={} features={}",
            doc.doc_id,
            combined.len(),
            combined.values().map(FeatureVector::len).sum::<usize>()
        );
        combined
    }
}

/// Union of a line's own features and, as configured, its neighbours'
/// features under `prev_`, `prev_prev_` and `next_` prefixes. Missing
/// neighbours contribute nothing.
pub fn combine_line_features(
    own: &BTreeMap<usize, FeatureVector>,
    lineno: usize,
    context: &FeatureSetConfig,
) -> FeatureVector {
    let mut feats = own.get(&lineno).cloned().unwrap_or_default();
    let mut fold = |neighbour: Option<usize>, prefix: &str| {
        if let Some(other) = neighbour.and_then(|n| own.get(&n)) {
            feats.extend_prefixed(other, prefix);
        }
    };

    if context.use_prev_line {
        fold(lineno.checked_sub(1), PREV_PREFIX);
    }
    if context.use_prev_prev_line {
        fold(lineno.checked_sub(2), PREV_PREV_PREFIX);
    }
    if context.use_next_line {
        fold(lineno.checked_add(1), NEXT_PREFIX);
    }
    feats
}
