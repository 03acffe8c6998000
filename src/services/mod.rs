// IGTDetect Core Services

pub mod text_processor;
pub mod config_store;
pub mod lexicon;
pub mod features;
pub mod labels;
pub mod spans;
pub mod evaluation;
pub mod vector_file;
pub mod classifier;
pub mod document_io;
pub mod pipeline;

pub use config_store::*;
pub use text_processor::*;

pub use classifier::{best_label, Classifier, ClassifierError, ClassifierInfo, CommandClassifier, Distribution};
pub use document_io::{parse_document, read_document, write_document};
pub use evaluation::{evaluate_pair, EvaluationError, EvaluationReport, Evaluator};
pub use features::{FeatureExtractor, LayoutFeature, TextFeature};
pub use labels::{line_label, normalize_label, LabelOptions};
pub use lexicon::{Lexicon, LexiconError};
pub use pipeline::{expand_inputs, Pipeline, PipelineError};
pub use spans::{assign_spans, auto_spans};
