// Pipeline Service
// Batch workflows: feature extraction, training, classification, evaluation
// Per-document work fans out over spawn_blocking tasks bounded by a semaphore;
// evaluation results meet in one mutex-guarded accumulator.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::models::{
    is_outside, Document, DocumentError, LabeledInstance, OUTSIDE_LABEL,
};
use crate::services::classifier::{
    best_label, Classifier, ClassifierError, Distribution, DEFAULT_WEIGHT_LIMIT,
};
use crate::services::config_store::IgtConfig;
use crate::services::document_io::{read_document, write_document};
use crate::services::evaluation::{evaluate_pair, EvaluationReport, Evaluator};
use crate::services::features::{FeatureExtractor, TextFeature};
use crate::services::labels::{line_label, normalize_label, strip_bio, LabelOptions};
use crate::services::lexicon::{Lexicon, LexiconError};
use crate::services::spans::assign_spans;
use crate::services::vector_file::{read_vector_file, write_vector_file, VectorFileError};

pub const FEATS_SUFFIX: &str = "_feats.txt";
pub const CLASSIFIED_SUFFIX: &str = "_classified.txt";
pub const DETECTED_SUFFIX: &str = "_detected.txt";
pub const RAW_CLASSIFICATIONS_DIR: &str = "raw_classifications";
pub const RAW_CLASSIFICATIONS_SUFFIX: &str = "_classifications.txt";
pub const WEIGHTS_SUFFIX: &str = "_weights.txt";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no gold directory configured")]
    GoldDirUnset,
    #[error("the gold file directory \"{0}\" is missing or is unavailable")]
    GoldDirMissing(PathBuf),
    #[error("the gold file directory \"{0}\" appears to be a file, not a directory")]
    GoldDirNotDir(PathBuf),
    #[error("no input files were found")]
    NoFiles,
    #[error("no training instances were extracted")]
    NoInstances,
    #[error("classifier model \"{0}\" already exists (use --overwrite-model to replace it)")]
    ModelExists(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Lexicon(#[from] LexiconError),
    #[error(transparent)]
    VectorFile(#[from] VectorFileError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("worker pool closed")]
    PoolClosed,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ============ Paths ============

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn renamed(dir: &Path, path: &Path, suffix: &str) -> PathBuf {
    dir.join(format!("{}{}", file_stem(path), suffix))
}

pub fn feat_path(feat_dir: &Path, path: &Path) -> PathBuf {
    renamed(feat_dir, path, FEATS_SUFFIX)
}

pub fn classified_path(classified_dir: &Path, path: &Path) -> PathBuf {
    renamed(classified_dir, path, CLASSIFIED_SUFFIX)
}

pub fn detected_path(detected_dir: &Path, path: &Path) -> PathBuf {
    renamed(detected_dir, path, DETECTED_SUFFIX)
}

pub fn raw_classification_path(debug_dir: &Path, path: &Path) -> PathBuf {
    renamed(&debug_dir.join(RAW_CLASSIFICATIONS_DIR), path, RAW_CLASSIFICATIONS_SUFFIX)
}

/// `<stem>_classified.txt` is scored against `<gold_dir>/<stem>.txt`.
pub fn gold_for_classified(gold_dir: &Path, path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    gold_dir.join(name.replace(CLASSIFIED_SUFFIX, ".txt"))
}

/// Files stay as given; directories expand to their files, sorted.
/// Missing inputs are skipped with a warning.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(input)
                .map_err(io_err(input))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            files.extend(entries);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            warn!("[PIPELINE] input \"{}\" does not exist, skipping", input.display());
        }
    }
    if files.is_empty() {
        return Err(PipelineError::NoFiles);
    }
    Ok(files)
}

// ============ Feature extraction ============

/// A document with one instance per line, in line order.
#[derive(Debug, Clone)]
pub struct FeatureAnalysis {
    pub path: PathBuf,
    pub doc: Document,
    pub instances: Vec<LabeledInstance>,
}

/// Features for one document, reusing `<feat_dir>/<stem>_feats.txt` unless
/// `overwrite` is set. Every line gets an instance; noisy lines are
/// filtered later, when training data is assembled.
pub fn extract_feats_for_path(
    path: &Path,
    extractor: &FeatureExtractor,
    config: &IgtConfig,
    overwrite: bool,
) -> Result<FeatureAnalysis, PipelineError> {
    let doc = read_document(path)?;
    let cache = feat_path(&config.paths.feat_dir, path);

    if cache.exists() && !overwrite {
        warn!(
            "[PIPELINE] \"{}\" already generated, not regenerating (use -f to force)",
            cache.display()
        );
        let instances = read_vector_file(&cache)?;
        if instances.len() == doc.len() {
            return Ok(FeatureAnalysis {
                path: path.to_path_buf(),
                doc,
                instances,
            });
        }
        warn!(
            "[PIPELINE] \"{}\" has {} instances for {} lines, regenerating",
            cache.display(),
            instances.len(),
            doc.len()
        );
    }

    info!(
        "[PIPELINE] extracting features for \"{}\" into \"{}\"",
        path.display(),
        cache.display()
    );
    let opts = LabelOptions::from_config(&config.labels, false);
    let mut feats = extractor.document_features(&doc);
    let instances: Vec<LabeledInstance> = doc
        .lines()
        .map(|line| {
            let label = line_label(&doc, line, &opts).unwrap_or_else(|| OUTSIDE_LABEL.to_string());
            LabeledInstance::new(label, feats.remove(&line.lineno).unwrap_or_default())
        })
        .collect();
    write_vector_file(&cache, &instances)?;

    Ok(FeatureAnalysis {
        path: path.to_path_buf(),
        doc,
        instances,
    })
}

/// Training rows: noisy lines dropped, BI prefixes removed unless enabled.
pub fn training_instances(analyses: &[FeatureAnalysis], config: &IgtConfig) -> Vec<LabeledInstance> {
    let opts = LabelOptions::from_config(&config.labels, true);
    let mut data = Vec::new();
    for analysis in analyses {
        for (line, instance) in analysis.doc.lines().zip(&analysis.instances) {
            if normalize_label(line.tag(), &opts).is_none() {
                continue;
            }
            let mut instance = instance.clone();
            if !opts.use_bi_labels {
                instance.label = strip_bio(&instance.label).to_string();
            }
            data.push(instance);
        }
    }
    data
}

// ============ Classification output ============

/// Rewrite every line's label with the best guess (BIO prefix removed),
/// then rebuild spans from the new labels.
pub fn apply_classifications(doc: &mut Document, distributions: &[Distribution]) {
    let linenos: Vec<usize> = doc.lines().map(|l| l.lineno).collect();
    for (lineno, dist) in linenos.into_iter().zip(distributions) {
        let label = best_label(dist).map(strip_bio).unwrap_or(OUTSIDE_LABEL);
        doc.set_label(lineno, label);
    }
    assign_spans(doc);
}

/// Contiguous non-outside runs, one `{label:<8}{text}` row per line and a
/// blank line after each run. Empty when nothing was detected.
pub fn render_detected(doc: &Document) -> String {
    let mut out = String::new();
    let mut run: Vec<String> = Vec::new();
    for line in doc.lines() {
        if is_outside(line.tag()) {
            flush_run(&mut run, &mut out);
        } else {
            run.push(format!("{:<8}{}", line.tag(), line.text));
        }
    }
    flush_run(&mut run, &mut out);
    out
}

fn flush_run(run: &mut Vec<String>, out: &mut String) {
    if !run.is_empty() {
        out.push_str(&run.join("\n"));
        out.push_str("\n\n");
        run.clear();
    }
}

pub fn render_raw_classifications(doc: &Document, distributions: &[Distribution]) -> String {
    let mut out = String::new();
    for (line, dist) in doc.lines().zip(distributions) {
        out.push_str(&format!("{}:", line.lineno));
        for (label, score) in dist {
            out.push_str(&format!("\t{}  {:.3e}", label, score));
        }
        out.push('\n');
    }
    out
}

fn write_text(path: &Path, content: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, content).map_err(io_err(path))
}

// ============ Pipeline ============

pub struct Pipeline<C> {
    config: Arc<IgtConfig>,
    extractor: Arc<FeatureExtractor>,
    classifier: C,
}

impl<C: Classifier> Pipeline<C> {
    pub fn new(config: IgtConfig, lexicon: Lexicon, classifier: C) -> Self {
        let extractor = FeatureExtractor::new(Arc::new(lexicon), &config);
        Self {
            config: Arc::new(config),
            extractor: Arc::new(extractor),
            classifier,
        }
    }

    /// Loads the lexicon named by the configuration. The language-name list
    /// is mandatory only when `has_langname` is enabled.
    pub fn from_config(config: IgtConfig, classifier: C) -> Result<Self, PipelineError> {
        let need_langnames = config.text_features.contains(&TextFeature::HasLangname);
        let lexicon = Lexicon::load(&config.files, need_langnames)?;
        Ok(Self::new(config, lexicon, classifier))
    }

    pub fn config(&self) -> &IgtConfig {
        &self.config
    }

    fn semaphore(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.config.runtime.max_concurrency.max(1)))
    }

    /// Features for every file, in input order. Documents that fail to load
    /// are logged and left out.
    pub async fn extract_feats(
        &self,
        files: &[PathBuf],
        overwrite: bool,
    ) -> Result<Vec<FeatureAnalysis>, PipelineError> {
        let started = Instant::now();
        let semaphore = self.semaphore();
        let mut join_set: JoinSet<(usize, PathBuf, Result<FeatureAnalysis, PipelineError>)> =
            JoinSet::new();

        for (idx, path) in files.iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::PoolClosed)?;
            let extractor = self.extractor.clone();
            let config = self.config.clone();
            let path = path.clone();
            join_set.spawn_blocking(move || {
                let _permit = permit;
                let result = extract_feats_for_path(&path, &extractor, &config, overwrite);
                (idx, path, result)
            });
        }

        let mut analyses: Vec<(usize, FeatureAnalysis)> = Vec::with_capacity(files.len());
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((idx, _, Ok(analysis))) => analyses.push((idx, analysis)),
                Ok((_, path, Err(e))) => {
                    error!("[PIPELINE] feature extraction failed for \"{}\": {}", path.display(), e)
                }
                Err(e) => error!("[PIPELINE] feature extraction task failed: {}", e),
            }
        }

        analyses.sort_by_key(|(idx, _)| *idx);
        info!(
            "[PIPELINE] extracted features for {}/{} files in {}ms",
            analyses.len(),
            files.len(),
            started.elapsed().as_millis()
        );
        Ok(analyses.into_iter().map(|(_, a)| a).collect())
    }

    /// Train one model over all files. An existing model is kept unless
    /// `overwrite_model` is set.
    pub async fn train(
        &self,
        files: &[PathBuf],
        overwrite_feats: bool,
        overwrite_model: bool,
        max_features: Option<usize>,
    ) -> Result<(), PipelineError> {
        let model = &self.config.paths.classifier_path;
        if model.exists() && !overwrite_model {
            return Err(PipelineError::ModelExists(model.clone()));
        }

        let analyses = self.extract_feats(files, overwrite_feats).await?;
        let data = training_instances(&analyses, &self.config);
        if data.is_empty() {
            return Err(PipelineError::NoInstances);
        }

        if let Some(parent) = model.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let started = Instant::now();
        self.classifier.train(model, &data, max_features).await?;
        info!(
            "[PIPELINE] training finished in {:.2} seconds ({} instances)",
            started.elapsed().as_secs_f64(),
            data.len()
        );
        info!("[PIPELINE] classifier written to \"{}\"", model.display());

        if self.config.runtime.debug_on {
            match self.classifier.weights(model).await {
                Ok(Some(weights)) => {
                    let path = renamed(&self.config.paths.debug_dir, model, WEIGHTS_SUFFIX);
                    write_text(&path, &weights.render(Some(DEFAULT_WEIGHT_LIMIT)))?;
                    info!("[PIPELINE] feature weights written to \"{}\"", path.display());
                }
                Ok(None) => debug!("[PIPELINE] classifier exposes no feature weights"),
                Err(e) => warn!("[PIPELINE] could not read feature weights: {}", e),
            }
        }
        Ok(())
    }

    /// Label every file with the trained model and write the classified
    /// documents. Returns the classified paths that were written.
    pub async fn classify_docs(
        &self,
        files: &[PathBuf],
        overwrite_feats: bool,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let analyses = self.extract_feats(files, overwrite_feats).await?;
        if analyses.is_empty() {
            return Err(PipelineError::NoFiles);
        }

        let model = &self.config.paths.classifier_path;
        let paths = &self.config.paths;
        let mut written = Vec::new();

        for FeatureAnalysis { path, mut doc, instances } in analyses {
            if instances.is_empty() {
                continue;
            }

            let distributions = match self.classifier.classify(model, &instances).await {
                Ok(d) => d,
                Err(ClassifierError::CountMismatch { expected, got }) => {
                    error!(
                        "[PIPELINE] the number of lines ({}) does not match the number of classifications ({}); skipping \"{}\"",
                        expected,
                        got,
                        path.display()
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if distributions.len() != instances.len() {
                error!(
                    "[PIPELINE] the number of lines ({}) does not match the number of classifications ({}); skipping \"{}\"",
                    instances.len(),
                    distributions.len(),
                    path.display()
                );
                continue;
            }

            if self.config.runtime.debug_on {
                let raw = raw_classification_path(&paths.debug_dir, &path);
                info!("[PIPELINE] writing raw classifications to \"{}\"", raw.display());
                write_text(&raw, &render_raw_classifications(&doc, &distributions))?;
            }

            apply_classifications(&mut doc, &distributions);

            let out = classified_path(&paths.classified_dir, &path);
            write_document(&out, &doc)?;
            info!("[PIPELINE] classified \"{}\" -> \"{}\"", path.display(), out.display());
            written.push(out);

            if let Some(detected_dir) = &paths.detected_dir {
                let detected = detected_path(detected_dir, &path);
                let content = render_detected(&doc);
                if content.is_empty() {
                    if detected.exists() {
                        fs::remove_file(&detected).map_err(io_err(&detected))?;
                    }
                } else {
                    write_text(&detected, &content)?;
                }
            }
        }
        Ok(written)
    }

    /// Score classified files against their gold counterparts.
    pub async fn eval_files(&self, files: &[PathBuf]) -> Result<EvaluationReport, PipelineError> {
        let gold_dir = self
            .config
            .paths
            .gold_dir
            .clone()
            .ok_or(PipelineError::GoldDirUnset)?;
        if !gold_dir.exists() {
            error!("[PIPELINE] the gold file directory \"{}\" is missing or is unavailable", gold_dir.display());
            return Err(PipelineError::GoldDirMissing(gold_dir));
        }
        if !gold_dir.is_dir() {
            error!("[PIPELINE] the gold file directory \"{}\" appears to be a file", gold_dir.display());
            return Err(PipelineError::GoldDirNotDir(gold_dir));
        }

        let total = Arc::new(Mutex::new(Evaluator::new()));
        let semaphore = self.semaphore();
        let mut join_set: JoinSet<()> = JoinSet::new();
        let opts = LabelOptions::from_config(&self.config.labels, false);

        for eval_path in files {
            let gold_path = gold_for_classified(&gold_dir, eval_path);
            if !gold_path.exists() {
                warn!(
                    "[PIPELINE] no corresponding gold file was found for the evaluation file \"{}\"",
                    eval_path.display()
                );
                continue;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::PoolClosed)?;
            let total = total.clone();
            let eval_path = eval_path.clone();
            join_set.spawn_blocking(move || {
                let _permit = permit;
                let Some(ev) = eval_file(&eval_path, &gold_path, &opts) else {
                    return;
                };
                let mut total = match total.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                total.merge(&ev);
            });
        }

        while let Some(res) = join_set.join_next().await {
            if let Err(e) = res {
                error!("[PIPELINE] evaluation task failed: {}", e);
            }
        }

        let report = match total.lock() {
            Ok(guard) => guard.report(),
            Err(poisoned) => poisoned.into_inner().report(),
        };
        Ok(report)
    }
}

/// One system/gold pair. Problems are logged and yield `None`.
fn eval_file(eval_path: &Path, gold_path: &Path, opts: &LabelOptions) -> Option<Evaluator> {
    let load = |path: &Path| match read_document(path) {
        Ok(doc) => Some(doc),
        Err(e) => {
            error!("[PIPELINE] could not read \"{}\": {}", path.display(), e);
            None
        }
    };
    let system = load(eval_path)?;
    let gold = load(gold_path)?;

    match evaluate_pair(&system, &gold, opts) {
        Ok(ev) => Some(ev),
        Err(e) => {
            error!(
                "[PIPELINE] the evaluation file \"{}\" and the gold file \"{}\" do not line up ({}); evaluation skipped",
                eval_path.display(),
                gold_path.display(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::ClassifierInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GOLD_DOC: &str = "\
doc_id=paper page=1 block_id=1-1 llx=72.0
line=1 tag=O span_id= fonts=Times-10.0:As shown in (Smith, 1998), verbs agree.
line=2 tag=O span_id= fonts=Times-10.0:

doc_id=paper page=1 block_id=1-2 llx=90.0
line=3 tag=L span_id=s1 fonts=Times-10.0:(1) mtoto a-li-anguka
line=4 tag=G span_id=s1 fonts=Times-Italic-9.0:child 3SG-PST-fall
line=5 tag=*T span_id=s1 fonts=Times-10.0:'The child fell.'
line=6 tag=O span_id= fonts=Times-10.0:This pattern recurs.
";

    /// Echoes each instance's own label back with high confidence.
    #[derive(Default)]
    struct EchoClassifier {
        trained: AtomicUsize,
        drop_one: bool,
    }

    impl Classifier for EchoClassifier {
        async fn train(
            &self,
            model: &Path,
            instances: &[LabeledInstance],
            _max_features: Option<usize>,
        ) -> Result<(), ClassifierError> {
            self.trained.store(instances.len(), Ordering::SeqCst);
            fs::write(model, "model").map_err(ClassifierError::Io)
        }

        async fn classify(
            &self,
            _model: &Path,
            instances: &[LabeledInstance],
        ) -> Result<Vec<Distribution>, ClassifierError> {
            let mut out: Vec<Distribution> = instances
                .iter()
                .map(|i| vec![("O".to_string(), 0.1), (i.label.clone(), 0.9)])
                .collect();
            if self.drop_one {
                out.pop();
            }
            Ok(out)
        }

        async fn weights(&self, _model: &Path) -> Result<Option<ClassifierInfo>, ClassifierError> {
            ClassifierInfo::parse("<default>\tO\t0.5\nhas_grams\tG\t1.5\n").map(Some)
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        config: IgtConfig,
        input: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let gold_dir = root.join("gold");
        fs::create_dir_all(&gold_dir).unwrap();
        fs::write(gold_dir.join("paper.txt"), GOLD_DOC).unwrap();

        let mut config = IgtConfig::default();
        config.paths.feat_dir = root.join("feats");
        config.paths.gold_dir = Some(gold_dir.clone());
        config.paths.classified_dir = root.join("classified");
        config.paths.detected_dir = Some(root.join("detected"));
        config.paths.debug_dir = root.join("debug");
        config.paths.classifier_path = root.join("model").join("igt.classifier");
        config.runtime.max_concurrency = 2;

        Fixture {
            input: gold_dir.join("paper.txt"),
            dir,
            config,
        }
    }

    #[test]
    fn test_path_helpers() {
        let p = Path::new("/data/in/paper.txt");
        assert_eq!(feat_path(Path::new("feats"), p), PathBuf::from("feats/paper_feats.txt"));
        assert_eq!(
            raw_classification_path(Path::new("debug"), p),
            PathBuf::from("debug/raw_classifications/paper_classifications.txt")
        );
        assert_eq!(
            gold_for_classified(Path::new("gold"), Path::new("out/paper_classified.txt")),
            PathBuf::from("gold/paper.txt")
        );
    }

    #[test]
    fn test_expand_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        let files = expand_inputs(&[dir.path().to_path_buf(), dir.path().join("missing.txt")]).unwrap();
        assert_eq!(files, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);
        assert!(matches!(
            expand_inputs(&[dir.path().join("missing.txt")]),
            Err(PipelineError::NoFiles)
        ));
    }

    #[test]
    fn test_render_detected_runs() {
        let mut doc = crate::services::document_io::parse_document(GOLD_DOC, "paper").unwrap();
        doc.set_label(5, "T");
        let detected = render_detected(&doc);
        assert_eq!(
            detected,
            "L       (1) mtoto a-li-anguka\nG       child 3SG-PST-fall\nT       'The child fell.'\n\n"
        );
        for n in 3..=5 {
            doc.set_label(n, "O");
        }
        assert!(render_detected(&doc).is_empty());
    }

    #[test]
    fn test_apply_classifications_strips_bio_and_respans() {
        let mut doc = crate::services::document_io::parse_document(GOLD_DOC, "paper").unwrap();
        let dists: Vec<Distribution> = ["O", "B-L", "I-G", "O", "O", "B-T"]
            .iter()
            .map(|l| vec![(l.to_string(), 1.0)])
            .collect();
        apply_classifications(&mut doc, &dists);
        let tags: Vec<&str> = doc.lines().map(|l| l.tag()).collect();
        assert_eq!(tags, vec!["O", "L", "G", "O", "O", "T"]);
        let spans: Vec<Vec<usize>> = doc.spans().into_iter().map(|s| s.lines).collect();
        assert_eq!(spans, vec![vec![2, 3], vec![6]]);
    }

    #[tokio::test]
    async fn test_feature_cache_is_reused_unless_overwritten() {
        let fx = fixture();
        let pipeline = Pipeline::new(fx.config.clone(), Lexicon::default(), EchoClassifier::default());
        let first = pipeline.extract_feats(&[fx.input.clone()], false).await.unwrap();
        assert_eq!(first[0].instances.len(), 6);
        assert_eq!(first[0].instances[2].label, "B-L");
        assert_eq!(first[0].instances[3].label, "I-G");

        let cache = feat_path(&fx.config.paths.feat_dir, &fx.input);
        let marked: Vec<LabeledInstance> = first[0]
            .instances
            .iter()
            .map(|i| {
                let mut feats = i.features.clone();
                feats.set("cached_marker", true);
                LabeledInstance::new(i.label.clone(), feats)
            })
            .collect();
        write_vector_file(&cache, &marked).unwrap();

        let reused = pipeline.extract_feats(&[fx.input.clone()], false).await.unwrap();
        assert!(reused[0].instances[0].features.contains("cached_marker"));
        let fresh = pipeline.extract_feats(&[fx.input.clone()], true).await.unwrap();
        assert!(!fresh[0].instances[0].features.contains("cached_marker"));
    }

    #[tokio::test]
    async fn test_train_test_eval_round_trip() {
        let mut fx = fixture();
        fx.config.runtime.debug_on = true;
        let pipeline = Pipeline::new(fx.config.clone(), Lexicon::default(), EchoClassifier::default());
        let files = vec![fx.input.clone()];

        pipeline.train(&files, false, false, None).await.unwrap();
        // the noisy translation line is left out of training data
        assert_eq!(pipeline.classifier.trained.load(Ordering::SeqCst), 5);
        assert!(fx.dir.path().join("debug").join("igt_weights.txt").exists());
        assert!(matches!(
            pipeline.train(&files, false, false, None).await,
            Err(PipelineError::ModelExists(_))
        ));

        let classified = pipeline.classify_docs(&files, false).await.unwrap();
        assert_eq!(classified, vec![fx.dir.path().join("classified").join("paper_classified.txt")]);
        assert!(fx.dir.path().join("detected").join("paper_detected.txt").exists());
        assert!(fx
            .dir
            .path()
            .join("debug/raw_classifications/paper_classifications.txt")
            .exists());

        let report = pipeline.eval_files(&classified).await.unwrap();
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.spans.exact.f_measure, 1.0);
        assert_eq!(report.auto_spans.exact.precision, 1.0);
    }

    #[tokio::test]
    async fn test_count_mismatch_skips_document() {
        let fx = fixture();
        let classifier = EchoClassifier {
            drop_one: true,
            ..EchoClassifier::default()
        };
        let pipeline = Pipeline::new(fx.config.clone(), Lexicon::default(), classifier);
        let written = pipeline.classify_docs(&[fx.input.clone()], false).await.unwrap();
        assert!(written.is_empty());
        assert!(!classified_path(&fx.config.paths.classified_dir, &fx.input).exists());
    }

    #[tokio::test]
    async fn test_eval_requires_gold_dir() {
        let mut fx = fixture();
        fx.config.paths.gold_dir = Some(fx.dir.path().join("nowhere"));
        let pipeline = Pipeline::new(fx.config.clone(), Lexicon::default(), EchoClassifier::default());
        assert!(matches!(
            pipeline.eval_files(&[fx.input.clone()]).await,
            Err(PipelineError::GoldDirMissing(_))
        ));

        fx.config.paths.gold_dir = Some(fx.input.clone());
        let pipeline = Pipeline::new(fx.config.clone(), Lexicon::default(), EchoClassifier::default());
        assert!(matches!(
            pipeline.eval_files(&[fx.input.clone()]).await,
            Err(PipelineError::GoldDirNotDir(_))
        ));
    }

    #[tokio::test]
    async fn test_eval_skips_missing_and_mismatched_gold() {
        let fx = fixture();
        let classified = fx.dir.path().join("classified");
        fs::create_dir_all(&classified).unwrap();
        // no gold counterpart
        fs::write(classified.join("other_classified.txt"), GOLD_DOC).unwrap();
        // gold has more lines
        let short: String = GOLD_DOC.lines().take(3).collect::<Vec<_>>().join("\n");
        fs::write(classified.join("paper_classified.txt"), short).unwrap();

        let pipeline = Pipeline::new(fx.config.clone(), Lexicon::default(), EchoClassifier::default());
        let report = pipeline
            .eval_files(&[classified.join("other_classified.txt"), classified.join("paper_classified.txt")])
            .await
            .unwrap();
        assert!(report.labels.is_empty());
        assert_eq!(report.accuracy, 0.0);
    }
}
