// Configuration Storage Service
// Handles config file read/write, path resolution and version backup

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::services::features::{LayoutFeature, TextFeature};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid OOV thresholds: medium={med} high={high} (need 0 <= medium <= high <= 1)")]
    Thresholds { med: f64, high: f64 },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgtConfig {
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub featuresets: FeatureSetConfig,
    #[serde(default = "default_text_features")]
    pub text_features: BTreeSet<TextFeature>,
    #[serde(default = "default_layout_features")]
    pub layout_features: BTreeSet<LayoutFeature>,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub files: FileConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelConfig {
    #[serde(default = "default_true")]
    pub use_bi_labels: bool,
    /// Keep combined labels such as `L-G-T` instead of their first component.
    #[serde(default)]
    pub use_multi_labels: bool,
    /// Drop `+`-joined flags such as `+AC` or `+LN`.
    #[serde(default = "default_true")]
    pub strip_flags: bool,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            use_bi_labels: true,
            use_multi_labels: false,
            strip_flags: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSetConfig {
    #[serde(default = "default_true")]
    pub use_prev_line: bool,
    #[serde(default = "default_true")]
    pub use_prev_prev_line: bool,
    #[serde(default = "default_true")]
    pub use_next_line: bool,
}

impl Default for FeatureSetConfig {
    fn default() -> Self {
        Self {
            use_prev_line: true,
            use_prev_prev_line: true,
            use_next_line: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    #[serde(default = "default_high_oov")]
    pub high_oov: f64,
    #[serde(default = "default_med_oov")]
    pub med_oov: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high_oov: 0.5,
            med_oov: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub en_wordlist: Option<PathBuf>,
    pub gls_wordlist: Option<PathBuf>,
    pub met_wordlist: Option<PathBuf>,
    pub lang_names: Option<PathBuf>,
    pub gram_list: Option<PathBuf>,
    pub gram_list_cased: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConfig {
    #[serde(default = "default_feat_dir")]
    pub feat_dir: PathBuf,
    pub gold_dir: Option<PathBuf>,
    #[serde(default = "default_classified_dir")]
    pub classified_dir: PathBuf,
    pub detected_dir: Option<PathBuf>,
    #[serde(default = "default_debug_dir")]
    pub debug_dir: PathBuf,
    #[serde(default = "default_classifier_path")]
    pub classifier_path: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            feat_dir: default_feat_dir(),
            gold_dir: None,
            classified_dir: default_classified_dir(),
            detected_dir: None,
            debug_dir: default_debug_dir(),
            classifier_path: default_classifier_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    #[serde(default)]
    pub debug_on: bool,
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
    /// External sequence classifier executable.
    #[serde(default = "default_classifier_program")]
    pub classifier_program: PathBuf,
    #[serde(default)]
    pub classifier_args: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug_on: false,
            max_concurrency: default_concurrency(),
            classifier_program: default_classifier_program(),
            classifier_args: Vec::new(),
        }
    }
}

fn default_true() -> bool { true }
fn default_high_oov() -> f64 { 0.5 }
fn default_med_oov() -> f64 { 0.2 }
fn default_feat_dir() -> PathBuf { PathBuf::from("feats") }
fn default_classified_dir() -> PathBuf { PathBuf::from("classified") }
fn default_debug_dir() -> PathBuf { PathBuf::from("debug") }
fn default_classifier_path() -> PathBuf { PathBuf::from("igt.classifier") }
fn default_classifier_program() -> PathBuf { PathBuf::from("igt-classifier") }
fn default_concurrency() -> usize { 4 }
fn default_text_features() -> BTreeSet<TextFeature> { TextFeature::ALL.iter().copied().collect() }
fn default_layout_features() -> BTreeSet<LayoutFeature> { LayoutFeature::ALL.iter().copied().collect() }

impl Default for IgtConfig {
    /// Every feature enabled, matching what deserialising `{}` yields.
    fn default() -> Self {
        Self {
            labels: LabelConfig::default(),
            featuresets: FeatureSetConfig::default(),
            text_features: default_text_features(),
            layout_features: default_layout_features(),
            thresholds: ThresholdConfig::default(),
            files: FileConfig::default(),
            paths: PathConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl IgtConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ThresholdConfig { high_oov: high, med_oov: med } = self.thresholds;
        if !(0.0..=1.0).contains(&med) || !(0.0..=1.0).contains(&high) || med > high {
            return Err(ConfigError::Thresholds { med, high });
        }
        Ok(())
    }

    /// Resolve relative file and directory paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        let files = &mut self.files;
        for p in [
            &mut files.en_wordlist,
            &mut files.gls_wordlist,
            &mut files.met_wordlist,
            &mut files.lang_names,
            &mut files.gram_list,
            &mut files.gram_list_cased,
        ]
        .into_iter()
        .flatten()
        {
            fix(p);
        }

        let paths = &mut self.paths;
        fix(&mut paths.feat_dir);
        fix(&mut paths.classified_dir);
        fix(&mut paths.debug_dir);
        fix(&mut paths.classifier_path);
        if let Some(p) = paths.gold_dir.as_mut() {
            fix(p);
        }
        if let Some(p) = paths.detected_dir.as_mut() {
            fix(p);
        }
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_file: PathBuf) -> Self {
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { config_dir, config_file }
    }

    /// Get default config file location
    pub fn default_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("igtdetect").join("config.json"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(io_err(&self.config_dir))
    }

    /// Load configuration from file; a missing file yields the defaults.
    /// Relative paths are resolved against the config file's directory.
    pub fn load(&self) -> Result<IgtConfig, ConfigError> {
        let mut config = if self.config_file.exists() {
            let content = fs::read_to_string(&self.config_file).map_err(io_err(&self.config_file))?;
            serde_json::from_str(&content)?
        } else {
            IgtConfig::default()
        };
        config.validate()?;
        config.resolve_paths(&self.config_dir);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &IgtConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content).map_err(io_err(&self.config_file))
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(io_err(&backup_dir))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(io_err(&backup_file))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(io_err(backup_dir))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Timestamped names sort oldest first
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }
}
