use std::path::PathBuf;

use anyhow::{bail, Context};
use igt_detect_lib::services::{
    expand_inputs, CommandClassifier, ConfigStore, EvaluationReport, IgtConfig, Pipeline,
};
use tracing::info;

const USAGE: &str = "\
Usage:
  igtdetect <command> [options]

Commands:
  train           train a classifier from gold documents
  test            classify documents with a trained classifier
  eval            score classified documents against gold documents
  testeval        test, then evaluate the classified output
  traintesteval   train, test, then evaluate
  init-config     write a default configuration file

Options:
  --config <path>            configuration file (default: <config dir>/igtdetect/config.json)
  --train-files <p[,p...]>   training documents or directories
  --test-files <p[,p...]>    documents or directories to classify
  --eval-files <p[,p...]>    classified documents or directories to evaluate
  --gold-dir <dir>           gold documents for evaluation
  --classified-dir <dir>     where classified documents are written
  --detected-dir <dir>       where detected IGT spans are written
  --classifier-path <path>   model file
  --overwrite-model          replace an existing model when training
  --max-features <n>         feature cap passed to the classifier
  -f                         regenerate cached feature files
  -o <path>                  write the evaluation report to a file
  --csv                      comma-delimited report
  --json                     JSON report
  -v                         debug logging";

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Every occurrence of `key`, each value split on commas.
fn parse_arg_values(args: &[String], key: &str) -> Vec<PathBuf> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == key)
        .filter_map(|(i, _)| args.get(i + 1))
        .flat_map(|v| v.split(','))
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()))
        .collect()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn apply_overrides(config: &mut IgtConfig, args: &[String]) {
    if let Some(dir) = parse_arg_value(args, "--gold-dir") {
        config.paths.gold_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = parse_arg_value(args, "--classified-dir") {
        config.paths.classified_dir = PathBuf::from(dir);
    }
    if let Some(dir) = parse_arg_value(args, "--detected-dir") {
        config.paths.detected_dir = Some(PathBuf::from(dir));
    }
    if let Some(path) = parse_arg_value(args, "--classifier-path") {
        config.paths.classifier_path = PathBuf::from(path);
    }
}

fn required_files(args: &[String], key: &str, command: &str) -> anyhow::Result<Vec<PathBuf>> {
    let given = parse_arg_values(args, key);
    if given.is_empty() {
        bail!("\"{}\" requires {}", command, key);
    }
    Ok(expand_inputs(&given)?)
}

fn emit_report(report: &EvaluationReport, args: &[String]) -> anyhow::Result<()> {
    let rendered = if has_flag(args, "--json") {
        serde_json::to_string_pretty(report)?
    } else {
        let delimiter = if has_flag(args, "--csv") { "," } else { "\t" };
        report.render(delimiter)
    };

    match parse_arg_value(args, "-o") {
        Some(path) => {
            std::fs::write(&path, &rendered).with_context(|| format!("write report to {}", path))?;
            info!("[CLI] evaluation report written to \"{}\"", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).cloned() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    if command == "-h" || command == "--help" {
        println!("{}", USAGE);
        return Ok(());
    }

    igt_detect_lib::init_logging(has_flag(&args, "-v"));

    let config_file = match parse_arg_value(&args, "--config") {
        Some(p) => PathBuf::from(p),
        None => ConfigStore::default_config_file().unwrap_or_else(|| PathBuf::from("igtdetect.json")),
    };
    let store = ConfigStore::new(config_file);

    if command == "init-config" {
        store.save(&IgtConfig::default())?;
        println!("Default configuration written to {}", store.config_file().display());
        return Ok(());
    }

    let mut config = store
        .load()
        .with_context(|| format!("load config {}", store.config_file().display()))?;
    apply_overrides(&mut config, &args);

    let overwrite_feats = has_flag(&args, "-f");
    let overwrite_model = has_flag(&args, "--overwrite-model");
    let max_features = match parse_arg_value(&args, "--max-features") {
        Some(v) => Some(v.parse::<usize>().with_context(|| format!("invalid --max-features \"{}\"", v))?),
        None => None,
    };

    let classifier = CommandClassifier::from_config(&config.runtime);
    let pipeline = Pipeline::from_config(config, classifier)?;

    match command.as_str() {
        "train" => {
            let files = required_files(&args, "--train-files", &command)?;
            pipeline.train(&files, overwrite_feats, overwrite_model, max_features).await?;
        }
        "test" => {
            let files = required_files(&args, "--test-files", &command)?;
            let written = pipeline.classify_docs(&files, overwrite_feats).await?;
            info!("[CLI] {} documents classified", written.len());
        }
        "eval" => {
            let files = required_files(&args, "--eval-files", &command)?;
            let report = pipeline.eval_files(&files).await?;
            emit_report(&report, &args)?;
        }
        "testeval" | "traintesteval" => {
            if command == "traintesteval" {
                let train = required_files(&args, "--train-files", &command)?;
                pipeline.train(&train, overwrite_feats, overwrite_model, max_features).await?;
            }
            let files = required_files(&args, "--test-files", &command)?;
            let classified = pipeline.classify_docs(&files, overwrite_feats).await?;
            let report = pipeline.eval_files(&classified).await?;
            emit_report(&report, &args)?;
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("unknown command \"{}\"", other);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_arg_values_repeats_and_commas() {
        let a = args("igtdetect train --train-files a.txt,b --train-files dir -f");
        assert_eq!(
            parse_arg_values(&a, "--train-files"),
            vec![PathBuf::from("a.txt"), PathBuf::from("b"), PathBuf::from("dir")]
        );
        assert!(parse_arg_values(&a, "--test-files").is_empty());
        assert!(has_flag(&a, "-f"));
    }

    #[test]
    fn test_overrides_replace_paths() {
        let mut config = IgtConfig::default();
        apply_overrides(&mut config, &args("x eval --gold-dir g --classifier-path m.bin"));
        assert_eq!(config.paths.gold_dir, Some(PathBuf::from("g")));
        assert_eq!(config.paths.classifier_path, PathBuf::from("m.bin"));
        assert_eq!(config.paths.detected_dir, None);
    }
}
