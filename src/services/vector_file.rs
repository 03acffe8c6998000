// Feature Vector Files
// One instance per line: LABEL<TAB>feat:1<TAB>feat:1 ... with features sorted

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{FeatureVector, LabeledInstance};
use crate::services::text_processor::is_truthy;

#[derive(Error, Debug)]
pub enum VectorFileError {
    #[error("vector file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> VectorFileError + '_ {
    move |source| VectorFileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Only true features are written, always with the value `1`.
pub fn format_instance(instance: &LabeledInstance) -> String {
    let mut out = instance.label.clone();
    for feat in instance.features.iter() {
        out.push('\t');
        out.push_str(feat);
        out.push_str(":1");
    }
    out
}

/// Inverse of [`format_instance`]. Blank lines yield `None`; a feature whose
/// value is falsy is dropped.
pub fn parse_instance(line: &str) -> Option<LabeledInstance> {
    let mut fields = line.split_whitespace();
    let label = fields.next()?;
    let features: FeatureVector = fields
        .filter_map(|pair| match pair.rsplit_once(':') {
            Some((name, value)) => is_truthy(value).then_some(name),
            None => Some(pair),
        })
        .collect();
    Some(LabeledInstance::new(label, features))
}

pub fn write_instances<'a, W: Write>(
    out: &mut W,
    instances: impl IntoIterator<Item = &'a LabeledInstance>,
) -> io::Result<()> {
    for instance in instances {
        writeln!(out, "{}", format_instance(instance))?;
    }
    Ok(())
}

pub fn write_vector_file<'a>(
    path: &Path,
    instances: impl IntoIterator<Item = &'a LabeledInstance>,
) -> Result<(), VectorFileError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let file = fs::File::create(path).map_err(io_err(path))?;
    let mut out = BufWriter::new(file);
    write_instances(&mut out, instances).map_err(io_err(path))?;
    out.flush().map_err(io_err(path))
}

pub fn read_vector_file(path: &Path) -> Result<Vec<LabeledInstance>, VectorFileError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    Ok(content.lines().filter_map(parse_instance).collect())
}
