// Document I/O
// Plain-text layout documents: block headers followed by key=value line records
//
//   doc_id=<id> page=<n> block_id=<id> llx=<float>
//   line=<n> tag=<label> span_id=<id> fonts=<font>,<font>:<raw text>

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::models::{Block, Document, DocumentError, Font, Line};

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)=(\S*)").expect("field regex"))
}

fn fields(s: &str) -> HashMap<&str, &str> {
    field_re()
        .captures_iter(s)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect()
}

fn parse_err(line: usize, message: impl Into<String>) -> DocumentError {
    DocumentError::Parse {
        line,
        message: message.into(),
    }
}

fn required<'a>(fields: &HashMap<&str, &'a str>, key: &str, line: usize) -> Result<&'a str, DocumentError> {
    fields
        .get(key)
        .copied()
        .ok_or_else(|| parse_err(line, format!("missing \"{}\"", key)))
}

fn number<T: std::str::FromStr>(value: &str, key: &str, line: usize) -> Result<T, DocumentError> {
    value
        .parse()
        .map_err(|_| parse_err(line, format!("invalid {} \"{}\"", key, value)))
}

/// Parse a document. `default_id` names it when no header carries a doc_id.
pub fn parse_document(content: &str, default_id: &str) -> Result<Document, DocumentError> {
    let mut doc = Document::new(default_id);
    let mut doc_id: Option<String> = None;
    let mut current_block: Option<String> = None;

    for (idx, raw) in content.lines().enumerate() {
        let lineno = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }

        if raw.starts_with("doc_id=") {
            let f = fields(raw);
            let block_id = required(&f, "block_id", lineno)?.to_string();
            let page = number(required(&f, "page", lineno)?, "page", lineno)?;
            let llx = number(required(&f, "llx", lineno)?, "llx", lineno)?;
            if doc_id.is_none() {
                doc_id = f.get("doc_id").filter(|s| !s.is_empty()).map(|s| s.to_string());
            }
            doc.push_block(Block {
                block_id: block_id.clone(),
                page,
                llx,
            });
            current_block = Some(block_id);
            continue;
        }

        if raw.starts_with("line=") {
            let (preamble, text) = raw
                .split_once(':')
                .ok_or_else(|| parse_err(lineno, "line record without ':' separator"))?;
            let f = fields(preamble);
            let block_id = current_block
                .clone()
                .ok_or_else(|| parse_err(lineno, "line record before any block header"))?;
            let n: usize = number(required(&f, "line", lineno)?, "line", lineno)?;
            let tag = f.get("tag").copied().filter(|t| !t.is_empty()).unwrap_or("O");
            let span_id = f.get("span_id").copied().filter(|s| !s.is_empty());
            let fonts = f
                .get("fonts")
                .copied()
                .unwrap_or("")
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::parse::<Font>)
                .collect::<Result<Vec<_>, _>>()?;

            let line = Line::new(n, block_id, text)
                .with_label(tag, span_id)
                .with_fonts(fonts);
            doc.push_line(line).map_err(|e| parse_err(lineno, e.to_string()))?;
            continue;
        }

        return Err(parse_err(lineno, "expected a block header or a line record"));
    }

    if let Some(id) = doc_id {
        doc.doc_id = id;
    }
    Ok(doc)
}

pub fn read_document(path: &Path) -> Result<Document, DocumentError> {
    let content = fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_document(&content, &stem)
}

pub fn write_document(path: &Path, doc: &Document) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, doc.to_string())?;
    Ok(())
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut by_block: BTreeMap<&str, Vec<&Line>> = BTreeMap::new();
        for line in self.lines() {
            by_block.entry(line.block_id.as_str()).or_default().push(line);
        }

        for (i, block) in self.blocks().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(
                f,
                "doc_id={} page={} block_id={} llx={}",
                self.doc_id, block.page, block.block_id, block.llx
            )?;
            for line in by_block.get(block.block_id.as_str()).into_iter().flatten() {
                let fonts: Vec<String> = line.fonts.iter().map(Font::to_string).collect();
                writeln!(
                    f,
                    "line={} tag={} span_id={} fonts={}:{}",
                    line.lineno,
                    line.tag(),
                    line.span_id().unwrap_or(""),
                    fonts.join(","),
                    line.text
                )?;
            }
        }
        Ok(())
    }
}
