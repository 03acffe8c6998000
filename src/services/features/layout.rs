// Layout Features
// Block, page and font predicates relative to per-document statistics

use crate::models::{Document, Line};

use super::statistics::DocumentStatistics;

/// A line in its document. Without statistics every layout feature is false.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    pub line: &'a Line,
    pub doc: &'a Document,
    pub stats: Option<&'a DocumentStatistics>,
}

fn same_block(input: &LayoutInput<'_>, neighbour: Option<usize>) -> bool {
    if input.stats.is_none() {
        return false;
    }
    neighbour
        .and_then(|n| input.doc.get_line(n))
        .map_or(false, |other| other.block_id == input.line.block_id)
}

/// The line's block starts right of the document's modal left margin.
pub fn is_indented(input: &LayoutInput<'_>) -> bool {
    let Some(margin) = input.stats.and_then(|s| s.llx) else {
        return false;
    };
    input
        .doc
        .block_of(input.line)
        .map_or(false, |b| b.llx > margin)
}

pub fn is_first_page(input: &LayoutInput<'_>) -> bool {
    input.stats.is_some()
        && input
            .doc
            .block_of(input.line)
            .map_or(false, |b| b.page == 1)
}

pub fn prev_line_same_block(input: &LayoutInput<'_>) -> bool {
    same_block(input, input.line.lineno.checked_sub(1))
}

pub fn next_line_same_block(input: &LayoutInput<'_>) -> bool {
    same_block(input, input.line.lineno.checked_add(1))
}

/// Any font on the line other than the document default.
pub fn has_nonstandard_font(input: &LayoutInput<'_>) -> bool {
    let Some(stats) = input.stats else {
        return false;
    };
    match &stats.default_font {
        Some(default) => input.line.fonts.iter().any(|f| f != default),
        None => !input.line.fonts.is_empty(),
    }
}

pub fn has_smaller_font(input: &LayoutInput<'_>) -> bool {
    match input.stats.and_then(|s| s.default_font.as_ref()) {
        Some(default) => input.line.fonts.iter().any(|f| f.size < default.size),
        None => false,
    }
}

pub fn has_larger_font(input: &LayoutInput<'_>) -> bool {
    match input.stats.and_then(|s| s.default_font.as_ref()) {
        Some(default) => input.line.fonts.iter().any(|f| f.size > default.size),
        None => false,
    }
}
