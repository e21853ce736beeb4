//! Locating fenced JSON blocks inside model output.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use super::error::ExtractionFailure;

#[allow(clippy::expect_used)]
static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json(.*?)```").expect("static pattern compiles"));

/// A fenced block found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Text between the opening fence and the closing fence.
    pub body: &'a str,
    /// Byte range of the whole block, fences included.
    pub span: Range<usize>,
}

/// Returns every non-overlapping fenced JSON block, in order of appearance.
#[must_use]
pub fn locate_candidates(text: &str) -> Vec<Candidate<'_>> {
    JSON_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(1)?;
            Some(Candidate {
                body: body.as_str(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Resolves a selection index against a list of `len` items.
///
/// Negative indices count from the end, so `-1` is the last item.
#[must_use]
pub fn resolve_index(index: isize, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = index.unsigned_abs();
        (index < len).then_some(index)
    } else {
        len.checked_sub(index.unsigned_abs())
    }
}

/// Selects the block at `index` (negative counts from the end).
///
/// # Errors
///
/// Returns [`ExtractionFailure::NoCandidateFound`] when the text holds no block
/// or the index is out of range.
pub fn select_candidate(text: &str, index: isize) -> Result<&str, ExtractionFailure> {
    let candidates = locate_candidates(text);
    resolve_index(index, candidates.len())
        .and_then(|i| candidates.get(i))
        .map(|candidate| candidate.body)
        .ok_or(ExtractionFailure::NoCandidateFound {
            found: candidates.len(),
            index,
        })
}
