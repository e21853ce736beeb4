//! Separating `<think>` reasoning blocks from the final answer.
//!
//! Reasoning models such as DeepSeek-R1 or Qwen3 served through OpenAI-compatible
//! endpoints inline their chain of thought as `<think>...</think>` before the answer.
//! The thinking often contains draft JSON blocks, so it should be removed before
//! extraction.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("static pattern compiles"));

const OPEN: &str = "<think>";
const CLOSE: &str = "</think>";

/// A response split into reasoning and answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reasoning {
    /// Thinking content, blocks joined by newlines. `None` when the text has none.
    pub thinking: Option<String>,
    /// Everything outside the thinking blocks, trimmed.
    pub answer: String,
}

/// Splits `<think>` blocks out of `text`.
///
/// Some servers strip the opening tag, leaving `reasoning</think>answer`; text before
/// an unmatched closing tag counts as thinking. An opening tag that is never closed
/// makes the rest of the text thinking.
#[must_use]
pub fn split_reasoning(text: &str) -> Reasoning {
    let mut thoughts = Vec::new();
    let mut rest = text;

    if let Some(close) = rest.find(CLOSE) {
        if !rest[..close].contains(OPEN) {
            thoughts.push(rest[..close].trim().to_string());
            rest = &rest[close + CLOSE.len()..];
        }
    }

    let mut answer = String::with_capacity(rest.len());
    let mut last = 0;
    for caps in THINK_BLOCK.captures_iter(rest) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        answer.push_str(&rest[last..whole.start()]);
        thoughts.push(inner.as_str().trim().to_string());
        last = whole.end();
    }
    let tail = &rest[last..];
    match tail.find(OPEN) {
        Some(open) => {
            answer.push_str(&tail[..open]);
            thoughts.push(tail[open + OPEN.len()..].trim().to_string());
        }
        None => answer.push_str(tail),
    }

    thoughts.retain(|t| !t.is_empty());
    Reasoning {
        thinking: (!thoughts.is_empty()).then(|| thoughts.join("\n")),
        answer: answer.trim().to_string(),
    }
}

/// Removes reasoning blocks, returning only the answer.
#[must_use]
pub fn strip_reasoning(text: &str) -> String {
    split_reasoning(text).answer
}
