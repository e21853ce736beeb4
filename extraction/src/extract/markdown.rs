//! Rendering values as fenced blocks and removing blocks from text.

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};
use std::io;

use super::locate::locate_candidates;

/// Compact formatter with a space after `,` and `:`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn render<T: Serialize + ?Sized, F: Formatter>(value: &T, formatter: F) -> String {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    if value.serialize(&mut serializer).is_err() {
        return "null".to_string();
    }
    String::from_utf8(out).unwrap_or_default()
}

/// Wraps `value` in a ```` ```json ```` fence on a single line.
///
/// ```
/// use agentkit_extraction::extract::to_json_block;
///
/// assert_eq!(to_json_block(&[1, 2, 3]), "```json\n[1, 2, 3]\n```");
/// ```
#[must_use]
pub fn to_json_block<T: Serialize + ?Sized>(value: &T) -> String {
    format!("```json\n{}\n```", render(value, SpacedFormatter))
}

/// Like [`to_json_block`] but indented.
#[must_use]
pub fn to_json_block_pretty<T: Serialize + ?Sized>(value: &T) -> String {
    format!("```json\n{}\n```", render(value, PrettyFormatter::new()))
}

/// Removes the last fenced JSON block from `text`; text without one comes back unchanged.
#[must_use]
pub fn remove_last_block(text: &str) -> String {
    match locate_candidates(text).last() {
        Some(candidate) => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..candidate.span.start]);
            out.push_str(&text[candidate.span.end..]);
            out
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spaced_rendering() {
        assert_eq!(
            to_json_block(&json!({"a": [1, 2], "b": {"c": null}})),
            "```json\n{\"a\": [1, 2], \"b\": {\"c\": null}}\n```"
        );
        assert_eq!(to_json_block(&json!([])), "```json\n[]\n```");
    }

    #[test]
    fn test_pretty_rendering_is_extractable() {
        let value = json!({"a": [1, 2]});
        let rendered = to_json_block_pretty(&value);
        assert!(rendered.contains("\n  \"a\""));
        let body = locate_candidates(&rendered)[0].body;
        assert_eq!(serde_json::from_str::<serde_json::Value>(body).unwrap(), value);
    }

    #[test]
    fn test_remove_last_block() {
        let text = "a ```json[1]``` b ```json[2]``` c";
        assert_eq!(remove_last_block(text), "a ```json[1]``` b  c");
        assert_eq!(remove_last_block("plain"), "plain");
    }
}
