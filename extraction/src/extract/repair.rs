//! Best-effort parser for almost-JSON produced by language models.
//!
//! Never rejects on syntax: missing closers are closed at end of input, stray
//! closers end the current container, commas are optional, and keys or values
//! may be unquoted. The only hard failures are "no container at all" and
//! runaway nesting.

use serde_json::{Map, Number, Value};

const MAX_DEPTH: usize = 512;

/// Parses the first object or array found in `input`, repairing defects on the way.
pub(crate) fn parse(input: &str) -> Result<Value, String> {
    let mut parser = Repairer {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
    };
    parser.parse_root()
}

struct Repairer {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Repairer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn parse_root(&mut self) -> Result<Value, String> {
        while let Some(c) = self.peek() {
            if c == '{' || c == '[' {
                return self.parse_value();
            }
            self.pos += 1;
        }
        Err("no object or array found".to_string())
    }

    fn parse_value(&mut self) -> Result<Value, String> {
        self.skip_trivia();
        match self.peek() {
            None => Ok(Value::Null),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some(quote @ ('"' | '\'')) => Ok(Value::String(self.parse_string(quote))),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                let word = self.read_while(|c| !c.is_whitespace() && !matches!(c, ',' | '}' | ']'));
                Ok(classify(&word))
            }
            Some(_) => {
                let word = self.read_while(|c| !matches!(c, ',' | '}' | ']' | '\n' | '\r'));
                Ok(classify(word.trim()))
            }
        }
    }

    fn enter(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(format!("nesting deeper than {MAX_DEPTH} levels"));
        }
        self.pos += 1;
        Ok(())
    }

    fn parse_object(&mut self) -> Result<Value, String> {
        self.enter()?;
        let mut map = Map::new();
        loop {
            self.skip_trivia_and_commas();
            match self.peek() {
                None | Some(']') => break,
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }

            let start = self.pos;
            let key = self.parse_key();
            self.skip_trivia();
            if self.peek() == Some(':') {
                self.pos += 1;
                self.skip_trivia();
            }
            let value = match self.peek() {
                None | Some(',' | '}' | ']') => Value::Null,
                Some(_) => self.parse_value()?,
            };
            if !(key.is_empty() && value.is_null()) {
                map.insert(key, value);
            }

            if self.pos == start {
                self.pos += 1;
            }
        }
        self.depth -= 1;
        Ok(Value::Object(map))
    }

    fn parse_array(&mut self) -> Result<Value, String> {
        self.enter()?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia_and_commas();
            match self.peek() {
                None | Some('}') => break,
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }

            let start = self.pos;
            let value = self.parse_value()?;
            if self.pos == start {
                self.pos += 1;
                continue;
            }
            items.push(value);
        }
        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn parse_key(&mut self) -> String {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => self.parse_string(quote),
            _ => self
                .read_while(|c| !matches!(c, ':' | ',' | '{' | '}' | '[' | ']' | '\n' | '\r'))
                .trim()
                .to_string(),
        }
    }

    /// Reads a quoted string. A quote only closes the string when what follows it
    /// looks like structure; otherwise it is kept as a literal character.
    fn parse_string(&mut self, quote: char) -> String {
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == quote {
                if self.closes_string(quote) {
                    return out;
                }
                out.push(c);
            } else if c == '\\' {
                self.push_escape(&mut out);
            } else {
                out.push(c);
            }
        }
        out
    }

    fn closes_string(&self, quote: char) -> bool {
        let mut offset = 0;
        while let Some(c) = self.peek_at(offset) {
            if !c.is_whitespace() {
                return matches!(c, ',' | '}' | ']' | ':') || c == quote;
            }
            offset += 1;
        }
        true
    }

    fn push_escape(&mut self, out: &mut String) {
        match self.bump() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let decoded = self.read_unicode_escape();
                out.push(decoded);
            }
            Some(other @ ('"' | '\'' | '\\' | '/')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    fn read_hex4(&mut self) -> Option<u32> {
        let digits: String = self.chars.get(self.pos..self.pos + 4)?.iter().collect();
        let code = u32::from_str_radix(&digits, 16).ok()?;
        self.pos += 4;
        Some(code)
    }

    fn read_unicode_escape(&mut self) -> char {
        let Some(high) = self.read_hex4() else {
            return char::REPLACEMENT_CHARACTER;
        };
        if (0xD800..0xDC00).contains(&high)
            && self.peek() == Some('\\')
            && self.peek_at(1) == Some('u')
        {
            self.pos += 2;
            if let Some(low) = self.read_hex4() {
                if (0xDC00..0xE000).contains(&low) {
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER);
                }
            }
            return char::REPLACEMENT_CHARACTER;
        }
        char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn read_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => self.pos += 1,
                (Some('/'), Some('/')) => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    while self.peek().is_some() && !(self.peek() == Some('*') && self.peek_at(1) == Some('/')) {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.chars.len());
                }
                _ => break,
            }
        }
    }

    fn skip_trivia_and_commas(&mut self) {
        loop {
            self.skip_trivia();
            if self.peek() == Some(',') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}

fn classify(word: &str) -> Value {
    match word {
        "" | "null" | "None" | "NULL" | "undefined" => Value::Null,
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => number(word).unwrap_or_else(|| Value::String(word.to_string())),
    }
}

fn number(word: &str) -> Option<Value> {
    let word = word.strip_prefix('+').unwrap_or(word);
    if let Ok(i) = word.parse::<i64>() {
        return Some(i.into());
    }
    if let Ok(u) = word.parse::<u64>() {
        return Some(u.into());
    }
    // f64 parsing also accepts "inf" and "NaN"; only digits, signs, dots and exponents count.
    let numeric = word.bytes().any(|b| b.is_ascii_digit())
        && word
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
    if !numeric {
        return None;
    }
    word.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repaired(input: &str) -> Value {
        parse(input).unwrap()
    }

    #[test]
    fn test_closes_unbalanced_containers() {
        assert_eq!(repaired(r#"{"a": [1, 2"#), json!({"a": [1, 2]}));
        assert_eq!(repaired(r#"[{"a": 1"#), json!([{"a": 1}]));
        assert_eq!(repaired(r#"{"a": {"b": "c""#), json!({"a": {"b": "c"}}));
    }

    #[test]
    fn test_mismatched_closers() {
        assert_eq!(repaired(r#"{"a": [1, 2}"#), json!({"a": [1, 2]}));
        assert_eq!(repaired(r#"[{"a": 1]"#), json!([{"a": 1}]));
    }

    #[test]
    fn test_trailing_and_missing_commas() {
        assert_eq!(repaired(r#"{"a": 1,, "b": 2,}"#), json!({"a": 1, "b": 2}));
        assert_eq!(repaired(r#"{"a": 1 "b": 2}"#), json!({"a": 1, "b": 2}));
        assert_eq!(repaired("[1 2 3,]"), json!([1, 2, 3]));
    }

    #[test]
    fn test_unquoted_keys_and_values() {
        assert_eq!(
            repaired("{name: John Smith, city: Paris}"),
            json!({"name": "John Smith", "city": "Paris"})
        );
        assert_eq!(repaired("{first name: 'x'}"), json!({"first name": "x"}));
    }

    #[test]
    fn test_single_quotes_and_apostrophes() {
        assert_eq!(repaired("{'a': 'it's fine'}"), json!({"a": "it's fine"}));
    }

    #[test]
    fn test_unescaped_inner_quotes() {
        assert_eq!(
            repaired(r#"{"text": "he said "hi" twice"}"#),
            json!({"text": "he said \"hi\" twice"})
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(repaired(r#"{"a": "unfinished"#), json!({"a": "unfinished"}));
    }

    #[test]
    fn test_python_literals_and_comments() {
        assert_eq!(
            repaired("{\"a\": True, /* x */ \"b\": None, // y\n \"c\": False}"),
            json!({"a": true, "b": null, "c": false})
        );
    }

    #[test]
    fn test_missing_value_becomes_null() {
        assert_eq!(repaired(r#"{"a": 1, "b":"#), json!({"a": 1, "b": null}));
        assert_eq!(repaired(r#"{"a": , "b": 2}"#), json!({"a": null, "b": 2}));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(repaired("[+1, -2, .5, 1e3, 2024-01-05]"), json!([1, -2, 0.5, 1000.0, "2024-01-05"]));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            repaired(r#"["line\nbreak", "é", "😀", "\q"]"#),
            json!(["line\nbreak", "é", "😀", "\\q"])
        );
    }

    #[test]
    fn test_leading_prose_is_skipped() {
        assert_eq!(repaired(r#"Here you go: {"a": 1} hope it helps"#), json!({"a": 1}));
    }

    #[test]
    fn test_rejects_text_without_container() {
        assert!(parse("nothing structured here").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_rejects_runaway_nesting() {
        let deep = "[".repeat(MAX_DEPTH + 1);
        assert!(parse(&deep).is_err());
    }
}
