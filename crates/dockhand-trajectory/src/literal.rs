//! Minimal parser for Python-literal values.
//!
//! The LLM middleware may hand tool inputs in repr form, e.g.
//! `{'command': 'ps', 'args': '-a'}`, which is not JSON. This decodes
//! exactly the literal subset the recorder needs: strings in either quote
//! style, integers, floats, `True`/`False`/`None`, lists, tuples, and
//! dicts. Anything else fails and the caller falls back to a raw wrapper.

use serde_json::{Map, Number, Value};

/// Parse a complete Python literal; trailing garbage fails the parse.
pub fn parse(input: &str) -> Option<Value> {
    let mut parser = Parser::new(input);
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.at_end() {
        Some(value)
    } else {
        None
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Option<()> {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn parse_value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '{' => self.parse_dict(),
            '[' => self.parse_seq('[', ']'),
            '(' => self.parse_seq('(', ')'),
            '\'' | '"' => self.parse_string().map(Value::String),
            c if c.is_ascii_digit() || c == '-' || c == '+' => self.parse_number(),
            _ => self.parse_keyword(),
        }
    }

    fn parse_dict(&mut self) -> Option<Value> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Some(Value::Object(map));
            }
            let key = match self.parse_value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some('}') => {}
                _ => return None,
            }
        }
    }

    fn parse_seq(&mut self, open: char, close: char) -> Option<Value> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Some(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(c) if c == close => {}
                _ => return None,
            }
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                c if c == quote => return Some(out),
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    'u' => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            code = code * 16 + self.bump()?.to_digit(16)?;
                        }
                        out.push(char::from_u32(code)?);
                    }
                    // Python keeps unknown escapes verbatim.
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                c => out.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Option<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => self.pos += 1,
                '.' | 'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                }
                '-' | '+' if is_float => self.pos += 1,
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if is_float {
            Number::from_f64(text.parse().ok()?).map(Value::Number)
        } else {
            text.parse::<i64>().ok().map(|n| Value::Number(n.into()))
        }
    }

    fn parse_keyword(&mut self) -> Option<Value> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphabetic()) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Some(Value::Bool(true)),
            "False" => Some(Value::Bool(false)),
            "None" => Some(Value::Null),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_quoted_dict() {
        let value = parse("{'command': 'ps'}").unwrap();
        assert_eq!(value, json!({"command": "ps"}));
    }

    #[test]
    fn test_dict_with_several_keys() {
        let value = parse("{'command': 'run', 'args': '-d -p 8080:80 nginx', 'cwd': '/app'}")
            .unwrap();
        assert_eq!(value["args"], json!("-d -p 8080:80 nginx"));
        assert_eq!(value["cwd"], json!("/app"));
    }

    #[test]
    fn test_python_keywords() {
        let value = parse("{'detach': True, 'force': False, 'cwd': None}").unwrap();
        assert_eq!(value, json!({"detach": true, "force": false, "cwd": null}));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse("42").unwrap(), json!(42));
        assert_eq!(parse("-7").unwrap(), json!(-7));
        assert_eq!(parse("2.5").unwrap(), json!(2.5));
        assert_eq!(parse("{'timeout': 30}").unwrap(), json!({"timeout": 30}));
    }

    #[test]
    fn test_nested_structures() {
        let value = parse("{'services': ['api', 'db'], 'ports': (8080, 5432)}").unwrap();
        assert_eq!(value["services"], json!(["api", "db"]));
        assert_eq!(value["ports"], json!([8080, 5432]));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(parse(r"'a\nb'").unwrap(), json!("a\nb"));
        assert_eq!(parse(r"'it\'s'").unwrap(), json!("it's"));
        assert_eq!(parse(r"'A'").unwrap(), json!("A"));
        // Unknown escapes stay verbatim.
        assert_eq!(parse(r"'\d+'").unwrap(), json!("\\d+"));
    }

    #[test]
    fn test_double_quoted_strings() {
        assert_eq!(parse(r#"{"command": "ps"}"#).unwrap(), json!({"command": "ps"}));
    }

    #[test]
    fn test_trailing_comma() {
        assert_eq!(parse("['a', 'b',]").unwrap(), json!(["a", "b"]));
        assert_eq!(parse("{'a': 1,}").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_rejects_non_literals() {
        assert!(parse("not json at all").is_none());
        assert!(parse("{'a': 1} extra").is_none());
        assert!(parse("{'unclosed': ").is_none());
        assert!(parse("__import__('os')").is_none());
    }
}
