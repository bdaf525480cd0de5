use std::io::Read;

use crate::error::{Error, ParseError, ParseErrorKind};
use crate::model::{Entry, EnvMap, QuoteMode};

/// Parse dotenv entries from UTF-8 text.
pub fn parse_str(input: &str) -> Result<EnvMap, Error> {
    parse_str_with_mode(input, QuoteMode::Lenient)
}

/// Parse dotenv entries from UTF-8 text using a specific quote handling mode.
pub fn parse_str_with_mode(input: &str, quote_mode: QuoteMode) -> Result<EnvMap, Error> {
    parse_lines(input, quote_mode).map_err(Error::from)
}

/// Parse dotenv entries from UTF-8 bytes.
pub fn parse_bytes(input: &[u8]) -> Result<EnvMap, Error> {
    let text = std::str::from_utf8(input)?;
    parse_str(text)
}

/// Parse dotenv entries from a reader.
pub fn parse_reader<R: Read>(mut reader: R) -> Result<EnvMap, Error> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(Error::ReadInput)?;
    parse_bytes(&buf)
}

/// Whether `key` is a valid variable name: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if is_valid_key_start(first) => chars.all(is_valid_key_char),
        _ => false,
    }
}

fn is_valid_key_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_valid_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

pub(crate) fn parse_lines(input: &str, quote_mode: QuoteMode) -> Result<EnvMap, ParseError> {
    let mut entries = EnvMap::new();

    for (idx, line) in input.lines().enumerate() {
        if line.is_empty() {
            continue;
        }

        let line_num = idx as u32 + 1;
        if let Some(entry) = parse_line(line, line_num, quote_mode)? {
            if entries.contains_key(&entry.key) {
                tracing::trace!(key = %entry.key, line = entry.line, "overriding earlier assignment");
            }
            entries.insert(entry.key, entry.value);
        }
    }

    Ok(entries)
}

fn parse_line(
    line: &str,
    line_num: u32,
    quote_mode: QuoteMode,
) -> Result<Option<Entry>, ParseError> {
    let working = trim_ascii(line);
    if working.is_empty() || working.starts_with('#') {
        return Ok(None);
    }

    let Some((key, value_input)) = working.split_once('=') else {
        tracing::trace!(line = line_num, "skipping line without `=`");
        return Ok(None);
    };

    let value = parse_value(value_input, line_num, quote_mode)?;
    let key = trim_ascii(key);
    if !is_valid_key(key) {
        return Err(ParseError::new(
            line_num,
            ParseErrorKind::InvalidKey(key.to_owned()),
        ));
    }

    Ok(Some(Entry {
        key: key.to_owned(),
        value,
        line: line_num,
    }))
}

fn parse_value(input: &str, line_num: u32, quote_mode: QuoteMode) -> Result<String, ParseError> {
    let input = trim_ascii(input);
    if input.is_empty() {
        return Ok(String::new());
    }

    if let Some(quote @ ('"' | '\'')) = input.chars().next() {
        match (quoted_span(input, quote), quote_mode) {
            (Some(span), _) if quote == '"' => return Ok(unescape(span)),
            (Some(span), _) => return Ok(span.to_owned()),
            (None, QuoteMode::Strict) => {
                return Err(ParseError::new(
                    line_num,
                    ParseErrorKind::UnterminatedQuote,
                ));
            }
            (None, QuoteMode::Lenient) => {
                tracing::trace!(line = line_num, "quoted value is not closed, reading it unquoted");
            }
        }
    }

    Ok(strip_inline_comment(input).to_owned())
}

/// Content between `quote` at the start of `input` and the first matching
/// quote that is followed only by whitespace and an optional `#` comment.
fn quoted_span(input: &str, quote: char) -> Option<&str> {
    let body = &input[1..];
    body.match_indices(quote)
        .map(|(idx, _)| idx)
        .find(|&idx| {
            let tail = body[idx + 1..].trim_start_matches(is_pattern_space);
            tail.is_empty() || tail.starts_with('#')
        })
        .map(|idx| &body[..idx])
}

/// Trim the ASCII whitespace set, plus NUL and vertical tab. Other Unicode
/// whitespace is content.
pub(crate) fn trim_ascii(input: &str) -> &str {
    input.trim_matches(|ch: char| matches!(ch, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0b'))
}

fn is_pattern_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

fn strip_inline_comment(input: &str) -> &str {
    match input.find(" #") {
        Some(idx) => trim_ascii(&input[..idx]),
        None => input,
    }
}

/// Interpret C-style backslash escapes.
///
/// Unknown escapes yield the escaped character itself and a lone trailing
/// backslash is kept.
fn unescape(input: &str) -> String {
    if !input.contains('\\') {
        return input.to_owned();
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0usize;

    while idx < bytes.len() {
        let byte = bytes[idx];
        if byte != b'\\' || idx + 1 == bytes.len() {
            out.push(byte);
            idx += 1;
            continue;
        }

        idx += 1;
        let unescaped = match bytes[idx] {
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'x' => match take_digits(&bytes[idx + 1..], 2, 16) {
                (_, 0) => b'x',
                (value, len) => {
                    idx += len;
                    value as u8
                }
            },
            b'0'..=b'7' => {
                let (value, len) = take_digits(&bytes[idx..], 3, 8);
                idx += len - 1;
                value as u8
            }
            other => other,
        };
        out.push(unescaped);
        idx += 1;
    }

    match String::from_utf8(out) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

fn take_digits(bytes: &[u8], max: usize, radix: u32) -> (u32, usize) {
    let mut value = 0u32;
    let mut len = 0usize;
    while len < max && len < bytes.len() {
        let Some(digit) = char::from(bytes[len]).to_digit(radix) else {
            break;
        };
        value = value * radix + digit;
        len += 1;
    }
    (value, len)
}
