//! Byte-cursor primitives shared by the text format readers.
//!
//! A [`Scanner`] walks a borrowed byte slice. The slice length is the only end
//! bound: an embedded NUL byte is treated as a line terminator, never as the
//! end of the input, and no access ever reads past the slice. Numeric parsing
//! reports failure through `Option` and leaves the cursor untouched when it
//! fails, so callers decide whether a bad number is fatal or defaulted.

use std::{borrow::Cow, cell::Cell};

/// Cursor over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
    // (offset, newlines before offset) of the last line number lookup
    line_mark: Cell<(usize, usize)>,
}

#[inline]
fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

#[inline]
fn is_line_end(c: u8) -> bool {
    matches!(c, b'\r' | b'\n' | b'\0' | 0x0c)
}

#[inline]
fn is_space_or_line_end(c: u8) -> bool {
    is_space(c) || is_line_end(c)
}

impl<'a> Scanner<'a> {
    /// Create a scanner positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            line_mark: Cell::new((0, 0)),
        }
    }

    /// Current byte offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor to an absolute offset (clamped to the buffer).
    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// Bytes not consumed yet.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// True once every byte has been consumed.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Byte under the cursor.
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Advance by `n` bytes without looking at them.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }

    /// True at the end of a line or of the buffer.
    #[inline]
    pub fn at_line_end(&self) -> bool {
        self.peek().is_none_or(is_line_end)
    }

    /// 1-based line number of the cursor, for diagnostics.
    ///
    /// Counting resumes from the previous lookup, so reporting once per line
    /// stays linear in the input size.
    pub fn line_number(&self) -> usize {
        let newlines = |bytes: &[u8]| bytes.iter().filter(|&&c| c == b'\n').count();
        let (mark, before) = self.line_mark.get();
        let lines = if self.pos >= mark {
            before + newlines(&self.data[mark..self.pos])
        } else {
            before - newlines(&self.data[self.pos..mark])
        };
        self.line_mark.set((self.pos, lines));
        lines + 1
    }

    /// Skip spaces and tabs. Returns false if the cursor then sits on a line
    /// end or the end of the buffer.
    pub fn skip_spaces(&mut self) -> bool {
        while self.peek().is_some_and(is_space) {
            self.pos += 1;
        }
        !self.at_line_end()
    }

    /// Skip the rest of the current line including its terminator run.
    /// Returns false when nothing is left afterwards.
    pub fn skip_line(&mut self) -> bool {
        while self.peek().is_some_and(|c| !is_line_end(c)) {
            self.pos += 1;
        }
        while self.peek().is_some_and(is_line_end) {
            self.pos += 1;
        }
        !self.is_eof()
    }

    /// Skip any mix of whitespace and line terminators. Returns whether
    /// content remains.
    pub fn skip_spaces_and_line_ends(&mut self) -> bool {
        while self.peek().is_some_and(is_space_or_line_end) {
            self.pos += 1;
        }
        !self.is_eof()
    }

    fn matches_at(&self, token: &[u8], ignore_case: bool) -> bool {
        let Some(candidate) = self.data.get(self.pos..self.pos + token.len()) else {
            return false;
        };
        let equal = if ignore_case {
            candidate.eq_ignore_ascii_case(token)
        } else {
            candidate == token
        };
        equal
            && self
                .data
                .get(self.pos + token.len())
                .is_none_or(|&c| is_space_or_line_end(c))
    }

    /// Case-sensitive match of a whole word at the cursor. On success the
    /// cursor moves past the token; the separator is left in place.
    pub fn token_match(&mut self, token: &str) -> bool {
        if self.matches_at(token.as_bytes(), false) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Like [`token_match`](Self::token_match), ignoring ASCII case.
    pub fn token_match_case_insensitive(&mut self, token: &str) -> bool {
        if self.matches_at(token.as_bytes(), true) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Check for a whole-word token without consuming it.
    pub fn peek_token(&self, token: &str) -> bool {
        self.matches_at(token.as_bytes(), false)
    }

    /// Parse a floating point literal on the current line.
    pub fn parse_float(&mut self) -> Option<f32> {
        let start = self.pos;
        if !self.skip_spaces() {
            self.pos = start;
            return None;
        }
        match parse_float_prefix(self.remaining()) {
            Some((value, used)) => {
                self.pos += used;
                Some(value)
            }
            None => {
                self.pos = start;
                None
            }
        }
    }

    /// Parse a decimal integer with an optional sign on the current line.
    pub fn parse_signed_int(&mut self) -> Option<i32> {
        let start = self.pos;
        if !self.skip_spaces() {
            self.pos = start;
            return None;
        }
        let negative = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b'+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        let parsed = self.digits(10).and_then(|v| {
            let v = i64::from(v);
            i32::try_from(if negative { -v } else { v }).ok()
        });
        if parsed.is_none() {
            self.pos = start;
        }
        parsed
    }

    /// Parse an unsigned decimal integer on the current line.
    pub fn parse_unsigned_int(&mut self) -> Option<u32> {
        self.parse_radix(10)
    }

    /// Parse an unsigned hexadecimal integer (an `0x` prefix is accepted).
    pub fn parse_hex(&mut self) -> Option<u32> {
        let start = self.pos;
        if !self.skip_spaces() {
            self.pos = start;
            return None;
        }
        let rest = self.remaining();
        if rest.len() > 2 && rest[0] == b'0' && (rest[1] | 0x20) == b'x' && rest[2].is_ascii_hexdigit() {
            self.pos += 2;
        }
        let parsed = self.digits(16);
        if parsed.is_none() {
            self.pos = start;
        }
        parsed
    }

    /// Parse an unsigned integer written the way C++ source spells it:
    /// `0x` prefix for hex, leading `0` for octal, decimal otherwise.
    pub fn parse_cpp_uint(&mut self) -> Option<u32> {
        let start = self.pos;
        if !self.skip_spaces() {
            self.pos = start;
            return None;
        }
        let rest = self.remaining();
        let parsed = match rest {
            [b'0', x, h, ..] if (x | 0x20) == b'x' && h.is_ascii_hexdigit() => {
                self.pos += 2;
                self.digits(16)
            }
            [b'0', d, ..] if d.is_ascii_digit() => {
                self.pos += 1;
                self.digits(8)
            }
            _ => self.digits(10),
        };
        if parsed.is_none() {
            self.pos = start;
        }
        parsed
    }

    fn parse_radix(&mut self, radix: u32) -> Option<u32> {
        let start = self.pos;
        if !self.skip_spaces() {
            self.pos = start;
            return None;
        }
        let parsed = self.digits(radix);
        if parsed.is_none() {
            self.pos = start;
        }
        parsed
    }

    /// Consume at least one digit in `radix`. Overflow is a failure.
    fn digits(&mut self, radix: u32) -> Option<u32> {
        let mut value: u32 = 0;
        let mut count = 0;
        while let Some(d) = self.peek().and_then(|c| (c as char).to_digit(radix)) {
            value = value.checked_mul(radix)?.checked_add(d)?;
            self.pos += 1;
            count += 1;
        }
        (count > 0).then_some(value)
    }

    /// Read a double-quoted string on the current line. Returns `None` if
    /// the cursor is not on a quote or the closing quote is missing; the
    /// cursor is left unchanged in that case.
    pub fn quoted_string(&mut self) -> Option<Cow<'a, str>> {
        let start = self.pos;
        self.skip_spaces();
        if self.peek() != Some(b'"') {
            self.pos = start;
            return None;
        }
        let open = self.pos + 1;
        let mut end = open;
        while let Some(&c) = self.data.get(end) {
            if c == b'"' {
                self.pos = end + 1;
                return Some(String::from_utf8_lossy(&self.data[open..end]));
            }
            if is_line_end(c) {
                break;
            }
            end += 1;
        }
        self.pos = start;
        None
    }

    /// Read the next whitespace-delimited word on the current line.
    pub fn next_token(&mut self) -> Option<Cow<'a, str>> {
        if !self.skip_spaces() {
            return None;
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| !is_space_or_line_end(c)) {
            self.pos += 1;
        }
        Some(String::from_utf8_lossy(&self.data[start..self.pos]))
    }

    /// Everything from the cursor up to the line end, trimmed. The cursor
    /// stops on the line terminator.
    pub fn rest_of_line(&mut self) -> Cow<'a, str> {
        self.skip_spaces();
        let start = self.pos;
        while self.peek().is_some_and(|c| !is_line_end(c)) {
            self.pos += 1;
        }
        match String::from_utf8_lossy(&self.data[start..self.pos]) {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim_end()),
            Cow::Owned(s) => Cow::Owned(s.trim_end().to_string()),
        }
    }
}

/// Longest prefix of `bytes` that forms a float literal, with its value.
///
/// Accepts an optional sign, `inf`/`infinity`/`nan`, digits with an optional
/// fraction, and an exponent that has at least one digit.
pub fn parse_float_prefix(bytes: &[u8]) -> Option<(f32, usize)> {
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    for word in ["infinity", "inf", "nan"] {
        if bytes
            .get(i..i + word.len())
            .is_some_and(|w| w.eq_ignore_ascii_case(word.as_bytes()))
        {
            let end = i + word.len();
            let text = std::str::from_utf8(&bytes[..end]).ok()?;
            return text.parse::<f32>().ok().map(|v| (v, end));
        }
    }
    let int_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;
    if bytes.get(i) == Some(&b'.') {
        let frac_start = i + 1;
        let mut j = frac_start;
        while bytes.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        mantissa_digits += j - frac_start;
        if mantissa_digits > 0 {
            i = j;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while bytes.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    let text = std::str::from_utf8(&bytes[..i]).ok()?;
    text.parse::<f32>().ok().map(|v| (v, i))
}

/// Parse the float at the start of `text`, returning 0.0 if there is none.
pub fn fast_atof(text: &str) -> f32 {
    parse_float_prefix(text.trim_start().as_bytes())
        .map(|(v, _)| v)
        .unwrap_or(0.0)
}

/// Whether `data` starts with `magic`.
pub fn check_magic(data: &[u8], magic: &[u8]) -> bool {
    data.starts_with(magic)
}

/// Case-insensitive search for any of `tokens` in the first `search_bytes`
/// bytes of `data`. NUL bytes are skipped so UTF-16 text still matches, and
/// a hit must not be the tail of a longer word.
pub fn search_header_for_tokens(data: &[u8], tokens: &[&str], search_bytes: usize) -> bool {
    let header: Vec<u8> = data
        .iter()
        .take(search_bytes)
        .filter(|&&c| c != 0)
        .map(u8::to_ascii_lowercase)
        .collect();

    tokens.iter().any(|token| {
        let token = token.to_ascii_lowercase();
        let token = token.as_bytes();
        if token.is_empty() || token.len() > header.len() {
            return false;
        }
        header.windows(token.len()).enumerate().any(|(at, window)| {
            window == token && (at == 0 || !header[at - 1].is_ascii_alphanumeric())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_functions_respect_end_bound() {
        let mut s = Scanner::new(b"  \t");
        assert!(!s.skip_spaces());
        assert!(s.is_eof());

        let mut s = Scanner::new(b"abc\r\n\r\ndef");
        assert!(s.skip_line());
        assert_eq!(s.remaining(), b"def");
        assert!(!s.skip_line());

        let mut s = Scanner::new(b" \n\t\r\n x");
        assert!(s.skip_spaces_and_line_ends());
        assert_eq!(s.peek(), Some(b'x'));
    }

    #[test]
    fn test_embedded_nul_is_a_line_end_not_the_end() {
        let mut s = Scanner::new(b"first\0second");
        assert!(s.skip_line());
        assert!(s.token_match("second"));
        assert!(s.is_eof());
    }

    #[test]
    fn test_token_match_requires_word_boundary() {
        let mut s = Scanner::new(b"endsolid x");
        assert!(!s.token_match("end"));
        assert!(s.token_match("endsolid"));
        assert_eq!(s.peek(), Some(b' '));

        let mut s = Scanner::new(b"end");
        assert!(s.token_match("end"));
        assert!(s.is_eof());

        let mut s = Scanner::new(b"SOLID a");
        assert!(!s.token_match("solid"));
        assert!(s.token_match_case_insensitive("solid"));
    }

    #[test]
    fn test_numbers() {
        let mut s = Scanner::new(b"  -1.5e2 .25 7 -3 1e x");
        assert_eq!(s.parse_float(), Some(-150.0));
        assert_eq!(s.parse_float(), Some(0.25));
        assert_eq!(s.parse_unsigned_int(), Some(7));
        assert_eq!(s.parse_signed_int(), Some(-3));
        // "1e" is the literal 1 followed by a stray letter
        assert_eq!(s.parse_float(), Some(1.0));
        assert_eq!(s.peek(), Some(b'e'));
        s.advance(1);
        let before = s.position();
        assert_eq!(s.parse_float(), None);
        assert_eq!(s.position(), before);
    }

    #[test]
    fn test_numbers_stop_at_line_end() {
        let mut s = Scanner::new(b"1\n2");
        assert_eq!(s.parse_unsigned_int(), Some(1));
        assert_eq!(s.parse_unsigned_int(), None);
        assert!(s.skip_line());
        assert_eq!(s.parse_unsigned_int(), Some(2));
    }

    #[test]
    fn test_overflow_fails_without_panicking() {
        let mut s = Scanner::new(b"99999999999999999999");
        assert_eq!(s.parse_unsigned_int(), None);
        assert_eq!(s.position(), 0);
        let mut s = Scanner::new(b"-2147483649");
        assert_eq!(s.parse_signed_int(), None);
    }

    #[test]
    fn test_hex_and_cpp_style() {
        let mut s = Scanner::new(b"10000001 0x20 020 17");
        assert_eq!(s.parse_hex(), Some(0x1000_0001));
        assert_eq!(s.parse_cpp_uint(), Some(0x20));
        assert_eq!(s.parse_cpp_uint(), Some(0o20));
        assert_eq!(s.parse_cpp_uint(), Some(17));
    }

    #[test]
    fn test_strings_and_tokens() {
        let mut s = Scanner::new(b"name \"my box\" tail words  \n\"open");
        assert!(s.token_match("name"));
        assert_eq!(s.quoted_string().as_deref(), Some("my box"));
        assert_eq!(s.next_token().as_deref(), Some("tail"));
        assert_eq!(s.rest_of_line(), "words");
        assert!(s.skip_line());
        let before = s.position();
        assert_eq!(s.quoted_string(), None);
        assert_eq!(s.position(), before);
    }

    #[test]
    fn test_line_number() {
        let mut s = Scanner::new(b"a\nb\nc");
        s.skip_line();
        s.skip_line();
        assert_eq!(s.line_number(), 3);
    }

    #[test]
    fn test_line_number_follows_the_cursor_both_ways() {
        let mut s = Scanner::new(b"a\nb\nc\nd\n");
        s.skip_line();
        s.skip_line();
        s.skip_line();
        assert_eq!(s.line_number(), 4);
        s.set_position(2);
        assert_eq!(s.line_number(), 2);
        s.set_position(0);
        assert_eq!(s.line_number(), 1);
        s.set_position(6);
        assert_eq!(s.line_number(), 4);
        let copy = s.clone();
        assert_eq!(copy.line_number(), 4);
    }

    #[test]
    fn test_fast_atof() {
        assert_eq!(fast_atof("  3.5 rest"), 3.5);
        assert_eq!(fast_atof("abc"), 0.0);
        assert!(fast_atof("-inf").is_infinite());
    }

    #[test]
    fn test_header_search() {
        assert!(search_header_for_tokens(b"  SOLID cube", &["solid"], 200));
        assert!(!search_header_for_tokens(b"endsolidx", &["solid"], 200));
        assert!(search_header_for_tokens(b"s\0o\0l\0i\0d\0", &["solid"], 200));
        assert!(!search_header_for_tokens(b"xxxxxxxxxx solid", &["solid"], 5));
        assert!(check_magic(b"AC3Db", b"AC3D"));
    }
}
