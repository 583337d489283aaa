//! Literal-aware scanning over JavaScript/TypeScript source text.
//!
//! Everything here works on byte offsets into the original `&str`. The
//! delimiters the scanner reacts to are all ASCII, so every offset it hands
//! back sits on a char boundary and can be used to slice the source.

use std::collections::HashSet;

pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

pub(crate) fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Single,
    Double,
    Backtick,
}

impl Quote {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'\'' => Some(Quote::Single),
            b'"' => Some(Quote::Double),
            b'`' => Some(Quote::Backtick),
            _ => None,
        }
    }
}

/// A string or template literal. `value` is the raw text between the quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal<'a> {
    pub value: &'a str,
    pub quote: Quote,
    /// Offset one past the closing quote.
    pub end: usize,
}

impl Literal<'_> {
    pub fn is_interpolated(&self) -> bool {
        self.quote == Quote::Backtick && self.value.contains("${")
    }
}

/// The argument text of a call, between `open` and its matching `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallArgs<'a> {
    pub open: usize,
    pub close: usize,
    pub text: &'a str,
}

/// A `<receiver>.<member>(` occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberCall<'a> {
    pub receiver: &'a str,
    /// Offset of the receiver's first byte.
    pub start: usize,
    pub member: &'a str,
    pub member_start: usize,
    /// Offset of the opening parenthesis.
    pub open: usize,
}

/// Isolates the arguments of the call whose `(` sits at `open`.
///
/// Parentheses inside quoted literals, template literals (including their
/// `${}` interpolations) and comments are ignored. Returns `None` when the
/// text ends before the call closes or a literal is left unterminated.
pub fn call_args(src: &str, open: usize) -> Option<CallArgs<'_>> {
    if src.as_bytes().get(open) != Some(&b'(') {
        return None;
    }
    let close = matching_close(src.as_bytes(), open, b'(', b')')?;
    Some(CallArgs {
        open,
        close,
        text: &src[open + 1..close],
    })
}

pub fn read_literal(src: &str, at: usize) -> Option<Literal<'_>> {
    let quote = Quote::from_byte(*src.as_bytes().get(at)?)?;
    let end = skip_literal(src.as_bytes(), at)?;
    Some(Literal {
        value: &src[at + 1..end - 1],
        quote,
        end,
    })
}

/// Returns the literal when `text` holds exactly one literal and nothing else
/// but whitespace or comments.
pub fn sole_literal(text: &str) -> Option<Literal<'_>> {
    let mut cursor = Cursor::new(text, 0);
    cursor.skip_trivia();
    let literal = cursor.literal()?;
    cursor.skip_trivia();
    cursor.at_end().then_some(literal)
}

/// Splits argument text on top-level commas. Each piece is trimmed; a
/// trailing comma does not produce an empty final argument.
pub fn split_args(text: &str) -> Option<Vec<&str>> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut code = CodeBytes::new(text.as_bytes(), 0);
    for (pos, b) in code.by_ref() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                args.push(text[start..pos].trim());
                start = pos + 1;
            }
            _ => {}
        }
    }
    if code.malformed {
        return None;
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        args.push(last);
    }
    Some(args)
}

/// 1-indexed line containing `offset`.
pub fn line_of(src: &str, offset: usize) -> usize {
    let end = offset.min(src.len());
    src.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Finds every `<ident>.<member>(` in code context whose member name passes
/// `accept`, in source order. Whitespace may sit between the member and `(`,
/// not around the dot.
///
/// Quotes inside a call that does not balance cannot be trusted to delimit
/// literals, so the rest of that call's line is also searched as plain text.
/// An unterminated literal is read as a single stray quote.
pub fn member_calls<'a>(src: &'a str, accept: impl Fn(&str) -> bool) -> Vec<MemberCall<'a>> {
    let bytes = src.as_bytes();
    let mut seen = HashSet::new();
    let mut dots = Vec::new();
    for (pos, b) in CodeBytes::recovering(bytes) {
        match b {
            b'.' => {
                if seen.insert(pos) {
                    dots.push(pos);
                }
            }
            b'(' if call_args(src, pos).is_none() => {
                let from = pos + 1;
                let raw_dots = src[from..line_end(bytes, from)]
                    .match_indices('.')
                    .map(|(offset, _)| from + offset);
                for dot in raw_dots {
                    if seen.insert(dot) {
                        dots.push(dot);
                    }
                }
            }
            _ => {}
        }
    }
    dots.sort_unstable();

    let mut calls = Vec::new();
    for dot in dots {
        let Some(start) = receiver_before(bytes, dot) else {
            continue;
        };
        let mut cursor = Cursor::new(src, dot + 1);
        let member_start = cursor.pos();
        let Some(member) = cursor.ident() else {
            continue;
        };
        if !accept(member) {
            continue;
        }
        cursor.skip_whitespace();
        if cursor.peek() != Some(b'(') {
            continue;
        }
        calls.push(MemberCall {
            receiver: &src[start..dot],
            start,
            member,
            member_start,
            open: cursor.pos(),
        });
    }
    calls
}

/// Offsets just past each occurrence of the keyword `word` in code context.
/// The keyword must stand alone and be followed by whitespace.
pub fn keyword_ends(src: &str, word: &str) -> Vec<usize> {
    let bytes = src.as_bytes();
    let Some(&first) = word.as_bytes().first() else {
        return Vec::new();
    };
    CodeBytes::recovering(bytes)
        .filter(|&(at, b)| {
            b == first
                && bytes[at..].starts_with(word.as_bytes())
                && (at == 0 || !is_ident_char(bytes[at - 1]))
                && bytes
                    .get(at + word.len())
                    .is_some_and(|b| b.is_ascii_whitespace())
        })
        .map(|(at, _)| at + word.len())
        .collect()
}

fn receiver_before(bytes: &[u8], dot: usize) -> Option<usize> {
    let mut start = dot;
    while start > 0 && is_ident_char(bytes[start - 1]) {
        start -= 1;
    }
    while start < dot && !is_ident_start(bytes[start]) {
        start += 1;
    }
    (start < dot).then_some(start)
}

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Skips whitespace and comments.
    pub fn skip_trivia(&mut self) {
        let bytes = self.src.as_bytes();
        loop {
            self.skip_whitespace();
            let rest = &bytes[self.pos.min(bytes.len())..];
            if rest.starts_with(b"//") {
                self.pos = line_end(bytes, self.pos);
            } else if rest.starts_with(b"/*") {
                self.pos = block_comment_end(bytes, self.pos).unwrap_or(bytes.len());
            } else {
                break;
            }
        }
    }

    pub fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn ident(&mut self) -> Option<&'a str> {
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        Some(&self.src[start..self.pos])
    }

    pub fn literal(&mut self) -> Option<Literal<'a>> {
        let literal = read_literal(self.src, self.pos)?;
        self.pos = literal.end;
        Some(literal)
    }

    pub fn call_args(&mut self) -> Option<CallArgs<'a>> {
        let args = call_args(self.src, self.pos)?;
        self.pos = args.close + 1;
        Some(args)
    }
}

/// Yields `(offset, byte)` for bytes in code context, stepping over literals,
/// comments and regular expression literals. Stops and sets `malformed` on an
/// unterminated literal or block comment, unless recovering, where the
/// opening quote is yielded as a plain byte and scanning goes on after it.
///
/// A `/` starts a regular expression only after an operator or an opening
/// delimiter; after `return` or other keywords it is read as division, which
/// can leave a quote inside such a pattern looking like an open literal.
struct CodeBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
    malformed: bool,
    recover: bool,
    last: Option<u8>,
}

impl<'a> CodeBytes<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self {
            bytes,
            pos,
            malformed: false,
            recover: false,
            last: None,
        }
    }

    fn recovering(bytes: &'a [u8]) -> Self {
        Self {
            recover: true,
            ..Self::new(bytes, 0)
        }
    }

    fn fail(&mut self) -> Option<(usize, u8)> {
        self.malformed = true;
        self.pos = self.bytes.len();
        None
    }

    fn emit(&mut self, at: usize, b: u8) -> Option<(usize, u8)> {
        self.pos = at + 1;
        if !b.is_ascii_whitespace() {
            self.last = Some(b);
        }
        Some((at, b))
    }

    fn regex_allowed(&self) -> bool {
        match self.last {
            None => true,
            Some(b) => b"(,=:[!&|?{};+-*%~^".contains(&b),
        }
    }
}

impl Iterator for CodeBytes<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.bytes.len() {
            let at = self.pos;
            let b = self.bytes[at];
            let next = self.bytes.get(at + 1).copied();
            match (b, next) {
                (b'\'' | b'"' | b'`', _) => match skip_literal(self.bytes, at) {
                    Some(end) => {
                        self.pos = end;
                        self.last = Some(b);
                    }
                    None if self.recover => {
                        self.malformed = true;
                        return self.emit(at, b);
                    }
                    None => return self.fail(),
                },
                (b'/', Some(b'/')) => self.pos = line_end(self.bytes, at),
                (b'/', Some(b'*')) => match block_comment_end(self.bytes, at) {
                    Some(end) => self.pos = end,
                    None => return self.fail(),
                },
                (b'/', _) if self.regex_allowed() => match regex_end(self.bytes, at) {
                    Some(end) => {
                        self.pos = end;
                        self.last = Some(b'/');
                    }
                    None => return self.emit(at, b),
                },
                _ => return self.emit(at, b),
            }
        }
        None
    }
}

fn matching_close(bytes: &[u8], open_at: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (pos, b) in CodeBytes::new(bytes, open_at) {
        if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(pos);
            }
        }
    }
    None
}

/// `at` points at an opening quote; returns the offset past the closing one.
fn skip_literal(bytes: &[u8], at: usize) -> Option<usize> {
    let quote = bytes[at];
    let mut pos = at + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == quote => return Some(pos + 1),
            b'\n' if quote != b'`' => return None,
            b'$' if quote == b'`' && bytes.get(pos + 1) == Some(&b'{') => {
                pos = matching_close(bytes, pos + 1, b'{', b'}')? + 1;
            }
            _ => pos += 1,
        }
    }
    None
}

/// `at` points at the opening `/` of a regular expression literal; returns
/// the offset past the closing one. Patterns never span lines.
fn regex_end(bytes: &[u8], at: usize) -> Option<usize> {
    let mut pos = at + 1;
    let mut in_class = false;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' => return None,
            b'[' => {
                in_class = true;
                pos += 1;
            }
            b']' => {
                in_class = false;
                pos += 1;
            }
            b'/' if !in_class => return Some(pos + 1),
            _ => pos += 1,
        }
    }
    None
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| from + offset)
}

fn block_comment_end(bytes: &[u8], from: usize) -> Option<usize> {
    bytes[from + 2..]
        .windows(2)
        .position(|pair| pair == b"*/")
        .map(|offset| from + 2 + offset + 2)
}
