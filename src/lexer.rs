use crate::token::{Pos, Span, Token, TokenKind};
use fnv::FnvHashSet;
use std::error::Error;
use std::fmt;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, PartialEq, Eq)]
pub enum LexErrorType {
    UnterminatedComment,
    StrayCharacter(char),
}
use LexErrorType::*;

#[derive(Debug)]
pub struct LexError {
    pub err: LexErrorType,
    line: Vec<u8>,
    linenum: usize,
    offset: usize,
}

impl LexError {
    fn new(err: LexErrorType, code: &[u8], i: usize) -> Self {
        let (line, linenum, offset) = find_line(code, i);
        Self {
            err,
            line: line.into(),
            linenum,
            offset,
        }
    }

    /// 1-based line of the error
    pub fn line(&self) -> usize {
        self.linenum + 1
    }

    /// 1-based column of the error
    pub fn column(&self) -> usize {
        self.offset + 1
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let line = String::from_utf8_lossy(&self.line);
        let prefix = String::from_utf8_lossy(&self.line[0..self.offset]);
        let width = UnicodeWidthStr::width(prefix.as_ref());

        match self.err {
            UnterminatedComment => {
                writeln!(f, "reached EOF with unterminated comment")?;
                writeln!(f, "Comment started at {}:{}", self.line(), self.column())?;
            }
            StrayCharacter(c) => {
                writeln!(
                    f,
                    "stray {:?} found at {}:{}",
                    c,
                    self.line(),
                    self.column()
                )?;
            }
        };

        writeln!(f, "{}", line)?;
        write!(f, "{}^", " ".repeat(width))?;

        Ok(())
    }
}

impl Error for LexError {}

const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "auto", "bool", "break", "case", "char", "const", "constexpr",
    "continue", "default", "do", "double", "else", "enum", "extern", "false", "float", "for",
    "goto", "if", "inline", "int", "long", "nullptr", "register", "restrict", "return", "short",
    "signed", "sizeof", "static", "static_assert", "struct", "switch", "thread_local", "true",
    "typedef", "typeof", "typeof_unqual", "union", "unsigned", "void", "volatile", "while",
    "_Alignas", "_Alignof", "_Atomic", "_BitInt", "_Bool", "_Complex", "_Decimal128",
    "_Decimal32", "_Decimal64", "_Generic", "_Imaginary", "_Noreturn", "_Static_assert",
    "_Thread_local",
];

// Longest first, so the first match is the longest one
const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||",
    "*=", "/=", "%=", "+=", "-=", "&=", "^=", "|=", "##", "::", "[", "]", "(", ")", "{", "}",
    ".", "&", "*", "+", "-", "~", "!", "/", "%", "<", ">", "^", "|", "?", ":", ";", "=", ",",
    "#",
];

/// Length of a backslash-newline line splice at byte `j`, if there is one
fn splice_at(code: &[u8], j: usize) -> Option<usize> {
    match (code.get(j), code.get(j + 1), code.get(j + 2)) {
        (Some(b'\\'), Some(b'\n'), _) => Some(2),
        (Some(b'\\'), Some(b'\r'), Some(b'\n')) => Some(3),
        _ => None,
    }
}

/// `bytes` with every line splice taken out
fn unspliced(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut j = 0;
    while j < bytes.len() {
        match splice_at(bytes, j) {
            Some(len) => j += len,
            None => {
                out.push(bytes[j]);
                j += 1;
            }
        }
    }
    out
}

fn is_ident_start(c: u8) -> bool {
    c == b'_' || c == b'$' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

struct Lexer<'a> {
    code: &'a [u8],
    i: usize,
    line: u32,
    line_start: usize,
    at_line_start: bool,
    directive: Option<usize>,
    next_directive: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(code: &'a [u8]) -> Self {
        Lexer {
            code,
            i: 0,
            line: 1,
            line_start: 0,
            at_line_start: true,
            directive: None,
            // 0 is left for directives that are generated rather than lexed
            next_directive: 1,
            tokens: Vec::new(),
        }
    }

    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: (self.i - self.line_start + 1) as u32,
        }
    }

    /// Byte offset of the character `ahead` places past the cursor, seen
    /// through line splices
    fn offset(&self, ahead: usize) -> usize {
        let mut j = self.i;
        let mut n = 0;
        loop {
            while let Some(len) = splice_at(self.code, j) {
                j += len;
            }
            if n == ahead {
                return j;
            }
            j += 1;
            n += 1;
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.code.get(self.offset(ahead)).copied()
    }

    /// Consumes one raw byte, keeping line bookkeeping current
    fn advance(&mut self) {
        if self.code[self.i] == b'\n' {
            self.line += 1;
            self.line_start = self.i + 1;
        }
        self.i += 1;
    }

    fn skip_splices(&mut self) {
        while let Some(len) = splice_at(self.code, self.i) {
            for _ in 0..len {
                self.advance();
            }
        }
    }

    /// Consumes one character, along with any splices before it
    fn bump(&mut self) {
        self.skip_splices();
        self.advance();
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, start_pos: Pos) {
        let bytes = unspliced(&self.code[start..self.i]);
        let spelling = String::from_utf8_lossy(&bytes).into_owned();
        if kind == TokenKind::Punctuation && spelling == "#" && self.at_line_start {
            self.directive = Some(self.next_directive);
            self.next_directive += 1;
        }
        if kind != TokenKind::Comment {
            self.at_line_start = false;
        }
        self.tokens.push(Token {
            kind,
            spelling,
            span: Some(Span {
                start: start_pos,
                end: self.pos(),
            }),
            directive: self.directive,
        });
    }

    /// Pushes a literal, or the rest of the line when the quote is never
    /// closed. An open quote is lexed as punctuation, the kind libclang
    /// reports for unknown tokens.
    fn push_literal(&mut self, start: usize, start_pos: Pos) {
        if self.literal() {
            self.push(TokenKind::Literal, start, start_pos);
        } else {
            self.push(TokenKind::Punctuation, start, start_pos);
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let code = self.code;
        loop {
            self.skip_splices();
            let c = match self.peek(0) {
                Some(c) => c,
                None => break,
            };

            let start = self.i;
            let start_pos = self.pos();
            match c {
                b'\n' => {
                    self.bump();
                    self.directive = None;
                    self.at_line_start = true;
                }
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.bump(),
                b'/' if self.peek(1) == Some(b'/') => {
                    self.line_comment();
                    self.push(TokenKind::Comment, start, start_pos);
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    self.block_comment(start)?;
                    self.push(TokenKind::Comment, start, start_pos);
                }
                b'"' | b'\'' => self.push_literal(start, start_pos),
                b'0'..=b'9' => {
                    self.number();
                    self.push(TokenKind::Literal, start, start_pos);
                }
                b'.' if matches!(self.peek(1), Some(b'0'..=b'9')) => {
                    self.number();
                    self.push(TokenKind::Literal, start, start_pos);
                }
                c if is_ident_start(c) => {
                    while matches!(self.peek(0), Some(c) if is_ident_continue(c)) {
                        self.bump();
                    }
                    let word = unspliced(&code[start..self.i]);
                    let is_prefix = matches!(&word[..], b"L" | b"u" | b"U" | b"u8");
                    if is_prefix && matches!(self.peek(0), Some(b'"') | Some(b'\'')) {
                        self.push_literal(start, start_pos);
                    } else if KEYWORDS.iter().any(|k| k.as_bytes() == &word[..]) {
                        self.push(TokenKind::Keyword, start, start_pos);
                    } else {
                        self.push(TokenKind::Identifier, start, start_pos);
                    }
                }
                _ => {
                    let found = PUNCTUATORS.iter().copied().find(|p| {
                        p.bytes()
                            .enumerate()
                            .all(|(k, b)| self.peek(k) == Some(b))
                    });
                    match found {
                        Some(p) => {
                            self.bump_n(p.len());
                            self.push(TokenKind::Punctuation, start, start_pos);
                        }
                        None => {
                            let stray = String::from_utf8_lossy(&code[self.i..])
                                .chars()
                                .next()
                                .unwrap_or(char::REPLACEMENT_CHARACTER);
                            return Err(LexError::new(StrayCharacter(stray), code, start));
                        }
                    }
                }
            }
        }

        Ok(self.tokens)
    }

    fn line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == b'\n' {
                break;
            }
            self.bump();
        }
    }

    fn block_comment(&mut self, start: usize) -> Result<(), LexError> {
        self.bump_n(2);
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(b'*'), Some(b'/')) => {
                    self.bump_n(2);
                    return Ok(());
                }
                (Some(_), _) => self.bump(),
                (None, _) => return Err(LexError::new(UnterminatedComment, self.code, start)),
            }
        }
    }

    /// Consumes a character or string literal from its opening quote.
    /// Returns `false` if the line or the input ended before the closing
    /// quote, leaving the cursor on the newline.
    fn literal(&mut self) -> bool {
        let quote = self.peek(0);
        self.bump();
        loop {
            match self.peek(0) {
                Some(b'\\') if self.peek(1).is_some() => self.bump_n(2),
                Some(b'\n') | None => return false,
                c if c == quote => {
                    self.bump();
                    return true;
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn number(&mut self) {
        self.bump();
        while let Some(c) = self.peek(0) {
            let signed_exponent = matches!(c, b'e' | b'E' | b'p' | b'P')
                && matches!(self.peek(1), Some(b'+') | Some(b'-'));
            let separator =
                c == b'\'' && matches!(self.peek(1), Some(d) if d.is_ascii_alphanumeric());
            if signed_exponent || separator {
                self.bump_n(2);
            } else if c == b'.' || is_ident_continue(c) {
                self.bump();
            } else {
                break;
            }
        }
    }
}

/// Tokenizes C source, keeping comments.
pub fn lex(code: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(code.as_bytes()).run()
}

/// Tokenizes C source, dropping comments.
pub fn tokens(code: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = lex(code)?;
    tokens.retain(|t| t.kind != TokenKind::Comment);
    Ok(tokens)
}

pub fn count_tokens(code: &str) -> Result<usize, LexError> {
    tokens(code).map(|t| t.len())
}

/// Names that a directive defines as function-like macros, i.e.
/// `#define NAME(` with the parenthesis right after the name.
pub fn function_like_macros(tokens: &[Token]) -> FnvHashSet<&str> {
    tokens
        .windows(4)
        .filter(|w| {
            w[0].in_directive()
                && w.iter().all(|t| t.directive == w[0].directive)
                && w[0].spelling == "#"
                && w[1].spelling == "define"
                && matches!(w[2].kind, TokenKind::Identifier | TokenKind::Keyword)
                && w[3].spelling == "("
                && w[3].is_adjacent_to(&w[2])
        })
        .map(|w| w[2].spelling.as_str())
        .collect()
}

fn find_line(code: &[u8], i: usize) -> (&[u8], usize, usize) {
    let offset = code[0..i].iter().rev().take_while(|x| **x != b'\n').count();
    let end = i + code[i..].iter().take_while(|x| **x != b'\n').count();
    let linenum = code[0..(i - offset)]
        .iter()
        .filter(|x| **x == b'\n')
        .count();
    (&code[(i - offset)..end], linenum, offset)
}
