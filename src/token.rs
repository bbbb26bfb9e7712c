use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    Identifier,
    Keyword,
    Literal,
    Punctuation,
    Comment,
}

/// 1-based line and column of a character in the source
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

/// Source extent of a token; `end` is just past its last character
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub spelling: String,
    /// `None` for tokens that did not come from the lexer
    pub span: Option<Span>,
    /// Id of the preprocessor directive this token is part of, if any
    pub directive: Option<usize>,
}

impl Token {
    /// A token with no source location, such as a generated macro name
    pub fn synthetic(kind: TokenKind, spelling: &str) -> Self {
        Token {
            kind,
            spelling: spelling.to_string(),
            span: None,
            directive: None,
        }
    }

    /// Whether this token started exactly where `prev` ended in the source.
    pub fn is_adjacent_to(&self, prev: &Token) -> bool {
        match (prev.span, self.span) {
            (Some(prev), Some(cur)) => prev.end == cur.start,
            _ => false,
        }
    }

    pub fn in_directive(&self) -> bool {
        self.directive.is_some()
    }

    /// A quote that was never closed. It swallows the rest of its line, so
    /// nothing may follow it there.
    pub fn runs_to_end_of_line(&self) -> bool {
        let unprefixed = self.spelling.trim_start_matches(&['L', 'u', 'U', '8'][..]);
        self.kind == TokenKind::Punctuation && unprefixed.starts_with(&['\'', '"'][..])
    }

    /// Whether this token may be part of a macro body
    pub fn extractable(&self) -> bool {
        !self.in_directive() && !self.runs_to_end_of_line()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.spelling)?;
        if let Some(span) = self.span {
            write!(f, "@{}:{}", span.start.line, span.start.column)?;
        }
        if let Some(directive) = self.directive {
            write!(f, " #{}", directive)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: u32, start: u32, end: u32) -> Option<Span> {
        Some(Span {
            start: Pos { line, column: start },
            end: Pos { line, column: end },
        })
    }

    #[test]
    fn adjacency_needs_both_spans() {
        let mut a = Token::synthetic(TokenKind::Identifier, "a");
        let mut b = Token::synthetic(TokenKind::Punctuation, "(");
        assert!(!b.is_adjacent_to(&a));

        a.span = at(1, 1, 2);
        b.span = at(1, 2, 3);
        assert!(b.is_adjacent_to(&a));

        b.span = at(2, 2, 3);
        assert!(!b.is_adjacent_to(&a));
    }

    #[test]
    fn open_quotes_are_not_extractable() {
        let open = Token::synthetic(TokenKind::Punctuation, "u8'oops");
        assert!(open.runs_to_end_of_line());
        assert!(!open.extractable());
        assert!(!Token::synthetic(TokenKind::Literal, "'a'").runs_to_end_of_line());
        assert!(!Token::synthetic(TokenKind::Punctuation, "(").runs_to_end_of_line());

        let mut hash = Token::synthetic(TokenKind::Punctuation, "#");
        assert!(hash.extractable());
        hash.directive = Some(1);
        assert!(!hash.extractable());
    }

    #[test]
    fn debug_shows_location() {
        let mut t = Token::synthetic(TokenKind::Keyword, "int");
        assert_eq!(format!("{:?}", t), "Keyword(\"int\")");
        t.span = at(3, 5, 8);
        t.directive = Some(2);
        assert_eq!(format!("{:?}", t), "Keyword(\"int\")@3:5 #2");
    }
}
