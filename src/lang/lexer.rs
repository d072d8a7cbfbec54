//! Lexer for the patch language.
//!
//! Produces [`Token`]s on demand. [`Lexer::peek`] caches one token of
//! lookahead so repeated peeks never re-lex.

use super::ast::Unit;
use super::error::{CompileError, Span};
use super::note::{looks_like_note, parse_note_name};
use super::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    peeked: Option<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            peeked: None,
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<&Token, CompileError> {
        if self.peeked.is_none() {
            let token = self.lex_token()?;
            self.peeked = Some(token);
        }
        match &self.peeked {
            Some(token) => Ok(token),
            None => unreachable!("peeked token was just filled"),
        }
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lex_token(),
        }
    }

    /// Lex the whole input, ending with `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn lex_token(&mut self) -> Result<Token, CompileError> {
        loop {
            self.skip_whitespace();
            if !self.skip_comment() {
                break;
            }
        }

        let start = self.mark();
        let Some(ch) = self.current() else {
            return Ok(self.finish(start, TokenKind::Eof));
        };

        if ch == '\n' {
            self.advance();
            return Ok(self.finish(start, TokenKind::Newline));
        }

        let kind = match ch {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Semicolon),
            '+' => self.one_of(&[("++", TokenKind::PlusPlus), ("+=", TokenKind::PlusEq)], TokenKind::Plus),
            '-' => self.one_of(
                &[
                    ("--", TokenKind::MinusMinus),
                    ("-=", TokenKind::MinusEq),
                    ("->", TokenKind::Arrow),
                ],
                TokenKind::Minus,
            ),
            '*' => self.one_of(&[("*=", TokenKind::StarEq)], TokenKind::Star),
            '/' => self.one_of(&[("/=", TokenKind::SlashEq)], TokenKind::Slash),
            '%' => self.one_of(&[("%=", TokenKind::PercentEq)], TokenKind::Percent),
            '^' => self.one_of(&[("^=", TokenKind::CaretEq)], TokenKind::Caret),
            '&' => self.one_of(&[("&&", TokenKind::AmpAmp), ("&=", TokenKind::AmpEq)], TokenKind::Amp),
            '|' => self.one_of(&[("||", TokenKind::PipePipe), ("|=", TokenKind::PipeEq)], TokenKind::Pipe),
            '~' => self.one_of(&[("~>", TokenKind::Squiggle)], TokenKind::Tilde),
            '!' => self.one_of(&[("!=", TokenKind::BangEq)], TokenKind::Bang),
            '=' => self.one_of(&[("==", TokenKind::EqEq)], TokenKind::Eq),
            '<' => self.one_of(&[("<=", TokenKind::Le)], TokenKind::Lt),
            '>' => self.one_of(&[(">=", TokenKind::Ge)], TokenKind::Gt),
            '"' => self.lex_quoted(start)?,
            '.' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.lex_number(start)?
            }
            '.' => self.single(TokenKind::Dot),
            '0'..='9' => self.lex_number(start)?,
            'a'..='z' | 'A'..='Z' | '_' => self.lex_word(start)?,
            _ => {
                self.advance();
                return Err(CompileError::lex(
                    format!("unexpected character: '{ch}'"),
                    self.span_from(start),
                ));
            }
        };

        Ok(self.finish(start, kind))
    }

    // --- Character cursor ---

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn mark(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.col)
    }

    fn span_from(&self, (start, line, col): (usize, usize, usize)) -> Span {
        Span::new(start, self.pos, line, col)
    }

    fn finish(&self, start: (usize, usize, usize), kind: TokenKind) -> Token {
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(' ' | '\t' | '\r')) {
            self.advance();
        }
    }

    fn skip_comment(&mut self) -> bool {
        if self.current() == Some('/') && self.peek_char(1) == Some('/') {
            while self.current().is_some_and(|c| c != '\n') {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Match the longest two-char operator in `pairs`, else `fallback`.
    fn one_of(&mut self, pairs: &[(&str, TokenKind)], fallback: TokenKind) -> TokenKind {
        let next = self.peek_char(1);
        for (text, kind) in pairs {
            if next == text.chars().nth(1) {
                self.advance();
                self.advance();
                return kind.clone();
            }
        }
        self.advance();
        fallback
    }

    // --- Literals ---

    fn lex_quoted(&mut self, start: (usize, usize, usize)) -> Result<TokenKind, CompileError> {
        self.advance(); // opening quote
        let mut name = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::Quoted(name));
                }
                Some('\n') | None => {
                    return Err(CompileError::lex(
                        "unclosed control name",
                        self.span_from(start),
                    ));
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
            }
        }
    }

    fn lex_number(&mut self, start: (usize, usize, usize)) -> Result<TokenKind, CompileError> {
        let mut digits = String::new();
        while let Some(c) = self.current().filter(char::is_ascii_digit) {
            digits.push(c);
            self.advance();
        }
        if self.current() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
            digits.push('.');
            self.advance();
            while let Some(c) = self.current().filter(char::is_ascii_digit) {
                digits.push(c);
                self.advance();
            }
        }

        // Exponent: only when digits follow, so `2e` stays a suffix error.
        if self.current() == Some('e') {
            let sign = self.peek_char(1).filter(|c| *c == '+' || *c == '-');
            let digit_at = if sign.is_some() { 2 } else { 1 };
            if self.peek_char(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                digits.push('e');
                self.advance();
                if let Some(s) = sign {
                    digits.push(s);
                    self.advance();
                }
                while let Some(c) = self.current().filter(char::is_ascii_digit) {
                    digits.push(c);
                    self.advance();
                }
            }
        }

        let mut value: f64 = digits.parse().map_err(|_| {
            CompileError::lex(format!("invalid number: {digits}"), self.span_from(start))
        })?;

        let mut suffix = String::new();
        while let Some(c) = self.current().filter(char::is_ascii_alphabetic) {
            suffix.push(c);
            self.advance();
        }
        if suffix.is_empty() {
            return Ok(TokenKind::Number { value, unit: None });
        }

        let (multiplier, unit) = split_suffix(&suffix).ok_or_else(|| {
            CompileError::lex(
                format!("unknown numeric suffix '{suffix}'"),
                self.span_from(start),
            )
        })?;
        value *= multiplier;
        Ok(TokenKind::Number { value, unit })
    }

    fn lex_word(&mut self, start: (usize, usize, usize)) -> Result<TokenKind, CompileError> {
        let mut word = String::new();
        if let Some(first) = self.advance() {
            word.push(first);
            if ('A'..='G').contains(&first) && self.current() == Some('#') {
                word.push('#');
                self.advance();
            }
        }
        while let Some(c) = self
            .current()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        {
            word.push(c);
            self.advance();
        }

        if looks_like_note(&word) {
            return parse_note_name(&word).map(TokenKind::Note).ok_or_else(|| {
                CompileError::lex(
                    format!("note '{word}' is outside the MIDI range"),
                    self.span_from(start),
                )
            });
        }
        if word.contains('#') {
            return Err(CompileError::lex(
                format!("invalid note literal '{word}'"),
                self.span_from(start),
            ));
        }
        Ok(TokenKind::Ident(word))
    }
}

/// Split a numeric suffix into an SI multiplier and an optional unit.
fn split_suffix(suffix: &str) -> Option<(f64, Option<Unit>)> {
    if let Some(unit) = Unit::from_suffix(suffix) {
        return Some((1.0, Some(unit)));
    }
    let mut chars = suffix.chars();
    let multiplier = match chars.next()? {
        'k' => 1e3,
        'M' => 1e6,
        'm' => 1e-3,
        'u' => 1e-6,
        _ => return None,
    };
    let rest = chars.as_str();
    if rest.is_empty() {
        return Some((multiplier, None));
    }
    Unit::from_suffix(rest).map(|unit| (multiplier, Some(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::error::ErrorKind;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lex_plain_number() {
        assert_eq!(
            kinds("0.25")[0],
            TokenKind::Number {
                value: 0.25,
                unit: None
            }
        );
    }

    #[test]
    fn lex_multiplier_and_unit() {
        assert_eq!(
            kinds("2k")[0],
            TokenKind::Number {
                value: 2000.0,
                unit: None
            }
        );
        assert_eq!(
            kinds("440hz")[0],
            TokenKind::Number {
                value: 440.0,
                unit: Some(Unit::Hz)
            }
        );
        assert_eq!(
            kinds("2khz")[0],
            TokenKind::Number {
                value: 2000.0,
                unit: Some(Unit::Hz)
            }
        );
        match kinds("10ms")[0] {
            TokenKind::Number { value, unit } => {
                assert!((value - 0.01).abs() < 1e-12);
                assert_eq!(unit, Some(Unit::Seconds));
            }
            ref other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn lex_exponent() {
        assert_eq!(
            kinds("1e-7")[0],
            TokenKind::Number {
                value: 1e-7,
                unit: None
            }
        );
    }

    #[test]
    fn lex_unknown_suffix_is_error() {
        let err = Lexer::new("3x").tokenize().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lex);
        assert_eq!(err.span.start, 0);
    }

    #[test]
    fn lex_notes() {
        assert_eq!(kinds("C#4")[0], TokenKind::Note(61));
        assert_eq!(kinds("A4")[0], TokenKind::Note(69));
        assert_eq!(kinds("Cat")[0], TokenKind::Ident("Cat".into()));
    }

    #[test]
    fn lex_note_out_of_range() {
        let err = Lexer::new("G#9").tokenize().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lex);
    }

    #[test]
    fn lex_control_reference() {
        assert_eq!(
            kinds("\"cut off\":knob.min"),
            vec![
                TokenKind::Quoted("cut off".into()),
                TokenKind::Colon,
                TokenKind::Ident("knob".into()),
                TokenKind::Dot,
                TokenKind::Ident("min".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_operators_longest_match() {
        assert_eq!(
            kinds("a += b++ -> ~> && || == != <= >= ^="),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::PlusEq,
                TokenKind::Ident("b".into()),
                TokenKind::PlusPlus,
                TokenKind::Arrow,
                TokenKind::Squiggle,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::CaretEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_comment_and_lines() {
        let tokens = Lexer::new("x = 1 // note\ny").tokenize().unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Newline);
        assert_eq!(tokens[4].kind, TokenKind::Ident("y".into()));
        assert_eq!(tokens[4].span.line, 2);
        assert_eq!(tokens[4].span.col, 1);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("a b");
        assert_eq!(lexer.peek().unwrap().kind, TokenKind::Ident("a".into()));
        assert_eq!(lexer.peek().unwrap().kind, TokenKind::Ident("a".into()));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Ident("a".into()));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Ident("b".into()));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn spans_are_not_degenerate() {
        for token in Lexer::new("out:output = sine(C4) * -3db").tokenize().unwrap() {
            assert!(token.span.start <= token.span.end);
        }
    }

    #[test]
    fn unclosed_quote_is_error() {
        assert!(Lexer::new("\"open").tokenize().is_err());
    }

    #[test]
    fn unexpected_character() {
        let err = Lexer::new("a @ b").tokenize().unwrap_err();
        assert_eq!(err.span.col, 3);
    }
}
