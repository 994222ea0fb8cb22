//! Character stream to token stream.
//!
//! A single-pass `Peekable<CharIndices>` scanner, following
//! `caliber-dsl::lexer::scanner::Lexer`'s shape: `line`/`column`/`pos`
//! counters, a `tokenize()` entry point, and one `scan_*` helper per
//! character class. Lexing never throws: diagnostics are accumulated and
//! the lexer always reaches `eof`.

use crate::token::{Span, Token, TokenKind};
use kusto_core::Diagnostic;
use std::iter::Peekable;
use std::str::CharIndices;

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize the entire source. Always returns a token stream ending in
    /// `eof`, plus any diagnostics accumulated along the way.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '{' => {
                    self.advance();
                    TokenKind::LBrace
                }
                '}' => {
                    self.advance();
                    TokenKind::RBrace
                }
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                '[' => {
                    self.advance();
                    TokenKind::LBracket
                }
                ']' => {
                    self.advance();
                    TokenKind::RBracket
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                ';' => {
                    self.advance();
                    TokenKind::Semicolon
                }
                '.' => {
                    self.advance();
                    TokenKind::Dot
                }
                '|' => {
                    self.advance();
                    TokenKind::Pipe
                }

                '=' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Eq
                    } else {
                        TokenKind::Assign
                    }
                }

                '!' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Ne
                    } else if self.matches_keyword_ahead("contains") {
                        self.consume_ahead("contains");
                        TokenKind::NotContains
                    } else if self.matches_keyword_ahead("in") {
                        self.consume_ahead("in");
                        TokenKind::NotIn
                    } else {
                        TokenKind::Error(format!(
                            "unexpected character '!' at line {start_line}, column {start_col}"
                        ))
                    }
                }

                '<' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Le
                    } else if self.peek_char() == Some('>') {
                        self.advance();
                        TokenKind::Ne
                    } else {
                        TokenKind::Lt
                    }
                }

                '>' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }

                '+' => {
                    self.advance();
                    TokenKind::Plus
                }
                '-' => {
                    self.advance();
                    TokenKind::Minus
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '/' => {
                    self.advance();
                    TokenKind::Slash
                }
                '%' => {
                    self.advance();
                    TokenKind::Percent
                }

                '"' | '\'' => self.scan_string(c),
                '`' => self.scan_quoted_identifier(),

                c if c.is_ascii_digit() => self.scan_number_or_timespan(),

                c if c.is_ascii_alphabetic() || c == '_' => {
                    self.scan_identifier_keyword_or_guid(start_pos)
                }

                c => {
                    self.advance();
                    TokenKind::Error(format!(
                        "unexpected character '{c}' at line {start_line}, column {start_col}"
                    ))
                }
            },
        };

        if let TokenKind::Error(ref message) = kind {
            self.diagnostics
                .push(Diagnostic::syntax(message.clone()).at(start_line, start_col));
        }

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        }
    }

    fn scan_identifier_keyword_or_guid(&mut self, start_pos: usize) -> TokenKind {
        if let Some(guid) = self.try_scan_guid() {
            return TokenKind::Guid(guid);
        }

        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let ident = &self.source[start_pos..self.pos];
        let lower = ident.to_lowercase();

        if lower == "datetime" && self.peek_char() == Some('(') {
            return self.scan_datetime_literal();
        }

        match lower.as_str() {
            "where" => TokenKind::Where,
            "project" => TokenKind::Project,
            "extend" => TokenKind::Extend,
            "summarize" => TokenKind::Summarize,
            "by" => TokenKind::By,
            "order" => TokenKind::Order,
            "asc" => TokenKind::Asc,
            "desc" => TokenKind::Desc,
            "top" => TokenKind::Top,
            "limit" => TokenKind::Limit,
            "distinct" => TokenKind::Distinct,
            "join" => TokenKind::Join,
            "inner" => TokenKind::Inner,
            "left" => TokenKind::Left,
            "right" => TokenKind::Right,
            "full" => TokenKind::Full,
            "on" => TokenKind::On,
            "union" => TokenKind::Union,
            "let" => TokenKind::Let,
            "as" => TokenKind::As,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "contains" => TokenKind::Contains,
            "startswith" => TokenKind::StartsWith,
            "endswith" => TokenKind::EndsWith,
            "matches" => TokenKind::Matches,
            "like" => TokenKind::Like,
            "between" => TokenKind::Between,
            "case" => TokenKind::Case,
            "when" => TokenKind::When,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(ident.to_string()),
        }
    }

    /// If the characters ahead of the cursor form a GUID
    /// (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`) not followed by another
    /// identifier character, consume and return it.
    fn try_scan_guid(&mut self) -> Option<String> {
        const SEGMENT_LENGTHS: [usize; 5] = [8, 4, 4, 4, 12];
        let rest = &self.source[self.pos..];
        let mut idx = 0usize;
        let bytes = rest.as_bytes();
        for (seg_no, &len) in SEGMENT_LENGTHS.iter().enumerate() {
            for _ in 0..len {
                match bytes.get(idx) {
                    Some(b) if (*b as char).is_ascii_hexdigit() => idx += 1,
                    _ => return None,
                }
            }
            if seg_no < SEGMENT_LENGTHS.len() - 1 {
                match bytes.get(idx) {
                    Some(b'-') => idx += 1,
                    _ => return None,
                }
            }
        }
        if let Some(&next) = bytes.get(idx) {
            if (next as char).is_ascii_alphanumeric() || next == b'_' {
                return None;
            }
        }
        let text = &rest[..idx];
        for _ in 0..idx {
            self.advance();
        }
        Some(text.to_string())
    }

    fn scan_datetime_literal(&mut self) -> TokenKind {
        self.advance(); // consume '('
        let mut depth = 1usize;
        let start = self.pos;
        loop {
            match self.peek_char() {
                None => {
                    self.diagnostics.push(
                        Diagnostic::syntax("unterminated datetime literal")
                            .at(self.line, self.column),
                    );
                    break;
                }
                Some('(') => {
                    depth += 1;
                    self.advance();
                }
                Some(')') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let inner = self.source[start..self.pos].trim().to_string();
        if self.peek_char() == Some(')') {
            self.advance();
        }
        TokenKind::Datetime(inner)
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let start_line = self.line;
        let start_col = self.column;
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => {
                    self.diagnostics.push(
                        Diagnostic::syntax("unterminated string literal")
                            .at(start_line, start_col),
                    );
                    return TokenKind::Error("unterminated string".to_string());
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        }
                        Some('r') => {
                            self.advance();
                            value.push('\r');
                        }
                        Some('\\') => {
                            self.advance();
                            value.push('\\');
                        }
                        Some(c) if c == quote => {
                            self.advance();
                            value.push(c);
                        }
                        Some(c) => {
                            self.advance();
                            value.push('\\');
                            value.push(c);
                        }
                        None => value.push('\\'),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        TokenKind::String(value)
    }

    fn scan_quoted_identifier(&mut self) -> TokenKind {
        let start_line = self.line;
        let start_col = self.column;
        self.advance(); // opening backtick
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => {
                    self.diagnostics.push(
                        Diagnostic::syntax("unterminated quoted identifier")
                            .at(start_line, start_col),
                    );
                    return TokenKind::Error("unterminated quoted identifier".to_string());
                }
                Some('`') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        TokenKind::QuotedIdentifier(value)
    }

    fn scan_number_or_timespan(&mut self) -> TokenKind {
        let start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !is_float {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }
        // scientific notation
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let save_pos = self.pos;
            let save_col = self.column;
            let mut iter = self.chars.clone();
            iter.next();
            let exp_ok = match iter.peek() {
                Some((_, '+')) | Some((_, '-')) => {
                    let mut iter2 = iter.clone();
                    iter2.next();
                    matches!(iter2.peek(), Some((_, d)) if d.is_ascii_digit())
                }
                Some((_, d)) if d.is_ascii_digit() => true,
                _ => false,
            };
            if exp_ok {
                is_float = true;
                self.advance(); // e/E
                if matches!(self.peek_char(), Some('+') | Some('-')) {
                    self.advance();
                }
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        self.advance();
                    } else {
                        break;
                    }
                }
            } else {
                let _ = (save_pos, save_col);
            }
        }

        let numeric_end = self.pos;

        if let Some(ns) = self.try_scan_timespan_suffix() {
            let text = &self.source[start..numeric_end];
            return match text.parse::<f64>() {
                Ok(n) => TokenKind::Timespan((n * ns as f64) as i64),
                Err(_) => TokenKind::Error(format!("invalid timespan literal '{text}'")),
            };
        }

        let text = &self.source[start..numeric_end];
        if is_float {
            match text.parse::<f64>() {
                Ok(n) => TokenKind::Float(n),
                Err(_) => TokenKind::Error(format!("invalid number literal '{text}'")),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Integer(n),
                Err(_) => match text.parse::<f64>() {
                    Ok(n) => TokenKind::Float(n),
                    Err(_) => TokenKind::Error(format!("invalid number literal '{text}'")),
                },
            }
        }
    }

    /// Nanosecond multiplier for an immediately-adjacent timespan suffix
    /// (`d h m s ms`), longest match first so `ms` is not read as `m`.
    fn try_scan_timespan_suffix(&mut self) -> Option<i64> {
        const NS_PER_MS: i64 = 1_000_000;
        const NS_PER_S: i64 = 1_000 * NS_PER_MS;
        const NS_PER_M: i64 = 60 * NS_PER_S;
        const NS_PER_H: i64 = 60 * NS_PER_M;
        const NS_PER_D: i64 = 24 * NS_PER_H;

        let rest = &self.source[self.pos..];
        if let Some(stripped) = rest.strip_prefix("ms") {
            if !stripped.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                self.advance();
                self.advance();
                return Some(NS_PER_MS);
            }
            return None;
        }
        let mut chars = rest.chars();
        let first = chars.next()?;
        let multiplier = match first {
            'd' => NS_PER_D,
            'h' => NS_PER_H,
            'm' => NS_PER_M,
            's' => NS_PER_S,
            _ => return None,
        };
        if matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric()) {
            return None;
        }
        self.advance();
        Some(multiplier)
    }

    fn matches_keyword_ahead(&self, word: &str) -> bool {
        let rest = &self.source[self.pos..];
        if !rest.to_lowercase().starts_with(word) {
            return false;
        }
        !matches!(
            rest[word.len()..].chars().next(),
            Some(c) if c.is_ascii_alphanumeric() || c == '_'
        )
    }

    fn consume_ahead(&mut self, word: &str) {
        for _ in 0..word.chars().count() {
            self.advance();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some('/') => {
                    let next = self.peek_next_char();
                    if next == Some('/') {
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    } else if next == Some('*') {
                        let start_line = self.line;
                        let start_col = self.column;
                        self.advance();
                        self.advance();
                        let mut closed = false;
                        loop {
                            match self.peek_char() {
                                None => break,
                                Some('*') if self.peek_next_char() == Some('/') => {
                                    self.advance();
                                    self.advance();
                                    closed = true;
                                    break;
                                }
                                Some('\n') => {
                                    self.advance();
                                    self.line += 1;
                                    self.column = 1;
                                }
                                _ => {
                                    self.advance();
                                }
                            }
                        }
                        if !closed {
                            self.diagnostics.push(
                                Diagnostic::syntax("unterminated block comment")
                                    .at(start_line, start_col),
                            );
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].char_indices();
        iter.next();
        iter.next().map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            self.column += 1;
            Some(c)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, _) = Lexer::new(src).tokenize();
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_keywords_case_insensitively() {
        assert_eq!(
            kinds("WHERE where Where"),
            vec![TokenKind::Where, TokenKind::Where, TokenKind::Where, TokenKind::Eof]
        );
    }

    #[test]
    fn multi_char_operators_are_matched_longest_first() {
        assert_eq!(
            kinds("== != <> <= >="),
            vec![
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn bang_contains_and_bang_in() {
        assert_eq!(
            kinds("!contains !in"),
            vec![TokenKind::NotContains, TokenKind::NotIn, TokenKind::Eof]
        );
    }

    #[test]
    fn bang_keyword_requires_a_word_boundary() {
        let toks = kinds("!containsx");
        assert!(matches!(toks[0], TokenKind::Error(_)));
        assert_eq!(toks[1], TokenKind::Identifier("containsx".to_string()));

        let toks = kinds("!inrange");
        assert!(matches!(toks[0], TokenKind::Error(_)));
        assert_eq!(toks[1], TokenKind::Identifier("inrange".to_string()));
    }

    #[test]
    fn pipe_is_its_own_kind() {
        assert_eq!(kinds("|"), vec![TokenKind::Pipe, TokenKind::Eof]);
    }

    #[test]
    fn string_literal_with_escapes() {
        let kinds = kinds(r#""a\nb""#);
        assert_eq!(kinds, vec![TokenKind::String("a\nb".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_emits_diagnostic_and_reaches_eof() {
        let (tokens, diags) = Lexer::new("\"abc").tokenize();
        assert!(tokens.last().unwrap().is_eof());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn quoted_identifier() {
        assert_eq!(
            kinds("`my col`"),
            vec![TokenKind::QuotedIdentifier("my col".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn guid_literal_is_recognized() {
        let k = kinds("01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(
            k,
            vec![
                TokenKind::Guid("01234567-89ab-cdef-0123-456789abcdef".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn identifier_with_hyphen_like_prefix_but_wrong_shape_is_not_a_guid() {
        let k = kinds("abc-123");
        assert!(matches!(k[0], TokenKind::Identifier(_)));
    }

    #[test]
    fn timespan_suffix_promotes_number_to_timespan() {
        assert_eq!(kinds("5m"), vec![TokenKind::Timespan(5 * 60_000_000_000), TokenKind::Eof]);
        assert_eq!(kinds("10ms"), vec![TokenKind::Timespan(10_000_000), TokenKind::Eof]);
    }

    #[test]
    fn plain_number_without_suffix_stays_numeric() {
        assert_eq!(kinds("42"), vec![TokenKind::Integer(42), TokenKind::Eof]);
        assert_eq!(kinds("3.14"), vec![TokenKind::Float(3.14), TokenKind::Eof]);
    }

    #[test]
    fn datetime_literal_consumes_until_matching_paren() {
        let k = kinds("datetime(2021-01-01)");
        assert_eq!(k, vec![TokenKind::Datetime("2021-01-01".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn line_and_block_comments_are_skipped() {
        assert_eq!(
            kinds("where // comment\nproject /* block \n comment */ extend"),
            vec![TokenKind::Where, TokenKind::Project, TokenKind::Extend, TokenKind::Eof]
        );
    }

    #[test]
    fn lexer_always_reaches_eof_even_on_garbage_input() {
        let (tokens, diags) = Lexer::new("@@@").tokenize();
        assert!(tokens.last().unwrap().is_eof());
        assert_eq!(diags.len(), 3);
    }

    #[test]
    fn true_false_null_are_literal_keywords() {
        assert_eq!(
            kinds("true false null"),
            vec![
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Null,
                TokenKind::Eof
            ]
        );
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_lexer_always_ends_with_eof(src in "[a-zA-Z0-9 |=!<>()\\[\\]{}.,;_\"'\\-]{0,80}") {
            let (tokens, _) = Lexer::new(&src).tokenize();
            prop_assert!(tokens.last().unwrap().is_eof());
        }

        #[test]
        fn prop_span_positions_are_non_decreasing(src in "[a-zA-Z0-9 |=!<>()\\[\\]{}.,;_]{0,80}") {
            let (tokens, _) = Lexer::new(&src).tokenize();
            for pair in tokens.windows(2) {
                prop_assert!(pair[0].span.start <= pair[1].span.start);
            }
        }
    }
}
