//! Token classes, keyword table and lexer.
//!
//! Single axis words (`f`, `B3`, `u`) lex as selector terms, never as
//! identifiers. A sign written directly after a bare axis letter (`f-2`,
//! `r+1`) belongs to the term. `^` and `_` directly after a selector are the
//! up/down shorthands.

use std::collections::HashMap;
use std::sync::OnceLock;

use craftscript_core::result::SourceLocation;
use craftscript_core::selector::Axis;

use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    /// Selector term. `text` is the word as written, for named-argument keys.
    Axis {
        axis: Axis,
        magnitude: Option<i32>,
        text: String,
    },
    // Keywords
    Macro,
    If,
    Else,
    Repeat,
    While,
    Assert,
    Let,
    True,
    False,
    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Underscore,
    Eof,
}

impl Token {
    /// Short human description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Int(n) => format!("number {}", n),
            Token::Str(_) => "string".to_string(),
            Token::Axis { text, .. } => format!("selector '{}'", text),
            Token::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Macro => "macro",
            Token::If => "if",
            Token::Else => "else",
            Token::Repeat => "repeat",
            Token::While => "while",
            Token::Assert => "assert",
            Token::Let => "let",
            Token::True => "true",
            Token::False => "false",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::Assign => "=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Caret => "^",
            Token::Underscore => "_",
            Token::Ident(_) | Token::Int(_) | Token::Str(_) | Token::Axis { .. } | Token::Eof => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Located {
    pub token: Token,
    pub loc: SourceLocation,
}

/// Keyword table, built once.
pub fn keywords() -> &'static HashMap<&'static str, Token> {
    static KEYWORDS: OnceLock<HashMap<&'static str, Token>> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        HashMap::from([
            ("macro", Token::Macro),
            ("if", Token::If),
            ("else", Token::Else),
            ("repeat", Token::Repeat),
            ("while", Token::While),
            ("assert", Token::Assert),
            ("let", Token::Let),
            ("true", Token::True),
            ("false", Token::False),
        ])
    })
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Located>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn push(&mut self, token: Token, loc: SourceLocation) {
        self.tokens.push(Located { token, loc });
    }

    /// Consumes `second` if it follows, choosing between a two-char and a one-char token.
    fn pair(&mut self, loc: SourceLocation, second: char, both: Token, single: Token) {
        if self.peek() == Some(second) {
            self.bump();
            self.push(both, loc);
        } else {
            self.push(single, loc);
        }
    }

    fn run(mut self) -> Result<Vec<Located>, SyntaxError> {
        while let Some(c) = self.peek() {
            let loc = self.loc();
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => return Err(SyntaxError::new(loc, "unterminated block comment")),
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                '"' | '\'' => self.string(loc)?,
                c if c.is_ascii_digit() => self.number(loc)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(loc)?,
                _ => {
                    self.bump();
                    match c {
                        '(' => self.push(Token::LParen, loc),
                        ')' => self.push(Token::RParen, loc),
                        '{' => self.push(Token::LBrace, loc),
                        '}' => self.push(Token::RBrace, loc),
                        ',' => self.push(Token::Comma, loc),
                        ':' => self.push(Token::Colon, loc),
                        ';' => self.push(Token::Semicolon, loc),
                        '+' => self.push(Token::Plus, loc),
                        '-' => self.push(Token::Minus, loc),
                        '*' => self.push(Token::Star, loc),
                        '/' => self.push(Token::Slash, loc),
                        '^' => self.push(Token::Caret, loc),
                        '=' => self.pair(loc, '=', Token::EqEq, Token::Assign),
                        '!' => self.pair(loc, '=', Token::NotEq, Token::Bang),
                        '<' => self.pair(loc, '=', Token::Le, Token::Lt),
                        '>' => self.pair(loc, '=', Token::Ge, Token::Gt),
                        '&' if self.peek() == Some('&') => {
                            self.bump();
                            self.push(Token::AndAnd, loc);
                        }
                        '|' if self.peek() == Some('|') => {
                            self.bump();
                            self.push(Token::OrOr, loc);
                        }
                        other => {
                            return Err(SyntaxError::new(loc, format!("unexpected character '{}'", other)))
                        }
                    }
                }
            }
        }
        let end = self.loc();
        self.push(Token::Eof, end);
        Ok(self.tokens)
    }

    fn string(&mut self, loc: SourceLocation) -> Result<(), SyntaxError> {
        let quote = self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(SyntaxError::new(loc, "unterminated string")),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('\\') => s.push('\\'),
                    Some('"') => s.push('"'),
                    Some('\'') => s.push('\''),
                    Some(c) => {
                        s.push('\\');
                        s.push(c);
                    }
                    None => return Err(SyntaxError::new(loc, "unterminated string")),
                },
                Some(c) if Some(c) == quote => break,
                Some(c) => s.push(c),
            }
        }
        self.push(Token::Str(s), loc);
        Ok(())
    }

    fn digits(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            s.push(c);
            self.bump();
        }
        s
    }

    fn number(&mut self, loc: SourceLocation) -> Result<(), SyntaxError> {
        let digits = self.digits();
        if self.peek().map_or(false, |c| c.is_ascii_alphabetic() || c == '_') {
            return Err(SyntaxError::new(loc, format!("invalid number '{}'", digits)));
        }
        let n = digits
            .parse::<i64>()
            .map_err(|_| SyntaxError::new(loc, format!("number '{}' is out of range", digits)))?;
        self.push(Token::Int(n), loc);
        Ok(())
    }

    fn word(&mut self, loc: SourceLocation) -> Result<(), SyntaxError> {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            word.push(c);
            self.bump();
        }

        if word == "_" {
            self.push(Token::Underscore, loc);
            return Ok(());
        }
        if let Some(kw) = keywords().get(word.as_str()) {
            self.push(kw.clone(), loc);
            return Ok(());
        }

        // `f3_` is the selector `f3` followed by the down shorthand.
        let (stem, trailing_down) = match word.strip_suffix('_') {
            Some(stem) if Axis::is_axis_word(stem) => (stem.to_string(), true),
            _ => (word.clone(), false),
        };

        let Some((axis, digits)) = Axis::parse_word(&stem) else {
            self.push(Token::Ident(word), loc);
            return Ok(());
        };

        let mut text = stem.clone();
        let magnitude = match digits {
            Some(d) => Some(parse_magnitude(d, loc)?),
            None if !trailing_down => self.signed_magnitude(&mut text, loc)?,
            None => None,
        };
        self.push(Token::Axis { axis, magnitude, text }, loc);

        if trailing_down {
            let down_loc = SourceLocation::new(loc.line, loc.column + stem.chars().count());
            self.push(Token::Underscore, down_loc);
        } else if magnitude.is_some() && digits.is_none() && self.peek() == Some('_') {
            // `f-2_`
            if !self.peek_at(1).map_or(false, |c| c.is_ascii_alphanumeric() || c == '_') {
                let down_loc = self.loc();
                self.bump();
                self.push(Token::Underscore, down_loc);
            }
        }
        Ok(())
    }

    /// Reads an adjacent `-n` / `+n` after a bare axis letter.
    fn signed_magnitude(&mut self, text: &mut String, loc: SourceLocation) -> Result<Option<i32>, SyntaxError> {
        let sign = match self.peek() {
            Some(c @ ('-' | '+')) if self.peek_at(1).map_or(false, |d| d.is_ascii_digit()) => c,
            _ => return Ok(None),
        };
        self.bump();
        let digits = self.digits();
        text.push(sign);
        text.push_str(&digits);
        let n = parse_magnitude(&digits, loc)?;
        Ok(Some(if sign == '-' { -n } else { n }))
    }
}

fn parse_magnitude(digits: &str, loc: SourceLocation) -> Result<i32, SyntaxError> {
    digits
        .parse::<i32>()
        .map_err(|_| SyntaxError::new(loc, format!("selector magnitude '{}' is out of range", digits)))
}

/// Splits `source` into located tokens, ending with [`Token::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Located>, SyntaxError> {
    Lexer::new(source).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|l| l.token).collect()
    }

    fn axis(axis: Axis, magnitude: Option<i32>, text: &str) -> Token {
        Token::Axis { axis, magnitude, text: text.to_string() }
    }

    #[test]
    fn test_tokenize_command() {
        assert_eq!(
            kinds("dig(f1);"),
            vec![
                Token::Ident("dig".into()),
                Token::LParen,
                axis(Axis::F, Some(1), "f1"),
                Token::RParen,
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_not_identifiers() {
        assert_eq!(kinds("repeat")[0], Token::Repeat);
        assert_eq!(kinds("repeater")[0], Token::Ident("repeater".into()));
    }

    #[test]
    fn test_signed_selector_terms() {
        assert_eq!(
            kinds("f-2+r+1"),
            vec![
                axis(Axis::F, Some(-2), "f-2"),
                Token::Plus,
                axis(Axis::R, Some(1), "r+1"),
                Token::Eof,
            ]
        );
        // A spaced minus is subtraction.
        assert_eq!(
            kinds("f - 2"),
            vec![axis(Axis::F, None, "f"), Token::Minus, Token::Int(2), Token::Eof]
        );
    }

    #[test]
    fn test_shorthand_suffixes() {
        assert_eq!(
            kinds("f1^ f2_ _"),
            vec![
                axis(Axis::F, Some(1), "f1"),
                Token::Caret,
                axis(Axis::F, Some(2), "f2"),
                Token::Underscore,
                Token::Underscore,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_axis_like_identifiers() {
        assert_eq!(kinds("front")[0], Token::Ident("front".into()));
        assert_eq!(kinds("f_x")[0], Token::Ident("f_x".into()));
        assert_eq!(kinds("_tmp")[0], Token::Ident("_tmp".into()));
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("== != <= >= < > && || ! ="),
            vec![
                Token::EqEq,
                Token::NotEq,
                Token::Le,
                Token::Ge,
                Token::Lt,
                Token::Gt,
                Token::AndAnd,
                Token::OrOr,
                Token::Bang,
                Token::Assign,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("// line\nlog(/* inline */ 1);"),
            vec![
                Token::Ident("log".into()),
                Token::LParen,
                Token::Int(1),
                Token::RParen,
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_locations_are_one_based() {
        let toks = tokenize("a\n  bb").unwrap();
        assert_eq!(toks[0].loc, SourceLocation::new(1, 1));
        assert_eq!(toks[1].loc, SourceLocation::new(2, 3));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"b\n""#)[0], Token::Str("a\"b\n".into()));
        assert_eq!(kinds("'single'")[0], Token::Str("single".into()));
    }

    #[test]
    fn test_lex_errors() {
        let err = tokenize("log(\"open").unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));
        let err = tokenize("x\n/* never closed").unwrap_err();
        assert_eq!((err.line, err.column), (2, 1));
        assert!(tokenize("a & b").is_err());
        assert!(tokenize("12abc").is_err());
    }
}
