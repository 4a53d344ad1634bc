//! The token definition for the boolean search language.

use serde::Serialize;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    And,     // "and"
    Or,      // "or"
    Not,     // "not"
    Between, // "between"

    // Literals
    Word(&'a str),   // identifiers, dotted paths, bare and wildcard strings
    Number(&'a str), // raw numeric text, typed later by the value parser
    String(&'a str), // quoted string contents, without the quotes

    // Punctuation
    LParen, // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,

    // Comparators
    Eq,    // =
    EqEq,  // ==
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=

    // Bitwise markers
    Tilde, // ~
    Amp,   // &
    Pipe,  // |

    // Special
    Illegal,      // An illegal/unknown character
    Unterminated, // A quoted string missing its closing quote
}

impl TokenKind<'_> {
    /// Short human readable form used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::And => "'and'".to_string(),
            TokenKind::Or => "'or'".to_string(),
            TokenKind::Not => "'not'".to_string(),
            TokenKind::Between => "'between'".to_string(),
            TokenKind::Word(w) => format!("word '{}'", w),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::String(s) => format!("string \"{}\"", s),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::EqEq => "'=='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Gte => "'>='".to_string(),
            TokenKind::Lte => "'<='".to_string(),
            TokenKind::Tilde => "'~'".to_string(),
            TokenKind::Amp => "'&'".to_string(),
            TokenKind::Pipe => "'|'".to_string(),
            TokenKind::Illegal => "illegal character".to_string(),
            TokenKind::Unterminated => "unterminated string".to_string(),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// An empty span positioned at `offset`.
    pub fn at(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }
}
