//! 布尔检索字符串的词法分析器

use crate::error::{ParseError, Result};
use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取引号字符串，开头的引号已被消费。不支持转义
    fn read_string(&mut self, start: usize, quote: char) -> Token<'a> {
        let content_start = self.position;
        while let Some(c) = self.peek() {
            if c == quote {
                let content = &self.input[content_start..self.position];
                self.bump(); // closing quote
                return Token {
                    kind: TokenKind::String(content),
                    span: Span::new(start, self.position),
                };
            }
            self.bump();
        }
        Token {
            kind: TokenKind::Unterminated,
            span: Span::new(start, self.position),
        }
    }

    /// 读取一个单词：标识符、点分路径、数字以及 `*foo*`、`2015-01-01`
    /// 这样的裸字符串
    fn read_word(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if is_word_char(c) {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        let kind = if is_number(literal) {
            TokenKind::Number(literal)
        } else {
            match_keyword(literal)
        };
        Token { kind, span: Span::new(start, self.position) }
    }

    fn single(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token { kind, span: Span::new(start, self.position) }
    }

    /// 如果后面跟着 `=` 则一并消费，在两种类型中选择
    fn with_eq(&mut self, start: usize, plain: TokenKind<'a>, with_eq: TokenKind<'a>) -> Token<'a> {
        if self.peek() == Some('=') {
            self.bump();
            self.single(with_eq, start)
        } else {
            self.single(plain, start)
        }
    }
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '*' | '-' | '+')
}

/// `[+-]?digits[.digits*][(e|E)[+-]?digits]`
pub(crate) fn is_number(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == int_start {
        return false;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

pub(crate) fn is_keyword(s: &str) -> bool {
    !matches!(match_keyword(s), TokenKind::Word(_))
}

fn match_keyword(s: &str) -> TokenKind {
    match s.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "between" => TokenKind::Between,
        _ => TokenKind::Word(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let c = self.bump()?;

        let token = match c {
            '(' => self.single(TokenKind::LParen, start),
            ')' => self.single(TokenKind::RParen, start),
            '[' => self.single(TokenKind::LBracket, start),
            ']' => self.single(TokenKind::RBracket, start),
            ',' => self.single(TokenKind::Comma, start),
            '~' => self.single(TokenKind::Tilde, start),
            '&' => self.single(TokenKind::Amp, start),
            '|' => self.single(TokenKind::Pipe, start),
            '=' => self.with_eq(start, TokenKind::Eq, TokenKind::EqEq),
            '<' => self.with_eq(start, TokenKind::Lt, TokenKind::Lte),
            '>' => self.with_eq(start, TokenKind::Gt, TokenKind::Gte),
            '!' => self.with_eq(start, TokenKind::Illegal, TokenKind::NotEq),
            '"' | '\'' => self.read_string(start, c),
            c if is_word_char(c) => self.read_word(start),
            _ => self.single(TokenKind::Illegal, start),
        };
        Some(token)
    }
}

/// 对整个输入进行分词，遇到第一个非法片段时返回错误
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    for token in Lexer::new(input) {
        match token.kind {
            TokenKind::Illegal => {
                let fragment = &input[token.span.start..token.span.end];
                return Err(ParseError::lex(
                    format!("unexpected character '{}'", fragment),
                    token.span,
                ));
            }
            TokenKind::Unterminated => {
                return Err(ParseError::lex("unterminated string literal", token.span));
            }
            _ => tokens.push(token),
        }
    }
    tracing::trace!(count = tokens.len(), "tokenized boolean search");
    Ok(tokens)
}
