//! 布尔检索解析的错误类型

use crate::token::Span;
use thiserror::Error;

/// 解析布尔检索字符串时遇到的第一个错误
///
/// 每个变体都带有出错输入的字节 span，以及说明此处期望内容的消息。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// 输入片段不匹配任何 token 形式
    #[error("lex error at {}..{}: {message}", span.start, span.end)]
    Lex { message: String, span: Span },

    /// token 本身合法，但顺序不符合语法
    #[error("syntax error at {}..{}: {message}", span.start, span.end)]
    Grammar { message: String, span: Span },

    /// 无法转换为带类型值的字面量
    #[error("invalid value at {}..{}: {message}", span.start, span.end)]
    ValueParse { message: String, span: Span },

    /// 运算符无法组合的值类型
    #[error("type mismatch at {}..{}: {message}", span.start, span.end)]
    TypeMismatch { message: String, span: Span },
}

impl ParseError {
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Self::Lex { message: message.into(), span }
    }

    pub fn grammar(message: impl Into<String>, span: Span) -> Self {
        Self::Grammar { message: message.into(), span }
    }

    pub fn value(message: impl Into<String>, span: Span) -> Self {
        Self::ValueParse { message: message.into(), span }
    }

    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        Self::TypeMismatch { message: message.into(), span }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Lex { span, .. }
            | Self::Grammar { span, .. }
            | Self::ValueParse { span, .. }
            | Self::TypeMismatch { span, .. } => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lex { message, .. }
            | Self::Grammar { message, .. }
            | Self::ValueParse { message, .. }
            | Self::TypeMismatch { message, .. } => message,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
