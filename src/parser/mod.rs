//! 布尔检索字符串的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   └─ parse_or_expression()
//!        ├─ parse_and_expression()
//!        │    ├─ parse_not_expression()
//!        │    │    └─ parse_primary_expression()
//!        │    │         ├─ "(" → 分组表达式 (递归调用parse_or_expression)
//!        │    │         └─ parse_condition()                      [condition.rs]
//!        │    │              ├─ ident "(" args ")" [op value] → ExprCondition
//!        │    │              ├─ path "between" value "and" value
//!        │    │              ├─ path ("&" | "|") value        → 位掩码
//!        │    │              └─ path op value
//!        │    │                   └─ parse_value()              [value.rs]
//!        │    │
//!        │    └─ 遇到 "and" 时继续解析下一个 not 表达式
//!        │
//!        └─ 遇到 "or" 时继续解析下一个 and 表达式
//! ```
//!
//! ## 优先级（从高到低）
//!
//! 1. **分组** `(expression)`
//! 2. **NOT** `not expression` (右结合)
//! 3. **AND** `expr and expr` (左结合)
//! 4. **OR** `expr or expr` (左结合)
//!
//! 因此 `a=1 or b=2 and not c=3` 解析为 `a=1 or (b=2 and (not c=3))`。
//!
//! 括号、`not` 和位运算中的 `~`、`(` 的嵌套深度不超过 [`MAX_NESTING_DEPTH`]，
//! 超出时返回语法错误而不是耗尽栈空间。
//!
//! ## 示例
//!
//! ```text
//! field1=*something* and not (field2==1 or parent.field3<=10.0)
//! x between 1 and 10
//! cone(ra, dec, radius=1.0)==1
//! npergood(nsa.z < 0.1) >= 3
//! hist([1, 2, 3], 10)
//! flags & ~64
//! ```

mod condition;
mod value;

use crate::ast::{BoolNode, Node};
use crate::error::{ParseError, Result};
use crate::token::{Span, Token, TokenKind};

/// 允许的最大嵌套深度
pub const MAX_NESTING_DEPTH: usize = 128;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    /// 当前嵌套深度
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回向前 `offset` 个位置的 token 类型
    fn peek_kind_at(&self, offset: usize) -> Option<&'a TokenKind<'a>> {
        self.tokens.get(self.position + offset).map(|t| &t.kind)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    /// 期望特定类型的 token 并推进，否则返回描述 `what` 的语法错误
    fn expect(&mut self, expected: TokenKind, what: &str) -> Result<&'a Token<'a>> {
        match self.peek() {
            Some(token)
                if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) =>
            {
                self.position += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// 最后一个 token 之后的空 span
    fn eof_span(&self) -> Span {
        self.tokens
            .last()
            .map(|t| Span::at(t.span.end))
            .unwrap_or_default()
    }

    /// 当前 token 的 span，已到输入末尾时返回末尾位置
    fn current_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or_else(|| self.eof_span())
    }

    /// 进入一层嵌套，超过 [`MAX_NESTING_DEPTH`] 时在当前 token 处报错
    fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::grammar(
                format!("expression nested too deeply (limit {})", MAX_NESTING_DEPTH),
                self.current_span(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// 当前位置的语法错误
    fn unexpected(&self, what: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::grammar(
                format!("expected {}, found {}", what, token.kind.describe()),
                token.span,
            ),
            None => ParseError::grammar(
                format!("expected {}, but reached end of input", what),
                self.eof_span(),
            ),
        }
    }

    /// 将整个 token 流解析为条件树的根节点
    pub fn parse(&mut self) -> Result<Node> {
        if self.tokens.is_empty() {
            return Err(ParseError::grammar("empty search expression", Span::at(0)));
        }

        let node = self.parse_or_expression()?;

        if let Some(token) = self.peek() {
            let message = if token.kind == TokenKind::RParen {
                "unbalanced ')' without a matching '('".to_string()
            } else {
                format!("unexpected {} after complete expression", token.kind.describe())
            };
            return Err(ParseError::grammar(message, token.span));
        }

        Ok(node)
    }

    /// 最低优先级
    ///
    /// 语法： `and_expr ("or" and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Node> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Node::Bool(BoolNode::Or(Box::new(left), Box::new(right)));
        }

        Ok(left)
    }

    /// 语法：`not_expr ("and" not_expr)*`
    fn parse_and_expression(&mut self) -> Result<Node> {
        let mut left = self.parse_not_expression()?;

        while self.match_token(&TokenKind::And) {
            self.advance();
            let right = self.parse_not_expression()?;
            left = Node::Bool(BoolNode::And(Box::new(left), Box::new(right)));
        }

        Ok(left)
    }

    /// 语法：`"not" not_expr | primary`
    fn parse_not_expression(&mut self) -> Result<Node> {
        if self.match_token(&TokenKind::Not) {
            self.descend()?;
            self.advance();
            let expr = self.parse_not_expression()?;
            self.ascend();
            Ok(Node::Bool(BoolNode::Not(Box::new(expr))))
        } else {
            self.parse_primary_expression()
        }
    }

    /// 语法：`"(" expr ")" | condition`
    fn parse_primary_expression(&mut self) -> Result<Node> {
        if self.match_token(&TokenKind::LParen) {
            let open = self.current_span();
            self.descend()?;
            self.advance();
            let expr = self.parse_or_expression()?;
            if !self.match_token(&TokenKind::RParen) {
                let mut err = self.unexpected("')'");
                if let ParseError::Grammar { message, .. } = &mut err {
                    message.push_str(&format!(" to close '(' at offset {}", open.start));
                }
                return Err(err);
            }
            self.advance();
            self.ascend();
            Ok(expr)
        } else {
            self.parse_condition()
        }
    }
}
