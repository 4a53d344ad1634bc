//! 字面量值：字符串、数字以及位运算组合的整数
//!
//! `~` 在这里总是被求值为具体整数。`flags=~2` 与 `-3` 比较，
//! `~` 标记不会以文本形式留在条件树中。

use super::Parser;
use crate::ast::{BitwiseValue, StringLiteral, Value};
use crate::error::{ParseError, Result};
use crate::token::{Span, TokenKind};

/// 已求值的位运算操作数或表达式，以及规范化后的文本
struct Bits {
    value: i64,
    expr: String,
}

impl<'a> Parser<'a> {
    /// 将单个字面量解析为带类型的值
    pub(super) fn parse_value(&mut self) -> Result<Value> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("a value"));
        };
        match token.kind {
            TokenKind::String(s) => {
                self.advance();
                Ok(Value::String(StringLiteral::new(s)))
            }
            TokenKind::Word(w) => {
                self.advance();
                Ok(Value::String(StringLiteral::new(w)))
            }
            TokenKind::Number(text)
                if !matches!(self.peek_kind_at(1), Some(TokenKind::Amp | TokenKind::Pipe)) =>
            {
                self.advance();
                parse_number(text, token.span)
            }
            TokenKind::Number(_) | TokenKind::Tilde | TokenKind::LParen => {
                let bits = self.parse_bit_expression()?;
                Ok(Value::Bitwise(BitwiseValue {
                    value: bits.value,
                    expr: bits.expr,
                }))
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    /// `operand (("&" | "|") operand)*`，从左到右归约
    fn parse_bit_expression(&mut self) -> Result<Bits> {
        let mut acc = self.parse_bit_operand()?;
        loop {
            let and = match self.peek_kind_at(0) {
                Some(TokenKind::Amp) => true,
                Some(TokenKind::Pipe) => false,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_bit_operand()?;
            acc = if and {
                Bits {
                    value: acc.value & rhs.value,
                    expr: format!("{}&{}", acc.expr, rhs.expr),
                }
            } else {
                Bits {
                    value: acc.value | rhs.value,
                    expr: format!("{}|{}", acc.expr, rhs.expr),
                }
            };
        }
        Ok(acc)
    }

    /// `"~" operand | "(" bit_expression ")" | integer`
    fn parse_bit_operand(&mut self) -> Result<Bits> {
        let span = self.current_span();
        if matches!(self.peek_kind_at(0), Some(TokenKind::Tilde | TokenKind::LParen)) {
            self.descend()?;
        }
        let Some(token) = self.advance() else {
            return Err(ParseError::value(
                "malformed bitwise expression: expected an integer operand, but reached end of input",
                span,
            ));
        };
        match token.kind {
            TokenKind::Tilde => {
                let inner = self.parse_bit_operand()?;
                self.ascend();
                Ok(Bits {
                    value: !inner.value,
                    expr: format!("~{}", inner.expr),
                })
            }
            TokenKind::LParen => {
                let inner = self.parse_bit_expression()?;
                self.expect(TokenKind::RParen, "')' to close the bitwise expression")?;
                self.ascend();
                Ok(Bits {
                    value: inner.value,
                    expr: format!("({})", inner.expr),
                })
            }
            TokenKind::Number(text) => match parse_number(text, token.span)? {
                Value::Integer(n) => Ok(Bits {
                    value: n,
                    expr: n.to_string(),
                }),
                _ => Err(ParseError::value(
                    format!("bitwise operands must be integers, found {}", text),
                    token.span,
                )),
            },
            ref other => Err(ParseError::value(
                format!(
                    "malformed bitwise expression: expected an integer operand, found {}",
                    other.describe()
                ),
                token.span,
            )),
        }
    }
}

/// 含小数点或指数时为浮点数，否则为整数。超出范围的值返回错误
fn parse_number(text: &str, span: Span) -> Result<Value> {
    if text.contains(['.', 'e', 'E']) {
        let x = text
            .parse::<f64>()
            .map_err(|e| ParseError::value(format!("invalid float '{}': {}", text, e), span))?;
        if !x.is_finite() {
            return Err(ParseError::value(
                format!("float '{}' is out of range", text),
                span,
            ));
        }
        Ok(Value::Float(x))
    } else {
        text.parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| ParseError::value(format!("invalid integer '{}': {}", text, e), span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Condition, Node, Operator};
    use crate::lexer::tokenize;

    fn value_of(input: &str) -> Result<Value> {
        let tokens = tokenize(input)?;
        Parser::new(&tokens).parse().map(|node| match node {
            Node::Condition(Condition { mut values, .. }) => values.remove(0),
            other => panic!("Expected condition, got {:?}", other),
        })
    }

    fn bitwise(value: i64, expr: &str) -> Value {
        Value::Bitwise(BitwiseValue {
            value,
            expr: expr.to_string(),
        })
    }

    #[test]
    fn test_numbers() {
        assert_eq!(value_of("a==42").unwrap(), Value::Integer(42));
        assert_eq!(value_of("a==-7").unwrap(), Value::Integer(-7));
        assert_eq!(value_of("a==+7").unwrap(), Value::Integer(7));
        assert_eq!(value_of("a==10.0").unwrap(), Value::Float(10.0));
        assert_eq!(value_of("a==1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(value_of("a==2.5E-1").unwrap(), Value::Float(0.25));
    }

    #[test]
    fn test_integer_overflow_is_value_error() {
        let err = value_of("a==99999999999999999999").unwrap_err();
        assert!(matches!(err, ParseError::ValueParse { .. }));
        let err = value_of("a==1e999").unwrap_err();
        assert!(matches!(err, ParseError::ValueParse { .. }));
        assert_eq!(err.span(), Span::new(3, 8));
        let err = value_of("a==-1e999").unwrap_err();
        assert!(matches!(err, ParseError::ValueParse { .. }));
    }

    #[test]
    fn test_strings() {
        assert_eq!(value_of("a==foo").unwrap(), Value::string("foo"));
        assert_eq!(value_of(r#"a=="foo bar""#).unwrap(), Value::string("foo bar"));
        assert_eq!(value_of("a=='42'").unwrap(), Value::string("42"));
        assert_eq!(value_of("a==1.2.3").unwrap(), Value::string("1.2.3"));
    }

    #[test]
    fn test_tilde_is_evaluated() {
        assert_eq!(value_of("flags=~2").unwrap(), bitwise(-3, "~2"));
        assert_eq!(value_of("flags=~64").unwrap(), bitwise(-65, "~64"));
        assert_eq!(value_of("flags=~~5").unwrap(), bitwise(5, "~~5"));
    }

    #[test]
    fn test_bitwise_reduces_left_to_right() {
        assert_eq!(value_of("f==4|2").unwrap(), bitwise(6, "4|2"));
        // (1 | 2) & 2, not 1 | (2 & 2)
        assert_eq!(value_of("f==1|2&2").unwrap(), bitwise(2, "1|2&2"));
        assert_eq!(value_of("f==1|~1&3").unwrap(), bitwise(3, "1|~1&3"));
        assert_eq!(value_of("f==(4|2)&~2").unwrap(), bitwise(4, "(4|2)&~2"));
        assert_eq!(value_of("f==(5)").unwrap(), bitwise(5, "(5)"));
    }

    #[test]
    fn test_malformed_bitwise() {
        for input in ["f==~", "f==1&", "f==~abc", "f==1.5|2", "f==~(1|)"] {
            let err = value_of(input).unwrap_err();
            assert!(matches!(err, ParseError::ValueParse { .. }), "{input}: {err:?}");
        }
        let err = value_of("f==(1|2").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
    }

    #[test]
    fn test_deep_bitwise_nesting_is_grammar_error() {
        let tildes = format!("f=={}1", "~".repeat(10_000));
        let err = value_of(&tildes).unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
        assert!(err.message().contains("nested too deeply"));

        let parens = format!("f=={}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let err = value_of(&parens).unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));

        assert_eq!(value_of("f==~~~~1").unwrap(), bitwise(1, "~~~~1"));
    }

    #[test]
    fn test_bitwise_value_keeps_operator() {
        let tokens = tokenize("flags=~2").unwrap();
        match Parser::new(&tokens).parse().unwrap() {
            Node::Condition(c) => assert_eq!(c.operator, Operator::Eq),
            other => panic!("Expected condition, got {:?}", other),
        }
    }
}
