//! 原子谓词：比较、`between` 区间、位掩码以及函数调用条件。

use std::collections::BTreeMap;

use super::Parser;
use crate::ast::{
    is_identifier, Argument, AttributePath, Condition, ExprCondition, Node, Operator, Value,
};
use crate::error::{ParseError, Result};
use crate::token::{Span, Token, TokenKind};

impl<'a> Parser<'a> {
    /// 解析一个原子谓词并推进到其后
    ///
    /// 支持的形式：
    /// - `path op value`，例如 `parent.field3<=10.0`
    /// - `path between value and value`
    /// - `path & value`、`path | value`
    /// - `name(args, key=value) op value`
    /// - `name(args, key=value)`，不带比较的函数条件
    pub(super) fn parse_condition(&mut self) -> Result<Node> {
        let (word, span) = match self.peek() {
            Some(Token { kind: TokenKind::Word(word), span }) => (*word, *span),
            _ => return Err(self.unexpected("a condition")),
        };
        self.advance();

        if self.match_token(&TokenKind::LParen) {
            return self.parse_function_condition(word, span).map(Node::Function);
        }

        self.parse_path_condition(word, span).map(Node::Condition)
    }

    /// 路径已被消费，解析其后的 `between`、位掩码或比较部分
    fn parse_path_condition(&mut self, word: &str, span: Span) -> Result<Condition> {
        let path = AttributePath::parse(word).ok_or_else(|| {
            ParseError::grammar(format!("'{}' is not a valid attribute path", word), span)
        })?;

        match self.peek_kind_at(0) {
            Some(TokenKind::Between) => {
                self.advance();
                let values = self.parse_between_bounds()?;
                Ok(Condition {
                    path,
                    operator: Operator::Between,
                    values,
                })
            }
            Some(TokenKind::Amp | TokenKind::Pipe) => {
                let operator = if self.match_token(&TokenKind::Amp) {
                    Operator::BitAnd
                } else {
                    Operator::BitOr
                };
                self.advance();
                let value_span = self.current_span();
                let value = self.parse_value()?;
                if value.as_i64().is_none() {
                    return Err(ParseError::type_mismatch(
                        format!(
                            "bitwise mask '{}' needs an integer, found {}",
                            operator.symbol(),
                            value.type_name()
                        ),
                        value_span,
                    ));
                }
                Ok(Condition {
                    path,
                    operator,
                    values: vec![value],
                })
            }
            _ => {
                let (operator, value) = self.parse_comparison()?;
                Ok(Condition {
                    path,
                    operator,
                    values: vec![value],
                })
            }
        }
    }

    /// 解析 `op value`，通配符相等比较会转换为 LIKE 运算符
    fn parse_comparison(&mut self) -> Result<(Operator, Value)> {
        let operator = self.parse_comparison_operator()?;
        let value_span = self.current_span();
        let value = self.parse_value()?;
        let operator = resolve_operator(operator, &value, value_span)?;
        Ok((operator, value))
    }

    fn parse_comparison_operator(&mut self) -> Result<Operator> {
        let operator = match self.peek_kind_at(0).and_then(comparison_operator) {
            Some(operator) => operator,
            None => return Err(self.unexpected("a comparison operator")),
        };
        self.advance();
        Ok(operator)
    }

    /// 解析 `between` 之后的 `value "and" value`
    fn parse_between_bounds(&mut self) -> Result<Vec<Value>> {
        let low_span = self.current_span();
        let low = self.parse_value()?;
        self.expect(TokenKind::And, "'and' between the bounds of 'between'")?;
        let high_span = self.current_span();
        let high = self.parse_value()?;

        let comparable = (low.is_numeric() && high.is_numeric())
            || (matches!(low, Value::String(_)) && matches!(high, Value::String(_)));
        if low.is_pattern() || high.is_pattern() {
            let span = if low.is_pattern() { low_span } else { high_span };
            return Err(ParseError::type_mismatch(
                "wildcard patterns cannot bound a 'between' range",
                span,
            ));
        }
        if !comparable {
            return Err(ParseError::type_mismatch(
                format!(
                    "'between' bounds must have comparable types, found {} and {}",
                    low.type_name(),
                    high.type_name()
                ),
                Span::new(low_span.start, high_span.end),
            ));
        }

        Ok(vec![low, high])
    }

    /// 解析函数名之后的 `"(" arglist ")" [op value]`
    ///
    /// 参数中 `word=value` 总是关键字参数；嵌套条件需要使用 `==`、`!=`、
    /// `<`、`<=`、`>`、`>=`、`between`、`&` 或 `|`。
    fn parse_function_condition(&mut self, name: &str, name_span: Span) -> Result<ExprCondition> {
        if !is_identifier(name) {
            return Err(ParseError::grammar(
                format!("'{}' is not a valid function name", name),
                name_span,
            ));
        }

        self.expect(TokenKind::LParen, "'('")?;
        let mut positional_args = Vec::new();
        let mut keyword_args = BTreeMap::new();

        if !self.match_token(&TokenKind::RParen) {
            loop {
                let keyword = match (self.peek(), self.peek_kind_at(1)) {
                    (Some(Token { kind: TokenKind::Word(key), span }), Some(TokenKind::Eq)) => {
                        Some((*key, *span))
                    }
                    _ => None,
                };

                if let Some((key, key_span)) = keyword {
                    if !is_identifier(key) {
                        return Err(ParseError::grammar(
                            format!("'{}' is not a valid keyword argument name", key),
                            key_span,
                        ));
                    }
                    self.advance(); // key
                    self.advance(); // =
                    let value = self.parse_value()?;
                    if keyword_args.contains_key(key) {
                        return Err(ParseError::grammar(
                            format!("duplicate keyword argument '{}'", key),
                            key_span,
                        ));
                    }
                    keyword_args.insert(key.to_string(), value);
                } else {
                    if !keyword_args.is_empty() {
                        return Err(ParseError::grammar(
                            "positional argument follows keyword argument",
                            self.current_span(),
                        ));
                    }
                    positional_args.push(self.parse_argument()?);
                }

                if self.match_token(&TokenKind::RParen) {
                    break;
                }
                self.expect(TokenKind::Comma, "',' or ')' in argument list")?;
            }
        }
        self.expect(TokenKind::RParen, "')' to close the argument list")?;

        let (operator, values) = if self.peek_kind_at(0).and_then(comparison_operator).is_some() {
            let (operator, value) = self.parse_comparison()?;
            (Some(operator), vec![value])
        } else {
            (None, Vec::new())
        };

        Ok(ExprCondition {
            function_name: name.to_string(),
            positional_args,
            keyword_args,
            operator,
            values,
        })
    }

    /// 位置参数：嵌套条件、`[...]` 数组或单个值
    fn parse_argument(&mut self) -> Result<Argument> {
        if let (Some(Token { kind: TokenKind::Word(word), span }), Some(next)) =
            (self.peek(), self.peek_kind_at(1))
        {
            let starts_condition = matches!(
                next,
                TokenKind::EqEq
                    | TokenKind::NotEq
                    | TokenKind::Lt
                    | TokenKind::Lte
                    | TokenKind::Gt
                    | TokenKind::Gte
                    | TokenKind::Between
                    | TokenKind::Amp
                    | TokenKind::Pipe
            );
            if starts_condition {
                self.advance();
                return self.parse_path_condition(word, *span).map(Argument::Condition);
            }
        }

        if self.match_token(&TokenKind::LBracket) {
            return self.parse_number_list().map(Argument::List);
        }

        self.parse_value().map(Argument::Value)
    }

    /// `"[" number ("," number)* "]"`
    fn parse_number_list(&mut self) -> Result<Vec<Value>> {
        self.expect(TokenKind::LBracket, "'['")?;
        let mut items = Vec::new();
        loop {
            let span = self.current_span();
            let item = self.parse_value()?;
            if !item.is_numeric() {
                return Err(ParseError::type_mismatch(
                    format!("array elements must be numbers, found {}", item.type_name()),
                    span,
                ));
            }
            items.push(item);

            if self.match_token(&TokenKind::RBracket) {
                break;
            }
            self.expect(TokenKind::Comma, "',' or ']' in array")?;
        }
        self.expect(TokenKind::RBracket, "']' to close the array")?;
        Ok(items)
    }
}

fn comparison_operator(kind: &TokenKind) -> Option<Operator> {
    match kind {
        TokenKind::Eq | TokenKind::EqEq => Some(Operator::Eq),
        TokenKind::NotEq => Some(Operator::Ne),
        TokenKind::Lt => Some(Operator::Lt),
        TokenKind::Lte => Some(Operator::Le),
        TokenKind::Gt => Some(Operator::Gt),
        TokenKind::Gte => Some(Operator::Ge),
        _ => None,
    }
}

fn resolve_operator(operator: Operator, value: &Value, value_span: Span) -> Result<Operator> {
    if !value.is_pattern() {
        return Ok(operator);
    }
    match operator {
        Operator::Eq => Ok(Operator::ContainsLike),
        Operator::Ne => Ok(Operator::NotContainsLike),
        other => Err(ParseError::type_mismatch(
            format!("operator '{}' cannot compare against a wildcard pattern", other.symbol()),
            value_span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BitwiseValue, StringLiteral};
    use crate::lexer::tokenize;

    fn parse_string(input: &str) -> Result<Node> {
        let tokens = tokenize(input)?;
        Parser::new(&tokens).parse()
    }

    fn condition(input: &str) -> Condition {
        match parse_string(input).unwrap() {
            Node::Condition(c) => c,
            other => panic!("Expected condition, got {:?}", other),
        }
    }

    fn function(input: &str) -> ExprCondition {
        match parse_string(input).unwrap() {
            Node::Function(c) => c,
            other => panic!("Expected function condition, got {:?}", other),
        }
    }

    #[test]
    fn test_all_comparison_operators() {
        let cases = [
            ("a < 1", Operator::Lt),
            ("a <= 1", Operator::Le),
            ("a = 1", Operator::Eq),
            ("a == 1", Operator::Eq),
            ("a >= 1", Operator::Ge),
            ("a > 1", Operator::Gt),
            ("a != 1", Operator::Ne),
        ];
        for (input, expected) in cases {
            let c = condition(input);
            assert_eq!(c.operator, expected, "{input}");
            assert_eq!(c.values, vec![Value::Integer(1)]);
        }
    }

    #[test]
    fn test_dotted_path() {
        let c = condition("parent.child.field==5");
        assert_eq!(c.path.segments(), ["parent", "child", "field"]);
        assert_eq!(c.operator, Operator::Eq);
        assert_eq!(c.values, vec![Value::Integer(5)]);
    }

    #[test]
    fn test_invalid_path_is_grammar_error() {
        let err = parse_string("9lives==1").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
        let err = parse_string("a..b==1").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
    }

    #[test]
    fn test_wildcard_resolves_to_like() {
        let c = condition("name=*foo*");
        assert_eq!(c.operator, Operator::ContainsLike);
        match &c.values[0] {
            Value::String(s) => {
                assert!(s.is_pattern());
                assert_eq!(s.pattern.as_deref(), Some("%foo%"));
                assert_eq!(s.raw, "*foo*");
            }
            other => panic!("Expected string value, got {:?}", other),
        }

        assert_eq!(condition("name!=foo*").operator, Operator::NotContainsLike);
        assert_eq!(condition(r#"name=="*a b""#).operator, Operator::ContainsLike);
        assert_eq!(condition("name=foo").operator, Operator::Eq);
    }

    #[test]
    fn test_ordering_against_pattern_is_type_mismatch() {
        let err = parse_string("name < *foo").unwrap_err();
        assert!(matches!(err, ParseError::TypeMismatch { .. }));
        assert_eq!(err.span(), Span::new(7, 11));
    }

    #[test]
    fn test_unrecognized_operator_is_grammar_error() {
        let err = parse_string("a ~ 1").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
        let err = parse_string("a => 1").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
        let err = parse_string("a").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
    }

    #[test]
    fn test_between() {
        let c = condition("x between 1 and 10");
        assert_eq!(c.path.segments(), ["x"]);
        assert_eq!(c.operator, Operator::Between);
        assert_eq!(c.values, vec![Value::Integer(1), Value::Integer(10)]);

        let c = condition("x BETWEEN 1 AND 2.5");
        assert_eq!(c.values, vec![Value::Integer(1), Value::Float(2.5)]);

        let c = condition("d between 2015-01-01 and 2016-01-01");
        assert_eq!(
            c.values,
            vec![Value::string("2015-01-01"), Value::string("2016-01-01")]
        );
    }

    #[test]
    fn test_between_inside_boolean_expression() {
        let result = parse_string("a between 1 and 2 or c > 10").unwrap();
        match result {
            Node::Bool(crate::ast::BoolNode::Or(left, right)) => {
                assert!(matches!(*left, Node::Condition(Condition { operator: Operator::Between, .. })));
                assert!(matches!(*right, Node::Condition(Condition { operator: Operator::Gt, .. })));
            }
            other => panic!("Expected OR, got {:?}", other),
        }
    }

    #[test]
    fn test_between_missing_parts() {
        let err = parse_string("x between 1 and").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
        let err = parse_string("x between 1 10").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
        assert!(err.message().contains("'and'"));
    }

    #[test]
    fn test_between_type_mismatch() {
        let err = parse_string("x between 1 and abc").unwrap_err();
        assert!(matches!(err, ParseError::TypeMismatch { .. }));
        let err = parse_string("x between a* and b").unwrap_err();
        assert!(matches!(err, ParseError::TypeMismatch { .. }));
    }

    #[test]
    fn test_bitwise_mask_conditions() {
        let c = condition("flags & 64");
        assert_eq!(c.operator, Operator::BitAnd);
        assert_eq!(c.values, vec![Value::Integer(64)]);

        let c = condition("flags | ~64");
        assert_eq!(c.operator, Operator::BitOr);
        assert_eq!(
            c.values,
            vec![Value::Bitwise(BitwiseValue { value: -65, expr: "~64".to_string() })]
        );

        let err = parse_string("flags & abc").unwrap_err();
        assert!(matches!(err, ParseError::TypeMismatch { .. }));
    }

    #[test]
    fn test_function_positional_args() {
        let c = function("cone(10.0, 20.0, 1.0)==1");
        assert_eq!(c.function_name, "cone");
        assert_eq!(
            c.positional_args,
            vec![
                Argument::Value(Value::Float(10.0)),
                Argument::Value(Value::Float(20.0)),
                Argument::Value(Value::Float(1.0)),
            ]
        );
        assert!(c.keyword_args.is_empty());
        assert_eq!(c.operator, Some(Operator::Eq));
        assert_eq!(c.values, vec![Value::Integer(1)]);
    }

    #[test]
    fn test_function_mixed_args() {
        let c = function(r#"hist(mass, bins=10, label="x y") >= 2"#);
        assert_eq!(c.function_name, "hist");
        assert_eq!(c.positional_args, vec![Argument::Value(Value::String(StringLiteral::new("mass")))]);
        assert_eq!(c.keyword_args.get("bins"), Some(&Value::Integer(10)));
        assert_eq!(c.keyword_args.get("label"), Some(&Value::string("x y")));
        assert_eq!(c.operator, Some(Operator::Ge));
        assert_eq!(c.values, vec![Value::Integer(2)]);
    }

    #[test]
    fn test_function_without_args() {
        let c = function("now() > 5");
        assert!(c.positional_args.is_empty());
        assert!(c.keyword_args.is_empty());
    }

    #[test]
    fn test_function_duplicate_keyword() {
        let err = parse_string("f(x=1, x=2)==1").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
        assert!(err.message().contains("duplicate keyword argument 'x'"));
        assert_eq!(err.span(), Span::new(7, 8));
    }

    #[test]
    fn test_function_positional_after_keyword() {
        let err = parse_string("f(x=1, 2)==1").unwrap_err();
        assert!(matches!(err, ParseError::Grammar { .. }));
        assert!(err.message().contains("positional"));
    }

    #[test]
    fn test_function_malformed() {
        for input in ["f(1, 2==1", "f(1,)==1", "f(1 2)==1", "f(1) 2", "a.b(1)==1", "f([1, 2)", "f([])"] {
            let err = parse_string(input).unwrap_err();
            assert!(matches!(err, ParseError::Grammar { .. }), "{input}: {err:?}");
        }
    }

    #[test]
    fn test_bare_function_condition() {
        let c = function("cone(10, 20, 1.0)");
        assert_eq!(c.function_name, "cone");
        assert_eq!(c.positional_args.len(), 3);
        assert_eq!(c.operator, None);
        assert!(c.values.is_empty());

        let result = parse_string("hist(mass, 10) and a==1").unwrap();
        match result {
            Node::Bool(crate::ast::BoolNode::And(left, _)) => {
                assert!(matches!(*left, Node::Function(ExprCondition { operator: None, .. })));
            }
            other => panic!("Expected AND, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_condition_argument() {
        let c = function("npergood(nsa.z < 0.1) >= 3");
        assert_eq!(c.function_name, "npergood");
        assert_eq!(
            c.positional_args,
            vec![Argument::Condition(Condition {
                path: AttributePath::parse("nsa.z").unwrap(),
                operator: Operator::Lt,
                values: vec![Value::Float(0.1)],
            })]
        );
        assert_eq!(c.operator, Some(Operator::Ge));
        assert_eq!(c.values, vec![Value::Integer(3)]);

        let c = function("count(name == *x*, flags & 4, z between 1 and 2)");
        let operators: Vec<Operator> = c
            .positional_args
            .iter()
            .map(|arg| match arg {
                Argument::Condition(cond) => cond.operator,
                other => panic!("Expected nested condition, got {:?}", other),
            })
            .collect();
        assert_eq!(
            operators,
            vec![Operator::ContainsLike, Operator::BitAnd, Operator::Between]
        );
    }

    #[test]
    fn test_single_equals_in_call_is_keyword() {
        let c = function("f(x=1) > 0");
        assert!(c.positional_args.is_empty());
        assert_eq!(c.keyword_args.get("x"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_array_argument() {
        let c = function("hist([1, 2.5, -3], bins=10)");
        assert_eq!(
            c.positional_args,
            vec![Argument::List(vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::Integer(-3),
            ])]
        );
        assert_eq!(c.keyword_args.get("bins"), Some(&Value::Integer(10)));

        let err = parse_string("hist([1, abc])").unwrap_err();
        assert!(matches!(err, ParseError::TypeMismatch { .. }));
        assert_eq!(err.span(), Span::new(9, 12));
    }
}
