//! 布尔检索字符串解析后得到的条件树
//!
//! 条件树在一次解析调用中自底向上构建，之后不再修改。每个节点独占其子节点。

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::lexer::{is_keyword, is_number, is_word_char};

/// 跨关系到最终字段的点分路径，例如 `parent.field3`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    /// 从点分字符串构建路径，任一段不是合法标识符时返回 `None`
    pub fn parse(dotted: &str) -> Option<Self> {
        let segments: Vec<String> = dotted.split('.').map(str::to_string).collect();
        if segments.iter().all(|s| is_identifier(s)) {
            Some(Self(segments))
        } else {
            None
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// 最终的字段名
    pub fn field(&self) -> &str {
        // `parse` 至少产生一段
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// 字段所属的关系，即倒数第二段
    pub fn relationship(&self) -> Option<&str> {
        let n = self.0.len();
        if n >= 2 {
            Some(&self.0[n - 2])
        } else {
            None
        }
    }

    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// 字母、数字和下划线，不能以数字开头
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn like_pattern(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        match c {
            '*' => out.push('%'),
            '%' | '_' | LIKE_ESCAPE => {
                out.push(LIKE_ESCAPE);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// LIKE 模式中使用的转义字符
pub const LIKE_ESCAPE: char = '\\';

/// 字符串字面量。文本含通配符时，`pattern` 保存 LIKE 形式：
/// 原文中的 `%`、`_` 和 `\` 先用 [`LIKE_ESCAPE`] 转义，再把 `*` 替换为 `%`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringLiteral {
    pub raw: String,
    pub pattern: Option<String>,
}

impl StringLiteral {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let pattern = raw.contains('*').then(|| like_pattern(&raw));
        Self { raw, pattern }
    }

    pub fn is_pattern(&self) -> bool {
        self.pattern.is_some()
    }
}

/// 由 `~`、`&`、`|` 组合并已求值的整数。
/// `expr` 保留规范化后的源码形式，例如 `(4|2)&~1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitwiseValue {
    pub value: i64,
    pub expr: String,
}

/// 带类型的字面量值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    String(StringLiteral),
    Integer(i64),
    Float(f64),
    Bitwise(BitwiseValue),
}

impl Value {
    pub fn string(raw: impl Into<String>) -> Self {
        Value::String(StringLiteral::new(raw))
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Value::String(s) if s.is_pattern())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_) | Value::Bitwise(_))
    }

    /// 整数值对应的 i64，非整数时返回 `None`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Bitwise(b) => Some(b.value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(s) if s.is_pattern() => "pattern",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bitwise(_) => "bitwise integer",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => {
                let raw = &s.raw;
                let bare = !raw.is_empty()
                    && raw.chars().all(is_word_char)
                    && !is_number(raw)
                    && !is_keyword(raw);
                if bare {
                    f.write_str(raw)
                } else if raw.contains('"') {
                    write!(f, "'{}'", raw)
                } else {
                    write!(f, "\"{}\"", raw)
                }
            }
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bitwise(b) => f.write_str(&b.expr),
        }
    }
}

/// 叶子条件的比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `=`/`==` 与通配符模式比较
    ContainsLike,
    /// `!=` 与通配符模式比较
    NotContainsLike,
    Between,
    /// `(path & value) > 0`
    BitAnd,
    /// `(path | value) > 0`
    BitOr,
}

impl Operator {
    /// 运算符需要的比较值个数
    pub fn arity(self) -> usize {
        match self {
            Operator::Between => 2,
            _ => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::ContainsLike => "==",
            Operator::NotContainsLike => "!=",
            Operator::Between => "between",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
        }
    }
}

/// `path OP value` 或 `path between low and high`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub path: AttributePath,
    pub operator: Operator,
    pub values: Vec<Value>,
}

/// 函数调用的位置参数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Argument {
    Value(Value),
    /// 数字数组，例如 `[1, 2, 3]`
    List(Vec<Value>),
    /// 嵌套条件，例如 `npergood(nsa.z < 0.1)`
    Condition(Condition),
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

/// 函数调用形式的条件，例如 `cone(ra, dec, 1.0)==1` 或单独的 `cone(ra, dec, 1.0)`。
/// 比较作用于调用结果；没有比较时 `operator` 为 `None` 且 `values` 为空。
/// 这里不解释函数本身的含义。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprCondition {
    pub function_name: String,
    pub positional_args: Vec<Argument>,
    pub keyword_args: BTreeMap<String, Value>,
    pub operator: Option<Operator>,
    pub values: Vec<Value>,
}

/// 布尔连接词
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BoolNode {
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// 条件树中的任意节点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Node {
    Condition(Condition),
    Function(ExprCondition),
    Bool(BoolNode),
}

impl From<Condition> for Node {
    fn from(condition: Condition) -> Self {
        Node::Condition(condition)
    }
}

impl From<ExprCondition> for Node {
    fn from(condition: ExprCondition) -> Self {
        Node::Function(condition)
    }
}

impl Node {
    #[allow(clippy::should_implement_trait)]
    pub fn not(child: impl Into<Node>) -> Self {
        Node::Bool(BoolNode::Not(Box::new(child.into())))
    }

    pub fn and(left: impl Into<Node>, right: impl Into<Node>) -> Self {
        Node::Bool(BoolNode::And(Box::new(left.into()), Box::new(right.into())))
    }

    pub fn or(left: impl Into<Node>, right: impl Into<Node>) -> Self {
        Node::Bool(BoolNode::Or(Box::new(left.into()), Box::new(right.into())))
    }

    /// 所有 `Condition` 叶子，从左到右（不含函数参数中的嵌套条件）
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Node::Condition(c) = node {
                out.push(c);
            }
        });
        out
    }

    /// 所有函数调用叶子，从左到右
    pub fn functions(&self) -> Vec<&ExprCondition> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Node::Function(c) = node {
                out.push(c);
            }
        });
        out
    }

    /// 按源码顺序为每个条件值生成绑定参数名。
    ///
    /// 路径第一次出现时以点分路径命名，之后依次加 `_1`、`_2` 后缀，
    /// 因此 `x between 1 and 2` 绑定 `x` 和 `x_1`。
    pub fn params(&self) -> Vec<(String, &Value)> {
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        let mut out = Vec::new();
        for condition in self.conditions() {
            let path = condition.path.dotted();
            for value in &condition.values {
                let count = seen.entry(path.clone()).or_insert(0);
                let name = if *count == 0 {
                    path.clone()
                } else {
                    format!("{}_{}", path, count)
                };
                *count += 1;
                out.push((name, value));
            }
        }
        out
    }

    /// 条件引用的不重复点分路径
    pub fn unique_params(&self) -> BTreeSet<String> {
        self.conditions().iter().map(|c| c.path.dotted()).collect()
    }

    fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        visit(self);
        match self {
            Node::Condition(_) | Node::Function(_) => {}
            Node::Bool(BoolNode::Not(child)) => child.walk(visit),
            Node::Bool(BoolNode::And(left, right)) | Node::Bool(BoolNode::Or(left, right)) => {
                left.walk(visit);
                right.walk(visit);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Node::Bool(BoolNode::Or(..)) => 1,
            Node::Bool(BoolNode::And(..)) => 2,
            Node::Bool(BoolNode::Not(_)) => 3,
            Node::Condition(_) | Node::Function(_) => 4,
        }
    }

    fn write_child(f: &mut fmt::Formatter<'_>, child: &Node, min: u8) -> fmt::Result {
        if child.precedence() < min {
            write!(f, "({})", child)
        } else {
            write!(f, "{}", child)
        }
    }
}

fn write_comparison(f: &mut fmt::Formatter<'_>, operator: Operator, values: &[Value]) -> fmt::Result {
    match (operator, values) {
        (Operator::Between, [low, high]) => write!(f, " between {} and {}", low, high),
        (op, [value]) => write!(f, "{}{}", op.symbol(), value),
        (op, _) => write!(f, "{}<invalid arity>", op.symbol()),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        write_comparison(f, self.operator, &self.values)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(v) => write!(f, "{}", v),
            Argument::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Argument::Condition(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for ExprCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .positional_args
            .iter()
            .map(ToString::to_string)
            .chain(self.keyword_args.iter().map(|(k, v)| format!("{}={}", k, v)))
            .collect();
        write!(f, "{}({})", self.function_name, args.join(", "))?;
        match self.operator {
            Some(operator) => write_comparison(f, operator, &self.values),
            None => Ok(()),
        }
    }
}

/// 以检索语法输出条件树，只在重新解析会得到不同树的地方加括号
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Condition(c) => write!(f, "{}", c),
            Node::Function(c) => write!(f, "{}", c),
            Node::Bool(BoolNode::Not(child)) => {
                f.write_str("not ")?;
                Node::write_child(f, child, 3)
            }
            Node::Bool(BoolNode::And(left, right)) => {
                Node::write_child(f, left, 2)?;
                f.write_str(" and ")?;
                Node::write_child(f, right, 3)
            }
            Node::Bool(BoolNode::Or(left, right)) => {
                Node::write_child(f, left, 1)?;
                f.write_str(" or ")?;
                Node::write_child(f, right, 2)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(path: &str, operator: Operator, value: Value) -> Condition {
        Condition {
            path: AttributePath::parse(path).unwrap(),
            operator,
            values: vec![value],
        }
    }

    #[test]
    fn test_attribute_path() {
        let path = AttributePath::parse("parent.child.field").unwrap();
        assert_eq!(path.segments(), ["parent", "child", "field"]);
        assert_eq!(path.field(), "field");
        assert_eq!(path.relationship(), Some("child"));
        assert_eq!(path.to_string(), "parent.child.field");

        assert_eq!(AttributePath::parse("field").unwrap().relationship(), None);
        assert!(AttributePath::parse("1abc").is_none());
        assert!(AttributePath::parse("a..b").is_none());
        assert!(AttributePath::parse("a-b").is_none());
        assert!(AttributePath::parse("_private").is_some());
    }

    #[test]
    fn test_wildcard_string_literal() {
        let s = StringLiteral::new("*foo*");
        assert!(s.is_pattern());
        assert_eq!(s.pattern.as_deref(), Some("%foo%"));

        let escaped = StringLiteral::new(r"*50%_off\*");
        assert_eq!(escaped.pattern.as_deref(), Some(r"%50\%\_off\\%"));

        let plain = StringLiteral::new("foo");
        assert!(!plain.is_pattern());
        assert_eq!(plain.pattern, None);
    }

    #[test]
    fn test_value_display_quotes_when_needed() {
        assert_eq!(Value::string("foo").to_string(), "foo");
        assert_eq!(Value::string("*foo*").to_string(), "*foo*");
        assert_eq!(Value::string("hello world").to_string(), "\"hello world\"");
        assert_eq!(Value::string("and").to_string(), "\"and\"");
        assert_eq!(Value::string("42").to_string(), "\"42\"");
        assert_eq!(Value::string("").to_string(), "\"\"");
        assert_eq!(Value::Float(10.0).to_string(), "10.0");
        assert_eq!(Value::Integer(-3).to_string(), "-3");
    }

    #[test]
    fn test_display_parenthesizes_by_precedence() {
        let a = cond("a", Operator::Eq, Value::Integer(1));
        let b = cond("b", Operator::Eq, Value::Integer(2));
        let c = cond("c", Operator::Eq, Value::Integer(3));

        let tree = Node::and(Node::or(a.clone(), b.clone()), c.clone());
        assert_eq!(tree.to_string(), "(a==1 or b==2) and c==3");

        let tree = Node::or(a.clone(), Node::and(b.clone(), Node::not(c.clone())));
        assert_eq!(tree.to_string(), "a==1 or b==2 and not c==3");

        let tree = Node::or(a.clone(), Node::or(b.clone(), c.clone()));
        assert_eq!(tree.to_string(), "a==1 or (b==2 or c==3)");

        let tree = Node::not(Node::and(a, b));
        assert_eq!(tree.to_string(), "not (a==1 and b==2)");
    }

    #[test]
    fn test_display_between_and_function() {
        let between = Condition {
            path: AttributePath::parse("x").unwrap(),
            operator: Operator::Between,
            values: vec![Value::Integer(1), Value::Integer(10)],
        };
        assert_eq!(between.to_string(), "x between 1 and 10");

        let mut keyword_args = BTreeMap::new();
        keyword_args.insert("radius".to_string(), Value::Float(1.0));
        let call = ExprCondition {
            function_name: "cone".to_string(),
            positional_args: vec![Value::string("ra").into(), Value::string("dec").into()],
            keyword_args,
            operator: Some(Operator::Eq),
            values: vec![Value::Integer(1)],
        };
        assert_eq!(call.to_string(), "cone(ra, dec, radius=1.0)==1");

        let bare = ExprCondition {
            function_name: "hist".to_string(),
            positional_args: vec![
                Argument::List(vec![Value::Integer(1), Value::Float(2.5)]),
                Argument::Condition(cond("nsa.z", Operator::Lt, Value::Float(0.1))),
            ],
            keyword_args: BTreeMap::new(),
            operator: None,
            values: Vec::new(),
        };
        assert_eq!(bare.to_string(), "hist([1, 2.5], nsa.z<0.1)");
    }

    #[test]
    fn test_params_number_repeated_paths() {
        let tree = Node::and(
            cond("a", Operator::Ge, Value::Integer(4)),
            Node::and(
                cond("a", Operator::Lt, Value::Integer(6)),
                cond("t.b", Operator::Eq, Value::string("x")),
            ),
        );
        let names: Vec<String> = tree.params().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "a_1", "t.b"]);

        let unique: Vec<String> = tree.unique_params().into_iter().collect();
        assert_eq!(unique, vec!["a", "t.b"]);
    }
}
