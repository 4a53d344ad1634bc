//! 将条件树折叠为使用方的谓词类型

use crate::ast::{BoolNode, Condition, ExprCondition, Node};

/// 把叶子转换为谓词，并用布尔连接词组合。
///
/// 解析器不接触 `Predicate`，叶子的含义（SQL 表达式、内存中的判断等）由实现决定。
pub trait PredicateBuilder {
    type Predicate;
    type Error;

    fn condition(&mut self, condition: &Condition) -> Result<Self::Predicate, Self::Error>;

    fn function(&mut self, condition: &ExprCondition) -> Result<Self::Predicate, Self::Error>;

    fn not(&mut self, inner: Self::Predicate) -> Result<Self::Predicate, Self::Error>;

    fn and(
        &mut self,
        left: Self::Predicate,
        right: Self::Predicate,
    ) -> Result<Self::Predicate, Self::Error>;

    fn or(
        &mut self,
        left: Self::Predicate,
        right: Self::Predicate,
    ) -> Result<Self::Predicate, Self::Error>;
}

impl Node {
    /// 自底向上遍历，先左后右
    pub fn fold<B: PredicateBuilder>(&self, builder: &mut B) -> Result<B::Predicate, B::Error> {
        match self {
            Node::Condition(c) => builder.condition(c),
            Node::Function(c) => builder.function(c),
            Node::Bool(BoolNode::Not(inner)) => {
                let inner = inner.fold(builder)?;
                builder.not(inner)
            }
            Node::Bool(BoolNode::And(left, right)) => {
                let left = left.fold(builder)?;
                let right = right.fold(builder)?;
                builder.and(left, right)
            }
            Node::Bool(BoolNode::Or(left, right)) => {
                let left = left.fold(builder)?;
                let right = right.fold(builder)?;
                builder.or(left, right)
            }
        }
    }
}
