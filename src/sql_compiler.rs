//! SQL compiler that turns a condition tree into a parameterized query using sea-query.

use std::collections::BTreeSet;

use sea_query::{
    Alias, Asterisk, BinOper, Expr, Func, Iden, JoinType, LikeExpr, PostgresQueryBuilder, Query,
    SimpleExpr, Value as SqlValue,
};
use thiserror::Error;

use crate::ast::{
    Argument, AttributePath, Condition, ExprCondition, Node, Operator, Value, LIKE_ESCAPE,
};
use crate::config::ModelConfig;
use crate::fold::PredicateBuilder;

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("'{path}' refers to unknown relationship '{relationship}'")]
    UnknownRelationship { path: String, relationship: String },

    #[error("'{0}' crosses more than one relationship")]
    NestedRelationship(String),

    #[error("operator '{operator}' expects {expected} value(s), found {found}")]
    Arity {
        operator: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("wildcard operator '{0}' needs a pattern string")]
    NotAPattern(&'static str),
}

/// Result of SQL compilation
#[derive(Debug)]
pub struct CompileResult {
    /// SQL with `$n` placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub values: Vec<SqlValue>,
    /// SQL with values inlined, for display only.
    pub inline_sql: String,
}

/// SQL Compiler that converts condition trees to PostgreSQL queries
pub struct SqlCompiler {
    config: ModelConfig,
}

impl SqlCompiler {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Builds only the WHERE predicate, returning the relationships it joins.
    pub fn compile_predicate(&self, tree: &Node) -> Result<(SimpleExpr, BTreeSet<String>), CompileError> {
        let mut builder = WhereBuilder {
            config: &self.config,
            joins: BTreeSet::new(),
        };
        let predicate = tree.fold(&mut builder)?;
        Ok((predicate, builder.joins))
    }

    /// Compile a condition tree into `SELECT * FROM <base> [JOIN ...] WHERE ...`.
    pub fn compile(&self, tree: &Node) -> Result<CompileResult, CompileError> {
        let (predicate, joins) = self.compile_predicate(tree)?;
        let base = &self.config.base_table;

        let mut select = Query::select();
        select.column(Asterisk).from(TableName(base.clone()));

        for name in &joins {
            // Only configured relationships end up in `joins`.
            let Some(rel) = self.config.relationship(name) else {
                continue;
            };
            select.join(
                JoinType::InnerJoin,
                TableName(rel.table.clone()),
                Expr::col((TableName(rel.table.clone()), ColumnName(rel.foreign_key.clone())))
                    .equals((TableName(base.clone()), ColumnName("id".to_string()))),
            );
        }

        select.and_where(predicate);

        let (sql, values) = select.build(PostgresQueryBuilder);
        let inline_sql = select.to_string(PostgresQueryBuilder);
        tracing::debug!(%sql, joins = joins.len(), "compiled boolean search");

        Ok(CompileResult {
            sql,
            values: values.0,
            inline_sql,
        })
    }
}

/// Folds the tree into a sea-query expression, recording needed joins.
struct WhereBuilder<'c> {
    config: &'c ModelConfig,
    joins: BTreeSet<String>,
}

impl WhereBuilder<'_> {
    fn column(&mut self, path: &AttributePath) -> Result<Expr, CompileError> {
        if path.segments().len() > 2 {
            return Err(CompileError::NestedRelationship(path.dotted()));
        }
        let table = match path.relationship() {
            None => self.config.base_table.clone(),
            Some(name) => {
                let rel = self.config.relationship(name).ok_or_else(|| {
                    CompileError::UnknownRelationship {
                        path: path.dotted(),
                        relationship: name.to_string(),
                    }
                })?;
                self.joins.insert(name.to_string());
                rel.table.clone()
            }
        };
        Ok(Expr::col((TableName(table), ColumnName(path.field().to_string()))))
    }

    /// Whether both sides should go through `lower()`.
    fn folds_case(&self, values: &[Value]) -> bool {
        self.config.case_insensitive && matches!(values.first(), Some(Value::String(_)))
    }

    fn sql_value(&self, value: &Value, fold_case: bool) -> SqlValue {
        match value {
            Value::String(s) => {
                let text = s.pattern.as_ref().unwrap_or(&s.raw);
                let text = if fold_case { text.to_lowercase() } else { text.clone() };
                SqlValue::String(Some(Box::new(text)))
            }
            Value::Integer(n) => SqlValue::BigInt(Some(*n)),
            Value::Float(x) => SqlValue::Double(Some(*x)),
            Value::Bitwise(b) => SqlValue::BigInt(Some(b.value)),
        }
    }

    fn compare(&self, target: Expr, operator: Operator, values: &[Value]) -> Result<SimpleExpr, CompileError> {
        if values.len() != operator.arity() {
            return Err(CompileError::Arity {
                operator: operator.symbol(),
                expected: operator.arity(),
                found: values.len(),
            });
        }

        let fold_case = self.folds_case(values);
        let target = if fold_case {
            Expr::expr(Func::lower(target))
        } else {
            target
        };
        let v = |i: usize| self.sql_value(&values[i], fold_case);

        let expr = match operator {
            Operator::Eq => target.eq(v(0)),
            Operator::Ne => target.ne(v(0)),
            Operator::Lt => target.lt(v(0)),
            Operator::Le => target.lte(v(0)),
            Operator::Gt => target.gt(v(0)),
            Operator::Ge => target.gte(v(0)),
            Operator::ContainsLike | Operator::NotContainsLike => {
                let pattern = match &values[0] {
                    Value::String(s) if s.is_pattern() => s.pattern.clone().unwrap_or_default(),
                    _ => return Err(CompileError::NotAPattern(operator.symbol())),
                };
                let pattern = if fold_case { pattern.to_lowercase() } else { pattern };
                let pattern = LikeExpr::new(pattern).escape(LIKE_ESCAPE);
                if operator == Operator::ContainsLike {
                    target.like(pattern)
                } else {
                    target.not_like(pattern)
                }
            }
            Operator::Between => target.between(v(0), v(1)),
            Operator::BitAnd => Expr::expr(target.binary(BinOper::BitAnd, v(0))).gt(0),
            Operator::BitOr => Expr::expr(target.binary(BinOper::BitOr, v(0))).gt(0),
        };
        Ok(expr)
    }
}

impl PredicateBuilder for WhereBuilder<'_> {
    type Predicate = SimpleExpr;
    type Error = CompileError;

    fn condition(&mut self, condition: &Condition) -> Result<SimpleExpr, CompileError> {
        let column = self.column(&condition.path)?;
        self.compare(column, condition.operator, &condition.values)
    }

    /// Renders `name(arg, ..., key => value) [OP value]`.
    ///
    /// Arrays become `ARRAY[...]` and nested conditions are passed as boolean
    /// expressions. A call without a comparison is used as the predicate itself.
    fn function(&mut self, condition: &ExprCondition) -> Result<SimpleExpr, CompileError> {
        let mut args: Vec<SimpleExpr> = Vec::with_capacity(condition.positional_args.len());
        for arg in &condition.positional_args {
            let expr = match arg {
                Argument::Value(v) => SimpleExpr::Value(self.sql_value(v, false)),
                Argument::List(items) => Expr::cust_with_values(
                    format!("ARRAY[{}]", vec!["?"; items.len()].join(", ")),
                    items.iter().map(|v| self.sql_value(v, false)),
                ),
                Argument::Condition(c) => self.condition(c)?,
            };
            args.push(expr);
        }
        for (key, value) in &condition.keyword_args {
            args.push(Expr::cust_with_values(
                format!("{} => ?", key),
                [self.sql_value(value, false)],
            ));
        }
        let call = Func::cust(Alias::new(condition.function_name.as_str())).args(args);
        match condition.operator {
            Some(operator) => self.compare(Expr::expr(call), operator, &condition.values),
            None => Ok(SimpleExpr::FunctionCall(call)),
        }
    }

    fn not(&mut self, inner: SimpleExpr) -> Result<SimpleExpr, CompileError> {
        Ok(inner.not())
    }

    fn and(&mut self, left: SimpleExpr, right: SimpleExpr) -> Result<SimpleExpr, CompileError> {
        Ok(left.and(right))
    }

    fn or(&mut self, left: SimpleExpr, right: SimpleExpr) -> Result<SimpleExpr, CompileError> {
        Ok(left.or(right))
    }
}
