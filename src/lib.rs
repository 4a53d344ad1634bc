//! Boolean search strings compiled into a typed condition tree.
//!
//! ```
//! use boolean_search::{parse_boolean_search, Node};
//!
//! let tree = parse_boolean_search("field1=*foo* and not (field2==1 or parent.field3<=10.0)").unwrap();
//! assert!(matches!(tree, Node::Bool(_)));
//! assert_eq!(tree.to_string(), "field1==*foo* and not (field2==1 or parent.field3<=10.0)");
//! ```
//!
//! The tree can be folded into any predicate type through [`PredicateBuilder`];
//! [`sql_compiler::SqlCompiler`] does so for PostgreSQL via sea-query.

pub mod ast;
pub mod config;
pub mod error;
pub mod fold;
pub mod lexer;
pub mod parser;
pub mod sql_compiler;
pub mod token;

pub use ast::{
    Argument, AttributePath, BitwiseValue, BoolNode, Condition, ExprCondition, Node, Operator,
    StringLiteral, Value,
};
pub use error::ParseError;
pub use fold::PredicateBuilder;

use lexer::tokenize;
use parser::Parser;

/// Parses a complete boolean search string into the root of its condition tree.
pub fn parse_boolean_search(input: &str) -> Result<Node, ParseError> {
    tracing::debug!(input, "parsing boolean search");
    let tokens = tokenize(input)?;
    let result = Parser::new(&tokens).parse();
    match &result {
        Ok(tree) => tracing::debug!(%tree, "parsed boolean search"),
        Err(e) => tracing::debug!(error = %e, "boolean search rejected"),
    }
    result
}
