//! Restricted expression language for custom payloads and visibility rules.
//!
//! Programs are single expressions over scope bindings and a fixed builtin
//! table; there is no assignment, no loops, and no host access beyond the
//! `var()` resolver the scope carries. Compilation happens ahead of use, so a
//! malformed program is rejected before any request is built.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::{Scope, VarResolver};

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodeError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("evaluation failed: {message}")]
    Eval { message: String },
}

/// A compiled expression, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    root: parser::Expr,
}

impl Program {
    pub fn compile(source: &str) -> Result<Program, CodeError> {
        let tokens = lexer::tokenize(source)?;
        let root = parser::parse(&tokens, source.len())?;
        Ok(Program {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, scope: &Scope<'_>) -> Result<JsonValue, CodeError> {
        eval::eval(&self.root, scope)
    }
}

/// Visibility rule evaluation. Rules fail open: a blank rule, a rule that
/// does not compile, one that fails at evaluation time, or one that yields a
/// non-boolean result keeps the element visible, with the anomaly logged.
pub fn show_if(rule: &str, scope: &Scope<'_>) -> bool {
    if rule.trim().is_empty() {
        return true;
    }
    let program = match Program::compile(rule) {
        Ok(program) => program,
        Err(err) => {
            tracing::warn!(rule, %err, "visibility rule does not compile; keeping element visible");
            return true;
        }
    };
    match program.eval(scope) {
        Ok(JsonValue::Bool(visible)) => visible,
        Ok(other) => {
            tracing::warn!(rule, result = %other, "visibility rule is not a boolean; keeping element visible");
            true
        }
        Err(err) => {
            tracing::warn!(rule, %err, "visibility rule failed; keeping element visible");
            true
        }
    }
}
