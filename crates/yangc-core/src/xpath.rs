//! Outbound interface to the XPath compiler.
//!
//! `must`/`when` expressions are compiled by an external collaborator during
//! the final validation sweep. The interface is
//! `(expression text, axis schema node) -> compiled expression | diagnostic`;
//! the compiled expression is opaque to the schema compiler and is stored on
//! the owning node for later data validation.

use std::any::Any;
use std::sync::Arc;

use crate::error::{CompileError, ErrorKind, Result};
use crate::model::NodeId;

/// A compiled XPath expression, opaque to the schema compiler.
#[derive(Clone)]
pub struct CompiledXPath {
    /// Original expression text.
    pub text: String,
    /// Implementation-private compiled form.
    pub data: Option<Arc<dyn Any + Send + Sync>>,
}

impl core::fmt::Debug for CompiledXPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompiledXPath")
            .field("text", &self.text)
            .field("data", &self.data.as_ref().map(|_| "<opaque>"))
            .finish()
    }
}

/// The compile-time axis of an expression.
#[derive(Clone, Copy, Debug)]
pub struct XPathAxis {
    /// The context node of the expression; `None` at module top level
    /// (the context is then the root).
    pub context_node: Option<NodeId>,
}

/// An XPath compiler collaborator.
pub trait XPathCompiler: Send + Sync {
    /// Compile an expression against its axis. Syntax errors surface as
    /// compile errors of kind `syntax`.
    fn compile(&self, expr: &str, axis: XPathAxis) -> Result<CompiledXPath>;
}

/// Built-in fallback: checks token-level sanity (balanced brackets and
/// terminated literals) without building an evaluable form.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyntaxChecker;

impl XPathCompiler for SyntaxChecker {
    fn compile(&self, expr: &str, _axis: XPathAxis) -> Result<CompiledXPath> {
        if expr.trim().is_empty() {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                expr,
                "empty XPath expression",
            ));
        }

        let mut depth_paren = 0i32;
        let mut depth_bracket = 0i32;
        let mut literal: Option<char> = None;
        for c in expr.chars() {
            match (literal, c) {
                (Some(q), c) if c == q => literal = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => literal = Some(c),
                (None, '(') => depth_paren += 1,
                (None, ')') => depth_paren -= 1,
                (None, '[') => depth_bracket += 1,
                (None, ']') => depth_bracket -= 1,
                _ => {}
            }
            if depth_paren < 0 || depth_bracket < 0 {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    expr,
                    "unbalanced brackets in XPath expression",
                ));
            }
        }
        if depth_paren != 0 || depth_bracket != 0 || literal.is_some() {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                expr,
                "unterminated construct in XPath expression",
            ));
        }

        Ok(CompiledXPath {
            text: expr.to_owned(),
            data: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> XPathAxis {
        XPathAxis { context_node: None }
    }

    #[test]
    fn test_accepts_reasonable_expressions() {
        let checker = SyntaxChecker;
        assert!(checker.compile("../name = 'eth0'", axis()).is_ok());
        assert!(checker
            .compile("count(interface[enabled='true']) > 0", axis())
            .is_ok());
    }

    #[test]
    fn test_rejects_broken_expressions() {
        let checker = SyntaxChecker;
        assert!(checker.compile("", axis()).is_err());
        assert!(checker.compile("count(x", axis()).is_err());
        assert!(checker.compile("a[b", axis()).is_err());
        assert!(checker.compile("name = 'eth0", axis()).is_err());
        assert!(checker.compile("a)b", axis()).is_err());
    }

    #[test]
    fn test_brackets_inside_literals_ignored() {
        let checker = SyntaxChecker;
        assert!(checker.compile("name = '(['", axis()).is_ok());
    }
}
