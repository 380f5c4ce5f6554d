// Parser module - reference parser for the Python subset
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::ast::NodeRef;

pub mod lexer;
pub mod python;


pub use python::PythonParser;

/// Syntax errors, reported with the 1-based line they occur on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("line {line}: unrecognized input '{text}'")]
    Lex { line: usize, text: String },

    #[error("line {line}: expected {expected}, found {found}")]
    Unexpected {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("line {line}: inconsistent indentation")]
    Indentation { line: usize },

    #[error("line {line}: {message}")]
    Unsupported { line: usize, message: String },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Lex { line, .. }
            | ParseError::Unexpected { line, .. }
            | ParseError::Indentation { line }
            | ParseError::Unsupported { line, .. } => *line,
        }
    }
}

/// Trait for source parsers
pub trait Parser: Send + Sync {
    /// Parse source code into a module tree
    fn parse(&self, source: &str) -> Result<NodeRef, ParseError>;

    /// Parse a file
    fn parse_file(&self, path: &Path) -> Result<NodeRef> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.parse(&source)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Get parser name for debugging
    fn name(&self) -> &'static str;
}

/// Create a parser by name: `python` for programs, `pattern` for patterns
/// with metavariables.
pub fn create_parser(parser_type: &str) -> Result<Box<dyn Parser>> {
    match parser_type {
        "python" => Ok(Box::new(PythonParser::new())),
        "pattern" => Ok(Box::new(PythonParser::patterns())),
        _ => anyhow::bail!("Unknown parser type: {}", parser_type),
    }
}
