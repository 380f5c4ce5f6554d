/*!
# Edit Grammar

Declarative description of the transformations the learner may propose: which
edit operators are allowed, how many ancestor levels anchor an edit, which
sibling subtrees may be generalized to wildcards, and how many ranked results
to keep.
*/

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ast::{Category, Node, NodeKind};

#[derive(Parser)]
#[grammar = "synthesis/edit_grammar.pest"]
struct EditGrammarParser;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("syntax error in edit grammar:\n{0}")]
    Syntax(String),

    #[error("unknown edit operator {0:?}")]
    UnknownOperator(String),

    #[error("unknown category or node kind {0:?}")]
    UnknownCategory(String),

    #[error("{directive} value {value:?} is out of range")]
    InvalidNumber { directive: &'static str, value: String },

    #[error("edit grammar enables no edit operator")]
    NoOperators,

    #[error("failed to read edit grammar {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOperator {
    Update,
    Delete,
}

impl EditOperator {
    pub fn name(self) -> &'static str {
        match self {
            EditOperator::Update => "update",
            EditOperator::Delete => "delete",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "update" => Some(EditOperator::Update),
            "delete" => Some(EditOperator::Delete),
            _ => None,
        }
    }
}

/// A class of subtrees the learner may replace with a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abstraction {
    Category(Category),
    Kind(NodeKind),
}

impl Abstraction {
    /// Category names win over node kind names.
    pub fn from_name(name: &str) -> Option<Self> {
        Category::from_name(name)
            .map(Abstraction::Category)
            .or_else(|| NodeKind::from_name(name).map(Abstraction::Kind))
    }

    pub fn covers(&self, node: &Node) -> bool {
        match self {
            Abstraction::Category(category) => node.category() == *category,
            Abstraction::Kind(kind) => node.kind() == *kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditGrammar {
    pub language: String,
    pub operators: Vec<EditOperator>,
    /// Ancestor levels above the edit used to anchor a pattern
    pub context_depth: usize,
    pub abstractions: Vec<Abstraction>,
    /// Most transformations returned per example
    pub limit: usize,
}

impl Default for EditGrammar {
    fn default() -> Self {
        Self {
            language: "transformation".to_string(),
            operators: vec![EditOperator::Update, EditOperator::Delete],
            context_depth: 1,
            abstractions: vec![
                Abstraction::Category(Category::Expression),
                Abstraction::Kind(NodeKind::Name),
                Abstraction::Kind(NodeKind::Literal),
            ],
            limit: 8,
        }
    }
}

impl EditGrammar {
    pub fn load(path: &Path) -> Result<Self, GrammarError> {
        let text = fs::read_to_string(path).map_err(|source| GrammarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    pub fn allows(&self, operator: EditOperator) -> bool {
        self.operators.contains(&operator)
    }

    /// Whether a subtree may be generalized to a wildcard.
    pub fn abstracts(&self, node: &Node) -> bool {
        self.abstractions.iter().any(|a| a.covers(node))
    }
}

impl FromStr for EditGrammar {
    type Err = GrammarError;

    /// Directives absent from the file keep their defaults, except that
    /// operators and abstractions are exactly the ones listed.
    fn from_str(text: &str) -> Result<Self, GrammarError> {
        let pairs =
            EditGrammarParser::parse(Rule::grammar, text).map_err(|e| GrammarError::Syntax(e.to_string()))?;

        let mut grammar = EditGrammar {
            operators: Vec::new(),
            abstractions: Vec::new(),
            ..EditGrammar::default()
        };

        for directive in pairs.flat_map(|pair| pair.into_inner()) {
            match directive.as_rule() {
                Rule::language => grammar.language = directive.into_inner().as_str().to_string(),
                Rule::edit => {
                    let name = directive.into_inner().as_str();
                    let operator =
                        EditOperator::from_name(name).ok_or_else(|| GrammarError::UnknownOperator(name.to_string()))?;
                    if !grammar.operators.contains(&operator) {
                        grammar.operators.push(operator);
                    }
                }
                Rule::context => grammar.context_depth = number("context", directive)?,
                Rule::limit => grammar.limit = number("limit", directive)?,
                Rule::abstraction => {
                    for name in directive.into_inner() {
                        let abstraction = Abstraction::from_name(name.as_str())
                            .ok_or_else(|| GrammarError::UnknownCategory(name.as_str().to_string()))?;
                        grammar.abstractions.push(abstraction);
                    }
                }
                _ => {}
            }
        }

        if grammar.operators.is_empty() {
            return Err(GrammarError::NoOperators);
        }
        debug!(?grammar, "loaded edit grammar");
        Ok(grammar)
    }
}

fn number(directive: &'static str, pair: Pair<'_, Rule>) -> Result<usize, GrammarError> {
    let value = pair.into_inner().as_str();
    value.parse().map_err(|_| GrammarError::InvalidNumber {
        directive,
        value: value.to_string(),
    })
}
