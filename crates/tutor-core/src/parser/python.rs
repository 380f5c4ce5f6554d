// Recursive-descent parser for the Python subset.
//
// Comparisons are binary operators and `elif` chains become an `If` nested in
// the else block, so every construct maps onto the uniform node layout in
// `ast`. In pattern mode the metavariables `$N`, `$_` and `$N{expr}` parse to
// `Hole` nodes.

use std::sync::Arc;

use tracing::trace;

use super::lexer::{tokenize, Lexeme, Token};
use super::{ParseError, Parser};
use crate::ast::{Label, Literal, Node, NodeKind, NodeRef, Operator};

/// Deepest bracket, operator or block nesting accepted before giving up.
const MAX_NESTING: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct PythonParser {
    patterns: bool,
}

impl PythonParser {
    pub fn new() -> Self {
        Self { patterns: false }
    }

    /// A parser that also accepts pattern metavariables.
    pub fn patterns() -> Self {
        Self { patterns: true }
    }

    /// Parse a single expression, with nothing but blank lines around it.
    pub fn parse_expression(&self, source: &str) -> Result<NodeRef, ParseError> {
        let mut state = ParseState::new(tokenize(source)?, self.patterns);
        state.skip_newlines();
        let expr = state.testlist()?;
        state.skip_newlines();
        state.expect(&Token::Eof, "end of input")?;
        Ok(expr)
    }
}

impl Parser for PythonParser {
    fn parse(&self, source: &str) -> Result<NodeRef, ParseError> {
        let tokens = tokenize(source)?;
        trace!(tokens = tokens.len(), patterns = self.patterns, "parsing module");
        ParseState::new(tokens, self.patterns).module()
    }

    fn name(&self) -> &'static str {
        if self.patterns {
            "python-pattern"
        } else {
            "python"
        }
    }
}

struct ParseState {
    tokens: Vec<Lexeme>,
    pos: usize,
    patterns: bool,
    depth: usize,
}

fn node(kind: NodeKind, children: Vec<NodeRef>) -> NodeRef {
    Node::branch(kind, children)
}

fn labeled(kind: NodeKind, label: Label, children: Vec<NodeRef>) -> NodeRef {
    Arc::new(Node::new(kind, Some(label), children))
}

impl ParseState {
    fn new(tokens: Vec<Lexeme>, patterns: bool) -> Self {
        Self {
            tokens,
            pos: 0,
            patterns,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .or_else(|| self.tokens.last())
            .map_or(&Token::Eof, |l| &l.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |l| l.line)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, expected: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::Unexpected {
            line: self.line(),
            expected: expected.to_string(),
            found: self.peek().to_string(),
        }
    }

    fn unsupported(&self, message: impl Into<String>) -> ParseError {
        ParseError::Unsupported {
            line: self.line(),
            message: message.into(),
        }
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.unsupported("expression nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // --- Statements ---

    fn module(&mut self) -> Result<NodeRef, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&Token::Eof) {
                break;
            }
            self.statement(&mut body)?;
        }
        Ok(node(NodeKind::Module, body))
    }

    fn statement(&mut self, out: &mut Vec<NodeRef>) -> Result<(), ParseError> {
        match self.peek() {
            Token::Def => out.push(self.function_def()?),
            Token::If => {
                self.advance();
                out.push(self.if_rest()?);
            }
            Token::While => out.push(self.while_statement()?),
            Token::For => out.push(self.for_statement()?),
            Token::Indent => return Err(self.unsupported("unexpected indent")),
            _ => self.simple_line(out)?,
        }
        Ok(())
    }

    fn simple_line(&mut self, out: &mut Vec<NodeRef>) -> Result<(), ParseError> {
        loop {
            out.push(self.simple_statement()?);
            if !self.eat(&Token::Semicolon) || self.check(&Token::Newline) {
                break;
            }
        }
        if self.check(&Token::Eof) {
            return Ok(());
        }
        self.expect(&Token::Newline, "end of line")
    }

    fn suite(&mut self) -> Result<NodeRef, ParseError> {
        self.nested(Self::block)
    }

    fn block(&mut self) -> Result<NodeRef, ParseError> {
        self.expect(&Token::Colon, "':'")?;
        let mut body = Vec::new();
        if self.eat(&Token::Newline) {
            self.skip_newlines();
            self.expect(&Token::Indent, "an indented block")?;
            loop {
                self.skip_newlines();
                if self.eat(&Token::Dedent) || self.check(&Token::Eof) {
                    break;
                }
                self.statement(&mut body)?;
            }
        } else {
            self.simple_line(&mut body)?;
        }
        Ok(node(NodeKind::Suite, body))
    }

    fn function_def(&mut self) -> Result<NodeRef, ParseError> {
        self.expect(&Token::Def, "'def'")?;
        let name = self.identifier()?;
        self.expect(&Token::LParen, "'('")?;
        let params = self.parameters(&Token::RParen)?;
        self.expect(&Token::RParen, "')'")?;
        let body = self.suite()?;
        Ok(labeled(
            NodeKind::FunctionDef,
            Label::Identifier(name),
            vec![params, body],
        ))
    }

    fn parameters(&mut self, end: &Token) -> Result<NodeRef, ParseError> {
        let mut params = Vec::new();
        while !self.check(end) {
            let param = match self.peek() {
                Token::Slot(_) | Token::AnonymousSlot => self.metavariable()?,
                _ => Node::name(self.identifier()?),
            };
            params.push(param);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(node(NodeKind::Parameters, params))
    }

    /// `if` / `elif` after its keyword has been consumed.
    fn if_rest(&mut self) -> Result<NodeRef, ParseError> {
        let test = self.test()?;
        let body = self.suite()?;
        let mut children = vec![test, body];
        if self.eat(&Token::Elif) {
            children.push(node(NodeKind::Suite, vec![self.if_rest()?]));
        } else if self.eat(&Token::Else) {
            children.push(self.suite()?);
        }
        Ok(node(NodeKind::If, children))
    }

    fn while_statement(&mut self) -> Result<NodeRef, ParseError> {
        self.expect(&Token::While, "'while'")?;
        let test = self.test()?;
        let body = self.suite()?;
        if self.check(&Token::Else) {
            return Err(self.unsupported("'else' on loops is not supported"));
        }
        Ok(node(NodeKind::While, vec![test, body]))
    }

    fn for_statement(&mut self) -> Result<NodeRef, ParseError> {
        self.expect(&Token::For, "'for'")?;
        let target = self.target_list()?;
        self.expect(&Token::In, "'in'")?;
        let iter = self.testlist()?;
        let body = self.suite()?;
        if self.check(&Token::Else) {
            return Err(self.unsupported("'else' on loops is not supported"));
        }
        Ok(node(NodeKind::For, vec![target, iter, body]))
    }

    fn target_list(&mut self) -> Result<NodeRef, ParseError> {
        let first = self.postfix()?;
        let target = if self.check(&Token::Comma) {
            let mut elements = vec![first];
            while self.eat(&Token::Comma) {
                if self.check(&Token::In) {
                    break;
                }
                elements.push(self.postfix()?);
            }
            node(NodeKind::Tuple, elements)
        } else {
            first
        };
        self.validate_target(&target)?;
        Ok(target)
    }

    fn simple_statement(&mut self) -> Result<NodeRef, ParseError> {
        match self.peek() {
            Token::Pass => {
                self.advance();
                return Ok(node(NodeKind::Pass, vec![]));
            }
            Token::Break => {
                self.advance();
                return Ok(node(NodeKind::Break, vec![]));
            }
            Token::Continue => {
                self.advance();
                return Ok(node(NodeKind::Continue, vec![]));
            }
            Token::Return => {
                self.advance();
                if matches!(self.peek(), Token::Newline | Token::Semicolon | Token::Eof) {
                    return Ok(node(NodeKind::Return, vec![]));
                }
                return Ok(node(NodeKind::Return, vec![self.testlist()?]));
            }
            _ => {}
        }

        let expr = self.testlist()?;
        if self.eat(&Token::Assign) {
            self.validate_target(&expr)?;
            let value = self.testlist()?;
            if self.check(&Token::Assign) {
                return Err(self.unsupported("chained assignment is not supported"));
            }
            return Ok(node(NodeKind::Assign, vec![expr, value]));
        }
        if let Some(op) = augmented_operator(self.peek()) {
            self.advance();
            if !matches!(expr.kind(), NodeKind::Name | NodeKind::Subscript | NodeKind::Hole) {
                return Err(self.unsupported("invalid target for augmented assignment"));
            }
            let value = self.testlist()?;
            return Ok(labeled(
                NodeKind::AugAssign,
                Label::Operator(op),
                vec![expr, value],
            ));
        }
        Ok(node(NodeKind::ExpressionStatement, vec![expr]))
    }

    fn validate_target(&self, target: &Node) -> Result<(), ParseError> {
        match target.kind() {
            NodeKind::Name | NodeKind::Subscript | NodeKind::Hole => Ok(()),
            NodeKind::Tuple | NodeKind::List if !target.children().is_empty() => target
                .children()
                .iter()
                .try_for_each(|element| self.validate_target(element)),
            _ => Err(self.unsupported(format!("cannot assign to {}", target.kind()))),
        }
    }

    // --- Expressions ---

    /// Comma-separated expressions; more than one (or a trailing comma) makes a tuple.
    fn testlist(&mut self) -> Result<NodeRef, ParseError> {
        let first = self.test()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut elements = vec![first];
        while self.eat(&Token::Comma) {
            if !starts_expression(self.peek()) {
                break;
            }
            elements.push(self.test()?);
        }
        Ok(node(NodeKind::Tuple, elements))
    }

    fn test(&mut self) -> Result<NodeRef, ParseError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<NodeRef, ParseError> {
        if self.check(&Token::Lambda) {
            return self.lambda();
        }
        let body = self.or_test()?;
        if !self.eat(&Token::If) {
            return Ok(body);
        }
        let test = self.or_test()?;
        self.expect(&Token::Else, "'else'")?;
        let orelse = self.test()?;
        Ok(node(NodeKind::Conditional, vec![body, test, orelse]))
    }

    fn lambda(&mut self) -> Result<NodeRef, ParseError> {
        self.expect(&Token::Lambda, "'lambda'")?;
        let params = self.parameters(&Token::Colon)?;
        self.expect(&Token::Colon, "':'")?;
        let body = self.test()?;
        Ok(node(NodeKind::Lambda, vec![params, body]))
    }

    fn or_test(&mut self) -> Result<NodeRef, ParseError> {
        let mut left = self.and_test()?;
        while self.eat(&Token::Or) {
            let right = self.and_test()?;
            left = labeled(NodeKind::BoolOp, Label::Operator(Operator::Or), vec![left, right]);
        }
        Ok(left)
    }

    fn and_test(&mut self) -> Result<NodeRef, ParseError> {
        let mut left = self.not_test()?;
        while self.eat(&Token::And) {
            let right = self.not_test()?;
            left = labeled(NodeKind::BoolOp, Label::Operator(Operator::And), vec![left, right]);
        }
        Ok(left)
    }

    fn not_test(&mut self) -> Result<NodeRef, ParseError> {
        if self.eat(&Token::Not) {
            let operand = self.nested(Self::not_test)?;
            return Ok(labeled(NodeKind::UnaryOp, Label::Operator(Operator::Not), vec![operand]));
        }
        self.comparison()
    }

    fn comparison_operator(&mut self) -> Option<Operator> {
        let lookahead = (self.peek().clone(), self.peek_at(1).clone());
        let op = match lookahead {
            (Token::EqEq, _) => Operator::Eq,
            (Token::NotEq, _) => Operator::NotEq,
            (Token::Lt, _) => Operator::Lt,
            (Token::LtE, _) => Operator::LtE,
            (Token::Gt, _) => Operator::Gt,
            (Token::GtE, _) => Operator::GtE,
            (Token::In, _) => Operator::In,
            (Token::Not, Token::In) => {
                self.advance();
                Operator::NotIn
            }
            (Token::Is, Token::Not) => {
                self.advance();
                Operator::IsNot
            }
            (Token::Is, _) => Operator::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn comparison(&mut self) -> Result<NodeRef, ParseError> {
        let left = self.arith()?;
        let Some(op) = self.comparison_operator() else {
            return Ok(left);
        };
        let right = self.arith()?;
        if self.comparison_operator().is_some() {
            return Err(self.unsupported("chained comparisons are not supported"));
        }
        Ok(Node::binary(op, left, right))
    }

    fn arith(&mut self) -> Result<NodeRef, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => Operator::Add,
                Token::Minus => Operator::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Node::binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<NodeRef, ParseError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Token::Star => Operator::Mul,
                Token::Slash => Operator::Div,
                Token::DoubleSlash => Operator::FloorDiv,
                Token::Percent => Operator::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = Node::binary(op, left, right);
        }
    }

    fn factor(&mut self) -> Result<NodeRef, ParseError> {
        let op = match self.peek() {
            Token::Minus => Operator::Neg,
            Token::Plus => Operator::Pos,
            _ => return self.power(),
        };
        self.advance();
        let operand = self.nested(Self::factor)?;
        Ok(labeled(NodeKind::UnaryOp, Label::Operator(op), vec![operand]))
    }

    fn power(&mut self) -> Result<NodeRef, ParseError> {
        let base = self.postfix()?;
        if self.eat(&Token::DoubleStar) {
            let exponent = self.nested(Self::factor)?;
            return Ok(Node::binary(Operator::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<NodeRef, ParseError> {
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                Token::LParen => {
                    self.advance();
                    let mut children = vec![expr];
                    while !self.check(&Token::RParen) {
                        if matches!(self.peek_at(1), Token::Assign)
                            && matches!(self.peek(), Token::Identifier(_))
                        {
                            return Err(self.unsupported("keyword arguments are not supported"));
                        }
                        children.push(self.test()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen, "')'")?;
                    expr = node(NodeKind::Call, children);
                }
                Token::LBracket => {
                    self.advance();
                    if self.check(&Token::Colon) {
                        return Err(self.unsupported("slices are not supported"));
                    }
                    let index = self.testlist()?;
                    if self.check(&Token::Colon) {
                        return Err(self.unsupported("slices are not supported"));
                    }
                    self.expect(&Token::RBracket, "']'")?;
                    expr = node(NodeKind::Subscript, vec![expr, index]);
                }
                Token::Dot => return Err(self.unsupported("attribute access is not supported")),
                _ => return Ok(expr),
            }
        }
    }

    fn atom(&mut self) -> Result<NodeRef, ParseError> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(Node::name(name))
            }
            Token::Int(value) => {
                self.advance();
                Ok(Node::literal(Literal::Int(value)))
            }
            Token::Float(value) => {
                self.advance();
                Ok(Node::literal(Literal::Float(value)))
            }
            Token::Str(first) => {
                self.advance();
                let mut text = first;
                while let Token::Str(next) = self.peek().clone() {
                    self.advance();
                    text.push_str(&next);
                }
                Ok(Node::literal(Literal::Str(text)))
            }
            Token::True => {
                self.advance();
                Ok(Node::literal(Literal::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Node::literal(Literal::Bool(false)))
            }
            Token::NoneLit => {
                self.advance();
                Ok(Node::literal(Literal::None))
            }
            Token::LParen => {
                self.advance();
                if self.eat(&Token::RParen) {
                    return Ok(node(NodeKind::Tuple, vec![]));
                }
                let inner = self.testlist()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&Token::RBracket) {
                    elements.push(self.test()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBracket, "']'")?;
                Ok(node(NodeKind::List, elements))
            }
            Token::Slot(_) | Token::AnonymousSlot => self.metavariable(),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn metavariable(&mut self) -> Result<NodeRef, ParseError> {
        if !self.patterns {
            return Err(self.unsupported("metavariables are only allowed in patterns"));
        }
        let slot = match self.advance() {
            Token::Slot(id) => Some(id),
            _ => None,
        };
        let mut children = Vec::new();
        if self.eat(&Token::LBrace) {
            children.push(self.test()?);
            self.expect(&Token::RBrace, "'}'")?;
        }
        Ok(labeled(NodeKind::Hole, Label::Slot(slot), children))
    }
}

fn starts_expression(token: &Token) -> bool {
    matches!(
        token,
        Token::Identifier(_)
            | Token::Int(_)
            | Token::Float(_)
            | Token::Str(_)
            | Token::True
            | Token::False
            | Token::NoneLit
            | Token::LParen
            | Token::LBracket
            | Token::Minus
            | Token::Plus
            | Token::Not
            | Token::Lambda
            | Token::Slot(_)
            | Token::AnonymousSlot
    )
}

fn augmented_operator(token: &Token) -> Option<Operator> {
    Some(match token {
        Token::PlusAssign => Operator::Add,
        Token::MinusAssign => Operator::Sub,
        Token::StarAssign => Operator::Mul,
        Token::SlashAssign => Operator::Div,
        Token::DoubleSlashAssign => Operator::FloorDiv,
        Token::PercentAssign => Operator::Mod,
        Token::DoubleStarAssign => Operator::Pow,
        _ => return None,
    })
}
