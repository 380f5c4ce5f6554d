// Tokenizer for the Python subset, built on `logos`, plus the layout pass that
// turns leading whitespace into INDENT / DEDENT tokens.

use std::fmt;

use logos::Logos;

use super::ParseError;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum Token {
    #[regex(r"\r?\n")]
    Newline,

    // --- Keywords ---
    #[token("def")]
    Def,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("is")]
    Is,
    #[token("lambda")]
    Lambda,
    #[token("pass")]
    Pass,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    NoneLit,

    // --- Identifiers and literals ---
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    Int(i64),
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse().ok())]
    Float(f64),
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| unescape(lex.slice()))]
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    // --- Pattern metavariables ---
    #[regex(r"\$[0-9]+", |lex| lex.slice()[1..].parse().ok())]
    Slot(u32),
    #[token("$_")]
    AnonymousSlot,

    // --- Operators ---
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    DoubleStar,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("//=")]
    DoubleSlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("**=")]
    DoubleStarAssign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtE,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtE,

    // --- Delimiters ---
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    // Produced by the layout pass
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Newline => write!(f, "end of line"),
            Token::Identifier(name) => write!(f, "identifier '{name}'"),
            Token::Int(n) => write!(f, "integer {n}"),
            Token::Float(x) => write!(f, "float {x}"),
            Token::Str(s) => write!(f, "string {s:?}"),
            Token::Slot(id) => write!(f, "'${id}'"),
            Token::Indent => write!(f, "indent"),
            Token::Dedent => write!(f, "dedent"),
            Token::Eof => write!(f, "end of input"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A token with the line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
}

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other @ ('\\' | '\'' | '"')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Width of the leading whitespace of the line containing `offset`, with tabs
/// advancing to the next multiple of eight.
fn column_of(source: &str, offset: usize) -> usize {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..offset].chars().fold(0, |col, c| match c {
        '\t' => (col / 8 + 1) * 8,
        _ => col + 1,
    })
}

/// Tokenize `source`, resolving indentation. The result always ends with
/// `Newline`, the pending `Dedent`s, and `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, ParseError> {
    let mut out: Vec<Lexeme> = Vec::new();
    let mut indents = vec![0usize];
    let mut depth = 0usize;
    let mut line = 1usize;
    let mut scanned = 0usize;
    let mut at_line_start = true;
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        line += source[scanned..span.start].matches('\n').count();
        scanned = span.start;
        let token = result.map_err(|_| ParseError::Lex {
            line,
            text: lexer.slice().to_string(),
        })?;

        if token == Token::Newline {
            let pending = out.last().is_some_and(|l| l.token != Token::Newline);
            if depth == 0 && !at_line_start && pending {
                out.push(Lexeme { token, line });
            }
            if depth == 0 {
                at_line_start = true;
            }
            continue;
        }

        if at_line_start && depth == 0 {
            let column = column_of(source, span.start);
            let current = indents.last().copied().unwrap_or(0);
            if column > current {
                indents.push(column);
                out.push(Lexeme { token: Token::Indent, line });
            } else if column < current {
                while indents.last().is_some_and(|&top| top > column) {
                    indents.pop();
                    out.push(Lexeme { token: Token::Dedent, line });
                }
                if indents.last() != Some(&column) {
                    return Err(ParseError::Indentation { line });
                }
            }
            at_line_start = false;
        }

        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            _ => {}
        }
        out.push(Lexeme { token, line });
    }

    if out.last().is_some_and(|l| l.token != Token::Newline) {
        out.push(Lexeme { token: Token::Newline, line });
    }
    while indents.len() > 1 {
        indents.pop();
        out.push(Lexeme { token: Token::Dedent, line });
    }
    out.push(Lexeme { token: Token::Eof, line });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|l| l.token)
            .collect()
    }

    #[test]
    fn test_indent_and_dedent() {
        let tokens = kinds("if x:\n    y = 1\nz\n");
        assert_eq!(
            tokens,
            vec![
                Token::If,
                Token::Identifier("x".into()),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                Token::Identifier("y".into()),
                Token::Assign,
                Token::Int(1),
                Token::Newline,
                Token::Dedent,
                Token::Identifier("z".into()),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_blank_lines_and_comments_are_ignored() {
        let tokens = kinds("\n# comment\nx = 1  # trailing\n\n\n");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("x".into()),
                Token::Assign,
                Token::Int(1),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_joined() {
        let tokens = kinds("f(1,\n  2)\n");
        assert!(!tokens[..tokens.len() - 2].contains(&Token::Newline));
        assert!(!tokens.contains(&Token::Indent));
    }

    #[test]
    fn test_dedent_to_unknown_level_fails() {
        let err = tokenize("if x:\n        y\n    z\n").unwrap_err();
        assert!(matches!(err, ParseError::Indentation { line: 3 }));
    }

    #[test]
    fn test_literals_and_metavariables() {
        let tokens = kinds("'a\\n' 1.5 $2 $_");
        assert_eq!(tokens[0], Token::Str("a\n".into()));
        assert_eq!(tokens[1], Token::Float(1.5));
        assert_eq!(tokens[2], Token::Slot(2));
        assert_eq!(tokens[3], Token::AnonymousSlot);
    }

    #[test]
    fn test_unknown_character_is_a_lex_error() {
        let err = tokenize("x = ?").unwrap_err();
        assert!(matches!(err, ParseError::Lex { line: 1, .. }));
    }
}
