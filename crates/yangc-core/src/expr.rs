//! `if-feature` expression parsing.
//!
//! Grammar (RFC 7950 §7.20.2, "or" binds loosest):
//!
//! ```text
//! expr   := term { "or" term }
//! term   := factor { "and" factor }
//! factor := "not" factor | "(" expr ")" | identifier-ref
//! ```
//!
//! Parsing yields a name-based tree; the compiler resolves the names to
//! feature ids and re-expresses the tree as [`crate::model::IfFeature`].

use crate::error::{CompileError, ErrorKind, Result};

/// An `if-feature` expression over (possibly prefixed) feature names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeatureExpr {
    /// A feature reference, `[prefix:]name`.
    Name(String),
    /// `not E`
    Not(Box<FeatureExpr>),
    /// `E1 and E2`
    And(Box<FeatureExpr>, Box<FeatureExpr>),
    /// `E1 or E2`
    Or(Box<FeatureExpr>, Box<FeatureExpr>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Name(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn syntax(text: &str, message: impl Into<String>) -> CompileError {
    CompileError::new(
        ErrorKind::Syntax,
        text,
        format!("invalid if-feature expression: {}", message.into()),
    )
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = pos;
                while let Some(&(p, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':') {
                        end = p + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &text[pos..end];
                tokens.push(match word {
                    "not" => Token::Not,
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Name(word.to_owned()),
                });
            }
            other => return Err(syntax(text, format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expr(&mut self) -> Result<FeatureExpr> {
        let mut left = self.term()?;
        while self.peek() == Some(&Token::Or) {
            self.bump();
            let right = self.term()?;
            left = FeatureExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<FeatureExpr> {
        let mut left = self.factor()?;
        while self.peek() == Some(&Token::And) {
            self.bump();
            let right = self.factor()?;
            left = FeatureExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<FeatureExpr> {
        match self.bump() {
            Some(Token::Not) => Ok(FeatureExpr::Not(Box::new(self.factor()?))),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(syntax(self.text, "missing ')'")),
                }
            }
            Some(Token::Name(name)) => Ok(FeatureExpr::Name(name)),
            Some(tok) => Err(syntax(self.text, format!("unexpected token {tok:?}"))),
            None => Err(syntax(self.text, "unexpected end of expression")),
        }
    }
}

/// Parse an `if-feature` argument.
pub fn parse_if_feature(text: &str) -> Result<FeatureExpr> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(syntax(text, "empty expression"));
    }
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
    };
    let expr = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(syntax(text, "trailing tokens"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> FeatureExpr {
        FeatureExpr::Name(n.into())
    }

    #[test]
    fn test_single_name() {
        assert_eq!(parse_if_feature("foo").unwrap(), name("foo"));
        assert_eq!(parse_if_feature("pfx:foo").unwrap(), name("pfx:foo"));
    }

    #[test]
    fn test_precedence() {
        // a or b and c == a or (b and c)
        let expr = parse_if_feature("a or b and c").unwrap();
        assert_eq!(
            expr,
            FeatureExpr::Or(
                Box::new(name("a")),
                Box::new(FeatureExpr::And(Box::new(name("b")), Box::new(name("c")))),
            )
        );
    }

    #[test]
    fn test_not_binds_tightest() {
        let expr = parse_if_feature("not a and b").unwrap();
        assert_eq!(
            expr,
            FeatureExpr::And(
                Box::new(FeatureExpr::Not(Box::new(name("a")))),
                Box::new(name("b")),
            )
        );
    }

    #[test]
    fn test_parens() {
        let expr = parse_if_feature("not (a or b)").unwrap();
        assert_eq!(
            expr,
            FeatureExpr::Not(Box::new(FeatureExpr::Or(
                Box::new(name("a")),
                Box::new(name("b")),
            )))
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse_if_feature("").is_err());
        assert!(parse_if_feature("and a").is_err());
        assert!(parse_if_feature("(a or b").is_err());
        assert!(parse_if_feature("a b").is_err());
        assert!(parse_if_feature("a %").is_err());
    }
}
