//! Tokenizer and parser for the filter-expression grammar

use super::{Clause, CompareOp, Connective, FilterExpr};

/// Reasons a filter expression fails to parse
///
/// Parse failures are reported to the caller of `FilterExpr::from_str`;
/// `evaluate`/`apply` translate them into the match-nothing policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterParseError {
    #[error("empty filter expression")]
    Empty,

    #[error("unterminated quoted string")]
    UnterminatedString,

    #[error("incomplete clause: expected field, operator and value")]
    IncompleteClause,

    #[error("unknown operator {0:?}")]
    UnknownOperator(String),

    #[error("expected 'and' or 'or', found {0:?}")]
    ExpectedConnective(String),

    #[error("mixing 'and' and 'or' in one expression is not supported")]
    MixedConnectives,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some('\'') => break,
                    Some(ch) => value.push(ch),
                    None => return Err(FilterParseError::UnterminatedString),
                }
            }
            tokens.push(Token::Quoted(value));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '\'' {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    Ok(tokens)
}

pub(super) fn parse(input: &str) -> Result<FilterExpr, FilterParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FilterParseError::Empty);
    }

    let mut iter = tokens.into_iter();
    let mut clauses = vec![parse_clause(&mut iter)?];
    let mut connective: Option<Connective> = None;

    while let Some(token) = iter.next() {
        let word = match token {
            Token::Word(word) => word,
            Token::Quoted(quoted) => return Err(FilterParseError::ExpectedConnective(quoted)),
        };
        let next = match word.to_ascii_lowercase().as_str() {
            "and" => Connective::And,
            "or" => Connective::Or,
            _ => return Err(FilterParseError::ExpectedConnective(word)),
        };
        match connective {
            None => connective = Some(next),
            Some(current) if current == next => {}
            Some(_) => return Err(FilterParseError::MixedConnectives),
        }
        clauses.push(parse_clause(&mut iter)?);
    }

    match connective {
        None => {
            let clause = clauses.pop().ok_or(FilterParseError::Empty)?;
            Ok(FilterExpr::Single(clause))
        }
        Some(connective) => Ok(FilterExpr::Chain {
            connective,
            clauses,
        }),
    }
}

fn parse_clause(iter: &mut impl Iterator<Item = Token>) -> Result<Clause, FilterParseError> {
    let field = match iter.next() {
        Some(Token::Word(word)) => word,
        _ => return Err(FilterParseError::IncompleteClause),
    };
    let op_word = match iter.next() {
        Some(Token::Word(word)) => word,
        _ => return Err(FilterParseError::IncompleteClause),
    };
    let op = CompareOp::parse(&op_word).ok_or(FilterParseError::UnknownOperator(op_word))?;
    let value = match iter.next() {
        Some(Token::Word(word)) => word,
        Some(Token::Quoted(quoted)) => quoted,
        None => return Err(FilterParseError::IncompleteClause),
    };

    Ok(Clause { field, op, value })
}
