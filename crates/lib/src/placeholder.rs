//! Template expression parsing and substitution.
//!
//! Templates are plain text with `{{ ... }}` expressions. Everything outside
//! an expression passes through unchanged.
//!
//! # Expressions
//!
//! - `{{ .Name }}` - the value of variable `Name`; missing is an error
//! - `{{ getOr .Name "fallback" }}` - the value of `Name`, or `fallback` when
//!   `Name` is missing or the empty string
//! - `{{ isSet .Name }}` - the value of `Name`, or `false` when missing
//! - `{{ "text" }}` - the literal `text`; use `{{ "{{" }}` for a literal `{{`
//!
//! Whitespace inside the braces is optional.
//!
//! # Example
//!
//! ```
//! use ctlplane_lib::placeholder::{parse, Placeholder, Segment};
//!
//! let segments = parse("replicas: {{ .GlanceReplicas }}").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("replicas: ".to_string()),
//!     Segment::Placeholder(Placeholder::Var("GlanceReplicas".to_string())),
//! ]);
//! ```

use std::borrow::Cow;

use thiserror::Error;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `{{ .Name }}`
  Var(String),

  /// `{{ getOr .Name "fallback" }}`
  GetOr { key: String, fallback: String },

  /// `{{ isSet .Name }}`
  IsSet(String),
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no expressions)
  Literal(String),

  /// An expression to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during parsing or substitution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed expression at position {0}")]
  Unclosed(usize),

  #[error("unknown function: {0}")]
  UnknownFunction(String),

  #[error("malformed expression: {0}")]
  Malformed(String),

  #[error("missing variable: {0}")]
  MissingVariable(String),
}

/// Source of variable values during substitution.
pub trait Resolver {
  /// The rendered value of `name`, if defined.
  fn lookup(&self, name: &str) -> Option<Cow<'_, str>>;
}

/// Parse a template into segments.
///
/// # Errors
///
/// Returns an error if an expression is unclosed, malformed or calls an
/// unknown function.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(open) = rest.find("{{") {
    literal.push_str(&rest[..open]);
    let after_open = &rest[open + 2..];
    let close = find_close(after_open).ok_or(PlaceholderError::Unclosed(offset + open))?;

    match parse_expression(&after_open[..close])? {
      Expression::Literal(text) => literal.push_str(&text),
      Expression::Placeholder(placeholder) => {
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(placeholder));
      }
    }

    let consumed = open + 2 + close + 2;
    offset += consumed;
    rest = &rest[consumed..];
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Position of the `}}` closing an expression, skipping quoted strings.
fn find_close(input: &str) -> Option<usize> {
  let bytes = input.as_bytes();
  let mut in_quote = false;
  let mut i = 0;

  while i < bytes.len() {
    match bytes[i] {
      b'\\' if in_quote => i += 1,
      b'"' => in_quote = !in_quote,
      b'}' if !in_quote && bytes.get(i + 1) == Some(&b'}') => return Some(i),
      _ => {}
    }
    i += 1;
  }

  None
}

enum Expression {
  Literal(String),
  Placeholder(Placeholder),
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
  Field(String),
  Ident(String),
  Str(String),
}

fn tokenize(content: &str) -> Result<Vec<Token>, PlaceholderError> {
  let mut tokens = Vec::new();
  let mut chars = content.chars().peekable();

  while let Some(&ch) = chars.peek() {
    if ch.is_whitespace() {
      chars.next();
    } else if ch == '"' {
      chars.next();
      let mut value = String::new();
      let mut closed = false;
      while let Some(c) = chars.next() {
        match c {
          '"' => {
            closed = true;
            break;
          }
          '\\' => match chars.next() {
            Some(escaped) => value.push(escaped),
            None => break,
          },
          _ => value.push(c),
        }
      }
      if !closed {
        return Err(PlaceholderError::Malformed(format!("unterminated string in '{content}'")));
      }
      tokens.push(Token::Str(value));
    } else {
      let mut word = String::new();
      while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == '"' {
          break;
        }
        word.push(c);
        chars.next();
      }
      match word.strip_prefix('.') {
        Some("") => return Err(PlaceholderError::Malformed(format!("empty variable name in '{content}'"))),
        Some(name) => tokens.push(Token::Field(name.to_string())),
        None => tokens.push(Token::Ident(word)),
      }
    }
  }

  Ok(tokens)
}

fn parse_expression(content: &str) -> Result<Expression, PlaceholderError> {
  let tokens = tokenize(content)?;

  match tokens.as_slice() {
    [Token::Field(name)] => Ok(Expression::Placeholder(Placeholder::Var(name.clone()))),
    [Token::Str(text)] => Ok(Expression::Literal(text.clone())),
    [Token::Ident(func), args @ ..] => match (func.as_str(), args) {
      ("getOr", [Token::Field(key), Token::Str(fallback)]) => Ok(Expression::Placeholder(Placeholder::GetOr {
        key: key.clone(),
        fallback: fallback.clone(),
      })),
      ("isSet", [Token::Field(key)]) => Ok(Expression::Placeholder(Placeholder::IsSet(key.clone()))),
      ("getOr", _) => Err(PlaceholderError::Malformed(format!(
        "getOr expects a variable and a quoted fallback: '{}'",
        content.trim()
      ))),
      ("isSet", _) => Err(PlaceholderError::Malformed(format!(
        "isSet expects a single variable: '{}'",
        content.trim()
      ))),
      (other, _) => Err(PlaceholderError::UnknownFunction(other.to_string())),
    },
    [] => Err(PlaceholderError::Malformed("empty expression".to_string())),
    _ => Err(PlaceholderError::Malformed(content.trim().to_string())),
  }
}

/// Substitute all expressions in a string using the provided resolver.
///
/// # Errors
///
/// Returns an error if parsing fails or a required variable is missing.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute expressions in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(Placeholder::Var(name)) => {
        let value = resolver
          .lookup(name)
          .ok_or_else(|| PlaceholderError::MissingVariable(name.clone()))?;
        result.push_str(&value);
      }
      Segment::Placeholder(Placeholder::GetOr { key, fallback }) => match resolver.lookup(key) {
        Some(value) if !value.is_empty() => result.push_str(&value),
        _ => result.push_str(fallback),
      },
      Segment::Placeholder(Placeholder::IsSet(key)) => match resolver.lookup(key) {
        Some(value) => result.push_str(&value),
        None => result.push_str("false"),
      },
    }
  }

  Ok(result)
}
