//! Assertion tokenizer
//!
//! Splits `(predicate arg1 arg2 ...)` text into top-level tokens. A
//! quoted string is one token regardless of the whitespace or
//! parentheses inside it, with backslash escaping; a nested assertion
//! is one token including its parentheses.

use super::edge::ErrorEdge;
use thiserror::Error;

/// Why an assertion string failed to tokenize.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("assertion must be a parenthesized list: {0}")]
    NotAnAssertion(String),

    #[error("unbalanced parentheses: {0}")]
    Unbalanced(String),

    #[error("unterminated string literal: {0}")]
    UnterminatedString(String),

    #[error("assertion needs a predicate and at least one argument: {0}")]
    TooFewElements(String),
}

impl ParseError {
    /// Stable machine token for the syntactic error-edge message.
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::NotAnAssertion(_) => "not-an-assertion",
            ParseError::Unbalanced(_) => "unbalanced-parens",
            ParseError::UnterminatedString(_) => "unterminated-string",
            ParseError::TooFewElements(_) => "too-few-elements",
        }
    }

    /// Human-readable failure description, without the offending text.
    pub fn describe(&self) -> &'static str {
        match self {
            ParseError::NotAnAssertion(_) => "assertion must be a parenthesized list",
            ParseError::Unbalanced(_) => "unbalanced parentheses",
            ParseError::UnterminatedString(_) => "unterminated string literal",
            ParseError::TooFewElements(_) => "assertion needs a predicate and at least one argument",
        }
    }

    /// The text that failed to parse.
    pub fn text(&self) -> &str {
        match self {
            ParseError::NotAnAssertion(text)
            | ParseError::Unbalanced(text)
            | ParseError::UnterminatedString(text)
            | ParseError::TooFewElements(text) => text,
        }
    }
}

impl From<ParseError> for ErrorEdge {
    fn from(err: ParseError) -> Self {
        ErrorEdge::new(err.text().to_string(), err.describe(), err.reason())
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Whether trimmed text takes the assertion form at all.
pub fn looks_like_assertion(text: &str) -> bool {
    text.trim_start().starts_with('(')
}

/// Split one assertion into its top-level element strings.
pub fn split_assertion(text: &str) -> ParseResult<Vec<String>> {
    let trimmed = text.trim();
    if !trimmed.starts_with('(') {
        return Err(ParseError::NotAnAssertion(text.to_string()));
    }

    let mut tokens: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut closed = false;

    for c in trimmed.chars() {
        if closed {
            // Anything after the closing paren makes this not a single
            // assertion.
            if !c.is_whitespace() {
                return Err(ParseError::NotAnAssertion(text.to_string()));
            }
            continue;
        }

        if in_string {
            buf.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                buf.push(c);
            }
            '(' => {
                depth += 1;
                if depth > 1 {
                    buf.push(c);
                }
            }
            ')' => {
                if depth == 0 {
                    return Err(ParseError::Unbalanced(text.to_string()));
                }
                depth -= 1;
                if depth == 0 {
                    if !buf.is_empty() {
                        tokens.push(std::mem::take(&mut buf));
                    }
                    closed = true;
                } else {
                    buf.push(c);
                }
            }
            c if c.is_whitespace() => {
                if depth == 1 {
                    if !buf.is_empty() {
                        tokens.push(std::mem::take(&mut buf));
                    }
                } else {
                    buf.push(c);
                }
            }
            other => buf.push(other),
        }
    }

    if in_string {
        return Err(ParseError::UnterminatedString(text.to_string()));
    }
    if depth != 0 || !closed {
        return Err(ParseError::Unbalanced(text.to_string()));
    }
    if tokens.len() < 2 {
        return Err(ParseError::TooFewElements(text.to_string()));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_split() {
        let tokens = split_assertion("(isa Dog Mammal)").expect("split");
        assert_eq!(tokens, vec!["isa", "Dog", "Mammal"]);
    }

    #[test]
    fn test_quoted_token_keeps_spaces_and_parens() {
        let tokens = split_assertion("(comment Dog \"A dog (canine) friend\")").expect("split");
        assert_eq!(tokens, vec!["comment", "Dog", "\"A dog (canine) friend\""]);
    }

    #[test]
    fn test_escaped_quote_stays_inside_token() {
        let tokens =
            split_assertion("(comment Dog \"say \\\"hi\\\" twice\")").expect("split");
        assert_eq!(tokens[2], "\"say \\\"hi\\\" twice\"");
    }

    #[test]
    fn test_nested_assertion_is_one_token() {
        let tokens = split_assertion("(believes Alice (isa Dog Mammal))").expect("split");
        assert_eq!(tokens, vec!["believes", "Alice", "(isa Dog Mammal)"]);
    }

    #[test]
    fn test_tabs_separate_tokens() {
        let tokens = split_assertion("(isa\tDog\tMammal)").expect("split");
        assert_eq!(tokens, vec!["isa", "Dog", "Mammal"]);
    }

    #[test]
    fn test_tabs_inside_quotes_are_content() {
        let tokens = split_assertion("(comment Dog \"A\tB\")").expect("split");
        assert_eq!(tokens[2], "\"A\tB\"");
    }

    #[test]
    fn test_rejects_bare_text() {
        assert!(matches!(
            split_assertion("isa Dog Mammal"),
            Err(ParseError::NotAnAssertion(_))
        ));
    }

    #[test]
    fn test_rejects_trailing_garbage() {
        assert!(matches!(
            split_assertion("(isa Dog Mammal) extra"),
            Err(ParseError::NotAnAssertion(_))
        ));
    }

    #[test]
    fn test_rejects_unbalanced() {
        assert!(matches!(
            split_assertion("(isa Dog"),
            Err(ParseError::Unbalanced(_))
        ));
        assert!(matches!(
            split_assertion("(believes Alice (isa Dog Mammal)"),
            Err(ParseError::Unbalanced(_))
        ));
    }

    #[test]
    fn test_rejects_unterminated_string() {
        assert!(matches!(
            split_assertion("(comment Dog \"no end)"),
            Err(ParseError::UnterminatedString(_))
        ));
    }

    #[test]
    fn test_rejects_too_few_elements() {
        assert!(matches!(
            split_assertion("(isa)"),
            Err(ParseError::TooFewElements(_))
        ));
        assert!(matches!(
            split_assertion("()"),
            Err(ParseError::TooFewElements(_))
        ));
    }

    #[test]
    fn test_reason_tokens() {
        assert_eq!(
            split_assertion("(isa Dog").unwrap_err().reason(),
            "unbalanced-parens"
        );
        assert_eq!(
            split_assertion("nope").unwrap_err().reason(),
            "not-an-assertion"
        );
    }
}
