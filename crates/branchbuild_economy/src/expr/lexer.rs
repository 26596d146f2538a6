//! Tokenizer for the expression language.

use super::ExprError;

/// Lexer token.
#[derive(Clone, Debug, PartialEq)]
pub(super) enum Token<'a> {
    Ident(&'a str),
    Number(f64),
    Str(String),
    /// Punctuation and operators, by their source spelling.
    Punct(&'static str),
    Eof,
}

/// Token paired with its byte offset.
#[derive(Clone, Debug)]
pub(super) struct SpannedToken<'a> {
    pub token: Token<'a>,
    pub position: usize,
}

/// Operators, longest first so `===` wins over `==`.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!",
    "(", ")", "[", "]", ".", ",", "?", ":",
];

pub(super) struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub(super) const fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    pub(super) fn lex(mut self) -> Result<Vec<SpannedToken<'a>>, ExprError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while self.offset < bytes.len() {
            let ch = bytes[self.offset];
            let start = self.offset;
            match ch {
                b' ' | b'\t' | b'\n' | b'\r' => self.offset += 1,
                b'\'' | b'"' => {
                    let text = self.string(ch)?;
                    tokens.push(SpannedToken { token: Token::Str(text), position: start });
                }
                b'0'..=b'9' => {
                    let n = self.number()?;
                    tokens.push(SpannedToken { token: Token::Number(n), position: start });
                }
                b'.' if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) => {
                    let n = self.number()?;
                    tokens.push(SpannedToken { token: Token::Number(n), position: start });
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => {
                    self.consume_while(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$');
                    let slice = &self.input[start..self.offset];
                    tokens.push(SpannedToken { token: Token::Ident(slice), position: start });
                }
                _ => {
                    let rest = &self.input[start..];
                    let Some(&op) = PUNCTUATION.iter().find(|op| rest.starts_with(**op)) else {
                        let found = rest.chars().next().map(String::from).unwrap_or_default();
                        return Err(ExprError::UnexpectedToken {
                            expected: "identifier, literal or operator",
                            found,
                            position: start,
                        });
                    };
                    self.offset += op.len();
                    tokens.push(SpannedToken { token: Token::Punct(op), position: start });
                }
            }
        }

        if tokens.is_empty() {
            return Err(ExprError::EmptyInput);
        }
        tokens.push(SpannedToken { token: Token::Eof, position: self.offset });
        Ok(tokens)
    }

    fn consume_while(&mut self, condition: impl Fn(u8) -> bool) {
        let bytes = self.input.as_bytes();
        while let Some(&b) = bytes.get(self.offset) {
            if !condition(b) {
                break;
            }
            self.offset += 1;
        }
    }

    fn number(&mut self) -> Result<f64, ExprError> {
        let start = self.offset;
        let bytes = self.input.as_bytes();
        self.consume_while(|b| b.is_ascii_digit());
        if bytes.get(self.offset) == Some(&b'.') {
            self.offset += 1;
            self.consume_while(|b| b.is_ascii_digit());
        }
        if matches!(bytes.get(self.offset), Some(b'e' | b'E')) {
            self.offset += 1;
            if matches!(bytes.get(self.offset), Some(b'+' | b'-')) {
                self.offset += 1;
            }
            self.consume_while(|b| b.is_ascii_digit());
        }
        let raw = &self.input[start..self.offset];
        raw.parse::<f64>().map_err(|_| ExprError::InvalidNumber {
            raw: raw.to_string(),
            position: start,
        })
    }

    fn string(&mut self, quote: u8) -> Result<String, ExprError> {
        let start = self.offset;
        self.offset += 1;
        let mut out = String::new();
        let mut chars = self.input[self.offset..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                c if c as u32 == u32::from(quote) => {
                    self.offset += i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err(ExprError::UnterminatedString { position: start })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token<'_>> {
        Lexer::new(src).lex().unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            kinds("a === b"),
            vec![Token::Ident("a"), Token::Punct("==="), Token::Ident("b"), Token::Eof]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "x""#),
            vec![Token::Str("it's".into()), Token::Str("x".into()), Token::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1.5 .25 2e3"),
            vec![Token::Number(1.5), Token::Number(0.25), Token::Number(2000.0), Token::Eof]
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(Lexer::new("  ").lex().unwrap_err(), ExprError::EmptyInput);
        assert_eq!(
            Lexer::new("'open").lex().unwrap_err(),
            ExprError::UnterminatedString { position: 0 }
        );
        assert!(matches!(
            Lexer::new("a # b").lex().unwrap_err(),
            ExprError::UnexpectedToken { position: 2, .. }
        ));
    }
}
