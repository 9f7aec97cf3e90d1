//! Tokenizer for the omnibus settings syntax.

use crate::ParseError;

/// Lexer token produced from settings text.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token<'a> {
    /// Bare identifier, including `true`, `false`, and `nil`.
    Ident(&'a str),
    /// Hash label such as `name:` in `{ name: 'saml' }`.
    Label(&'a str),
    /// Symbol literal such as `:saml`.
    Symbol(&'a str),
    /// Quoted string with escapes resolved.
    Str(String),
    Integer(i64),
    Float(f64),
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    /// Assignment `=`.
    Assign,
    /// Hash pair separator `=>`.
    FatArrow,
    /// Free-standing colon, as in `'key': value`.
    Colon,
    Newline,
    Semicolon,
    Eof,
}

/// Token paired with its byte offset.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct SpannedToken<'a> {
    pub(super) token: Token<'a>,
    pub(super) position: usize,
}

/// Convert a byte offset into a 1-based line and column.
pub(super) fn line_column(input: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(input.len());
    let before = &input[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Build a positioned parse error.
pub(super) fn error_at(input: &str, offset: usize, message: impl Into<String>) -> ParseError {
    let (line, column) = line_column(input, offset);
    ParseError::new(line, column, message)
}

/// Lexer over settings text.
pub(super) struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub(super) const fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    /// Lex the whole input, terminating the stream with `Eof`.
    pub(super) fn lex(&mut self) -> Result<Vec<SpannedToken<'a>>, ParseError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while self.offset < bytes.len() {
            let ch = bytes[self.offset];
            match ch {
                b' ' | b'\t' | b'\r' => {
                    self.offset += 1;
                }
                b'\\' if self.peek(bytes) == Some(b'\n') => {
                    // explicit line continuation
                    self.offset += 2;
                }
                b'\\' if bytes[self.offset + 1..].starts_with(b"\r\n") => {
                    self.offset += 3;
                }
                b'#' => {
                    self.consume_while(bytes, |b| b != b'\n');
                }
                b'\n' => tokens.push(self.single(Token::Newline)),
                b';' => tokens.push(self.single(Token::Semicolon)),
                b'[' => tokens.push(self.single(Token::LBracket)),
                b']' => tokens.push(self.single(Token::RBracket)),
                b'{' => tokens.push(self.single(Token::LBrace)),
                b'}' => tokens.push(self.single(Token::RBrace)),
                b'(' => tokens.push(self.single(Token::LParen)),
                b')' => tokens.push(self.single(Token::RParen)),
                b',' => tokens.push(self.single(Token::Comma)),
                b'=' => {
                    let position = self.offset;
                    match self.peek(bytes) {
                        Some(b'>') => {
                            self.offset += 2;
                            tokens.push(SpannedToken {
                                token: Token::FatArrow,
                                position,
                            });
                        }
                        Some(b'=') => {
                            return Err(error_at(
                                self.input,
                                position,
                                "comparison operators are not supported",
                            ));
                        }
                        _ => tokens.push(self.single(Token::Assign)),
                    }
                }
                // `"key":` in a hash; the colon hugs the closing quote
                b':' if follows_quoted_string(&tokens, bytes, self.offset) => {
                    tokens.push(self.single(Token::Colon));
                }
                b':' => tokens.push(self.lex_colon(bytes)?),
                b'\'' => tokens.push(self.lex_single_quoted(bytes)?),
                b'"' => tokens.push(self.lex_double_quoted(bytes)?),
                b'-' | b'+' | b'0'..=b'9' => tokens.push(self.lex_number(bytes)?),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    let start = self.offset;
                    self.consume_while(bytes, is_ident_byte);
                    let slice = &self.input[start..self.offset];
                    let is_label = bytes.get(self.offset) == Some(&b':')
                        && bytes.get(self.offset + 1) != Some(&b':');
                    let token = if is_label {
                        self.offset += 1;
                        Token::Label(slice)
                    } else {
                        Token::Ident(slice)
                    };
                    tokens.push(SpannedToken {
                        token,
                        position: start,
                    });
                }
                _ => {
                    let found = self.input[self.offset..].chars().next().unwrap_or('?');
                    return Err(error_at(
                        self.input,
                        self.offset,
                        format!("unexpected character `{found}`"),
                    ));
                }
            }
        }

        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    /// Emit a one-byte token and advance past it.
    fn single(&mut self, token: Token<'a>) -> SpannedToken<'a> {
        let position = self.offset;
        self.offset += 1;
        SpannedToken { token, position }
    }

    /// Return the byte after the current one without advancing.
    fn peek(&self, bytes: &[u8]) -> Option<u8> {
        bytes.get(self.offset + 1).copied()
    }

    fn consume_while<F>(&mut self, bytes: &[u8], condition: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(&b) = bytes.get(self.offset) {
            if condition(b) {
                self.offset += 1;
            } else {
                break;
            }
        }
    }

    /// Lex either a symbol (`:name`, `:'name'`) or a bare colon.
    fn lex_colon(&mut self, bytes: &[u8]) -> Result<SpannedToken<'a>, ParseError> {
        let position = self.offset;
        match self.peek(bytes) {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                self.offset += 1;
                let start = self.offset;
                self.consume_while(bytes, is_ident_byte);
                Ok(SpannedToken {
                    token: Token::Symbol(&self.input[start..self.offset]),
                    position,
                })
            }
            Some(b'\'' | b'"') => {
                self.offset += 1;
                let quoted = if bytes[self.offset] == b'\'' {
                    self.lex_single_quoted(bytes)?
                } else {
                    self.lex_double_quoted(bytes)?
                };
                Ok(SpannedToken {
                    token: quoted.token,
                    position,
                })
            }
            Some(b':') => Err(error_at(
                self.input,
                position,
                "constant paths are not supported",
            )),
            _ => Ok(self.single(Token::Colon)),
        }
    }

    /// Lex a single-quoted string; only `\\` and `\'` are escapes.
    fn lex_single_quoted(&mut self, bytes: &[u8]) -> Result<SpannedToken<'a>, ParseError> {
        let position = self.offset;
        self.offset += 1;
        let mut value = String::new();
        let mut segment_start = self.offset;
        loop {
            let Some(&b) = bytes.get(self.offset) else {
                return Err(error_at(self.input, position, "unterminated string"));
            };
            match b {
                b'\'' => {
                    value.push_str(&self.input[segment_start..self.offset]);
                    self.offset += 1;
                    break;
                }
                b'\\' if matches!(self.peek(bytes), Some(b'\\' | b'\'')) => {
                    value.push_str(&self.input[segment_start..self.offset]);
                    value.push(char::from(bytes[self.offset + 1]));
                    self.offset += 2;
                    segment_start = self.offset;
                }
                _ => self.offset += 1,
            }
        }
        Ok(SpannedToken {
            token: Token::Str(value),
            position,
        })
    }

    /// Lex a double-quoted string, resolving the common escapes.
    fn lex_double_quoted(&mut self, bytes: &[u8]) -> Result<SpannedToken<'a>, ParseError> {
        let position = self.offset;
        self.offset += 1;
        let mut value = String::new();
        let mut segment_start = self.offset;
        loop {
            let Some(&b) = bytes.get(self.offset) else {
                return Err(error_at(self.input, position, "unterminated string"));
            };
            match b {
                b'"' => {
                    value.push_str(&self.input[segment_start..self.offset]);
                    self.offset += 1;
                    break;
                }
                b'#' if self.peek(bytes) == Some(b'{') => {
                    return Err(error_at(
                        self.input,
                        self.offset,
                        "string interpolation is not supported",
                    ));
                }
                b'\\' => {
                    value.push_str(&self.input[segment_start..self.offset]);
                    let escaped = match self.peek(bytes) {
                        Some(b'n') => '\n',
                        Some(b't') => '\t',
                        Some(b'r') => '\r',
                        Some(b'0') => '\0',
                        Some(b's') => ' ',
                        Some(b'\\') => '\\',
                        Some(b'"') => '"',
                        Some(b'#') => '#',
                        Some(b'\'') => '\'',
                        None => {
                            return Err(error_at(self.input, position, "unterminated string"));
                        }
                        Some(_) => {
                            return Err(error_at(
                                self.input,
                                self.offset,
                                "unsupported escape sequence",
                            ));
                        }
                    };
                    value.push(escaped);
                    self.offset += 2;
                    segment_start = self.offset;
                }
                _ => self.offset += 1,
            }
        }
        Ok(SpannedToken {
            token: Token::Str(value),
            position,
        })
    }

    /// Lex an integer or float literal with optional sign and `_` separators.
    fn lex_number(&mut self, bytes: &[u8]) -> Result<SpannedToken<'a>, ParseError> {
        let position = self.offset;
        if matches!(bytes[self.offset], b'-' | b'+') {
            if !self.peek(bytes).is_some_and(|b| b.is_ascii_digit()) {
                return Err(error_at(
                    self.input,
                    position,
                    "arithmetic operators are not supported",
                ));
            }
            self.offset += 1;
        }
        self.consume_while(bytes, |b| b.is_ascii_digit() || b == b'_');
        let mut is_float = false;
        if bytes.get(self.offset) == Some(&b'.') && self.peek(bytes).is_some_and(|b| b.is_ascii_digit())
        {
            is_float = true;
            self.offset += 1;
            self.consume_while(bytes, |b| b.is_ascii_digit() || b == b'_');
        }
        if matches!(bytes.get(self.offset), Some(b'e' | b'E')) {
            let mut lookahead = self.offset + 1;
            if matches!(bytes.get(lookahead), Some(b'-' | b'+')) {
                lookahead += 1;
            }
            if bytes.get(lookahead).is_some_and(|b| b.is_ascii_digit()) {
                is_float = true;
                self.offset = lookahead;
                self.consume_while(bytes, |b| b.is_ascii_digit());
            }
        }

        let raw = &self.input[position..self.offset];
        let trailing = bytes
            .get(self.offset)
            .is_some_and(|&b| is_ident_byte(b) || b == b'.');
        if trailing || raw.ends_with('_') || raw.contains("__") {
            self.consume_while(bytes, |b| is_ident_byte(b) || b == b'.');
            let raw = &self.input[position..self.offset];
            return Err(error_at(
                self.input,
                position,
                format!("invalid number literal `{raw}`"),
            ));
        }

        let cleaned: String = raw.chars().filter(|ch| *ch != '_').collect();
        let token = if is_float {
            let value = cleaned.parse::<f64>().map_err(|_| {
                error_at(self.input, position, format!("invalid number literal `{raw}`"))
            })?;
            Token::Float(value)
        } else {
            let value = cleaned.parse::<i64>().map_err(|_| {
                error_at(self.input, position, format!("integer literal `{raw}` is out of range"))
            })?;
            Token::Integer(value)
        };
        Ok(SpannedToken { token, position })
    }
}

fn follows_quoted_string(tokens: &[SpannedToken<'_>], bytes: &[u8], offset: usize) -> bool {
    matches!(
        tokens.last(),
        Some(SpannedToken {
            token: Token::Str(_),
            ..
        })
    ) && offset > 0
        && matches!(bytes[offset - 1], b'\'' | b'"')
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
