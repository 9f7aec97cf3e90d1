//! Recursive-descent parser turning settings tokens into a JSON tree.

use super::lexer::{SpannedToken, Token, error_at};
use crate::ParseError;
use serde_json::{Map, Number, Value};

/// Maximum nesting depth for arrays and hashes.
const MAX_NESTING: usize = 64;

/// Parser over a token stream produced by the settings lexer.
pub(super) struct Parser<'a> {
    input: &'a str,
    tokens: Vec<SpannedToken<'a>>,
    index: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(input: &'a str, tokens: Vec<SpannedToken<'a>>) -> Self {
        Self {
            input,
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    /// Parse every statement into a single root map.
    pub(super) fn parse_document(&mut self) -> Result<Map<String, Value>, ParseError> {
        let mut root = Map::new();
        loop {
            self.skip_separators();
            if self.check(&Token::Eof) {
                break;
            }
            self.parse_statement(&mut root)?;
            match self.current().token {
                Token::Newline | Token::Semicolon | Token::Eof => {}
                _ => return Err(self.unexpected("end of statement")),
            }
        }
        Ok(root)
    }

    /// Parse `section['key'] = value` or the call form `name value`.
    fn parse_statement(&mut self, root: &mut Map<String, Value>) -> Result<(), ParseError> {
        let (name, position) = match self.current().token {
            Token::Ident(name) => (name, self.current().position),
            _ => return Err(self.unexpected("setting name")),
        };
        if is_keyword(name) {
            return Err(self.unexpected("setting name"));
        }
        self.advance();

        let mut path = vec![name.to_string()];
        // `name[...]` indexes; `name [...]` passes an array to the call form
        let indexed = self.check(&Token::LBracket)
            && self.current().position == position + name.len();
        if indexed {
            while self.matches(&Token::LBracket) {
                path.push(self.parse_index_key()?);
                self.expect(&Token::RBracket, "`]`")?;
            }
            self.expect(&Token::Assign, "`=`")?;
            self.skip_newlines();
            let value = self.parse_value()?;
            return self.assign(root, &path, value, position);
        }

        if self.check(&Token::Assign) {
            return Err(error_at(
                self.input,
                position,
                format!("local variable `{name}` is not supported; use `{name}['key'] = value`"),
            ));
        }

        let value = if self.matches(&Token::LParen) {
            self.skip_newlines();
            let value = self.parse_value()?;
            self.skip_newlines();
            self.expect(&Token::RParen, "`)`")?;
            value
        } else {
            self.parse_value()?
        };
        self.assign(root, &path, value, position)
    }

    /// Parse the key inside `[...]`: a string or symbol.
    fn parse_index_key(&mut self) -> Result<String, ParseError> {
        let key = match &self.current().token {
            Token::Str(value) => value.clone(),
            Token::Symbol(value) => (*value).to_string(),
            _ => return Err(self.unexpected("string or symbol key")),
        };
        self.advance();
        Ok(key)
    }

    /// Store `value` at `path`, creating intermediate hashes as needed.
    fn assign(
        &self,
        root: &mut Map<String, Value>,
        path: &[String],
        value: Value,
        position: usize,
    ) -> Result<(), ParseError> {
        let (last, parents) = match path.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };
        let mut current = root;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(error_at(
                        self.input,
                        position,
                        format!(
                            "cannot assign through `{}`: it is not a hash",
                            path[..=depth].join(".")
                        ),
                    ));
                }
            };
        }
        current.insert(last.clone(), value);
        Ok(())
    }

    /// Parse a literal value.
    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let position = self.current().position;
        let value = match &self.current().token {
            Token::Str(value) => Value::String(value.clone()),
            Token::Symbol(value) => Value::String((*value).to_string()),
            Token::Integer(value) => Value::Number(Number::from(*value)),
            Token::Float(value) => match Number::from_f64(*value) {
                Some(number) => Value::Number(number),
                None => return Err(error_at(self.input, position, "invalid float literal")),
            },
            Token::Ident("true") => Value::Bool(true),
            Token::Ident("false") => Value::Bool(false),
            Token::Ident("nil") => Value::Null,
            Token::LBracket => return self.parse_array(),
            Token::LBrace => return self.parse_hash(),
            Token::Ident(name) => {
                return Err(error_at(
                    self.input,
                    position,
                    format!("unexpected identifier `{name}`, expected a value"),
                ));
            }
            _ => return Err(self.unexpected("a value")),
        };
        self.advance();
        Ok(value)
    }

    /// Parse `[a, b, ...]`; trailing commas and newlines are allowed.
    fn parse_array(&mut self) -> Result<Value, ParseError> {
        let open = self.current().position;
        self.enter(open)?;
        self.advance();
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.matches(&Token::RBracket) {
                break;
            }
            if self.check(&Token::Eof) {
                return Err(error_at(self.input, open, "unterminated array"));
            }
            items.push(self.parse_value()?);
            self.skip_newlines();
            if self.matches(&Token::Comma) {
                continue;
            }
            if self.matches(&Token::RBracket) {
                break;
            }
            if self.check(&Token::Eof) {
                return Err(error_at(self.input, open, "unterminated array"));
            }
            return Err(self.unexpected("`,` or `]`"));
        }
        self.nesting -= 1;
        Ok(Value::Array(items))
    }

    /// Parse `{ key => value, label: value }`; later duplicate keys win.
    fn parse_hash(&mut self) -> Result<Value, ParseError> {
        let open = self.current().position;
        self.enter(open)?;
        self.advance();
        let mut map = Map::new();
        loop {
            self.skip_newlines();
            if self.matches(&Token::RBrace) {
                break;
            }
            if self.check(&Token::Eof) {
                return Err(error_at(self.input, open, "unterminated hash"));
            }
            let key = self.parse_hash_key()?;
            self.skip_newlines();
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_newlines();
            if self.matches(&Token::Comma) {
                continue;
            }
            if self.matches(&Token::RBrace) {
                break;
            }
            if self.check(&Token::Eof) {
                return Err(error_at(self.input, open, "unterminated hash"));
            }
            return Err(self.unexpected("`,` or `}`"));
        }
        self.nesting -= 1;
        Ok(Value::Object(map))
    }

    /// Parse a hash key and its separator (`=>` or label colon).
    fn parse_hash_key(&mut self) -> Result<String, ParseError> {
        match &self.current().token {
            Token::Label(name) => {
                let key = (*name).to_string();
                self.advance();
                Ok(key)
            }
            Token::Str(value) => {
                let key = value.clone();
                self.advance();
                if self.matches(&Token::Colon) {
                    return Ok(key);
                }
                self.skip_newlines();
                self.expect(&Token::FatArrow, "`=>` or `:`")?;
                Ok(key)
            }
            Token::Symbol(name) => {
                let key = (*name).to_string();
                self.advance();
                self.skip_newlines();
                self.expect(&Token::FatArrow, "`=>`")?;
                Ok(key)
            }
            Token::Integer(value) => {
                let key = value.to_string();
                self.advance();
                self.skip_newlines();
                self.expect(&Token::FatArrow, "`=>`")?;
                Ok(key)
            }
            _ => Err(self.unexpected("hash key")),
        }
    }

    /// Track collection depth so hostile input cannot exhaust the stack.
    fn enter(&mut self, position: usize) -> Result<(), ParseError> {
        if self.nesting >= MAX_NESTING {
            return Err(error_at(
                self.input,
                position,
                format!("nesting exceeds {MAX_NESTING} levels"),
            ));
        }
        self.nesting += 1;
        Ok(())
    }

    fn current(&self) -> &SpannedToken<'a> {
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    fn check(&self, token: &Token<'_>) -> bool {
        &self.current().token == token
    }

    /// Consume the current token when it matches.
    fn matches(&mut self, token: &Token<'_>) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token<'_>, expected: &str) -> Result<(), ParseError> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn skip_newlines(&mut self) {
        while self.matches(&Token::Newline) {}
    }

    fn skip_separators(&mut self) {
        while self.matches(&Token::Newline) || self.matches(&Token::Semicolon) {}
    }

    /// Build an "unexpected token" error at the current position.
    fn unexpected(&self, expected: &str) -> ParseError {
        let current = self.current();
        let found = describe(&current.token);
        error_at(
            self.input,
            current.position,
            format!("unexpected {found}, expected {expected}"),
        )
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "true" | "false" | "nil")
}

/// Short description of a token for diagnostics.
fn describe(token: &Token<'_>) -> String {
    match token {
        Token::Ident(name) => format!("identifier `{name}`"),
        Token::Label(name) => format!("label `{name}:`"),
        Token::Symbol(name) => format!("symbol `:{name}`"),
        Token::Str(_) => "string".to_string(),
        Token::Integer(value) => format!("integer `{value}`"),
        Token::Float(value) => format!("float `{value}`"),
        Token::LBracket => "`[`".to_string(),
        Token::RBracket => "`]`".to_string(),
        Token::LBrace => "`{`".to_string(),
        Token::RBrace => "`}`".to_string(),
        Token::LParen => "`(`".to_string(),
        Token::RParen => "`)`".to_string(),
        Token::Comma => "`,`".to_string(),
        Token::Assign => "`=`".to_string(),
        Token::FatArrow => "`=>`".to_string(),
        Token::Colon => "`:`".to_string(),
        Token::Newline => "end of line".to_string(),
        Token::Semicolon => "`;`".to_string(),
        Token::Eof => "end of input".to_string(),
    }
}
