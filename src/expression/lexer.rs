use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Str(String),
    Number(f64),
    Boolean(bool),
    Null,
    /// A property path such as `user.address.city` or `items[0].name`.
    Identifier(String),

    // Comparison
    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And, // &&
    Or,  // ||
    Not, // !

    Minus,
    LParen,
    RParen,
}

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer { source, chars: source.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn error(&self, ch: char) -> Error {
        Error::Lexical { expression: self.source.to_string(), position: self.pos, ch }
    }

    fn read_string(&mut self, quote: char) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(Error::Syntax(format!(
                        "unterminated string starting at position {start} in '{}'",
                        self.source
                    )))
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some(c) => s.push(c),
                        None => continue,
                    }
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Token::Str(s));
                }
                Some(c) => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some('0'..='9')) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some('0'..='9')) {
            self.pos += 1;
            while matches!(self.peek(), Some('0'..='9')) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::Number(text.parse().unwrap_or(f64::NAN))
    }

    fn read_identifier(&mut self) -> Result<Token> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.pos += 1;
            } else if c == '[' {
                self.skip_bracket()?;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Ok(match text.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            _ => Token::Identifier(text),
        })
    }

    /// Consumes an index suffix (`[0]`, `['key']`) as part of an identifier.
    fn skip_bracket(&mut self) -> Result<()> {
        let open = self.pos;
        self.pos += 1;
        let mut quote: Option<char> = None;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), '\\') => self.pos += 1,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, ']') => return Ok(()),
                (None, _) => {}
            }
        }
        Err(Error::Syntax(format!(
            "unclosed '[' at position {open} in '{}'",
            self.source
        )))
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let two = (c, self.peek2());
            let token = match two {
                ('=', Some('=')) => Some(Token::Eq),
                ('!', Some('=')) => Some(Token::Ne),
                ('<', Some('=')) => Some(Token::Le),
                ('>', Some('=')) => Some(Token::Ge),
                ('&', Some('&')) => Some(Token::And),
                ('|', Some('|')) => Some(Token::Or),
                _ => None,
            };
            if let Some(token) = token {
                // Accept `===` / `!==` as spellings of the coercive operators.
                self.pos += 2;
                if matches!(token, Token::Eq | Token::Ne) && self.peek() == Some('=') {
                    self.pos += 1;
                }
                tokens.push(token);
                continue;
            }
            let token = match c {
                '<' => Token::Lt,
                '>' => Token::Gt,
                '!' => Token::Not,
                '-' => Token::Minus,
                '(' => Token::LParen,
                ')' => Token::RParen,
                '\'' | '"' => {
                    tokens.push(self.read_string(c)?);
                    continue;
                }
                '0'..='9' => {
                    tokens.push(self.read_number());
                    continue;
                }
                c if is_ident_start(c) => {
                    tokens.push(self.read_identifier()?);
                    continue;
                }
                other => return Err(self.error(other)),
            };
            self.pos += 1;
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Converts a condition string into a token stream.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}
