pub mod tokens;
use std::{iter::Peekable, str::Chars};

pub use tokens::*;

#[derive(Debug, Clone, PartialEq)]
pub struct LexerError {
    pub message: String,
    pub loc: Loc,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {})", self.message, self.loc)
    }
}

impl std::error::Error for LexerError {}

/// Tokenizes the nginx-style brace/semicolon directive grammar:
/// `key value value;` and `key value { ... }` blocks, `#` line comments.
#[derive(Debug)]
pub struct Tokenizer<'a> {
    source: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn loc(&self) -> Loc {
        Loc {
            line: self.line,
            col: self.col,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.source.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(&c) = self.source.peek() {
                if c.is_whitespace() {
                    self.bump();
                } else {
                    break;
                }
            }
            if let Some(&'#') = self.source.peek() {
                while let Some(&c) = self.source.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            break;
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        let start = self.loc();

        let Some(&ch) = self.source.peek() else {
            return Ok(Token::new(TokenKind::Eof, start));
        };

        match ch {
            ';' => {
                self.bump();
                Ok(Token::new(TokenKind::Semicolon, start))
            }
            '{' => {
                self.bump();
                Ok(Token::new(TokenKind::OpenCurly, start))
            }
            '}' => {
                self.bump();
                Ok(Token::new(TokenKind::CloseCurly, start))
            }
            '"' | '\'' => self.read_quoted(ch, start),
            _ => self.read_word(start),
        }
    }

    fn read_quoted(&mut self, quote: char, start: Loc) -> Result<Token, LexerError> {
        self.bump();
        let mut word = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(Token::new(TokenKind::Word(word), start)),
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        word.push(escaped);
                    }
                }
                Some(c) => word.push(c),
                None => {
                    return Err(LexerError {
                        message: format!("unterminated quoted string starting with {quote}"),
                        loc: start,
                    });
                }
            }
        }
    }

    fn read_word(&mut self, start: Loc) -> Result<Token, LexerError> {
        let mut word = String::new();
        while let Some(&c) = self.source.peek() {
            if c.is_whitespace() || c == ';' || c == '{' || c == '}' || c == '#' {
                break;
            }
            word.push(c);
            self.bump();
        }
        if word.is_empty() {
            let bad = self.bump().unwrap();
            return Err(LexerError {
                message: format!("unexpected character '{bad}'"),
                loc: start,
            });
        }
        Ok(Token::new(TokenKind::Word(word), start))
    }
}
