pub mod lexer;

use lexer::{Loc, LexerError, Token, TokenKind, Tokenizer};

/// A parsed config node: either a terminated directive (`key a b;`) or a
/// named block (`key a b { ... }`), mirroring the nginx-style grammar this
/// crate tokenizes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Directive(Directive),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub args: Vec<String>,
    pub body: Vec<Node>,
    pub loc: Loc,
}

/// A parse error with source location and the trail of enclosing blocks,
/// e.g. `unexpected '}' (at line 12, col 1) in server > location`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub message: String,
    pub loc: Loc,
    pub context: Vec<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {})", self.message, self.loc)?;
        if !self.context.is_empty() {
            write!(f, " in {}", self.context.join(" > "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

impl From<LexerError> for ConfigError {
    fn from(e: LexerError) -> Self {
        ConfigError {
            message: e.message,
            loc: e.loc,
            context: Vec::new(),
        }
    }
}

pub struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    lookahead: Token,
    context: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, ConfigError> {
        let mut tokenizer = Tokenizer::new(source);
        let first = tokenizer.next_token()?;
        Ok(Parser {
            tokenizer,
            lookahead: first,
            context: Vec::new(),
        })
    }

    /// Parses the whole file into a flat list of top-level nodes.
    pub fn parse(&mut self) -> Result<Vec<Node>, ConfigError> {
        let nodes = self.parse_nodes_until(None)?;
        self.expect_eof()?;
        Ok(nodes)
    }

    fn advance(&mut self) -> Result<(), ConfigError> {
        self.lookahead = self.tokenizer.next_token()?;
        Ok(())
    }

    fn err(&self, message: impl Into<String>) -> ConfigError {
        ConfigError {
            message: message.into(),
            loc: self.lookahead.loc,
            context: self.context.clone(),
        }
    }

    fn expect_eof(&self) -> Result<(), ConfigError> {
        if self.lookahead.is_eof() {
            Ok(())
        } else {
            Err(self.err(format!("unexpected trailing token {:?}", self.lookahead.kind)))
        }
    }

    /// Parses directives/blocks until `}` (when `closing` is true) or EOF.
    fn parse_nodes_until(&mut self, closing: Option<&str>) -> Result<Vec<Node>, ConfigError> {
        let mut nodes = Vec::new();
        loop {
            match &self.lookahead.kind {
                TokenKind::Eof => {
                    if closing.is_some() {
                        return Err(self.err("unexpected end of file, expected '}'"));
                    }
                    return Ok(nodes);
                }
                TokenKind::CloseCurly => {
                    if closing.is_some() {
                        return Ok(nodes);
                    }
                    return Err(self.err("unexpected '}'"));
                }
                TokenKind::Word(_) => {
                    nodes.push(self.parse_node()?);
                }
                other => {
                    return Err(self.err(format!("expected directive name, found {other:?}")));
                }
            }
        }
    }

    fn parse_node(&mut self) -> Result<Node, ConfigError> {
        let loc = self.lookahead.loc;
        let name = match &self.lookahead.kind {
            TokenKind::Word(w) => w.clone(),
            _ => return Err(self.err("expected directive name")),
        };
        self.advance()?;

        let mut args = Vec::new();
        loop {
            match &self.lookahead.kind {
                TokenKind::Word(w) => {
                    args.push(w.clone());
                    self.advance()?;
                }
                TokenKind::Semicolon => {
                    self.advance()?;
                    return Ok(Node::Directive(Directive { name, args, loc }));
                }
                TokenKind::OpenCurly => {
                    self.advance()?;
                    self.context.push(name.clone());
                    let body = self.parse_nodes_until(Some(&name))?;
                    self.context.pop();
                    if !matches!(self.lookahead.kind, TokenKind::CloseCurly) {
                        return Err(self.err("expected '}'"));
                    }
                    self.advance()?;
                    return Ok(Node::Block(Block {
                        name,
                        args,
                        body,
                        loc,
                    }));
                }
                other => {
                    return Err(self.err(format!(
                        "expected directive argument, ';' or '{{', found {other:?}"
                    )));
                }
            }
        }
    }
}

pub fn parse(source: &str) -> Result<Vec<Node>, ConfigError> {
    Parser::new(source)?.parse()
}
