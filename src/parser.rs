use crate::error::NestError;
use crate::lexer::{Token, TokenKind, Tokenizer};
use crate::node::{Kind, NodeId};
use crate::runtime::{Outcome, Runtime};

#[derive(PartialOrd, PartialEq, Debug, Clone, Copy)]
pub enum Precedence {
    Lowest = 0,
    Bind,
    Deref,
    Construct,
}

pub fn precedence_of(token: &TokenKind) -> Precedence {
    match token {
        TokenKind::Eq => Precedence::Bind,
        TokenKind::At => Precedence::Deref,
        TokenKind::Colon => Precedence::Construct,
        _ => Precedence::Lowest,
    }
}

/// Statement parser. Every complete statement is evaluated against the
/// runtime's root context before the next one is read.
pub struct Parser<'a, 'rt> {
    iter: std::iter::Peekable<Tokenizer<'a>>,
    runtime: &'rt mut Runtime,
    line: usize,
}

impl<'a, 'rt> Parser<'a, 'rt> {
    pub fn new(tokenizer: Tokenizer<'a>, runtime: &'rt mut Runtime) -> Self {
        let line = tokenizer.line();
        Self {
            iter: tokenizer.peekable(),
            runtime,
            line,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, NestError> {
        let token = self.iter.next().transpose()?;
        if let Some(token) = &token {
            self.line = token.line;
        }
        Ok(token)
    }

    fn peek_kind(&mut self) -> Result<Option<TokenKind>, NestError> {
        if let Some(Err(_)) = self.iter.peek() {
            if let Some(Err(e)) = self.iter.next() {
                return Err(e);
            }
        }
        Ok(self
            .iter
            .peek()
            .and_then(|item| item.as_ref().ok())
            .map(|token| token.kind.clone()))
    }

    fn unexpected(&self, token: Token, expected: &str) -> NestError {
        NestError::Parse {
            line: token.line,
            found: token.kind.describe(),
            expected: expected.to_string(),
        }
    }

    pub fn parse_program(&mut self) -> Result<Vec<Outcome>, NestError> {
        let mut outcomes = Vec::new();

        while let Some(kind) = self.peek_kind()? {
            if kind == TokenKind::Newline {
                self.next_token()?;
                continue;
            }

            let expr = self.parse_statement()?;
            outcomes.push(self.runtime.execute(expr));
        }

        Ok(outcomes)
    }

    /// `expr nl`; end of input also closes the last statement.
    pub fn parse_statement(&mut self) -> Result<NodeId, NestError> {
        let expr = self.parse_expression(Precedence::Lowest)?;
        match self.next_token()? {
            None => Ok(expr),
            Some(Token {
                kind: TokenKind::Newline,
                ..
            }) => Ok(expr),
            Some(token) => Err(self.unexpected(token, "operator or newline")),
        }
    }

    pub fn parse_expression(&mut self, precedence: Precedence) -> Result<NodeId, NestError> {
        let Some(token) = self.next_token()? else {
            return Err(NestError::UnexpectedEof {
                line: self.line,
                expected: "expression".to_string(),
            });
        };
        let mut left = self.parse_prefix(token)?;

        loop {
            let Some(next) = self.peek_kind()? else {
                break;
            };
            let next_precedence = precedence_of(&next);
            if precedence >= next_precedence {
                break;
            }

            let Some(token) = self.next_token()? else {
                break;
            };
            left = self.parse_infix(left, token)?;
        }

        Ok(left)
    }

    fn operator(&mut self, token: &Token) -> NodeId {
        let op = token.kind.operator().unwrap_or('?');
        self.runtime.graph.create(Kind::Op, op.to_string())
    }

    fn parse_prefix(&mut self, token: Token) -> Result<NodeId, NestError> {
        let graph = &mut self.runtime.graph;
        match token.kind {
            TokenKind::Symbol(name) => Ok(graph.create(Kind::Symbol, name)),
            TokenKind::Str(text) => Ok(graph.create(Kind::String, text)),
            TokenKind::Email(addr) => Ok(graph.create(Kind::Email, addr)),
            TokenKind::Url(url) => Ok(graph.create(Kind::Url, url)),
            TokenKind::Tick => {
                let tick = self.operator(&token);
                let quoted = self.parse_expression(Precedence::Lowest)?;
                self.runtime.graph.push_nest(tick, quoted);
                Ok(tick)
            }
            _ => Err(self.unexpected(token, "expression")),
        }
    }

    fn parse_infix(&mut self, left: NodeId, token: Token) -> Result<NodeId, NestError> {
        let right_precedence = match token.kind {
            // right associative
            TokenKind::Eq => Precedence::Lowest,
            ref kind => precedence_of(kind),
        };

        let op = self.operator(&token);
        let right = self.parse_expression(right_precedence)?;
        self.runtime.graph.push_nest(op, left);
        self.runtime.graph.push_nest(op, right);

        if token.kind == TokenKind::Colon && self.peek_kind()? == Some(TokenKind::Colon) {
            if let Some(next) = self.next_token()? {
                return Err(self.unexpected(next, "end of `:` expression (non-associative)"));
            }
        }

        Ok(op)
    }
}
