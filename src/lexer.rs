use crate::error::NestError;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenKind {
    Newline,
    Symbol(String),
    Str(String),
    Email(String),
    Url(String),

    // Operators
    Eq,
    At,
    Colon,
    Tick,
}

impl TokenKind {
    /// Operator character for operator tokens.
    pub fn operator(&self) -> Option<char> {
        match self {
            TokenKind::Eq => Some('='),
            TokenKind::At => Some('@'),
            TokenKind::Colon => Some(':'),
            TokenKind::Tick => Some('`'),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Symbol(s) => format!("symbol `{}`", s),
            TokenKind::Str(s) => format!("string '{}'", s),
            TokenKind::Email(s) => format!("email `{}`", s),
            TokenKind::Url(s) => format!("url `{}`", s),
            op => format!("operator `{}`", op.operator().unwrap_or('?')),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

fn is_blank(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r')
}

fn is_symbol_char(ch: char) -> bool {
    !matches!(ch, ' ' | '\t' | '\r' | '\n' | '#' | '=' | ':' | '\'')
}

fn lower_run(s: &str) -> usize {
    s.bytes().take_while(|b| b.is_ascii_lowercase()).count()
}

/// Length of an email-shaped prefix `local@label.label[.label...]`, all labels
/// lowercase ASCII letters.
fn match_email(s: &str) -> Option<usize> {
    let local = lower_run(s);
    if local == 0 || !s[local..].starts_with('@') {
        return None;
    }

    let mut end = local + 1;
    let first = lower_run(&s[end..]);
    if first == 0 {
        return None;
    }
    end += first;

    let mut labels = 1;
    loop {
        let rest = &s[end..];
        if !rest.starts_with('.') {
            break;
        }
        let label = lower_run(&rest[1..]);
        if label == 0 {
            break;
        }
        end += 1 + label;
        labels += 1;
    }

    (labels >= 2).then_some(end)
}

/// Length of a `http://` or `https://` url running to the next whitespace.
fn match_url(s: &str) -> Option<usize> {
    let scheme = if s.starts_with("https://") {
        "https://".len()
    } else if s.starts_with("http://") {
        "http://".len()
    } else {
        return None;
    };

    let body = s[scheme..]
        .find(|ch: char| is_blank(ch) || ch == '\n')
        .unwrap_or(s.len() - scheme);
    (body > 0).then_some(scheme + body)
}

/// Lazy tokenizer over a source text. Scanning stops after the first error.
#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            failed: false,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn token(&self, kind: TokenKind, line: usize) -> Token {
        Token { kind, line }
    }

    /// Inside-string state: everything up to the closing quote, verbatim.
    fn read_string(&mut self) -> Result<Token, NestError> {
        let start_line = self.line;
        let body = self.rest();
        match body.find('\'') {
            Some(close) => {
                let text = &body[..close];
                self.line += text.matches('\n').count();
                self.pos += close + 1;
                Ok(self.token(TokenKind::Str(text.to_string()), start_line))
            }
            None => {
                self.line += body.matches('\n').count();
                self.pos = self.input.len();
                Err(NestError::Lex {
                    line: start_line,
                    reason: "unterminated string".to_string(),
                })
            }
        }
    }

    fn read_word(&mut self) -> Token {
        let rest = self.rest();
        let line = self.line;

        if let Some(len) = match_email(rest) {
            self.pos += len;
            return self.token(TokenKind::Email(rest[..len].to_string()), line);
        }
        if let Some(len) = match_url(rest) {
            self.pos += len;
            return self.token(TokenKind::Url(rest[..len].to_string()), line);
        }

        let len = rest
            .find(|ch: char| !is_symbol_char(ch))
            .unwrap_or(rest.len());
        self.pos += len;
        self.token(TokenKind::Symbol(rest[..len].to_string()), line)
    }

    fn scan(&mut self) -> Option<Result<Token, NestError>> {
        loop {
            let ch = self.rest().chars().next()?;
            match ch {
                c if is_blank(c) => self.pos += c.len_utf8(),
                '#' => {
                    let len = self.rest().find('\n').unwrap_or(self.rest().len());
                    self.pos += len;
                }
                '\n' => {
                    let line = self.line;
                    self.pos += 1;
                    self.line += 1;
                    return Some(Ok(self.token(TokenKind::Newline, line)));
                }
                '\'' => {
                    self.pos += 1;
                    return Some(self.read_string());
                }
                '=' | '@' | ':' | '`' => {
                    self.pos += 1;
                    let kind = match ch {
                        '=' => TokenKind::Eq,
                        '@' => TokenKind::At,
                        ':' => TokenKind::Colon,
                        _ => TokenKind::Tick,
                    };
                    return Some(Ok(self.token(kind, self.line)));
                }
                _ => return Some(Ok(self.read_word())),
            }
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, NestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.scan();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
