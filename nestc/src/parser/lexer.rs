use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::CompileError;
use crate::span::{Location, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Procedure, Begin, End, Const, Var, Call,
    If, Then, Else, While, Do, Return, Mod,
    // Operators
    Assign,        // :=
    Equal,         // =
    NotEqual,      // <>
    Less,          // <
    LessEqual,     // <=
    Greater,       // >
    GreaterEqual,  // >=
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    // Punctuation
    LParen,        // (
    RParen,        // )
    Colon,         // :
    Semicolon,     // ;
    Comma,         // ,
    Dot,           // .
    // Identifiers and literals
    Identifier(String),
    /// Source text of an integer literal, already checked to fit in 64 bits.
    Number(String),
    Str(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Procedure => "PROCEDURE",
            Token::Begin => "BEGIN",
            Token::End => "END",
            Token::Const => "CONST",
            Token::Var => "VAR",
            Token::Call => "CALL",
            Token::If => "IF",
            Token::Then => "THEN",
            Token::Else => "ELSE",
            Token::While => "WHILE",
            Token::Do => "DO",
            Token::Return => "RETURN",
            Token::Mod => "MOD",
            Token::Assign => "':='",
            Token::Equal => "'='",
            Token::NotEqual => "'<>'",
            Token::Less => "'<'",
            Token::LessEqual => "'<='",
            Token::Greater => "'>'",
            Token::GreaterEqual => "'>='",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::Slash => "'/'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::Colon => "':'",
            Token::Semicolon => "';'",
            Token::Comma => "','",
            Token::Dot => "'.'",
            Token::Identifier(name) => return write!(f, "identifier '{name}'"),
            Token::Number(text) => return write!(f, "number {text}"),
            Token::Str(text) => return write!(f, "string \"{text}\""),
            Token::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

fn keyword(ident: &str) -> Option<Token> {
    let token = match ident.to_ascii_lowercase().as_str() {
        "procedure" => Token::Procedure,
        "begin" => Token::Begin,
        "end" => Token::End,
        "const" => Token::Const,
        "var" => Token::Var,
        "call" => Token::Call,
        "if" => Token::If,
        "then" => Token::Then,
        "else" => Token::Else,
        "while" => Token::While,
        "do" => Token::Do,
        "return" => Token::Return,
        "mod" => Token::Mod,
        _ => return None,
    };
    Some(token)
}

/// Parses the text of a numeric literal: decimal or `0x` hex, with an
/// optional leading minus.
pub fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    source: &'a str,
    location: Location,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    fn error(&self, line: usize, column: usize, message: String) -> CompileError {
        let mut location = self.location.clone();
        location.line = line;
        location.column = column;
        CompileError::Lexer { location, message }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            text.push(ch);
            self.bump();
        }
        text
    }

    fn next_token(&mut self) -> Result<Option<SpannedToken>, CompileError> {
        // Skip whitespace and comments
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' { break; }
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let (line, column, start) = (self.line, self.column, self.offset());
        let Some(ch) = self.peek() else {
            return Ok(None);
        };

        let token = match ch {
            '0'..='9' => {
                let text = self.take_while(|c| c.is_ascii_alphanumeric());
                if parse_int(&text).is_none() {
                    return Err(self.error(line, column, format!("Invalid number literal: '{}'", text)));
                }
                Token::Number(text)
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let ident = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                keyword(&ident).unwrap_or(Token::Identifier(ident))
            }
            '"' => {
                self.bump(); // opening quote
                let text = self.take_while(|c| c != '"' && c != '\n');
                if self.peek() != Some('"') {
                    return Err(self.error(line, column, "Unclosed string literal".to_string()));
                }
                self.bump();
                Token::Str(text)
            }
            ':' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Assign
                } else {
                    Token::Colon
                }
            }
            '<' => {
                self.bump();
                match self.peek() {
                    Some('=') => { self.bump(); Token::LessEqual }
                    Some('>') => { self.bump(); Token::NotEqual }
                    _ => Token::Less,
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            _ => {
                let token = match ch {
                    '=' => Token::Equal,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ';' => Token::Semicolon,
                    ',' => Token::Comma,
                    '.' => Token::Dot,
                    _ => {
                        return Err(self.error(line, column, format!("Unexpected character: '{}'", ch)));
                    }
                };
                self.bump();
                token
            }
        };

        let end = self.offset();
        Ok(Some(SpannedToken {
            token,
            span: Span { line, column, start, end },
        }))
    }
}

pub fn tokenize(source: &str, filename: &str) -> Result<Vec<SpannedToken>, CompileError> {
    let mut lexer = Lexer {
        chars: source.char_indices().peekable(),
        source,
        location: Location::initialize(filename),
        line: 1,
        column: 1,
    };

    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }

    let eof = Span {
        line: lexer.line,
        column: lexer.column,
        start: source.len(),
        end: source.len(),
    };
    tokens.push(SpannedToken { token: Token::Eof, span: eof });
    Ok(tokens)
}
