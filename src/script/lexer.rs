//! Tokenizer for node scripts

use super::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    pub line: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ScriptError> {
        while let Some((start, c)) = self.chars.next() {
            let kind = match c {
                '\n' => {
                    self.line += 1;
                    continue;
                }
                c if c.is_whitespace() => continue,
                '#' => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                    continue;
                }
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                ';' => TokenKind::Semicolon,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '=' => self.with_eq(TokenKind::EqEq, TokenKind::Assign),
                '<' => self.with_eq(TokenKind::LtEq, TokenKind::Lt),
                '>' => self.with_eq(TokenKind::GtEq, TokenKind::Gt),
                '!' => {
                    if self.eat('=') {
                        TokenKind::NotEq
                    } else {
                        return Err(ScriptError::new(self.line, "unexpected '!'"));
                    }
                }
                '"' => self.string()?,
                c if c.is_ascii_digit() => self.number(start)?,
                c if c.is_alphabetic() || c == '_' => self.ident(start),
                other => {
                    return Err(ScriptError::new(
                        self.line,
                        format!("unexpected character '{}'", other),
                    ))
                }
            };
            let end = self.offset();
            self.tokens.push(Token {
                kind,
                start,
                end,
                line: self.line,
            });
        }

        let end = self.source.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            start: end,
            end,
            line: self.line,
        });
        Ok(self.tokens)
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some(&(_, c)) if c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn with_eq(&mut self, long: TokenKind, short: TokenKind) -> TokenKind {
        if self.eat('=') {
            long
        } else {
            short
        }
    }

    fn string(&mut self) -> Result<TokenKind, ScriptError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(TokenKind::Str(value)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c)) => value.push(c),
                    None => break,
                },
                Some((_, '\n')) | None => break,
                Some((_, c)) => value.push(c),
            }
        }
        Err(ScriptError::new(self.line, "unterminated string literal"))
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, ScriptError> {
        let mut is_float = false;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.chars.next();
            } else if c == '.' && !is_float {
                // Only treat '.' as a decimal point when a digit follows
                let next = self.source[i + 1..].chars().next();
                if !matches!(next, Some(d) if d.is_ascii_digit()) {
                    break;
                }
                is_float = true;
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.offset();
        let text: String = self.source[start..end].chars().filter(|c| *c != '_').collect();
        if is_float {
            text.parse()
                .map(TokenKind::Float)
                .map_err(|e| ScriptError::new(self.line, format!("invalid float '{}': {}", text, e)))
        } else {
            text.parse()
                .map(TokenKind::Int)
                .map_err(|e| ScriptError::new(self.line, format!("invalid integer '{}': {}", text, e)))
        }
    }

    fn ident(&mut self, start: usize) -> TokenKind {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.offset();
        TokenKind::Ident(self.source[start..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokens_and_spans() {
        let tokens = tokenize("node  A {}").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("node".into()));
        assert_eq!((tokens[0].start, tokens[0].end), (0, 4));
        assert_eq!((tokens[1].start, tokens[1].end), (6, 7));
        assert_eq!(tokens[3].end, 10);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_numbers_and_operators() {
        assert_eq!(
            kinds("1_000 2.5 x[0] <= != ==  # trailing"),
            vec![
                TokenKind::Int(1000),
                TokenKind::Float(2.5),
                TokenKind::Ident("x".into()),
                TokenKind::LBracket,
                TokenKind::Int(0),
                TokenKind::RBracket,
                TokenKind::LtEq,
                TokenKind::NotEq,
                TokenKind::EqEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_tracking_and_errors() {
        let tokens = tokenize("a\n\nb").unwrap();
        assert_eq!(tokens[1].line, 3);

        let err = tokenize("\"open").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(tokenize("a $ b").is_err());
    }
}
