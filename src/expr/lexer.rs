use super::CodeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub offset: usize,
}

fn parse_err(offset: usize, message: impl Into<String>) -> CodeError {
    CodeError::Parse {
        offset,
        message: message.into(),
    }
}

/// Split source text into tokens, recording each token's byte offset for
/// error reporting.
pub fn tokenize(src: &str) -> Result<Vec<SpannedToken>, CodeError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let c = bytes[i];
        let token = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => {
                i += 1;
                Token::LParen
            }
            b')' => {
                i += 1;
                Token::RParen
            }
            b'[' => {
                i += 1;
                Token::LBracket
            }
            b']' => {
                i += 1;
                Token::RBracket
            }
            b'{' => {
                i += 1;
                Token::LBrace
            }
            b'}' => {
                i += 1;
                Token::RBrace
            }
            b',' => {
                i += 1;
                Token::Comma
            }
            b':' => {
                i += 1;
                Token::Colon
            }
            b'.' => {
                i += 1;
                Token::Dot
            }
            b'?' => {
                i += 1;
                Token::Question
            }
            b'+' => {
                i += 1;
                Token::Plus
            }
            b'-' => {
                i += 1;
                Token::Minus
            }
            b'*' => {
                i += 1;
                Token::Star
            }
            b'/' => {
                i += 1;
                Token::Slash
            }
            b'%' => {
                i += 1;
                Token::Percent
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::EqEq
                } else {
                    return Err(parse_err(start, "assignment is not supported; use '=='"));
                }
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::NotEq
                } else {
                    i += 1;
                    Token::Bang
                }
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::Le
                } else {
                    i += 1;
                    Token::Lt
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::Ge
                } else {
                    i += 1;
                    Token::Gt
                }
            }
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    i += 2;
                    Token::AndAnd
                } else {
                    return Err(parse_err(start, "expected '&&'"));
                }
            }
            b'|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    i += 2;
                    Token::OrOr
                } else {
                    return Err(parse_err(start, "expected '||'"));
                }
            }
            b'\'' | b'"' => {
                let quote = c;
                i += 1;
                let mut text = String::new();
                loop {
                    match bytes.get(i) {
                        None => return Err(parse_err(start, "unterminated string literal")),
                        Some(&b'\\') => {
                            let escaped = bytes
                                .get(i + 1)
                                .ok_or_else(|| parse_err(i, "dangling escape"))?;
                            text.push(match escaped {
                                b'n' => '\n',
                                b't' => '\t',
                                b'r' => '\r',
                                b'\\' => '\\',
                                b'\'' => '\'',
                                b'"' => '"',
                                other => {
                                    return Err(parse_err(
                                        i,
                                        format!("unknown escape '\\{}'", *other as char),
                                    ))
                                }
                            });
                            i += 2;
                        }
                        Some(&b) if b == quote => {
                            i += 1;
                            break;
                        }
                        Some(_) => {
                            // Multi-byte chars are copied verbatim.
                            let ch_start = i;
                            while i + 1 < bytes.len() && bytes[i + 1] & 0xC0 == 0x80 {
                                i += 1;
                            }
                            i += 1;
                            text.push_str(&src[ch_start..i]);
                        }
                    }
                }
                Token::Str(text)
            }
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'.' {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &src[start..i];
                let value: f64 = text
                    .parse()
                    .map_err(|_| parse_err(start, format!("bad number literal '{text}'")))?;
                Token::Number(value)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                match &src[start..i] {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    ident => Token::Ident(ident.to_string()),
                }
            }
            other => {
                return Err(parse_err(
                    start,
                    format!("unexpected character '{}'", other as char),
                ))
            }
        };
        tokens.push(SpannedToken {
            token,
            offset: start,
        });
    }

    Ok(tokens)
}
