use super::lexer::{SpannedToken, Token};
use super::CodeError;

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Member {
        target: Box<Expr>,
        field: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
}

pub fn parse(tokens: &[SpannedToken], source_len: usize) -> Result<Expr, CodeError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len,
    };
    let expr = parser.ternary()?;
    if let Some(tok) = parser.peek() {
        return Err(parser.err_at(tok.offset, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
    source_len: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a SpannedToken> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().map(|t| &t.token) == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), CodeError> {
        if self.eat(expected) {
            Ok(())
        } else {
            let offset = self.current_offset();
            Err(self.err_at(offset, format!("expected {what}")))
        }
    }

    fn current_offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.source_len)
    }

    fn err_at(&self, offset: usize, message: impl Into<String>) -> CodeError {
        CodeError::Parse {
            offset,
            message: message.into(),
        }
    }

    fn ternary(&mut self) -> Result<Expr, CodeError> {
        let cond = self.or()?;
        if self.eat(&Token::Question) {
            let then = self.ternary()?;
            self.expect(&Token::Colon, "':' in conditional")?;
            let otherwise = self.ternary()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn or(&mut self) -> Result<Expr, CodeError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, CodeError> {
        let mut lhs = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, CodeError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, CodeError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, CodeError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, CodeError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, CodeError> {
        if self.eat(&Token::Bang) {
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        if self.eat(&Token::Minus) {
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, CodeError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let offset = self.current_offset();
                match self.next().map(|t| &t.token) {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Member {
                            target: Box::new(expr),
                            field: name.clone(),
                        };
                    }
                    _ => return Err(self.err_at(offset, "expected field name after '.'")),
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.ternary()?;
                self.expect(&Token::RBracket, "']'")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.peek().map(|t| &t.token) == Some(&Token::LParen) {
                // Only bare names are callable; the callee set is the fixed
                // builtin table, resolved at evaluation time.
                let Expr::Ident(name) = expr else {
                    let offset = self.current_offset();
                    return Err(self.err_at(offset, "only named functions are callable"));
                };
                self.pos += 1;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.ternary()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RParen, "')' after arguments")?;
                        break;
                    }
                }
                expr = Expr::Call { name, args };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, CodeError> {
        let offset = self.current_offset();
        let Some(tok) = self.next() else {
            return Err(self.err_at(offset, "unexpected end of input"));
        };
        match &tok.token {
            Token::Number(n) => Ok(Expr::Number(*n)),
            Token::Str(s) => Ok(Expr::Str(s.clone())),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Null => Ok(Expr::Null),
            Token::Ident(name) => Ok(Expr::Ident(name.clone())),
            Token::LParen => {
                let inner = self.ternary()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.ternary()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RBracket, "']' after array items")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::LBrace => {
                let mut fields = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key_offset = self.current_offset();
                        let key = match self.next().map(|t| &t.token) {
                            Some(Token::Ident(name)) => name.clone(),
                            Some(Token::Str(text)) => text.clone(),
                            _ => {
                                return Err(
                                    self.err_at(key_offset, "expected object key")
                                )
                            }
                        };
                        self.expect(&Token::Colon, "':' after object key")?;
                        fields.push((key, self.ternary()?));
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RBrace, "'}' after object fields")?;
                        break;
                    }
                }
                Ok(Expr::Object(fields))
            }
            _ => Err(self.err_at(offset, "unexpected token")),
        }
    }
}
