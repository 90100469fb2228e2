//! Recursive-descent parser for node scripts
//!
//! ```text
//! module  := class*
//! class   := "node" IDENT "{" member* "}"
//! member  := "input" IDENT (":" IDENT)? ("=" expr)?
//!          | "output" IDENT (":" IDENT)?
//!          | "compute" "{" stmt* "}"
//! stmt    := "let" IDENT "=" expr | "return" expr?      (optional ";")
//! ```

use std::collections::HashSet;

use super::ast::{BinOp, ClassDef, Expr, InputDecl, OutputDecl, Stmt, UnaryOp};
use super::interp;
use super::lexer::{tokenize, Token, TokenKind};
use super::ScriptError;
use crate::nodes::data::{DataType, NodeData};

/// Deepest expression nesting accepted, counting brackets, unary operators
/// and operator chains
pub const MAX_NESTING: usize = 256;

const KEYWORDS: &[&str] = &[
    "node", "input", "output", "compute", "let", "return", "and", "or", "not", "true", "false",
    "none",
];

/// Parse a whole module into its class definitions, in source order
pub fn parse_module(source: &str) -> Result<Vec<ClassDef>, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut classes: Vec<ClassDef> = Vec::new();
    while !parser.at(&TokenKind::Eof) {
        let class = parser.class()?;
        if classes.iter().any(|c| c.name == class.name) {
            let line = parser.previous_line();
            return Err(ScriptError::new(
                line,
                format!("class '{}' defined twice", class.name),
            ));
        }
        classes.push(class);
    }
    Ok(classes)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn previous_line(&self) -> usize {
        self.tokens[self.pos.saturating_sub(1)].line
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == keyword)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::new(self.peek().line, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ScriptError> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {}, found {:?}", what, self.peek().kind)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token, ScriptError> {
        if self.at_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected '{}', found {:?}", keyword, self.peek().kind)))
        }
    }

    /// One level deeper into an expression
    fn enter(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(format!(
                "expression nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    fn ident(&mut self) -> Result<String, ScriptError> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, found {:?}", other))),
        }
    }

    fn class(&mut self) -> Result<ClassDef, ScriptError> {
        let start = self.expect_keyword("node")?.start;
        let name = self.ident()?;
        self.expect(TokenKind::LBrace, "'{'")?;

        let mut inputs: Vec<InputDecl> = Vec::new();
        let mut outputs: Vec<OutputDecl> = Vec::new();
        let mut body = None;
        let mut input_names = HashSet::new();
        let mut output_names = HashSet::new();

        loop {
            if self.at(&TokenKind::RBrace) {
                break;
            }
            if self.at_keyword("input") {
                self.advance();
                let line = self.peek().line;
                let port = self.ident()?;
                let data_type = self.type_annotation()?;
                let default = if self.eat(&TokenKind::Assign) {
                    let expr = self.expr()?;
                    interp::eval_const(&expr).map_err(|e| ScriptError::new(line, e))?
                } else {
                    NodeData::None
                };
                if !input_names.insert(port.clone()) {
                    return Err(ScriptError::new(line, format!("duplicate input '{}'", port)));
                }
                inputs.push(InputDecl {
                    name: port,
                    data_type,
                    default,
                });
            } else if self.at_keyword("output") {
                self.advance();
                let line = self.peek().line;
                let port = self.ident()?;
                let data_type = self.type_annotation()?;
                if !output_names.insert(port.clone()) {
                    return Err(ScriptError::new(line, format!("duplicate output '{}'", port)));
                }
                outputs.push(OutputDecl {
                    name: port,
                    data_type,
                });
            } else if self.at_keyword("compute") {
                if body.is_some() {
                    return Err(self.error(format!("class '{}' has two compute blocks", name)));
                }
                self.advance();
                body = Some(self.block()?);
            } else {
                return Err(self.error(format!(
                    "expected 'input', 'output' or 'compute', found {:?}",
                    self.peek().kind
                )));
            }
            self.eat(&TokenKind::Semicolon);
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?.end;

        Ok(ClassDef {
            name,
            inputs,
            outputs,
            body,
            span: start..end,
        })
    }

    fn type_annotation(&mut self) -> Result<DataType, ScriptError> {
        if self.eat(&TokenKind::Colon) {
            Ok(DataType::from_name(&self.ident()?))
        } else {
            Ok(DataType::Any)
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(self.error("unterminated block"));
            }
            stmts.push(self.stmt()?);
            self.eat(&TokenKind::Semicolon);
        }
        self.advance();
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt, ScriptError> {
        if self.at_keyword("let") {
            self.advance();
            let name = self.ident()?;
            self.expect(TokenKind::Assign, "'='")?;
            Ok(Stmt::Let(name, self.expr()?))
        } else if self.at_keyword("return") {
            self.advance();
            if self.at(&TokenKind::RBrace) || self.at(&TokenKind::Semicolon) {
                Ok(Stmt::Return(None))
            } else {
                Ok(Stmt::Return(Some(self.expr()?)))
            }
        } else {
            Err(self.error(format!(
                "expected 'let' or 'return', found {:?}",
                self.peek().kind
            )))
        }
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.enter()?;
        let expr = self.or()?;
        self.depth -= 1;
        Ok(expr)
    }

    // Operator chains build left-nested trees; every link counts as one
    // level so the tree depth stays under MAX_NESTING.

    fn or(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut lhs = self.and()?;
        while self.at_keyword("or") {
            self.advance();
            self.enter()?;
            let rhs = self.and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut lhs = self.comparison()?;
        while self.at_keyword("and") {
            self.advance();
            self.enter()?;
            let rhs = self.comparison()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let lhs = self.additive()?;
        let op = match self.peek().kind {
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::NotEq,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::LtEq => BinOp::LtEq,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::GtEq => BinOp::GtEq,
            _ => return Ok(lhs),
        };
        self.advance();
        self.enter()?;
        let rhs = self.additive()?;
        self.depth -= 1;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.advance();
            self.enter()?;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.advance();
            self.enter()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = if self.eat(&TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.at_keyword("not") {
            self.advance();
            UnaryOp::Not
        } else {
            return self.postfix();
        };
        self.enter()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut expr = self.primary()?;
        while self.eat(&TokenKind::LBracket) {
            self.enter()?;
            let index = self.expr()?;
            self.expect(TokenKind::RBracket, "']'")?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        self.depth = base;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Int(i) => Ok(Expr::Literal(NodeData::Int(i))),
            TokenKind::Float(f) => Ok(Expr::Literal(NodeData::Float(f))),
            TokenKind::Str(s) => Ok(Expr::Literal(NodeData::String(s))),
            TokenKind::Ident(name) => {
                match name.as_str() {
                    "true" => return Ok(Expr::Literal(NodeData::Boolean(true))),
                    "false" => return Ok(Expr::Literal(NodeData::Boolean(false))),
                    "none" => return Ok(Expr::Literal(NodeData::None)),
                    keyword if KEYWORDS.contains(&keyword) => {
                        return Err(ScriptError::new(
                            token.line,
                            format!("unexpected keyword '{}'", keyword),
                        ))
                    }
                    _ => {}
                }
                if self.eat(&TokenKind::LParen) {
                    if !interp::is_builtin(&name) {
                        return Err(ScriptError::new(
                            token.line,
                            format!("unknown function '{}'", name),
                        ));
                    }
                    let args = self.items(TokenKind::RParen)?.0;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            TokenKind::LParen => {
                let (mut items, trailing_comma) = self.items(TokenKind::RParen)?;
                // "(x)" is grouping, "(x,)" and "()" are tuples
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Expr::Tuple(items))
                }
            }
            TokenKind::LBracket => Ok(Expr::Tuple(self.items(TokenKind::RBracket)?.0)),
            other => Err(ScriptError::new(
                token.line,
                format!("unexpected token {:?}", other),
            )),
        }
    }

    /// Comma-separated expressions up to `close`; reports a trailing comma
    fn items(&mut self, close: TokenKind) -> Result<(Vec<Expr>, bool), ScriptError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        while !self.at(&close) {
            items.push(self.expr()?);
            trailing_comma = self.eat(&TokenKind::Comma);
            if !trailing_comma {
                break;
            }
        }
        self.expect(close, "closing bracket")?;
        Ok((items, trailing_comma))
    }
}
