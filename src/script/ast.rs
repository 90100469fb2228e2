//! Syntax tree of node scripts

use std::ops::Range;

use crate::nodes::data::{DataType, NodeData};

/// One `node Name { ... }` block
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub inputs: Vec<InputDecl>,
    pub outputs: Vec<OutputDecl>,
    /// `None` when the class declares no `compute` block
    pub body: Option<Vec<Stmt>>,
    /// Byte range of the block in the text it was parsed from
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputDecl {
    pub name: String,
    pub data_type: DataType,
    /// Constant-folded default value
    pub default: NodeData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let(String, Expr),
    Return(Option<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(NodeData),
    Name(String),
    Tuple(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}
