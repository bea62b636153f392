//! Syntax tree for ERB templates

pub use crate::source::Span;

/// A node with its byte span in the template file
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    NotEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Spanned<Expr>>),
    /// `@name`
    Ivar(String),
    /// Bare name: local, helper or host method
    Ident(String),
    /// `name(args)`
    Call {
        name: String,
        args: Vec<Spanned<Expr>>,
    },
    /// `receiver.method(args)`
    MethodCall {
        receiver: Box<Spanned<Expr>>,
        method: String,
        args: Vec<Spanned<Expr>>,
    },
    Index {
        target: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
}

/// Content of a single `<% %>` tag
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    If(Spanned<Expr>),
    Unless(Spanned<Expr>),
    Elsif(Spanned<Expr>),
    Else,
    End,
    /// `for x in e` and `e.each do |x|`
    For {
        var: Spanned<String>,
        iter: Spanned<Expr>,
    },
    /// `x = capture do`
    Capture { var: Spanned<String> },
    Assign {
        var: Spanned<String>,
        value: Spanned<Expr>,
    },
    Eval(Spanned<Expr>),
}

/// One arm of a conditional
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub cond: Spanned<Expr>,
    /// `unless` arms run when the condition is falsy
    pub negated: bool,
    pub body: Vec<Spanned<Node>>,
}

/// Template structure after block nesting has been resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output(Spanned<Expr>),
    Eval(Spanned<Expr>),
    Assign {
        var: Spanned<String>,
        value: Spanned<Expr>,
    },
    Conditional {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Spanned<Node>>>,
    },
    For {
        var: Spanned<String>,
        iter: Spanned<Expr>,
        body: Vec<Spanned<Node>>,
    },
    Capture {
        var: Spanned<String>,
        body: Vec<Spanned<Node>>,
    },
}
