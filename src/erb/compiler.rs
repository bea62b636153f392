//! Lowers parsed templates into the ops a compiled method runs

use std::path::Path;

use super::ast::{Expr, Node, Spanned, UnaryOp};
use super::grammar::parse_template;
use super::ErbMethod;
use crate::error::ParseError;
use crate::source::LineIndex;

/// Executable form of a template
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    Text(String),
    Output(Spanned<Expr>),
    Eval(Spanned<Expr>),
    Assign {
        var: String,
        value: Spanned<Expr>,
    },
    /// First arm whose condition is truthy runs, else `otherwise`
    Branch {
        arms: Vec<(Spanned<Expr>, Vec<Op>)>,
        otherwise: Vec<Op>,
    },
    Each {
        var: String,
        iter: Spanned<Expr>,
        body: Vec<Op>,
    },
    Capture {
        var: String,
        body: Vec<Op>,
    },
}

/// Compile ERB `source` read from `path` into a method named `name`
pub fn compile(source: &str, path: &Path, name: &str) -> Result<ErbMethod, Vec<ParseError>> {
    let nodes = parse_template(source)?;
    Ok(ErbMethod {
        name: name.to_string(),
        path: path.to_path_buf(),
        lines: LineIndex::new(source),
        ops: lower(nodes),
    })
}

pub(crate) fn lower(nodes: Vec<Spanned<Node>>) -> Vec<Op> {
    let mut ops = Vec::new();
    for node in nodes {
        match node.node {
            Node::Text(text) => push_text(&mut ops, &text),
            Node::Output(expr) => match constant_text(&expr.node) {
                Some(text) => push_text(&mut ops, &text),
                None => ops.push(Op::Output(expr)),
            },
            Node::Eval(expr) => ops.push(Op::Eval(expr)),
            Node::Assign { var, value } => ops.push(Op::Assign {
                var: var.node,
                value,
            }),
            Node::Conditional {
                branches,
                otherwise,
            } => {
                let arms = branches
                    .into_iter()
                    .map(|branch| {
                        let cond = if branch.negated {
                            negate(branch.cond)
                        } else {
                            branch.cond
                        };
                        (cond, lower(branch.body))
                    })
                    .collect();
                ops.push(Op::Branch {
                    arms,
                    otherwise: otherwise.map(lower).unwrap_or_default(),
                });
            }
            Node::For { var, iter, body } => ops.push(Op::Each {
                var: var.node,
                iter,
                body: lower(body),
            }),
            Node::Capture { var, body } => ops.push(Op::Capture {
                var: var.node,
                body: lower(body),
            }),
        }
    }
    ops
}

fn push_text(ops: &mut Vec<Op>, text: &str) {
    if text.is_empty() {
        return;
    }
    match ops.last_mut() {
        Some(Op::Text(prev)) => prev.push_str(text),
        _ => ops.push(Op::Text(text.to_string())),
    }
}

/// Output of literals is known at compile time
fn constant_text(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Nil => Some(String::new()),
        Expr::Bool(b) => Some(b.to_string()),
        Expr::Int(n) => Some(n.to_string()),
        Expr::Str(s) => Some(s.clone()),
        _ => None,
    }
}

fn negate(cond: Spanned<Expr>) -> Spanned<Expr> {
    let span = cond.span.clone();
    Spanned::new(
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(cond),
        },
        span,
    )
}
