//! Parser for ERB templates using chumsky
//!
//! Tag code is parsed one tag at a time; block structure (`if` ... `end`) is
//! assembled across tags afterwards.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use super::ast::*;
use super::lexer::{self, Token};
use super::scanner::{self, Segment, TagKind};
use crate::error::ParseError;

/// Parse a whole template into nodes with spans into `source`
pub fn parse_template(source: &str) -> Result<Vec<Spanned<Node>>, Vec<ParseError>> {
    let segments = scanner::scan(source).map_err(|e| vec![e])?;

    let mut errors = Vec::new();
    let mut stack = vec![Block::new(BlockKind::Root, 0..0)];

    for segment in segments {
        match segment {
            Segment::Text { text, span } => {
                push_node(&mut stack, Spanned::new(Node::Text(text), span));
            }
            Segment::Tag {
                kind: TagKind::Comment,
                ..
            } => {}
            Segment::Tag { kind, code, span } => {
                let code_text = &source[code.clone()];
                if code_text.trim().is_empty() {
                    if kind == TagKind::Output {
                        errors.push(ParseError::syntax(span, "empty output tag"));
                    }
                    continue;
                }
                let output = kind == TagKind::Output;
                match parse_tag(code_text, code.start, output) {
                    Ok(Directive::Eval(expr)) if output => {
                        push_node(&mut stack, Spanned::new(Node::Output(expr), span));
                    }
                    Ok(directive) => {
                        if let Err(e) = apply_directive(&mut stack, directive, span) {
                            errors.push(e);
                        }
                    }
                    Err(errs) => errors.extend(errs),
                }
            }
        }
    }

    while stack.len() > 1 {
        if let Some(block) = stack.pop() {
            errors.push(ParseError::syntax(
                block.span,
                format!("unclosed `{}` block, expected `<% end %>`", block.kind.keyword()),
            ));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(stack.pop().map(|root| root.body).unwrap_or_default())
}

/// Parse the code of one tag
///
/// `offset` is the position of `code` in the template so that every span in
/// the result points into the template file.
pub fn parse_tag(code: &str, offset: usize, output: bool) -> Result<Directive, Vec<ParseError>> {
    let eoi = offset + code.len();

    let tokens: Vec<(Token, SimpleSpan)> = lexer::lex(code)
        .map(|(tok, span)| (tok, SimpleSpan::from(span.start + offset..span.end + offset)))
        .collect();
    check_nesting(&tokens, offset..eoi).map_err(|e| vec![e])?;

    let token_stream = Stream::from_iter(tokens)
        .map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    let parser = if output {
        expr_parser().then_ignore(end()).map(Directive::Eval).boxed()
    } else {
        directive_parser().boxed()
    };

    parser
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Longest token sequence allowed in one tag
pub const MAX_TAG_TOKENS: usize = 512;
/// Deepest bracket nesting allowed in one tag
pub const MAX_NESTING: usize = 16;

/// Bound the depth of the tree a tag can produce
///
/// Parsing and evaluation recurse once per nesting level.
fn check_nesting(tokens: &[(Token, SimpleSpan)], code: Span) -> Result<(), ParseError> {
    if tokens.len() > MAX_TAG_TOKENS {
        return Err(ParseError::syntax(
            code,
            format!("tag too long, more than {} tokens", MAX_TAG_TOKENS),
        ));
    }
    let mut depth = 0usize;
    for (tok, span) in tokens {
        match tok {
            Token::ParenOpen | Token::BracketOpen => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(ParseError::syntax(
                        span.into_range(),
                        format!("expression nested deeper than {} levels", MAX_NESTING),
                    ));
                }
            }
            Token::ParenClose | Token::BracketClose => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn binary(lhs: Spanned<Expr>, (op, rhs): (BinaryOp, Spanned<Expr>)) -> Spanned<Expr> {
    let span = lhs.span.start..rhs.span.end;
    Spanned::new(
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

#[derive(Debug, Clone)]
enum Postfix {
    Method(String, Vec<Spanned<Expr>>),
    Index(Spanned<Expr>),
}

fn expr_parser<'a, I>() -> impl Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let literal = select! {
            Token::Nil => Expr::Nil,
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Int(n) => Expr::Int(n),
            Token::Float(n) => Expr::Float(n),
            Token::String(s) => Expr::Str(s),
            Token::Ivar(s) => Expr::Ivar(s),
        }
        .map_with(|node, e| Spanned::new(node, span_range(&e.span())));

        let identifier = select! {
            Token::Ident(s) => s,
        };

        // `name` or `name(args)`
        let call = identifier
            .clone()
            .then(args.clone().or_not())
            .map_with(|(name, args), e| {
                let node = match args {
                    Some(args) => Expr::Call { name, args },
                    None => Expr::Ident(name),
                };
                Spanned::new(node, span_range(&e.span()))
            });

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map_with(|items, e| Spanned::new(Expr::List(items), span_range(&e.span())));

        let parens = expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let atom = choice((literal, call, list, parens));

        let postfix = choice((
            just(Token::Dot)
                .ignore_then(identifier)
                .then(args.or_not())
                .map(|(name, args)| Postfix::Method(name, args.unwrap_or_default())),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Postfix::Index),
        ))
        .map_with(|op, e| (op, span_range(&e.span())));

        let postfixed = atom.foldl(postfix.repeated(), |lhs, (op, span)| {
            let full = lhs.span.start..span.end;
            let node = match op {
                Postfix::Method(method, args) => Expr::MethodCall {
                    receiver: Box::new(lhs),
                    method,
                    args,
                },
                Postfix::Index(index) => Expr::Index {
                    target: Box::new(lhs),
                    index: Box::new(index),
                },
            };
            Spanned::new(node, full)
        });

        let unary_op = choice((
            just(Token::Bang).to(UnaryOp::Not),
            just(Token::Minus).to(UnaryOp::Neg),
        ))
        .map_with(|op, e| (op, span_range(&e.span())));

        let unary = unary_op
            .repeated()
            .foldr(postfixed, |(op, span), operand| {
                let full = span.start..operand.span.end;
                Spanned::new(
                    Expr::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    full,
                )
            })
            .boxed();

        let product = unary.clone().foldl(
            choice((
                just(Token::Star).to(BinaryOp::Mul),
                just(Token::Slash).to(BinaryOp::Div),
                just(Token::Percent).to(BinaryOp::Rem),
            ))
            .then(unary)
            .repeated(),
            binary,
        );

        let sum = product
            .clone()
            .foldl(
                choice((
                    just(Token::Plus).to(BinaryOp::Add),
                    just(Token::Minus).to(BinaryOp::Sub),
                ))
                .then(product)
                .repeated(),
                binary,
            )
            .boxed();

        let comparison = sum.clone().foldl(
            choice((
                just(Token::LessEq).to(BinaryOp::LessEq),
                just(Token::GreaterEq).to(BinaryOp::GreaterEq),
                just(Token::Less).to(BinaryOp::Less),
                just(Token::Greater).to(BinaryOp::Greater),
            ))
            .then(sum)
            .repeated(),
            binary,
        );

        let equality = comparison
            .clone()
            .foldl(
                choice((
                    just(Token::EqEq).to(BinaryOp::Eq),
                    just(Token::NotEq).to(BinaryOp::NotEq),
                ))
                .then(comparison)
                .repeated(),
                binary,
            )
            .boxed();

        let conjunction = equality.clone().foldl(
            just(Token::AndAnd)
                .to(BinaryOp::And)
                .then(equality)
                .repeated(),
            binary,
        );

        conjunction
            .clone()
            .foldl(
                just(Token::OrOr)
                    .to(BinaryOp::Or)
                    .then(conjunction)
                    .repeated(),
                binary,
            )
            .boxed()
    })
}

fn directive_parser<'a, I>() -> impl Parser<'a, I, Directive, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let expr = expr_parser();

    let name = select! {
        Token::Ident(s) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    let if_tag = just(Token::If).ignore_then(expr.clone()).map(Directive::If);
    let unless_tag = just(Token::Unless)
        .ignore_then(expr.clone())
        .map(Directive::Unless);
    let elsif_tag = just(Token::Elsif)
        .ignore_then(expr.clone())
        .map(Directive::Elsif);
    let else_tag = just(Token::Else).to(Directive::Else);
    let end_tag = just(Token::End).to(Directive::End);

    // for item in items
    let for_tag = just(Token::For)
        .ignore_then(name.clone())
        .then_ignore(just(Token::In))
        .then(expr.clone())
        .map(|(var, iter)| Directive::For { var, iter });

    // body = capture do
    let capture_tag = name
        .clone()
        .then_ignore(just(Token::Assign))
        .then_ignore(just(Token::Ident("capture".to_string())))
        .then_ignore(just(Token::Do))
        .map(|var| Directive::Capture { var });

    let assign_tag = name
        .clone()
        .then_ignore(just(Token::Assign))
        .then(expr.clone())
        .map(|(var, value)| Directive::Assign { var, value });

    // items.each do |item|
    let each_tag = expr
        .clone()
        .then_ignore(just(Token::Do))
        .then(name.delimited_by(just(Token::Pipe), just(Token::Pipe)))
        .try_map(|(target, var), span| match target.node {
            Expr::MethodCall {
                receiver,
                method,
                args,
            } if method == "each" && args.is_empty() => Ok(Directive::For {
                var,
                iter: *receiver,
            }),
            _ => Err(Rich::custom(span, "only `each` blocks are supported")),
        });

    let eval_tag = expr.map(Directive::Eval);

    choice((
        if_tag,
        unless_tag,
        elsif_tag,
        else_tag,
        end_tag,
        for_tag,
        capture_tag,
        assign_tag,
        each_tag,
        eval_tag,
    ))
    .then_ignore(end())
}

#[derive(Debug)]
enum BlockKind {
    Root,
    Conditional {
        branches: Vec<Branch>,
        /// Condition of the arm being collected; `None` once inside `else`
        current: Option<(Spanned<Expr>, bool)>,
        keyword: &'static str,
    },
    For {
        var: Spanned<String>,
        iter: Spanned<Expr>,
    },
    Capture {
        var: Spanned<String>,
    },
}

impl BlockKind {
    fn keyword(&self) -> &'static str {
        match self {
            BlockKind::Root => "template",
            BlockKind::Conditional { keyword, .. } => keyword,
            BlockKind::For { .. } => "for",
            BlockKind::Capture { .. } => "capture",
        }
    }
}

/// A block being assembled, with the span of the tag that opened it
#[derive(Debug)]
struct Block {
    kind: BlockKind,
    span: Span,
    body: Vec<Spanned<Node>>,
}

impl Block {
    fn new(kind: BlockKind, span: Span) -> Self {
        Self {
            kind,
            span,
            body: Vec::new(),
        }
    }
}

fn push_node(stack: &mut [Block], node: Spanned<Node>) {
    if let Some(top) = stack.last_mut() {
        top.body.push(node);
    }
}

fn open_conditional(stack: &mut Vec<Block>, cond: Spanned<Expr>, negated: bool, span: Span) {
    let keyword = if negated { "unless" } else { "if" };
    stack.push(Block::new(
        BlockKind::Conditional {
            branches: Vec::new(),
            current: Some((cond, negated)),
            keyword,
        },
        span,
    ));
}

fn apply_directive(
    stack: &mut Vec<Block>,
    directive: Directive,
    span: Span,
) -> Result<(), ParseError> {
    match directive {
        Directive::If(cond) => open_conditional(stack, cond, false, span),
        Directive::Unless(cond) => open_conditional(stack, cond, true, span),
        Directive::For { var, iter } => {
            stack.push(Block::new(BlockKind::For { var, iter }, span));
        }
        Directive::Capture { var } => {
            stack.push(Block::new(BlockKind::Capture { var }, span));
        }
        Directive::Assign { var, value } => {
            push_node(stack, Spanned::new(Node::Assign { var, value }, span));
        }
        Directive::Eval(expr) => push_node(stack, Spanned::new(Node::Eval(expr), span)),
        Directive::Elsif(cond) => {
            let top = conditional_top(stack, "elsif", &span)?;
            let body = std::mem::take(&mut top.body);
            let BlockKind::Conditional {
                branches, current, ..
            } = &mut top.kind
            else {
                return Err(ParseError::syntax(span, "`elsif` without `if`"));
            };
            let Some((prev, negated)) = current.take() else {
                return Err(ParseError::syntax(span, "`elsif` after `else`"));
            };
            branches.push(Branch {
                cond: prev,
                negated,
                body,
            });
            *current = Some((cond, false));
        }
        Directive::Else => {
            let top = conditional_top(stack, "else", &span)?;
            let body = std::mem::take(&mut top.body);
            let BlockKind::Conditional {
                branches, current, ..
            } = &mut top.kind
            else {
                return Err(ParseError::syntax(span, "`else` without `if`"));
            };
            let Some((prev, negated)) = current.take() else {
                return Err(ParseError::syntax(span, "duplicate `else`"));
            };
            branches.push(Branch {
                cond: prev,
                negated,
                body,
            });
        }
        Directive::End => {
            if stack.len() <= 1 {
                return Err(ParseError::syntax(span, "`end` without an open block"));
            }
            let Some(block) = stack.pop() else {
                return Err(ParseError::syntax(span, "`end` without an open block"));
            };
            let full = block.span.start..span.end;
            let node = match block.kind {
                BlockKind::Conditional {
                    mut branches,
                    current,
                    ..
                } => {
                    let otherwise = match current {
                        Some((cond, negated)) => {
                            branches.push(Branch {
                                cond,
                                negated,
                                body: block.body,
                            });
                            None
                        }
                        None => Some(block.body),
                    };
                    Node::Conditional {
                        branches,
                        otherwise,
                    }
                }
                BlockKind::For { var, iter } => Node::For {
                    var,
                    iter,
                    body: block.body,
                },
                BlockKind::Capture { var } => Node::Capture {
                    var,
                    body: block.body,
                },
                BlockKind::Root => {
                    return Err(ParseError::syntax(span, "`end` without an open block"));
                }
            };
            push_node(stack, Spanned::new(node, full));
        }
    }
    Ok(())
}

fn conditional_top<'s>(
    stack: &'s mut [Block],
    keyword: &str,
    span: &Span,
) -> Result<&'s mut Block, ParseError> {
    match stack.last_mut() {
        Some(block) if matches!(block.kind, BlockKind::Conditional { .. }) => Ok(block),
        _ => Err(ParseError::syntax(
            span.clone(),
            format!("`{}` without `if`", keyword),
        )),
    }
}
