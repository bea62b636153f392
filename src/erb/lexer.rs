//! Lexer for the code inside ERB tags using logos

use logos::Logos;

use crate::source::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Statement keywords
    #[token("if")]
    If,
    #[token("unless")]
    Unless,
    #[token("elsif")]
    Elsif,
    #[token("else")]
    Else,
    #[token("end")]
    End,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("do")]
    Do,

    // Literal keywords
    #[token("nil")]
    Nil,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Operators (longer patterns first)
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,
    #[token("!")]
    Bang,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Delimiters
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("|")]
    Pipe,

    // Literals - identifiers must come after keywords
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Ivar(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*[?!]?", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    String(String),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    // Comments (skip)
    #[regex(r"#[^\n]*", logos::skip)]
    Comment,

    /// Text the lexer could not recognise; rejected by the parser
    Invalid(String),
}

impl Token {
    /// Human-readable form for error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::Ivar(s) => format!("instance variable '@{}'", s),
            Token::String(s) => format!("string {:?}", s),
            Token::Int(n) => format!("number {}", n),
            Token::Float(n) => format!("number {}", n),
            Token::Invalid(s) => format!("character '{}'", s),
            Token::If => "keyword 'if'".to_string(),
            Token::Unless => "keyword 'unless'".to_string(),
            Token::Elsif => "keyword 'elsif'".to_string(),
            Token::Else => "keyword 'else'".to_string(),
            Token::End => "keyword 'end'".to_string(),
            Token::For => "keyword 'for'".to_string(),
            Token::In => "keyword 'in'".to_string(),
            Token::Do => "keyword 'do'".to_string(),
            Token::Nil => "'nil'".to_string(),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::EqEq => "'=='".to_string(),
            Token::NotEq => "'!='".to_string(),
            Token::LessEq => "'<='".to_string(),
            Token::GreaterEq => "'>='".to_string(),
            Token::AndAnd => "'&&'".to_string(),
            Token::OrOr => "'||'".to_string(),
            Token::Less => "'<'".to_string(),
            Token::Greater => "'>'".to_string(),
            Token::Assign => "'='".to_string(),
            Token::Bang => "'!'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::ParenOpen => "'('".to_string(),
            Token::ParenClose => "')'".to_string(),
            Token::BracketOpen => "'['".to_string(),
            Token::BracketClose => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::Comment => "comment".to_string(),
        }
    }
}

/// Strip the quotes from a string literal and resolve its escapes
fn unescape(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Lex tag code into tokens with spans relative to `code`
pub fn lex(code: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    let mut lexer = Token::lexer(code).spanned();
    std::iter::from_fn(move || {
        let (tok, span) = lexer.next()?;
        let tok = tok.unwrap_or_else(|_| Token::Invalid(code[span.clone()].to_string()));
        Some((tok, span))
    })
}
