//! Method source parser using nom
//!
//! # Grammar
//!
//! ```ebnf
//! method     = "method", name, "(", [ident, {",", ident}], ")", {statement}, "endmethod";
//! statement  = ("return", [expr] | "break" | "continue" | expr), [";"];
//!
//! expr       = or_expr, ["=", expr];          (* lhs must be a variable or property *)
//! or_expr    = and_expr, {"||", and_expr};
//! and_expr   = equality, {"&&", equality};
//! equality   = relational, {("==" | "!="), relational};
//! relational = additive, {("<=" | ">=" | "<" | ">"), additive};
//! additive   = term, {("+" | "-"), term};
//! term       = unary, {("*" | "/" | "%"), unary};
//! unary      = ("!" | "-"), unary | postfix;
//! postfix    = primary, {"." name | ":" name, args | args};
//! args       = "(", [expr, {",", expr}], ")";
//!
//! primary    = number | string | "true" | "false" | "null" | "self"
//!            | "keyword", "(", expr, ",", string, ")"
//!            | "thunk", {statement}, "endthunk"
//!            | "if", "(", expr, ")", {statement}, {"elseif" ...}, ["else", {statement}], "endif"
//!            | "while", "(", expr, ")", {statement}, "endwhile"
//!            | "[", [expr, {",", expr}], "]"
//!            | "(", expr, ")"
//!            | ident, args
//!            | ident;
//! ```
//!
//! `//` starts a comment running to the end of the line.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify},
    error::{Error, ErrorKind},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::Parser;
use crate::{
    ast::{BinaryOp, LValue, MethodAst, MethodDef},
    registry::Keyword,
    Result, VirtkwError,
};

/// Words that cannot be used as variable or function names
pub const RESERVED: &[&str] = &[
    "if",
    "elseif",
    "else",
    "endif",
    "while",
    "endwhile",
    "return",
    "break",
    "continue",
    "method",
    "endmethod",
    "thunk",
    "endthunk",
    "true",
    "false",
    "null",
    "self",
    "keyword",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct MethodParser;

impl MethodParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for MethodParser {
    fn parse_method(&self, source: &str) -> Result<MethodDef> {
        finish(source, all_consuming(method_def)(source))
    }

    fn parse_methods(&self, source: &str) -> Result<Vec<MethodDef>> {
        finish(source, all_consuming(many1(method_def))(source))
    }

    fn name(&self) -> &'static str {
        "method"
    }
}

fn finish<T>(source: &str, result: IResult<&str, T>) -> Result<T> {
    match result {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(VirtkwError::Parse(describe_position(source, e.input)))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(VirtkwError::Parse("unexpected end of input".to_string()))
        }
    }
}

fn describe_position(source: &str, remaining: &str) -> String {
    let offset = source.len() - remaining.len();
    let consumed = &source[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    let near: String = remaining.trim_start().chars().take(24).collect();
    if near.is_empty() {
        format!("unexpected end of input at line {line}, column {column}")
    } else {
        format!("unexpected input at line {line}, column {column}: '{near}'")
    }
}

// Lexical helpers

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Skip whitespace and `//` comments
fn sp(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((multispace1, recognize(pair(tag("//"), not_line_ending))))),
    )(input)
}

fn sym<'a>(s: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(sp, tag(s))
}

/// Match a whole reserved word
fn kw<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(sp, terminated(tag(word), not(satisfy(is_ident_char))))
}

/// Any identifier-shaped word, reserved or not (method and property names)
fn name(input: &str) -> IResult<&str, String> {
    map(
        preceded(
            sp,
            recognize(pair(
                satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
                take_while(is_ident_char),
            )),
        ),
        str::to_string,
    )(input)
}

fn identifier(input: &str) -> IResult<&str, String> {
    verify(name, |s: &str| !RESERVED.contains(&s))(input)
}

fn number(input: &str) -> IResult<&str, MethodAst> {
    let (input, _) = sp(input)?;
    let (rest, text) = recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let parsed = if text.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
        text.parse::<f64>().ok().map(MethodAst::Float)
    } else {
        text.parse::<i64>().ok().map(MethodAst::Number)
    };
    match parsed {
        Some(ast) => Ok((rest, ast)),
        None => Err(nom::Err::Error(Error::new(input, ErrorKind::Digit))),
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let (body, _) = preceded(sp, char('"'))(input)?;
    let unterminated = || nom::Err::Error(Error::new(input, ErrorKind::Char));
    let mut out = String::new();
    let mut chars = body.char_indices();
    loop {
        match chars.next() {
            None => return Err(unterminated()),
            Some((i, '"')) => return Ok((&body[i + 1..], out)),
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '0')) => out.push('\0'),
                Some((_, c @ ('"' | '\\'))) => out.push(c),
                _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Escaped))),
            },
            Some((_, c)) => out.push(c),
        }
    }
}

// Methods and statements

fn method_def(input: &str) -> IResult<&str, MethodDef> {
    let (input, _) = kw("method")(input)?;
    let (input, method_name) = name(input)?;
    let (input, params) =
        delimited(sym("("), separated_list0(sym(","), identifier), sym(")"))(input)?;
    let (input, body) = statements(input)?;
    let (input, _) = kw("endmethod")(input)?;
    let (input, _) = sp(input)?;
    Ok((input, MethodDef::new(method_name, params, body)))
}

fn statements(input: &str) -> IResult<&str, Vec<MethodAst>> {
    many0(statement)(input)
}

fn statement(input: &str) -> IResult<&str, MethodAst> {
    terminated(
        alt((
            map(preceded(kw("return"), opt(expression)), |v| {
                MethodAst::Return {
                    value: v.map(Box::new),
                }
            }),
            value(MethodAst::Break, kw("break")),
            value(MethodAst::Continue, kw("continue")),
            expression,
        )),
        opt(sym(";")),
    )(input)
}

// Expressions

/// Assignment, the loosest binding level
pub(crate) fn expression(input: &str) -> IResult<&str, MethodAst> {
    let (rest, lhs) = or_expr(input)?;
    let (after_eq, eq) = opt(preceded(sp, terminated(char('='), not(char('=')))))(rest)?;
    if eq.is_none() {
        return Ok((rest, lhs));
    }
    let target = match lhs {
        MethodAst::Identifier(var) => LValue::Variable(var),
        MethodAst::PropertyAccess { object, property } => LValue::Property { object, property },
        _ => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Verify))),
    };
    let (rest, rhs) = expression(after_eq)?;
    Ok((
        rest,
        MethodAst::Assignment {
            target,
            value: Box::new(rhs),
        },
    ))
}

#[derive(Clone, Copy)]
enum Operator {
    Or,
    And,
    Binary(BinaryOp),
}

impl Operator {
    fn combine(self, left: MethodAst, right: MethodAst) -> MethodAst {
        let (left, right) = (Box::new(left), Box::new(right));
        match self {
            Operator::Or => MethodAst::Or { left, right },
            Operator::And => MethodAst::And { left, right },
            Operator::Binary(op) => MethodAst::Binary { op, left, right },
        }
    }
}

/// Parse `operand (op operand)*`, folding to the left.
/// Longer symbols must come before their prefixes.
fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, MethodAst>,
    operators: &[(&'static str, Operator)],
) -> IResult<&'a str, MethodAst> {
    let (mut input, mut left) = operand(input)?;
    'next: loop {
        for &(symbol, operator) in operators {
            if let Ok((rest, _)) = sym(symbol)(input) {
                let (rest, right) = operand(rest)?;
                left = operator.combine(left, right);
                input = rest;
                continue 'next;
            }
        }
        return Ok((input, left));
    }
}

fn or_expr(input: &str) -> IResult<&str, MethodAst> {
    left_assoc(input, and_expr, &[("||", Operator::Or)])
}

fn and_expr(input: &str) -> IResult<&str, MethodAst> {
    left_assoc(input, equality, &[("&&", Operator::And)])
}

fn equality(input: &str) -> IResult<&str, MethodAst> {
    left_assoc(
        input,
        relational,
        &[
            ("==", Operator::Binary(BinaryOp::Equal)),
            ("!=", Operator::Binary(BinaryOp::NotEqual)),
        ],
    )
}

fn relational(input: &str) -> IResult<&str, MethodAst> {
    left_assoc(
        input,
        additive,
        &[
            ("<=", Operator::Binary(BinaryOp::LessEqual)),
            (">=", Operator::Binary(BinaryOp::GreaterEqual)),
            ("<", Operator::Binary(BinaryOp::LessThan)),
            (">", Operator::Binary(BinaryOp::GreaterThan)),
        ],
    )
}

fn additive(input: &str) -> IResult<&str, MethodAst> {
    left_assoc(
        input,
        term,
        &[
            ("+", Operator::Binary(BinaryOp::Add)),
            ("-", Operator::Binary(BinaryOp::Subtract)),
        ],
    )
}

fn term(input: &str) -> IResult<&str, MethodAst> {
    left_assoc(
        input,
        unary,
        &[
            ("*", Operator::Binary(BinaryOp::Multiply)),
            ("/", Operator::Binary(BinaryOp::Divide)),
            ("%", Operator::Binary(BinaryOp::Modulo)),
        ],
    )
}

fn unary(input: &str) -> IResult<&str, MethodAst> {
    alt((
        map(preceded(sym("!"), unary), |operand| MethodAst::Not {
            operand: Box::new(operand),
        }),
        map(preceded(sym("-"), unary), negate),
        postfix,
    ))(input)
}

/// Negative numeric literals fold into the literal
fn negate(operand: MethodAst) -> MethodAst {
    match operand {
        MethodAst::Number(n) => MethodAst::Number(n.wrapping_neg()),
        MethodAst::Float(x) => MethodAst::Float(-x),
        other => MethodAst::UnaryMinus {
            operand: Box::new(other),
        },
    }
}

fn call_args(input: &str) -> IResult<&str, Vec<MethodAst>> {
    delimited(sym("("), separated_list0(sym(","), expression), sym(")"))(input)
}

fn postfix(input: &str) -> IResult<&str, MethodAst> {
    let (mut input, mut expr) = primary(input)?;
    loop {
        if let Ok((rest, property)) = preceded(sym("."), name)(input) {
            expr = MethodAst::PropertyAccess {
                object: Box::new(expr),
                property,
            };
            input = rest;
        } else if let Ok((rest, (method, args))) =
            pair(preceded(sym(":"), name), call_args)(input)
        {
            expr = MethodAst::MethodCall {
                object: Box::new(expr),
                method,
                args,
            };
            input = rest;
        } else if let Ok((rest, args)) = call_args(input) {
            expr = MethodAst::Invoke {
                callee: Box::new(expr),
                args,
            };
            input = rest;
        } else {
            return Ok((input, expr));
        }
    }
}

fn primary(input: &str) -> IResult<&str, MethodAst> {
    alt((
        number,
        map(string_literal, MethodAst::String),
        value(MethodAst::Boolean(true), kw("true")),
        value(MethodAst::Boolean(false), kw("false")),
        value(MethodAst::Null, kw("null")),
        value(MethodAst::SelfRef, kw("self")),
        keyword_lookup,
        thunk,
        if_expr,
        while_expr,
        map(
            delimited(sym("["), separated_list0(sym(","), expression), sym("]")),
            |elements| MethodAst::List { elements },
        ),
        delimited(sym("("), expression, sym(")")),
        map(pair(identifier, call_args), |(name, args)| {
            MethodAst::FunctionCall { name, args }
        }),
        map(identifier, MethodAst::Identifier),
    ))(input)
}

fn keyword_lookup(input: &str) -> IResult<&str, MethodAst> {
    let (input, _) = kw("keyword")(input)?;
    let (input, _) = sym("(")(input)?;
    let (input, receiver) = expression(input)?;
    let (input, _) = sym(",")(input)?;
    let (input, keyword) = map_res(string_literal, |s| s.parse::<Keyword>())(input)?;
    let (input, _) = sym(")")(input)?;
    Ok((
        input,
        MethodAst::KeywordLookup {
            receiver: Box::new(receiver),
            keyword,
        },
    ))
}

fn thunk(input: &str) -> IResult<&str, MethodAst> {
    map(delimited(kw("thunk"), statements, kw("endthunk")), |body| {
        MethodAst::Thunk { body }
    })(input)
}

fn condition(input: &str) -> IResult<&str, MethodAst> {
    delimited(sym("("), expression, sym(")"))(input)
}

fn if_expr(input: &str) -> IResult<&str, MethodAst> {
    preceded(kw("if"), if_tail)(input)
}

/// Everything after `if` or `elseif`; an `elseif` chain nests in the else branch
fn if_tail(input: &str) -> IResult<&str, MethodAst> {
    let (input, cond) = condition(input)?;
    let (input, then_branch) = statements(input)?;
    let (input, else_branch) = alt((
        map(preceded(kw("elseif"), if_tail), |nested| Some(vec![nested])),
        map(delimited(kw("else"), statements, kw("endif")), Some),
        value(None, kw("endif")),
    ))(input)?;
    Ok((
        input,
        MethodAst::If {
            condition: Box::new(cond),
            then_branch,
            else_branch,
        },
    ))
}

fn while_expr(input: &str) -> IResult<&str, MethodAst> {
    let (input, _) = kw("while")(input)?;
    let (input, cond) = condition(input)?;
    let (input, body) = statements(input)?;
    let (input, _) = kw("endwhile")(input)?;
    Ok((
        input,
        MethodAst::While {
            condition: Box::new(cond),
            body,
        },
    ))
}
