// Source code generation from structural nodes
// Produces method source the parser accepts. Operators are always
// parenthesised and every statement ends with `;`, so the output never
// depends on precedence or on statement separation rules.

use crate::{
    ast::BinaryOp,
    node::{tags, Atom, Node},
    registry::Keyword,
    Result, VirtkwError,
};

const INDENT: &str = "  ";

/// Trait for trees that can generate their source code representation
pub trait ToSource {
    fn to_source(&self) -> Result<String>;
}

impl ToSource for Node {
    /// `defn` yields a full method, `block` a statement list, anything
    /// else a single statement
    fn to_source(&self) -> Result<String> {
        match self.tag.as_str() {
            tags::DEFN => method(self),
            tags::BLOCK => statements(self),
            _ => statement(self),
        }
    }
}

fn malformed(node: &Node, reason: impl Into<String>) -> VirtkwError {
    VirtkwError::codec(node.tag.clone(), reason)
}

fn expect_arity(node: &Node, arity: usize) -> Result<()> {
    if node.arity() == arity {
        Ok(())
    } else {
        Err(malformed(
            node,
            format!("expected {arity} children, found {}", node.arity()),
        ))
    }
}

fn node_child<'a>(node: &'a Node, index: usize) -> Result<&'a Node> {
    node.node_at(index)
        .ok_or_else(|| malformed(node, format!("child {index} must be a node")))
}

fn block_child<'a>(node: &'a Node, index: usize) -> Result<&'a Node> {
    let child = node_child(node, index)?;
    if child.is(tags::BLOCK) {
        Ok(child)
    } else {
        Err(malformed(
            node,
            format!("child {index} must be a block, found '{}'", child.tag),
        ))
    }
}

fn name_child<'a>(node: &'a Node, index: usize) -> Result<&'a str> {
    node.name_at(index)
        .ok_or_else(|| malformed(node, format!("child {index} must be a name")))
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("{INDENT}{line}\n")).collect()
}

fn method(node: &Node) -> Result<String> {
    expect_arity(node, 3)?;
    let name = name_child(node, 0)?;
    let args = node_child(node, 1)?;
    if !args.is(tags::ARGS) {
        return Err(malformed(node, "child 1 must be an args node"));
    }
    let params = (0..args.arity())
        .map(|i| name_child(args, i))
        .collect::<Result<Vec<_>>>()?;
    let body = block_child(node, 2)?;

    let mut out = format!("method {name}({})\n", params.join(", "));
    out.push_str(&indent(&statements(body)?));
    out.push_str("endmethod\n");
    Ok(out)
}

fn statements(block: &Node) -> Result<String> {
    let mut out = String::new();
    for i in 0..block.arity() {
        out.push_str(&statement(node_child(block, i)?)?);
        out.push_str(";\n");
    }
    Ok(out)
}

fn statement(node: &Node) -> Result<String> {
    match node.tag.as_str() {
        tags::RETURN => {
            expect_arity(node, 1)?;
            match node.child(0) {
                Some(child) if child.is_nil() => Ok("return".to_string()),
                _ => Ok(format!("return {}", expression(node_child(node, 0)?)?)),
            }
        }
        tags::BREAK => expect_arity(node, 0).map(|_| "break".to_string()),
        tags::NEXT => expect_arity(node, 0).map(|_| "continue".to_string()),
        tags::LASGN => {
            expect_arity(node, 2)?;
            let name = name_child(node, 0)?;
            Ok(format!("{name} = {}", expression(node_child(node, 1)?)?))
        }
        tags::PROPASGN => {
            expect_arity(node, 3)?;
            let receiver = postfix_operand(node_child(node, 0)?)?;
            let property = name_child(node, 1)?;
            let value = expression(node_child(node, 2)?)?;
            Ok(format!("{receiver}.{property} = {value}"))
        }
        _ => expression(node),
    }
}

fn expression(node: &Node) -> Result<String> {
    match node.tag.as_str() {
        tags::LIT => {
            expect_arity(node, 1)?;
            match node.atom_at(0) {
                Some(atom) => literal(node, atom),
                None => Err(malformed(node, "literal must hold an atom")),
            }
        }
        tags::LVAR => {
            expect_arity(node, 1)?;
            name_child(node, 0).map(str::to_string)
        }
        tags::SELF => expect_arity(node, 0).map(|_| "self".to_string()),
        tags::LASGN | tags::PROPASGN => Ok(format!("({})", statement(node)?)),

        tags::BINOP => {
            expect_arity(node, 3)?;
            let symbol = name_child(node, 0)?;
            let op = BinaryOp::from_symbol(symbol)
                .ok_or_else(|| malformed(node, format!("unknown operator '{symbol}'")))?;
            let left = expression(node_child(node, 1)?)?;
            let right = expression(node_child(node, 2)?)?;
            Ok(format!("({left} {} {right})", op.symbol()))
        }
        tags::AND | tags::OR => {
            expect_arity(node, 2)?;
            let symbol = if node.is(tags::AND) { "&&" } else { "||" };
            let left = expression(node_child(node, 0)?)?;
            let right = expression(node_child(node, 1)?)?;
            Ok(format!("({left} {symbol} {right})"))
        }
        tags::NOT => {
            expect_arity(node, 1)?;
            Ok(format!("(!{})", expression(node_child(node, 0)?)?))
        }
        tags::NEG => {
            expect_arity(node, 1)?;
            Ok(format!("(-{})", expression(node_child(node, 0)?)?))
        }

        tags::PROP => {
            expect_arity(node, 2)?;
            let receiver = postfix_operand(node_child(node, 0)?)?;
            Ok(format!("{receiver}.{}", name_child(node, 1)?))
        }
        tags::CALL => {
            if node.arity() < 2 {
                return Err(malformed(node, "call needs a receiver and a name"));
            }
            let name = name_child(node, 1)?;
            let args = arguments(node, 2)?;
            match node.child(0) {
                Some(child) if child.is_nil() => Ok(format!("{name}({args})")),
                _ => {
                    let receiver = postfix_operand(node_child(node, 0)?)?;
                    Ok(format!("{receiver}:{name}({args})"))
                }
            }
        }
        tags::INVOKE => {
            if node.arity() < 1 {
                return Err(malformed(node, "invoke needs a callee"));
            }
            let callee = postfix_operand(node_child(node, 0)?)?;
            Ok(format!("{callee}({})", arguments(node, 1)?))
        }
        tags::KEYWORD => {
            expect_arity(node, 2)?;
            let receiver = expression(node_child(node, 0)?)?;
            let keyword = match node.atom_at(1) {
                Some(Atom::Str(s)) => s
                    .parse::<Keyword>()
                    .map_err(|reason| malformed(node, reason))?,
                _ => return Err(malformed(node, "child 1 must be a keyword string")),
            };
            Ok(format!("keyword({receiver}, \"{keyword}\")"))
        }
        tags::THUNK => {
            expect_arity(node, 1)?;
            let body = statements(block_child(node, 0)?)?;
            Ok(format!("thunk\n{}endthunk", indent(&body)))
        }
        tags::LIST => Ok(format!("[{}]", arguments(node, 0)?)),

        tags::IF => {
            expect_arity(node, 3)?;
            let condition = expression(node_child(node, 0)?)?;
            let mut out = format!("if ({condition})\n");
            out.push_str(&indent(&statements(block_child(node, 1)?)?));
            match node.child(2) {
                Some(child) if child.is_nil() => {}
                _ => {
                    out.push_str("else\n");
                    out.push_str(&indent(&statements(block_child(node, 2)?)?));
                }
            }
            out.push_str("endif");
            Ok(out)
        }
        tags::WHILE => {
            expect_arity(node, 2)?;
            let condition = expression(node_child(node, 0)?)?;
            let body = statements(block_child(node, 1)?)?;
            Ok(format!("while ({condition})\n{}endwhile", indent(&body)))
        }

        tags::RETURN | tags::BREAK | tags::NEXT => {
            Err(malformed(node, "jump used where a value is expected"))
        }
        tags::BLOCK | tags::DEFN | tags::ARGS => {
            Err(malformed(node, "not allowed in expression position"))
        }
        _ => Err(malformed(node, "unknown tag")),
    }
}

/// Comma separated expressions for children `from..`
fn arguments(node: &Node, from: usize) -> Result<String> {
    let args = (from..node.arity())
        .map(|i| expression(node_child(node, i)?))
        .collect::<Result<Vec<_>>>()?;
    Ok(args.join(", "))
}

/// An expression usable before `.`, `:` or `(`
fn postfix_operand(node: &Node) -> Result<String> {
    let source = expression(node)?;
    let bare = matches!(
        node.tag.as_str(),
        tags::LVAR | tags::SELF | tags::PROP | tags::CALL | tags::INVOKE | tags::KEYWORD | tags::LIST
    ) || matches!(node.atom_at(0), Some(Atom::Str(_)));
    if bare {
        Ok(source)
    } else {
        Ok(format!("({source})"))
    }
}

fn literal(node: &Node, atom: &Atom) -> Result<String> {
    match atom {
        Atom::Nil => Ok("null".to_string()),
        Atom::Bool(b) => Ok(b.to_string()),
        Atom::Int(n) if *n < 0 => Ok(format!("({n})")),
        Atom::Int(n) => Ok(n.to_string()),
        Atom::Float(x) if !x.is_finite() => {
            Err(malformed(node, format!("float {x} has no source form")))
        }
        Atom::Float(x) if x.is_sign_negative() => Ok(format!("({x:?})")),
        Atom::Float(x) => Ok(format!("{x:?}")),
        Atom::Str(s) => Ok(quote(s)),
        Atom::Name(name) => Err(malformed(
            node,
            format!("literal holds unresolved name '{name}'"),
        )),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lvar(name: &str) -> Node {
        Node::new(tags::LVAR, vec![Atom::Name(name.into()).into()])
    }

    fn binop(op: &str, left: Node, right: Node) -> Node {
        Node::new(
            tags::BINOP,
            vec![Atom::Name(op.into()).into(), left.into(), right.into()],
        )
    }

    #[test]
    fn test_operators_fully_parenthesised() {
        let node = binop(
            "*",
            binop("+", lvar("a"), lvar("b")),
            Node::lit(Atom::Int(-2)),
        );
        assert_eq!(node.to_source().unwrap(), "((a + b) * (-2))");
    }

    #[test]
    fn test_method_layout() {
        let node = Node::new(
            tags::DEFN,
            vec![
                Atom::Name("greet".into()).into(),
                Node::new(tags::ARGS, vec![Atom::Name("who".into()).into()]).into(),
                Node::block(vec![Node::new(
                    tags::IF,
                    vec![
                        lvar("who").into(),
                        Node::block(vec![Node::new(tags::RETURN, vec![lvar("who").into()])])
                            .into(),
                        Atom::Nil.into(),
                    ],
                )])
                .into(),
            ],
        );
        assert_eq!(
            node.to_source().unwrap(),
            "method greet(who)\n  if (who)\n    return who;\n  endif;\nendmethod\n"
        );
    }

    #[test]
    fn test_string_escapes() {
        let node = Node::lit(Atom::Str("say \"hi\"\n".into()));
        assert_eq!(node.to_source().unwrap(), r#""say \"hi\"\n""#);
    }

    #[test]
    fn test_invoke_of_keyword() {
        let node = Node::new(
            tags::INVOKE,
            vec![
                Node::new(
                    tags::KEYWORD,
                    vec![Node::leaf(tags::SELF).into(), Atom::Str("or".into()).into()],
                )
                .into(),
                Node::new(tags::THUNK, vec![Node::block(vec![lvar("a")]).into()]).into(),
            ],
        );
        assert_eq!(
            node.to_source().unwrap(),
            "keyword(self, \"or\")(thunk\n  a;\nendthunk)"
        );
    }

    #[test]
    fn test_unknown_tag_is_codec_error() {
        let err = Node::leaf("yield").to_source().unwrap_err();
        assert!(matches!(err, VirtkwError::Codec { ref tag, .. } if tag == "yield"));
    }

    #[test]
    fn test_malformed_shapes_are_codec_errors() {
        let wrong_arity = Node::new(tags::AND, vec![lvar("a").into()]);
        assert!(matches!(
            wrong_arity.to_source(),
            Err(VirtkwError::Codec { .. })
        ));

        let jump_as_value = binop("+", Node::leaf(tags::BREAK), lvar("a"));
        assert!(matches!(
            jump_as_value.to_source(),
            Err(VirtkwError::Codec { .. })
        ));

        let bad_keyword = Node::new(
            tags::KEYWORD,
            vec![Node::leaf(tags::SELF).into(), Atom::Str("unless".into()).into()],
        );
        assert!(bad_keyword.to_source().is_err());
    }
}
