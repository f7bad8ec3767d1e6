// The four keyword rewriters and the node builders they share

use super::KeywordRewriter;
use crate::{
    node::{tags, Atom, Child, Node},
    registry::Keyword,
    Result, VirtkwError,
};

/// `invoke(keyword(self, "<kw>"), operands...)`
pub fn dispatch(keyword: Keyword, operands: Vec<Node>) -> Node {
    let lookup = Node::new(
        tags::KEYWORD,
        vec![
            Node::leaf(tags::SELF).into(),
            Atom::Str(keyword.as_str().to_string()).into(),
        ],
    );
    let mut children = Vec::with_capacity(operands.len() + 1);
    children.push(Child::Node(lookup));
    children.extend(operands.into_iter().map(Child::Node));
    Node::new(tags::INVOKE, children)
}

/// Wrap one operand as `thunk(block(op))`. A block operand is used as the
/// thunk body directly and a nil operand becomes an empty body.
pub fn operand_thunk(keyword: Keyword, parent: &Node, child: &Child) -> Result<Node> {
    let body = match child {
        Child::Node(node) if node.is(tags::BLOCK) => node.clone(),
        Child::Node(node) => Node::block(vec![node.clone()]),
        Child::Atom(Atom::Nil) => Node::block(Vec::new()),
        Child::Atom(atom) => {
            return Err(VirtkwError::unsupported(
                keyword,
                parent.tag.clone(),
                format!("operand {atom} is not an expression"),
            ))
        }
    };
    Ok(Node::new(tags::THUNK, vec![body.into()]))
}

fn expect_operands(keyword: Keyword, node: &Node, accepted: &[usize]) -> Result<()> {
    if accepted.contains(&node.arity()) {
        Ok(())
    } else {
        Err(VirtkwError::unsupported(
            keyword,
            node.tag.clone(),
            format!(
                "expected {} operands, found {}",
                keyword.operand_count(),
                node.arity()
            ),
        ))
    }
}

fn required_node<'a>(keyword: Keyword, node: &'a Node, index: usize) -> Result<&'a Child> {
    match node.child(index) {
        Some(child @ Child::Node(_)) => Ok(child),
        _ => Err(VirtkwError::unsupported(
            keyword,
            node.tag.clone(),
            format!("operand {index} must be a node"),
        )),
    }
}

/// Shared replacement for the two-operand keywords
fn binary_dispatch(keyword: Keyword, node: &Node) -> Result<Node> {
    expect_operands(keyword, node, &[2])?;
    let left = operand_thunk(keyword, node, required_node(keyword, node, 0)?)?;
    let right = operand_thunk(keyword, node, required_node(keyword, node, 1)?)?;
    Ok(dispatch(keyword, vec![left, right]))
}

/// `if c then [else]` -> three thunks; a missing else becomes an empty block
#[derive(Debug, Default, Clone, Copy)]
pub struct IfRewriter;

impl KeywordRewriter for IfRewriter {
    fn name(&self) -> &'static str {
        "if_rewriter"
    }

    fn description(&self) -> &'static str {
        "Replaces if/else with a registry dispatch over condition, then and else thunks"
    }

    fn keyword(&self) -> Keyword {
        Keyword::If
    }

    fn replace(&self, node: &Node) -> Result<Node> {
        let keyword = self.keyword();
        expect_operands(keyword, node, &[2, 3])?;
        let condition = operand_thunk(keyword, node, required_node(keyword, node, 0)?)?;
        let then_branch = operand_thunk(keyword, node, required_node(keyword, node, 1)?)?;
        let else_branch = match node.child(2) {
            Some(child) => operand_thunk(keyword, node, child)?,
            None => operand_thunk(keyword, node, &Child::Atom(Atom::Nil))?,
        };
        Ok(dispatch(keyword, vec![condition, then_branch, else_branch]))
    }
}

/// `a && b` -> left and right thunks
#[derive(Debug, Default, Clone, Copy)]
pub struct AndRewriter;

impl KeywordRewriter for AndRewriter {
    fn name(&self) -> &'static str {
        "and_rewriter"
    }

    fn description(&self) -> &'static str {
        "Replaces && with a registry dispatch over left and right thunks"
    }

    fn keyword(&self) -> Keyword {
        Keyword::And
    }

    fn replace(&self, node: &Node) -> Result<Node> {
        binary_dispatch(self.keyword(), node)
    }
}

/// `a || b` -> left and right thunks
#[derive(Debug, Default, Clone, Copy)]
pub struct OrRewriter;

impl KeywordRewriter for OrRewriter {
    fn name(&self) -> &'static str {
        "or_rewriter"
    }

    fn description(&self) -> &'static str {
        "Replaces || with a registry dispatch over left and right thunks"
    }

    fn keyword(&self) -> Keyword {
        Keyword::Or
    }

    fn replace(&self, node: &Node) -> Result<Node> {
        binary_dispatch(self.keyword(), node)
    }
}

/// `while c body` -> condition and body thunks. `break`/`continue` inside
/// the body leave the body thunk as signals for the loop driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhileRewriter;

impl KeywordRewriter for WhileRewriter {
    fn name(&self) -> &'static str {
        "while_rewriter"
    }

    fn description(&self) -> &'static str {
        "Replaces while loops with a registry dispatch over condition and body thunks"
    }

    fn keyword(&self) -> Keyword {
        Keyword::While
    }

    fn replace(&self, node: &Node) -> Result<Node> {
        binary_dispatch(self.keyword(), node)
    }
}
