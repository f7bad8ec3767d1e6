// Normalisation of structural trees before source generation
// Translators may emit several spellings of the same construct; the
// generator only understands the canonical one.

use crate::node::{tags, Atom, Child, Node};

/// Canonicalise a tree. `unify(&unify(n)) == unify(n)`.
///
/// - `paren` and `expr_stmt` wrappers with a single child are dropped
/// - a `block` directly inside a `block` is spliced into its parent
/// - an `if` whose else branch is an empty `block` gets `nil` instead
/// - a `lit` holding the names `nil`, `true` or `false` gets the real atom
pub fn unify(node: &Node) -> Node {
    if node.is(tags::PAREN) || node.is(tags::EXPR_STMT) {
        if let [Child::Node(inner)] = node.children.as_slice() {
            return unify(inner);
        }
    }

    if node.is(tags::LIT) {
        if let Some(Atom::Name(name)) = node.atom_at(0) {
            let atom = match name.as_str() {
                "nil" => Some(Atom::Nil),
                "true" => Some(Atom::Bool(true)),
                "false" => Some(Atom::Bool(false)),
                _ => None,
            };
            if let Some(atom) = atom {
                return Node::lit(atom);
            }
        }
    }

    let mut children: Vec<Child> = Vec::with_capacity(node.children.len());
    for child in &node.children {
        match child {
            Child::Atom(atom) => children.push(Child::Atom(atom.clone())),
            Child::Node(inner) => {
                let unified = unify(inner);
                if node.is(tags::BLOCK) && unified.is(tags::BLOCK) {
                    children.extend(unified.children);
                } else {
                    children.push(Child::Node(unified));
                }
            }
        }
    }

    if node.is(tags::IF) {
        if let Some(else_child) = children.get_mut(2) {
            let empty_block = matches!(
                else_child,
                Child::Node(n) if n.is(tags::BLOCK) && n.children.is_empty()
            );
            if empty_block {
                *else_child = Child::Atom(Atom::Nil);
            }
        }
    }

    Node::new(node.tag.clone(), children)
}
