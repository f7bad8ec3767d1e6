/*!
# Structural Nodes

Tag/children trees describing a method body. This is the representation the
keyword rewriters and the tree codec operate on. Shapes per tag are fixed; the
full catalogue lives next to [`tags`].

Nodes are plain values: rewriting builds new trees from borrowed inputs, so an
originally captured body stays usable for restoring a method later.
*/

pub mod translate;

pub use translate::{AstTranslator, Translator};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag names used by the translator, the rewriters and the codec
pub mod tags {
    pub const DEFN: &str = "defn";
    pub const ARGS: &str = "args";
    pub const BLOCK: &str = "block";
    pub const IF: &str = "if";
    pub const WHILE: &str = "while";
    pub const AND: &str = "and";
    pub const OR: &str = "or";
    pub const NOT: &str = "not";
    pub const NEG: &str = "neg";
    pub const LIT: &str = "lit";
    pub const LVAR: &str = "lvar";
    pub const LASGN: &str = "lasgn";
    pub const SELF: &str = "self";
    pub const PROP: &str = "prop";
    pub const PROPASGN: &str = "propasgn";
    pub const CALL: &str = "call";
    pub const BINOP: &str = "binop";
    pub const LIST: &str = "list";
    pub const RETURN: &str = "return";
    pub const BREAK: &str = "break";
    pub const NEXT: &str = "next";
    pub const THUNK: &str = "thunk";
    pub const KEYWORD: &str = "keyword";
    pub const INVOKE: &str = "invoke";

    // Variants only seen before unification
    pub const PAREN: &str = "paren";
    pub const EXPR_STMT: &str = "expr_stmt";
}

/// Atomic leaf value inside a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Atom {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Identifier-like payload: variable, method, property or operator names
    Name(String),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Nil => write!(f, "nil"),
            Atom::Bool(b) => write!(f, "{b}"),
            Atom::Int(n) => write!(f, "{n}"),
            Atom::Float(x) => write!(f, "{x:?}"),
            Atom::Str(s) => write!(f, "{s:?}"),
            Atom::Name(n) => write!(f, ":{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Child {
    Node(Node),
    Atom(Atom),
}

impl Child {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Child::Node(node) => Some(node),
            Child::Atom(_) => None,
        }
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Child::Atom(atom) => Some(atom),
            Child::Node(_) => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Child::Atom(Atom::Nil))
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Node(node)
    }
}

impl From<Atom> for Child {
    fn from(atom: Atom) -> Self {
        Child::Atom(atom)
    }
}

/// One syntactic construct of a method body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub tag: String,
    pub children: Vec<Child>,
}

impl Node {
    pub fn new(tag: impl Into<String>, children: Vec<Child>) -> Self {
        Self {
            tag: tag.into(),
            children,
        }
    }

    /// A node without children, e.g. `self` or `break`
    pub fn leaf(tag: impl Into<String>) -> Self {
        Self::new(tag, Vec::new())
    }

    pub fn block(statements: Vec<Node>) -> Self {
        Self::new(
            tags::BLOCK,
            statements.into_iter().map(Child::Node).collect(),
        )
    }

    pub fn lit(atom: Atom) -> Self {
        Self::new(tags::LIT, vec![Child::Atom(atom)])
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    pub fn arity(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, index: usize) -> Option<&Child> {
        self.children.get(index)
    }

    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.child(index).and_then(Child::as_node)
    }

    pub fn atom_at(&self, index: usize) -> Option<&Atom> {
        self.child(index).and_then(Child::as_atom)
    }

    /// Name payload at `index`, if that child is a name atom
    pub fn name_at(&self, index: usize) -> Option<&str> {
        match self.atom_at(index) {
            Some(Atom::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// Nested child nodes in order, skipping atoms
    pub fn child_nodes(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter_map(Child::as_node)
    }

    /// Number of nodes in this tree carrying `tag`, including self
    pub fn count_tag(&self, tag: &str) -> usize {
        let own = usize::from(self.is(tag));
        own + self.child_nodes().map(|n| n.count_tag(tag)).sum::<usize>()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.tag)?;
        for child in &self.children {
            match child {
                Child::Node(node) => write!(f, " {node}")?,
                Child::Atom(atom) => write!(f, " {atom}")?,
            }
        }
        write!(f, ")")
    }
}
