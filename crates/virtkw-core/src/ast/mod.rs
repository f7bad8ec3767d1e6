// Typed AST for method bodies
// Produced by the method parser, executed by the evaluator and lowered into
// structural nodes by the translator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registry::Keyword;

/// A compiled method: name, positional parameters and statement body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<MethodAst>,
}

impl MethodDef {
    pub fn new(name: impl Into<String>, params: Vec<String>, body: Vec<MethodAst>) -> Self {
        Self {
            name: name.into(),
            params,
            body,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Binary operators other than the short-circuiting `&&` and `||`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "%" => BinaryOp::Modulo,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            "<" => BinaryOp::LessThan,
            "<=" => BinaryOp::LessEqual,
            ">" => BinaryOp::GreaterThan,
            ">=" => BinaryOp::GreaterEqual,
            _ => return None,
        };
        Some(op)
    }
}

/// Represents a value that can appear on the left side of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LValue {
    /// Local variable: x = ...
    Variable(String),
    /// Property on an object: obj.prop = ...
    Property {
        object: Box<MethodAst>,
        property: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MethodAst {
    // Literals
    Number(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,

    // Identifiers and references
    Identifier(String),
    SelfRef,

    // Operators
    Binary {
        op: BinaryOp,
        left: Box<MethodAst>,
        right: Box<MethodAst>,
    },
    And {
        left: Box<MethodAst>,
        right: Box<MethodAst>,
    },
    Or {
        left: Box<MethodAst>,
        right: Box<MethodAst>,
    },
    Not {
        operand: Box<MethodAst>,
    },
    UnaryMinus {
        operand: Box<MethodAst>,
    },

    // Variable operations
    Assignment {
        target: LValue,
        value: Box<MethodAst>,
    },

    // Property and method access
    PropertyAccess {
        object: Box<MethodAst>,
        property: String,
    },
    MethodCall {
        object: Box<MethodAst>,
        method: String,
        args: Vec<MethodAst>,
    },
    FunctionCall {
        name: String,
        args: Vec<MethodAst>,
    },
    /// Call of a callable value, e.g. a behavior fetched with `keyword(...)`
    Invoke {
        callee: Box<MethodAst>,
        args: Vec<MethodAst>,
    },

    // Keyword registry access
    KeywordLookup {
        receiver: Box<MethodAst>,
        keyword: Keyword,
    },
    Thunk {
        body: Vec<MethodAst>,
    },

    // Collections
    List {
        elements: Vec<MethodAst>,
    },

    // Control structures
    If {
        condition: Box<MethodAst>,
        then_branch: Vec<MethodAst>,
        else_branch: Option<Vec<MethodAst>>,
    },
    While {
        condition: Box<MethodAst>,
        body: Vec<MethodAst>,
    },

    // Jump statements
    Return {
        value: Option<Box<MethodAst>>,
    },
    Break,
    Continue,

    Block(Vec<MethodAst>),
}

impl MethodAst {
    /// Check if this node is one of the keyword constructs that can be virtualized
    pub fn virtualizable_keyword(&self) -> Option<Keyword> {
        match self {
            MethodAst::If { .. } => Some(Keyword::If),
            MethodAst::And { .. } => Some(Keyword::And),
            MethodAst::Or { .. } => Some(Keyword::Or),
            MethodAst::While { .. } => Some(Keyword::While),
            _ => None,
        }
    }

    /// Check if this node only makes sense in statement position
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            MethodAst::Return { .. } | MethodAst::Break | MethodAst::Continue
        )
    }
}

impl fmt::Display for MethodAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodAst::Number(n) => write!(f, "{n}"),
            MethodAst::Float(fl) => write!(f, "{fl:?}"),
            MethodAst::String(s) => write!(f, "\"{s}\""),
            MethodAst::Boolean(b) => write!(f, "{b}"),
            MethodAst::Null => write!(f, "null"),
            MethodAst::Identifier(s) => write!(f, "{s}"),
            MethodAst::SelfRef => write!(f, "self"),
            _ => write!(f, "<expression>"),
        }
    }
}
