//! # Virtkw Core
//!
//! Keyword virtualization for a small embeddable object runtime:
//! - Structural nodes and the translator that produces them from methods
//! - Keyword rewriters for `if`, `and`, `or` and `while`
//! - Tree codec (unifier + source generator)
//! - Keyword registry resolving `(receiver, keyword)` to a behavior
//! - Reflection over classes and instances, and the virtualizer tying it together
//!
//! The host side (method parser, evaluator, class/instance world) lives here
//! too, so rewritten methods can actually be installed and run.

#![warn(clippy::all)]

pub mod ast;
pub mod behaviors;
pub mod codec;
pub mod evaluator;
pub mod node;
pub mod parser;
pub mod reflection;
pub mod registry;
pub mod rewrite;
pub mod runtime;
pub mod virtualizer;
pub mod world;

use std::fmt::Display;

// Re-export commonly used types
pub use ast::{BinaryOp, LValue, MethodAst, MethodDef};
pub use codec::TreeCodec;
pub use evaluator::{errors::EvalError, Signal, Thunk, Value};
pub use node::{Atom, Child, Node, Translator};
pub use parser::{create_parser, MethodParser, Parser};
pub use reflection::{MethodCapture, Reflection, RuntimeReflector};
pub use registry::{Behavior, Keyword, KeywordRegistry, Target};
pub use rewrite::{KeywordRewriter, RewriterSet};
pub use runtime::{Runtime, RuntimeConfig};
pub use virtualizer::{VirtualizationSummary, Virtualizer, VirtualizerConfig};
pub use world::{ClassId, ObjectId, World};

/// Virtkw version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for virtkw components.
///
/// Respects `RUST_LOG`; defaults to `virtkw_core=info`. Calling it twice is
/// harmless.
pub fn init_tracing() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "virtkw_core=info".parse() {
        filter = filter.add_directive(directive);
    }
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Error types for virtkw operations
#[derive(thiserror::Error, Debug)]
pub enum VirtkwError {
    /// A class or object cannot be introspected or redefined
    #[error("Reflection error on {target}: {reason}")]
    Reflection { target: String, reason: String },

    /// A structural tree cannot be turned into source text
    #[error("Codec error at '{tag}': {reason}")]
    Codec { tag: String, reason: String },

    /// A rewriter met a keyword node whose shape it does not recognize
    #[error("Unsupported '{keyword}' construct at '{tag}': {reason}")]
    UnsupportedConstruct {
        keyword: registry::Keyword,
        tag: String,
        reason: String,
    },

    /// A rewritten method ran on a receiver with no registered behavior
    #[error("No '{keyword}' behavior registered for {receiver}")]
    UnvirtualizedKeyword {
        keyword: registry::Keyword,
        receiver: String,
    },

    /// Source text failed to compile
    #[error("Parse error: {0}")]
    Parse(String),

    /// Runtime failure while executing a method
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),
}

impl VirtkwError {
    pub fn reflection(target: impl Display, reason: impl Into<String>) -> Self {
        Self::Reflection {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    pub fn codec(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Codec {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(
        keyword: registry::Keyword,
        tag: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedConstruct {
            keyword,
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for virtkw operations
pub type Result<T> = std::result::Result<T, VirtkwError>;
