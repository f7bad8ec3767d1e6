/*!
# Keyword Rewriters

Bottom-up tree transforms that replace one keyword construct with a dispatch
through the keyword registry:

```text
(if c (block t) (block e))
  => (invoke (keyword (self) "if")
             (thunk (block c)) (thunk (block t)) (thunk (block e)))
```

Operands become thunks, so nothing the original construct would not have
evaluated gets evaluated before the behavior asks for it. Children are
rewritten before their parent, so nested constructs are replaced inside-out.
The generated `invoke`/`keyword`/`thunk` nodes never match a rewriter, which
makes rewriting a tree twice the same as rewriting it once.
*/

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    node::{Child, Node},
    registry::Keyword,
    Result, VirtkwError,
};

pub mod keyword_rules;

pub use keyword_rules::{AndRewriter, IfRewriter, OrRewriter, WhileRewriter};

/// Core trait for keyword rewriters
pub trait KeywordRewriter: Send + Sync {
    /// Human-readable name for this rewriter
    fn name(&self) -> &'static str;

    /// Detailed description of what this rewriter does
    fn description(&self) -> &'static str;

    /// Keyword whose construct this rewriter replaces
    fn keyword(&self) -> Keyword;

    /// Check if this rewriter applies to the given node
    fn matches(&self, node: &Node) -> bool {
        node.is(self.keyword().as_str())
    }

    /// Build the replacement for a matching node whose children have
    /// already been rewritten
    fn replace(&self, node: &Node) -> Result<Node>;

    /// Rewrite a whole tree, children first. The input is left untouched.
    fn rewrite(&self, node: &Node) -> Result<Node> {
        let mut children = Vec::with_capacity(node.arity());
        for child in &node.children {
            children.push(match child {
                Child::Node(inner) => Child::Node(self.rewrite(inner)?),
                Child::Atom(atom) => Child::Atom(atom.clone()),
            });
        }
        let rebuilt = Node::new(node.tag.clone(), children);
        if self.matches(&rebuilt) {
            let replaced = self.replace(&rebuilt)?;
            debug!(rewriter = self.name(), keyword = %self.keyword(), "replaced keyword construct");
            Ok(replaced)
        } else {
            Ok(rebuilt)
        }
    }
}

/// One rewriter per keyword
#[derive(Clone)]
pub struct RewriterSet {
    rewriters: IndexMap<Keyword, Arc<dyn KeywordRewriter>>,
}

impl Default for RewriterSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl RewriterSet {
    /// The four built-in rewriters
    pub fn standard() -> Self {
        Self::empty()
            .with(Arc::new(IfRewriter))
            .with(Arc::new(AndRewriter))
            .with(Arc::new(OrRewriter))
            .with(Arc::new(WhileRewriter))
    }

    pub fn empty() -> Self {
        Self {
            rewriters: IndexMap::new(),
        }
    }

    /// Add a rewriter, replacing any existing one for the same keyword
    pub fn with(mut self, rewriter: Arc<dyn KeywordRewriter>) -> Self {
        self.rewriters.insert(rewriter.keyword(), rewriter);
        self
    }

    pub fn get(&self, keyword: Keyword) -> Option<&Arc<dyn KeywordRewriter>> {
        self.rewriters.get(&keyword)
    }

    pub fn keywords(&self) -> impl Iterator<Item = Keyword> + '_ {
        self.rewriters.keys().copied()
    }

    /// Rewrite `node` for one keyword
    pub fn rewrite(&self, keyword: Keyword, node: &Node) -> Result<Node> {
        let rewriter = self.get(keyword).ok_or_else(|| {
            VirtkwError::unsupported(keyword, node.tag.clone(), "no rewriter configured")
        })?;
        rewriter.rewrite(node)
    }

    /// Rewrite `node` for every configured keyword, in insertion order
    pub fn rewrite_all(&self, node: &Node) -> Result<Node> {
        let mut current = node.clone();
        for rewriter in self.rewriters.values() {
            current = rewriter.rewrite(&current)?;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for RewriterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rewriters.values().map(|r| r.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests;
