//! Keyword registry
//!
//! Process-lifetime table mapping `(target, keyword)` to the behavior that
//! replaces the keyword's built-in semantics. Rewritten methods reach it
//! through `keyword(self, "<kw>")`, which resolves against the receiver:
//! an instance entry first, then an entry for the receiver's exact class.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    evaluator::{Thunk, Value},
    world::{ClassId, ObjectId},
    Result, VirtkwError,
};

/// The control-flow keywords that can be virtualized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    If,
    And,
    Or,
    While,
}

impl Keyword {
    pub const ALL: [Keyword; 4] = [Keyword::If, Keyword::And, Keyword::Or, Keyword::While];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::While => "while",
        }
    }

    /// Number of thunks a behavior for this keyword receives
    pub fn operand_count(self) -> usize {
        match self {
            Keyword::If => 3,
            Keyword::And | Keyword::Or | Keyword::While => 2,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Keyword {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "if" => Ok(Keyword::If),
            "and" => Ok(Keyword::And),
            "or" => Ok(Keyword::Or),
            "while" => Ok(Keyword::While),
            other => Err(format!("'{other}' is not a virtualizable keyword")),
        }
    }
}

/// Identity a behavior is registered against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Instance(ObjectId),
    Class(ClassId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Instance(id) => write!(f, "instance {id}"),
            Target::Class(id) => write!(f, "class {id}"),
        }
    }
}

type BehaviorFn = dyn Fn(&[Thunk]) -> Result<Value> + Send + Sync;

/// Replacement semantics for a keyword.
///
/// Receives one thunk per operand of the original construct, in source order:
/// `if` gets (condition, then, else), `and`/`or` get (left, right) and
/// `while` gets (condition, body). Nothing has been evaluated yet; the
/// behavior decides what to force and in which order.
#[derive(Clone)]
pub struct Behavior(Arc<BehaviorFn>);

impl Behavior {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Thunk]) -> Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, operands: &[Thunk]) -> Result<Value> {
        (self.0)(operands)
    }

    pub fn ptr_eq(&self, other: &Behavior) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Behavior(<function>)")
    }
}

/// Shared registry of keyword behaviors
#[derive(Default)]
pub struct KeywordRegistry {
    entries: RwLock<HashMap<(Target, Keyword), Behavior>>,
}

impl KeywordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the behavior for `(target, keyword)`
    pub fn register(&self, target: Target, keyword: Keyword, behavior: Behavior) {
        debug!(%target, %keyword, "registering keyword behavior");
        self.entries.write().insert((target, keyword), behavior);
    }

    pub fn unregister(&self, target: Target, keyword: Keyword) -> Option<Behavior> {
        self.entries.write().remove(&(target, keyword))
    }

    /// Remove the entry only while it still holds `behavior`; returns
    /// whether it was removed
    pub fn unregister_behavior(&self, target: Target, keyword: Keyword, behavior: &Behavior) -> bool {
        let mut entries = self.entries.write();
        match entries.get(&(target, keyword)) {
            Some(current) if current.ptr_eq(behavior) => {
                entries.remove(&(target, keyword));
                true
            }
            _ => false,
        }
    }

    /// Resolve the behavior for a receiver: instance entry, then exact class entry
    pub fn lookup(&self, receiver: ObjectId, class: ClassId, keyword: Keyword) -> Result<Behavior> {
        let entries = self.entries.read();
        entries
            .get(&(Target::Instance(receiver), keyword))
            .or_else(|| entries.get(&(Target::Class(class), keyword)))
            .cloned()
            .ok_or_else(|| VirtkwError::UnvirtualizedKeyword {
                keyword,
                receiver: receiver.to_string(),
            })
    }

    pub fn is_registered(&self, target: Target, keyword: Keyword) -> bool {
        self.entries.read().contains_key(&(target, keyword))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for KeywordRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: i64) -> Behavior {
        Behavior::new(move |_| Ok(Value::Integer(value)))
    }

    #[test]
    fn test_keyword_round_trips_through_str() {
        for keyword in Keyword::ALL {
            assert_eq!(keyword.as_str().parse::<Keyword>(), Ok(keyword));
        }
        assert!("unless".parse::<Keyword>().is_err());
    }

    #[test]
    fn test_instance_entry_shadows_class_entry() {
        let registry = KeywordRegistry::new();
        let class = ClassId::new();
        let a = ObjectId::new();
        let b = ObjectId::new();

        registry.register(Target::Class(class), Keyword::If, constant(1));
        registry.register(Target::Instance(a), Keyword::If, constant(2));

        let for_a = registry.lookup(a, class, Keyword::If).unwrap();
        let for_b = registry.lookup(b, class, Keyword::If).unwrap();
        assert_eq!(for_a.call(&[]).unwrap(), Value::Integer(2));
        assert_eq!(for_b.call(&[]).unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_lookup_without_entry_is_an_error() {
        let registry = KeywordRegistry::new();
        let class = ClassId::new();
        let receiver = ObjectId::new();
        registry.register(Target::Class(class), Keyword::And, constant(1));

        let err = registry.lookup(receiver, class, Keyword::Or).unwrap_err();
        assert!(matches!(
            err,
            VirtkwError::UnvirtualizedKeyword {
                keyword: Keyword::Or,
                ..
            }
        ));
    }

    #[test]
    fn test_register_overwrites() {
        let registry = KeywordRegistry::new();
        let class = ClassId::new();
        let receiver = ObjectId::new();
        registry.register(Target::Class(class), Keyword::While, constant(1));
        registry.register(Target::Class(class), Keyword::While, constant(7));

        assert_eq!(registry.len(), 1);
        let behavior = registry.lookup(receiver, class, Keyword::While).unwrap();
        assert_eq!(behavior.call(&[]).unwrap(), Value::Integer(7));
    }

    #[test]
    fn test_unregister_behavior_leaves_replacements() {
        let registry = KeywordRegistry::new();
        let class = ClassId::new();
        let first = constant(1);
        let second = constant(2);

        registry.register(Target::Class(class), Keyword::If, first.clone());
        registry.register(Target::Class(class), Keyword::If, second.clone());
        assert!(!registry.unregister_behavior(Target::Class(class), Keyword::If, &first));
        assert!(registry.is_registered(Target::Class(class), Keyword::If));

        assert!(registry.unregister_behavior(Target::Class(class), Keyword::If, &second));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_and_clear() {
        let registry = KeywordRegistry::new();
        let class = ClassId::new();
        registry.register(Target::Class(class), Keyword::If, constant(1));
        registry.register(Target::Class(class), Keyword::Or, constant(2));

        assert!(registry.unregister(Target::Class(class), Keyword::If).is_some());
        assert!(!registry.is_registered(Target::Class(class), Keyword::If));
        registry.clear();
        assert!(registry.is_empty());
    }
}
