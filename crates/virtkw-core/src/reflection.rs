//! Reflection over the host runtime
//!
//! Everything the virtualizer needs to know about classes and instances goes
//! through the [`Reflection`] trait, so the engine can be pointed at another
//! host by implementing it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    codec::TreeCodec,
    node::{AstTranslator, Node, Translator},
    runtime::Runtime,
    world::{ClassId, ObjectId},
    Result, VirtkwError,
};

/// Snapshot of one method's structural body, taken before rewriting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCapture {
    pub class: ClassId,
    /// Set for a singleton method of this instance; `None` for a class method
    #[serde(default)]
    pub owner: Option<ObjectId>,
    pub method: String,
    pub body: Node,
    pub captured_at: DateTime<Utc>,
}

pub trait Reflection: Send + Sync {
    /// Live proper descendants of `class`
    fn subclasses_of(&self, class: ClassId) -> Result<IndexSet<ClassId>>;

    /// De-duplicated union of `subclasses_of` over `classes`
    fn subclasses_of_many(&self, classes: &[ClassId]) -> Result<IndexSet<ClassId>> {
        let mut all = IndexSet::new();
        for &class in classes {
            all.extend(self.subclasses_of(class)?);
        }
        Ok(all)
    }

    /// Methods declared directly on `class` (inherited ones excluded), in
    /// definition order, as structural bodies
    fn methods_of(&self, class: ClassId) -> Result<IndexMap<String, Node>>;

    /// The class's declared methods as `object` currently sees them: a
    /// singleton override replaces the class version
    fn instance_methods_of(&self, object: ObjectId) -> Result<IndexMap<String, Node>>;

    /// Singleton methods of `object` only, in definition order
    fn singleton_methods_of(&self, object: ObjectId) -> Result<IndexMap<String, Node>>;

    fn install_on_class(&self, class: ClassId, source: &str) -> Result<()>;

    fn install_on_instance(&self, object: ObjectId, source: &str) -> Result<()>;

    fn class_of(&self, object: ObjectId) -> Result<ClassId>;

    /// Drop a singleton method; returns whether one existed
    fn remove_instance_method(&self, object: ObjectId, name: &str) -> Result<bool>;

    fn capture(&self, class: ClassId) -> Result<Vec<MethodCapture>> {
        let captured_at = Utc::now();
        Ok(self
            .methods_of(class)?
            .into_iter()
            .map(|(method, body)| MethodCapture {
                class,
                owner: None,
                method,
                body,
                captured_at,
            })
            .collect())
    }

    /// Snapshot the singleton methods `object` has right now
    fn capture_instance(&self, object: ObjectId) -> Result<Vec<MethodCapture>> {
        let class = self.class_of(object)?;
        let captured_at = Utc::now();
        Ok(self
            .singleton_methods_of(object)?
            .into_iter()
            .map(|(method, body)| MethodCapture {
                class,
                owner: Some(object),
                method,
                body,
                captured_at,
            })
            .collect())
    }

    /// Reinstall a captured body where it was taken from
    fn restore(&self, capture: &MethodCapture) -> Result<()> {
        let source = TreeCodec::new().stringify(&capture.body)?;
        match capture.owner {
            Some(object) => self.install_on_instance(object, &source),
            None => self.install_on_class(capture.class, &source),
        }
    }
}

/// [`Reflection`] over a [`Runtime`]'s world
#[derive(Clone)]
pub struct RuntimeReflector {
    runtime: Runtime,
    translator: Arc<dyn Translator>,
}

impl RuntimeReflector {
    pub fn new(runtime: Runtime) -> Self {
        Self::with_translator(runtime, Arc::new(AstTranslator::new()))
    }

    pub fn with_translator(runtime: Runtime, translator: Arc<dyn Translator>) -> Self {
        Self {
            runtime,
            translator,
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

/// Compile failures during installation surface as reflection errors
fn install_error(target: impl std::fmt::Display, err: VirtkwError) -> VirtkwError {
    match err {
        VirtkwError::Parse(reason) => {
            VirtkwError::reflection(target, format!("source failed to compile: {reason}"))
        }
        other => other,
    }
}

impl Reflection for RuntimeReflector {
    fn subclasses_of(&self, class: ClassId) -> Result<IndexSet<ClassId>> {
        let world = self.runtime.world();
        world.class_name(class)?;
        let mut found: Vec<(String, ClassId)> = Vec::new();
        for id in world.class_ids() {
            if world.is_descendant(id, class) {
                found.push((world.class_name(id)?, id));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found.into_iter().map(|(_, id)| id).collect())
    }

    fn methods_of(&self, class: ClassId) -> Result<IndexMap<String, Node>> {
        let methods = self.runtime.world().declared_methods(class)?;
        Ok(methods
            .into_iter()
            .map(|m| (m.def.name.clone(), self.translator.translate(&m.def)))
            .collect())
    }

    fn instance_methods_of(&self, object: ObjectId) -> Result<IndexMap<String, Node>> {
        let world = self.runtime.world();
        let class = world.class_of(object)?;
        let mut methods = IndexMap::new();
        for declared in world.declared_methods(class)? {
            let name = declared.def.name.clone();
            let current = world.resolve_method(object, &name)?.unwrap_or(declared);
            methods.insert(name, self.translator.translate(&current.def));
        }
        Ok(methods)
    }

    fn singleton_methods_of(&self, object: ObjectId) -> Result<IndexMap<String, Node>> {
        let methods = self.runtime.world().singleton_methods(object)?;
        Ok(methods
            .into_iter()
            .map(|m| (m.def.name.clone(), self.translator.translate(&m.def)))
            .collect())
    }

    fn install_on_class(&self, class: ClassId, source: &str) -> Result<()> {
        let name = self
            .runtime
            .define_method(class, source)
            .map_err(|e| install_error(class, e))?;
        debug!(%class, method = %name, "installed class method");
        Ok(())
    }

    fn install_on_instance(&self, object: ObjectId, source: &str) -> Result<()> {
        let name = self
            .runtime
            .define_singleton_method(object, source)
            .map_err(|e| install_error(object, e))?;
        debug!(%object, method = %name, "installed singleton method");
        Ok(())
    }

    fn class_of(&self, object: ObjectId) -> Result<ClassId> {
        self.runtime.world().class_of(object)
    }

    fn remove_instance_method(&self, object: ObjectId, name: &str) -> Result<bool> {
        self.runtime.world().remove_singleton_method(object, name)
    }
}

impl std::fmt::Debug for RuntimeReflector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeReflector")
            .field("translator", &self.translator.name())
            .finish()
    }
}
