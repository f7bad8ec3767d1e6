//! Live universe of classes and instances
//!
//! Classes carry an ordered method table and an optional parent; instances
//! carry properties and a singleton method table that shadows their class.
//! Everything is held in `DashMap`s so lookups never need `&mut`.

use std::{collections::HashMap, fmt, sync::Arc};

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ast::MethodDef, evaluator::Value, Result, VirtkwError};

/// Class identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassId(pub Uuid);

impl Default for ClassId {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", &self.0.to_string()[..8])
    }
}

/// Instance identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", &self.0.to_string()[..8])
    }
}

/// A method as installed in a table: the compiled definition plus the
/// source text it was compiled from
#[derive(Debug, Clone)]
pub struct InstalledMethod {
    pub def: Arc<MethodDef>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub id: ClassId,
    pub name: String,
    pub parent: Option<ClassId>,
    pub methods: IndexMap<String, InstalledMethod>,
    /// Sealed classes reject method (re)definition
    pub sealed: bool,
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub id: ObjectId,
    pub class: ClassId,
    pub properties: HashMap<String, Value>,
    pub singleton_methods: IndexMap<String, InstalledMethod>,
    /// Frozen instances reject singleton definitions and property writes
    pub frozen: bool,
}

/// Class and instance tables
#[derive(Default)]
pub struct World {
    classes: DashMap<ClassId, ClassDef>,
    class_names: DashMap<String, ClassId>,
    objects: DashMap<ObjectId, Instance>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_class(&self, name: &str, parent: Option<ClassId>) -> Result<ClassId> {
        if self.class_names.contains_key(name) {
            return Err(VirtkwError::reflection(name, "a class with this name already exists"));
        }
        if let Some(parent_id) = parent {
            self.ensure_class(parent_id)?;
        }
        let id = ClassId::new();
        self.classes.insert(
            id,
            ClassDef {
                id,
                name: name.to_string(),
                parent,
                methods: IndexMap::new(),
                sealed: false,
            },
        );
        self.class_names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn class_named(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).map(|id| *id)
    }

    pub fn class_name(&self, class: ClassId) -> Result<String> {
        self.with_class(class, |c| c.name.clone())
    }

    pub fn parent_of(&self, class: ClassId) -> Result<Option<ClassId>> {
        self.with_class(class, |c| c.parent)
    }

    /// All class ids currently defined
    pub fn class_ids(&self) -> Vec<ClassId> {
        self.classes.iter().map(|entry| *entry.key()).collect()
    }

    /// Check whether `class` inherits from `ancestor` (strictly)
    pub fn is_descendant(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = self.parent_of(class).ok().flatten();
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id).ok().flatten();
        }
        false
    }

    pub fn seal_class(&self, class: ClassId) -> Result<()> {
        let mut entry = self
            .classes
            .get_mut(&class)
            .ok_or_else(|| VirtkwError::reflection(class, "unknown class"))?;
        entry.sealed = true;
        Ok(())
    }

    pub fn instantiate(&self, class: ClassId) -> Result<ObjectId> {
        self.ensure_class(class)?;
        let id = ObjectId::new();
        self.objects.insert(
            id,
            Instance {
                id,
                class,
                properties: HashMap::new(),
                singleton_methods: IndexMap::new(),
                frozen: false,
            },
        );
        Ok(id)
    }

    pub fn class_of(&self, object: ObjectId) -> Result<ClassId> {
        self.objects
            .get(&object)
            .map(|o| o.class)
            .ok_or_else(|| VirtkwError::reflection(object, "unknown object"))
    }

    pub fn freeze(&self, object: ObjectId) -> Result<()> {
        let mut entry = self
            .objects
            .get_mut(&object)
            .ok_or_else(|| VirtkwError::reflection(object, "unknown object"))?;
        entry.frozen = true;
        Ok(())
    }

    pub fn get_property(&self, object: ObjectId, name: &str) -> Option<Value> {
        self.objects
            .get(&object)
            .and_then(|o| o.properties.get(name).cloned())
    }

    pub fn set_property(&self, object: ObjectId, name: &str, value: Value) -> Result<()> {
        let mut entry = self
            .objects
            .get_mut(&object)
            .ok_or_else(|| VirtkwError::reflection(object, "unknown object"))?;
        if entry.frozen {
            return Err(VirtkwError::reflection(
                object,
                format!("cannot set property '{name}' on a frozen object"),
            ));
        }
        entry.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// Methods declared directly on `class`, in definition order
    pub fn declared_methods(&self, class: ClassId) -> Result<Vec<InstalledMethod>> {
        self.with_class(class, |c| c.methods.values().cloned().collect())
    }

    pub fn define_method(&self, class: ClassId, method: InstalledMethod) -> Result<()> {
        let mut entry = self
            .classes
            .get_mut(&class)
            .ok_or_else(|| VirtkwError::reflection(class, "unknown class"))?;
        if entry.sealed {
            return Err(VirtkwError::reflection(
                &entry.name,
                "class is sealed against method redefinition",
            ));
        }
        entry.methods.insert(method.def.name.clone(), method);
        Ok(())
    }

    pub fn define_singleton_method(&self, object: ObjectId, method: InstalledMethod) -> Result<()> {
        let mut entry = self
            .objects
            .get_mut(&object)
            .ok_or_else(|| VirtkwError::reflection(object, "unknown object"))?;
        if entry.frozen {
            return Err(VirtkwError::reflection(
                object,
                "object is frozen against singleton definitions",
            ));
        }
        entry.singleton_methods.insert(method.def.name.clone(), method);
        Ok(())
    }

    /// Singleton methods of `object`, in definition order
    pub fn singleton_methods(&self, object: ObjectId) -> Result<Vec<InstalledMethod>> {
        self.objects
            .get(&object)
            .map(|o| o.singleton_methods.values().cloned().collect())
            .ok_or_else(|| VirtkwError::reflection(object, "unknown object"))
    }

    pub fn remove_singleton_method(&self, object: ObjectId, name: &str) -> Result<bool> {
        let mut entry = self
            .objects
            .get_mut(&object)
            .ok_or_else(|| VirtkwError::reflection(object, "unknown object"))?;
        Ok(entry.singleton_methods.shift_remove(name).is_some())
    }

    /// Resolve a method for a receiver: singleton table, class, then ancestors
    pub fn resolve_method(&self, object: ObjectId, name: &str) -> Result<Option<InstalledMethod>> {
        let class = {
            let instance = self
                .objects
                .get(&object)
                .ok_or_else(|| VirtkwError::reflection(object, "unknown object"))?;
            if let Some(method) = instance.singleton_methods.get(name) {
                return Ok(Some(method.clone()));
            }
            instance.class
        };

        let mut current = Some(class);
        while let Some(id) = current {
            let class_def = self
                .classes
                .get(&id)
                .ok_or_else(|| VirtkwError::reflection(id, "unknown class"))?;
            if let Some(method) = class_def.methods.get(name) {
                return Ok(Some(method.clone()));
            }
            current = class_def.parent;
        }
        Ok(None)
    }

    fn ensure_class(&self, class: ClassId) -> Result<()> {
        if self.classes.contains_key(&class) {
            Ok(())
        } else {
            Err(VirtkwError::reflection(class, "unknown class"))
        }
    }

    fn with_class<T>(&self, class: ClassId, f: impl FnOnce(&ClassDef) -> T) -> Result<T> {
        self.classes
            .get(&class)
            .map(|c| f(&c))
            .ok_or_else(|| VirtkwError::reflection(class, "unknown class"))
    }
}
