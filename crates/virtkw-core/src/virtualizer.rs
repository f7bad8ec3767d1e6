/*!
# Virtualizer

Ties the pipeline together for a fixed set of targets:

1. register the behavior for every target
2. read each target's methods as structural nodes
3. rewrite them for one keyword and turn them back into source
4. install the source (as singleton methods for instance targets)

Subclass targets are resolved once, when the virtualizer is built. Classes
defined later are not picked up.
*/

use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    behaviors,
    codec::TreeCodec,
    evaluator::{Thunk, Value},
    reflection::{MethodCapture, Reflection, RuntimeReflector},
    registry::{Behavior, Keyword, KeywordRegistry, Target},
    rewrite::{KeywordRewriter, RewriterSet},
    runtime::Runtime,
    world::{ClassId, ObjectId},
    Result,
};

/// Which classes and instances to virtualize, and with which rewriters
#[derive(Debug, Clone, Default)]
pub struct VirtualizerConfig {
    classes: IndexSet<ClassId>,
    instances: IndexSet<ObjectId>,
    subclasses_of: IndexSet<ClassId>,
    rewriters: RewriterSet,
}

impl VirtualizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_classes(mut self, classes: impl IntoIterator<Item = ClassId>) -> Self {
        self.classes.extend(classes);
        self
    }

    pub fn for_instances(mut self, instances: impl IntoIterator<Item = ObjectId>) -> Self {
        self.instances.extend(instances);
        self
    }

    /// Target every live descendant of these classes (not the classes themselves)
    pub fn for_subclasses_of(mut self, bases: impl IntoIterator<Item = ClassId>) -> Self {
        self.subclasses_of.extend(bases);
        self
    }

    /// Replace the rewriter for the rewriter's keyword
    pub fn with_rewriter(mut self, rewriter: Arc<dyn KeywordRewriter>) -> Self {
        self.rewriters = self.rewriters.with(rewriter);
        self
    }

    pub fn with_rewriters(mut self, rewriters: RewriterSet) -> Self {
        self.rewriters = rewriters;
        self
    }
}

/// Result of one `virtualize` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualizationSummary {
    pub keyword: Keyword,
    pub classes: usize,
    pub instances: usize,
    /// Methods in which at least one construct was replaced
    pub methods_rewritten: usize,
    pub methods_installed: usize,
}

impl VirtualizationSummary {
    pub fn new(keyword: Keyword) -> Self {
        Self {
            keyword,
            classes: 0,
            instances: 0,
            methods_rewritten: 0,
            methods_installed: 0,
        }
    }
}

pub struct Virtualizer {
    classes: IndexSet<ClassId>,
    instances: IndexSet<ObjectId>,
    rewriters: RewriterSet,
    reflection: Arc<dyn Reflection>,
    registry: Arc<KeywordRegistry>,
    codec: TreeCodec,
    /// Registrations made by this virtualizer, undone by `restore`
    registered: Mutex<Vec<(Target, Keyword, Behavior)>>,
}

impl Virtualizer {
    /// Virtualizer over a runtime's world and registry
    pub fn new(runtime: &Runtime, config: VirtualizerConfig) -> Result<Self> {
        Self::with_parts(
            config,
            Arc::new(RuntimeReflector::new(runtime.clone())),
            Arc::clone(runtime.registry()),
        )
    }

    pub fn with_parts(
        config: VirtualizerConfig,
        reflection: Arc<dyn Reflection>,
        registry: Arc<KeywordRegistry>,
    ) -> Result<Self> {
        let bases: Vec<ClassId> = config.subclasses_of.iter().copied().collect();
        let mut classes = config.classes;
        classes.extend(reflection.subclasses_of_many(&bases)?);
        debug!(
            classes = classes.len(),
            instances = config.instances.len(),
            "resolved virtualization targets"
        );
        Ok(Self {
            classes,
            instances: config.instances,
            rewriters: config.rewriters,
            reflection,
            registry,
            codec: TreeCodec::new(),
            registered: Mutex::new(Vec::new()),
        })
    }

    /// Class targets, explicit ones first, then resolved subclasses
    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.classes.iter().copied()
    }

    pub fn instances(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.instances.iter().copied()
    }

    /// Route `keyword` through `behavior` for every target
    pub fn virtualize(&self, keyword: Keyword, behavior: Behavior) -> Result<VirtualizationSummary> {
        let mut summary = VirtualizationSummary::new(keyword);

        for &object in &self.instances {
            self.register(Target::Instance(object), keyword, &behavior);
            let methods = self.reflection.instance_methods_of(object)?;
            let sources = self.prepare(keyword, methods.values(), &mut summary)?;
            for source in &sources {
                self.reflection.install_on_instance(object, source)?;
            }
            summary.methods_installed += sources.len();
            summary.instances += 1;
        }

        for &class in &self.classes {
            self.register(Target::Class(class), keyword, &behavior);
            let methods = self.reflection.methods_of(class)?;
            let sources = self.prepare(keyword, methods.values(), &mut summary)?;
            for source in &sources {
                self.reflection.install_on_class(class, source)?;
            }
            summary.methods_installed += sources.len();
            summary.classes += 1;
        }

        info!(
            %keyword,
            classes = summary.classes,
            instances = summary.instances,
            rewritten = summary.methods_rewritten,
            installed = summary.methods_installed,
            "virtualized keyword"
        );
        Ok(summary)
    }

    fn register(&self, target: Target, keyword: Keyword, behavior: &Behavior) {
        self.registry.register(target, keyword, behavior.clone());
        self.registered
            .lock()
            .push((target, keyword, behavior.clone()));
    }

    /// Rewrite and stringify a whole method table before anything is installed
    fn prepare<'a>(
        &self,
        keyword: Keyword,
        bodies: impl Iterator<Item = &'a crate::node::Node>,
        summary: &mut VirtualizationSummary,
    ) -> Result<Vec<String>> {
        let mut sources = Vec::new();
        for body in bodies {
            let rewritten = self.rewriters.rewrite(keyword, body)?;
            if rewritten != *body {
                summary.methods_rewritten += 1;
            }
            sources.push(self.codec.stringify(&rewritten)?);
        }
        Ok(sources)
    }

    /// `behavior(condition, then, else)`
    pub fn virtual_if<F>(&self, behavior: F) -> Result<VirtualizationSummary>
    where
        F: Fn(&Thunk, &Thunk, &Thunk) -> Result<Value> + Send + Sync + 'static,
    {
        self.virtualize(
            Keyword::If,
            Behavior::new(move |thunks| {
                let [condition, then_branch, else_branch] =
                    behaviors::operands::<3>(Keyword::If, thunks)?;
                behavior(condition, then_branch, else_branch)
            }),
        )
    }

    /// `behavior(left, right)`
    pub fn virtual_and<F>(&self, behavior: F) -> Result<VirtualizationSummary>
    where
        F: Fn(&Thunk, &Thunk) -> Result<Value> + Send + Sync + 'static,
    {
        self.virtualize(Keyword::And, binary_behavior(Keyword::And, behavior))
    }

    /// `behavior(left, right)`
    pub fn virtual_or<F>(&self, behavior: F) -> Result<VirtualizationSummary>
    where
        F: Fn(&Thunk, &Thunk) -> Result<Value> + Send + Sync + 'static,
    {
        self.virtualize(Keyword::Or, binary_behavior(Keyword::Or, behavior))
    }

    /// `behavior(condition, body)`; see [`behaviors::drive_while`] for the
    /// signal protocol a loop behavior has to follow
    pub fn virtual_while<F>(&self, behavior: F) -> Result<VirtualizationSummary>
    where
        F: Fn(&Thunk, &Thunk) -> Result<Value> + Send + Sync + 'static,
    {
        self.virtualize(Keyword::While, binary_behavior(Keyword::While, behavior))
    }

    /// Snapshot the methods of every class a target draws its methods from,
    /// plus the singleton methods each instance target already has
    pub fn capture(&self) -> Result<Vec<MethodCapture>> {
        let mut sources: IndexSet<ClassId> = self.classes.clone();
        for &object in &self.instances {
            sources.insert(self.reflection.class_of(object)?);
        }
        let mut captures = Vec::new();
        for class in sources {
            captures.extend(self.reflection.capture(class)?);
        }
        for &object in &self.instances {
            captures.extend(self.reflection.capture_instance(object)?);
        }
        Ok(captures)
    }

    /// Undo virtualization: reinstall captured class methods on class
    /// targets and captured singletons on instance targets, drop the
    /// singletons virtualization added, and unregister the behaviors this
    /// virtualizer registered (entries since replaced by someone else stay).
    /// Running it twice is harmless.
    pub fn restore(&self, captures: &[MethodCapture]) -> Result<()> {
        for capture in captures {
            let targeted = match capture.owner {
                Some(object) => self.instances.contains(&object),
                None => self.classes.contains(&capture.class),
            };
            if targeted {
                self.reflection.restore(capture)?;
            }
        }

        for &object in &self.instances {
            let class = self.reflection.class_of(object)?;
            let added = captures.iter().filter(|c| {
                c.owner.is_none()
                    && c.class == class
                    && !captures
                        .iter()
                        .any(|o| o.owner == Some(object) && o.method == c.method)
            });
            for capture in added {
                self.reflection.remove_instance_method(object, &capture.method)?;
            }
        }

        let registered = std::mem::take(&mut *self.registered.lock());
        let mut removed = 0;
        for (target, keyword, behavior) in &registered {
            if self.registry.unregister_behavior(*target, *keyword, behavior) {
                removed += 1;
            }
        }
        info!(
            captures = captures.len(),
            unregistered = removed,
            "restored original methods"
        );
        Ok(())
    }
}

fn binary_behavior<F>(keyword: Keyword, behavior: F) -> Behavior
where
    F: Fn(&Thunk, &Thunk) -> Result<Value> + Send + Sync + 'static,
{
    Behavior::new(move |thunks| {
        let [left, right] = behaviors::operands::<2>(keyword, thunks)?;
        behavior(left, right)
    })
}

impl std::fmt::Debug for Virtualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Virtualizer")
            .field("classes", &self.classes)
            .field("instances", &self.instances)
            .field("rewriters", &self.rewriters)
            .finish()
    }
}
