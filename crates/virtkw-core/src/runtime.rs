//! Host runtime: world, keyword registry, builtin functions and the method
//! compiler behind one cheaply clonable handle.

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ast::MethodDef,
    evaluator::{EvalError, Evaluator, Value},
    parser::{MethodParser, Parser},
    registry::KeywordRegistry,
    world::{ClassId, InstalledMethod, ObjectId, World},
    Result,
};

/// Builtin function callable as `name(args)` from method source
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum nesting of method invocations
    pub max_call_depth: usize,
    /// Emit a trace event for every keyword dispatch
    pub trace_dispatch: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            trace_dispatch: false,
        }
    }
}

struct RuntimeInner {
    world: World,
    registry: Arc<KeywordRegistry>,
    functions: DashMap<String, NativeFunction>,
    parser: Box<dyn Parser>,
    config: RuntimeConfig,
    depth: AtomicUsize,
}

#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(KeywordRegistry::new()), config)
    }

    /// Runtime sharing an existing keyword registry
    pub fn with_registry(registry: Arc<KeywordRegistry>, config: RuntimeConfig) -> Self {
        let runtime = Self {
            inner: Arc::new(RuntimeInner {
                world: World::new(),
                registry,
                functions: DashMap::new(),
                parser: Box::new(MethodParser::new()),
                config,
                depth: AtomicUsize::new(0),
            }),
        };
        runtime.install_builtins();
        runtime
    }

    pub fn world(&self) -> &World {
        &self.inner.world
    }

    pub fn registry(&self) -> &Arc<KeywordRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn parser(&self) -> &dyn Parser {
        self.inner.parser.as_ref()
    }

    /// Register (or replace) a builtin function
    pub fn define_function<F>(&self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.inner
            .functions
            .insert(name.to_string(), Arc::new(function));
    }

    pub fn function(&self, name: &str) -> Option<NativeFunction> {
        self.inner.functions.get(name).map(|f| Arc::clone(f.value()))
    }

    /// Parse method source into a definition
    pub fn compile(&self, source: &str) -> Result<MethodDef> {
        self.inner.parser.parse_method(source)
    }

    /// Compile `source` and install it in `class`'s method table
    pub fn define_method(&self, class: ClassId, source: &str) -> Result<String> {
        let def = self.compile(source)?;
        let name = def.name.clone();
        debug!(%class, method = %name, "defining method");
        self.world().define_method(
            class,
            InstalledMethod {
                def: Arc::new(def),
                source: source.to_string(),
            },
        )?;
        Ok(name)
    }

    /// Compile `source` and install it on one instance only
    pub fn define_singleton_method(&self, object: ObjectId, source: &str) -> Result<String> {
        let def = self.compile(source)?;
        let name = def.name.clone();
        debug!(%object, method = %name, "defining singleton method");
        self.world().define_singleton_method(
            object,
            InstalledMethod {
                def: Arc::new(def),
                source: source.to_string(),
            },
        )?;
        Ok(name)
    }

    /// Invoke `method` on `object`
    pub fn call(&self, object: ObjectId, method: &str, args: Vec<Value>) -> Result<Value> {
        Evaluator::invoke_method(self, object, method, args)
    }

    pub(crate) fn enter_call(&self) -> Result<CallDepthGuard<'_>> {
        let limit = self.inner.config.max_call_depth;
        let depth = self.inner.depth.fetch_add(1, Ordering::SeqCst);
        let guard = CallDepthGuard(&self.inner.depth);
        if depth >= limit {
            return Err(EvalError::DepthExceeded { limit }.into());
        }
        Ok(guard)
    }

    fn install_builtins(&self) {
        self.define_function("length", |args| match args {
            [Value::String(s)] => Ok(Value::Integer(s.chars().count() as i64)),
            [Value::List(items)] => Ok(Value::Integer(items.len() as i64)),
            [other] => Err(EvalError::unary_type_error("length", "string or list", other.type_name()).into()),
            _ => Err(EvalError::Runtime("length expects one argument".to_string()).into()),
        });
        self.define_function("tostr", |args| {
            Ok(Value::String(args.iter().map(Value::to_string).collect()))
        });
        self.define_function("typeof", |args| match args {
            [value] => Ok(Value::String(value.type_name().to_string())),
            _ => Err(EvalError::Runtime("typeof expects one argument".to_string()).into()),
        });
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("parser", &self.inner.parser.name())
            .field("functions", &self.inner.functions.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Decrements the call depth when an invocation ends
pub(crate) struct CallDepthGuard<'a>(&'a AtomicUsize);

impl Drop for CallDepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
