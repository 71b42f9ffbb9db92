//! Format adapters and their registry

use super::adapters::{JsonAdapter, TomlAdapter, XmlAdapter, YamlAdapter};
use crate::error::{Error, Result};
use crate::value::Value;
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Priority the built-in adapters are registered with
pub const DEFAULT_ADAPTER_PRIORITY: i32 = 0;

/// Converts between a file format and a configuration tree
pub trait Adapter {
    fn name(&self) -> &'static str;

    /// Whether this adapter handles `uri`, usually judged by extension
    fn supports(&self, uri: &str) -> bool;

    fn decode(&self, text: &str) -> Result<Value>;

    /// Encode a materialized tree
    fn encode(&self, tree: &Value) -> Result<String>;

    fn read(&self, path: &Path) -> Result<Value> {
        let text = fs::read_to_string(path)?;
        self.decode(&text)
    }

    fn write(&self, path: &Path, tree: &Value) -> Result<()> {
        let text = self.encode(tree)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(())
    }
}

/// Case-insensitive extension check shared by the built-in adapters
pub fn has_extension(uri: &str, extensions: &[&str]) -> bool {
    Path::new(uri)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

#[derive(Clone, Copy)]
struct Registration {
    priority: i32,
    type_id: TypeId,
    create: fn() -> Rc<dyn Adapter>,
}

fn create<A: Adapter + Default + 'static>() -> Rc<dyn Adapter> {
    Rc::new(A::default())
}

/// Picks the adapter for a source
///
/// Adapters are consulted by descending priority, ties in registration
/// order. Each adapter type is instantiated once, on first use.
pub struct AdapterManager {
    registrations: Vec<Registration>,
    instances: RefCell<HashMap<TypeId, Rc<dyn Adapter>>>,
}

impl AdapterManager {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            instances: RefCell::new(HashMap::new()),
        }
    }

    /// JSON, YAML, TOML and XML
    pub fn with_defaults() -> Self {
        let mut manager = Self::new();
        manager
            .register::<JsonAdapter>(DEFAULT_ADAPTER_PRIORITY)
            .register::<YamlAdapter>(DEFAULT_ADAPTER_PRIORITY)
            .register::<TomlAdapter>(DEFAULT_ADAPTER_PRIORITY)
            .register::<XmlAdapter>(DEFAULT_ADAPTER_PRIORITY);
        manager
    }

    pub fn register<A: Adapter + Default + 'static>(&mut self, priority: i32) -> &mut Self {
        debug!("Registering adapter {} at priority {}", std::any::type_name::<A>(), priority);
        self.registrations.push(Registration {
            priority,
            type_id: TypeId::of::<A>(),
            create: create::<A>,
        });
        // Stable sort keeps registration order among equal priorities
        self.registrations.sort_by(|a, b| b.priority.cmp(&a.priority));
        self
    }

    /// The adapter that handles `uri`
    pub fn adapter(&self, uri: &str) -> Result<Rc<dyn Adapter>> {
        for registration in &self.registrations {
            let adapter = self.instance(registration);
            if adapter.supports(uri) {
                return Ok(adapter);
            }
        }
        Err(Error::NoAdapter(uri.to_string()))
    }

    pub fn supports(&self, uri: &str) -> bool {
        self.adapter(uri).is_ok()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    fn instance(&self, registration: &Registration) -> Rc<dyn Adapter> {
        let mut instances = self.instances.borrow_mut();
        Rc::clone(
            instances
                .entry(registration.type_id)
                .or_insert_with(registration.create),
        )
    }
}

impl Clone for AdapterManager {
    fn clone(&self) -> Self {
        Self {
            registrations: self.registrations.clone(),
            instances: RefCell::new(HashMap::new()),
        }
    }
}

impl Default for AdapterManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for AdapterManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterManager")
            .field("registrations", &self.registrations.len())
            .field("instantiated", &self.instances.borrow().len())
            .finish()
    }
}
