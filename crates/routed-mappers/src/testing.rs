//! Test fixtures: a two-key routing set and an in-memory `Store` backend.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::error::{BoxError, RoutingError};
use crate::interface::{BackendFactory, BackendHandle, InterfaceDescriptor, RoutedInterface};
use crate::key::RoutingKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    A,
    B,
}

impl RoutingKey for Backend {
    fn all() -> &'static [Self] {
        &[Backend::A, Backend::B]
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::A => f.write_str("A"),
            Backend::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("duplicate id {id} on backend {backend}")]
    Duplicate { id: u32, backend: String },
}

crate::routed_interface! {
    pub trait Store => RoutedStore {
        #[statement(Insert, "INSERT INTO store (id, msg) VALUES (#{id}, #{msg})")]
        fn put(&self, id: u32, msg: String) -> Result<(), StoreError>;

        #[statement(Select, "SELECT msg FROM store WHERE id = #{id}")]
        fn get(&self, id: u32) -> Result<Option<String>, StoreError>;
    }
}

/// An interface with no methods; never passes validation.
pub trait Empty: Send + Sync + 'static {}

impl RoutedInterface for dyn Empty {
    fn descriptor() -> &'static InterfaceDescriptor {
        static DESCRIPTOR: InterfaceDescriptor = InterfaceDescriptor {
            name: "Empty",
            methods: &[],
        };
        &DESCRIPTOR
    }
}

#[derive(Default)]
struct BackendState {
    rows: Mutex<BTreeMap<u32, String>>,
    registered: Mutex<Vec<&'static str>>,
    constructed: AtomicUsize,
    calls: AtomicUsize,
    unreachable: AtomicBool,
    reject_registrations: AtomicBool,
}

/// Backend handle whose clones share state, so tests can observe it.
#[derive(Clone)]
pub struct MemoryBackend {
    name: &'static str,
    delay: Duration,
    state: Arc<BackendState>,
}

impl MemoryBackend {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            delay: Duration::ZERO,
            state: Arc::default(),
        }
    }

    /// Slow down materialization to widen the first-use race window.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn reject_registrations(&self, reject: bool) {
        self.state.reject_registrations.store(reject, Ordering::SeqCst);
    }

    pub fn constructed(&self) -> usize {
        self.state.constructed.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.state.rows.lock().unwrap().keys().copied().collect()
    }

    pub fn registered(&self) -> Vec<&'static str> {
        self.state.registered.lock().unwrap().clone()
    }
}

impl BackendHandle for MemoryBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn register_interface(&self, descriptor: &'static InterfaceDescriptor) -> Result<(), BoxError> {
        if self.state.reject_registrations.load(Ordering::SeqCst) {
            return Err(format!("{} refuses {}", self.name, descriptor.name).into());
        }
        self.state.registered.lock().unwrap().push(descriptor.name);
        Ok(())
    }
}

impl BackendFactory<dyn Store> for MemoryBackend {
    fn materialize(&self, _descriptor: &'static InterfaceDescriptor) -> Result<Arc<dyn Store>, BoxError> {
        self.state.constructed.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(format!("backend {} unreachable", self.name).into());
        }
        Ok(Arc::new(MemoryStore {
            backend: self.name,
            state: Arc::clone(&self.state),
        }))
    }
}

impl BackendFactory<dyn Empty> for MemoryBackend {
    fn materialize(&self, _descriptor: &'static InterfaceDescriptor) -> Result<Arc<dyn Empty>, BoxError> {
        Err("empty interface has no implementation".into())
    }
}

struct MemoryStore {
    backend: &'static str,
    state: Arc<BackendState>,
}

impl Store for MemoryStore {
    fn put(&self, id: u32, msg: String) -> Result<(), StoreError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.state.rows.lock().unwrap();
        if rows.contains_key(&id) {
            return Err(StoreError::Duplicate {
                id,
                backend: self.backend.to_string(),
            });
        }
        rows.insert(id, msg);
        Ok(())
    }

    fn get(&self, id: u32) -> Result<Option<String>, StoreError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.rows.lock().unwrap().get(&id).cloned())
    }
}
