//! Per-interface cache of materialized targets.
//!
//! Every key gets its slot when the entry is created; a slot's target is
//! built on first use through `OnceCell::get_or_try_init`, so concurrent
//! first calls for the same key construct it at most once. Targets are never
//! evicted. A failed materialization leaves the slot empty.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;

use crate::error::RoutingError;
use crate::interface::{BackendFactory, InterfaceDescriptor, RoutedInterface};
use crate::key::RoutingKey;
use crate::stats::RoutingStats;

struct TargetSlot<I: ?Sized, H> {
    backend: Arc<H>,
    target: OnceCell<Arc<I>>,
}

/// Routing key to lazily materialized implementation, for one interface.
pub struct ProxyEntry<I: ?Sized, K, H> {
    descriptor: &'static InterfaceDescriptor,
    slots: HashMap<K, TargetSlot<I, H>>,
}

impl<I, K, H> ProxyEntry<I, K, H>
where
    I: RoutedInterface + ?Sized,
    K: RoutingKey,
    H: BackendFactory<I>,
{
    pub fn new(backends: &HashMap<K, Arc<H>>) -> Self {
        let slots = backends
            .iter()
            .map(|(key, backend)| {
                (
                    *key,
                    TargetSlot {
                        backend: Arc::clone(backend),
                        target: OnceCell::new(),
                    },
                )
            })
            .collect();

        Self {
            descriptor: I::descriptor(),
            slots,
        }
    }

    /// Return the target for `key`, materializing it on first use.
    pub fn get_or_materialize(&self, key: K, stats: &RoutingStats) -> Result<Arc<I>, RoutingError> {
        let slot = self.slots.get(&key).ok_or_else(|| RoutingError::UnknownKey {
            interface: self.descriptor.name,
            key: key.to_string(),
        })?;

        let target = slot.target.get_or_try_init(|| {
            let span =
                routed_tracing::materialize_span!(self.descriptor.name, key, slot.backend.name());
            let _enter = span.enter();
            let start = Instant::now();

            match slot.backend.materialize(self.descriptor) {
                Ok(target) => {
                    span.record("latency_us", start.elapsed().as_micros() as u64);
                    stats.inc_materializations();
                    tracing::info!(
                        interface = self.descriptor.name,
                        key = %key,
                        backend = slot.backend.name(),
                        "Materialized routed target"
                    );
                    Ok(target)
                }
                Err(source) => {
                    stats.inc_resolution_failures();
                    tracing::warn!(
                        interface = self.descriptor.name,
                        key = %key,
                        backend = slot.backend.name(),
                        error = %source,
                        "Failed to materialize routed target"
                    );
                    Err(RoutingError::TargetResolution {
                        interface: self.descriptor.name,
                        key: key.to_string(),
                        source,
                    })
                }
            }
        })?;

        Ok(Arc::clone(target))
    }

    pub fn is_materialized(&self, key: K) -> bool {
        self.slots
            .get(&key)
            .is_some_and(|slot| slot.target.get().is_some())
    }

    /// Keys whose target has been materialized, in [`RoutingKey::all`] order.
    pub fn materialized_keys(&self) -> Vec<K> {
        K::all()
            .iter()
            .copied()
            .filter(|key| self.is_materialized(*key))
            .collect()
    }
}

impl<I: ?Sized, K: RoutingKey, H> fmt::Debug for ProxyEntry<I, K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEntry")
            .field("interface", &self.descriptor.name)
            .field("keys", &self.slots.len())
            .finish()
    }
}
