//! Routing keys.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// A value selecting which backend a routed call reaches.
///
/// The key set is closed: [`RoutingKey::all`] lists every key that can ever be
/// supplied, so backend coverage is checked when the registry is built rather
/// than on the first call.
pub trait RoutingKey: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static {
    /// Every key the system routes on.
    fn all() -> &'static [Self];
}
