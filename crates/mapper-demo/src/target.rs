//! Routing targets: the databases a mapper call can reach.

use std::fmt;

use routed_mappers::RoutingKey;
use serde::{Deserialize, Serialize};

/// Database a routed mapper call is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Db1,
    Db2,
}

impl RoutingKey for Target {
    fn all() -> &'static [Self] {
        &[Target::Db1, Target::Db2]
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Db1 => f.write_str("DB1"),
            Target::Db2 => f.write_str("DB2"),
        }
    }
}
