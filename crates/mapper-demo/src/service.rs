//! Transaction test service: writes and verifies rows on both databases
//! through the routed mappers.
//!
//! Every operation takes the caller's [`CallContext`] and sets the target
//! before each routed call. Rollback across databases belongs to a
//! distributed-transaction coordinator; this service only surfaces the
//! backend's error unchanged so such a coordinator could react to it.

use std::sync::Arc;

use routed_mappers::{
    CallContext, ConfigurationError, RoutedProxies, RoutedProxyBuilder, RoutingError,
    TargetRegistry,
};
use thiserror::Error;

use crate::backend::{Database, SessionFactory};
use crate::config::DatabaseConfig;
use crate::mappers::{MapperError, MapperOne, MapperTwo, MessagePayload, RoutedMapperOne, RoutedMapperTwo};
use crate::target::Target;

pub type Proxies = RoutedProxies<Target, SessionFactory>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error("verification failed for id {id}: {reason}")]
    Verification { id: i32, reason: String },
}

/// Build one session factory per configured database and publish the routed
/// mappers over them.
pub fn build_proxies(databases: &[DatabaseConfig]) -> Result<Proxies, ConfigurationError> {
    let mut builder = TargetRegistry::<Target, SessionFactory>::builder()
        .interface::<dyn MapperOne>()
        .interface::<dyn MapperTwo>();

    for db in databases {
        let database = Arc::new(Database::new(db.name.clone()));
        builder = builder.backend(db.key, SessionFactory::new(database));
    }

    RoutedProxyBuilder::new(builder.build()?).build()
}

#[derive(Clone)]
pub struct TransactionTestService {
    mapper_one: RoutedMapperOne<Target, SessionFactory>,
    mapper_two: RoutedMapperTwo<Target, SessionFactory>,
}

impl TransactionTestService {
    pub fn new(proxies: &Proxies) -> Result<Self, RoutingError> {
        Ok(Self {
            mapper_one: proxies.get()?,
            mapper_two: proxies.get()?,
        })
    }

    /// Targets each mapper has materialized so far, by interface name.
    pub fn materialized_targets(&self) -> Vec<(&'static str, Vec<Target>)> {
        let one = self.mapper_one.handler();
        let two = self.mapper_two.handler();
        vec![
            (one.descriptor().name, one.entry().materialized_keys()),
            (two.descriptor().name, two.entry().materialized_keys()),
        ]
    }

    /// Insert `id` into DB1 and DB2 through the first mapper.
    pub fn test_insert(&self, ctx: &mut CallContext<Target>, id: i32) -> Result<(), MapperError> {
        tracing::info!(id = id, correlation_id = %ctx.correlation_id(), "Inserting entry on both databases");

        ctx.set(Target::Db1);
        self.mapper_one
            .insert_data_with_proc(ctx, &MessagePayload::new(id, "database1"))?;
        ctx.set(Target::Db2);
        self.mapper_one
            .insert_data_with_proc(ctx, &MessagePayload::new(id, "database2"))
    }

    /// Check that [`Self::test_insert`] wrote the expected row to each database.
    pub fn verify_insert(&self, ctx: &mut CallContext<Target>, id: i32) -> Result<(), ServiceError> {
        for (target, expected) in [(Target::Db1, "database1"), (Target::Db2, "database2")] {
            ctx.set(target);
            match self.mapper_one.select_data_from_proc(ctx, id)? {
                Some(row) if row.message == expected => {}
                Some(row) => {
                    return Err(ServiceError::Verification {
                        id,
                        reason: format!("{target} holds {:?}, expected {expected:?}", row.message),
                    })
                }
                None => {
                    return Err(ServiceError::Verification {
                        id,
                        reason: format!("data was not inserted into {target}"),
                    })
                }
            }
        }
        Ok(())
    }

    /// Check that neither database holds `id` in either mapper's table.
    pub fn verify_not_insert(&self, ctx: &mut CallContext<Target>, id: i32) -> Result<(), ServiceError> {
        for target in [Target::Db2, Target::Db1] {
            ctx.set(target);
            let found = self.mapper_one.select_data_from_proc(ctx, id)?.is_some()
                || self.mapper_two.select_data_from_proc(ctx, id)?.is_some();
            if found {
                return Err(ServiceError::Verification {
                    id,
                    reason: format!("unexpected row in {target}"),
                });
            }
        }
        Ok(())
    }

    /// Write `id` through both mappers on both databases, then repeat the
    /// last write. The final insert violates the unique key and its error is
    /// returned exactly as the backend raised it.
    pub fn test_insert_multiple_mappers(
        &self,
        ctx: &mut CallContext<Target>,
        id: i32,
    ) -> Result<(), MapperError> {
        tracing::info!(id = id, correlation_id = %ctx.correlation_id(), "Inserting entry through both mappers");

        ctx.set(Target::Db1);
        self.mapper_one
            .insert_data_with_proc(ctx, &MessagePayload::new(id, "database1"))?;

        ctx.set(Target::Db2);
        self.mapper_one
            .insert_data_with_proc(ctx, &MessagePayload::new(id, "database2"))?;

        ctx.set(Target::Db1);
        self.mapper_two
            .insert_data_with_proc(ctx, &MessagePayload::new(id, "database1"))?;

        ctx.set(Target::Db2);
        self.mapper_two
            .insert_data_with_proc(ctx, &MessagePayload::new(id, "database2"))?;

        // Same key still set: duplicate id on DB2.
        self.mapper_two
            .insert_data_with_proc(ctx, &MessagePayload::new(id, "database2"))
    }
}
