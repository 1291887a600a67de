//! Concurrent insert/verify workload.
//!
//! Each operation runs on the blocking pool with its own [`CallContext`], so
//! operations switch targets independently of one another. A semaphore bounds
//! how many run at once.

use std::sync::Arc;
use std::time::Instant;

use routed_mappers::CallContext;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::WorkloadConfig;
use crate::mappers::MapperError;
use crate::service::{ServiceError, TransactionTestService};

/// Outcome of a workload run.
#[derive(Debug, Default, Serialize)]
pub struct WorkloadReport {
    pub succeeded: usize,
    pub failed: usize,
    pub duplicate_key_propagated: Option<bool>,
    pub elapsed_ms: u64,
}

pub async fn run(
    service: TransactionTestService,
    config: &WorkloadConfig,
) -> anyhow::Result<WorkloadReport> {
    let start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
    let mut tasks = JoinSet::new();

    for i in 0..config.operations {
        let id = i32::try_from(i + 1)?;
        let service = service.clone();
        let permit = Arc::clone(&semaphore).acquire_owned().await?;

        let span = tracing::info_span!("operation", id = id);
        tasks.spawn(
            async move {
                let result = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let mut ctx = CallContext::new();
                    service.test_insert(&mut ctx, id)?;
                    service.verify_insert(&mut ctx, id)
                })
                .await;
                (id, result)
            }
            .instrument(span),
        );
    }

    let mut report = WorkloadReport::default();
    while let Some(joined) = tasks.join_next().await {
        let (id, result) = joined?;
        match result? {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(id = id, error = %e, "Operation failed");
            }
        }
    }

    if config.duplicate_check {
        let id = i32::try_from(config.operations + 1)?;
        let result = tokio::task::spawn_blocking(move || {
            let mut ctx = CallContext::new();
            service.verify_not_insert(&mut ctx, id)?;
            Ok::<_, ServiceError>(service.test_insert_multiple_mappers(&mut ctx, id))
        })
        .await??;
        report.duplicate_key_propagated = Some(check_duplicate(id, result));
    }

    report.elapsed_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

fn check_duplicate(id: i32, result: Result<(), MapperError>) -> bool {
    match result {
        Err(MapperError::DuplicateKey { database, table, .. }) => {
            tracing::info!(
                id = id,
                database = %database,
                table = %table,
                "Duplicate key surfaced unchanged; a coordinator would roll back here"
            );
            true
        }
        Err(e) => {
            tracing::warn!(id = id, error = %e, "Multi-mapper flow failed with an unexpected error");
            false
        }
        Ok(()) => {
            tracing::warn!(id = id, "Multi-mapper flow did not hit the duplicate key");
            false
        }
    }
}
