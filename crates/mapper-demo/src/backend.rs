//! In-memory statement executor standing in for a real database.
//!
//! A [`SessionFactory`] wraps one [`Database`]. Registering an interface binds
//! each method's `CALL PROCEDURE(...)` statement to a table; materializing
//! the interface hands out a [`StatementMapper`] that executes those bound
//! statements. Tables enforce a unique id, so a repeated insert fails with
//! [`MapperError::DuplicateKey`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use routed_mappers::{
    BackendFactory, BackendHandle, BoxError, InterfaceDescriptor, StatementKind,
};

use crate::mappers::{MapperError, MapperOne, MapperTwo, MessagePayload};

/// A named database holding one table per stored-procedure family.
#[derive(Debug)]
pub struct Database {
    name: String,
    tables: Mutex<HashMap<String, BTreeMap<i32, String>>>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, table: &str, payload: &MessagePayload) -> Result<(), MapperError> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&payload.id) {
            return Err(MapperError::DuplicateKey {
                database: self.name.clone(),
                table: table.to_string(),
                id: payload.id,
            });
        }
        rows.insert(payload.id, payload.message.clone());
        Ok(())
    }

    fn select(&self, table: &str, id: i32) -> Option<MessagePayload> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables
            .get(table)
            .and_then(|rows| rows.get(&id))
            .map(|message| MessagePayload::new(id, message.clone()))
    }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.get(table).map_or(0, BTreeMap::len)
    }
}

/// A mapper method bound to a stored procedure and its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundStatement {
    pub method: &'static str,
    pub kind: StatementKind,
    pub procedure: String,
    pub table: String,
}

impl BoundStatement {
    /// Parse `CALL INSERT_DATA_1(...)` into procedure `INSERT_DATA_1` on table `DATA_1`.
    fn bind(method: &'static str, kind: StatementKind, statement: &str) -> Result<Self, BoxError> {
        let call = statement
            .trim()
            .strip_prefix("CALL ")
            .ok_or_else(|| format!("{method}: only CALL statements are supported"))?;
        let procedure = call
            .split('(')
            .next()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| format!("{method}: missing procedure name"))?;

        let prefix = match kind {
            StatementKind::Insert => "INSERT_",
            StatementKind::Select => "SELECT_",
            StatementKind::Update => "UPDATE_",
            StatementKind::Delete => "DELETE_",
        };
        let table = procedure.strip_prefix(prefix).ok_or_else(|| {
            format!("{method}: procedure {procedure} does not match statement kind {kind:?}")
        })?;

        Ok(Self {
            method,
            kind,
            procedure: procedure.to_string(),
            table: table.to_string(),
        })
    }
}

/// Backend handle for one database.
pub struct SessionFactory {
    database: Arc<Database>,
    bound: Mutex<HashMap<&'static str, Arc<Vec<BoundStatement>>>>,
    materialized: AtomicU64,
}

impl SessionFactory {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            bound: Mutex::new(HashMap::new()),
            materialized: AtomicU64::new(0),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// How many mapper instances this factory has produced.
    pub fn materialized(&self) -> u64 {
        self.materialized.load(Ordering::Relaxed)
    }

    fn mapper(&self, descriptor: &'static InterfaceDescriptor) -> Result<Arc<StatementMapper>, BoxError> {
        let statements = self
            .bound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(descriptor.name)
            .cloned()
            .ok_or_else(|| {
                format!(
                    "interface {} is not registered with {}",
                    descriptor.name,
                    self.database.name()
                )
            })?;

        self.materialized.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(StatementMapper {
            interface: descriptor.name,
            database: Arc::clone(&self.database),
            statements,
        }))
    }
}

impl BackendHandle for SessionFactory {
    fn name(&self) -> &str {
        self.database.name()
    }

    fn register_interface(&self, descriptor: &'static InterfaceDescriptor) -> Result<(), BoxError> {
        let statements = descriptor
            .methods
            .iter()
            .map(|m| BoundStatement::bind(m.name, m.kind, m.statement))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            database = %self.database.name(),
            interface = descriptor.name,
            statements = statements.len(),
            "Bound mapper statements"
        );

        self.bound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(descriptor.name, Arc::new(statements));
        Ok(())
    }
}

impl BackendFactory<dyn MapperOne> for SessionFactory {
    fn materialize(&self, descriptor: &'static InterfaceDescriptor) -> Result<Arc<dyn MapperOne>, BoxError> {
        let mapper: Arc<dyn MapperOne> = self.mapper(descriptor)?;
        Ok(mapper)
    }
}

impl BackendFactory<dyn MapperTwo> for SessionFactory {
    fn materialize(&self, descriptor: &'static InterfaceDescriptor) -> Result<Arc<dyn MapperTwo>, BoxError> {
        let mapper: Arc<dyn MapperTwo> = self.mapper(descriptor)?;
        Ok(mapper)
    }
}

/// Executes an interface's bound statements against one database.
pub struct StatementMapper {
    interface: &'static str,
    database: Arc<Database>,
    statements: Arc<Vec<BoundStatement>>,
}

impl StatementMapper {
    fn statement(&self, method: &'static str) -> Result<&BoundStatement, MapperError> {
        self.statements
            .iter()
            .find(|s| s.method == method)
            .ok_or_else(|| MapperError::UnboundStatement {
                database: self.database.name().to_string(),
                interface: self.interface,
                method,
            })
    }

    fn insert(&self, method: &'static str, data: &MessagePayload) -> Result<(), MapperError> {
        let statement = self.statement(method)?;
        tracing::trace!(procedure = %statement.procedure, kind = ?statement.kind, id = data.id, "Executing insert");
        self.database.insert(&statement.table, data)
    }

    fn select(&self, method: &'static str, id: i32) -> Result<Option<MessagePayload>, MapperError> {
        let statement = self.statement(method)?;
        tracing::trace!(procedure = %statement.procedure, kind = ?statement.kind, id = id, "Executing select");
        Ok(self.database.select(&statement.table, id))
    }
}

impl MapperOne for StatementMapper {
    fn insert_data_with_proc(&self, data: &MessagePayload) -> Result<(), MapperError> {
        self.insert("insert_data_with_proc", data)
    }

    fn select_data_from_proc(&self, id: i32) -> Result<Option<MessagePayload>, MapperError> {
        self.select("select_data_from_proc", id)
    }
}

impl MapperTwo for StatementMapper {
    fn insert_data_with_proc(&self, data: &MessagePayload) -> Result<(), MapperError> {
        self.insert("insert_data_with_proc", data)
    }

    fn select_data_from_proc(&self, id: i32) -> Result<Option<MessagePayload>, MapperError> {
        self.select("select_data_from_proc", id)
    }
}
