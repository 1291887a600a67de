//! Routed mapper interfaces. Each method calls a stored procedure.

use routed_mappers::{routed_interface, RoutingError};
use thiserror::Error;

/// Row written and read by the mappers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePayload {
    pub id: i32,
    pub message: String,
}

impl MessagePayload {
    pub fn new(id: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

/// Errors surfaced by mapper calls.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("duplicate key {id} in {table} on {database}")]
    DuplicateKey {
        database: String,
        table: String,
        id: i32,
    },

    #[error("{interface}::{method} is not bound on {database}")]
    UnboundStatement {
        database: String,
        interface: &'static str,
        method: &'static str,
    },
}

routed_interface! {
    pub trait MapperOne => RoutedMapperOne {
        #[statement(Insert, "CALL INSERT_DATA_1(#{id, mode=IN, jdbcType=SMALLINT},#{message, mode=IN, jdbcType=VARCHAR});")]
        fn insert_data_with_proc(&self, data: &MessagePayload) -> Result<(), MapperError>;

        #[statement(Select, "CALL SELECT_DATA_1(#{id, mode=IN, jdbcType=SMALLINT});")]
        fn select_data_from_proc(&self, id: i32) -> Result<Option<MessagePayload>, MapperError>;
    }
}

routed_interface! {
    pub trait MapperTwo => RoutedMapperTwo {
        #[statement(Insert, "CALL INSERT_DATA_2(#{id, mode=IN, jdbcType=SMALLINT},#{message, mode=IN, jdbcType=VARCHAR});")]
        fn insert_data_with_proc(&self, data: &MessagePayload) -> Result<(), MapperError>;

        #[statement(Select, "CALL SELECT_DATA_2(#{id, mode=IN, jdbcType=SMALLINT});")]
        fn select_data_from_proc(&self, id: i32) -> Result<Option<MessagePayload>, MapperError>;
    }
}

#[cfg(test)]
mod tests {
    use routed_mappers::{RoutedInterface, StatementKind};

    use super::*;

    #[test]
    fn test_mapper_descriptors() {
        let one = <dyn MapperOne as RoutedInterface>::descriptor();
        let two = <dyn MapperTwo as RoutedInterface>::descriptor();

        assert_eq!(one.name, "MapperOne");
        assert_eq!(two.name, "MapperTwo");
        assert_eq!(
            one.method("insert_data_with_proc").unwrap().kind,
            StatementKind::Insert
        );
        assert!(two
            .method("select_data_from_proc")
            .unwrap()
            .statement
            .contains("SELECT_DATA_2"));
        assert!(one.validate().is_ok() && two.validate().is_ok());
    }
}
