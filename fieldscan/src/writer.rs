//! Row persistence behind the [`RowSink`] seam.
//!
//! The catalog fixes the column list for the life of the process, so the
//! insert statement is assembled once at startup and every cycle only
//! binds fresh parameters. `datetime` is filled server-side.

use async_trait::async_trait;
use itertools::Itertools;
use sqlx::PgPool;
use tracing::debug;

use fieldscan_codec::{Value, ValueClass};

use crate::schema::{Catalog, ColumnSpec};

/// Destination of one row per cycle.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Sink-specific failure, logged and swallowed by the scheduler.
    type Error: std::fmt::Display + Send;

    /// Persist one cycle's samples, in catalog order.
    async fn insert(&self, row: &[Value]) -> Result<(), Self::Error>;
}

/// Parameterized insert of one row per cycle.
pub fn insert_sql(table: &str, columns: &[ColumnSpec]) -> String {
    let names = columns.iter().map(|c| c.name.as_str()).join(", ");
    let placeholders = (1..=columns.len()).map(|i| format!("${i}")).join(", ");
    format!("INSERT INTO {table} ({names}) VALUES ({placeholders})")
}

/// The production sink: one Postgres insert per cycle.
pub struct PgRowWriter {
    pool: PgPool,
    statement: String,
    columns: Vec<ColumnSpec>,
}

impl PgRowWriter {
    /// Prepare the writer for a fixed catalog.
    pub fn new(pool: PgPool, table: &str, catalog: &Catalog) -> Self {
        Self {
            pool,
            statement: insert_sql(table, catalog.columns()),
            columns: catalog.columns().to_vec(),
        }
    }
}

#[async_trait]
impl RowSink for PgRowWriter {
    type Error = sqlx::Error;

    async fn insert(&self, row: &[Value]) -> Result<(), sqlx::Error> {
        if self.columns.is_empty() {
            debug!("no active points, nothing to record");
            return Ok(());
        }
        let mut query = sqlx::query(&self.statement);
        for (column, value) in self.columns.iter().zip(row) {
            query = match value {
                Value::Int(i) => query.bind(*i),
                Value::Float(x) => query.bind(*x),
                Value::Text(s) => query.bind(s.as_str()),
                // A missing sample still needs the type its column expects.
                Value::Null => match column.class {
                    ValueClass::Int => query.bind(None::<i64>),
                    ValueClass::Float => query.bind(None::<f64>),
                    ValueClass::Text => query.bind(None::<String>),
                },
            };
        }
        query.execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldscan_codec::ValueClass;

    fn column(name: &str) -> ColumnSpec {
        ColumnSpec {
            name: name.to_owned(),
            lower: name.to_lowercase(),
            sql_type: "REAL".to_owned(),
            class: ValueClass::Float,
        }
    }

    #[test]
    fn insert_statement_is_positional_and_ordered() {
        let columns = vec![column("a_x_REAL"), column("b_y_REAL"), column("c_z_REAL")];
        assert_eq!(
            insert_sql("plant", &columns),
            "INSERT INTO plant (a_x_REAL, b_y_REAL, c_z_REAL) VALUES ($1, $2, $3)"
        );
    }
}
