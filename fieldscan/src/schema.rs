//! Column catalog and live-schema reconciliation.
//!
//! The catalog is the deterministic column order every other component
//! leans on: devices in config order, function codes 1→4, addresses
//! ascending. Reconciliation runs once at startup and is idempotent: a
//! second run against the same table issues no DDL.

use itertools::Itertools;
use sqlx::PgPool;
use tracing::info;

use fieldscan_codec::ValueClass;
use fieldscan_config::{Config, Device, Register};

use crate::error::Error;

/// One column of the target table.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Column name as written in DDL.
    pub name: String,
    /// Lowercased name, the identity used for comparisons.
    pub lower: String,
    /// SQL type, taken verbatim from the register's `type` field.
    pub sql_type: String,
    /// Bind class for NULL samples.
    pub class: ValueClass,
}

/// Derive a column name from a device/register pair.
///
/// `{device}_{register}_{type}` with spaces and `(` folded to `_`, and
/// `)` / `-` dropped.
pub fn column_name(device: &Device, register: &Register) -> String {
    let raw = format!("{}_{}_{}", device.name, register.name, register.sql_type);
    raw.chars()
        .filter_map(|c| match c {
            ' ' | '(' => Some('_'),
            ')' | '-' => None,
            other => Some(other),
        })
        .collect()
}

/// Deterministic column order of the whole fleet.
#[derive(Debug, Clone)]
pub struct Catalog {
    columns: Vec<ColumnSpec>,
}

impl Catalog {
    /// Walk the active fleet and fix the column order. Rejects
    /// case-insensitive column collisions; silently racing two registers
    /// into one column would corrupt every row after it.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut columns: Vec<ColumnSpec> = Vec::new();
        for device in config.active_devices() {
            for (_, registers) in device.registers.iter() {
                for register in registers.values().filter(|r| r.active) {
                    let name = column_name(device, register);
                    let lower = name.to_lowercase();
                    if columns.iter().any(|c| c.lower == lower) {
                        return Err(Error::DuplicateColumn(name));
                    }
                    columns.push(ColumnSpec {
                        name,
                        lower,
                        sql_type: register.sql_type.clone(),
                        class: register.format.class(),
                    });
                }
            }
        }
        Ok(Self { columns })
    }

    /// Columns in catalog order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Number of points per row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the fleet yields no points at all.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Catalog columns absent from a live column list (case-insensitive).
    pub fn missing_from<'c>(&'c self, live: &[String]) -> Vec<&'c ColumnSpec> {
        let live: Vec<String> = live.iter().map(|c| c.to_lowercase()).collect();
        self.columns
            .iter()
            .filter(|c| !live.contains(&c.lower))
            .collect()
    }
}

const TABLE_EXISTS: &str =
    "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1)";
const LIVE_COLUMNS: &str =
    "SELECT column_name FROM information_schema.columns WHERE table_name = $1";

/// `CREATE TABLE` for a missing target table: synthetic key, server-side
/// timestamp, then the catalog in order.
pub fn create_table_sql(table: &str, catalog: &Catalog) -> String {
    let columns = catalog
        .columns()
        .iter()
        .map(|c| format!("{} {}", c.name, c.sql_type))
        .join(", ");
    let body = if columns.is_empty() {
        String::new()
    } else {
        format!(", {columns}")
    };
    format!(
        "CREATE TABLE {table} (id SERIAL PRIMARY KEY, \
         datetime TIMESTAMPTZ DEFAULT NOW(){body})"
    )
}

/// `ALTER TABLE` adding every listed column.
pub fn add_columns_sql(table: &str, columns: &[&ColumnSpec]) -> String {
    let additions = columns
        .iter()
        .map(|c| format!("ADD COLUMN {} {}", c.name, c.sql_type))
        .join(", ");
    format!("ALTER TABLE {table} {additions}")
}

/// Bring the live table in line with the catalog. Unknown live columns are
/// left alone so an older recorder can keep writing beside a newer config.
pub async fn reconcile(pool: &PgPool, table: &str, catalog: &Catalog) -> Result<(), Error> {
    let exists: bool = sqlx::query_scalar(TABLE_EXISTS)
        .bind(table)
        .fetch_one(pool)
        .await
        .map_err(Error::Schema)?;

    if !exists {
        let ddl = create_table_sql(table, catalog);
        sqlx::query(&ddl).execute(pool).await.map_err(Error::Schema)?;
        info!(table, columns = catalog.len(), "created target table");
        return Ok(());
    }

    let live: Vec<String> = sqlx::query_scalar(LIVE_COLUMNS)
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(Error::Schema)?;
    let missing = catalog.missing_from(&live);
    if missing.is_empty() {
        return Ok(());
    }
    let ddl = add_columns_sql(table, &missing);
    sqlx::query(&ddl).execute(pool).await.map_err(Error::Schema)?;
    info!(table, added = missing.len(), "extended target table");
    Ok(())
}
