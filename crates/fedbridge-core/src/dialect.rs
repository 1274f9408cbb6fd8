// SPDX-License-Identifier: Apache-2.0

//! SQL dialect for remote stores
//!
//! Quoting and parameter placeholder rules used to build the parameterized
//! write statement a remote client prepares once per unit.

use serde::{Deserialize, Serialize};

use crate::types::{ColumnDescriptor, DatasetLocation, Namespace};

/// SQL dialect spoken by a remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    Hive,
}

impl SqlDialect {
    pub fn from_driver_id(driver_id: &str) -> Option<Self> {
        match driver_id.to_lowercase().as_str() {
            "postgres" | "postgresql" | "greenplum" => Some(SqlDialect::Postgres),
            "mysql" | "mariadb" => Some(SqlDialect::MySql),
            "sqlite" => Some(SqlDialect::Sqlite),
            "hive" | "hive2" => Some(SqlDialect::Hive),
            _ => None,
        }
    }

    /// Quote an identifier according to the dialect
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            SqlDialect::Postgres | SqlDialect::Sqlite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            SqlDialect::MySql | SqlDialect::Hive => {
                format!("`{}`", name.replace('`', "``"))
            }
        }
    }

    /// Format a qualified table name (schema.table or database.table)
    pub fn qualified_table(&self, namespace: &Namespace, table_name: &str) -> String {
        match self {
            SqlDialect::Postgres => {
                let schema = namespace.schema.as_deref().unwrap_or("public");
                format!("{}.{}", self.quote_ident(schema), self.quote_ident(table_name))
            }
            SqlDialect::MySql | SqlDialect::Hive => {
                format!(
                    "{}.{}",
                    self.quote_ident(&namespace.database),
                    self.quote_ident(table_name)
                )
            }
            SqlDialect::Sqlite => self.quote_ident(table_name),
        }
    }

    /// Bind placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${index}"),
            SqlDialect::MySql | SqlDialect::Sqlite | SqlDialect::Hive => "?".to_string(),
        }
    }

    /// Parameterized single-row INSERT for the given columns, in column order.
    pub fn insert_statement(&self, dataset: &DatasetLocation, columns: &[ColumnDescriptor]) -> String {
        let names = columns
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let params = (1..=columns.len())
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_table(&dataset.namespace, &dataset.table),
            names,
            params
        )
    }
}
