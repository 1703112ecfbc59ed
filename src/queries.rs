//! SQL statements for the shipments table, parameterized by schema and table.

use itertools::Itertools;

use crate::schema::{RECORD, SHIPPED, Schema};

/// Name of the surrogate key column the table is created with.
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queries {
    schema_name: String,
    table: String,
}

impl Queries {
    pub fn new(schema_name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table: table.into(),
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn qualified_table(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema_name, self.table)
    }

    pub fn select_all(&self) -> String {
        format!("SELECT * FROM {}", self.qualified_table())
    }

    pub fn clear_table(&self) -> String {
        format!("DELETE FROM {}", self.qualified_table())
    }

    /// Deletes every row ranked below first place within its business key.
    ///
    /// Rows are ranked by shipped quantity descending, then by insertion order,
    /// so the earliest row wins a tie and a second run deletes nothing.
    pub fn remove_duplicates(&self) -> String {
        let table = self.qualified_table();
        format!(
            "DELETE FROM {table} WHERE rowid IN (\
             SELECT row_key FROM (\
             SELECT rowid AS row_key, ROW_NUMBER() OVER (\
             PARTITION BY CAST(\"{RECORD}\" AS TEXT) \
             ORDER BY \"{SHIPPED}\" DESC, rowid ASC\
             ) AS RowNum FROM {table}\
             ) WHERE RowNum > 1)"
        )
    }

    pub fn import_record(&self, schema: &Schema) -> String {
        let columns = schema
            .columns()
            .iter()
            .map(|column| format!("\"{}\"", column.name))
            .join(", ");
        let placeholders = std::iter::repeat_n("?", schema.len()).join(", ");
        format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders})",
            self.qualified_table()
        )
    }

    pub fn create_table(&self, schema: &Schema) -> String {
        let columns = schema
            .columns()
            .iter()
            .map(|column| format!("\"{}\" {}", column.name, column.datatype.sql_type()))
            .join(", ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\"{ID_COLUMN}\" INTEGER PRIMARY KEY AUTOINCREMENT, {columns})",
            self.qualified_table()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_use_qualified_table() {
        let queries = Queries::new("main", "ArrowStream");
        assert_eq!(queries.select_all(), "SELECT * FROM \"main\".\"ArrowStream\"");
        assert_eq!(queries.clear_table(), "DELETE FROM \"main\".\"ArrowStream\"");
    }

    #[test]
    fn import_record_has_one_placeholder_per_column() {
        let schema = Schema::shipments();
        let sql = Queries::new("main", "shipments").import_record(&schema);
        assert_eq!(sql.matches('?').count(), 14);
        assert!(sql.starts_with("INSERT INTO \"main\".\"shipments\" (\"Record\", \"Invoice\""));
    }

    #[test]
    fn create_table_declares_storage_types() {
        let sql = Queries::new("main", "shipments").create_table(&Schema::shipments());
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("\"Account\" VARCHAR(16)"));
        assert!(sql.contains("\"Shipped\" SMALLINT"));
        assert!(sql.contains("\"ShipDate\" DATE"));
    }

    #[test]
    fn remove_duplicates_ranks_by_shipped_then_rowid() {
        let sql = Queries::new("main", "shipments").remove_duplicates();
        assert!(sql.contains("PARTITION BY CAST(\"Record\" AS TEXT)"));
        assert!(sql.contains("ORDER BY \"Shipped\" DESC, rowid ASC"));
        assert!(sql.ends_with("WHERE RowNum > 1)"));
    }
}
