//! DB2 catalog queries against the SYSCAT views

use async_trait::async_trait;
use dbseed_core::{ColumnDataType, ColumnInfo, ForeignKeyInfo, Result, SchemaIntrospection, Value};

use crate::Db2Client;

/// SYSCAT stores folded names in upper case
fn catalog_params(schema: &str, table: &str) -> [Value; 2] {
    [
        Value::String(schema.to_uppercase()),
        Value::String(table.to_uppercase()),
    ]
}

/// SYSCAT.COLUMNS.DEFAULT keeps string literals quoted; strip them
fn normalize_default(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NULL") {
        return None;
    }
    match trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(inner) => Some(inner.replace("''", "'")),
        None => Some(trimmed.to_string()),
    }
}

#[async_trait]
impl SchemaIntrospection for Db2Client {
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let result = self
            .conn()
            .query(
                "SELECT TABNAME FROM SYSCAT.TABLES
                 WHERE TABSCHEMA = ? AND TYPE = 'T'
                 ORDER BY TABNAME",
                &[Value::String(schema.to_uppercase())],
            )
            .await?;

        Ok(result.rows.iter().map(|row| row.get_string(0)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let result = self
            .conn()
            .query(
                "SELECT COLNAME, TYPENAME, NULLS, DEFAULT
                 FROM SYSCAT.COLUMNS
                 WHERE TABSCHEMA = ? AND TABNAME = ?
                 ORDER BY COLNO",
                &catalog_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get_string(0),
                data_type: ColumnDataType::from_native(&row.get_string(1)),
                nullable: row.get_string(2) == "Y",
                default_value: row.get_opt_string(3).and_then(|d| normalize_default(&d)),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let result = self
            .conn()
            .query(
                "SELECT kcu.COLNAME
                 FROM SYSCAT.KEYCOLUSE kcu
                 JOIN SYSCAT.TABCONST tc
                   ON kcu.CONSTNAME = tc.CONSTNAME
                  AND kcu.TABSCHEMA = tc.TABSCHEMA
                  AND kcu.TABNAME = tc.TABNAME
                 WHERE kcu.TABSCHEMA = ? AND kcu.TABNAME = ? AND tc.TYPE = 'P'
                 ORDER BY kcu.COLSEQ",
                &catalog_params(schema, table),
            )
            .await?;

        Ok(result.rows.iter().map(|row| row.get_string(0)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_unique_keys(&self, schema: &str, table: &str) -> Result<Vec<Vec<String>>> {
        let result = self
            .conn()
            .query(
                "SELECT LISTAGG(kcu.COLNAME, ',') WITHIN GROUP (ORDER BY kcu.COLSEQ)
                 FROM SYSCAT.KEYCOLUSE kcu
                 JOIN SYSCAT.TABCONST tc
                   ON kcu.CONSTNAME = tc.CONSTNAME
                  AND kcu.TABSCHEMA = tc.TABSCHEMA
                  AND kcu.TABNAME = tc.TABNAME
                 WHERE kcu.TABSCHEMA = ? AND kcu.TABNAME = ? AND tc.TYPE = 'U'
                 GROUP BY kcu.CONSTNAME
                 ORDER BY kcu.CONSTNAME",
                &catalog_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| {
                row.get_string(0)
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|group| !group.is_empty())
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let result = self
            .conn()
            .query(
                "SELECT rc.CONSTNAME, kcu.COLNAME, rc.REFTABNAME, kcu_ref.COLNAME
                 FROM SYSCAT.REFERENCES rc
                 JOIN SYSCAT.KEYCOLUSE kcu
                   ON rc.CONSTNAME = kcu.CONSTNAME
                  AND rc.TABSCHEMA = kcu.TABSCHEMA
                  AND rc.TABNAME = kcu.TABNAME
                 JOIN SYSCAT.KEYCOLUSE kcu_ref
                   ON rc.REFKEYNAME = kcu_ref.CONSTNAME
                  AND rc.REFTABSCHEMA = kcu_ref.TABSCHEMA
                  AND rc.REFTABNAME = kcu_ref.TABNAME
                  AND kcu.COLSEQ = kcu_ref.COLSEQ
                 WHERE rc.TABSCHEMA = ? AND rc.TABNAME = ?
                 ORDER BY rc.CONSTNAME, kcu.COLSEQ",
                &catalog_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| ForeignKeyInfo {
                constraint_name: row.get_string(0),
                table_name: table.to_string(),
                column_name: row.get_string(1),
                foreign_table_name: row.get_string(2),
                foreign_column_name: row.get_string(3),
            })
            .collect())
    }
}
