//! DB2 statement builders
//!
//! Unquoted DB2 identifiers fold to upper case, so the schema name is
//! upper-cased before quoting. Table and column names come straight from
//! SYSCAT and are quoted as-is.

use dbseed_core::TableInfo;

pub fn escape_identifier_db2(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

pub fn qualified_table_name(table: &TableInfo) -> String {
    match &table.schema {
        Some(schema) => format!(
            "{}.{}",
            escape_identifier_db2(&schema.to_uppercase()),
            escape_identifier_db2(&table.name)
        ),
        None => escape_identifier_db2(&table.name),
    }
}

fn quoted_columns(table: &TableInfo) -> Vec<String> {
    table
        .column_names()
        .into_iter()
        .map(escape_identifier_db2)
        .collect()
}

pub fn build_insert_sql(table: &TableInfo) -> String {
    let columns = quoted_columns(table);
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_table_name(table),
        columns.join(", "),
        vec!["?"; columns.len()].join(", ")
    )
}

/// Per-row insert. Tables with a primary key are merged on it; the
/// `WHEN MATCHED` arm is left out when every column belongs to the key.
pub fn build_upsert_sql(table: &TableInfo) -> String {
    if table.primary_key_columns.is_empty() {
        return build_insert_sql(table);
    }

    let columns = quoted_columns(table);
    let on = table
        .primary_key_columns
        .iter()
        .map(|c| {
            let quoted = escape_identifier_db2(c);
            format!("tgt.{} = src.{}", quoted, quoted)
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut sql = format!(
        "MERGE INTO {} AS tgt USING (VALUES ({})) AS src ({}) ON {}",
        qualified_table_name(table),
        vec!["?"; columns.len()].join(", "),
        columns.join(", "),
        on
    );

    let updates: Vec<String> = table
        .non_key_columns()
        .into_iter()
        .map(|c| {
            let quoted = escape_identifier_db2(c);
            format!("tgt.{} = src.{}", quoted, quoted)
        })
        .collect();
    if !updates.is_empty() {
        sql.push_str(" WHEN MATCHED THEN UPDATE SET ");
        sql.push_str(&updates.join(", "));
    }

    let source_values = columns
        .iter()
        .map(|c| format!("src.{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    sql.push_str(&format!(
        " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
        columns.join(", "),
        source_values
    ));
    sql
}

pub fn build_exists_sql(table: &TableInfo, column: &str) -> String {
    format!(
        "SELECT 1 FROM {} WHERE {} = ? FETCH FIRST 1 ROWS ONLY",
        qualified_table_name(table),
        escape_identifier_db2(column)
    )
}
