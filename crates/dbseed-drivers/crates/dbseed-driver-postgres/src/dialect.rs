//! PostgreSQL statement builders

use dbseed_core::TableInfo;

/// Escape a PostgreSQL identifier (column name, etc.)
pub fn escape_identifier_pg(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Schema-qualified, quoted table name
pub fn qualified_table_name(table: &TableInfo) -> String {
    match &table.schema {
        Some(schema) => format!(
            "{}.{}",
            escape_identifier_pg(schema),
            escape_identifier_pg(&table.name)
        ),
        None => escape_identifier_pg(&table.name),
    }
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| escape_identifier_pg(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_prefix(table: &TableInfo) -> String {
    let columns = table.column_names();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_table_name(table),
        column_list(&columns),
        placeholders(columns.len())
    )
}

/// Per-row insert: an upsert on the primary key when the table has one
pub fn build_upsert_sql(table: &TableInfo) -> String {
    let insert = insert_prefix(table);
    if table.primary_key_columns.is_empty() {
        return insert;
    }

    let pk: Vec<&str> = table.primary_key_columns.iter().map(String::as_str).collect();
    let updates: Vec<String> = table
        .non_key_columns()
        .into_iter()
        .map(|c| {
            let quoted = escape_identifier_pg(c);
            format!("{} = EXCLUDED.{}", quoted, quoted)
        })
        .collect();

    if updates.is_empty() {
        format!("{} ON CONFLICT ({}) DO NOTHING", insert, column_list(&pk))
    } else {
        format!(
            "{} ON CONFLICT ({}) DO UPDATE SET {}",
            insert,
            column_list(&pk),
            updates.join(", ")
        )
    }
}

/// Insert for synthesized parent rows; any conflicting row wins
pub fn build_insert_ignore_sql(table: &TableInfo) -> String {
    format!("{} ON CONFLICT DO NOTHING", insert_prefix(table))
}

pub fn build_exists_sql(table: &TableInfo, column: &str) -> String {
    format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
        qualified_table_name(table),
        escape_identifier_pg(column)
    )
}
