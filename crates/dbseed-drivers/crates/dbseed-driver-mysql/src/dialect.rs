//! MySQL statement builders

use dbseed_core::TableInfo;

pub fn escape_identifier_mysql(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Database-qualified table name when the schema is known
pub fn qualified_table_name(table: &TableInfo) -> String {
    match &table.schema {
        Some(schema) => format!(
            "{}.{}",
            escape_identifier_mysql(schema),
            escape_identifier_mysql(&table.name)
        ),
        None => escape_identifier_mysql(&table.name),
    }
}

fn columns_and_placeholders(table: &TableInfo) -> (String, String) {
    let columns = table.column_names();
    let list = columns
        .iter()
        .map(|c| escape_identifier_mysql(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    (list, placeholders)
}

/// Per-row insert. Tables with a primary key update their non-key
/// columns on a duplicate; key-only tables ignore the duplicate.
pub fn build_upsert_sql(table: &TableInfo) -> String {
    let (columns, placeholders) = columns_and_placeholders(table);
    let target = qualified_table_name(table);

    if table.primary_key_columns.is_empty() {
        return format!("INSERT INTO {} ({}) VALUES ({})", target, columns, placeholders);
    }

    let updates: Vec<String> = table
        .non_key_columns()
        .into_iter()
        .map(|c| {
            let quoted = escape_identifier_mysql(c);
            format!("{} = VALUES({})", quoted, quoted)
        })
        .collect();

    if updates.is_empty() {
        build_insert_ignore_sql(table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
            target,
            columns,
            placeholders,
            updates.join(", ")
        )
    }
}

pub fn build_insert_ignore_sql(table: &TableInfo) -> String {
    let (columns, placeholders) = columns_and_placeholders(table);
    format!(
        "INSERT IGNORE INTO {} ({}) VALUES ({})",
        qualified_table_name(table),
        columns,
        placeholders
    )
}

pub fn build_exists_sql(table: &TableInfo, column: &str) -> String {
    format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?)",
        qualified_table_name(table),
        escape_identifier_mysql(column)
    )
}
