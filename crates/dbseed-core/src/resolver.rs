//! Parent-record resolution shared by every engine adapter
//!
//! When a child row references a key its parent table does not hold yet,
//! a minimal parent row is synthesized: the referenced column takes the
//! child's value, declared defaults are honored, unique columns get random
//! placeholders and everything else gets the empty-input conversion. The
//! synthesized row's own foreign keys are resolved first, so whole chains
//! of missing ancestors are created top-down.
//!
//! The existence check and the insert are separate statements. Engines
//! insert with their conflict-ignoring form so a concurrent writer only
//! costs a skipped insert.

use std::future::Future;
use std::pin::Pin;

use crate::convert::{convert_to_db_type, value_to_key_string};
use crate::random::generate_random_value;
use crate::{DatabaseClient, DbseedError, Result, SchemaModel, TableInfo, Value};

/// Longest chain of synthesized ancestors before resolution gives up
pub const MAX_PARENT_DEPTH: usize = 32;

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>>;

/// Resolve `parent.column = value`, synthesizing the row and any missing
/// ancestors. Drivers call this from their
/// [`DatabaseClient::ensure_parent_record_exists`] implementation.
///
/// A key that is already being synthesized further up the chain (a
/// self-referencing row, or a cycle of NOT NULL references) counts as
/// resolved. Chains deeper than [`MAX_PARENT_DEPTH`] fail with
/// [`DbseedError::Schema`].
pub async fn ensure_parent_record(
    client: &dyn DatabaseClient,
    parent: &TableInfo,
    column: &str,
    value: &str,
    schema: &SchemaModel,
) -> Result<usize> {
    let mut chain = Vec::new();
    resolve(client, parent, column, value, schema, &mut chain).await
}

fn resolve<'a>(
    client: &'a dyn DatabaseClient,
    parent: &'a TableInfo,
    column: &'a str,
    value: &'a str,
    schema: &'a SchemaModel,
    chain: &'a mut Vec<(String, String, String)>,
) -> ResolveFuture<'a> {
    Box::pin(async move {
        if chain
            .iter()
            .any(|(t, c, v)| t == &parent.name && c == column && v == value)
        {
            tracing::debug!(
                table = %parent.name,
                column = %column,
                value = %value,
                "parent record is already being created higher in the chain"
            );
            return Ok(0);
        }
        if chain.len() >= MAX_PARENT_DEPTH {
            return Err(DbseedError::Schema(format!(
                "parent chain for {}.{} (value: {}) exceeds {} levels",
                parent.name, column, value, MAX_PARENT_DEPTH
            )));
        }

        if client.parent_record_exists(parent, column, value).await? {
            tracing::debug!(table = %parent.name, column = %column, value = %value, "parent record exists");
            return Ok(0);
        }

        tracing::info!(
            table = %parent.name,
            column = %column,
            value = %value,
            "creating missing parent record"
        );

        let values = synthesize_parent_row(parent, column, value);

        chain.push((parent.name.clone(), column.to_string(), value.to_string()));
        let mut created = 0;
        for fk in &parent.foreign_keys {
            let Some(index) = parent.column_index(&fk.column_name) else {
                tracing::warn!(
                    table = %parent.name,
                    column = %fk.column_name,
                    constraint = %fk.constraint_name,
                    "foreign key column not found in table columns, skipping"
                );
                continue;
            };

            let fk_value = &values[index];
            if fk_value.is_null() {
                continue;
            }
            let key = value_to_key_string(fk_value);

            let Some(grandparent) = schema.get(&fk.foreign_table_name) else {
                chain.pop();
                return Err(DbseedError::MissingForeignTable {
                    table: fk.foreign_table_name.clone(),
                    constraint: fk.constraint_name.clone(),
                });
            };

            match resolve(client, grandparent, &fk.foreign_column_name, &key, schema, chain).await {
                Ok(n) => created += n,
                Err(e) => {
                    chain.pop();
                    return Err(match e {
                        DbseedError::ParentRecord { .. } => e,
                        e => DbseedError::ParentRecord {
                            table: grandparent.name.clone(),
                            column: fk.foreign_column_name.clone(),
                            value: key.clone(),
                            source: Box::new(e),
                        },
                    });
                }
            }
        }
        chain.pop();

        if client.insert_parent_record(parent, &values).await? {
            tracing::info!(table = %parent.name, column = %column, value = %value, "parent record created");
            created += 1;
        } else {
            tracing::debug!(table = %parent.name, column = %column, value = %value, "parent record already present, insert skipped");
        }
        Ok(created)
    })
}

/// Build the column values of a synthesized parent row.
///
/// Conversion and generation failures degrade to NULL; the insert itself
/// reports whether the engine accepts that.
pub fn synthesize_parent_row(parent: &TableInfo, column: &str, value: &str) -> Vec<Value> {
    let unique_columns = parent.unique_columns();

    parent
        .columns
        .iter()
        .map(|col| {
            let result = if col.name == column {
                convert_to_db_type(value, col)
            } else if let Some(default) = &col.default_value {
                convert_to_db_type(default, col)
            } else if !col.nullable && unique_columns.contains(col.name.as_str()) {
                generate_random_value(col.data_type)
            } else {
                convert_to_db_type("", col)
            };

            result.unwrap_or_else(|e| {
                tracing::warn!(
                    table = %parent.name,
                    column = %col.name,
                    error = %e,
                    "could not build value for synthesized parent row, using NULL"
                );
                Value::Null
            })
        })
        .collect()
}
