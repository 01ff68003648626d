//! Scripted [`Connection`] for driver tests
//!
//! Compiled for this crate's own tests and for dependents that enable the
//! `testing` feature.

use async_trait::async_trait;
use crate::{Connection, DbseedError, QueryResult, Result, Row, StatementResult, Value};
use parking_lot::Mutex;

type Call = (String, Vec<Value>);

/// Answers queries from canned results picked by SQL substring and
/// records every statement it sees
#[derive(Default)]
pub struct ScriptedConnection {
    answers: Vec<(String, QueryResult)>,
    insert_error: Option<fn() -> DbseedError>,
    queries: Mutex<Vec<Call>>,
    executed: Mutex<Vec<Call>>,
    prepared: Mutex<Vec<String>>,
}

pub fn rows(values: Vec<Vec<Value>>) -> QueryResult {
    QueryResult {
        rows: values.into_iter().map(|v| Row::new(Vec::new(), v)).collect(),
        ..QueryResult::default()
    }
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// First matching needle wins; unmatched queries return no rows
    pub fn on_query(mut self, needle: &str, result: QueryResult) -> Self {
        self.answers.push((needle.to_string(), result));
        self
    }

    pub fn failing_inserts(mut self, error: fn() -> DbseedError) -> Self {
        self.insert_error = Some(error);
        self
    }

    pub fn queries(&self) -> Vec<Call> {
        self.queries.lock().clone()
    }

    pub fn executed(&self) -> Vec<Call> {
        self.executed.lock().clone()
    }

    pub fn prepared(&self) -> Vec<String> {
        self.prepared.lock().clone()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn driver_name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.executed.lock().push((sql.to_string(), params.to_vec()));
        if let Some(error) = self.insert_error {
            return Err(error());
        }
        Ok(StatementResult {
            is_query: false,
            affected_rows: 1,
        })
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.queries.lock().push((sql.to_string(), params.to_vec()));
        Ok(self
            .answers
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }

    async fn prepare(&self, sql: &str) -> Result<()> {
        self.prepared.lock().push(sql.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}
