// src/storage.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use tokio_postgres::types::ToSql;

use crate::db::PgPool;
use crate::models::AttributeValue;

/// Row-at-a-time gateway to the relational store.
///
/// Each call owns its connection for exactly the duration of the call, so a
/// failed statement can never leak a connection and tasks never share one.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Runs a single-row query. Values come back in column order, with SQL
    /// NULL mapped to [`AttributeValue::Null`]; `None` means no row matched.
    async fn get(&self, sql: &str, params: &[AttributeValue])
        -> Result<Option<Vec<AttributeValue>>>;

    /// Runs a statement, returning the affected row count.
    async fn post(&self, sql: &str, params: &[AttributeValue]) -> Result<u64>;
}

/// Postgres-backed storage over the shared bb8 pool.
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn bind<'a>(params: &'a [AttributeValue]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Storage for PgStorage {
    async fn get(
        &self,
        sql: &str,
        params: &[AttributeValue],
    ) -> Result<Option<Vec<AttributeValue>>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection from pool for read")?;

        debug!("Executing query: {}", sql);
        let row = conn
            .query_opt(sql, &bind(params))
            .await
            .with_context(|| format!("Query failed: {}", sql))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(row.len());
        for idx in 0..row.len() {
            let value: AttributeValue = row
                .try_get(idx)
                .with_context(|| format!("Failed to decode column {} of: {}", idx, sql))?;
            values.push(value);
        }
        Ok(Some(values))
        // conn drops here and returns to the pool
    }

    async fn post(&self, sql: &str, params: &[AttributeValue]) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection from pool for write")?;

        debug!("Executing statement: {}", sql);
        conn.execute(sql, &bind(params))
            .await
            .with_context(|| format!("Statement failed: {}", sql))
    }
}

//------------------------------------------------------------------------------
// QUERY SHAPES
//------------------------------------------------------------------------------
// Table and column names come from the run configuration and the provider's
// declared descriptors; values always travel as bound parameters.

/// SELECT over the declared attribute columns for one project.
pub fn select_sql(table: &str, columns: &[String]) -> String {
    format!(
        "SELECT {} FROM {} WHERE project_id = $1",
        columns.join(", "),
        table
    )
}

/// INSERT with an explicit column list and positional placeholders.
pub fn insert_sql(table: &str, columns: &[String]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// UPDATE setting the given columns, filtered by project ID. The project ID
/// filter binds as the final placeholder, after the SET values.
pub fn update_sql(table: &str, columns: &[String]) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ${}", column, i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE project_id = ${}",
        table,
        assignments.join(", "),
        columns.len() + 1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn select_filters_by_project_id() {
        let sql = select_sql("project_score", &columns(&["cpu", "coverage"]));
        assert_eq!(
            sql,
            "SELECT cpu, coverage FROM project_score WHERE project_id = $1"
        );
    }

    #[test]
    fn insert_numbers_placeholders_positionally() {
        let sql = insert_sql("project_score", &columns(&["project_id", "score", "cpu"]));
        assert_eq!(
            sql,
            "INSERT INTO project_score (project_id, score, cpu) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn update_binds_filter_after_set_values() {
        let sql = update_sql("project_score", &columns(&["project_id", "score", "cpu"]));
        assert_eq!(
            sql,
            "UPDATE project_score SET project_id = $1, score = $2, cpu = $3 WHERE project_id = $4"
        );
    }
}
