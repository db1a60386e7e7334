#[cfg(feature = "ssr")]
mod db_impl {
    use std::sync::Arc;

    use async_trait::async_trait;
    use leptos::logging::{error, log};
    use rusqlite::types::{Value as SqlValue, ValueRef};
    use rusqlite::{params_from_iter, Connection, ErrorCode};
    use serde_json::{Map, Number, Value};
    use tokio::sync::Mutex;

    use crate::backend::{BackendError, Filter, RelationalStore, Row, Select, Table};

    fn sql_error(table: Table, e: rusqlite::Error) -> BackendError {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                BackendError::rejected(table.as_str(), 409, e.to_string())
            }
            _ => {
                error!("[DB] Query on {table} failed: {e}");
                BackendError::transport(table.as_str(), e)
            }
        }
    }

    fn to_sql(value: &Value) -> SqlValue {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
            Value::Number(number) => match number.as_i64() {
                Some(int) => SqlValue::Integer(int),
                None => SqlValue::Real(number.as_f64().unwrap_or_default()),
            },
            Value::String(text) => SqlValue::Text(text.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }

    fn to_json(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null | ValueRef::Blob(_) => Value::Null,
            ValueRef::Integer(int) => Value::from(int),
            ValueRef::Real(real) => Number::from_f64(real).map_or(Value::Null, Value::Number),
            ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        }
    }

    /// Appends the SQL for `filter` and pushes its parameters.
    fn render_filter(filter: &Filter, params: &mut Vec<SqlValue>) -> String {
        match filter {
            Filter::Eq(column, value) => {
                params.push(to_sql(value));
                format!("{column} = ?")
            }
            // SQLite's LIKE already ignores ASCII case.
            Filter::ILike(column, pattern) => {
                params.push(SqlValue::Text(pattern.clone()));
                format!("{column} LIKE ?")
            }
            Filter::In(_, values) if values.is_empty() => "0".to_string(),
            Filter::In(column, values) => {
                params.extend(values.iter().map(to_sql));
                let marks = vec!["?"; values.len()].join(", ");
                format!("{column} IN ({marks})")
            }
            Filter::Or(filters) if filters.is_empty() => "0".to_string(),
            Filter::Or(filters) => {
                let parts: Vec<String> = filters
                    .iter()
                    .map(|filter| render_filter(filter, params))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    fn where_clause(filters: &[Filter], params: &mut Vec<SqlValue>) -> String {
        if filters.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = filters
            .iter()
            .map(|filter| render_filter(filter, params))
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    /// Column names and values of a row, restricted to known columns.
    fn row_columns(table: Table, row: &Row) -> Result<(Vec<String>, Vec<SqlValue>), BackendError> {
        let object = row
            .as_object()
            .ok_or_else(|| BackendError::rejected(table.as_str(), 400, "row must be an object"))?;
        let mut columns = Vec::with_capacity(object.len());
        let mut values = Vec::with_capacity(object.len());
        for (column, value) in object {
            if !table.has_column(column) {
                return Err(BackendError::rejected(
                    table.as_str(),
                    400,
                    format!("unknown column '{column}'"),
                ));
            }
            columns.push(column.clone());
            values.push(to_sql(value));
        }
        Ok((columns, values))
    }

    fn query_rows(
        conn: &Connection,
        table: Table,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Vec<Row>, BackendError> {
        let mut stmt = conn.prepare(sql).map_err(|e| sql_error(table, e))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                let mut object = Map::new();
                for (index, name) in names.iter().enumerate() {
                    object.insert(name.clone(), to_json(row.get_ref(index)?));
                }
                Ok(Value::Object(object))
            })
            .map_err(|e| sql_error(table, e))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| sql_error(table, e))?);
        }
        Ok(result)
    }

    /// SQLite-backed relational store for running the server without the
    /// hosted backend.
    #[derive(Clone)]
    pub struct Database {
        conn: Arc<Mutex<Connection>>,
    }

    impl Database {
        pub fn new(db_path: &str) -> Result<Self, rusqlite::Error> {
            let conn = Connection::open(db_path)?;
            log!("[DB] Database connection established at: {}", db_path);
            Ok(Database {
                conn: Arc::new(Mutex::new(conn)),
            })
        }

        pub async fn create_schema(&self) -> Result<(), rusqlite::Error> {
            let conn = self.conn.lock().await;

            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );",
            )
            .map_err(|e| {
                error!("[DB] Failed creating profiles table: {}", e);
                e
            })?;

            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS reviews (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT,
                    username TEXT NOT NULL,
                    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                    comment TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );",
            )
            .map_err(|e| {
                error!("[DB] Failed creating reviews table: {}", e);
                e
            })?;

            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS profile_pics (
                    user_id TEXT PRIMARY KEY,
                    file_name TEXT NOT NULL DEFAULT '',
                    public_url TEXT NOT NULL
                );",
            )
            .map_err(|e| {
                error!("[DB] Failed creating profile_pics table: {}", e);
                e
            })?;

            Ok(())
        }
    }

    #[async_trait(?Send)]
    impl RelationalStore for Database {
        async fn select(&self, query: &Select) -> Result<Vec<Row>, BackendError> {
            query.validate()?;
            let columns = if query.columns.is_empty() {
                "*".to_string()
            } else {
                query.columns.join(", ")
            };
            let mut params = Vec::new();
            let mut sql = format!("SELECT {columns} FROM {}", query.table);
            sql.push_str(&where_clause(&query.filters, &mut params));
            if let Some(order) = query.order {
                let direction = if order.ascending { "ASC" } else { "DESC" };
                sql.push_str(&format!(" ORDER BY {} {direction}", order.column));
            }

            let conn = self.conn.lock().await;
            let rows = query_rows(&conn, query.table, &sql, params)?;
            log!("[DB] {} rows from {}", rows.len(), query.table);
            Ok(rows)
        }

        async fn insert(&self, table: Table, row: Row) -> Result<Row, BackendError> {
            let (columns, values) = row_columns(table, &row)?;
            let marks = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({marks})",
                columns.join(", ")
            );

            let conn = self.conn.lock().await;
            conn.execute(&sql, params_from_iter(values))
                .map_err(|e| sql_error(table, e))?;
            let rowid = conn.last_insert_rowid();
            query_rows(
                &conn,
                table,
                &format!("SELECT * FROM {table} WHERE rowid = ?"),
                vec![SqlValue::Integer(rowid)],
            )?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(format!("inserted {table} row")))
        }

        async fn upsert(
            &self,
            table: Table,
            row: Row,
            conflict_key: &'static str,
        ) -> Result<Row, BackendError> {
            let key = row.get(conflict_key).map(to_sql).ok_or_else(|| {
                BackendError::rejected(table.as_str(), 400, format!("missing '{conflict_key}'"))
            })?;
            let (columns, values) = row_columns(table, &row)?;
            let marks = vec!["?"; columns.len()].join(", ");
            let updates: Vec<String> = columns
                .iter()
                .filter(|column| column.as_str() != conflict_key)
                .map(|column| format!("{column} = excluded.{column}"))
                .collect();
            let action = if updates.is_empty() {
                "NOTHING".to_string()
            } else {
                format!("UPDATE SET {}", updates.join(", "))
            };
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({marks}) ON CONFLICT({conflict_key}) DO {action}",
                columns.join(", ")
            );

            let mut conn = self.conn.lock().await;
            let tx = conn.transaction().map_err(|e| sql_error(table, e))?;
            tx.execute(&sql, params_from_iter(values))
                .map_err(|e| sql_error(table, e))?;
            let stored = query_rows(
                &tx,
                table,
                &format!("SELECT * FROM {table} WHERE {conflict_key} = ?"),
                vec![key],
            )?;
            tx.commit().map_err(|e| sql_error(table, e))?;
            stored
                .into_iter()
                .next()
                .ok_or_else(|| BackendError::not_found(format!("upserted {table} row")))
        }

        async fn update(
            &self,
            table: Table,
            filters: &[Filter],
            patch: Row,
        ) -> Result<Vec<Row>, BackendError> {
            let (columns, mut params) = row_columns(table, &patch)?;
            if columns.is_empty() {
                return Ok(Vec::new());
            }
            let assignments: Vec<String> =
                columns.iter().map(|column| format!("{column} = ?")).collect();
            let mut filter_params = Vec::new();
            let clause = where_clause(filters, &mut filter_params);
            params.extend(filter_params.iter().cloned());
            let sql = format!("UPDATE {table} SET {}{clause}", assignments.join(", "));

            let mut conn = self.conn.lock().await;
            let tx = conn.transaction().map_err(|e| sql_error(table, e))?;
            let changed = tx
                .execute(&sql, params_from_iter(params))
                .map_err(|e| sql_error(table, e))?;
            let rows = query_rows(&tx, table, &format!("SELECT * FROM {table}{clause}"), filter_params)?;
            tx.commit().map_err(|e| sql_error(table, e))?;
            log!("[DB] Updated {changed} rows in {table}");
            Ok(rows)
        }
    }

}

#[cfg(feature = "ssr")]
pub use db_impl::Database;
