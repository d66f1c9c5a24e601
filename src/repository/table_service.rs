//! Generic CRUD over the hotel schema.
//!
//! Rows travel as `serde_json::Value` objects (`row_to_json` on the way out,
//! `jsonb_populate_record` on the way in) so Postgres resolves column types
//! (uuid, enum, date, numeric) from the table definition. Every table and
//! column name is validated against an allow-list before it reaches SQL.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};

use crate::error::AppError;

const ALLOWED_TABLES: &[&str] = &[
    "admin_users",
    "booking_services",
    "bookings",
    "guests",
    "hotel_profile",
    "rooms",
    "services",
];

pub async fn list_rows(
    pool: &PgPool,
    table: &str,
    filters: Option<&Map<String, Value>>,
    limit: i64,
    offset: i64,
    order_by: &str,
    ascending: bool,
) -> Result<Vec<Value>, AppError> {
    let table_name = validate_table(table)?;
    let order_name = if order_by.trim().is_empty() {
        "created_at"
    } else {
        validate_identifier(order_by)?
    };

    let mut query = QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM ");
    query.push(table_name).push(" t WHERE 1=1");
    push_filters(&mut query, filters)?;

    query.push(" ORDER BY t.").push(order_name);
    query.push(if ascending { " ASC" } else { " DESC" });
    query
        .push(" LIMIT ")
        .push_bind(limit.clamp(1, 1000))
        .push(" OFFSET ")
        .push_bind(offset.max(0));

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_rows(rows))
}

pub async fn get_row(
    pool: &PgPool,
    table: &str,
    row_id: &str,
    id_field: &str,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM ");
    query.push(table_name).push(" t WHERE ");
    push_comparison(
        &mut query,
        id_name,
        "=",
        &infer_scalar(id_name, &Value::String(row_id.to_string())),
    );
    query.push(" LIMIT 1");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    first_row(row).ok_or_else(|| AppError::NotFound(format!("{table_name} record not found.")))
}

pub async fn create_row(
    pool: &PgPool,
    table: &str,
    payload: &Map<String, Value>,
) -> Result<Value, AppError> {
    let mut query = build_insert(table, payload)?;
    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;
    first_row(row).ok_or_else(|| AppError::Internal(format!("Could not create {table} record.")))
}

/// Same as `create_row` but executes on an existing transaction.
pub async fn create_row_tx(
    conn: &mut PgConnection,
    table: &str,
    payload: &Map<String, Value>,
) -> Result<Value, AppError> {
    let mut query = build_insert(table, payload)?;
    let row = query
        .build()
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;
    first_row(row).ok_or_else(|| AppError::Internal(format!("Could not create {table} record.")))
}

pub async fn update_row(
    pool: &PgPool,
    table: &str,
    row_id: &str,
    payload: &Map<String, Value>,
    id_field: &str,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;
    if payload.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let keys = sorted_keys(payload)?;

    let mut query = QueryBuilder::<Postgres>::new("UPDATE ");
    query.push(table_name).push(" t SET ");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push(key.as_str());
            separated.push_unseparated(" = r.");
            separated.push_unseparated(key.as_str());
        }
    }
    query
        .push(" FROM jsonb_populate_record(NULL::")
        .push(table_name)
        .push(", ");
    query.push_bind(Value::Object(payload.clone()));
    query.push(") r WHERE ");
    push_comparison(
        &mut query,
        id_name,
        "=",
        &infer_scalar(id_name, &Value::String(row_id.to_string())),
    );
    query.push(" RETURNING row_to_json(t) AS row");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    first_row(row).ok_or_else(|| AppError::NotFound(format!("{table_name} record not found.")))
}

pub async fn delete_row(
    pool: &PgPool,
    table: &str,
    row_id: &str,
    id_field: &str,
) -> Result<Value, AppError> {
    let existing = get_row(pool, table, row_id, id_field).await?;
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;

    let mut query = QueryBuilder::<Postgres>::new("DELETE FROM ");
    query.push(table_name).push(" t WHERE ");
    push_comparison(
        &mut query,
        id_name,
        "=",
        &infer_scalar(id_name, &Value::String(row_id.to_string())),
    );
    query.build().execute(pool).await.map_err(map_db_error)?;

    Ok(existing)
}

pub async fn count_rows(
    pool: &PgPool,
    table: &str,
    filters: Option<&Map<String, Value>>,
) -> Result<i64, AppError> {
    let table_name = validate_table(table)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*)::bigint AS total FROM ");
    query.push(table_name).push(" t WHERE 1=1");
    push_filters(&mut query, filters)?;

    let row = query.build().fetch_one(pool).await.map_err(map_db_error)?;
    Ok(row.try_get::<i64, _>("total").unwrap_or(0))
}

/// Count on an open transaction (booking codes are derived from a same-day
/// count that must see rows inserted earlier in the transaction).
pub async fn count_rows_tx(
    conn: &mut PgConnection,
    table: &str,
    filters: Option<&Map<String, Value>>,
) -> Result<i64, AppError> {
    let table_name = validate_table(table)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*)::bigint AS total FROM ");
    query.push(table_name).push(" t WHERE 1=1");
    push_filters(&mut query, filters)?;

    let row = query
        .build()
        .fetch_one(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(row.try_get::<i64, _>("total").unwrap_or(0))
}

fn build_insert<'a>(
    table: &str,
    payload: &Map<String, Value>,
) -> Result<QueryBuilder<'a, Postgres>, AppError> {
    let table_name = validate_table(table)?;
    if payload.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Could not create {table_name} record."
        )));
    }
    let keys = sorted_keys(payload)?;

    let mut query = QueryBuilder::<Postgres>::new("INSERT INTO ");
    query.push(table_name).push(" (");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push(key.as_str());
        }
    }
    query.push(") SELECT ");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push("r.");
            separated.push_unseparated(key.as_str());
        }
    }
    query
        .push(" FROM jsonb_populate_record(NULL::")
        .push(table_name)
        .push(", ");
    query.push_bind(Value::Object(payload.clone()));
    query
        .push(") r RETURNING row_to_json(")
        .push(table_name)
        .push(".*) AS row");
    Ok(query)
}

// ── Filters ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    ILike,
    In,
    NotIn,
}

#[derive(Debug, Clone)]
enum Scalar {
    Text(String),
    Uuid(uuid::Uuid),
    Bool(bool),
    I64(i64),
    F64(f64),
    Date(NaiveDate),
    Timestamp(DateTime<FixedOffset>),
}

fn push_filters(
    query: &mut QueryBuilder<Postgres>,
    filters: Option<&Map<String, Value>>,
) -> Result<(), AppError> {
    let Some(filter_map) = filters else {
        return Ok(());
    };
    for (key, value) in filter_map {
        push_filter_clause(query, key, value)?;
    }
    Ok(())
}

fn push_filter_clause(
    query: &mut QueryBuilder<Postgres>,
    filter_key: &str,
    value: &Value,
) -> Result<(), AppError> {
    let (column, operator) = parse_filter_key(filter_key)?;

    match (operator, value) {
        (_, Value::Null) => Ok(()),
        (FilterOperator::In | FilterOperator::NotIn, Value::Array(items)) => {
            if items.is_empty() {
                // Empty `__in` matches nothing rather than everything.
                if operator == FilterOperator::In {
                    query.push(" AND FALSE");
                }
                return Ok(());
            }
            query.push(" AND t.").push(column);
            if is_uuid_column(column) {
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    let text = item.as_str().unwrap_or_default();
                    let id = uuid::Uuid::parse_str(text.trim()).map_err(|_| {
                        AppError::BadRequest(format!("Invalid id value for '{column}'."))
                    })?;
                    ids.push(id);
                }
                push_any(query, operator, |q| {
                    q.push_bind(ids.clone());
                });
            } else {
                let texts = items
                    .iter()
                    .map(|item| item.as_str().unwrap_or_default().to_string())
                    .collect::<Vec<_>>();
                query.push("::text");
                push_any(query, operator, |q| {
                    q.push_bind(texts.clone());
                });
            }
            Ok(())
        }
        (FilterOperator::In | FilterOperator::NotIn, _) => Err(AppError::BadRequest(format!(
            "Filter '{filter_key}' requires an array value."
        ))),
        (_, Value::Array(_)) => Err(AppError::BadRequest(format!(
            "Filter '{filter_key}' does not accept array values."
        ))),
        _ => {
            query.push(" AND ");
            let scalar = infer_scalar(column, value);
            push_comparison(query, column, sql_operator(operator), &scalar);
            Ok(())
        }
    }
}

fn push_any<F>(query: &mut QueryBuilder<Postgres>, operator: FilterOperator, bind: F)
where
    F: FnOnce(&mut QueryBuilder<Postgres>),
{
    if operator == FilterOperator::NotIn {
        query.push(" <> ALL(");
    } else {
        query.push(" = ANY(");
    }
    bind(query);
    query.push(")");
}

fn push_comparison(
    query: &mut QueryBuilder<Postgres>,
    column: &str,
    sql_operator: &str,
    value: &Scalar,
) {
    query.push("t.").push(column);
    match value {
        Scalar::Text(text) => {
            query
                .push("::text ")
                .push(sql_operator)
                .push(" ")
                .push_bind(text.clone());
        }
        Scalar::Uuid(id) => {
            query.push(" ").push(sql_operator).push(" ").push_bind(*id);
        }
        Scalar::Bool(flag) => {
            query
                .push(" ")
                .push(sql_operator)
                .push(" ")
                .push_bind(*flag);
        }
        Scalar::I64(number) => {
            query
                .push(" ")
                .push(sql_operator)
                .push(" ")
                .push_bind(*number);
        }
        Scalar::F64(number) => {
            query
                .push(" ")
                .push(sql_operator)
                .push(" ")
                .push_bind(*number);
        }
        Scalar::Date(date) => {
            query
                .push(" ")
                .push(sql_operator)
                .push(" ")
                .push_bind(*date);
        }
        Scalar::Timestamp(at) => {
            query
                .push(" ")
                .push(sql_operator)
                .push(" ")
                .push_bind(at.to_owned());
        }
    }
}

fn sql_operator(operator: FilterOperator) -> &'static str {
    match operator {
        FilterOperator::Eq | FilterOperator::In => "=",
        FilterOperator::Ne | FilterOperator::NotIn => "<>",
        FilterOperator::Gt => ">",
        FilterOperator::Gte => ">=",
        FilterOperator::Lt => "<",
        FilterOperator::Lte => "<=",
        FilterOperator::ILike => "ILIKE",
    }
}

fn parse_filter_key(filter_key: &str) -> Result<(&str, FilterOperator), AppError> {
    if let Some((column, suffix)) = filter_key.rsplit_once("__") {
        let operator = match suffix {
            "ne" => Some(FilterOperator::Ne),
            "gt" => Some(FilterOperator::Gt),
            "gte" => Some(FilterOperator::Gte),
            "lt" => Some(FilterOperator::Lt),
            "lte" => Some(FilterOperator::Lte),
            "ilike" => Some(FilterOperator::ILike),
            "in" => Some(FilterOperator::In),
            "not_in" => Some(FilterOperator::NotIn),
            _ => None,
        };
        if let Some(operator) = operator {
            return Ok((validate_identifier(column)?, operator));
        }
    }
    Ok((validate_identifier(filter_key)?, FilterOperator::Eq))
}

fn infer_scalar(column: &str, value: &Value) -> Scalar {
    match value {
        Value::Bool(flag) => Scalar::Bool(*flag),
        Value::Number(number) => {
            if let Some(as_i64) = number.as_i64() {
                Scalar::I64(as_i64)
            } else if let Some(as_f64) = number.as_f64() {
                Scalar::F64(as_f64)
            } else {
                Scalar::Text(number.to_string())
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if is_uuid_column(column) {
                if let Ok(parsed) = uuid::Uuid::parse_str(trimmed) {
                    return Scalar::Uuid(parsed);
                }
            }
            if is_timestamp_column(column) {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
                    return Scalar::Timestamp(parsed);
                }
            }
            if is_date_column(column) {
                if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                    return Scalar::Date(parsed);
                }
            }
            Scalar::Text(text.clone())
        }
        other => Scalar::Text(other.to_string()),
    }
}

fn is_uuid_column(column: &str) -> bool {
    // hotel_profile.id is the literal text 'default', everything else is uuid
    column.ends_with("_id") || column == "id"
}

fn is_date_column(column: &str) -> bool {
    matches!(column, "check_in" | "check_out")
}

fn is_timestamp_column(column: &str) -> bool {
    column.ends_with("_at")
}

// ── Plumbing ────────────────────────────────────────────────────────

fn read_rows(rows: Vec<PgRow>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| row.try_get::<Option<Value>, _>("row").ok().flatten())
        .collect()
}

fn first_row(row: Option<PgRow>) -> Option<Value> {
    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
}

fn sorted_keys(payload: &Map<String, Value>) -> Result<Vec<String>, AppError> {
    let mut keys = payload.keys().cloned().collect::<Vec<_>>();
    keys.sort_unstable();
    for key in &keys {
        validate_identifier(key)?;
    }
    Ok(keys)
}

fn validate_table(table: &str) -> Result<&str, AppError> {
    let normalized = validate_identifier(table)?;
    if ALLOWED_TABLES.contains(&normalized) {
        return Ok(normalized);
    }
    Err(AppError::Forbidden(format!(
        "Table '{normalized}' is not allowed."
    )))
}

fn validate_identifier(identifier: &str) -> Result<&str, AppError> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "Identifier cannot be empty.".to_string(),
        ));
    }
    if !trimmed.chars().all(|character| {
        character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
    }) {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    if trimmed
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_digit())
    {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    Ok(trimmed)
}

pub(crate) fn map_db_error(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_error) = error {
        match db_error.code().as_deref() {
            // unique_violation: duplicate email, room number, booking code …
            Some("23505") => {
                return AppError::Conflict("Conflict: unique field already exists.".to_string());
            }
            // foreign_key_violation: e.g. deleting a room with bookings
            Some("23503") => {
                return AppError::Conflict(
                    "Conflict: related records prevent this action.".to_string(),
                );
            }
            _ => {}
        }
    }
    tracing::error!(db_error = %error, "Database query failed");
    AppError::Dependency("Database operation failed.".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{
        parse_filter_key, push_filter_clause, validate_identifier, validate_table, FilterOperator,
    };
    use sqlx::{Postgres, QueryBuilder};

    #[test]
    fn parses_operator_suffixes() {
        assert_eq!(
            parse_filter_key("check_in__gte").unwrap(),
            ("check_in", FilterOperator::Gte)
        );
        assert_eq!(
            parse_filter_key("id__in").unwrap(),
            ("id", FilterOperator::In)
        );
        assert_eq!(
            parse_filter_key("status__not_in").unwrap(),
            ("status", FilterOperator::NotIn)
        );
        assert_eq!(
            parse_filter_key("status").unwrap(),
            ("status", FilterOperator::Eq)
        );
    }

    #[test]
    fn rejects_unknown_tables_and_bad_identifiers() {
        assert!(validate_table("bookings").is_ok());
        assert!(validate_table("pg_catalog").is_err());
        assert!(validate_identifier("booking_code").is_ok());
        assert!(validate_identifier("1bad").is_err());
        assert!(validate_identifier("drop table").is_err());
    }

    #[test]
    fn date_filters_bind_typed_values() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM bookings t WHERE 1=1");
        push_filter_clause(&mut query, "check_in__lt", &json!("2026-03-17")).unwrap();
        push_filter_clause(&mut query, "check_out__gt", &json!("2026-03-15")).unwrap();
        let sql = query.sql().to_string();
        assert!(sql.contains("t.check_in < "), "got: {sql}");
        assert!(sql.contains("t.check_out > "), "got: {sql}");
    }

    #[test]
    fn empty_in_filter_matches_nothing() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM services t WHERE 1=1");
        push_filter_clause(&mut query, "id__in", &Value::Array(vec![])).unwrap();
        assert!(query.sql().contains("AND FALSE"));
    }

    #[test]
    fn not_in_uses_all_binding() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM bookings t WHERE 1=1");
        push_filter_clause(
            &mut query,
            "status__not_in",
            &json!(["CANCELED", "NO_SHOW"]),
        )
        .unwrap();
        assert!(query.sql().contains("<> ALL("), "got: {}", query.sql());
    }

    #[test]
    fn null_filters_are_skipped() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM rooms t WHERE 1=1");
        let mut filters = Map::new();
        filters.insert("status".to_string(), Value::Null);
        super::push_filters(&mut query, Some(&filters)).unwrap();
        assert_eq!(query.sql(), "SELECT 1 FROM rooms t WHERE 1=1");
    }
}
