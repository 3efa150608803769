//! Synthesized responses for write statements on the fallback path.

use sqlbridge_core::row::{ColumnInfo, ResultSet, Row};
use sqlbridge_core::value::Value;
use std::sync::Arc;

/// Build the single-row result set reported after a successful write.
///
/// Columns are `status`, `affected_rows`, `message`, in that order, so
/// callers can read the outcome of a write the same way they read a query
/// result. Counts beyond `i64::MAX` are carried as text rather than lost.
pub fn success_row(affected_rows: u64) -> ResultSet {
    let columns = Arc::new(ColumnInfo::new(vec![
        "status".to_string(),
        "affected_rows".to_string(),
        "message".to_string(),
    ]));
    let affected = i64::try_from(affected_rows)
        .map_or_else(|_| Value::Text(affected_rows.to_string()), Value::BigInt);
    let row = Row::new(
        Arc::clone(&columns),
        vec![
            Value::Text("success".to_string()),
            affected,
            Value::Text("Statement executed successfully".to_string()),
        ],
    );
    ResultSet::new(columns, vec![row])
}
