use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a JSON string column into a concrete type, returning CorruptRow on
/// parse failure.
pub fn parse_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: format!("invalid JSON: {e}"),
    })
}

/// Parse a string into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

/// Parse a required RFC 3339 timestamp column.
pub fn parse_ts(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            column,
            detail: format!("invalid timestamp: {e}"),
        })
}

/// Parse an optional RFC 3339 timestamp column.
pub fn parse_ts_opt(
    raw: Option<String>,
    table: &'static str,
    column: &'static str,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|s| parse_ts(&s, table, column)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::ticket::TicketStatus;

    #[test]
    fn parse_enum_success() {
        let result: Result<TicketStatus, _> = parse_enum("open", "activities", "status");
        assert!(result.is_ok());
    }

    #[test]
    fn parse_enum_failure() {
        let result: Result<TicketStatus, _> = parse_enum("INVALID", "activities", "status");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "activities", column: "status", .. })
        ));
    }

    #[test]
    fn parse_json_success() {
        let value: serde_json::Value = parse_json(r#"{"key": "value"}"#, "activities", "custom_fields").unwrap();
        assert_eq!(value["key"], "value");
    }

    #[test]
    fn parse_json_failure() {
        let result: Result<serde_json::Value, _> =
            parse_json("not valid json", "activities", "detail");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "activities", column: "detail", .. })
        ));
    }

    #[test]
    fn parse_ts_roundtrip() {
        let now = Utc::now();
        let parsed = parse_ts(&now.to_rfc3339(), "activities", "created_at").unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn parse_ts_failure() {
        let result = parse_ts("yesterday", "activities", "created_at");
        assert!(matches!(result, Err(StoreError::CorruptRow { .. })));
    }

    #[test]
    fn parse_ts_opt_handles_none() {
        assert_eq!(parse_ts_opt(None, "activities", "due_date").unwrap(), None);
        let now = Utc::now();
        let parsed = parse_ts_opt(Some(now.to_rfc3339()), "activities", "due_date").unwrap();
        assert_eq!(parsed, Some(now));
    }
}
