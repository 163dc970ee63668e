//! Shared primitive type aliases.

/// Database identifier type matching BIGSERIAL columns.
pub type DbId = i64;

/// UTC timestamp type matching TIMESTAMPTZ columns.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
