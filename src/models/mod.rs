//! Data models for the review server.
//!
//! These are plain records loaded from SQLite. They derive `FromRow` for
//! queries and `Serialize` where they cross the API boundary. Rules that
//! only need the record itself (and whatever related records the caller
//! already loaded) live here as methods; rules that need more queries live
//! in `services`.

pub mod api_token;
pub mod comment;
pub mod diff;
pub mod file_attachment;
pub mod local_site;
pub mod repository;
pub mod review;
pub mod review_request;
pub mod token_policy;
pub mod user;

pub use api_token::{NewApiToken, WebApiToken};
pub use comment::{Comment, FileAttachmentComment};
pub use diff::{DiffSet, FileDiff};
pub use file_attachment::FileAttachment;
pub use local_site::LocalSite;
pub use repository::Repository;
pub use review::Review;
pub use review_request::{ReviewRequest, ReviewRequestStatus};
pub use user::User;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Convert a stored Unix timestamp to a UTC date/time.
pub fn to_datetime(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp, 0).unwrap_or_default()
}

/// Render a stored Unix timestamp as ISO-8601.
pub fn to_iso8601(timestamp: i64) -> String {
    to_datetime(timestamp).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a JSON-object column, treating anything malformed as empty.
pub fn parse_json_object(raw: &str) -> Map<String, Value> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_iso8601() {
        assert_eq!(to_iso8601(0), "1970-01-01T00:00:00Z");
        assert_eq!(to_iso8601(1_504_797_620), "2017-09-07T15:20:20Z");
    }

    #[test]
    fn test_parse_json_object_tolerates_garbage() {
        assert!(parse_json_object("not json").is_empty());
        assert!(parse_json_object("[1, 2]").is_empty());
        assert_eq!(parse_json_object(r#"{"a": 1}"#).get("a"), Some(&Value::from(1)));
    }
}
