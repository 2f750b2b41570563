//! Comment models: diff comments and file attachment comments.

use serde::Serialize;
use sqlx::FromRow;

/// Comment on a range of lines in a file diff, or in an interdiff between
/// two file diffs.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,

    /// Review the comment belongs to.
    pub review_id: i64,

    pub filediff_id: i64,

    /// Second side of an interdiff comment.
    pub interfilediff_id: Option<i64>,

    pub first_line: i64,
    pub num_lines: i64,

    /// Comment content (Markdown).
    pub text: String,

    /// Whether the comment opens an issue.
    pub issue_opened: bool,

    pub timestamp: i64,

    pub extra_data: String,
}

impl Comment {
    pub fn is_interdiff(&self) -> bool {
        self.interfilediff_id.is_some()
    }

    pub fn last_line(&self) -> i64 {
        self.first_line + self.num_lines.max(1) - 1
    }
}

/// Comment on a file attachment, optionally against an older revision of it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileAttachmentComment {
    pub id: i64,
    pub review_id: i64,
    pub file_attachment_id: i64,
    pub diff_against_file_attachment_id: Option<i64>,
    pub text: String,
    pub issue_opened: bool,
    pub timestamp: i64,
    pub extra_data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line() {
        let comment = Comment {
            id: 1,
            review_id: 1,
            filediff_id: 1,
            interfilediff_id: None,
            first_line: 10,
            num_lines: 5,
            text: "Nit".to_string(),
            issue_opened: false,
            timestamp: 0,
            extra_data: "{}".to_string(),
        };
        assert_eq!(comment.last_line(), 14);
        assert!(!comment.is_interdiff());
    }
}
