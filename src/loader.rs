//! CSV import for the feedback kanban importer.
//!
//! Imported rows live only in the admin's session and are never written to
//! the store. The parser is deliberately forgiving: columns are found by
//! substring match on the header, values are split on plain commas and
//! unknown types or statuses fall back to defaults.

use crate::error::AppError;
use crate::models::{FeedbackStatus, FeedbackType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column names every import must provide, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 5] = ["type", "module", "title", "description", "status"];

pub const SAMPLE_FILE_NAME: &str = "sample-feedback.csv";

const SAMPLE_ROWS: [[&str; 5]; 5] = [
    ["Type", "Module", "Title", "Description", "Status"],
    [
        "bug_report",
        "Authentication",
        "Login fails with special characters",
        "Users cannot login when password contains special characters like @#$",
        "to_discuss",
    ],
    [
        "suggestion",
        "UI/UX",
        "Add dark mode toggle",
        "Users would like a dark mode option in the settings menu",
        "low",
    ],
    [
        "general_comment",
        "Performance",
        "Page loads slowly",
        "The dashboard takes more than 5 seconds to load on mobile devices",
        "high",
    ],
    [
        "bug_report",
        "Database",
        "Data not saving correctly",
        "User profile changes are not being persisted to the database",
        "to_implement",
    ],
];

/// A feedback row parsed from an uploaded CSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedFeedback {
    /// `imported-<upload millis>-<line number>`
    pub id: String,
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    pub module: String,
    pub title: String,
    pub description: String,
    pub status: FeedbackStatus,
    /// Hours.
    pub development_estimate: f64,
    pub created_at: DateTime<Utc>,
}

/// Why an upload was rejected. Each variant carries the message shown to
/// the admin.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ImportFailure {
    NotCsv,
    TooShort,
    MissingColumns(Vec<&'static str>),
    NoRows,
    Unreadable,
}

impl ImportFailure {
    fn message(&self) -> String {
        match self {
            Self::NotCsv => "Please select a valid CSV file.".to_string(),
            Self::TooShort => {
                "CSV file must contain at least a header row and one data row.".to_string()
            }
            Self::MissingColumns(columns) => {
                format!("Missing required columns: {}", columns.join(", "))
            }
            Self::NoRows => "No valid feedback entries found in the CSV file.".to_string(),
            Self::Unreadable => {
                "Error parsing CSV file. Please check the format and try again.".to_string()
            }
        }
    }
}

impl From<ImportFailure> for AppError {
    fn from(failure: ImportFailure) -> Self {
        AppError::import(failure.message())
    }
}

/// Parse an uploaded feedback CSV
///
/// The file is accepted when either the browser reported `text/csv` or the
/// name ends in `.csv`. The header row must mention each of
/// [`REQUIRED_COLUMNS`]; data lines with fewer than five values are skipped.
///
/// # Arguments
/// * `file_name` - Name of the uploaded file
/// * `content_type` - MIME type reported with the upload, if any
/// * `bytes` - Raw file contents
///
/// # Returns
/// * `Result<Vec<ImportedFeedback>, AppError>` - Parsed rows, or an
///   `AppError::Import` carrying the message to show
///
/// # Examples
/// ```
/// use beta_portal::loader::parse_feedback_csv;
///
/// let csv = "Type,Module,Title,Description,Status\nbug,Auth,Crash,Boom,high";
/// let rows = parse_feedback_csv("board.csv", None, csv.as_bytes()).unwrap();
/// assert_eq!(rows.len(), 1);
/// ```
pub fn parse_feedback_csv(
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<Vec<ImportedFeedback>, AppError> {
    if content_type != Some("text/csv") && !file_name.ends_with(".csv") {
        return Err(ImportFailure::NotCsv.into());
    }
    let text = std::str::from_utf8(bytes).map_err(|_| ImportFailure::Unreadable)?;
    Ok(parse_lines(text, Utc::now())?)
}

fn parse_lines(text: &str, now: DateTime<Utc>) -> Result<Vec<ImportedFeedback>, ImportFailure> {
    let lines: Vec<&str> = text.split('\n').filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Err(ImportFailure::TooShort);
    }

    let headers: Vec<String> = lines[0]
        .split(',')
        .map(|h| h.trim().to_lowercase())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h.contains(name));

    let missing: Vec<&'static str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| column(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ImportFailure::MissingColumns(missing));
    }

    let index = |name: &str| column(name).ok_or(ImportFailure::Unreadable);
    let (type_idx, module_idx, title_idx, description_idx, status_idx) = (
        index("type")?,
        index("module")?,
        index("title")?,
        index("description")?,
        index("status")?,
    );

    let millis = now.timestamp_millis();
    let mut rows = Vec::new();
    for (line_no, line) in lines.iter().enumerate().skip(1) {
        let values: Vec<&str> = line.split(',').map(clean_value).collect();
        if values.len() < REQUIRED_COLUMNS.len() {
            continue;
        }
        let value = |idx: usize| values.get(idx).copied().unwrap_or("");
        let or_default = |idx: usize, fallback: &str| {
            let v = value(idx);
            if v.is_empty() { fallback.to_string() } else { v.to_string() }
        };

        rows.push(ImportedFeedback {
            id: format!("imported-{}-{}", millis, line_no),
            feedback_type: map_type(value(type_idx)),
            module: or_default(module_idx, "Unknown"),
            title: or_default(title_idx, "Untitled"),
            description: or_default(description_idx, "No description"),
            status: map_status(value(status_idx)),
            development_estimate: 0.0,
            created_at: now,
        });
    }

    if rows.is_empty() {
        return Err(ImportFailure::NoRows);
    }
    Ok(rows)
}

/// Trim, then drop one leading and one trailing double quote.
fn clean_value(raw: &str) -> &str {
    let v = raw.trim();
    let v = v.strip_prefix('"').unwrap_or(v);
    v.strip_suffix('"').unwrap_or(v)
}

fn map_type(raw: &str) -> FeedbackType {
    let raw = raw.to_lowercase();
    if raw.contains("bug") {
        FeedbackType::BugReport
    } else if raw.contains("suggestion") {
        FeedbackType::Suggestion
    } else {
        FeedbackType::GeneralComment
    }
}

fn map_status(raw: &str) -> FeedbackStatus {
    let raw = raw.to_lowercase();
    if raw.contains("low") {
        FeedbackStatus::Low
    } else if raw.contains("high") {
        FeedbackStatus::High
    } else if raw.contains("implement") {
        FeedbackStatus::ToImplement
    } else {
        FeedbackStatus::ToDiscuss
    }
}

/// Example import file: every cell quoted, one row per board column.
pub fn sample_csv() -> String {
    SAMPLE_ROWS
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| format!("\"{}\"", cell))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import_error(result: Result<Vec<ImportedFeedback>, AppError>) -> String {
        match result {
            Err(AppError::Import { message }) => message,
            other => panic!("expected import error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_csv_upload() {
        let message = import_error(parse_feedback_csv("notes.txt", Some("text/plain"), b"a,b"));
        assert_eq!(message, "Please select a valid CSV file.");
    }

    #[test]
    fn test_accepts_csv_content_type_without_extension() {
        let csv = "type,module,title,description,status\nbug,A,B,C,low";
        let rows = parse_feedback_csv("upload", Some("text/csv"), csv.as_bytes()).unwrap();
        assert_eq!(rows[0].status, FeedbackStatus::Low);
    }

    #[test]
    fn test_header_only_is_too_short() {
        let message = import_error(parse_feedback_csv(
            "a.csv",
            None,
            b"type,module,title,description,status\n\n  \n",
        ));
        assert_eq!(
            message,
            "CSV file must contain at least a header row and one data row."
        );
    }

    #[test]
    fn test_missing_status_column() {
        let csv = "Type,Module,Title,Description\nbug,A,B,C";
        let message = import_error(parse_feedback_csv("a.csv", None, csv.as_bytes()));
        assert_eq!(message, "Missing required columns: status");
    }

    #[test]
    fn test_missing_columns_listed_in_order() {
        let csv = "Module,Status\nA,low";
        let message = import_error(parse_feedback_csv("a.csv", None, csv.as_bytes()));
        assert_eq!(message, "Missing required columns: type, title, description");
    }

    #[test]
    fn test_short_lines_are_skipped() {
        let csv = "type,module,title,description,status\nbug,A,B\nsuggestion,UI,Dark mode,Please,high";
        let rows = parse_feedback_csv("a.csv", None, csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].feedback_type, FeedbackType::Suggestion);
        assert_eq!(rows[0].status, FeedbackStatus::High);
        assert!(rows[0].id.ends_with("-2"));
    }

    #[test]
    fn test_only_short_lines_yields_no_entries() {
        let csv = "type,module,title,description,status\nbug,A,B";
        let message = import_error(parse_feedback_csv("a.csv", None, csv.as_bytes()));
        assert_eq!(message, "No valid feedback entries found in the CSV file.");
    }

    #[test]
    fn test_defaults_and_mapping() {
        let csv = "type,module,title,description,status\r\n\"Feature\",\"\",, ,\"Ready to implement\"\r\n";
        let rows = parse_feedback_csv("a.csv", None, csv.as_bytes()).unwrap();
        let row = &rows[0];
        assert_eq!(row.feedback_type, FeedbackType::GeneralComment);
        assert_eq!(row.module, "Unknown");
        assert_eq!(row.title, "Untitled");
        assert_eq!(row.description, "No description");
        assert_eq!(row.status, FeedbackStatus::ToImplement);
        assert_eq!(row.development_estimate, 0.0);
        assert!(row.id.starts_with("imported-"));
    }

    #[test]
    fn test_invalid_utf8_is_a_parse_error() {
        let message = import_error(parse_feedback_csv("a.csv", None, &[0xff, 0xfe, 0x00]));
        assert_eq!(
            message,
            "Error parsing CSV file. Please check the format and try again."
        );
    }

    #[test]
    fn test_sample_csv_imports_cleanly() {
        let sample = sample_csv();
        assert!(sample.starts_with("\"Type\",\"Module\""));
        let rows = parse_feedback_csv(SAMPLE_FILE_NAME, None, sample.as_bytes()).unwrap();
        let statuses: Vec<FeedbackStatus> = rows.iter().map(|r| r.status).collect();
        assert_eq!(statuses, FeedbackStatus::BOARD.to_vec());
        assert_eq!(rows[1].module, "UI/UX");
    }
}
