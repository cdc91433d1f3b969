//! CSV and Excel exports.
//!
//! CSV files are built the way the admin pages always produced them: values
//! joined with commas, lines joined with `\n`, and only the feedback comment
//! quoted. Kanban boards export as one worksheet per column.

use crate::error::AppError;
use crate::kanban::{Board, Card};
use crate::loader::ImportedFeedback;
use crate::models::{humanize, Feedback, FeedbackStatus, Platform, Tester};
use chrono::{DateTime, Utc};

pub const IMPORTED_BOARD_FILE: &str = "Imported-Feedback-Kanban.xlsx";
pub const FEEDBACK_BOARD_FILE: &str = "Feedback-Kanban.xlsx";

const TESTER_HEADERS: [&str; 7] = [
    "Name",
    "Email",
    "Device Type",
    "Device Model",
    "Experience",
    "Status",
    "Registration Date",
];

const FEEDBACK_HEADERS: [&str; 8] = [
    "Date",
    "Type",
    "Device Type",
    "Device Model",
    "Comment",
    "Email",
    "Anonymous",
    "Status",
];

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;
const MAX_COLUMN_WIDTH: usize = 50;

/// Short US-style date, e.g. `6/23/2025`.
pub fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%-m/%-d/%Y").to_string()
}

fn join_csv(headers: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    std::iter::once(headers.join(","))
        .chain(rows.map(|row| row.join(",")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `selected-beta-testers.csv` when exporting a selection, else `beta-testers.csv`.
pub fn testers_file_name(selected: bool) -> &'static str {
    if selected {
        "selected-beta-testers.csv"
    } else {
        "beta-testers.csv"
    }
}

pub fn feedback_file_name(selected: bool) -> &'static str {
    if selected {
        "selected-beta-feedback.csv"
    } else {
        "beta-feedback.csv"
    }
}

pub fn platform_file_name(platform: Platform) -> String {
    format!("{}-testers.csv", platform.as_str())
}

/// Export testers for the dashboard download
///
/// # Arguments
/// * `testers` - Rows to export, in display order
///
/// # Returns
/// * `String` - CSV content without a trailing newline
///
/// # Examples
/// ```
/// use beta_portal::downloader::testers_csv;
///
/// assert_eq!(
///     testers_csv(&[]),
///     "Name,Email,Device Type,Device Model,Experience,Status,Registration Date"
/// );
/// ```
pub fn testers_csv(testers: &[Tester]) -> String {
    join_csv(
        &TESTER_HEADERS,
        testers.iter().map(|t| {
            vec![
                t.full_name.clone(),
                t.email.clone(),
                t.device_type.to_string(),
                t.device_model.clone(),
                t.experience_level.to_string(),
                t.status.to_string(),
                format_date(&t.created_at),
            ]
        }),
    )
}

/// Export feedback for the dashboard download.
///
/// The comment is the only quoted value; anonymous rows show `N/A` as email.
pub fn feedback_csv(feedback: &[Feedback]) -> String {
    join_csv(
        &FEEDBACK_HEADERS,
        feedback.iter().map(|f| {
            vec![
                format_date(&f.created_at),
                humanize(f.feedback_type.as_str()),
                f.device_type.to_string(),
                f.device_model.clone(),
                format!("\"{}\"", f.comment.replace('"', "\"\"")),
                f.email.clone().unwrap_or_else(|| "N/A".to_string()),
                if f.is_anonymous { "Yes" } else { "No" }.to_string(),
                humanize(f.status.as_str()),
            ]
        }),
    )
}

/// Export testers in the layout the store's tester upload expects
///
/// Google Play takes bare emails; TestFlight also wants the name split into
/// first word and remainder.
pub fn platform_csv(platform: Platform, testers: &[Tester]) -> String {
    match platform {
        Platform::GooglePlay => join_csv(
            &["Email"],
            testers.iter().map(|t| vec![t.email.clone()]),
        ),
        Platform::AppStore => join_csv(
            &["Email", "First Name", "Last Name"],
            testers.iter().map(|t| {
                let (first, last) = t.split_name();
                vec![t.email.clone(), first, last]
            }),
        ),
    }
}

/// A card that can be written as a worksheet row.
pub trait SheetRow: Card {
    /// Headers preceding the estimate and created-date columns.
    const HEADERS: &'static [&'static str];

    /// Values matching [`SheetRow::HEADERS`].
    fn cells(&self) -> Vec<String>;
    fn created_at(&self) -> &DateTime<Utc>;
}

impl SheetRow for ImportedFeedback {
    const HEADERS: &'static [&'static str] = &["Type", "Module", "Title", "Description", "Status"];

    fn cells(&self) -> Vec<String> {
        vec![
            humanize(self.feedback_type.as_str()),
            self.module.clone(),
            self.title.clone(),
            self.description.clone(),
            humanize(self.status.as_str()),
        ]
    }

    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }
}

impl SheetRow for Feedback {
    const HEADERS: &'static [&'static str] = &[
        "Type",
        "Device Type",
        "Device Model",
        "Comment",
        "Email",
        "Status",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            humanize(self.feedback_type.as_str()),
            self.device_type.to_string(),
            self.device_model.clone(),
            self.comment.clone(),
            self.email.clone().unwrap_or_else(|| "N/A".to_string()),
            humanize(self.status.as_str()),
        ]
    }

    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }
}

/// One worksheet's worth of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Widest cell per column plus two, capped at 50.
    pub fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0);
                (longest + 2).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

/// Make a column title usable as a unique worksheet name.
fn sheet_name(title: &str, taken: &[String]) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(MAX_SHEET_NAME)
        .collect();
    let base = if cleaned.trim().is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    };

    let mut name = base.clone();
    let mut n = 2;
    while taken.iter().any(|t| t.eq_ignore_ascii_case(&name)) {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        name = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    name
}

/// Lay a board out as one sheet per column, in column order
///
/// The `to_implement` sheet gets a `Development Estimate` column (`"<n>
/// <unit>"`) before `Created Date`.
pub fn board_sheets<T: SheetRow>(board: &Board<T>) -> Vec<Sheet> {
    let mut sheets: Vec<Sheet> = Vec::new();
    for column in board.columns() {
        let with_estimate = column.id == FeedbackStatus::ToImplement;

        let mut headers: Vec<String> = T::HEADERS.iter().map(|h| h.to_string()).collect();
        if with_estimate {
            headers.push("Development Estimate".to_string());
        }
        headers.push("Created Date".to_string());

        let rows = board
            .cards_in(column.id)
            .into_iter()
            .map(|card| {
                let mut row = card.cells();
                if with_estimate {
                    row.push(format!("{} {}", card.estimate(), T::ESTIMATE_UNIT));
                }
                row.push(format_date(card.created_at()));
                row
            })
            .collect();

        let taken: Vec<String> = sheets.iter().map(|s| s.name.clone()).collect();
        sheets.push(Sheet {
            name: sheet_name(&column.title, &taken),
            headers,
            rows,
        });
    }
    sheets
}

/// Write sheets into an XLSX workbook
///
/// # Arguments
/// * `sheets` - Worksheets in tab order
///
/// # Returns
/// * `Result<Vec<u8>, AppError>` - XLSX file content, or an export error
#[cfg(feature = "web")]
pub fn to_xlsx(sheets: &[Sheet]) -> Result<Vec<u8>, AppError> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for sheet in sheets {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&sheet.name)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &bold)?;
        }
        for (r, row) in sheet.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                worksheet.write_string((r + 1) as u32, col as u16, value)?;
            }
        }
        for (col, width) in sheet.column_widths().into_iter().enumerate() {
            worksheet.set_column_width(col as u16, width as f64)?;
        }

        workbook.push_worksheet(worksheet);
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

/// Export a kanban board as an XLSX workbook.
#[cfg(feature = "web")]
pub fn board_xlsx<T: SheetRow>(board: &Board<T>) -> Result<Vec<u8>, AppError> {
    let sheets = board_sheets(board);
    if sheets.is_empty() {
        return Err(AppError::export("The board has no columns to export."));
    }
    to_xlsx(&sheets)
}
