//! Paginated text export of a report.
//!
//! The report is drawn into an off-screen ratatui [`Buffer`] with a fixed
//! paper style, then read back row by row and cut into pages. Lines and
//! segments flagged `exclude_from_export` never reach the buffer.

use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;

use miri_core::report::ReportDocument;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::style::Style;
use thiserror::Error;
use unicode_width::UnicodeWidthStr;

use crate::wrap::wrap_to_width;

pub const FORM_FEED: char = '\u{000C}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFormat {
    pub columns: u16,
    pub rows: u16,
}

impl PageFormat {
    /// Portrait A4 at a 10 cpi monospace font.
    pub const A4: Self = Self {
        columns: 80,
        rows: 70,
    };
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("page format needs at least one column and one row")]
    EmptyPage,

    #[error("report is too long to export ({rows} rows)")]
    TooLarge { rows: usize },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub pages: usize,
}

/// Paper background, independent of the live UI theme.
fn paper_style() -> Style {
    Style::default().fg(Color::Black).bg(Color::White)
}

/// Printable rows of `doc` wrapped to `columns`.
pub fn export_rows(doc: &ReportDocument, columns: u16) -> Vec<String> {
    let mut rows = Vec::new();
    for line in doc.lines().iter().filter(|line| !line.exclude_from_export) {
        let text: String = line
            .segments
            .iter()
            .filter(|segment| !segment.exclude_from_export)
            .map(|segment| segment.text.as_str())
            .collect();
        let indent = usize::from(line.indent);
        let available = usize::from(columns).saturating_sub(indent).max(1);
        for row in wrap_to_width(&text, available) {
            rows.push(format!("{}{row}", " ".repeat(indent)));
        }
    }
    rows
}

pub fn rasterize(doc: &ReportDocument, columns: u16) -> Result<Buffer, ExportError> {
    let rows = export_rows(doc, columns);
    let height =
        u16::try_from(rows.len().max(1)).map_err(|_| ExportError::TooLarge { rows: rows.len() })?;
    let area = Rect::new(0, 0, columns, height);
    let mut buf = Buffer::empty(area);
    buf.set_style(area, paper_style());
    for (y, row) in (0..height).zip(rows.iter()) {
        buf.set_stringn(0, y, row, usize::from(columns), paper_style());
    }
    Ok(buf)
}

/// Reads a raster back as text, one string per row, trailing blanks removed.
pub fn buffer_rows(buf: &Buffer) -> Vec<String> {
    let area = buf.area;
    let mut rows = Vec::with_capacity(usize::from(area.height));
    for y in area.top()..area.bottom() {
        let mut row = String::new();
        let mut hidden = 0;
        for x in area.left()..area.right() {
            let symbol = buf[(x, y)].symbol();
            if hidden > 0 {
                // Cell covered by the previous wide character.
                hidden -= 1;
                continue;
            }
            hidden = symbol.width().saturating_sub(1);
            row.push_str(symbol);
        }
        rows.push(row.trim_end().to_string());
    }
    rows
}

/// Consecutive row ranges of at most `rows_per_page`, covering `0..total`.
pub fn paginate(total: usize, rows_per_page: usize) -> Vec<Range<usize>> {
    if total == 0 || rows_per_page == 0 {
        return vec![0..total];
    }
    (0..total)
        .step_by(rows_per_page)
        .map(|start| start..(start + rows_per_page).min(total))
        .collect()
}

pub fn render_pages(doc: &ReportDocument, format: PageFormat) -> Result<Vec<String>, ExportError> {
    if format.columns == 0 || format.rows == 0 {
        return Err(ExportError::EmptyPage);
    }
    let buf = rasterize(doc, format.columns)?;
    let rows = buffer_rows(&buf);
    Ok(paginate(rows.len(), usize::from(format.rows))
        .into_iter()
        .map(|range| rows[range].join("\n"))
        .collect())
}

/// Writes the paginated report to `path`, replacing any previous export.
pub fn export_report(
    doc: &ReportDocument,
    path: &Path,
    format: PageFormat,
) -> Result<ExportSummary, ExportError> {
    let pages = render_pages(doc, format)?;
    let write_err = |source: io::Error| ExportError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut body = String::new();
    for (idx, page) in pages.iter().enumerate() {
        if idx > 0 {
            body.push(FORM_FEED);
            body.push('\n');
        }
        body.push_str(page);
        body.push('\n');
    }
    fs::write(path, body).map_err(write_err)?;

    tracing::info!(path = %path.display(), pages = pages.len(), "report exported");
    Ok(ExportSummary {
        path: path.to_path_buf(),
        pages: pages.len(),
    })
}
