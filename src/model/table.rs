//! Table model used for the industry slides.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// Approximate average character width in points at the 10pt table font.
pub const AVG_CHAR_WIDTH_PT: f64 = 6.0;

/// A titled table of text cells keyed by header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub headers: Vec<String>,

    /// Data rows; each row holds one cell per header
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table with a title and headers.
    pub fn new(title: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            title: title.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Add a row; it is padded or truncated to the header count.
    pub fn add_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Get the number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// A table with no columns cannot be rendered.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Tab-separated text, header line first.
    pub fn plain_text(&self) -> String {
        let mut text = self.headers.join("\t");
        text.push('\n');
        for row in &self.rows {
            text.push_str(&row.join("\t"));
            text.push('\n');
        }
        text
    }
}

/// Estimate the rendered height of a row in points.
///
/// Each cell wraps at `col_width_pt / AVG_CHAR_WIDTH_PT` columns; explicit
/// newlines start new lines. The tallest cell decides, with a floor of one
/// line.
pub fn estimate_row_height(cells: &[String], line_height_pt: f64, col_width_pt: f64) -> f64 {
    let chars_per_line = ((col_width_pt / AVG_CHAR_WIDTH_PT) as usize).max(1);
    let max_lines = cells
        .iter()
        .map(|cell| {
            cell.lines()
                .map(|line| line.width().div_ceil(chars_per_line))
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0)
        .max(1);
    max_lines as f64 * line_height_pt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding() {
        let mut table = Table::new("Benefits", vec!["A".into(), "B".into()]);
        table.add_row(vec!["1".into()]);
        table.add_row(vec!["1".into(), "2".into(), "3".into()]);
        assert_eq!(table.rows[0], vec!["1".to_string(), String::new()]);
        assert_eq!(table.rows[1].len(), 2);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_plain_text() {
        let mut table = Table::new("T", vec!["KPI".into(), "Value".into()]);
        table.add_row(vec!["Churn".into(), "5%".into()]);
        assert_eq!(table.plain_text(), "KPI\tValue\nChurn\t5%\n");
    }

    #[test]
    fn test_row_height_single_line() {
        let cells = vec!["short".to_string(), String::new()];
        assert_eq!(estimate_row_height(&cells, 12.0, 120.0), 12.0);
    }

    #[test]
    fn test_row_height_wraps_longest_cell() {
        // 60pt column -> 10 chars per line; 25 chars -> 3 lines
        let cells = vec!["a".repeat(25), "b".repeat(5)];
        assert_eq!(estimate_row_height(&cells, 12.0, 60.0), 36.0);
    }

    #[test]
    fn test_row_height_counts_newlines() {
        let cells = vec!["one\ntwo\nthree".to_string()];
        assert_eq!(estimate_row_height(&cells, 10.0, 600.0), 30.0);
    }

    #[test]
    fn test_row_height_narrow_column() {
        let cells = vec!["abc".to_string()];
        assert_eq!(estimate_row_height(&cells, 12.0, 1.0), 36.0);
    }
}
