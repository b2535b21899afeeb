pub mod normalize;

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDate;

use crate::error::IngestError;

pub use normalize::normalize;

/// A spreadsheet cell reduced to the shapes the feeds care about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                if s.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(s.clone())
                }
            }
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(dt) => Cell::Date(dt.date()),
                None => Cell::Number(dt.as_f64()),
            },
        }
    }
}

impl Cell {
    /// Trimmed string form, as used for row and column labels.
    pub fn label(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", *f as i64),
            Cell::Number(f) => f.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub label: String,
    pub cells: Vec<Cell>,
}

impl Row {
    fn is_blank(&self) -> bool {
        self.label.is_empty() && self.cells.iter().all(|c| *c == Cell::Empty)
    }
}

/// A sheet body keyed by the first column, with the remaining header cells
/// as column labels. `rows[i].cells[j]` sits under `columns[j]`.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn row_index(&self, label: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.label == label)
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.cells.get(column))
            .unwrap_or(&Cell::Empty)
    }

    /// Columns whose label is an integer, paired with that integer.
    pub fn year_columns(&self) -> Vec<(usize, i32)> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.parse::<i32>().ok().map(|y| (i, y)))
            .collect()
    }
}

/// Open the first worksheet of `path` and build a [`Table`] whose header is
/// the sheet row at `header_row` (0-based, counted from the top of the sheet).
pub fn read_table(path: &Path, header_row: usize) -> Result<Table, IngestError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::NoSheet(path.to_path_buf()))?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    table_from_range(&range, header_row).ok_or_else(|| IngestError::MissingHeader {
        path: path.to_path_buf(),
        row: header_row,
    })
}

/// `None` when the range holds no row at `header_row`. Fully blank body rows
/// are dropped.
pub fn table_from_range(range: &Range<Data>, header_row: usize) -> Option<Table> {
    // calamine ranges start at the first used cell, not at A1.
    let (start_row, _) = range.start()?;
    let skip = (header_row as u32).checked_sub(start_row)? as usize;

    let mut rows = range.rows().skip(skip);
    let header = rows.next()?;
    let columns: Vec<String> = header.iter().skip(1).map(|d| Cell::from(d).label()).collect();

    let body = rows
        .map(|cells| {
            let label = cells.first().map(|d| Cell::from(d).label()).unwrap_or_default();
            let mut cells: Vec<Cell> = cells.iter().skip(1).map(Cell::from).collect();
            cells.resize(columns.len(), Cell::Empty);
            Row { label, cells }
        })
        .filter(|row| !row.is_blank())
        .collect();

    Some(Table {
        columns,
        rows: body,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn range(rows: &[&[Data]], start: (u32, u32)) -> Range<Data> {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
        let end = (start.0 + rows.len() as u32 - 1, start.1 + width - 1);
        let mut range = Range::new(start, end);
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                range.set_value((start.0 + r as u32, start.1 + c as u32), value.clone());
            }
        }
        range
    }

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn header_offset_counts_from_sheet_top() {
        let r = range(
            &[
                &[s("자동차 등록 현황"), Data::Empty, Data::Empty],
                &[s("(단위: 대)"), Data::Empty, Data::Empty],
                &[s("구분"), Data::Float(2022.0), Data::Int(2023)],
                &[s(" 서울 "), s("1,000"), s("-")],
                &[s("부산"), Data::Float(500.0)],
            ],
            (0, 0),
        );

        let t = table_from_range(&r, 2).unwrap();
        assert_eq!(t.columns, vec!["2022", "2023"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].label, "서울");
        assert_eq!(t.rows[0].cells[0], Cell::Text("1,000".into()));
        assert_eq!(t.rows[1].cells, vec![Cell::Number(500.0), Cell::Empty]);
        assert_eq!(t.year_columns(), vec![(0, 2022), (1, 2023)]);
    }

    #[test]
    fn range_not_starting_at_a1() {
        // First used cell is on sheet row 1, so header row 2 is the range's second row.
        let r = range(
            &[
                &[s("title"), Data::Empty],
                &[s("구분"), s(" 2021 ")],
                &[s("관용"), Data::Float(3.0)],
            ],
            (1, 0),
        );
        let t = table_from_range(&r, 2).unwrap();
        assert_eq!(t.columns, vec!["2021"]);
        assert_eq!(t.cell(t.row_index("관용").unwrap(), 0), &Cell::Number(3.0));
    }

    #[test]
    fn blank_rows_are_dropped() {
        let r = range(
            &[
                &[s("구분"), s("2022"), s("2023")],
                &[s("계"), s("1"), s("1")],
                &[s("서울"), s("10"), s("20")],
                &[Data::Empty, Data::Empty, Data::Empty],
                &[s("부산"), s("5"), s("6")],
                &[s("소계"), s("1"), s("1")],
                &[s("합계"), s("1"), s("1")],
                &[Data::Empty, Data::Empty, Data::Empty],
            ],
            (0, 0),
        );
        let t = table_from_range(&r, 0).unwrap();
        let labels: Vec<&str> = t.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["계", "서울", "부산", "소계", "합계"]);
    }

    #[test]
    fn reads_workbook_with_title_rows() {
        let t = read_table(Path::new("tests/fixtures/region_registrations.xlsx"), 2).unwrap();
        assert_eq!(t.columns, vec!["2022", "2023"]);
        let labels: Vec<&str> = t.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["계", "서울", "부산", "소계", "합계"]);
        assert_eq!(t.cell(1, 0), &Cell::Number(1000.0));
        assert_eq!(t.cell(1, 1), &Cell::Text("-".into()));
        assert_eq!(t.cell(2, 0), &Cell::Text("500".into()));
    }

    #[test]
    fn reads_date_cells() {
        let t = read_table(Path::new("tests/fixtures/charging_stations.xlsx"), 3).unwrap();
        assert_eq!(t.columns, vec!["충전속도", "서울", "부산", "합계"]);
        assert_eq!(t.rows.len(), 3);
        assert_eq!(t.rows[0].label, "2024-01-01");
        assert_eq!(t.rows[2].label, "2024-02-01");
        assert_eq!(t.cell(1, 1), &Cell::Text("2,000".into()));
    }

    #[test]
    fn missing_header_row() {
        let r = range(&[&[s("only row")]], (0, 0));
        assert!(table_from_range(&r, 3).is_none());
        let late = range(&[&[s("starts late")]], (5, 0));
        assert!(table_from_range(&late, 2).is_none());
    }

    #[test]
    fn unreadable_file_is_an_open_error() {
        let err = read_table(Path::new("no/such/sheet.xlsx"), 2).unwrap_err();
        assert!(matches!(err, IngestError::Open { .. }));
    }

    #[test]
    fn labels() {
        assert_eq!(Cell::Number(2024.0).label(), "2024");
        assert_eq!(Cell::Number(1.5).label(), "1.5");
        assert_eq!(Cell::Text("  급속 ".into()).label(), "급속");
        assert_eq!(Cell::from(&s("   ")), Cell::Empty);
    }
}
