use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{self, ChargingRecord, RegionStations};
use crate::error::IngestError;
use crate::sheet::normalize::count_or_zero;
use crate::sheet::Table;

static NON_IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9가-힣_]").unwrap());
static UNDERSCORES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Fixed columns of the wide table; region columns must not collide with them.
const RESERVED_COLUMNS: [&str; 5] = ["id", "date_recorded", "charging_speed", "sum_total", "created_at"];

/// Column layout of a charging-station sheet: period, speed, regions…, sum.
/// `Table` has already taken the period column as the row label, so speed is
/// column 0 and the sum is the last column.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub regions: Vec<String>,
    pub columns: Vec<String>,
}

impl Layout {
    pub fn from_table(table: &Table) -> Result<Self, IngestError> {
        if table.columns.len() < 2 {
            return Err(IngestError::NarrowSheet(table.columns.len() + 1));
        }
        let regions: Vec<String> = table.columns[1..table.columns.len() - 1].to_vec();
        // SQLite identifiers are case-insensitive.
        let mut seen: HashSet<String> = RESERVED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let columns = regions
            .iter()
            .map(|r| {
                let base = column_name(r);
                let mut name = base.clone();
                let mut n = 2;
                while !seen.insert(name.to_lowercase()) {
                    name = format!("{base}_{n}");
                    n += 1;
                }
                name
            })
            .collect();
        Ok(Self { regions, columns })
    }
}

/// Make a header label usable as a column name.
pub fn column_name(label: &str) -> String {
    let cleaned = NON_IDENT_RE.replace_all(label, "_");
    let cleaned = UNDERSCORES_RE.replace_all(&cleaned, "_");
    let cleaned = cleaned.trim_matches('_');
    match cleaned.chars().next() {
        Some(c) if c.is_alphabetic() => cleaned.to_string(),
        _ => format!("region_{cleaned}"),
    }
}

/// Periods come as `2024-01`, `2024/01`, `202401`, or a real date cell.
pub fn parse_period(label: &str) -> Option<NaiveDate> {
    let s = label.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return NaiveDate::from_ymd_opt(d.year(), d.month(), 1);
    }
    let (year, month) = if let Some((y, m)) = s.split_once('-').or_else(|| s.split_once('/')) {
        (y, m)
    } else if s.len() == 6 && s.is_char_boundary(4) {
        s.split_at(4)
    } else {
        return None;
    };
    NaiveDate::from_ymd_opt(year.trim().parse().ok()?, month.trim().parse().ok()?, 1)
}

pub fn map_rows(table: &Table, layout: &Layout) -> Vec<ChargingRecord> {
    let sum_col = table.columns.len().saturating_sub(1);
    let mut out = Vec::new();

    for (i, row) in table.rows.iter().enumerate() {
        let speed = table.cell(i, 0).label();
        if row.label.is_empty() || speed.is_empty() {
            continue;
        }
        let Some(date_recorded) = parse_period(&row.label) else {
            warn!(period = %row.label, "could not parse period, skipping row");
            continue;
        };

        let regions = layout
            .regions
            .iter()
            .zip(&layout.columns)
            .enumerate()
            .map(|(j, (region, column))| RegionStations {
                region: region.clone(),
                column: column.clone(),
                stations: count_or_zero(table.cell(i, j + 1)),
            })
            .collect();

        out.push(ChargingRecord {
            date_recorded,
            charging_speed: speed,
            regions,
            sum_total: count_or_zero(table.cell(i, sum_col)),
        });
    }
    out
}

pub fn load(conn: &Connection, table: &Table) -> Result<usize, IngestError> {
    let layout = Layout::from_table(table)?;
    db::init_schema(conn)?;
    db::ensure_charging_schema(conn, &layout.columns)?;

    let known = db::charging_columns(conn)?;
    let drifted: Vec<&String> = layout.columns.iter().filter(|c| !known.contains(*c)).collect();
    if !drifted.is_empty() {
        warn!(
            columns = ?drifted,
            "region columns not in {}; stored per-region only",
            db::CHARGING_TABLE
        );
    }

    let records = map_rows(table, &layout);
    let n = db::upsert_charging(conn, &known, &records)?;
    info!(rows = n, regions = layout.regions.len(), "charging station feed loaded");
    Ok(n)
}
