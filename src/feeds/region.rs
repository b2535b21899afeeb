use std::collections::HashMap;

use rusqlite::Connection;
use tracing::info;

use crate::db::{self, RegionCount};
use crate::error::IngestError;
use crate::sheet::{normalize, Table};

/// First row is the national total, last two rows are section totals.
const HEAD_ROWS: usize = 1;
const TAIL_ROWS: usize = 2;

/// Region labels with the total rows sliced off.
pub fn region_labels(table: &Table) -> Vec<String> {
    let end = table.rows.len().saturating_sub(TAIL_ROWS);
    table
        .rows
        .get(HEAD_ROWS..end)
        .unwrap_or_default()
        .iter()
        .map(|r| r.label.clone())
        .collect()
}

/// Cross every year column with every region, year-major, dropping cells
/// with no value.
pub fn map_rows(
    table: &Table,
    region_ids: &HashMap<String, i64>,
) -> Result<Vec<RegionCount>, IngestError> {
    let end = table.rows.len().saturating_sub(TAIL_ROWS);
    let regions = HEAD_ROWS..end.max(HEAD_ROWS);
    let mut out = Vec::new();

    for (col, year) in table.year_columns() {
        for row_idx in regions.clone() {
            let row = &table.rows[row_idx];
            let value = normalize(table.cell(row_idx, col)).map_err(|source| IngestError::Cell {
                row: row.label.clone(),
                column: table.columns[col].clone(),
                source,
            })?;
            let Some(value) = value else { continue };
            let region_id = *region_ids
                .get(&row.label)
                .ok_or_else(|| IngestError::UnknownRegion(row.label.clone()))?;
            out.push(RegionCount {
                year,
                region_id,
                registered_cars: value as i64,
            });
        }
    }
    Ok(out)
}

pub fn load(conn: &Connection, table: &Table) -> Result<usize, IngestError> {
    let regions = region_labels(table);
    db::init_schema(conn)?;
    let added = db::insert_regions(conn, &regions)?;
    let ids = db::region_map(conn)?;
    let rows = map_rows(table, &ids)?;
    let n = db::insert_region_counts(conn, &rows)?;
    info!(regions = regions.len(), new_regions = added, rows = n, "region feed loaded");
    Ok(n)
}
