pub mod category;
pub mod charging;
pub mod region;

use std::fmt;

use rusqlite::Connection;
use tracing::info;

use crate::config::{SheetSource, SheetsConfig};
use crate::error::IngestError;
use crate::sheet::read_table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Feed {
    Region,
    CarType,
    Usage,
    Charging,
    All,
}

impl Feed {
    const EACH: [Feed; 4] = [Feed::Region, Feed::CarType, Feed::Usage, Feed::Charging];

    fn expand(self) -> Vec<Feed> {
        match self {
            Feed::All => Self::EACH.to_vec(),
            f => vec![f],
        }
    }

    fn source(self, sheets: &SheetsConfig) -> &SheetSource {
        match self {
            Feed::Region | Feed::All => &sheets.region,
            Feed::CarType => &sheets.car_type,
            Feed::Usage => &sheets.usage,
            Feed::Charging => &sheets.charging,
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Feed::Region => "region",
            Feed::CarType => "car-type",
            Feed::Usage => "usage",
            Feed::Charging => "charging",
            Feed::All => "all",
        };
        f.write_str(s)
    }
}

/// Read each requested spreadsheet and load it. The first failing file
/// aborts the run.
pub fn run(
    conn: &Connection,
    sheets: &SheetsConfig,
    feed: Feed,
) -> Result<Vec<(Feed, usize)>, IngestError> {
    let mut loaded = Vec::new();
    for f in feed.expand() {
        let src = f.source(sheets);
        info!(feed = %f, path = ?src.path, header_row = src.header_row, "reading sheet");
        let table = read_table(&src.path, src.header_row)?;
        let n = match f {
            Feed::Region => region::load(conn, &table)?,
            Feed::CarType => category::load_car_types(conn, &table)?,
            Feed::Usage => category::load_car_uses(conn, &table)?,
            Feed::Charging => charging::load(conn, &table)?,
            Feed::All => unreachable!("expanded above"),
        };
        loaded.push((f, n));
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_expands_in_fixed_order() {
        assert_eq!(
            Feed::All.expand(),
            vec![Feed::Region, Feed::CarType, Feed::Usage, Feed::Charging]
        );
        assert_eq!(Feed::Usage.expand(), vec![Feed::Usage]);
    }

    fn fixture_sheets() -> SheetsConfig {
        let mut sheets = SheetsConfig::default();
        sheets.region.path = "tests/fixtures/region_registrations.xlsx".into();
        sheets.charging.path = "tests/fixtures/charging_stations.xlsx".into();
        sheets
    }

    #[test]
    fn region_workbook_loads() {
        let conn = crate::db::memory();
        let loaded = run(&conn, &fixture_sheets(), Feed::Region).unwrap();
        assert_eq!(loaded, vec![(Feed::Region, 3)]);

        let mut names: Vec<String> = crate::db::region_map(&conn).unwrap().into_keys().collect();
        names.sort();
        assert_eq!(names, vec!["부산", "서울"]);
        let totals = crate::db::yearly_totals(&conn).unwrap();
        assert_eq!(totals, vec![(2022, 1500), (2023, 600)]);
    }

    #[test]
    fn charging_workbook_loads() {
        let conn = crate::db::memory();
        let loaded = run(&conn, &fixture_sheets(), Feed::Charging).unwrap();
        assert_eq!(loaded, vec![(Feed::Charging, 3)]);

        let (n, seoul): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), SUM(\"서울\") FROM charging_station_by_region WHERE date_recorded = '2024-01-01'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((n, seoul), (2, 3200));
    }

    #[test]
    fn missing_file_aborts() {
        let conn = crate::db::memory();
        let mut sheets = SheetsConfig::default();
        sheets.region.path = "no/such/file.xlsx".into();
        let err = run(&conn, &sheets, Feed::Region).unwrap_err();
        assert!(matches!(err, IngestError::Open { .. }));
    }
}
