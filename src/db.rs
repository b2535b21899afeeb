use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::config::DatabaseConfig;

pub const CHARGING_TABLE: &str = "charging_station_by_region";

pub fn connect(cfg: &DatabaseConfig) -> Result<Connection> {
    if let Some(dir) = cfg.path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(&cfg.path)
        .with_context(|| format!("Failed to open {:?}", cfg.path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS region (
            region_id  INTEGER PRIMARY KEY,
            name       TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS car_registration_by_region (
            id              INTEGER PRIMARY KEY,
            year            INTEGER NOT NULL,
            registered_cars INTEGER NOT NULL,
            region_id       INTEGER NOT NULL REFERENCES region(region_id),
            UNIQUE(year, region_id)
        );
        CREATE INDEX IF NOT EXISTS idx_reg_region ON car_registration_by_region(region_id);

        CREATE TABLE IF NOT EXISTS car_type_registration (
            id            INTEGER PRIMARY KEY,
            year          INTEGER UNIQUE NOT NULL,
            passenger_car REAL,
            van_car       REAL,
            truck_car     REAL,
            special_car   REAL
        );

        CREATE TABLE IF NOT EXISTS car_use_type_registration (
            id        INTEGER PRIMARY KEY,
            year      INTEGER UNIQUE NOT NULL,
            official  REAL,
            private   REAL,
            business  REAL
        );

        -- One row per region per period; unaffected by the wide table's fixed columns
        CREATE TABLE IF NOT EXISTS charging_station_region (
            id             INTEGER PRIMARY KEY,
            date_recorded  TEXT NOT NULL,
            charging_speed TEXT NOT NULL,
            region         TEXT NOT NULL,
            station_count  INTEGER NOT NULL,
            UNIQUE(date_recorded, charging_speed, region)
        );

        CREATE TABLE IF NOT EXISTS company_faq (
            id        INTEGER PRIMARY KEY,
            company   TEXT NOT NULL,
            category  TEXT,
            question  TEXT NOT NULL,
            answer    TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_faq_company ON company_faq(company);
        ",
    )
}

/// Create the wide charging-station table from the first sheet's region
/// columns. An existing table is left exactly as it is.
pub fn ensure_charging_schema(conn: &Connection, region_columns: &[String]) -> rusqlite::Result<()> {
    let columns: String = region_columns
        .iter()
        .map(|c| format!("{} INTEGER,\n", quote_ident(c)))
        .collect();
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {CHARGING_TABLE} (
            id             INTEGER PRIMARY KEY,
            date_recorded  TEXT NOT NULL,
            charging_speed TEXT NOT NULL,
            {columns}
            sum_total      INTEGER,
            created_at     TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(date_recorded, charging_speed)
        );"
    ))
}

/// Column names of the wide charging-station table (empty if it does not exist).
pub fn charging_columns(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({CHARGING_TABLE})"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(rows)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ── Region feed ──

#[derive(Debug, Clone, PartialEq)]
pub struct RegionCount {
    pub year: i32,
    pub region_id: i64,
    pub registered_cars: i64,
}

pub fn insert_regions(conn: &Connection, names: &[String]) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO region (name) VALUES (?1)")?;
        for name in names {
            count += stmt.execute(params![name])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn region_map(conn: &Connection) -> rusqlite::Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT region_id, name FROM region")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(1)?, row.get(0)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

pub fn insert_region_counts(conn: &Connection, rows: &[RegionCount]) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO car_registration_by_region (year, registered_cars, region_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(year, region_id) DO UPDATE SET registered_cars = excluded.registered_cars",
        )?;
        for r in rows {
            count += stmt.execute(params![r.year, r.registered_cars, r.region_id])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Type / use feeds ──

#[derive(Debug, Clone, PartialEq)]
pub struct CarTypeCount {
    pub year: i32,
    pub passenger_car: Option<f64>,
    pub van_car: Option<f64>,
    pub truck_car: Option<f64>,
    pub special_car: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarUseCount {
    pub year: i32,
    pub official: Option<f64>,
    pub private: Option<f64>,
    pub business: Option<f64>,
}

pub fn insert_car_types(conn: &Connection, rows: &[CarTypeCount]) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO car_type_registration (year, passenger_car, van_car, truck_car, special_car)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(year) DO UPDATE SET
                passenger_car = excluded.passenger_car,
                van_car       = excluded.van_car,
                truck_car     = excluded.truck_car,
                special_car   = excluded.special_car",
        )?;
        for r in rows {
            count += stmt.execute(params![
                r.year, r.passenger_car, r.van_car, r.truck_car, r.special_car,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn insert_car_uses(conn: &Connection, rows: &[CarUseCount]) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO car_use_type_registration (year, official, private, business)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(year) DO UPDATE SET
                official = excluded.official,
                private  = excluded.private,
                business = excluded.business",
        )?;
        for r in rows {
            count += stmt.execute(params![r.year, r.official, r.private, r.business])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Charging stations ──

#[derive(Debug, Clone, PartialEq)]
pub struct RegionStations {
    /// Header label as it appears in the sheet.
    pub region: String,
    /// Sanitized column name in the wide table.
    pub column: String,
    pub stations: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingRecord {
    pub date_recorded: NaiveDate,
    pub charging_speed: String,
    pub regions: Vec<RegionStations>,
    pub sum_total: i64,
}

/// Upsert on (date_recorded, charging_speed). Region columns missing from the
/// wide table (`known_columns`) are only written to the per-region table.
pub fn upsert_charging(
    conn: &Connection,
    known_columns: &HashSet<String>,
    records: &[ChargingRecord],
) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut per_region = tx.prepare(
            "INSERT INTO charging_station_region (date_recorded, charging_speed, region, station_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date_recorded, charging_speed, region)
             DO UPDATE SET station_count = excluded.station_count",
        )?;

        for rec in records {
            let date = rec.date_recorded.format("%Y-%m-%d").to_string();
            let wide: Vec<&RegionStations> = rec
                .regions
                .iter()
                .filter(|r| known_columns.contains(&r.column))
                .collect();

            let mut stmt = tx.prepare_cached(&wide_upsert_sql(&wide))?;
            let mut values: Vec<Value> = Vec::with_capacity(wide.len() + 3);
            values.push(Value::Text(date.clone()));
            values.push(Value::Text(rec.charging_speed.clone()));
            values.extend(wide.iter().map(|r| Value::Integer(r.stations)));
            values.push(Value::Integer(rec.sum_total));
            count += stmt.execute(params_from_iter(values))?;

            for r in &rec.regions {
                per_region.execute(params![date, rec.charging_speed, r.region, r.stations])?;
            }
        }
    }
    tx.commit()?;
    Ok(count)
}

fn wide_upsert_sql(columns: &[&RegionStations]) -> String {
    let names: Vec<String> = columns.iter().map(|r| quote_ident(&r.column)).collect();
    let placeholders: Vec<String> = (1..=names.len() + 3).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = names
        .iter()
        .map(|n| format!("{n} = excluded.{n}"))
        .chain(std::iter::once("sum_total = excluded.sum_total".to_string()))
        .collect();

    let mut insert_cols = vec!["date_recorded".to_string(), "charging_speed".to_string()];
    insert_cols.extend(names.iter().cloned());
    insert_cols.push("sum_total".to_string());

    format!(
        "INSERT INTO {CHARGING_TABLE} ({}) VALUES ({})
         ON CONFLICT(date_recorded, charging_speed) DO UPDATE SET {}",
        insert_cols.join(", "),
        placeholders.join(", "),
        updates.join(", "),
    )
}

// ── FAQ ──

#[derive(Debug, Clone, PartialEq)]
pub struct FaqEntry {
    pub company: String,
    pub category: Option<String>,
    pub question: String,
    pub answer: String,
}

/// Replace one company's FAQ rows with a fresh crawl. An empty batch is a
/// no-op so a failed crawl never wipes stored entries.
pub fn replace_faq(conn: &Connection, company: &str, entries: &[FaqEntry]) -> rusqlite::Result<usize> {
    if entries.is_empty() {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute("DELETE FROM company_faq WHERE company = ?1", params![company])?;
        let mut stmt = tx.prepare(
            "INSERT INTO company_faq (company, category, question, answer) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for e in entries {
            count += stmt.execute(params![company, e.category, e.question, e.answer])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn clear_faq(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM company_faq", [])
}

#[cfg(test)]
pub fn fetch_faq(conn: &Connection, company: &str) -> rusqlite::Result<Vec<FaqEntry>> {
    let mut stmt = conn.prepare(
        "SELECT company, category, question, answer FROM company_faq
         WHERE company = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![company], |row| {
            Ok(FaqEntry {
                company: row.get(0)?,
                category: row.get(1)?,
                question: row.get(2)?,
                answer: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats / report ──

pub struct Stats {
    pub regions: usize,
    pub region_counts: usize,
    pub car_types: usize,
    pub car_uses: usize,
    pub charging: usize,
    pub faq: usize,
}

fn count_rows(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(0);
    }
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), [], |r| r.get(0))
}

pub fn get_stats(conn: &Connection) -> rusqlite::Result<Stats> {
    Ok(Stats {
        regions: count_rows(conn, "region")?,
        region_counts: count_rows(conn, "car_registration_by_region")?,
        car_types: count_rows(conn, "car_type_registration")?,
        car_uses: count_rows(conn, "car_use_type_registration")?,
        charging: count_rows(conn, CHARGING_TABLE)?,
        faq: count_rows(conn, "company_faq")?,
    })
}

/// Total registered cars per year across all regions, oldest first.
pub fn yearly_totals(conn: &Connection) -> rusqlite::Result<Vec<(i32, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT year, SUM(registered_cars) FROM car_registration_by_region
         GROUP BY year ORDER BY year",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn faq_counts(conn: &Connection) -> rusqlite::Result<Vec<(String, usize)>> {
    let mut stmt = conn.prepare(
        "SELECT company, COUNT(*) FROM company_faq GROUP BY company ORDER BY company",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) fn memory() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    init_schema(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(speed: &str, counts: &[(&str, i64)], sum: i64) -> ChargingRecord {
        ChargingRecord {
            date_recorded: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            charging_speed: speed.to_string(),
            regions: counts
                .iter()
                .map(|(name, n)| RegionStations {
                    region: name.to_string(),
                    column: name.to_string(),
                    stations: *n,
                })
                .collect(),
            sum_total: sum,
        }
    }

    #[test]
    fn charging_upsert_keeps_one_row_per_period_and_speed() {
        let conn = memory();
        let cols = vec!["서울".to_string(), "부산".to_string()];
        ensure_charging_schema(&conn, &cols).unwrap();
        let known = charging_columns(&conn).unwrap();

        upsert_charging(&conn, &known, &[record("fast", &[("서울", 10), ("부산", 4)], 14)]).unwrap();
        upsert_charging(&conn, &known, &[record("fast", &[("서울", 12), ("부산", 5)], 17)]).unwrap();

        let rows: Vec<(i64, i64, i64)> = conn
            .prepare("SELECT \"서울\", \"부산\", sum_total FROM charging_station_by_region")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows, vec![(12, 5, 17)]);

        let per_region: i64 = conn
            .query_row("SELECT COUNT(*) FROM charging_station_region", [], |r| r.get(0))
            .unwrap();
        assert_eq!(per_region, 2);
    }

    #[test]
    fn charging_schema_is_fixed_at_first_load() {
        let conn = memory();
        ensure_charging_schema(&conn, &["서울".to_string()]).unwrap();
        ensure_charging_schema(&conn, &["서울".to_string(), "세종".to_string()]).unwrap();
        let known = charging_columns(&conn).unwrap();
        assert!(known.contains("서울"));
        assert!(!known.contains("세종"));

        // New region goes to the per-region table only.
        upsert_charging(&conn, &known, &[record("slow", &[("서울", 1), ("세종", 2)], 3)]).unwrap();
        let sejong: i64 = conn
            .query_row(
                "SELECT station_count FROM charging_station_region WHERE region = '세종'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(sejong, 2);
    }

    #[test]
    fn faq_replace_per_company() {
        let conn = memory();
        let entry = |q: &str| FaqEntry {
            company: "GENESIS".into(),
            category: Some("구매".into()),
            question: q.into(),
            answer: "a".into(),
        };
        replace_faq(&conn, "GENESIS", &[entry("q1"), entry("q2")]).unwrap();
        replace_faq(&conn, "GENESIS", &[entry("q3")]).unwrap();
        assert_eq!(replace_faq(&conn, "GENESIS", &[]).unwrap(), 0);

        let stored = fetch_faq(&conn, "GENESIS").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].question, "q3");

        assert_eq!(clear_faq(&conn).unwrap(), 1);
        assert!(fetch_faq(&conn, "GENESIS").unwrap().is_empty());
    }

    #[test]
    fn type_rows_upsert_on_year() {
        let conn = memory();
        let row = |v| CarTypeCount {
            year: 2023,
            passenger_car: Some(v),
            van_car: None,
            truck_car: Some(1.0),
            special_car: None,
        };
        insert_car_types(&conn, &[row(10.0)]).unwrap();
        insert_car_types(&conn, &[row(20.0)]).unwrap();
        let (n, v): (i64, f64) = conn
            .query_row(
                "SELECT COUNT(*), MAX(passenger_car) FROM car_type_registration",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((n, v), (1, 20.0));
    }

    #[test]
    fn failed_batch_rolls_back() {
        let conn = memory();
        // region_id 99 violates the foreign key, so the whole batch is discarded.
        insert_regions(&conn, &["서울".to_string()]).unwrap();
        let id = region_map(&conn).unwrap()["서울"];
        let rows = [
            RegionCount { year: 2022, region_id: id, registered_cars: 1 },
            RegionCount { year: 2022, region_id: 99, registered_cars: 2 },
        ];
        assert!(insert_region_counts(&conn, &rows).is_err());
        assert_eq!(get_stats(&conn).unwrap().region_counts, 0);
    }

    #[test]
    fn stats_tolerate_missing_charging_table() {
        let conn = memory();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.charging, 0);
        assert_eq!(s.faq, 0);
    }
}
