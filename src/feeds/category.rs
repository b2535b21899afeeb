use rusqlite::Connection;
use tracing::info;

use crate::db::{self, CarTypeCount, CarUseCount};
use crate::error::IngestError;
use crate::sheet::{normalize, Table};

pub const CAR_TYPES: [&str; 4] = ["승용차", "승합차", "화물차", "특수차"];
pub const CAR_USES: [&str; 3] = ["관용", "자가용", "영업용"];

/// One value per fixed category row, for every year column in sheet order.
/// Missing values stay `None`; nothing is skipped.
fn read_categories<const N: usize>(
    table: &Table,
    categories: &[&str; N],
) -> Result<Vec<(i32, [Option<f64>; N])>, IngestError> {
    let rows: Vec<usize> = categories
        .iter()
        .map(|c| {
            table
                .row_index(c)
                .ok_or_else(|| IngestError::MissingRow(c.to_string()))
        })
        .collect::<Result<_, _>>()?;

    table
        .year_columns()
        .into_iter()
        .map(|(col, year)| {
            let mut values = [None; N];
            for (slot, &row) in values.iter_mut().zip(&rows) {
                *slot = normalize(table.cell(row, col)).map_err(|source| IngestError::Cell {
                    row: table.rows[row].label.clone(),
                    column: table.columns[col].clone(),
                    source,
                })?;
            }
            Ok::<_, IngestError>((year, values))
        })
        .collect()
}

pub fn map_car_types(table: &Table) -> Result<Vec<CarTypeCount>, IngestError> {
    Ok(read_categories(table, &CAR_TYPES)?
        .into_iter()
        .map(|(year, [passenger_car, van_car, truck_car, special_car])| CarTypeCount {
            year,
            passenger_car,
            van_car,
            truck_car,
            special_car,
        })
        .collect())
}

pub fn map_car_uses(table: &Table) -> Result<Vec<CarUseCount>, IngestError> {
    Ok(read_categories(table, &CAR_USES)?
        .into_iter()
        .map(|(year, [official, private, business])| CarUseCount {
            year,
            official,
            private,
            business,
        })
        .collect())
}

pub fn load_car_types(conn: &Connection, table: &Table) -> Result<usize, IngestError> {
    let rows = map_car_types(table)?;
    db::init_schema(conn)?;
    let n = db::insert_car_types(conn, &rows)?;
    info!(rows = n, "car type feed loaded");
    Ok(n)
}

pub fn load_car_uses(conn: &Connection, table: &Table) -> Result<usize, IngestError> {
    let rows = map_car_uses(table)?;
    db::init_schema(conn)?;
    let n = db::insert_car_uses(conn, &rows)?;
    info!(rows = n, "car use feed loaded");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::testing::table;
    use pretty_assertions::assert_eq;

    fn type_sheet() -> Table {
        table(
            &["구분", "2019", "2020", "2021", "2022", "2023"],
            &[
                ("계", &["", "1", "1", "1", "1", "1"]),
                ("승용차", &["대", "19,000", "19,500", "20,000", "20,500", "21,000"]),
                ("승합차", &["대", "800", "790", "780", "770", "760"]),
                ("화물차", &["대", "3,600", "3,650", "3,700", "3,750", "3,800"]),
                ("특수차", &["대", "-", "-", "-", "-", "-"]),
            ],
        )
    }

    #[test]
    fn five_years_four_categories() {
        let rows = map_car_types(&type_sheet()).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2019, 2020, 2021, 2022, 2023]);
        assert_eq!(
            rows[0],
            CarTypeCount {
                year: 2019,
                passenger_car: Some(19_000.0),
                van_car: Some(800.0),
                truck_car: Some(3_600.0),
                special_car: None,
            }
        );
        // The all-dash category is kept as null, not dropped.
        assert!(rows.iter().all(|r| r.special_car.is_none()));
    }

    #[test]
    fn use_feed() {
        let t = table(
            &["2022", "2023"],
            &[
                ("관용", &["80", ""]),
                ("자가용", &["24,000", "24,500"]),
                ("영업용", &["1,500", "1,600"]),
            ],
        );
        let rows = map_car_uses(&t).unwrap();
        assert_eq!(
            rows,
            vec![
                CarUseCount { year: 2022, official: Some(80.0), private: Some(24_000.0), business: Some(1_500.0) },
                CarUseCount { year: 2023, official: None, private: Some(24_500.0), business: Some(1_600.0) },
            ]
        );
    }

    #[test]
    fn missing_category_row() {
        let t = table(&["2022"], &[("관용", &["1"]), ("자가용", &["2"])]);
        let err = map_car_uses(&t).unwrap_err();
        assert!(matches!(err, IngestError::MissingRow(ref r) if r == "영업용"));
    }

    #[test]
    fn reload_is_idempotent() {
        let conn = db::memory();
        load_car_types(&conn, &type_sheet()).unwrap();
        load_car_types(&conn, &type_sheet()).unwrap();
        assert_eq!(db::get_stats(&conn).unwrap().car_types, 5);
    }
}
