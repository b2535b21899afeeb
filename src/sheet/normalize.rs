use super::Cell;
use crate::error::ParseError;

const PLACEHOLDER: &str = "-";

/// Turn a raw cell into a number. Blank, NaN and the `-` placeholder mean
/// "no data"; anything else must be numeric once thousands separators are gone.
pub fn normalize(cell: &Cell) -> Result<Option<f64>, ParseError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(f) if f.is_nan() => Ok(None),
        Cell::Number(f) => Ok(Some(*f)),
        Cell::Text(s) => parse_text(s),
        Cell::Date(d) => Err(ParseError { raw: d.to_string() }),
    }
}

fn parse_text(raw: &str) -> Result<Option<f64>, ParseError> {
    let s = raw.trim();
    if s.is_empty() || s == PLACEHOLDER {
        return Ok(None);
    }
    match s.replace(',', "").parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(_) => Err(ParseError {
            raw: raw.to_string(),
        }),
    }
}

/// Lenient integer read used by the charging-station sheet: blanks and
/// garbage count as zero.
pub fn count_or_zero(cell: &Cell) -> i64 {
    match normalize(cell) {
        Ok(Some(v)) => v as i64,
        _ => 0,
    }
}
