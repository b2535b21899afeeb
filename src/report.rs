/// One year of nationwide registrations with its change from the year before.
#[derive(Debug, Clone, PartialEq)]
pub struct YearTotal {
    pub year: i32,
    pub total: i64,
    pub yoy_percent: Option<f64>,
}

/// `(cur - prev) / prev * 100`; absent when there is no usable previous year.
pub fn yoy(prev: Option<i64>, cur: i64) -> Option<f64> {
    match prev {
        Some(p) if p != 0 => Some((cur - p) as f64 / p as f64 * 100.0),
        _ => None,
    }
}

/// Attach year-over-year deltas to totals sorted oldest first. A gap in the
/// years still compares against the closest earlier year.
pub fn year_totals(totals: &[(i32, i64)]) -> Vec<YearTotal> {
    let mut prev = None;
    totals
        .iter()
        .map(|&(year, total)| {
            let row = YearTotal {
                year,
                total,
                yoy_percent: yoy(prev, total),
            };
            prev = Some(total);
            row
        })
        .collect()
}

pub fn format_yoy(pct: Option<f64>) -> String {
    match pct {
        Some(p) => format!("{:+.2}%", p),
        None => "-".to_string(),
    }
}
