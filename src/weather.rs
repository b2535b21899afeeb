use std::fmt;

use chrono::{Duration, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::WeatherConfig;
use crate::error::WeatherError;

/// Current observation for one forecast grid cell. Values are kept as the
/// API reports them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Observation {
    pub base_date: String,
    pub base_time: String,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    pub wind_speed: Option<String>,
    pub rainfall: Option<String>,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "관측 기준: {} {}", self.base_date, self.base_time)?;
        let rows = [
            ("기온", &self.temperature, "°C"),
            ("습도", &self.humidity, "%"),
            ("풍속", &self.wind_speed, "m/s"),
            ("강수량", &self.rainfall, "mm"),
        ];
        for (label, value, unit) in rows {
            match value {
                Some(v) => writeln!(f, "{label}: {v}{unit}")?,
                None => writeln!(f, "{label}: -")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: ResponseBody,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    header: Header,
    #[serde(default)]
    body: Option<Body>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(rename = "resultCode")]
    result_code: String,
    #[serde(rename = "resultMsg", default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct Body {
    items: Items,
}

#[derive(Debug, Deserialize)]
struct Items {
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    category: String,
    #[serde(rename = "obsrValue")]
    obsr_value: Value,
}

/// Observations are published hourly; ask for the hour before `now`.
pub fn base_params(now: NaiveDateTime) -> (String, String) {
    let base = now - Duration::hours(1);
    (base.format("%Y%m%d").to_string(), base.format("%H00").to_string())
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

pub async fn fetch(client: &Client, cfg: &WeatherConfig, now: NaiveDateTime) -> Result<Observation, WeatherError> {
    let (base_date, base_time) = base_params(now);
    debug!(%base_date, %base_time, nx = cfg.nx, ny = cfg.ny, "requesting observation");

    let nx = cfg.nx.to_string();
    let ny = cfg.ny.to_string();
    let envelope: Envelope = client
        .get(cfg.endpoint.as_str())
        .query(&[
            ("serviceKey", cfg.api_key.as_str()),
            ("pageNo", "1"),
            ("numOfRows", "1000"),
            ("dataType", "JSON"),
            ("base_date", base_date.as_str()),
            ("base_time", base_time.as_str()),
            ("nx", nx.as_str()),
            ("ny", ny.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let header = envelope.response.header;
    if header.result_code != "00" {
        return Err(WeatherError::Api {
            code: header.result_code,
            message: header.result_msg,
        });
    }

    let mut obs = Observation {
        base_date,
        base_time,
        ..Observation::default()
    };
    let items = envelope.response.body.map(|b| b.items.item).unwrap_or_default();
    for item in items {
        let slot = match item.category.as_str() {
            "T1H" => &mut obs.temperature,
            "REH" => &mut obs.humidity,
            "WSD" => &mut obs.wind_speed,
            "RN1" => &mut obs.rainfall,
            _ => continue,
        };
        *slot = Some(value_text(&item.obsr_value));
    }
    Ok(obs)
}
