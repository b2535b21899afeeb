use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Process-wide settings, built once in `main` and passed down by reference.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub weather: Option<WeatherConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/carstat.sqlite"),
        }
    }
}

/// Where a spreadsheet lives and which sheet row holds its column labels.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetSource {
    pub path: PathBuf,
    pub header_row: usize,
}

impl SheetSource {
    fn new(path: &str, header_row: usize) -> Self {
        Self {
            path: PathBuf::from(path),
            header_row,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub region: SheetSource,
    pub car_type: SheetSource,
    pub usage: SheetSource,
    pub charging: SheetSource,
}

impl SheetsConfig {
    fn entries(&self) -> [(&'static str, &SheetSource); 4] {
        [
            ("region", &self.region),
            ("car_type", &self.car_type),
            ("usage", &self.usage),
            ("charging", &self.charging),
        ]
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            region: SheetSource::new("docs/시도별 자동차 등록 현황.xlsx", 2),
            car_type: SheetSource::new("docs/차종별 자동차 등록 현황.xlsx", 2),
            usage: SheetSource::new("docs/용도별 자동차 등록 현황.xlsx", 2),
            charging: SheetSource::new("docs/충전기구축현황.xlsx", 3),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// WebDriver endpoint (e.g. a local chromedriver). Without one, pages are
    /// fetched over plain HTTP.
    pub webdriver_url: Option<String>,
    pub headless: bool,
    pub timeout_secs: u64,
    pub poll_millis: u64,
    pub source_delay_secs: u64,
    pub max_articles: usize,
    pub output_dir: PathBuf,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            headless: true,
            timeout_secs: 10,
            poll_millis: 500,
            source_delay_secs: 2,
            max_articles: 5,
            output_dir: PathBuf::from("."),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    pub nx: u32,
    pub ny: u32,
}

fn default_weather_endpoint() -> String {
    "http://apis.data.go.kr/1360000/VilageFcstInfoService_2.0/getUltraSrtNcst".to_string()
}

impl AppConfig {
    /// Read the JSON file (if present) and overlay `CARSTAT_*` environment
    /// variables, e.g. `CARSTAT_DATABASE__PATH`.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .to_str()
            .with_context(|| format!("config path {:?} is not valid UTF-8", path))?;
        let mut builder = Config::builder();
        // Seed each sheet's fields so a partial override keeps the rest.
        let sheets = SheetsConfig::default();
        for (feed, src) in sheets.entries() {
            builder = builder
                .set_default(format!("sheets.{feed}.path"), src.path.to_string_lossy().into_owned())?
                .set_default(format!("sheets.{feed}.header_row"), src.header_row as i64)?;
        }
        builder
            .add_source(File::new(name, FileFormat::Json).required(false))
            .add_source(
                Environment::with_prefix("CARSTAT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read config {:?}", path))?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn weather(&self) -> Result<&WeatherConfig> {
        self.weather
            .as_ref()
            .context("no [weather] section in configuration")
    }
}
