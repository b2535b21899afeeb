//! Page sessions that wait for a CSS marker before handing back markup.
//!
//! With a WebDriver endpoint configured the page is rendered by a real
//! browser over the W3C WebDriver protocol; otherwise the page is fetched
//! over HTTP until the marker shows up in the returned markup.

use std::time::Duration;

use reqwest::{Client, Method};
use scraper::{Html, Selector};
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::rules::compile;
use crate::config::CrawlConfig;
use crate::error::FetchError;

pub enum Browser {
    WebDriver(WebDriverSession),
    Http(HttpSession),
}

impl Browser {
    pub async fn open(cfg: &CrawlConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1) * 3))
            .build()
            .map_err(|source| FetchError::Http {
                url: "(client)".to_string(),
                source,
            })?;
        let poll = Duration::from_millis(cfg.poll_millis.max(10));

        match &cfg.webdriver_url {
            Some(base) => Ok(Browser::WebDriver(
                WebDriverSession::start(client, base, cfg, poll).await?,
            )),
            None => Ok(Browser::Http(HttpSession { client, poll })),
        }
    }

    /// Navigate to `url` and return its markup once `marker` matches.
    pub async fn load(&mut self, url: &str, marker: &str, timeout: Duration) -> Result<String, FetchError> {
        let selector = compile(marker)?;
        match self {
            Browser::WebDriver(s) => s.load(url, marker, timeout).await,
            Browser::Http(s) => s.load(url, &selector, marker, timeout).await,
        }
    }

    /// Try `markers` in order, each with the full timeout; a later marker
    /// is only tried when the earlier one timed out.
    pub async fn load_first(&mut self, url: &str, markers: &[&str], timeout: Duration) -> Result<String, FetchError> {
        let Some((last, earlier)) = markers.split_last() else {
            return Err(FetchError::Selector(String::new()));
        };
        for marker in earlier {
            match self.load(url, marker, timeout).await {
                Err(e) if e.is_timeout() => warn!("{}; trying next marker", e),
                other => return other,
            }
        }
        self.load(url, last, timeout).await
    }

    pub async fn quit(self) {
        if let Browser::WebDriver(s) = self {
            s.quit().await;
        }
    }
}

fn has_marker(html: &str, selector: &Selector) -> bool {
    Html::parse_document(html).select(selector).next().is_some()
}

fn timeout_error(url: &str, marker: &str, timeout: Duration) -> FetchError {
    FetchError::Timeout {
        url: url.to_string(),
        marker: marker.to_string(),
        timeout,
    }
}

pub struct HttpSession {
    client: Client,
    poll: Duration,
}

impl HttpSession {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let http_err = |source: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            source,
        };
        self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?
            .text()
            .await
            .map_err(http_err)
    }

    async fn load(
        &self,
        url: &str,
        selector: &Selector,
        marker: &str,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let deadline = Instant::now() + timeout;
        loop {
            let html = self.fetch(url).await?;
            if has_marker(&html, selector) {
                return Ok(html);
            }
            if Instant::now() + self.poll >= deadline {
                return Err(timeout_error(url, marker, timeout));
            }
            debug!(url, marker, "marker not present yet, refetching");
            sleep(self.poll).await;
        }
    }
}

pub struct WebDriverSession {
    client: Client,
    base: String,
    id: String,
    poll: Duration,
}

impl WebDriverSession {
    async fn start(client: Client, base: &str, cfg: &CrawlConfig, poll: Duration) -> Result<Self, FetchError> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--window-size=1920,1080".to_string(),
            format!("--user-agent={}", cfg.user_agent),
        ];
        if cfg.headless {
            args.push("--headless=new".to_string());
        }
        let caps = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let base = base.trim_end_matches('/').to_string();
        let value = send(&client, Method::POST, &format!("{base}/session"), Some(caps), "new session").await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::WebDriver {
                op: "new session",
                message: "response carried no sessionId".to_string(),
            })?
            .to_string();
        debug!(session = %id, "webdriver session started");

        Ok(Self { client, base, id, poll })
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>, op: &'static str) -> Result<Value, FetchError> {
        let url = format!("{}/session/{}{}", self.base, self.id, path);
        send(&self.client, method, &url, body, op).await
    }

    async fn load(&self, url: &str, marker: &str, timeout: Duration) -> Result<String, FetchError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })), "navigate")
            .await?;

        let deadline = Instant::now() + timeout;
        let query = json!({ "using": "css selector", "value": marker });
        loop {
            let found = self
                .command(Method::POST, "/elements", Some(query.clone()), "find elements")
                .await?;
            if found.as_array().is_some_and(|a| !a.is_empty()) {
                break;
            }
            if Instant::now() + self.poll >= deadline {
                return Err(timeout_error(url, marker, timeout));
            }
            sleep(self.poll).await;
        }

        let source = self.command(Method::GET, "/source", None, "page source").await?;
        source
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FetchError::WebDriver {
                op: "page source",
                message: "source was not a string".to_string(),
            })
    }

    async fn quit(self) {
        let url = format!("{}/session/{}", self.base, self.id);
        if let Err(e) = send(&self.client, Method::DELETE, &url, None, "delete session").await {
            warn!("failed to close webdriver session {}: {}", self.id, e);
        }
    }
}

/// Issue one WebDriver command and unwrap its `value` member.
async fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    op: &'static str,
) -> Result<Value, FetchError> {
    let http_err = |source: reqwest::Error| FetchError::Http {
        url: url.to_string(),
        source,
    };
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await.map_err(http_err)?;
    let status = resp.status();
    let mut payload: Value = resp.json().await.map_err(http_err)?;
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if !status.is_success() {
        let message = value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(FetchError::WebDriver { op, message });
    }
    Ok(value)
}
