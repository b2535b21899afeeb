pub mod browser;
pub mod faq;
pub mod news;
pub mod rules;

use std::time::Duration;

use chrono::Local;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::db;
use crate::error::FetchError;
use browser::Browser;
use faq::Site;
use news::NewsArticle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    PageLoading,
    Extracting,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct CrawlOutcome<T> {
    pub state: CrawlState,
    pub items: Vec<T>,
    pub error: Option<FetchError>,
}

impl<T> CrawlOutcome<T> {
    fn failed(error: FetchError) -> Self {
        Self {
            state: CrawlState::Failed,
            items: Vec::new(),
            error: Some(error),
        }
    }
}

fn transition(url: &str, from: &mut CrawlState, to: CrawlState) {
    debug!(url, from = ?*from, to = ?to, "crawl state");
    *from = to;
}

/// Load one page, waiting for the first marker that appears, and run
/// `extract` on its markup. The session is torn down on every path.
pub async fn crawl_page<T>(
    cfg: &CrawlConfig,
    url: &str,
    markers: &[&str],
    extract: impl FnOnce(&str) -> Vec<T>,
) -> CrawlOutcome<T> {
    let mut state = CrawlState::Idle;
    let mut browser = match Browser::open(cfg).await {
        Ok(b) => b,
        Err(e) => {
            warn!("could not open a page session for {}: {}", url, e);
            return CrawlOutcome::failed(e);
        }
    };

    transition(url, &mut state, CrawlState::PageLoading);
    let timeout = Duration::from_secs(cfg.timeout_secs);
    let loaded = browser.load_first(url, markers, timeout).await;
    browser.quit().await;

    match loaded {
        Ok(html) => {
            transition(url, &mut state, CrawlState::Extracting);
            let items = extract(&html);
            transition(url, &mut state, CrawlState::Done);
            CrawlOutcome {
                state,
                items,
                error: None,
            }
        }
        Err(e) => {
            warn!("crawl of {} failed: {}", url, e);
            transition(url, &mut state, CrawlState::Failed);
            CrawlOutcome::failed(e)
        }
    }
}

#[derive(Debug)]
pub struct FaqReport {
    pub site: Site,
    pub state: CrawlState,
    pub saved: usize,
}

/// Crawl each FAQ site in turn and replace that company's stored entries.
/// A failed or empty crawl leaves the stored entries untouched.
pub async fn run_faq(
    cfg: &CrawlConfig,
    conn: &Connection,
    sites: &[Site],
    on_site: impl Fn(Site),
) -> rusqlite::Result<Vec<FaqReport>> {
    let mut reports = Vec::new();
    for (i, &site) in sites.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(cfg.source_delay_secs)).await;
        }
        let rules = site.rules();
        let outcome = crawl_page(cfg, rules.url, &[rules.wait_marker], |html| {
            faq::extract(html, rules)
        })
        .await;

        let saved = if outcome.items.is_empty() {
            if outcome.state == CrawlState::Done {
                warn!(company = rules.company, "no FAQ entries found");
            }
            0
        } else {
            db::replace_faq(conn, rules.company, &outcome.items)?
        };
        info!(company = rules.company, saved, state = ?outcome.state, "FAQ crawl finished");
        reports.push(FaqReport {
            site,
            state: outcome.state,
            saved,
        });
        on_site(site);
    }
    Ok(reports)
}

/// Crawl every news source and return the combined articles, newest first.
pub async fn run_news(cfg: &CrawlConfig) -> Vec<NewsArticle> {
    let crawled_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut all = Vec::new();

    for (i, site) in news::SOURCES.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(cfg.source_delay_secs)).await;
        }
        let page_url = match Url::parse(site.url) {
            Ok(u) => u,
            Err(e) => {
                warn!("bad source url {}: {}", site.url, e);
                continue;
            }
        };
        let outcome = crawl_page(cfg, site.url, site.wait_markers, |html| {
            news::extract(html, site, &page_url, cfg.max_articles, &crawled_at)
        })
        .await;
        info!(source = site.source, articles = outcome.items.len(), state = ?outcome.state, "news crawl finished");
        all.extend(outcome.items);
    }

    news::sort_newest_first(&mut all);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn cfg() -> CrawlConfig {
        CrawlConfig {
            timeout_secs: 1,
            poll_millis: 100,
            source_delay_secs: 0,
            ..CrawlConfig::default()
        }
    }

    #[tokio::test]
    async fn page_with_marker_is_extracted() {
        let server = MockServer::start();
        let html = std::fs::read_to_string("tests/fixtures/chevrolet_faq.html").unwrap();
        server.mock(|when, then| {
            when.method(GET).path("/faq");
            then.status(200).body(&html);
        });

        let outcome = crawl_page(&cfg(), &server.url("/faq"), &[faq::CHEVROLET.wait_marker], |h| {
            faq::extract(h, &faq::CHEVROLET)
        })
        .await;

        assert_eq!(outcome.state, CrawlState::Done);
        assert_eq!(outcome.items.len(), 2);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn marker_timeout_yields_empty_result() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/faq");
            then.status(200).body("<html><body>loading…</body></html>");
        });

        let outcome = crawl_page(&cfg(), &server.url("/faq"), &[".col-con"], |h| {
            faq::extract(h, &faq::CHEVROLET)
        })
        .await;

        assert_eq!(outcome.state, CrawlState::Failed);
        assert!(outcome.items.is_empty());
        assert!(outcome.error.is_some_and(|e| e.is_timeout()));
    }

    #[tokio::test]
    async fn falls_back_to_looser_marker() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/news");
            then.status(200)
                .body("<html><body><a href='/view/A1'>첫 기사</a></body></html>");
        });
        let page_url = Url::parse(&server.url("/news")).unwrap();

        let outcome = crawl_page(&cfg(), page_url.as_str(), news::YONHAP.wait_markers, |h| {
            news::extract(h, &news::YONHAP, &page_url, 5, "now")
        })
        .await;

        assert_eq!(outcome.state, CrawlState::Done);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].link, server.url("/view/A1"));
    }

    #[tokio::test]
    async fn failed_crawl_keeps_stored_faq() {
        let conn = db::memory();
        db::replace_faq(
            &conn,
            "CHEVROLET",
            &[db::FaqEntry {
                company: "CHEVROLET".into(),
                category: None,
                question: "q".into(),
                answer: "a".into(),
            }],
        )
        .unwrap();

        // Nothing listens on this port, so the page session fails.
        let cfg = CrawlConfig {
            webdriver_url: Some("http://127.0.0.1:9".into()),
            ..cfg()
        };
        let reports = run_faq(&cfg, &conn, &[Site::Chevrolet], |_| {}).await.unwrap();

        assert_eq!(reports[0].state, CrawlState::Failed);
        assert_eq!(reports[0].saved, 0);
        assert_eq!(db::fetch_faq(&conn, "CHEVROLET").unwrap().len(), 1);
    }
}
