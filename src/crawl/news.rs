use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use super::rules::{first_element, first_match, first_match_where, normalize_whitespace, select_items, text_of, FieldRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub date: String,
    pub source: String,
}

#[derive(Debug)]
pub struct NewsSite {
    pub source: &'static str,
    pub url: &'static str,
    /// Tried in order; later markers are looser fallbacks.
    pub wait_markers: &'static [&'static str],
    /// Item containers; the first selector matching anything wins.
    pub items: &'static [&'static str],
    pub title: &'static [&'static str],
    pub summary: &'static [FieldRule],
    pub date: &'static [FieldRule],
}

pub static YONHAP: NewsSite = NewsSite {
    source: "Yonhap News",
    url: "https://www.yna.co.kr/industry/automobile",
    wait_markers: &["div.list-type212 li", "body"],
    items: &[
        "div.list-type212 li",
        "a[href*='/view/']",
        "a[href*='/news/']",
        "a[href*='/article/']",
        "a[href*='/automobile/']",
    ],
    title: &[
        "h3 a", "h2 a", "h4 a", "h1 a", "a", ".title a", ".headline a", ".news-title a", "strong a",
        "b a",
    ],
    summary: &[
        FieldRule::text("p"),
        FieldRule::text(".summary"),
        FieldRule::text(".description"),
        FieldRule::text(".content"),
        FieldRule::text(".text"),
        FieldRule::text(".news-summary"),
        FieldRule::text(".article-summary"),
    ],
    date: &[
        FieldRule::attr_or_text("time", "datetime"),
        FieldRule::attr_or_text(".date", "datetime"),
        FieldRule::attr_or_text(".time", "datetime"),
        FieldRule::attr_or_text(".published", "datetime"),
        FieldRule::attr_or_text(".timestamp", "datetime"),
        FieldRule::attr_or_text(".news-date", "datetime"),
        FieldRule::attr_or_text(".article-date", "datetime"),
        FieldRule::attr_or_text(".date-time", "datetime"),
        FieldRule::attr_or_text(".txt-time", "datetime"),
    ],
};

pub static SOURCES: &[&NewsSite] = &[&YONHAP];

fn href(el: ElementRef, base: &Url) -> Option<String> {
    let raw = el.value().attr("href")?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(base.join(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string()))
}

fn link_for(item: ElementRef, title_el: ElementRef, base: &Url) -> String {
    if title_el.value().name() == "a" {
        return href(title_el, base).unwrap_or_default();
    }
    let first_anchor = Selector::parse("a")
        .ok()
        .and_then(|sel| item.select(&sel).next());
    first_anchor
        .and_then(|a| href(a, base))
        .unwrap_or_default()
}

/// Extract up to `max` articles. Articles without a title are skipped; a
/// missing date falls back to `crawled_at`.
pub fn extract(
    html: &str,
    site: &NewsSite,
    page_url: &Url,
    max: usize,
    crawled_at: &str,
) -> Vec<NewsArticle> {
    let doc = Html::parse_document(html);
    let items = select_items(doc.root_element(), site.items);

    items
        .into_iter()
        .take(max)
        .filter_map(|item| {
            let title_el = first_element(item, site.title).unwrap_or(item);
            let title = normalize_whitespace(&text_of(title_el));
            if title.is_empty() {
                return None;
            }
            let link = link_for(item, title_el, page_url);
            let summary = first_match_where(item, site.summary, |s| s != title).unwrap_or_default();
            let date = first_match(item, site.date).unwrap_or_else(|| crawled_at.to_string());
            Some(NewsArticle {
                title,
                link,
                summary,
                date,
                source: site.source.to_string(),
            })
        })
        .collect()
}

pub fn sort_newest_first(articles: &mut [NewsArticle]) {
    articles.sort_by(|a, b| b.date.cmp(&a.date));
}
