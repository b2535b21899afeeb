//! Snapshot files and console summary for a news crawl. Every write
//! replaces the previous file.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::crawl::news::NewsArticle;

pub const JSON_FILE: &str = "car_news.json";
pub const CSV_FILE: &str = "car_news.csv";
pub const TXT_FILE: &str = "car_news.txt";

const SUMMARY_LIMIT: usize = 10;
const RULE_WIDTH: usize = 80;

#[derive(Serialize)]
struct Snapshot<'a> {
    crawl_date: String,
    total_articles: usize,
    articles: &'a [NewsArticle],
}

pub fn write_json(path: &Path, articles: &[NewsArticle], generated_at: NaiveDateTime) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let snapshot = Snapshot {
        crawl_date: generated_at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        total_articles: articles.len(),
        articles,
    };
    serde_json::to_writer_pretty(BufWriter::new(file), &snapshot)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Header plus one row per article; no articles leaves an empty file.
pub fn write_csv(path: &Path, articles: &[NewsArticle]) -> Result<()> {
    if articles.is_empty() {
        File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        return Ok(());
    }
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    for article in articles {
        wtr.serialize(article)?;
    }
    wtr.flush()?;
    Ok(())
}

struct Report<'a> {
    articles: &'a [NewsArticle],
    generated_at: NaiveDateTime,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CAR NEWS REPORT")?;
        writeln!(f, "Generated on: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Total Articles: {}", self.articles.len())?;
        writeln!(f, "{}\n", "=".repeat(RULE_WIDTH))?;

        for (i, a) in self.articles.iter().enumerate() {
            writeln!(f, "{}. {}", i + 1, a.title)?;
            writeln!(f, "   Source: {}", a.source)?;
            writeln!(f, "   Date: {}", a.date)?;
            writeln!(f, "   Link: {}", a.link)?;
            if !a.summary.is_empty() {
                writeln!(f, "   Summary: {}", a.summary)?;
            }
            writeln!(f, "\n{}\n", "-".repeat(RULE_WIDTH))?;
        }
        Ok(())
    }
}

pub fn render_report(articles: &[NewsArticle], generated_at: NaiveDateTime) -> String {
    Report { articles, generated_at }.to_string()
}

pub fn write_txt(path: &Path, articles: &[NewsArticle], generated_at: NaiveDateTime) -> Result<()> {
    fs::write(path, render_report(articles, generated_at)).with_context(|| format!("Failed to write {:?}", path))
}

/// Write all three snapshots into `dir`, returning the paths written.
pub fn write_all(dir: &Path, articles: &[NewsArticle], generated_at: NaiveDateTime) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let json = dir.join(JSON_FILE);
    let csv = dir.join(CSV_FILE);
    let txt = dir.join(TXT_FILE);
    write_json(&json, articles, generated_at)?;
    write_csv(&csv, articles)?;
    write_txt(&txt, articles, generated_at)?;
    info!(articles = articles.len(), dir = ?dir, "news snapshots written");
    Ok(vec![json, csv, txt])
}

struct Summary<'a> {
    articles: &'a [NewsArticle],
    generated_at: NaiveDateTime,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.articles.is_empty() {
            return writeln!(f, "No news articles found.");
        }
        let sources: BTreeSet<&str> = self.articles.iter().map(|a| a.source.as_str()).collect();
        let rule = "=".repeat(60);

        writeln!(f, "{rule}\nCAR NEWS SUMMARY\n{rule}")?;
        writeln!(f, "Total Articles: {}", self.articles.len())?;
        writeln!(f, "Sources: {}", sources.into_iter().collect::<Vec<_>>().join(", "))?;
        writeln!(f, "Latest Update: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "{rule}\n")?;

        for (i, a) in self.articles.iter().take(SUMMARY_LIMIT).enumerate() {
            writeln!(f, "{}. {}", i + 1, a.title)?;
            writeln!(f, "   Source: {} | Date: {}", a.source, a.date)?;
            if !a.summary.is_empty() {
                writeln!(f, "   {}", truncate(&a.summary, 100))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub fn render_summary(articles: &[NewsArticle], generated_at: NaiveDateTime) -> String {
    Summary { articles, generated_at }.to_string()
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
