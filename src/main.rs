mod config;
mod crawl;
mod db;
mod error;
mod feeds;
mod output;
mod report;
mod sheet;
mod weather;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use config::AppConfig;
use crawl::faq::Site;
use crawl::CrawlState;
use feeds::Feed;

#[derive(Parser)]
#[command(name = "carstat", about = "Car registration statistics loader and automotive web crawler")]
struct Cli {
    /// JSON configuration file; CARSTAT_* environment variables override it
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a registration or charging-station spreadsheet into the database
    Load {
        #[arg(value_enum)]
        feed: Feed,
    },
    /// Crawl manufacturer FAQ pages and store their entries
    Faq {
        /// Sites to crawl (default: all)
        #[arg(long = "site", value_enum)]
        sites: Vec<Site>,
    },
    /// Delete every stored FAQ entry
    FaqClear,
    /// Crawl automotive news and write JSON/CSV/TXT snapshots
    News,
    /// Show the current weather observation
    Weather,
    /// Show row counts per table
    Stats,
    /// Yearly registration totals and FAQ coverage
    Report,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;

    let result = match cli.command {
        Commands::Load { feed } => {
            let conn = db::connect(&cfg.database)?;
            db::init_schema(&conn)?;
            let loaded = feeds::run(&conn, &cfg.sheets, feed)
                .with_context(|| format!("Failed to load {} feed", feed))?;
            for (f, n) in loaded {
                println!("{:<10} {} rows", f.to_string(), n);
            }
            Ok(())
        }
        Commands::Faq { sites } => {
            let sites = if sites.is_empty() { Site::ALL.to_vec() } else { sites };
            let conn = db::connect(&cfg.database)?;
            db::init_schema(&conn)?;

            let pb = ProgressBar::new(sites.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            let reports = crawl::run_faq(&cfg.crawl, &conn, &sites, |site| {
                pb.set_message(site.rules().company);
                pb.inc(1);
            })
            .await?;
            pb.finish_and_clear();

            for r in &reports {
                let status = match r.state {
                    CrawlState::Done => "ok",
                    _ => "failed",
                };
                println!("{:<10} {:>4} entries saved ({})", r.site.rules().company, r.saved, status);
            }
            let total: usize = reports.iter().map(|r| r.saved).sum();
            println!("Saved {} FAQ entries from {} sites.", total, reports.len());
            Ok(())
        }
        Commands::FaqClear => {
            let conn = db::connect(&cfg.database)?;
            db::init_schema(&conn)?;
            let n = db::clear_faq(&conn)?;
            println!("Deleted {} FAQ entries.", n);
            Ok(())
        }
        Commands::News => {
            println!("Crawling car news...");
            let articles = crawl::run_news(&cfg.crawl).await;
            let now = Local::now().naive_local();
            let written = output::write_all(&cfg.crawl.output_dir, &articles, now)?;
            print!("{}", output::render_summary(&articles, now));
            if !articles.is_empty() {
                println!("Files created:");
                for path in written {
                    println!("- {}", path.display());
                }
            }
            Ok(())
        }
        Commands::Weather => {
            let wcfg = cfg.weather()?;
            let client = reqwest::Client::new();
            let obs = weather::fetch(&client, wcfg, Local::now().naive_local())
                .await
                .context("Failed to fetch weather observation")?;
            print!("{}", obs);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cfg.database)?;
            let s = db::get_stats(&conn)?;
            println!("Regions:          {}", s.regions);
            println!("Region counts:    {}", s.region_counts);
            println!("Car types:        {}", s.car_types);
            println!("Car uses:         {}", s.car_uses);
            println!("Charging records: {}", s.charging);
            println!("FAQ entries:      {}", s.faq);
            Ok(())
        }
        Commands::Report => {
            let conn = db::connect(&cfg.database)?;
            db::init_schema(&conn)?;
            let rows = report::year_totals(&db::yearly_totals(&conn)?);
            if rows.is_empty() {
                println!("No registration data. Run 'load region' first.");
            } else {
                println!("{:>6} | {:>14} | {:>9}", "Year", "Registered", "YoY");
                println!("{}", "-".repeat(36));
                for r in &rows {
                    println!(
                        "{:>6} | {:>14} | {:>9}",
                        r.year,
                        r.total,
                        report::format_yoy(r.yoy_percent)
                    );
                }
            }

            let faqs = db::faq_counts(&conn)?;
            if !faqs.is_empty() {
                println!("\n--- FAQ ---");
                for (company, n) in &faqs {
                    println!("  {}: {}", output::truncate(company, 24), n);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_shape() {
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["carstat", "faq", "--site", "genesis", "--site", "chevrolet"]);
        match cli.command {
            Commands::Faq { sites } => assert_eq!(sites, vec![Site::Genesis, Site::Chevrolet]),
            _ => panic!("expected faq"),
        }
        let cli = Cli::parse_from(["carstat", "load", "car-type", "--config", "other.json"]);
        assert_eq!(cli.config, PathBuf::from("other.json"));
        assert!(matches!(cli.command, Commands::Load { feed: Feed::CarType }));
    }

    #[test]
    fn durations() {
        use std::time::Duration;
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
