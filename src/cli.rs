//! CLI parser and command dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::Engine;

#[derive(Parser)]
#[command(name = "novelkeep")]
#[command(about = "Chapter acquisition and synchronization for serialized web fiction")]
#[command(version)]
pub struct Cli {
    /// Database file (defaults to novelkeep.db in the working directory)
    #[arg(long, global = true, env = "NOVELKEEP_DB")]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema
    Init,

    /// Discover a novel and its chapters from a series page
    Crawl {
        /// Series page URL on the supported source
        url: String,
    },

    /// Resolve chapter content
    Scrape {
        /// Chapter ID to scrape
        #[arg(long, conflicts_with = "all")]
        chapter: Option<i64>,
        /// Scrape every chapter that still lacks content
        #[arg(long)]
        all: bool,
    },

    /// List a novel's chapters in reading order
    List {
        /// Novel ID
        novel_id: i64,
    },

    /// List known novels
    Novels,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    let db_path = settings.db_path.clone();
    let engine = Engine::new(settings)?;

    match cli.command {
        Commands::Init => {
            // Engine::new already created the schema.
            println!(
                "{} Initialized database at {}",
                style("✓").green(),
                db_path.display()
            );
            Ok(())
        }
        Commands::Crawl { url } => cmd_crawl(&engine, &url).await,
        Commands::Scrape { chapter, all } => cmd_scrape(&engine, chapter, all).await,
        Commands::List { novel_id } => cmd_list(&engine, novel_id).await,
        Commands::Novels => cmd_novels(&engine).await,
    }
}

async fn cmd_crawl(engine: &Engine, url: &str) -> anyhow::Result<()> {
    let spinner = spinner("Crawling listing pages...");
    let summary = engine.crawl_series(url).await;
    spinner.finish_and_clear();

    let summary = summary?;
    match summary.novel_id {
        Some(novel_id) => println!(
            "{} Synchronized {} chapters into novel #{novel_id}",
            style("✓").green(),
            summary.chapters_listed,
        ),
        None => println!("{} No chapters found at {url}", style("!").yellow()),
    }
    Ok(())
}

async fn cmd_scrape(engine: &Engine, chapter: Option<i64>, all: bool) -> anyhow::Result<()> {
    if let Some(chapter_id) = chapter {
        let content = engine.resolve_chapter_content(chapter_id).await?;
        println!("{content}");
        return Ok(());
    }
    if !all {
        anyhow::bail!("specify --chapter <id> or --all");
    }

    let spinner = spinner("Scraping chapters without content...");
    let outcome = engine.run_batch_scrape(None).await;
    spinner.finish_and_clear();

    let outcome = outcome?;
    println!(
        "{} Scraped {} chapters, {} failed",
        style("✓").green(),
        outcome.stats.scraped,
        outcome.stats.failed
    );
    Ok(())
}

async fn cmd_list(engine: &Engine, novel_id: i64) -> anyhow::Result<()> {
    let store = engine.store();
    let store = store.lock().await;

    let Some(novel) = store.get_novel(novel_id)? else {
        anyhow::bail!("no novel with id {novel_id}");
    };
    println!("{}", style(&novel.name).bold());

    for chapter in store.ordered_chapters(novel_id)? {
        let marker = if chapter.has_content() {
            style("✓").green()
        } else {
            style("·").dim()
        };
        let position = chapter
            .position
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("  {marker} {position:>4}  [{}] {}", chapter.id, chapter.name);
    }
    Ok(())
}

async fn cmd_novels(engine: &Engine) -> anyhow::Result<()> {
    let store = engine.store();
    let store = store.lock().await;

    let novels = store.list_novels()?;
    if novels.is_empty() {
        println!("{} No novels yet; run `novelkeep crawl <url>`", style("!").yellow());
        return Ok(());
    }
    for novel in novels {
        println!("  [{}] {} {}", novel.id, novel.name, style(&novel.link).dim());
    }
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}
