use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use database::Database;
use reddit_client::{RedditApiClient, RedditAuthConfig};
use scrape_service::ScrapeService;
use std::path::PathBuf;
use ticker_linker::{ContentFetcher, TickerLinker};
use tickertalk_core::{AppConfig, ConfigError, CoreError, ScrapeConfig};

#[derive(Parser)]
#[command(
    name = "tickertalk",
    version,
    about = "Discussion-thread ingestion and ticker linking"
)]
struct Cli {
    /// Per-forum scrape configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Restrict the run to a single subreddit
    #[arg(long, global = true)]
    subreddit: Option<String>,

    /// Reply-tree expansion depth override
    #[arg(long, global = true)]
    max_expand: Option<u32>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape new content from currently-active discussion threads
    Incremental,
    /// Load a historical date range day by day
    Backfill {
        /// First day to load (YYYY-MM-DD)
        #[arg(long)]
        from: String,
        /// Last day to load, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: String,
    },
    /// Report per-thread scrape progress
    Status,
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tickertalk=debug,tickertalk_core=debug,reddit_client=debug,ticker_linker=debug,\
         database=debug,scrape_service=debug"
    } else {
        "tickertalk=info,tickertalk_core=info,reddit_client=info,ticker_linker=info,\
         database=info,scrape_service=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Tickertalk ingestion");

    // Configuration problems are fatal here, before any scraping begins.
    let app_config = AppConfig::from_env()?;
    let mut scrape_config = match &cli.config {
        Some(path) => ScrapeConfig::load(path)?,
        None => ScrapeConfig::default(),
    };
    if let Some(subreddit) = &cli.subreddit {
        restrict_to_subreddit(&mut scrape_config, subreddit);
    }
    if cli.max_expand.is_some() {
        scrape_config.max_expand = cli.max_expand;
    }
    scrape_config.validate()?;

    let db = Database::connect(&app_config.database_url).await?;
    db.migrate().await?;

    if let Command::Status = cli.command {
        return print_status(&db).await;
    }

    let tickers = db.load_tickers().await?;
    if tickers.is_empty() {
        return Err(CoreError::Config(ConfigError::ValidationFailed {
            reason: "ticker reference set is empty; seed the tickers table before scraping"
                .to_string(),
        }));
    }
    tracing::info!("Loaded {} ticker references", tickers.len());

    let api = RedditApiClient::new(RedditAuthConfig {
        client_id: app_config.reddit_client_id.clone(),
        client_secret: app_config.reddit_client_secret.clone(),
        user_agent: app_config.reddit_user_agent.clone(),
    });
    let linker = TickerLinker::new(tickers)
        .with_content_fetch(ContentFetcher::new(&app_config.reddit_user_agent));
    let service = ScrapeService::new(api, db, linker, scrape_config);

    let stats = match cli.command {
        Command::Incremental => service.run_incremental().await?,
        Command::Backfill { from, to } => {
            let start = parse_date("--from", &from)?;
            let end = parse_date("--to", &to)?;
            service.run_backfill(start, end).await?
        }
        Command::Status => unreachable!("handled above"),
    };

    println!("{}", stats);
    Ok(())
}

fn parse_date(flag: &str, value: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        CoreError::Config(ConfigError::InvalidValue {
            field: flag.to_string(),
            value: value.to_string(),
        })
    })
}

fn restrict_to_subreddit(config: &mut ScrapeConfig, subreddit: &str) {
    let known = config
        .forums
        .iter()
        .any(|f| f.subreddit.eq_ignore_ascii_case(subreddit));
    if known {
        for forum in &mut config.forums {
            forum.enabled = forum.subreddit.eq_ignore_ascii_case(subreddit);
        }
    } else {
        // An override for a forum outside the config scrapes it with the
        // default rule set.
        let mut rule = ScrapeConfig::default().forums.remove(0);
        rule.subreddit = subreddit.to_string();
        config.forums = vec![rule];
    }
}

async fn print_status(db: &Database) -> Result<(), CoreError> {
    let threads = db.list_threads().await?;
    if threads.is_empty() {
        println!("No threads scraped yet.");
        return Ok(());
    }

    println!(
        "{:<12} {:<8} {:<18} {:>8} {:>8}  {:<9} {}",
        "thread", "kind", "subreddit", "scraped", "total", "complete", "title"
    );
    for thread in threads {
        println!(
            "{:<12} {:<8} {:<18} {:>8} {:>8}  {:<9} {}",
            thread.reddit_id,
            thread.kind.as_str(),
            thread.subreddit,
            thread.scraped_items,
            thread.total_items,
            if thread.is_complete { "yes" } else { "no" },
            thread.title
        );
    }
    Ok(())
}
