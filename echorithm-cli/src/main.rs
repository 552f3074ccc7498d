//! echorithm: terminal front end for the Echorithm news client.
//!
//! # Subcommands
//! - `login <username> <password>` / `register <username> <password>` / `logout`
//! - `refresh`: renew the access token from the stored refresh token
//! - `read <url> [--title] [--category] [--seconds N]`: tracked reading session
//! - `bookmark <url> [--title]`: toggle a bookmark
//! - `bookmarks`: list saved articles
//! - `analytics [--days 7|30|90]`: reading dashboard
//! - `suggest`: recent and popular searches
//! - `search <query>`: search articles
//! - `prefs [CATEGORY ...]`: show or replace feed categories
//! - `for-you`: personalized feed
//! - `lists`, `list-create`, `list-delete`, `list-add`, `list-remove`: reading lists

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use echorithm_client::{Echorithm, ExternalOpener, ProbeState};
use echorithm_core::format::format_duration;
use echorithm_core::models::{AnalyticsSnapshot, ArticleView};
use echorithm_core::{ClientError, EchorithmConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "echorithm", version, about = "Echorithm news client")]
struct Cli {
    /// Config file (TOML); missing file means defaults
    #[arg(short, long, env = "ECHORITHM_CONFIG", default_value = "echorithm.toml")]
    config: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in and keep the issued tokens
    Login { username: String, password: String },

    /// Create an account and sign in
    Register { username: String, password: String },

    /// Forget stored credentials
    Logout,

    /// Renew the access token
    Refresh,

    /// Read an article with a tracked reading session
    Read {
        url: String,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "")]
        category: String,

        /// Close the reader after this many seconds (default: wait for Ctrl+C)
        #[arg(long)]
        seconds: Option<u64>,
    },

    /// Toggle the bookmark on an article
    Bookmark {
        url: String,

        #[arg(long, default_value = "")]
        title: String,
    },

    /// List saved articles
    Bookmarks,

    /// Show the reading analytics dashboard
    Analytics {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },

    /// Show recent and popular searches
    Suggest,

    /// Search articles
    Search { query: String },

    /// Show feed categories, or replace them with the ones given
    Prefs { categories: Vec<String> },

    /// Articles picked for you
    ForYou,

    /// Show reading lists
    Lists,

    /// Create a reading list
    ListCreate {
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a reading list
    ListDelete { name: String },

    /// Add an article to a reading list
    ListAdd {
        name: String,
        url: String,

        #[arg(long, default_value = "")]
        title: String,
    },

    /// Remove an article from a reading list
    ListRemove { name: String, url: String },
}

/// A terminal cannot embed a page; hand the URL to the user instead.
struct TerminalOpener;

impl ExternalOpener for TerminalOpener {
    fn open_external(&self, url: &str) -> Result<(), ClientError> {
        println!("Open in your browser: {}", url);
        Ok(())
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn do_read(
    app: &Echorithm,
    url: String,
    title: String,
    category: String,
    seconds: Option<u64>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let watcher = app.spawn_storage_watcher(cancel.clone());

    let mut reader = app.open_reader(ArticleView::new(url, title, category), true)?;
    println!("Reading session {}", reader.session_id());

    let mut probe_state = match reader.probe() {
        Some(probe) => probe.watch(),
        None => anyhow::bail!("reader opened without a probe"),
    };
    let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        let until_deadline = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = until_deadline => break,
            Ok(()) = probe_state.changed() => {
                if *probe_state.borrow_and_update() == ProbeState::Blocked {
                    tracing::debug!("Embedding unavailable, reading externally");
                }
            }
            _ = ticker.tick() => {
                eprint!("\rElapsed: {}   ", reader.elapsed_label());
            }
        }
    }
    eprintln!();

    if let Some(session) = reader.close().await {
        println!(
            "Read for {} ({})",
            format_duration(session.reading_time_seconds),
            if session.completed { "completed" } else { "not completed" }
        );
    }

    cancel.cancel();
    watcher.await.ok();
    Ok(())
}

async fn do_bookmark(app: &Echorithm, url: String, title: String) -> anyhow::Result<()> {
    let article = ArticleView::new(url, title, "");
    app.bookmarks.refresh(std::slice::from_ref(&article.url)).await?;
    let bookmarked = app.bookmarks.toggle(&article).await?;
    println!(
        "{} {}",
        if bookmarked { "Bookmarked" } else { "Removed bookmark" },
        article.url
    );
    Ok(())
}

async fn do_bookmarks(app: &Echorithm, json: bool) -> anyhow::Result<()> {
    let entries = app.bookmarks.list().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        eprintln!("No bookmarks yet.");
    }
    for entry in &entries {
        println!("{}\n  {}", entry.article.title, entry.article.url);
    }
    Ok(())
}

fn print_dashboard(snapshot: &AnalyticsSnapshot) {
    if snapshot.is_empty() {
        println!("No reading activity in the last {} days.", snapshot.range.days());
        return;
    }

    let t = &snapshot.totals;
    println!("Last {} days", snapshot.range.days());
    println!("Articles read:   {}", t.articles_read);
    println!("Reading time:    {} (avg {})", t.total_time, t.avg_time);
    println!("Completion rate: {:.0}%", t.completion_rate);
    println!("Peak:            {} around {}", snapshot.peak_day, snapshot.peak_hour_label);

    println!("\nCategories");
    for c in &snapshot.categories {
        println!("  {:<14} {:>4}  {:>3}%", c.category, c.count, c.rounded_percentage);
    }

    println!("\nTimeline");
    for bar in &snapshot.timeline {
        let width = (bar.height_pct / 5.0).round() as usize;
        println!("  {:>5} {:<20} {}", bar.label, "#".repeat(width), bar.articles_read);
    }

    for insight in &snapshot.insights {
        println!("\n{} {}", insight.icon, insight.message);
    }
}

async fn do_suggest(app: &Echorithm, json: bool) -> anyhow::Result<()> {
    let Some(set) = app.suggestions.focus().await? else {
        eprintln!("Log in to see personalized suggestions.");
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&set)?);
        return Ok(());
    }
    for query in &set.recent {
        println!("recent   {}", query);
    }
    for popular in &set.popular {
        match popular.count {
            Some(n) => println!("popular  {} ({})", popular.query, n),
            None => println!("popular  {}", popular.query),
        }
    }
    Ok(())
}

async fn do_search(app: &Echorithm, query: String, json: bool) -> anyhow::Result<()> {
    let results = app.suggestions.search(&query).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.articles.is_empty() {
        eprintln!("No results found for: {}", query);
    }
    for article in &results.articles {
        println!("{}\n  {} | {}\n", article.title, article.source, article.url);
    }
    Ok(())
}

async fn do_prefs(app: &Echorithm, categories: Vec<String>, json: bool) -> anyhow::Result<()> {
    if !categories.is_empty() {
        app.save_preferences(&categories).await?;
        println!("Saved {} categories", categories.len());
        return Ok(());
    }

    let prefs = app.preferences().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else if prefs.categories.is_empty() {
        eprintln!("No categories chosen yet.");
    } else {
        println!("{}", prefs.categories.join(", "));
    }
    Ok(())
}

async fn do_for_you(app: &Echorithm, json: bool) -> anyhow::Result<()> {
    let feed = app.personalized_feed().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&feed)?);
        return Ok(());
    }
    if let Some(message) = &feed.message {
        eprintln!("{}", message);
    }
    for article in &feed.articles {
        println!("{}\n  {} | {}\n", article.title, article.category, article.url);
    }
    Ok(())
}

async fn do_lists(app: &Echorithm, json: bool) -> anyhow::Result<()> {
    let lists = app.reading_lists.load().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&lists)?);
        return Ok(());
    }
    if lists.is_empty() {
        eprintln!("No reading lists yet.");
    }
    for list in &lists {
        println!("{} ({} articles)", list.name, list.articles.len());
        if !list.description.is_empty() {
            println!("  {}", list.description);
        }
        for article in &list.articles {
            println!("  - {}  {}", article.title, article.url);
        }
    }
    Ok(())
}

async fn run(app: &Echorithm, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Login { username, password } => {
            app.login(&username, &password).await?;
            println!("Signed in as {}", username);
        }
        Commands::Register { username, password } => {
            app.register(&username, &password).await?;
            println!("Registered and signed in as {}", username);
        }
        Commands::Refresh => {
            if app.refresh_session().await? {
                println!("Session renewed");
            } else {
                println!("Not signed in");
            }
        }
        Commands::Logout => {
            if app.logout()? {
                println!("Signed out");
            } else {
                println!("Not signed in");
            }
        }
        Commands::Read {
            url,
            title,
            category,
            seconds,
        } => do_read(app, url, title, category, seconds).await?,
        Commands::Bookmark { url, title } => do_bookmark(app, url, title).await?,
        Commands::Bookmarks => do_bookmarks(app, json).await?,
        Commands::Analytics { days } => {
            let snapshot = app.analytics.load_days(days).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&*snapshot)?);
            } else {
                print_dashboard(&snapshot);
            }
        }
        Commands::Suggest => do_suggest(app, json).await?,
        Commands::Search { query } => do_search(app, query, json).await?,
        Commands::Prefs { categories } => do_prefs(app, categories, json).await?,
        Commands::ForYou => do_for_you(app, json).await?,
        Commands::Lists => do_lists(app, json).await?,
        Commands::ListCreate { name, description } => {
            let list = app.reading_lists.create(&name, &description).await?;
            println!("Created reading list {}", list.name);
        }
        Commands::ListDelete { name } => {
            app.reading_lists.delete(&name).await?;
            println!("Deleted reading list {}", name);
        }
        Commands::ListAdd { name, url, title } => {
            app.reading_lists
                .add(&name, &ArticleView::new(url.as_str(), title, ""))
                .await?;
            println!("Added {} to {}", url, name);
        }
        Commands::ListRemove { name, url } => {
            app.reading_lists.remove(&name, &url).await?;
            println!("Removed {} from {}", url, name);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match EchorithmConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins; the config level is the fallback
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let app = Echorithm::from_config(config, Arc::new(TerminalOpener))?;

    if let Err(e) = run(&app, cli.command, cli.json).await {
        match e.downcast_ref::<ClientError>() {
            Some(client_err) if client_err.requires_login() => {
                eprintln!("echorithm: {} Run `echorithm login <username> <password>`.", client_err.user_message());
            }
            Some(client_err) => eprintln!("echorithm: {}", client_err.user_message()),
            None => eprintln!("echorithm: {}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_parses_seconds() {
        let cli = Cli::try_parse_from([
            "echorithm", "read", "https://news.test/a", "--category", "Tech", "--seconds", "40",
        ])
        .unwrap();
        match cli.command {
            Commands::Read { url, category, seconds, .. } => {
                assert_eq!(url, "https://news.test/a");
                assert_eq!(category, "Tech");
                assert_eq!(seconds, Some(40));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_json_flag_is_global() {
        let cli = Cli::try_parse_from(["echorithm", "analytics", "--days", "7", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Analytics { days: 7 }));
    }

    #[test]
    fn test_list_commands_are_kebab_case() {
        let cli = Cli::try_parse_from([
            "echorithm", "list-create", "Weekend", "--description", "Long reads",
        ])
        .unwrap();
        match cli.command {
            Commands::ListCreate { name, description } => {
                assert_eq!(name, "Weekend");
                assert_eq!(description, "Long reads");
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(matches!(
            Cli::try_parse_from(["echorithm", "for-you"]).unwrap().command,
            Commands::ForYou
        ));
    }

    #[test]
    fn test_prefs_without_categories_shows_current() {
        let cli = Cli::try_parse_from(["echorithm", "prefs"]).unwrap();
        assert!(matches!(cli.command, Commands::Prefs { categories } if categories.is_empty()));
    }

    #[test]
    fn test_config_defaults_to_toml_in_cwd() {
        let cli = Cli::try_parse_from(["echorithm", "logout"]).unwrap();
        assert_eq!(cli.config, "echorithm.toml");
    }
}
