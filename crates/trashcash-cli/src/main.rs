// ============================================================================
// trashcash — terminal client for the TrashCash recycling rewards backend
// ============================================================================
// Usage:
//   trashcash status                         Balance, level and stats
//   trashcash points [--lat X --lng Y]       Recycling points (nearest first)
//   trashcash rewards                        Reward catalog
//   trashcash buy 3 [--yes]                  Purchase a reward
//   trashcash scan [CODE]                    Report recycling via QR code
//   trashcash receipt --point 1 --photo F    Report recycling via receipt photo
//   trashcash cache stats                    Inspect the offline ledger cache
// ============================================================================

mod console;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use trashcash_core::config::{normalize_api_url, parse_history_limit};
use trashcash_core::flows::{photo_data_url, SubmissionReceipt};
use trashcash_core::{
    App, ClientConfig, GeoPoint, HttpBackend, LedgerCache, PurchaseOutcome, StartupReport,
    StatsSource, SubmissionOutcome, TrashCashError,
};

use console::ConsoleBridge;

/// TrashCash recycling rewards client
#[derive(Parser)]
#[command(name = "trashcash", version, about = "Earn and spend TrashCash coins from the terminal")]
struct Cli {
    /// Backend base URL (default: TRASHCASH_API_URL or http://localhost:5000)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Signed session payload (default: TRASHCASH_INIT_DATA or dev_mode)
    #[arg(long, global = true)]
    init_data: Option<String>,

    /// Path to the ledger cache (default: ~/.trashcash/ledger.redb)
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Do not read or write the offline ledger cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show profile, balance, level and recycling stats
    Status,

    /// List recycling points
    Points {
        /// Latitude to sort by distance from
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude to sort by distance from
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
    },

    /// Show one recycling point
    Point { id: i64 },

    /// List the reward catalog
    Rewards,

    /// List purchased rewards
    MyRewards,

    /// Show transaction history
    History {
        /// Number of transactions to fetch (max 500)
        #[arg(long, value_parser = parse_limit)]
        limit: Option<u32>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show unlocked and upcoming achievements
    Achievements {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Purchase a reward
    Buy {
        reward_id: i64,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Report recycling with a point's QR code (prompts when omitted)
    Scan {
        code: Option<String>,

        /// Material type (prompts when omitted)
        #[arg(long)]
        material: Option<String>,

        /// Weight in kg (default 1.0)
        #[arg(long)]
        weight: Option<String>,
    },

    /// Report recycling with a receipt photo
    Receipt {
        /// Recycling point id
        #[arg(long)]
        point: i64,

        /// Receipt image (jpg, png, webp)
        #[arg(long)]
        photo: PathBuf,

        #[arg(long)]
        material: String,

        /// Weight in kg
        #[arg(long)]
        weight: String,
    },

    /// Inspect or clear the offline ledger cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache location and size
    Stats,

    /// Drop the cached ledger of one user
    Clear { user_id: i64 },
}

fn parse_limit(s: &str) -> std::result::Result<u32, String> {
    parse_history_limit(s).map_err(|e| e.to_string())
}

/// Image mime type from the file extension
fn photo_mime(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        "gif" => Ok("image/gif"),
        _ => anyhow::bail!(
            "Unsupported photo type '{}'. Use jpg, png, webp or gif.",
            path.display()
        ),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("trashcash_core={}", level).parse()?)
        .add_directive(format!("trashcash={}", level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if already_reported(&e) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Flow errors reach the user through the console alert before they return
fn already_reported(err: &anyhow::Error) -> bool {
    err.is::<TrashCashError>()
}

async fn run(cli: Cli) -> Result<()> {
    let dotenv = dotenvy::dotenv();
    init_logging(cli.verbose)?;
    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api_url = normalize_api_url(url)?;
    }
    if let Some(init_data) = cli.init_data.clone() {
        config.init_data = init_data;
    }
    if let Some(path) = cli.cache_path.clone() {
        config.cache_path = Some(path);
    }

    let Cli {
        command, no_cache, ..
    } = cli;

    match command {
        Commands::Cache { action } => cmd_cache(&config, action),
        Commands::Status => cmd_status(&build_app(&config, console(&config), no_cache)).await,
        Commands::Points { lat, lng } => {
            if let (Some(lat), Some(lng)) = (lat, lng) {
                config.location = Some(GeoPoint { lat, lng });
            }
            cmd_points(&build_app(&config, console(&config), no_cache)).await
        }
        Commands::Point { id } => cmd_point(&build_app(&config, console(&config), no_cache), id).await,
        Commands::Rewards => cmd_rewards(&build_app(&config, console(&config), no_cache)).await,
        Commands::MyRewards => cmd_my_rewards(&build_app(&config, console(&config), no_cache)).await,
        Commands::History { limit, json } => {
            if limit.is_some() {
                config.history_limit = limit;
            }
            cmd_history(&build_app(&config, console(&config), no_cache), json).await
        }
        Commands::Achievements { json } => {
            cmd_achievements(&build_app(&config, console(&config), no_cache), json).await
        }
        Commands::Buy { reward_id, yes } => {
            let bridge = console(&config).auto_confirm(yes);
            cmd_buy(&build_app(&config, bridge, no_cache), reward_id).await
        }
        Commands::Scan {
            code,
            material,
            weight,
        } => {
            let bridge = console(&config).with_answers(material, weight);
            cmd_scan(&build_app(&config, bridge, no_cache), code).await
        }
        Commands::Receipt {
            point,
            photo,
            material,
            weight,
        } => {
            let app = build_app(&config, console(&config), no_cache);
            cmd_receipt(&app, point, &photo, &material, &weight).await
        }
    }
}

fn console(config: &ClientConfig) -> ConsoleBridge {
    ConsoleBridge::new(config.init_data.clone())
}

fn build_app(config: &ClientConfig, console: ConsoleBridge, no_cache: bool) -> App {
    let console = Arc::new(console);
    let backend = Arc::new(HttpBackend::new(&config.api_url));

    let mut app = App::new(backend, console.clone(), console)
        .with_history_limit(config.history_limit)
        .with_location(config.location);

    if !no_cache {
        match LedgerCache::open(config.cache_path.as_deref()) {
            Ok(cache) => app = app.with_cache(Arc::new(cache)),
            Err(e) => warn!("Ledger cache disabled: {}", e),
        }
    }
    app
}

/// Validate the session and load everything; partial failures are printed
async fn start(app: &App) -> Result<StartupReport> {
    let report = app.start().await?;
    for failure in &report.failures {
        eprintln!("warning: could not load {:?}: {}", failure.slice, failure.error);
    }
    if !report.restored.is_empty() {
        eprintln!("warning: showing cached data for {:?}", report.restored);
    }
    Ok(report)
}

fn cmd_cache(config: &ClientConfig, action: CacheAction) -> Result<()> {
    let cache = LedgerCache::open(config.cache_path.as_deref())?;
    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("=== TrashCash Ledger Cache ===");
            println!("Cache:        {}", stats.path.display());
            println!("Snapshots:    {}", stats.snapshots);
            println!("Transactions: {}", stats.total_transactions);
        }
        CacheAction::Clear { user_id } => {
            if cache.clear(user_id)? {
                println!("Cleared cached ledger for user {}.", user_id);
            } else {
                println!("No cached ledger for user {}.", user_id);
            }
        }
    }
    Ok(())
}

async fn cmd_status(app: &App) -> Result<()> {
    let report = start(app).await?;
    let state = app.state().await;
    let stats = state.ledger.stats();

    println!("=== TrashCash ===");
    match &report.user {
        Some(user) => println!("User:     {} (@{})", user.display_name(), user.username),
        None => println!("User:     -"),
    }
    println!("Balance:  {} coins", state.ledger.balance());
    println!("Level:    {} ({} / 100 points)", stats.level, stats.points);
    println!();
    println!("Recycled:     {:.1} kg", stats.total_recycled);
    println!("Submissions:  {}", stats.total_transactions);
    println!("Rewards:      {}", stats.total_rewards);
    if report.stats_source == StatsSource::Computed {
        println!("(stats computed from local history)");
    }
    Ok(())
}

async fn cmd_points(app: &App) -> Result<()> {
    start(app).await?;
    let state = app.state().await;

    if state.points.is_empty() {
        println!("No recycling points found.");
        return Ok(());
    }

    println!(
        "{:<4}  {:<24}  {:<30}  {:<12}  {:<8}  {}",
        "ID", "NAME", "ADDRESS", "HOURS", "DIST", "ACCEPTS"
    );
    println!("{}", "-".repeat(100));
    for point in &state.points {
        let distance = point
            .distance
            .map(|d| format!("{:.1} km", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<4}  {:<24}  {:<30}  {:<12}  {:<8}  {}",
            point.id,
            truncate(&point.name, 24),
            truncate(&point.address, 30),
            point.hours,
            distance,
            point.types.join(", ")
        );
    }
    println!("\nTotal: {} points", state.points.len());
    Ok(())
}

async fn cmd_point(app: &App, id: i64) -> Result<()> {
    start(app).await?;
    let point = app.show_point(id).await?.outcome;

    println!("=== {} ===", point.name);
    println!("Address:  {}", point.address);
    println!("Hours:    {}", point.hours);
    println!("Location: {:.5}, {:.5}", point.lat, point.lng);
    println!("Accepts:  {}", point.types.join(", "));
    if let Some(distance) = point.distance {
        println!("Distance: {:.1} km", distance);
    }
    Ok(())
}

async fn cmd_rewards(app: &App) -> Result<()> {
    start(app).await?;
    let state = app.state().await;
    let balance = state.ledger.balance();

    if state.rewards.is_empty() {
        println!("No rewards available.");
        return Ok(());
    }

    println!("{:<4}  {:<2}  {:<28}  {:>7}  {}", "ID", "", "NAME", "PRICE", "DESCRIPTION");
    println!("{}", "-".repeat(90));
    for reward in &state.rewards {
        let marker = if reward.is_affordable(balance) { "" } else { "  (not enough coins)" };
        println!(
            "{:<4}  {:<2}  {:<28}  {:>7}  {}{}",
            reward.id,
            reward.kind.icon(),
            truncate(&reward.name, 28),
            reward.price,
            truncate(&reward.description, 40),
            marker
        );
    }
    println!("\nBalance: {} coins", balance);
    Ok(())
}

async fn cmd_my_rewards(app: &App) -> Result<()> {
    start(app).await?;
    let state = app.state().await;
    let owned = state.ledger.owned_rewards();

    if owned.is_empty() {
        println!("No purchased rewards yet.");
        return Ok(());
    }

    println!("{:<17}  {:<2}  {:<28}  {:>7}", "PURCHASED", "", "REWARD", "PRICE");
    println!("{}", "-".repeat(60));
    for reward in owned {
        println!(
            "{:<17}  {:<2}  {:<28}  {:>7}",
            reward.date.format("%Y-%m-%d %H:%M"),
            reward.kind.icon(),
            truncate(&reward.reward_name, 28),
            reward.price
        );
    }
    println!("\nTotal: {} rewards", owned.len());
    Ok(())
}

async fn cmd_history(app: &App, json: bool) -> Result<()> {
    start(app).await?;
    let state = app.state().await;
    let transactions = state.ledger.transactions();

    if json {
        println!("{}", serde_json::to_string_pretty(transactions)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }

    println!("{:<17}  {:<2}  {:<44}  {:>8}", "DATE", "", "DESCRIPTION", "COINS");
    println!("{}", "-".repeat(76));
    for tx in transactions {
        println!(
            "{:<17}  {:<2}  {:<44}  {:>8}",
            tx.date.format("%Y-%m-%d %H:%M"),
            tx.icon(),
            truncate(&tx.describe(), 44),
            tx.signed_coins()
        );
    }
    println!("\nTotal: {} transactions", transactions.len());
    Ok(())
}

async fn cmd_achievements(app: &App, json: bool) -> Result<()> {
    start(app).await?;
    let achievements = app.state().await.achievements();

    if json {
        println!("{}", serde_json::to_string_pretty(&achievements)?);
        return Ok(());
    }

    for a in &achievements {
        let status = match (a.unlocked, a.progress) {
            (true, _) => "unlocked".to_string(),
            (false, Some(p)) => format!("{:.0}%", p),
            (false, None) => "-".to_string(),
        };
        println!("{}  {:<26}  {:<30}  {}", a.icon, a.title, a.description, status);
    }
    Ok(())
}

async fn cmd_buy(app: &App, reward_id: i64) -> Result<()> {
    start(app).await?;
    match app.purchase(reward_id).await?.outcome {
        PurchaseOutcome::Purchased(receipt) => {
            println!("Balance: {} coins", receipt.new_balance);
            if let Some(purchase) = receipt.purchase {
                println!("Owned:   {} {}", purchase.kind.icon(), purchase.reward_name);
            }
        }
        PurchaseOutcome::Declined => println!("Purchase cancelled."),
    }
    Ok(())
}

async fn cmd_scan(app: &App, code: Option<String>) -> Result<()> {
    start(app).await?;
    let transition = match code {
        Some(code) => app.handle_qr_code(&code).await?,
        None => app.scan_qr().await?,
    };
    print_submission(transition.outcome);
    Ok(())
}

async fn cmd_receipt(app: &App, point: i64, photo: &Path, material: &str, weight: &str) -> Result<()> {
    let mime = photo_mime(photo)?;
    let bytes = tokio::fs::read(photo)
        .await
        .with_context(|| format!("Failed to read {}", photo.display()))?;

    start(app).await?;
    let transition = app
        .submit_receipt(point, photo_data_url(&bytes, mime), material, weight)
        .await?;
    print_submission(transition.outcome);
    Ok(())
}

fn print_submission(outcome: SubmissionOutcome) {
    match outcome {
        SubmissionOutcome::Submitted(SubmissionReceipt {
            transaction: Some(tx),
            ..
        }) => println!("Recorded: {} {}", tx.icon(), tx.describe()),
        SubmissionOutcome::Submitted(_) => {}
        SubmissionOutcome::Aborted => println!("Submission cancelled."),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_mime() {
        assert_eq!(photo_mime(Path::new("receipt.JPG")).unwrap(), "image/jpeg");
        assert_eq!(photo_mime(Path::new("/tmp/r.png")).unwrap(), "image/png");
        assert!(photo_mime(Path::new("receipt.pdf")).is_err());
        assert!(photo_mime(Path::new("receipt")).is_err());
    }

    #[test]
    fn test_flow_errors_are_not_printed_twice() {
        let flow = anyhow::Error::new(TrashCashError::Network("GET /api/rewards failed".into()));
        assert!(already_reported(&flow));

        let plumbing = anyhow::anyhow!("Failed to read receipt.jpg");
        assert!(!already_reported(&plumbing));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Eco bag", 10), "Eco bag");
        assert_eq!(truncate("Экопункт Невский", 5), "Экоп…");
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit("20"), Ok(20));
        assert!(parse_limit("0").is_err());
        assert!(parse_limit("9999").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["trashcash", "--no-cache", "buy", "3", "--yes"]);
        assert!(cli.no_cache);
        assert!(matches!(cli.command, Commands::Buy { reward_id: 3, yes: true }));

        let cli = Cli::parse_from(["trashcash", "points", "--lat", "-33.9", "--lng", "18.4"]);
        assert!(matches!(cli.command, Commands::Points { lat: Some(_), lng: Some(_) }));

        assert!(Cli::try_parse_from(["trashcash", "points", "--lat", "1.0"]).is_err());
    }
}
