//! # ShopWatch — product listing monitor
//!
//! Watches product listings for user-chosen conditions (back in stock, size
//! available, delivery available, price drop) and sends a one-shot alert
//! over email and optionally WhatsApp when any condition is met.
//!
//! Usage:
//!   shopwatch init                        # write a default config file
//!   shopwatch add --url URL --email ADDR --stock --price 1500
//!   shopwatch run                         # start workers for all active monitors
//!   shopwatch list
//!   shopwatch stop <id>
//!   shopwatch history [<id>]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shopwatch_channels::{SmtpMailer, WhatsAppGateway};
use shopwatch_core::ShopWatchConfig;
use shopwatch_core::traits::EntityStore;
use shopwatch_core::types::{Conditions, Lifecycle, Monitor, Recipient};
use shopwatch_engine::{Dispatcher, EngineCtx, Supervisor};
use shopwatch_fetch::HttpFetcher;
use shopwatch_store::SqliteStore;

#[derive(Parser)]
#[command(name = "shopwatch", version, about = "🛍️ ShopWatch — product listing monitor")]
struct Cli {
    /// Path to config file (default: ~/.shopwatch/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the monitoring engine for all active monitors
    Run,
    /// Add a new monitor (at least one condition required)
    Add {
        /// Product listing URL
        #[arg(long)]
        url: String,
        /// Email address for alerts
        #[arg(long)]
        email: Option<String>,
        /// Phone number for WhatsApp alerts
        #[arg(long)]
        phone: Option<String>,
        /// Also send alerts via WhatsApp (requires --phone)
        #[arg(long)]
        whatsapp: bool,
        /// Notify when back in stock
        #[arg(long)]
        stock: bool,
        /// Notify when this size becomes available
        #[arg(long)]
        size: Option<String>,
        /// Notify when delivery looks available
        #[arg(long)]
        delivery: bool,
        /// Notify when price drops to or below this value
        #[arg(long)]
        price: Option<f64>,
        /// Skip the monitoring-started confirmation message
        #[arg(long)]
        no_confirm: bool,
    },
    /// List all monitors
    List,
    /// Stop a monitor (its worker exits on the next check)
    Stop { id: String },
    /// Delete a monitor
    Remove { id: String },
    /// Show the notification audit trail
    History { id: Option<String> },
    /// Write a default config file to edit
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "shopwatch=debug"
    } else {
        "shopwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => ShopWatchConfig::load_from(Path::new(&shellexpand::tilde(path).to_string()))
            .context("load config")?,
        None => ShopWatchConfig::load().context("load config")?,
    };

    match cli.command {
        Command::Init => init_config(),
        command => {
            let db_path = shellexpand::tilde(&config.db_path).to_string();
            let store = Arc::new(SqliteStore::open(Path::new(&db_path)).context("open database")?);
            dispatch_command(command, config, store).await
        }
    }
}

async fn dispatch_command(
    command: Command,
    config: ShopWatchConfig,
    store: Arc<SqliteStore>,
) -> Result<()> {
    match command {
        Command::Run => run_engine(config, store).await,
        Command::Add {
            url,
            email,
            phone,
            whatsapp,
            stock,
            size,
            delivery,
            price,
            no_confirm,
        } => {
            let conditions = Conditions {
                stock,
                size,
                delivery,
                price,
            };
            add_monitor(
                config, store, url, email, phone, whatsapp, conditions, no_confirm,
            )
            .await
        }
        Command::List => list_monitors(store).await,
        Command::Stop { id } => {
            store
                .transition(&id, Lifecycle::Stopped)
                .await
                .context("stop monitor")?;
            println!("Stopped monitor {id}");
            Ok(())
        }
        Command::Remove { id } => {
            if store.delete_monitor(&id).await.context("delete monitor")? {
                println!("Removed monitor {id}");
            } else {
                println!("No monitor with id {id}");
            }
            Ok(())
        }
        Command::History { id } => show_history(store, id.as_deref()).await,
        Command::Init => unreachable!("handled before store setup"),
    }
}

fn init_config() -> Result<()> {
    let path = ShopWatchConfig::default_path();
    if path.exists() {
        bail!("config already exists at {}", path.display());
    }
    ShopWatchConfig::default().save().context("write config")?;
    println!("Wrote default config to {}", path.display());
    println!("Fill in [smtp] and [whatsapp] credentials to enable notifications.");
    Ok(())
}

fn build_ctx(config: &ShopWatchConfig, store: Arc<SqliteStore>) -> Result<Arc<EngineCtx>> {
    let fetcher = HttpFetcher::new(config.engine.fetch_timeout()).context("build fetcher")?;
    let dispatcher = Dispatcher::new(
        Arc::new(SmtpMailer::new(config.smtp.clone())),
        Arc::new(WhatsAppGateway::new(config.whatsapp.clone())),
    );
    Ok(Arc::new(EngineCtx {
        store,
        fetcher: Arc::new(fetcher),
        dispatcher,
        timing: config.engine.clone(),
    }))
}

async fn run_engine(config: ShopWatchConfig, store: Arc<SqliteStore>) -> Result<()> {
    let reconcile_interval = config.engine.reconcile_interval();
    let ctx = build_ctx(&config, store)?;
    let supervisor = Supervisor::new(ctx);
    supervisor.start_all().await.context("start workers")?;

    tracing::info!("engine running, press ctrl-c to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(reconcile_interval) => {
                if let Err(e) = supervisor.reconcile().await {
                    tracing::warn!("reconcile failed: {e}");
                }
            }
        }
    }

    tracing::info!("shutting down...");
    supervisor.shutdown().await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn add_monitor(
    config: ShopWatchConfig,
    store: Arc<SqliteStore>,
    url: String,
    email: Option<String>,
    phone: Option<String>,
    whatsapp: bool,
    conditions: Conditions,
    no_confirm: bool,
) -> Result<()> {
    if !conditions.any_enabled() {
        bail!("enable at least one condition: --stock, --size, --delivery or --price");
    }
    if email.is_none() && phone.is_none() {
        bail!("provide --email and/or --phone so alerts can reach you");
    }
    if whatsapp && phone.is_none() {
        bail!("--whatsapp requires --phone");
    }

    let recipient = Recipient::new(email, phone, whatsapp);
    store
        .create_recipient(&recipient)
        .await
        .context("create recipient")?;

    let monitor = Monitor::new(&recipient.id, &url, conditions.clone());
    store.create_monitor(&monitor).await.context("create monitor")?;
    println!("Monitoring {} ({})", monitor.url, monitor.id);
    println!("Watching for: {}", conditions.summary());

    if !no_confirm {
        let dispatcher = Dispatcher::new(
            Arc::new(SmtpMailer::new(config.smtp.clone())),
            Arc::new(WhatsAppGateway::new(config.whatsapp.clone())),
        );
        let report = dispatcher
            .send_confirmation(&recipient, monitor.display_name(), &conditions)
            .await;
        if report.delivered_any() {
            println!("Confirmation sent.");
        } else {
            println!("Confirmation could not be delivered (check channel credentials).");
        }
    }

    println!("Run `shopwatch run` to start monitoring.");
    Ok(())
}

async fn list_monitors(store: Arc<SqliteStore>) -> Result<()> {
    let monitors = store.list_monitors().await.context("list monitors")?;
    if monitors.is_empty() {
        println!("No monitors yet. Add one with `shopwatch add`.");
        return Ok(());
    }
    for m in monitors {
        let checked = m
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".into());
        println!(
            "{}  [{}]  {}\n    conditions: {}\n    last check: {} — {}",
            m.id,
            m.state.as_str(),
            m.display_name(),
            m.conditions.summary(),
            checked,
            m.last_status.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn show_history(store: Arc<SqliteStore>, id: Option<&str>) -> Result<()> {
    let records = store.notifications_for(id).await.context("load history")?;
    if records.is_empty() {
        println!("No notifications recorded.");
        return Ok(());
    }
    for r in records {
        println!(
            "{}  {}  {:<9}  {}",
            r.sent_at.format("%Y-%m-%d %H:%M UTC"),
            r.monitor_id,
            r.channel.as_str(),
            match r.outcome {
                shopwatch_core::types::DeliveryOutcome::Delivered => "delivered",
                shopwatch_core::types::DeliveryOutcome::Failed => "FAILED",
            },
        );
    }
    Ok(())
}
