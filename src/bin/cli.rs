//! SAGA Monitor CLI
//!
//! Polls the listing page and pushes new offers to Telegram.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use saga_monitor::{
    error::{AppError, Result},
    models::{Config, Offer},
    pipeline::{Monitor, Recipients, Scheduler},
    services::{
        DetailExtractor, MessageFormatter, SubscribeAck, SubscriberCommand, SubscriberHandle,
        SubscriberRegistry, TelegramMessenger,
    },
    storage::{LocalStorage, StateStore},
    utils::{extract_offer_id, http},
};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

/// SAGA Monitor - new flat offers straight to Telegram
#[derive(Parser, Debug)]
#[command(
    name = "saga-monitor",
    version,
    about = "Watches the SAGA Hamburg listing for new offers"
)]

struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the listing until interrupted
    Run,

    /// Run a single cycle and exit
    Once,

    /// Render the notification for one detail page without sending it
    Preview {
        /// Detail page URL
        url: String,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn bot_from_env() -> Result<Bot> {
    let token = std::env::var("TELEGRAM_TOKEN")
        .map_err(|_| AppError::config("TELEGRAM_TOKEN is not set"))?;
    Ok(Bot::new(token))
}

/// Load persisted state and assemble the monitor.
async fn start_monitor(config: &Config, bot: Bot) -> Result<(Monitor, Option<SubscriberHandle>)> {
    let client: Arc<dyn http::PageFetcher> = Arc::new(http::create_client(&config.crawler)?);
    let store: Arc<dyn StateStore> = Arc::new(LocalStorage::from_config(&config.storage));

    let (recipients, handle) = match &config.telegram.chat_id {
        Some(chat_id) => {
            log::info!("Single-recipient mode, sending to {chat_id}");
            (Recipients::Fixed(chat_id.clone()), None)
        }
        None => {
            let handle = SubscriberRegistry::spawn(Arc::clone(&store)).await?;
            (Recipients::Subscribers(handle.clone()), Some(handle))
        }
    };

    let messenger = Arc::new(TelegramMessenger::new(bot));
    let monitor = Monitor::start(config, client, messenger, store, recipients).await?;
    Ok((monitor, handle))
}

/// Answer `/start` and `/subscribe` by registering the chat.
async fn listen_for_subscribers(bot: Bot, handle: SubscriberHandle) {
    log::info!("Accepting /start and /subscribe");

    teloxide::commands_repl(
        bot,
        move |bot: Bot, msg: Message, _command: SubscriberCommand| {
            let handle = handle.clone();
            async move {
                let reply = match handle.subscribe(msg.chat.id.0.to_string()).await {
                    Ok(SubscribeAck::Added) => "Subscribed. New SAGA offers will be posted here.",
                    Ok(SubscribeAck::AlreadySubscribed) => "You are already subscribed.",
                    Err(e) => {
                        log::error!("Subscribe failed for chat {}: {}", msg.chat.id, e);
                        "Subscription failed, please try again later."
                    }
                };
                bot.send_message(msg.chat.id, reply).await?;
                respond(())
            }
        },
        SubscriberCommand::ty(),
    )
    .await;
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("SAGA Monitor starting...");

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env_overrides()?;

    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run => {
            config.validate()?;
            let bot = bot_from_env()?;
            let (monitor, handle) = start_monitor(&config, bot.clone()).await?;

            if let Some(handle) = handle {
                if config.telegram.accept_subscriptions {
                    tokio::spawn(listen_for_subscribers(bot, handle));
                }
            }

            let scheduler =
                Scheduler::new(monitor, Duration::from_secs(config.scheduler.interval_secs));
            scheduler
                .run_until(async {
                    let _ = tokio::signal::ctrl_c().await;
                    log::info!("Interrupted, shutting down");
                })
                .await;
        }

        Command::Once => {
            config.validate()?;
            let bot = bot_from_env()?;
            let (mut monitor, _) = start_monitor(&config, bot).await?;
            let report = monitor.run_cycle().await?;
            log::info!(
                "{} listed, {} new, {} sent, {} skipped",
                report.listed,
                report.new_offers,
                report.deliveries,
                report.skipped
            );
        }

        Command::Preview { url } => {
            let client = Arc::new(http::create_client(&config.crawler)?);
            let extractor = DetailExtractor::new(client)?;

            let id = extract_offer_id(&url).unwrap_or_else(|| "preview".to_string());
            let offer = Offer::new(id, url, config.site.default_title.clone());
            let details = extractor.extract(&offer).await?;
            for (label, value) in details.iter() {
                log::debug!("{label}: {value}");
            }

            let message = MessageFormatter::from_config(&config).render(&offer, &details);
            println!("{}", message.text());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Listing: {}", config.site.listing_url);
            log::info!("✓ Interval: {} s", config.scheduler.interval_secs);
            log::info!("✓ Data dir: {}", config.storage.data_dir.display());
            match &config.telegram.chat_id {
                Some(chat_id) => log::info!("✓ Single recipient: {chat_id}"),
                None => log::info!("✓ Subscriber mode"),
            }

            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
