use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deck_meta::api::state::AppState;
use deck_meta::cache::{CacheManager, DurableStore};
use deck_meta::calculate::Analyzer;
use deck_meta::config::AppConfig;
use deck_meta::fetch::{DecklistProvider, EventIdProvider, HttpProvider, HttpProviderConfig, LocalProvider};
use deck_meta::models::{ArchetypeKey, Category};
use deck_meta::storage::{JsonEntryStore, StorageConfig};
use deck_meta::sync::{EventTracker, IncrementalUpdater, UpdateResult};

#[derive(Parser)]
#[command(name = "deck-meta")]
#[command(about = "Card usage and power index tracker for competitive deck archetypes")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Also run incremental updates in the background
        #[arg(long)]
        watch: bool,
    },

    /// Run incremental updates for cached archetypes
    Update {
        /// Run one update and exit
        #[arg(long)]
        once: bool,

        /// Run continuously at interval
        #[arg(long)]
        watch: bool,

        /// Update interval (e.g., "6h", "30m"); defaults to the config value
        #[arg(long)]
        interval: Option<String>,
    },

    /// Analyze one archetype and print the result
    Analyze {
        archetype: String,
        format: String,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark one archetype stale
    Invalidate {
        archetype: String,
        format: String,

        /// Also drop the raw sample so the next read collects again
        #[arg(long)]
        drop_raw: bool,
    },

    /// Analyze an archetype and index its decks for incremental updates
    Track { archetype: String, format: String },

    /// List cached archetypes ranked by power index
    Rank {
        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show cache and tracker statistics
    Stats,
}

struct Source {
    decklists: Arc<dyn DecklistProvider>,
    events: Arc<dyn EventIdProvider>,
}

fn build_source(config: &AppConfig, storage: &StorageConfig) -> Result<Source> {
    if config.source.base_url.is_some() {
        let provider = Arc::new(HttpProvider::new(HttpProviderConfig::from_source(&config.source)?)?);
        tracing::info!("Using HTTP source {:?}", config.source.base_url);
        Ok(Source {
            decklists: provider.clone(),
            events: provider,
        })
    } else {
        let provider = Arc::new(LocalProvider::new(storage.samples_dir()));
        tracing::info!("Using local samples in {:?}", storage.samples_dir());
        Ok(Source {
            decklists: provider.clone(),
            events: provider,
        })
    }
}

fn build_updater(config: &AppConfig) -> Result<Arc<IncrementalUpdater>> {
    let storage = StorageConfig::new(config.data_dir.clone());
    let source = build_source(config, &storage)?;

    let analyzer = Analyzer::new(&config.analysis)?;
    let store: Arc<dyn DurableStore> = Arc::new(JsonEntryStore::new(storage.cache_dir()));
    let cache = Arc::new(CacheManager::from_config(
        source.decklists,
        store,
        analyzer,
        &config.cache,
    ));
    let tracker = EventTracker::load(storage).context("failed to load tracker state")?;

    Ok(Arc::new(IncrementalUpdater::new(source.events, cache, tracker)))
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let path = PathBuf::from(&cli.config);
    let mut config = if path.exists() {
        AppConfig::from_file(&path).with_context(|| format!("failed to load {:?}", path))?
    } else {
        AppConfig::default()
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn print_update(result: &UpdateResult) {
    println!("\n=== Update Results ===");
    println!("New events:       {}", result.new_events.len());
    println!("Affected:         {}", result.affected_archetypes.len());
    println!("Unresolved:       {}", result.unresolved_events);
    println!("Refreshed:        {}", result.refreshed.len());
    println!("Duration:         {}ms", result.duration_ms);
    if !result.failed.is_empty() {
        println!("\nFailed:");
        for failure in &result.failed {
            println!("  - {}: {}", failure.key, failure.error);
        }
    }
    if !result.errors.is_empty() {
        println!("\nErrors:");
        for err in &result.errors {
            println!("  - {}", err);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting deck-meta v{}", env!("CARGO_PKG_VERSION"));

    let updater = build_updater(&config)?;
    let cache = updater.cache().clone();

    match cli.command {
        Commands::Serve { host, port, watch } => {
            if watch {
                let every = deck_meta::parse_duration(&config.tracking.update_interval)
                    .context("invalid update interval")?;
                tokio::spawn(updater.clone().run_periodic(every));
            }

            let app = deck_meta::api::build_router_with_origin(
                AppState::new(updater),
                &config.server.cors_origin,
            );
            let addr = format!(
                "{}:{}",
                host.unwrap_or(config.server.host),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Update {
            once,
            watch,
            interval,
        } => {
            if once {
                tracing::info!("Running one-time update...");
                match updater.update_once().await {
                    Ok(result) => print_update(&result),
                    Err(e) => tracing::error!("Update failed: {}", e),
                }
            } else if watch {
                let interval = interval.unwrap_or(config.tracking.update_interval);
                let every = deck_meta::parse_duration(&interval)
                    .with_context(|| format!("invalid interval: {}", interval))?;
                tracing::info!("Running periodic updates (interval: {})...", interval);
                updater.run_periodic(every).await;
            } else {
                eprintln!("Specify --once or --watch");
            }
        }
        Commands::Analyze {
            archetype,
            format,
            json,
        } => {
            let key = ArchetypeKey::new(archetype, format);
            let served = cache.get_or_stale(&key).await?;
            let analysis = &served.analysis;

            if json {
                println!("{}", serde_json::to_string_pretty(&served)?);
                return Ok(());
            }

            println!("\n=== {} ===", key);
            if served.stale {
                println!("(stale: source unavailable)");
            }
            println!("Decks:            {}", analysis.snapshot.total_decks);
            println!(
                "Record:           {}-{}-{}",
                analysis.performance.wins, analysis.performance.losses, analysis.performance.ties
            );
            println!("Power index:      {:.2}", analysis.power_index);
            println!("Energy:           {}", analysis.most_common_energy.join(", "));
            println!("Variants:         {}", analysis.variants.len());

            for category in [Category::Core, Category::Standard, Category::Tech] {
                let rows = analysis.snapshot.in_category(category);
                if rows.is_empty() {
                    continue;
                }
                println!("\n{:?}:", category);
                for row in rows {
                    println!(
                        "  {:>3}%  {} ({} {})",
                        row.pct_total, row.card.name, row.card.set_code, row.card.collector_number
                    );
                }
            }
        }
        Commands::Invalidate {
            archetype,
            format,
            drop_raw,
        } => {
            let key = ArchetypeKey::new(archetype, format);
            let found = if drop_raw {
                cache.invalidate_and_drop_raw(&key).await
            } else {
                cache.invalidate(&key).await
            };
            if found {
                println!("Invalidated {}", key);
            } else {
                println!("{} is not cached", key);
            }
        }
        Commands::Track { archetype, format } => {
            let key = ArchetypeKey::new(archetype, format);
            let analysis = updater.track_archetype(&key).await?;
            println!(
                "Tracking {} ({} decks, power index {:.2})",
                key, analysis.snapshot.total_decks, analysis.power_index
            );
        }
        Commands::Rank { json } => {
            let ranking = cache.ranking().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&ranking)?);
                return Ok(());
            }
            if ranking.is_empty() {
                println!("No analyzed archetypes cached");
                return Ok(());
            }

            println!(
                "{:>4}  {:<36} {:<6} {:>11} {:>6}",
                "#", "Archetype", "Format", "W-L-T", "Index"
            );
            for row in &ranking {
                let record = format!("{}-{}-{}", row.wins, row.losses, row.ties);
                println!(
                    "{:>4}  {:<36} {:<6} {:>11} {:>6.2}{}",
                    row.rank,
                    row.name,
                    row.key.format.as_str(),
                    record,
                    row.power_index,
                    if row.stale { "  (stale)" } else { "" }
                );
            }
        }
        Commands::Stats => {
            let stats = cache.stats().await;
            println!("\n=== Cache ===");
            println!("Session entries:  {}", stats.session_entries);
            println!("Process entries:  {}", stats.process_entries);
            match stats.durable_entries {
                Some(n) => println!("Durable entries:  {}", n),
                None => println!("Durable entries:  unavailable"),
            }
            for (state, count) in &stats.by_state {
                println!("  {:<14}  {}", state.to_string(), count);
            }
            println!("\n=== Tracker ===");
            println!("Known events:     {}", updater.known_event_count().await);
        }
    }

    Ok(())
}
