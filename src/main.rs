//! idealab-router - AI task routing and credit metering
//!
//! Serves the routing API and offers offline helpers for inspecting
//! routes and credit charges.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use idealab_router::config::KeySource;
use idealab_router::credits::{self, CostInput};
use idealab_router::router::build_http_client;
use idealab_router::server::{run_server, AppState};
use idealab_router::storage::{self, SqliteUsageSink};
use idealab_router::usage::{FanoutUsageSink, TracingUsageSink, UsageSink};
use idealab_router::{Config, Router, TaskCategory, Tier};

#[derive(Parser)]
#[command(name = "idealab-router")]
#[command(about = "AI task routing and credit metering for IdeaLab")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file (environment only when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,

        /// Answer locally instead of calling providers
        #[arg(long)]
        mock: bool,
    },

    /// Validate configuration and show where each API key came from
    Check {
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show the route selected for a task and tier
    Route {
        #[arg(short, long)]
        config: Option<String>,

        #[arg(long)]
        task: String,

        #[arg(long)]
        tier: String,
    },

    /// Compute the credit charge for a call
    Cost {
        #[arg(long)]
        provider: String,

        #[arg(long)]
        model: String,

        #[arg(long, default_value_t = 0)]
        input: u64,

        #[arg(long, default_value_t = 0)]
        output: u64,

        #[arg(long, default_value_t = 0)]
        thinking: u64,

        #[arg(long)]
        web_search: bool,

        #[arg(long)]
        extended_thinking: bool,
    },
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn default_filter(level: &str) -> String {
    format!("idealab_router={},tower_http={}", level, level)
}

/// Install the subscriber before anything can log.
///
/// Returns a handle for switching to the configured level later, or `None`
/// when `RUST_LOG` is set and takes precedence.
fn init_tracing(level: &str) -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let env_override = from_env.is_some();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(default_filter(level))));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    (!env_override).then_some(handle)
}

fn apply_log_level(handle: Option<&FilterHandle>, level: &str) {
    let Some(handle) = handle else {
        return;
    };
    if let Err(e) = handle.reload(EnvFilter::new(default_filter(level))) {
        tracing::warn!(error = %e, level = %level, "Failed to apply configured log level");
    }
}

fn load_config(path: Option<&str>) -> anyhow::Result<(Config, Vec<(String, KeySource)>)> {
    let loaded = match path {
        Some(path) => Config::from_file_with_env(path)?,
        None => Config::from_env()?,
    };
    Ok(loaded)
}

/// Usage sinks for the server: always a log event, plus SQLite when enabled.
async fn usage_sinks(config: &Config) -> (Arc<dyn UsageSink>, Option<SqlitePool>) {
    let log_sink: Arc<dyn UsageSink> = Arc::new(TracingUsageSink);

    if !config.logging.log_usage {
        return (log_sink, None);
    }

    let db = config.database();
    match storage::init_pool(&db.path).await {
        Ok(pool) => {
            tracing::info!(path = %db.path, "Usage database ready");
            let db_sink: Arc<dyn UsageSink> = Arc::new(SqliteUsageSink::new(pool.clone()));
            (
                Arc::new(FanoutUsageSink::new(vec![log_sink, db_sink])),
                Some(pool),
            )
        }
        Err(e) => {
            tracing::warn!(
                path = %db.path,
                error = %e,
                "Failed to open usage database, usage will only be logged"
            );
            (log_sink, None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            listen,
            mock,
        } => {
            let filter = init_tracing("info");
            let (mut config, key_sources) = load_config(config.as_deref())?;
            apply_log_level(filter.as_ref(), &config.logging.level);

            for (provider, source) in &key_sources {
                tracing::info!(provider = %provider, source = %source, "Resolved API key");
            }

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }
            if mock {
                config.routing.mock_responses = true;
            }

            let http = build_http_client(&config)?;
            let router = Router::from_config(&config, http);

            let (usage, read_db) = usage_sinks(&config).await;

            let state = AppState {
                router: Arc::new(router),
                usage,
                config: Arc::new(config),
                read_db,
            };

            run_server(state).await
        }

        Commands::Check { config } => {
            let _ = init_tracing("warn");
            let (config, key_sources) = load_config(config.as_deref())?;

            println!("Configuration is valid.");
            println!("  listen: {}", config.server.listen);
            println!(
                "  missing credential policy: {:?}",
                config.routing.missing_credential_policy
            );
            for (provider, source) in &key_sources {
                println!("  {} key: {}", provider, source);
            }
            if config.routing.mock_responses {
                println!("  mock responses: on");
            }
            Ok(())
        }

        Commands::Route { config, task, tier } => {
            let _ = init_tracing("warn");
            let (config, _) = load_config(config.as_deref())?;
            let http = build_http_client(&config)?;
            let router = Router::from_config(&config, http);

            let task = TaskCategory::resolve(&task)?;
            let tier = Tier::resolve(&tier)?;
            let route = router.select_route(task, tier)?;

            println!("{}", serde_json::to_string_pretty(&route)?);
            Ok(())
        }

        Commands::Cost {
            provider,
            model,
            input,
            output,
            thinking,
            web_search,
            extended_thinking,
        } => {
            let _ = init_tracing("warn");
            let cost_input = CostInput {
                provider,
                model,
                input_tokens: input,
                output_tokens: output,
                thinking_tokens: thinking,
                web_search,
                extended_thinking,
            };

            if credits::rate_card(&cost_input.provider, &cost_input.model).is_none() {
                eprintln!(
                    "warning: no rate card for {}/{}, only the minimum charge applies",
                    cost_input.provider, cost_input.model
                );
            }

            println!("{}", credits::credit_cost(&cost_input));
            Ok(())
        }
    }
}
