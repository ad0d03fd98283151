//! larder — recipe gateway CLI
//!
//! Runs single gateway operations against the configured provider, sharing
//! the durable cache and quota table with other runs, and prints JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use larder::config::{Config, Secrets};
use larder::providers::MealDbClient;
use larder::store::FileStore;
use larder::{Larder, RecipeGateway, RecipeService, UserProfile};

/// Recipe gateway CLI
#[derive(Parser)]
#[command(name = "larder")]
#[command(version = larder::PKG_VERSION)]
#[command(about = "Cached, quota-aware recipe API client")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Query the keyed provider only (no fallback sources).
    #[arg(long)]
    no_fallback: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search recipes by free text
    Search {
        query: String,
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Random recipes
    Random {
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },

    /// Full details for one recipe
    Details { id: String },

    /// Recipes matching a dietary profile
    Personalized {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Per-key quota and cache counters
    Quota,
}

#[derive(clap::Args)]
struct ProfileArgs {
    /// User id (scopes cached results)
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    diet: Option<String>,
    /// Comma-separated intolerances
    #[arg(long, value_delimiter = ',')]
    intolerances: Vec<String>,
    /// Comma-separated cuisines
    #[arg(long, value_delimiter = ',')]
    cuisines: Vec<String>,
    /// Comma-separated ingredients to exclude
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
    /// Maximum preparation time in minutes
    #[arg(long)]
    max_ready_time: Option<u32>,
}

impl ProfileArgs {
    fn into_profile(self) -> UserProfile {
        UserProfile {
            user_id: self.user,
            diet: self.diet,
            intolerances: self.intolerances,
            cuisines: self.cuisines,
            exclude_ingredients: self.exclude,
            max_ready_time: self.max_ready_time,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    let gateway = Arc::new(build_gateway(&config, &secrets)?);
    info!(version = larder::version_string(), "larder starting");

    let mut service = RecipeService::new(gateway.clone());
    if args.no_fallback {
        service = service.with_samples(false);
    } else {
        service = service.with_samples(config.fallback.samples);
        if config.fallback.mealdb {
            let client = match &config.fallback.mealdb_base_url {
                Some(url) => MealDbClient::with_base_url(url)?,
                None => MealDbClient::new()?,
            };
            service = service.with_fallback(Arc::new(client));
        }
    }

    match args.command {
        Command::Search { query, profile } => {
            let profile = profile.into_profile();
            let result = service.search(&query, Some(&profile)).await?;
            print_json(&result)?;
        }
        Command::Random { count } => {
            let result = service.get_random(count).await?;
            print_json(&result)?;
        }
        Command::Details { id } => {
            let result = service.get_details(&id).await?;
            print_json(&result)?;
        }
        Command::Personalized { profile } => {
            let profile = profile.into_profile();
            let result = service.get_personalized_results(&profile).await?;
            print_json(&result)?;
        }
        Command::Quota => {
            print_json(&service.quota_status())?;
        }
    }

    gateway.close();
    Ok(())
}

/// Build a [`RecipeGateway`] from configuration.
fn build_gateway(config: &Config, secrets: &Secrets) -> larder::Result<RecipeGateway> {
    let keys = secrets.api_keys();
    if keys.is_empty() {
        return Err(larder::LarderError::Configuration(format!(
            "No API keys found. Add [spoonacular] api_keys to ~/.larder/secrets.toml or set {}",
            larder::config::API_KEYS_ENV_VAR
        )));
    }

    let store = FileStore::open(config.store_dir())?;

    let mut builder = Larder::builder()
        .spoonacular_keys(keys)
        .daily_limit(config.quota.daily_limit)
        .cache_config(config.cache_config())
        .cache_ttls(config.cache_ttls())
        .store(Arc::new(store));

    if let Some(url) = &config.spoonacular.base_url {
        builder = builder.base_url(url);
    }
    if let Some(secs) = config.spoonacular.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
