mod app;
mod config;

use crate::config::{ProfileHubConfig, Secrets};
use clap::{Parser, Subcommand};
use profilehub_gateway::GatewayServer;
use profilehub_search::extract_facets;
use profilehub_security::{AccessControl, RateLimiter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// How often idle rate-limit buckets are swept.
const RATE_LIMIT_SWEEP: Duration = Duration::from_secs(60);
const RATE_LIMIT_IDLE: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(name = "profilehub", about = "ProfileHub: HR profile catalog and search")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "profilehub.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one natural-language search and print the result as JSON
    Search {
        /// The query, e.g. "금융권 경험이 있는 프론트엔드개발자"
        query: String,
    },
    /// Print the facets extracted from a query
    Facets {
        query: String,
    },
    /// Load profiles from a JSON file into the configured store
    Seed {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "Loaded environment from .env");
    }

    let cli = Cli::parse();

    if let Commands::Facets { query } = &cli.command {
        println!("{}", serde_json::to_string_pretty(&extract_facets(query))?);
        return Ok(());
    }

    let config = ProfileHubConfig::load(&cli.config).await?;
    let secrets = Secrets::from_env();

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            info!("Starting ProfileHub gateway on {}:{}", host, port);

            let store = app::build_store(&config, &secrets).await?;
            let provider = app::build_embedding(&config, &secrets)?;
            let state = app::build_state(&config, &secrets, store, provider)?;

            let rate_limiter = Arc::new(RateLimiter::new(config.security.rate_limits()));
            let access = AccessControl::new(config.security.api_keys.clone());
            if access.is_enabled() {
                info!(keys = config.security.api_keys.len(), "API key auth enabled");
            } else {
                info!("No API keys configured, every caller is treated as admin");
            }

            let sweeper = rate_limiter.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP);
                loop {
                    interval.tick().await;
                    let dropped = sweeper.sweep(RATE_LIMIT_IDLE).await;
                    if dropped > 0 {
                        debug!(dropped, "Swept idle rate-limit buckets");
                    }
                }
            });

            let app = GatewayServer::build_with_middleware(state, access, Some(rate_limiter));

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("ProfileHub gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Search { query } => {
            let store = app::build_store(&config, &secrets).await?;
            let provider = app::build_embedding(&config, &secrets)?;
            let search = app::build_natural_search(&config, store, provider);
            let outcome = search.search(&query).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Seed { file } => {
            let store = app::build_store(&config, &secrets).await?;
            let report = app::seed(store.as_ref(), &file).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Facets { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::DatastoreKind;
    use profilehub_core::PositionRole;
    use profilehub_store::ProfileStore;

    fn file_config(dir: &std::path::Path) -> ProfileHubConfig {
        let mut config = ProfileHubConfig::default();
        config.datastore.kind = DatastoreKind::File;
        config.datastore.path = dir.join("profiles.json");
        config
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["profilehub", "search", "금융 디자이너"]).unwrap();
        assert!(matches!(cli.command, Commands::Search { ref query } if query == "금융 디자이너"));
        assert_eq!(cli.config, PathBuf::from("profilehub.toml"));

        let cli =
            Cli::try_parse_from(["profilehub", "-c", "x.toml", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(8080), .. }));
    }

    #[tokio::test]
    async fn test_postgrest_without_credentials_fails() {
        let mut config = ProfileHubConfig::default();
        config.datastore.kind = DatastoreKind::Postgrest;
        config.datastore.url = Some("http://127.0.0.1:1".into());
        assert!(app::build_store(&config, &Secrets::default()).await.is_err());

        config.datastore.url = None;
        let secrets = Secrets {
            service_role_key: Some("k".into()),
            ..Default::default()
        };
        assert!(app::build_store(&config, &secrets).await.is_err());
    }

    #[tokio::test]
    async fn test_no_openai_key_means_no_provider() {
        let config = ProfileHubConfig::default();
        assert!(app::build_embedding(&config, &Secrets::default())
            .unwrap()
            .is_none());
        let secrets = Secrets {
            openai_api_key: Some("sk".into()),
            ..Default::default()
        };
        assert!(app::build_embedding(&config, &secrets).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_seed_then_search_through_file_store() {
        let tmp = tempfile::tempdir().unwrap();
        let config = file_config(tmp.path());
        let seed_path = tmp.path().join("seed.json");
        std::fs::write(
            &seed_path,
            serde_json::json!([
                {
                    "name": "박지민",
                    "email": "jimin@example.com",
                    "position_role": "프론트엔드개발자",
                    "industry_experience": ["금융"],
                    "employment_history": ["A은행"],
                    "capabilities": {
                        "markup_precision": 80, "js_ts_logic": 90,
                        "framework_proficiency": 85, "ui_ux_design": 70,
                        "web_optimization": 75, "accessibility": 60
                    }
                },
                {
                    "name": "최수진",
                    "email": "sujin@example.com",
                    "position_role": "디자이너",
                    "industry_experience": ["제조"]
                }
            ])
            .to_string(),
        )
        .unwrap();

        let store = app::build_store(&config, &Secrets::default()).await.unwrap();
        let report = app::seed(store.as_ref(), &seed_path).await.unwrap();
        assert_eq!(report, app::SeedReport { inserted: 2, skipped: 0 });

        // Seeding again skips existing emails.
        let report = app::seed(store.as_ref(), &seed_path).await.unwrap();
        assert_eq!(report, app::SeedReport { inserted: 0, skipped: 2 });

        // A fresh store reads the persisted snapshot.
        let reopened = app::build_store(&config, &Secrets::default()).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        let jimin = reopened
            .find_by_email("jimin@example.com")
            .await
            .unwrap()
            .unwrap();
        let detail = reopened.detail(jimin.id).await.unwrap().unwrap();
        assert_eq!(detail.employment_history.len(), 1);
        assert_eq!(detail.capabilities.unwrap().logic_scripting, 90);

        let search = app::build_natural_search(&config, reopened, None);
        let outcome = search.search("금융 프론트엔드").await.unwrap();
        assert!(outcome.used_keyword_fallback);
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.results[0].position_role, Some(PositionRole::FrontendDeveloper));
    }
}
