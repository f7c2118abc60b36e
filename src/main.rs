//! Tracker BFF - Main Server
//!
//! Serves the enrichment API, or runs one enrichment pass from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracker_bff::api::issue_handlers::IssueListQuery;
use tracker_bff::tracker::models::IssueListOptions;
use tracker_bff::{AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tracker-bff")]
#[command(about = "Issue tracker backend-for-frontend")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the activity feed for the caller's assigned issues
    Feed {
        /// Number of issues to include (overrides config)
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Print issues with their project names and children
    Issues {
        /// Comma-separated label names
        #[arg(long)]
        labels: Option<String>,

        #[arg(long)]
        search: Option<String>,

        /// Comma-separated issue numbers
        #[arg(long)]
        issue_ids: Option<String>,

        #[arg(long)]
        state: Option<String>,
    },

    /// Make one issue the child of another
    Link {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        parent: i64,
        #[arg(long)]
        child: i64,
    },

    /// Detach an issue from its parent
    Unlink {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        child: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tracker_bff=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            tracker_bff::start_server(config).await
        }
        Commands::Feed { limit } => {
            if let Some(limit) = limit {
                config.dashboard_issue_limit = limit;
            }
            run_feed(AppState::new(config)?).await
        }
        Commands::Issues {
            labels,
            search,
            issue_ids,
            state,
        } => {
            let query = IssueListQuery {
                labels,
                search,
                issue_ids,
                state,
                ..Default::default()
            };
            let opts = query
                .into_options()
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            run_issues(AppState::new(config)?, opts).await
        }
        Commands::Link {
            project,
            parent,
            child,
        } => {
            let state = AppState::new(config)?;
            state.linker().link_child(parent, child, project).await?;
            tracing::info!("Linked #{} under #{} in project {}", child, parent, project);
            Ok(())
        }
        Commands::Unlink { project, child } => {
            let state = AppState::new(config)?;
            state.linker().unlink_child(child, project).await?;
            tracing::info!("Unlinked #{} in project {}", child, project);
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_feed(state: AppState) -> Result<()> {
    let opts = IssueListOptions::assigned_to_me(state.config.dashboard_issue_limit);
    let issues = state.tracker.list_issues(&opts).await?;
    tracing::info!("Aggregating activity for {} issues", issues.len());

    let feed = state.aggregator().aggregate(&issues).await;
    print_json(&feed)
}

async fn run_issues(state: AppState, opts: IssueListOptions) -> Result<()> {
    let issues = state.tracker.list_issues(&opts).await?;
    tracing::info!("Resolving hierarchy for {} issues", issues.len());

    let report = state.resolver().resolve(&issues).await;
    if report.failed_batches > 0 {
        tracing::warn!("{} hierarchy batches failed", report.failed_batches);
    }
    print_json(&report.enrich(issues))
}
