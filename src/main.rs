// Lifecycle survey CLI
//
// Classifies every repository of the configured organizations (review) or
// of one organization / repository (induction), writes per-organization
// partitions, and publishes the merged report as a tracking issue.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use octocrab::models::AppId;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;

use phasewatch::{Credentials, GitHubClient};
use phasewatch::lifecycle::{
    CheckoutStrategy, FsResultStore, GixCheckout, IssuePublisher, MetricsCollector, Orchestrator,
    PhaseCatalog, PipelineEvaluator, RenderOptions, RepoSlug, RunConfig, RunMode, ShardRunner,
    WebhookNotifier, deliver,
};

#[derive(Parser, Debug)]
#[command(name = "phasewatch", version, about = "Repository lifecycle phase survey")]
struct Cli {
    #[arg(long, global = true, default_value = "phasewatch.toml", help = "Run configuration file")]
    config: PathBuf,
    #[arg(long, global = true, help = "Phase catalog file, overrides the config")]
    phases: Option<PathBuf>,
    #[arg(long, global = true, env = "GITHUB_RUN_ID", help = "Reference recorded in the report")]
    run_ref: Option<String>,
    #[arg(long, global = true, help = "Render the report without publishing or notifying")]
    dry_run: bool,
    #[arg(long, global = true, help = "Classify without cloning repositories")]
    no_checkout: bool,
    #[arg(long, global = true, help = "Also write the rendered report to this file")]
    output: Option<PathBuf>,
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Survey every configured organization
    Review,
    /// Survey one organization, optionally one repository of it
    Induction {
        #[arg(long)]
        org: String,
        #[arg(long)]
        repo: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let mut config = RunConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(phases) = &cli.phases {
        config.phases = phases.clone();
    }
    if cli.no_checkout {
        config.checkout.enabled = false;
    }

    let catalog = Arc::new(
        PhaseCatalog::from_path(&config.phases)
            .with_context(|| format!("loading {}", config.phases.display()))?,
    );
    info!("Loaded {} phase rules", catalog.len());

    let mode = match &cli.command {
        Commands::Review => RunMode::Review,
        Commands::Induction { org, repo } => RunMode::Induction {
            organization: org.clone(),
            repository: repo.clone(),
        },
    };
    let targets = mode.targets(&config.organizations);
    if targets.is_empty() {
        warn!("No organizations configured; the report will be empty");
    }

    let client = build_client(&cli, &config)?;
    let now = Utc::now();
    let run_ref = cli
        .run_ref
        .clone()
        .unwrap_or_else(|| now.format("%Y%m%dT%H%M%SZ").to_string());

    let checkout = if config.checkout.enabled {
        if cli.token.is_none() {
            warn!("No GITHUB_TOKEN; only public repositories can be cloned");
        }
        CheckoutStrategy::Clone(
            GixCheckout::new(config.web_base_url.clone(), config.limits.fetch_timeout())
                .with_access_token(cli.token.clone()),
        )
    } else {
        CheckoutStrategy::Skip
    };
    let archived_marker = if config.archived_marker.is_empty() {
        None
    } else {
        Some(Regex::new(&config.archived_marker).context("compiling archived_marker")?)
    };

    let evaluator = PipelineEvaluator::new(
        MetricsCollector::new(client.clone(), config.limits.api_timeout()),
        catalog,
        now,
    );
    let runner = ShardRunner::new(client.clone(), checkout, evaluator)
        .with_archived_marker(archived_marker)
        .with_repo_concurrency(config.limits.repo_concurrency);

    let store = Arc::new(
        FsResultStore::for_run(&config.results_dir, &run_ref)
            .with_context(|| format!("preparing results for run {run_ref}"))?,
    );
    let orchestrator = Orchestrator::new(runner, store, config.limits.shard_concurrency);

    let report = orchestrator.survey(targets, now, &run_ref).await;
    let rendered = report.render(&RenderOptions {
        base_url: config.web_base_url.clone(),
    });
    info!("{}", report.summary_line());

    if let Some(path) = &cli.output {
        tokio::fs::write(path, &rendered)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if cli.dry_run {
        println!("{rendered}");
        return Ok(());
    }

    let publisher = match &config.tracking_issue {
        Some(settings) => {
            let repo: RepoSlug = settings
                .repository
                .parse()
                .map_err(anyhow::Error::msg)?;
            Some(IssuePublisher::new(
                client.clone(),
                repo,
                settings.title.clone(),
                settings.label.clone(),
            ))
        }
        None => {
            println!("{rendered}");
            None
        }
    };
    let notifier = config
        .notify
        .as_ref()
        .map(|notify| WebhookNotifier::new(notify.webhook_url.clone()));

    deliver(publisher.as_ref(), notifier.as_ref(), &report, &rendered)
        .await
        .context("delivering the report")?;
    Ok(())
}

fn build_client(cli: &Cli, config: &RunConfig) -> Result<GitHubClient> {
    let credentials = if let Some(token) = &cli.token {
        Credentials::Token(token.clone())
    } else if let (Some(app_id), Some(key_path)) =
        (config.github.app_id, &config.github.private_key_path)
    {
        let private_key = std::fs::read_to_string(key_path)
            .with_context(|| format!("reading {}", key_path.display()))?;
        Credentials::App {
            app_id: AppId(app_id),
            private_key,
        }
    } else {
        warn!("No GITHUB_TOKEN or app credentials; using anonymous API access");
        Credentials::Anonymous
    };
    info!("Authenticating to GitHub as {}", credentials.describe());

    let mut builder = GitHubClient::builder().credentials(credentials);
    if let Some(uri) = &config.github.api_base_uri {
        builder = builder.base_uri(uri.clone());
    }
    Ok(builder.build()?)
}
