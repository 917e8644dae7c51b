//! Command-line entrypoint for the eligibility API end-to-end harness.
//!
//! - `esp-e2e resolve <dir>` - resolve a scenario directory and print it
//! - `esp-e2e expected <dir>` - resolve and mask expected responses
//! - `esp-e2e token <text>` - resolve placeholders in one string
//! - `esp-e2e run` - seed, call the API and verify a suite
//! - `esp-e2e perf-report` - SLA checks and HTML report from perf output

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use esp_e2e::{
    ConfigSync, DataStore, DirectoryObjectStore, E2eLogger, EligibilityApiClient,
    EnvSecretSource, HarnessConfig, IdentifierLog, InMemoryDataStore, JsonlDataStore,
    LatencyStats, LocustStats, ScenarioRunner, SlaThresholds, SuiteKind, SuitePaths,
    get_current_and_previous_secret, latency_breaches, locust_breaches, render_html_report,
};
use esp_fixtures::{DEFAULT_MASKED_KEYS, PlaceholderResolver, ResolutionContext, ScenarioLoader};
use serde_json::json;
use tracing::{info, warn};

/// End-to-end harness for the eligibility signposting API.
#[derive(Parser)]
#[command(name = "esp-e2e")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every scenario in a directory and print them with the
    /// placeholder values used.
    Resolve {
        dir: PathBuf,
        #[command(flatten)]
        clock: ClockArgs,
    },

    /// Resolve and mask the expected responses in a directory.
    Expected {
        dir: PathBuf,
        #[command(flatten)]
        clock: ClockArgs,
    },

    /// Resolve the placeholders in one string, e.g. `<<RDATE_AGE_65>>`.
    Token {
        text: String,
        #[command(flatten)]
        clock: ClockArgs,
    },

    /// Run a suite against the configured API.
    ///
    /// Exits with status 1 if any scenario fails.
    Run(RunArgs),

    /// Check performance results against the SLA and write the HTML report.
    PerfReport {
        /// Locust `*_stats.csv` file.
        #[arg(long)]
        stats: PathBuf,
        /// Log-insights query result (JSON).
        #[arg(long)]
        insights: PathBuf,
        /// Where to write the HTML report.
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct ClockArgs {
    /// Resolve dates relative to this day (YYYY-MM-DD) instead of today.
    #[arg(long, value_parser = parse_date)]
    now: Option<NaiveDate>,
}

impl ClockArgs {
    fn resolver(&self) -> PlaceholderResolver {
        self.now.map_or_else(
            PlaceholderResolver::at_current_time,
            PlaceholderResolver::for_date,
        )
    }
}

#[derive(Args)]
struct RunArgs {
    /// Harness configuration file (JSON); environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the standard directories of a named suite below `--data-root`.
    #[arg(long, value_enum)]
    suite: Option<SuiteKind>,

    #[arg(long, default_value = "data")]
    data_root: PathBuf,

    /// Scenario (seed data) directory.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Expected-response directory.
    #[arg(long)]
    responses: Option<PathBuf>,

    /// Campaign config directory.
    #[arg(long)]
    configs: Option<PathBuf>,

    /// Append seeded items to this JSONL file instead of keeping them in memory.
    #[arg(long)]
    seed_file: Option<PathBuf>,

    /// Sync campaign configs into this directory.
    #[arg(long)]
    config_mirror: Option<PathBuf>,

    /// Read hashing secrets from `<PREFIX>_AWSCURRENT` / `<PREFIX>_AWSPREVIOUS`.
    #[arg(long)]
    secret_env_prefix: Option<String>,

    /// Write `filename,nhs_number` rows for every seeded scenario.
    #[arg(long)]
    identifier_log: Option<PathBuf>,

    /// Write `NhsNumber,RequestHeaders` rows for the load generator.
    #[arg(long)]
    request_params: Option<PathBuf>,

    /// Write structured run logs (JSONL).
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(flatten)]
    clock: ClockArgs,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries JSON output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { dir, clock } => {
            let loader = ScenarioLoader::new(clock.resolver());
            let set = loader.load_directory(&dir)?;
            print_json(&json!({
                "scenarios": set.scenarios,
                "placeholders": set.context.export(),
                "failures": set.context.failures(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Expected { dir, clock } => {
            let loader = ScenarioLoader::new(clock.resolver());
            let expected = loader.load_expected_responses(&dir, &DEFAULT_MASKED_KEYS)?;
            print_json(&json!({
                "responses": expected.responses,
                "failures": expected.context.failures(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Token { text, clock } => {
            let mut context = ResolutionContext::new();
            let resolved = clock.resolver().resolve_str(&text, Some(&mut context), None);
            if let Some(failure) = context.failures().first() {
                bail!("{}", failure.message);
            }
            println!("{resolved}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => run_suite(args).await,
        Commands::PerfReport {
            stats,
            insights,
            output,
        } => perf_report(&stats, &insights, &output),
    }
}

async fn run_suite(args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());

    let paths = suite_paths(&args)?;
    let resolver = args.clock.resolver();
    let loader = ScenarioLoader::new(resolver);
    let scenarios = loader.load_directory(&paths.data)?;
    let expected = loader.load_expected_responses(&paths.responses, &DEFAULT_MASKED_KEYS)?;
    info!(
        scenarios = scenarios.len(),
        expected = expected.len(),
        "loaded suite"
    );

    let data_store: Arc<dyn DataStore> = match &args.seed_file {
        Some(path) => Arc::new(JsonlDataStore::new(path, config.table_name.clone())),
        None => {
            warn!("no --seed-file given; seeded items are kept in memory only");
            Arc::new(InMemoryDataStore::new())
        }
    };

    let client = EligibilityApiClient::new(&config)?;
    let mut runner = ScenarioRunner::new(client, data_store)
        .with_identifier_key(loader.identifier_key())
        .with_strict_ssl(config.strict_ssl);

    if let Some(mirror) = &args.config_mirror {
        let store = Arc::new(DirectoryObjectStore::new(mirror));
        let sync = ConfigSync::new(store, config.config_prefix.clone(), resolver);
        runner = runner.with_config_sync(sync, &paths.configs);
    }
    if let Some(prefix) = &args.secret_env_prefix {
        let source = EnvSecretSource::new(prefix.clone());
        let secrets =
            get_current_and_previous_secret(&source, &config.hashing_secret_name()).await?;
        runner = runner.with_secrets(secrets);
    }
    if let Some(path) = &args.identifier_log {
        runner = runner.with_identifier_log(IdentifierLog::new(path));
    }
    if let Some(path) = &args.request_params {
        runner = runner.with_request_params(path);
    }

    let report = runner.run_suite(&scenarios, &expected).await;

    if let Some(path) = &args.log {
        let mut logger = E2eLogger::new();
        logger.extend(report.log_entries().cloned());
        logger
            .write_json_lines(path)
            .with_context(|| format!("writing run log to {}", path.display()))?;
    }

    print_json(&json!({
        "passed": report.passed(),
        "failed": report.failed(),
        "outcomes": report
            .outcomes
            .iter()
            .map(|o| json!({
                "filename": o.filename,
                "scenario_name": o.scenario_name,
                "passed": o.passed,
                "status_code": o.status_code,
                "mismatch": o.mismatch,
            }))
            .collect::<Vec<_>>(),
    }))?;

    Ok(if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn suite_paths(args: &RunArgs) -> anyhow::Result<SuitePaths> {
    let defaults = args
        .suite
        .map(|suite| SuitePaths::for_suite(&args.data_root, suite));
    let pick = |explicit: &Option<PathBuf>, from_suite: Option<&PathBuf>, flag: &str| {
        explicit
            .clone()
            .or_else(|| from_suite.cloned())
            .with_context(|| format!("--{flag} is required when --suite is not given"))
    };
    Ok(SuitePaths {
        data: pick(&args.data, defaults.as_ref().map(|d| &d.data), "data")?,
        responses: pick(
            &args.responses,
            defaults.as_ref().map(|d| &d.responses),
            "responses",
        )?,
        configs: pick(&args.configs, defaults.as_ref().map(|d| &d.configs), "configs")?,
    })
}

fn perf_report(stats: &Path, insights: &Path, output: &Path) -> anyhow::Result<ExitCode> {
    let stats_text = std::fs::read_to_string(stats)
        .with_context(|| format!("reading {}", stats.display()))?;
    let insights_text = std::fs::read_to_string(insights)
        .with_context(|| format!("reading {}", insights.display()))?;

    let locust = LocustStats::from_stats_csv(&stats_text)?;
    let latency = LatencyStats::from_insights_json(&insights_text)?;

    let sla = SlaThresholds::default();
    let breaches: Vec<String> = locust_breaches(&locust, &sla)
        .into_iter()
        .chain(latency_breaches(&latency, &sla))
        .map(|breach| breach.to_string())
        .collect();

    std::fs::write(output, render_html_report(&locust, &latency))
        .with_context(|| format!("writing {}", output.display()))?;
    info!(report = %output.display(), "performance report written");

    print_json(&json!({
        "locust": locust,
        "latency": latency,
        "breaches": breaches,
    }))?;

    Ok(if breaches.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
