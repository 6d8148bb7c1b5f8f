mod config;
mod sinks;
mod sources;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::CliConfig;
use sinks::{LogSink, MultiSink, WebhookSink};
use sources::{CommandSource, FileSource};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use test_orchestrator::{
    deliver, Category, CoverageMetrics, Evaluation, HistoryStore, JsonFileStore,
    NotificationSink, Report, RunnerSource, StateKey, TestOrchestrator, VerdictLevel,
};
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the test suites, classify the run and escalate if needed
    Run(RunArgs),
    /// Show the persisted flake history for a project/branch
    History(HistoryArgs),
    /// Print the JSON schema of the report
    Schema,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Which suites to run
    #[arg(long = "type", value_enum, default_value_t = SuiteArg::All)]
    suite: SuiteArg,

    /// Coverage summary JSON (coverage-summary.json)
    #[arg(long)]
    coverage: Option<PathBuf>,

    /// Minimum coverage for every metric (raises targets below it)
    #[arg(long)]
    threshold: Option<f64>,

    /// Config file (default: testgate.toml or testgate.yaml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    key: KeyArgs,

    /// Pre-recorded runner output instead of running commands (CATEGORY=FILE)
    #[arg(long = "results", value_parser = parse_results)]
    results: Vec<(Category, PathBuf)>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Re-run continuously; each run produces a fresh verdict
    #[arg(long, default_value_t = false)]
    watch: bool,

    /// Seconds between watch runs
    #[arg(long, default_value_t = 300)]
    interval_secs: u64,

    /// POST escalations to this URL (overrides TESTGATE_WEBHOOK_URL)
    #[arg(long)]
    webhook_url: Option<String>,

    /// Also write report.json and report.md into this directory
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct KeyArgs {
    /// Project name for persisted history (default: current directory name)
    #[arg(long)]
    project: Option<String>,

    /// Branch name for persisted history
    #[arg(long, default_value = "main")]
    branch: String,

    /// Directory holding persisted state
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct HistoryArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// Config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only tests currently over the flake threshold
    #[arg(long, default_value_t = false)]
    flaky_only: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SuiteArg {
    Unit,
    Integration,
    E2e,
    All,
}

impl SuiteArg {
    fn categories(self) -> Vec<Category> {
        match self {
            Self::Unit => vec![Category::Unit],
            Self::Integration => vec![Category::Integration],
            Self::E2e => vec![Category::E2e],
            Self::All => Category::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Markdown,
}

fn parse_results(raw: &str) -> Result<(Category, PathBuf), String> {
    let (category, file) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=FILE, got '{raw}'"))?;
    Ok((category.parse()?, PathBuf::from(file)))
}

/// Exit status: 0 SUCCESS/WARNING, 1 FAILURE, 2 engine or usage error
fn exit_code(level: VerdictLevel) -> u8 {
    match level {
        VerdictLevel::Success | VerdictLevel::Warning => 0,
        VerdictLevel::Failure => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = match args.command {
        Command::Run(run) => cmd_run(run).await,
        Command::History(history) => cmd_history(history).map(|_| 0),
        Command::Schema => cmd_schema().map(|_| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn state_key(key: &KeyArgs, config: &CliConfig) -> Result<StateKey> {
    let project = match key.project.clone().or_else(|| config.project.clone()) {
        Some(p) => p,
        None => std::env::current_dir()
            .context("Cannot determine current directory")?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string()),
    };
    Ok(StateKey::new(project, key.branch.clone()))
}

async fn cmd_run(args: RunArgs) -> Result<u8> {
    let mut config = CliConfig::resolve(args.config.as_deref())?;
    if let Some(minimum) = args.threshold {
        config.engine.set_uniform_minimum(minimum);
    }
    if let Some(url) = &args.webhook_url {
        config.webhook_url = Some(url.clone());
    }

    let engine = TestOrchestrator::from_config(config.engine.clone())?;
    let key = state_key(&args.key, &config)?;
    let state_dir = args.key.state_dir.clone().unwrap_or(config.state_dir.clone());
    let store = JsonFileStore::new(state_dir);

    let requested = args.suite.categories();
    let (source, categories) = build_source(&args, &config, &requested)?;
    if categories.is_empty() {
        bail!("No runner configured for {:?}; add [runners] to the config or pass --results", args.suite);
    }

    let mut sinks: Vec<Box<dyn NotificationSink>> = vec![Box::new(LogSink)];
    if let Some(url) = &config.webhook_url {
        sinks.push(Box::new(WebhookSink::new(url.clone())));
    }
    let sink = MultiSink::new(sinks);

    info!(
        key = %key,
        categories = ?categories,
        watch = args.watch,
        "testgate starting"
    );

    loop {
        let outcome = run_once(&engine, source.as_ref(), &store, &key, &categories, &args).await;
        let code = match outcome {
            Ok(evaluation) => {
                emit(&evaluation.report, args.format)?;
                if let Some(dir) = &args.report_dir {
                    write_report(dir, &evaluation.report)?;
                }
                if let Err(e) = deliver(&sink, &evaluation.decision, &evaluation.report).await {
                    warn!("Escalation not delivered: {e}");
                }
                exit_code(evaluation.verdict.level())
            }
            Err(e) if args.watch => {
                error!("Run failed: {e:#}");
                2
            }
            Err(e) => return Err(e),
        };

        if !args.watch {
            return Ok(code);
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(args.interval_secs)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; leaving watch mode");
                return Ok(code);
            }
        }
    }
}

async fn run_once(
    engine: &TestOrchestrator,
    source: &dyn RunnerSource,
    store: &JsonFileStore,
    key: &StateKey,
    categories: &[Category],
    args: &RunArgs,
) -> Result<Evaluation> {
    // Read fresh each run: watch mode picks up new coverage output
    let coverage = match &args.coverage {
        Some(path) => Some(read_coverage(path)?),
        None => None,
    };
    let evaluation = engine
        .execute(source, store, key, categories, coverage)
        .await?;
    Ok(evaluation)
}

fn build_source(
    args: &RunArgs,
    config: &CliConfig,
    requested: &[Category],
) -> Result<(Box<dyn RunnerSource>, Vec<Category>)> {
    if !args.results.is_empty() {
        let files: BTreeMap<Category, PathBuf> = args
            .results
            .iter()
            .filter(|(category, _)| requested.contains(category))
            .cloned()
            .collect();
        let source = FileSource::new(files);
        let categories = source.categories();
        return Ok((Box::new(source), categories));
    }

    let mut lines = BTreeMap::new();
    for category in requested {
        match config.runners.get(*category) {
            Some(line) => {
                lines.insert(*category, line.to_string());
            }
            // A single explicitly requested suite must be runnable
            None if args.suite != SuiteArg::All => {
                bail!("No runner command configured for {category}");
            }
            None => info!(%category, "No runner configured; category skipped"),
        }
    }
    let source = CommandSource::new(lines, config.workdir.clone())?;
    let categories = source.categories();
    Ok((Box::new(source), categories))
}

fn read_coverage(path: &Path) -> Result<CoverageMetrics> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read coverage summary {}", path.display()))?;
    let metrics = CoverageMetrics::from_istanbul_summary(&raw)
        .with_context(|| format!("Invalid coverage summary {}", path.display()))?;
    Ok(metrics)
}

fn emit(report: &Report, format: Format) -> Result<()> {
    match format {
        Format::Text => {
            println!("{}", report.summary());
            for failure in &report.failures {
                let line = failure.line.map(|l| format!(":{l}")).unwrap_or_default();
                println!("  FAIL {}{} › {}", failure.file, line, failure.name);
            }
            for line in &report.coverage {
                println!(
                    "  {:<10} {:>6.2}% (min {:.1}, target {:.1}) {}",
                    line.metric.to_string(),
                    line.value,
                    line.minimum,
                    line.target,
                    line.status
                );
            }
            for action in &report.recommended_actions {
                println!("  → {action}");
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Format::Markdown => println!("{}", report.to_markdown()),
    }
    Ok(())
}

fn write_report(dir: &Path, report: &Report) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report dir {}", dir.display()))?;
    std::fs::write(dir.join("report.json"), serde_json::to_string_pretty(report)?)
        .context("Failed to write report.json")?;
    std::fs::write(dir.join("report.md"), report.to_markdown())
        .context("Failed to write report.md")?;
    Ok(())
}

fn cmd_history(args: HistoryArgs) -> Result<()> {
    let config = CliConfig::resolve(args.config.as_deref())?;
    let key = state_key(&args.key, &config)?;
    let state_dir = args.key.state_dir.clone().unwrap_or(config.state_dir.clone());
    let store = JsonFileStore::new(state_dir);
    let state = store.load(&key)?;
    let threshold = config.engine.flake_threshold;

    let records: Vec<_> = state
        .flake_history
        .iter()
        .filter(|(_, r)| {
            !args.flaky_only || (r.flake_count() >= threshold && r.has_pass() && r.has_fail())
        })
        .collect();

    match args.format {
        Format::Json => {
            let map: BTreeMap<_, _> = records.into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        Format::Text | Format::Markdown => {
            println!(
                "{}: {} run(s) recorded, {} test(s) tracked",
                key,
                state.runs_recorded,
                state.flake_history.len()
            );
            for (test, record) in records {
                println!(
                    "  {:<12} flips={} flagged_runs={} {}",
                    record.pattern(),
                    record.flake_count(),
                    record.flagged_runs,
                    test
                );
            }
        }
    }
    Ok(())
}

fn cmd_schema() -> Result<()> {
    let schema = schemars::schema_for!(Report);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
