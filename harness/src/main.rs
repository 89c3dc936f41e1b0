use clap::{ArgGroup, Parser};
use harness::{load_env_file, Agent, Executor, HarnessConfig, TestRunOptions};
use model::BackendKind;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "debug-agent")]
#[command(about = "AI agent for Python code debugging and testing")]
#[command(group(
    ArgGroup::new("task")
        .args(["debug", "test", "coverage", "suggest_tests"])
        .multiple(false)
))]
struct Cli {
    /// Run the debugger on the specified Python file
    #[arg(long, value_name = "FILE_PATH")]
    debug: Option<PathBuf>,

    /// Run tests on a file or directory (current directory when no value is given)
    #[arg(long, value_name = "TARGET", num_args = 0..=1, default_missing_value = ".")]
    test: Option<String>,

    /// Run tests with coverage on a file or directory
    #[arg(long, value_name = "TARGET", num_args = 0..=1, default_missing_value = ".")]
    coverage: Option<String>,

    /// Ask the analysis backend for unit tests for a Python file
    #[arg(long, value_name = "FILE_PATH")]
    suggest_tests: Option<PathBuf>,

    /// Analyze failed tests with the analysis backend after --test
    #[arg(long)]
    analyze: bool,

    /// Working directory for pytest
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Python interpreter
    #[arg(long)]
    python: Option<PathBuf>,

    /// Process timeout in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Analysis backend: none, placeholder or ollama
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Model name passed to the analysis backend
    #[arg(long)]
    model: Option<String>,

    /// API key for the analysis backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Additional arguments passed through to pytest
    #[arg(last = true, value_name = "PYTEST_ARGS")]
    pytest_args: Vec<String>,
}

impl Cli {
    fn build_config(&self) -> Result<HarnessConfig, Box<dyn std::error::Error>> {
        let mut config = HarnessConfig::load(self.config.as_deref())?.apply_env()?;

        if let Some(python) = &self.python {
            config.runner.python = python.clone();
        }
        if let Some(timeout) = self.timeout {
            config.runner.timeout_secs = Some(timeout);
        }
        if let Some(backend) = self.backend {
            config.llm.backend = backend;
        }
        if let Some(model) = &self.model {
            config.llm.model_name = model.clone();
        }
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            config.llm.api_key = Some(key.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Before parsing: clap reads OPENAI_API_KEY for --api-key.
    match load_env_file(None) {
        Ok(Some(path)) => debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("{}", e),
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = cli.build_config()?;
    info!(
        "Configuration loaded (python: {}, backend: {})",
        config.runner.python.display(),
        config.llm.backend
    );

    let backend = model::create_backend(&config.llm)?;
    let executor = Executor::new(config.runner.python.clone())
        .with_timeout(config.runner.timeout());
    let agent = Agent::new(Arc::new(executor), config.runner.clone())
        .with_backend(backend);

    if let Some(file) = &cli.debug {
        let outcome = agent.debug_code(file).await?;
        return Ok(match outcome.exit_code() {
            Some(0) => ExitCode::SUCCESS,
            _ => ExitCode::FAILURE,
        });
    }

    if let Some(target) = &cli.test {
        let options = TestRunOptions {
            cwd: cli.cwd.clone(),
            extra_args: cli.pytest_args.clone(),
            analyze: cli.analyze,
        };
        let outcome = agent.run_tests(target, &options).await?;
        return Ok(match &outcome.result {
            Ok(report) if report.summary().failed == 0 && report.summary().errors == 0 => {
                ExitCode::SUCCESS
            }
            _ => ExitCode::FAILURE,
        });
    }

    if let Some(target) = &cli.coverage {
        let result = agent.run_coverage(target, cli.cwd.as_deref()).await?;
        return Ok(if result.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    if let Some(file) = &cli.suggest_tests {
        agent.suggest_tests(file).await?;
        return Ok(ExitCode::SUCCESS);
    }

    agent.run();
    Ok(ExitCode::SUCCESS)
}
