//! Synthloop - test-driven code synthesis CLI
//!
//! The `synthloop` command asks a language model for a pytest suite, then
//! iterates candidate implementations against it until one passes.
//!
//! ## Commands
//!
//! - `solve`: run a synthesis session for a task description
//! - `inspect`: verify and summarise a persisted session
//! - `discover`: print the entry point a renderer would invoke

mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use synthloop_core::{
    discover_entry_point, read_session_artifact, synthesize, write_session_artifact, CancelFlag,
    Collaborators, CommandRenderer, HistoryLedger, PythonSandbox, Renderer, SessionOutcome,
    SessionReport, Specification, DEFAULT_ENTRY_POINT,
};
use synthloop_oracle::{Backend, LlmOracle, PromptProfile};
use tracing::{info, warn, Level};
use uuid::Uuid;

use settings::{FileConfig, OracleOverrides, SynthesisOverrides};

#[derive(Parser)]
#[command(name = "synthloop")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test-driven code synthesis with a generative model", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML settings file
    #[arg(long, global = true, env = "SYNTHLOOP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Anthropic,
    Openai,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Anthropic => Backend::Anthropic,
            BackendArg::Openai => Backend::OpenAi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProfileArg {
    General,
    Manim,
}

impl From<ProfileArg> for PromptProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::General => PromptProfile::General,
            ProfileArg::Manim => PromptProfile::Manim,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize an implementation and its test suite for a task
    Solve {
        /// Task description
        #[arg(required_unless_present = "task_file", conflicts_with = "task_file")]
        task: Option<String>,

        /// Read the task description from a file
        #[arg(long)]
        task_file: Option<PathBuf>,

        /// Maximum number of attempts
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Per-attempt sandbox budget in seconds
        #[arg(long)]
        sandbox_timeout_secs: Option<u64>,

        /// Model API flavour
        #[arg(long, value_enum, env = "SYNTHLOOP_BACKEND")]
        backend: Option<BackendArg>,

        /// Model name
        #[arg(long, env = "SYNTHLOOP_MODEL")]
        model: Option<String>,

        /// Override the backend URL
        #[arg(long, env = "SYNTHLOOP_ENDPOINT")]
        endpoint: Option<String>,

        /// Prompt and sandbox profile
        #[arg(long, value_enum)]
        profile: Option<ProfileArg>,

        /// Skip failure analysis between attempts
        #[arg(long)]
        no_analysis: bool,

        /// Python interpreter used by the sandbox
        #[arg(long, env = "SYNTHLOOP_PYTHON")]
        python: Option<PathBuf>,

        /// Persist the session report under this directory
        #[arg(long, env = "SYNTHLOOP_ARTIFACTS_DIR")]
        artifacts_dir: Option<PathBuf>,

        /// Render command run on success ({file} and {entry} are substituted)
        #[arg(long)]
        render_command: Option<String>,

        /// Directory for rendered output
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Route model requests through HTTP(S)_PROXY
        #[arg(long, env = "SYNTHLOOP_USE_SYSTEM_PROXY")]
        use_system_proxy: bool,
    },

    /// Verify and summarise a persisted session
    Inspect {
        /// Session id
        session_id: String,

        /// Root directory containing session artifacts
        #[arg(long, env = "SYNTHLOOP_ARTIFACTS_DIR")]
        artifacts_dir: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        full: bool,
    },

    /// Print the entry point a renderer would invoke for a Python file
    Discover {
        /// Python source file
        file: PathBuf,

        /// Base class the entry point must extend
        #[arg(long, default_value = "Scene")]
        base: String,

        /// Name used when no class matches
        #[arg(long, default_value = DEFAULT_ENTRY_POINT)]
        default: String,
    },
}

struct SolveArgs {
    task: Option<String>,
    task_file: Option<PathBuf>,
    synthesis: SynthesisOverrides,
    oracle: OracleOverrides,
    profile: Option<ProfileArg>,
    python: Option<PathBuf>,
    artifacts_dir: Option<PathBuf>,
    render_command: Option<String>,
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    synthloop_core::init_tracing(cli.json, level);

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    match cli.command {
        Commands::Solve {
            task,
            task_file,
            max_iterations,
            sandbox_timeout_secs,
            backend,
            model,
            endpoint,
            profile,
            no_analysis,
            python,
            artifacts_dir,
            render_command,
            output_dir,
            use_system_proxy,
        } => {
            let args = SolveArgs {
                task,
                task_file,
                synthesis: SynthesisOverrides {
                    max_iterations,
                    sandbox_timeout_secs,
                    no_analysis,
                },
                oracle: OracleOverrides {
                    backend: backend.map(Backend::from),
                    model,
                    endpoint,
                    use_system_proxy,
                },
                profile,
                python,
                artifacts_dir,
                render_command,
                output_dir,
            };
            cmd_solve(args, &file).await
        }
        Commands::Inspect {
            session_id,
            artifacts_dir,
            full,
        } => cmd_inspect(&session_id, &artifacts_dir, full),
        Commands::Discover {
            file: path,
            base,
            default,
        } => cmd_discover(&path, &base, &default),
    }
}

async fn cmd_solve(args: SolveArgs, file: &FileConfig) -> Result<()> {
    let task = match (&args.task, &args.task_file) {
        (Some(task), _) => task.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file {:?}", path))?,
        (None, None) => anyhow::bail!("Provide a task or --task-file"),
    };
    let specification = Specification::new(task.trim());
    if specification.is_blank() {
        anyhow::bail!("Task description is empty");
    }

    let profile = args
        .profile
        .map(PromptProfile::from)
        .or(file.oracle.profile)
        .unwrap_or_default();
    let config = settings::synthesis_config(&args.synthesis, &file.synthesis)?;
    let oracle_config =
        settings::oracle_config(&args.oracle, &file.oracle, |var| std::env::var(var).ok())?;
    let sandbox_config = settings::sandbox_config(
        profile,
        args.python.clone(),
        &file.sandbox,
        std::env::var("PATH").ok(),
    );

    info!(
        backend = %oracle_config.backend,
        model = %oracle_config.model,
        max_iterations = config.max_iterations,
        "starting synthesis"
    );

    let oracle = LlmOracle::new(oracle_config, profile).context("Failed to build oracle")?;
    let cancel = CancelFlag::new();
    let collaborators = Collaborators::new(
        Arc::new(oracle),
        Arc::new(PythonSandbox::new(sandbox_config)),
    )
    .with_cancel_flag(cancel.clone());

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current attempt");
            cancel.cancel();
        }
    });
    let outcome = synthesize(specification, config, collaborators).await;
    ctrl_c.abort();

    let artifacts_dir = args.artifacts_dir.clone().or_else(|| file.artifacts_dir.clone());
    if let Some(dir) = &artifacts_dir {
        let path = write_session_artifact(&outcome.report, dir)
            .with_context(|| format!("Failed to write session artifact under {:?}", dir))?;
        println!("Session {} saved to {:?}", outcome.report.session_id, path);
    }

    report_outcome(&outcome)?;

    let render_command = args.render_command.clone().or_else(|| file.render.command.clone());
    if let (Ok(success), Some(command)) = (&outcome.result, render_command) {
        let output_dir = args
            .output_dir
            .clone()
            .or_else(|| file.render.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("media"));
        let base = file.render.base.as_deref().unwrap_or("Scene");
        let entry = discover_entry_point(success.implementation_text(), base, DEFAULT_ENTRY_POINT);

        let mut renderer = CommandRenderer::from_template(&command, output_dir);
        if let Some(extension) = &file.render.extension {
            renderer = renderer.with_extension(extension);
        }
        if profile == PromptProfile::Manim {
            renderer = renderer.with_preamble("from manim import *\nimport numpy as np\n\n");
        }

        // Rendering never changes the synthesis verdict.
        match renderer.render(success.implementation_text(), &entry).await {
            Ok(artifact) => println!("Rendered {} to {:?}", artifact.entry_point, artifact.path),
            Err(err) => eprintln!("Render failed ({}): {}", err.kind(), err),
        }
    }

    Ok(())
}

/// Print the session outcome; a failed session becomes an error.
fn report_outcome(outcome: &SessionOutcome) -> Result<()> {
    match &outcome.result {
        Ok(success) => {
            println!("=== Test ===");
            println!("{}", success.test_text());
            println!();
            println!("=== Implementation ===");
            println!("{}", success.implementation_text());
            println!();
            println!("Solved in {} iteration(s)", success.iteration_count);
            Ok(())
        }
        Err(err) => {
            eprintln!("Synthesis failed [{}]: {}", err.kind(), err);
            if !outcome.ledger().is_empty() {
                eprintln!();
                eprint!("{}", ledger_summary(outcome.ledger()));
            }
            anyhow::bail!("synthesis failed: {}", err.kind())
        }
    }
}

/// One line per attempt: verdict and failing test ids.
fn ledger_summary(ledger: &HistoryLedger) -> String {
    let mut out = String::new();
    for entry in ledger {
        let verdict = if entry.result.passed() {
            "passed"
        } else {
            "failed"
        };
        out.push_str(&format!(
            "attempt {:>2}: {} in {}ms",
            entry.attempt.iteration(),
            verdict,
            entry.result.duration().as_millis()
        ));
        if !entry.result.failed_test_ids().is_empty() {
            out.push_str(&format!(" [{}]", entry.result.failed_test_ids().join(", ")));
        }
        out.push('\n');
    }
    out
}

fn cmd_inspect(session_id: &str, artifacts_dir: &Path, full: bool) -> Result<()> {
    let id = Uuid::parse_str(session_id)
        .with_context(|| format!("Invalid session id: {}", session_id))?;
    let report = read_session_artifact(&id, artifacts_dir)
        .with_context(|| format!("Failed to load session {}", id))?;

    if full {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", inspect_summary(&report));
    }
    println!("Digest verified");
    Ok(())
}

fn inspect_summary(report: &SessionReport) -> String {
    let mut out = format!(
        "Session:    {}\nStatus:     {}\nIterations: {}/{}\nFinished:   {}\n",
        report.session_id,
        report.status,
        report.iterations(),
        report.config.max_iterations,
        report.finished_at.to_rfc3339(),
    );
    if let Some(failure) = &report.failure {
        out.push_str(&format!("Failure:    [{}] {}\n", failure.kind, failure.message));
    }
    out.push_str(&format!("Task:       {}\n", report.specification));
    if !report.ledger.is_empty() {
        out.push('\n');
        out.push_str(&ledger_summary(&report.ledger));
    }
    out
}

fn cmd_discover(path: &Path, base: &str, default: &str) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    println!("{}", discover_entry_point(&text, base, default));
    Ok(())
}
