use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};

use synod_core::{OutputFormat, ReviewRequest, Severity, SynodConfig};
use synod_gateway::AppState;
use synod_review::llm::LlmClient;
use synod_review::service::ReviewService;

#[derive(Parser)]
#[command(
    name = "synod",
    version,
    about = "AI code review gateway",
    long_about = "Synod reviews code diffs with a panel of role-scoped AI agents:\n\
                   four specialists analyze the change in parallel, one synthesizer\n\
                   merges their findings, and deterministic guardrails validate the\n\
                   output before it reaches you.\n\n\
                   Examples:\n  \
                     synod serve                       Start the HTTP gateway\n  \
                     git diff | synod review           Review a diff from stdin\n  \
                     synod review --file changes.patch Review a patch file\n  \
                     synod review --fail-on high       Exit non-zero on high findings"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .synod.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP review gateway
    #[command(long_about = "Start the HTTP review gateway.\n\n\
        Exposes POST /review (bearer-authenticated, rate-limited) and GET /health.\n\
        Configuration is layered: defaults, then .synod.toml, then environment\n\
        variables (LLM_PROVIDER, OPENAI_API_KEY, REVIEW_API_KEY, ...).\n\n\
        Examples:\n  synod serve\n  synod serve --bind 127.0.0.1:9000")]
    Serve {
        /// Socket address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Review a diff once and print the result
    #[command(long_about = "Review a diff once and print the result.\n\n\
        Reads a unified diff from stdin or a file, runs the full agent panel,\n\
        and prints the guardrailed review. Useful in CI: --fail-on makes the\n\
        exit code reflect the worst finding.\n\n\
        Examples:\n  git diff | synod review\n  synod review --file changes.patch --fail-on high")]
    Review {
        /// Read the diff from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,

        /// Language hint (auto-detected from the diff when omitted)
        #[arg(long)]
        language: Option<String>,

        /// Exit non-zero when a finding meets this severity
        #[arg(long)]
        fail_on: Option<Severity>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => SynodConfig::from_file(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let default_path = std::path::Path::new(".synod.toml");
            if default_path.exists() {
                SynodConfig::from_file(default_path).into_diagnostic()?
            } else {
                SynodConfig::default()
            }
        }
    };
    config.apply_env();
    config.validate().into_diagnostic()?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let config = Arc::new(config);
            let backend = LlmClient::new(&config.llm).into_diagnostic()?;
            let service = Arc::new(ReviewService::new(config.clone(), Arc::new(backend)));
            let state = AppState::new(config, service).into_diagnostic()?;
            synod_gateway::serve(state).await.into_diagnostic()?;
        }
        Command::Review {
            file,
            language,
            fail_on,
        } => {
            let diff = read_diff(file.as_deref())?;
            let config = Arc::new(config);
            let backend = LlmClient::new(&config.llm).into_diagnostic()?;
            let service = ReviewService::new(config, Arc::new(backend));

            let result = service
                .review(ReviewRequest {
                    diff,
                    language,
                    context: None,
                })
                .await
                .into_diagnostic()?;

            match cli.format {
                OutputFormat::Text => println!("{result}"),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?)
                }
                OutputFormat::Markdown => println!("{}", result.to_markdown()),
            }

            if let Some(threshold) = fail_on {
                let failing = result
                    .findings
                    .iter()
                    .any(|f| f.severity.meets_threshold(threshold));
                if failing {
                    std::process::exit(1);
                }
            }
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "synod", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_diff(file: Option<&std::path::Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read diff from {}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .into_diagnostic()
                .wrap_err("failed to read diff from stdin")?;
            Ok(buffer)
        }
    }
}
