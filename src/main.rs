//! quality-check - multi-engine quality checks for TypeScript/JavaScript projects

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use quality_check::config::ProjectConfig;
use quality_check::error::EXIT_INTERNAL_ERROR;
use quality_check::hook::{run_hook, STDIN_TIMEOUT};
use quality_check::pipeline::{CheckRequest, QualityChecker};
use quality_check::quality::{Classification, ClassificationRules, IssueClassifier, TypeEngine};
use quality_check::report::{AgentMode, OutputFormat, ReportOptions};

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "QUALITY_CHECK_LOG";

#[derive(Parser)]
#[command(name = "quality-check")]
#[command(author = "Laurence Avent")]
#[command(version)]
#[command(about = "Type, lint and format checks with tiered remediation", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check files, directories or the whole project
    Check {
        /// Files or directories to check (default: the project)
        files: Vec<PathBuf>,

        /// Only check staged files
        #[arg(long)]
        staged: bool,

        /// Only check files changed since this git reference
        #[arg(long, value_name = "REF")]
        since: Option<String>,

        /// Apply lint and format fixes
        #[arg(long)]
        fix: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "cli")]
        format: OutputFormat,

        /// Detail level for agent output
        #[arg(long, value_enum, default_value = "default")]
        agent_mode: AgentMode,

        /// Check files even if .gitignore excludes them
        #[arg(long)]
        no_gitignore: bool,

        /// Show full messages for every issue
        #[arg(long)]
        verbose_issues: bool,

        /// Maximum issues shown per tool (0 for no limit)
        #[arg(long, value_name = "N")]
        max_items: Option<usize>,
    },

    /// Run as an editor/agent hook reading a JSON payload from stdin
    Hook,

    /// Show how a rule id or diagnostic code is classified
    Classify {
        /// Rule id (e.g. no-unused-vars) or code (e.g. TS2322)
        #[arg(long)]
        rule: String,
    },

    /// Manage engine caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove the type-checker and lint caches for this project
    Clear,
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "quality_check=debug,warn"
    } else {
        "quality_check=warn,warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message);
    std::process::exit(EXIT_INTERNAL_ERROR);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    match cli.command {
        Commands::Check {
            files,
            staged,
            since,
            fix,
            format,
            agent_mode,
            no_gitignore,
            verbose_issues,
            max_items,
        } => {
            if !project_path.exists() {
                fail(format!(
                    "Project directory does not exist: {}",
                    project_path.display()
                ));
            }

            let checker = QualityChecker::new(&project_path).unwrap_or_else(|e| fail(e));

            let cwd = std::env::current_dir()?;
            let request = CheckRequest {
                files: files.into_iter().map(|f| cwd.join(f)).collect(),
                staged,
                since,
                fix,
                silent_fix: false,
                respect_gitignore: no_gitignore.then_some(false),
                correlation_id: None,
            };

            let outcome = checker.check(request).await;

            let mut options = ReportOptions::from_config(&checker.config().report);
            options.format = format;
            options.agent_mode = agent_mode;
            options.verbose |= verbose_issues;
            if let Some(n) = max_items {
                options.max_items = n;
            }
            options.root = Some(checker.project_root().to_path_buf());

            print!("{}", outcome.render(&options));
            std::process::exit(outcome.exit_code());
        }

        Commands::Hook => {
            let outcome = run_hook(tokio::io::stdin(), &project_path, STDIN_TIMEOUT).await;
            eprint!("{}", outcome.output);
            std::process::exit(outcome.exit_code);
        }

        Commands::Classify { rule } => {
            let config = ProjectConfig::load(&project_path).unwrap_or_else(|e| fail(e));
            let rules = ClassificationRules::load(config.rules_path(&project_path).as_deref())
                .unwrap_or_else(|e| fail(e));
            let classification = IssueClassifier::new(rules).classify_key(Some(&rule));

            println!(
                "{} {} ({})",
                rule.bold(),
                classification.tier().to_string().cyan(),
                classification.action()
            );
            match &classification {
                Classification::AutoFixable => {}
                Classification::AgentFixable(r) => {
                    println!("  {} {}", "Instruction:".bold(), r.instruction);
                    println!("  {}\n{}", "Before:".bold(), r.before);
                    println!("  {}\n{}", "After:".bold(), r.after);
                }
                Classification::HumanRequired(e) => {
                    println!("  {} {}", "Concern:".bold(), e.concern);
                    println!("  {} {}", "Learn more:".bold(), e.learn_more);
                    println!("  {} {}", "Next step:".bold(), e.next_step);
                }
            }
        }

        Commands::Cache { action } => match action {
            CacheAction::Clear => {
                let config = ProjectConfig::load(&project_path).unwrap_or_else(|e| fail(e));

                let store = TypeEngine::new(config.tsc_cache_dir()).cache_store(&project_path);
                store.clear().unwrap_or_else(|e| fail(e));
                println!(
                    "{} type-check cache {}",
                    "Cleared".green(),
                    store.path().display()
                );

                let eslint_dir = config.eslint_cache_dir(&project_path);
                if eslint_dir.exists() {
                    std::fs::remove_dir_all(&eslint_dir)?;
                    println!(
                        "{} lint cache {}",
                        "Cleared".green(),
                        eslint_dir.display()
                    );
                }
            }
        },
    }

    Ok(())
}
