use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use catalyst_news::datastore::{CatalystDatastore, DEFAULT_BASE_URL};
use catalyst_news::news::{NewsSync, SyncReport};
use catalyst_news::newsapi::{NewsApiClient, DEFAULT_COUNTRY, DEFAULT_HOST};
use catalyst_news::server::{create_router, AppState};
use catalyst_news::{DeployTarget, DeploymentPlan, PayloadSource, RunOutcome};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(global = true, short, long, default_value = "error")]
    log: LevelFilter,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive a deployment plan from commit metadata and run the deploy tool
    Deploy(DeployArgs),
    /// Refresh the cached news tables from the news API
    Sync(SyncArgs),
    /// Serve the cached-news read API
    Serve(ServeArgs),
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("payload_source").args(["payload", "payload_file"]),
))]
struct DeployArgs {
    /// Inline JSON commits payload
    #[arg(long)]
    payload: Option<String>,

    /// File holding the JSON commits payload
    #[arg(long, value_name = "PATH")]
    payload_file: Option<PathBuf>,

    /// Environment variable holding the JSON commits payload (the CI event channel)
    #[arg(long, value_name = "NAME", default_value = "commits")]
    payload_env: String,

    /// Deploy tool to invoke
    #[arg(long, env = "CATALYST_BIN", default_value = "catalyst")]
    tool: String,

    /// Classify and report without invoking the deploy tool
    #[arg(long)]
    plan_only: bool,

    /// Print the derived plan as JSON on stdout, for the next pipeline step
    #[arg(long)]
    emit_plan: bool,
}

impl DeployArgs {
    fn payload_source(&self) -> PayloadSource {
        if let Some(payload) = &self.payload {
            PayloadSource::Inline(payload.clone())
        } else if let Some(path) = &self.payload_file {
            PayloadSource::File(path.clone())
        } else {
            PayloadSource::Env(self.payload_env.clone())
        }
    }
}

#[derive(Args)]
struct SyncArgs {
    /// News API key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    api_key: String,

    /// News API host
    #[arg(long, env = "NEWS_API_HOST", default_value = DEFAULT_HOST)]
    api_host: String,

    /// Country the headlines are scoped to
    #[arg(long, env = "NEWS_COUNTRY", default_value = DEFAULT_COUNTRY)]
    country: String,

    #[command(flatten)]
    datastore: DatastoreArgs,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to serve the read API on
    #[arg(long, env = "NEWS_BIND_ADDR", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    #[command(flatten)]
    datastore: DatastoreArgs,
}

#[derive(Args)]
struct DatastoreArgs {
    /// Catalyst API base URL
    #[arg(long, env = "CATALYST_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Catalyst project identifier
    #[arg(long, env = "CATALYST_PROJECT_ID")]
    project_id: String,

    /// OAuth token authorizing datastore requests
    #[arg(long, env = "CATALYST_OAUTH_TOKEN", hide_env_values = true)]
    token: String,
}

impl DatastoreArgs {
    fn connect(self) -> CatalystDatastore {
        CatalystDatastore::new(self.base_url, self.project_id, self.token)
    }
}

fn print_plan(out: &mut dyn Write, plan: &DeploymentPlan) -> io::Result<()> {
    writeln!(out, "\n📋 Deployment Plan:")?;
    writeln!(out, "==================")?;
    writeln!(
        out,
        "  Functions: {}",
        if plan.functions.is_empty() {
            "None".to_string()
        } else {
            plan.functions.join(", ")
        }
    )?;
    writeln!(out, "  Client:    {}", if plan.client { "Yes" } else { "No" })
}

fn print_deploy_summary(out: &mut dyn Write, outcome: &RunOutcome) -> io::Result<()> {
    match outcome {
        RunOutcome::Skipped { reason } => {
            writeln!(out, "\nℹ️  Nothing to deploy: {reason}")
        }
        RunOutcome::NothingToDeploy { .. } => {
            writeln!(
                out,
                "\nℹ️  No deployment needed - no function or client changes detected"
            )
        }
        RunOutcome::Planned { plan } => print_plan(out, plan),
        RunOutcome::Completed { plan, report } => {
            print_plan(out, plan)?;

            writeln!(out, "\n📊 Deployment Results:")?;
            writeln!(out, "=====================")?;
            for action in &report.actions {
                let label = match &action.target {
                    DeployTarget::Functions(names) => format!("functions ({})", names.join(", ")),
                    DeployTarget::Client => "client".to_string(),
                };
                if action.success {
                    writeln!(out, "  ✅ {label}")?;
                } else {
                    let detail = action.error.as_deref().unwrap_or("unknown error");
                    writeln!(out, "  ❌ {label}: {detail}")?;
                }
            }

            if report.overall_success() {
                writeln!(out, "\n🎉 Deployment completed successfully!")
            } else {
                writeln!(out, "\n💥 Deployment failed! Please check the error messages above.")
            }
        }
    }
}

fn print_sync_summary(report: &SyncReport) {
    println!("\n📰 News Sync Summary:");
    println!("====================");
    for table in &report.tables {
        println!(
            "  {}: {} updated, {} inserted",
            table.table, table.updated, table.inserted
        );
    }
}

fn run_deploy(args: &DeployArgs) -> catalyst_news::Result<ExitCode> {
    let source = args.payload_source();
    let processor = catalyst_news::new_deployer(&args.tool);

    let outcome = if args.plan_only {
        processor.plan_from_source(&source)
    } else {
        processor.run_from_source(&source)
    };

    // With --emit-plan, stdout carries only the plan JSON; the human summary
    // moves to stderr.
    if args.emit_plan {
        print_deploy_summary(&mut io::stderr(), &outcome)?;
        let plan = outcome.plan().cloned().unwrap_or_default();
        println!("{}", serde_json::to_string(&plan)?);
    } else {
        print_deploy_summary(&mut io::stdout(), &outcome)?;
    }

    Ok(if outcome.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_sync(args: SyncArgs) -> catalyst_news::Result<ExitCode> {
    let feed = NewsApiClient::new(args.api_host, args.api_key, args.country);
    let sync = NewsSync::new(feed, args.datastore.connect());

    let report = sync.run().await?;
    print_sync_summary(&report);

    Ok(ExitCode::SUCCESS)
}

async fn run_serve(args: ServeArgs) -> catalyst_news::Result<ExitCode> {
    let state = AppState {
        datastore: Arc::new(args.datastore.connect()),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(addr = %args.bind, "Serving cached news");
    axum::serve(listener, router).await?;

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive(cli.log.into());

    fmt()
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        // Diagnostics stay off stdout, which deploy --emit-plan reserves for
        // the plan JSON.
        .with_writer(io::stderr)
        .pretty()
        .init();

    let result = match cli.command {
        Commands::Deploy(args) => run_deploy(&args),
        Commands::Sync(args) => run_sync(args).await,
        Commands::Serve(args) => run_serve(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalyst_news::{ActionOutcome, DeploymentReport};

    fn rendered(outcome: &RunOutcome) -> String {
        let mut out: Vec<u8> = Vec::new();
        print_deploy_summary(&mut out, outcome).expect("summary should render");
        String::from_utf8(out).expect("summary should be UTF-8")
    }

    fn deploy_args() -> DeployArgs {
        DeployArgs {
            payload: None,
            payload_file: None,
            payload_env: "commits".to_string(),
            tool: "catalyst".to_string(),
            plan_only: false,
            emit_plan: false,
        }
    }

    #[test]
    fn test_deploy_summary_renders_into_the_chosen_writer() {
        let outcome = RunOutcome::Planned {
            plan: DeploymentPlan {
                functions: vec!["checkout".to_string(), "cart".to_string()],
                client: true,
            },
        };

        let text = rendered(&outcome);
        assert!(text.contains("Functions: checkout, cart"));
        assert!(text.contains("Client:    Yes"));
    }

    #[test]
    fn test_deploy_summary_reports_failed_actions() {
        let outcome = RunOutcome::Completed {
            plan: DeploymentPlan {
                functions: vec!["checkout".to_string()],
                client: true,
            },
            report: DeploymentReport {
                actions: vec![
                    ActionOutcome {
                        target: DeployTarget::Functions(vec!["checkout".to_string()]),
                        success: false,
                        error: Some("deploy command failed: exit status: 1".to_string()),
                    },
                    ActionOutcome {
                        target: DeployTarget::Client,
                        success: true,
                        error: None,
                    },
                ],
            },
        };

        let text = rendered(&outcome);
        assert!(text.contains("❌ functions (checkout): deploy command failed"));
        assert!(text.contains("✅ client"));
        assert!(text.contains("💥 Deployment failed!"));
    }

    #[test]
    fn test_payload_defaults_to_the_ci_environment_channel() {
        let source = deploy_args().payload_source();
        assert!(matches!(source, PayloadSource::Env(name) if name == "commits"));
    }

    #[test]
    fn test_explicit_payload_overrides_the_environment_channel() {
        let args = DeployArgs {
            payload: Some("[]".to_string()),
            ..deploy_args()
        };
        assert!(matches!(args.payload_source(), PayloadSource::Inline(_)));
    }
}
