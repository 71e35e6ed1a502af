use anyhow::Result;
use blueprintctl::config::{self, Config};
use blueprintctl::exec::require_binary;
use blueprintctl::report;
use blueprintctl::stages::Orchestrator;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blueprintctl")]
#[command(
    about = "Provision-and-verify CLI for Terraform blueprint stages on Google Cloud",
    long_about = "blueprintctl drives the Terraform stages of a Google Cloud foundation\ndeployment and verifies the provisioned resources through gcloud.\n\nFlow:\n  - Reads the projects state bucket from the 0-bootstrap stage\n  - Reads the per-application service account and backend bucket from the\n    shared 4-projects stage (impersonated for all downstream calls)\n  - Provisions and verifies the 5-app-infra stage per environment, in parallel"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BLUEPRINTCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = ".blueprintctl.toml")]
        output: PathBuf,
    },
    /// Print the terraform outputs of a stage
    ///
    /// STAGE is 'bootstrap', 'shared', or a directory relative to the
    /// foundation root (e.g. 5-app-infra/business_unit_1/development)
    Outputs {
        stage: String,
    },
    /// Verify already-provisioned app-infra environments (no apply/destroy)
    Verify {
        /// Environments to verify (default: all configured)
        #[arg(short, long)]
        env: Vec<String>,
    },
    /// Full lifecycle: apply, vet, verify, destroy per environment
    Test {
        /// Environments to test (default: all configured)
        #[arg(short, long)]
        env: Vec<String>,
    },
    /// Destroy app-infra in the selected environments
    Destroy {
        /// Environments to destroy (default: all configured)
        #[arg(short, long)]
        env: Vec<String>,
    },
}

fn selected_envs(requested: Vec<String>, config: &Config) -> Vec<String> {
    if requested.is_empty() {
        config.foundation.environments.clone()
    } else {
        requested
    }
}

fn resolve_stage_dir(stage: &str, config: &Config) -> PathBuf {
    match stage {
        "bootstrap" => config.bootstrap_dir(),
        "shared" => config.shared_dir(),
        other => {
            let path = PathBuf::from(other);
            if path.is_absolute() {
                path
            } else {
                config.foundation_root().join(path)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging - suppress INFO by default, only show warnings and errors
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { output } => {
            config::init_config(&output)?;
        }
        Commands::Outputs { stage } => {
            require_binary(&config.terraform.binary)?;
            let stage_dir = resolve_stage_dir(&stage, &config);
            let orchestrator = Orchestrator::new(config);
            let values = orchestrator.stage_outputs(&stage_dir)?;
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        Commands::Verify { env } => {
            require_binary(&config.terraform.binary)?;
            require_binary(&config.gcloud.binary)?;
            let envs = selected_envs(env, &config);
            let orchestrator = Orchestrator::new(config);
            let outcomes = orchestrator.verify(&envs).await?;
            if !report::render(&outcomes, &cli.output)? {
                anyhow::bail!("verification failed");
            }
        }
        Commands::Test { env } => {
            require_binary(&config.terraform.binary)?;
            require_binary(&config.gcloud.binary)?;
            let envs = selected_envs(env, &config);
            let orchestrator = Orchestrator::new(config);
            let outcomes = orchestrator.test(&envs).await?;
            if !report::render(&outcomes, &cli.output)? {
                anyhow::bail!("verification failed");
            }
        }
        Commands::Destroy { env } => {
            require_binary(&config.terraform.binary)?;
            let envs = selected_envs(env, &config);
            let orchestrator = Orchestrator::new(config);
            let outcomes = orchestrator.destroy(&envs).await?;
            for outcome in &outcomes {
                if let Err(e) = &outcome.result {
                    anyhow::bail!("destroy failed in {}: {}", outcome.environment, e);
                }
            }
            if cli.output != "json" {
                println!("Destroyed app-infra in: {}", envs.join(", "));
            }
        }
    }

    Ok(())
}
