use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quicktype_service::config::CaptureBackendKind;
use quicktype_service::{attach, Collaborators, Service, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "quicktype", version, about = "Typing assistant back-end service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Common {
    /// Service configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service
    Serve {
        #[command(flatten)]
        common: Common,

        /// Override the configured capture backend
        #[arg(long, value_enum)]
        capture: Option<CaptureBackendKind>,

        /// Rebuild every language store from its source
        #[arg(long)]
        rebuild: bool,
    },
    /// Attach a console presentation client to a running service
    Attach {
        #[command(flatten)]
        common: Common,
    },
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            common,
            capture,
            rebuild,
        } => {
            init_tracing(common.verbose)?;
            let config = ServiceConfig::load(common.config.as_deref())?;
            let backend = capture.unwrap_or(config.capture.backend);
            info!(
                endpoint = %config.ipc.endpoint,
                data_dir = %config.storage.data_dir().display(),
                settings = %config.storage.settings_path().display(),
                ?backend,
                rebuild,
                "starting quicktype service"
            );
            let collaborators = Collaborators::for_backend(backend)?;
            let service = Service::start(&config, collaborators, rebuild).await?;
            service.run().await
        }
        Command::Attach { common } => {
            init_tracing(common.verbose)?;
            let config = ServiceConfig::load(common.config.as_deref())?;
            let state = attach::run(&config.ipc).await?;
            info!(?state, "detached");
            Ok(())
        }
    }
}
