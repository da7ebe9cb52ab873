use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ctxmon::config::{Command, Config, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug);

    match cli.command.clone().unwrap_or_default() {
        Command::Daemon { .. } => {
            let mut settings = Settings::load(cli.config.as_ref())?;
            settings.merge_cli(&cli);
            settings.validate();
            ctxmon::daemon::run(settings).await
        }
        Command::Status => {
            // The status line must always print, even with a broken config
            let mut settings = Settings::load(cli.config.as_ref()).unwrap_or_else(|e| {
                tracing::warn!("Using default settings: {:#}", e);
                Settings::default()
            });
            settings.merge_cli(&cli);
            settings.validate();
            ctxmon::reporter::run(&settings, cli.config.as_deref());
            Ok(())
        }
    }
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("ctxmon=debug,ctxmon_core=debug,tower_http=debug")
    } else {
        EnvFilter::new("ctxmon=info,ctxmon_core=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
