pub mod config;
pub mod console;
pub mod joystick;
pub mod rig;
pub mod stepper;

use crate::config::{AppConfig, ConfigSource};
use crate::rig::RigHandle;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let (config, source) = AppConfig::load().await?;
    setup_logging(config.logging.level()?);
    match &source {
        ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigSource::Defaults(path) => warn!(
            "No configuration at {}, using defaults",
            path.display()
        ),
    }

    let mut rig = RigHandle::spawn(&config).map_err(|e| eyre!("Failed to start rig: {}", e))?;

    let console = console::run_console(rig.commands(), rig.subscribe());
    tokio::select! {
        result = console => {
            if let Err(e) = result {
                warn!("Console stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    rig.shutdown()
        .await
        .map_err(|e| eyre!("Failed to shut down rig: {}", e))?;
    info!("Bye");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
