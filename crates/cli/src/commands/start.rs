use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use mavbot_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig};
use mavbot_slack::{
    api::{SlackWebApi, SlackWebClient},
    events::EventDispatcher,
    socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport},
};
use tokio::sync::watch;
use tracing::{info, Level};

use crate::commands::{version::VERSION, CommandResult};

const COMMAND: &str = "start";

/// Flags accepted by `mavbot start`.
#[derive(Clone, Debug, Default)]
pub struct StartOptions {
    pub config_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

pub fn run(start: StartOptions) -> CommandResult {
    let log_format = match start.log_format.as_deref().map(str::parse::<LogFormat>).transpose() {
        Ok(log_format) => log_format,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let options = LoadOptions {
        require_file: start.config_path.is_some(),
        config_path: start.config_path,
        dotenv_path: Some(PathBuf::from(".env")),
        overrides: ConfigOverrides {
            log_level: start.log_level,
            log_format,
            ..ConfigOverrides::default()
        },
    };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    init_logging(&config.logging);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    match runtime.block_on(run_bot(config)) {
        Ok(()) => CommandResult::success(COMMAND, "socket mode listener stopped"),
        Err(error) => CommandResult::failure(COMMAND, "socket_mode", format!("{error:#}"), 1),
    }
}

async fn run_bot(config: AppConfig) -> Result<()> {
    info!(version = VERSION, "MAVBot started");

    let client = SlackWebClient::new(&config.slack.api_base_url, config.slack.bot_token.clone());
    let api: Arc<dyn SlackWebApi> = Arc::new(client.clone());
    let transport = Arc::new(WebSocketTransport::new(client, config.slack.app_token.clone()));
    let runner = SocketModeRunner::new(
        transport,
        EventDispatcher::new(api),
        ReconnectPolicy::from(&config.socket),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = runner.start(shutdown_rx);
    tokio::pin!(listener);

    tokio::select! {
        result = &mut listener => {
            result.context("socket mode listener stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutting down socketmode listener");
            shutdown_tx.send_replace(true);
            listener.await.context("socket mode listener failed during shutdown")?;
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when running inside tests.
    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
