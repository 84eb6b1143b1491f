use std::sync::Arc;
use std::time::Duration;

use huddle_core::config::{AppConfig, ConfigError, LoadOptions};
use huddle_slack::client::HttpSlackClient;
use huddle_slack::events::EventRouter;
use huddle_slack::flows::FlowController;
use huddle_slack::mentions::MentionHandler;
use huddle_slack::socket::{DispatchLoop, ReconnectPolicy, WebSocketTransport};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub dispatch_loop: DispatchLoop<HttpSlackClient, HttpSlackClient>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[allow(dead_code)]
pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

/// Wires the application together: one Web API client shared by the mention
/// handler and the flow controller, one WebSocket transport owned by the
/// dispatch loop. Config is passed by ownership; nothing reads the process
/// environment after this point.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let chat = Arc::new(HttpSlackClient::new(config.slack.bot_token.clone()));
    let transport = Arc::new(WebSocketTransport::new(
        HttpSlackClient::new(config.slack.bot_token.clone()),
        config.slack.app_token.clone(),
    ));

    let router = EventRouter::new(
        MentionHandler::new(chat.clone(), chat.clone()),
        FlowController::new(chat, Duration::from_secs(config.socket.flow_ttl_secs)),
    );

    let reconnect_policy = ReconnectPolicy {
        max_retries: config.socket.reconnect_max_retries,
        base_delay_ms: config.socket.reconnect_base_delay_ms,
        max_delay_ms: config.socket.reconnect_max_delay_ms,
    };

    let dispatch_loop = DispatchLoop::new(transport, router, reconnect_policy);

    info!(event_name = "system.bootstrap.ready", "application bootstrap complete");
    Ok(Application { config, dispatch_loop })
}
