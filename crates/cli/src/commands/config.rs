use huddle_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "slack.app_token",
        &redact_token(config.slack.app_token.expose_secret()),
    ));
    lines.push(render_line(
        "slack.bot_token",
        &redact_token(config.slack.bot_token.expose_secret()),
    ));
    lines.push(render_line(
        "socket.reconnect_max_retries",
        &config.socket.reconnect_max_retries.to_string(),
    ));
    lines.push(render_line(
        "socket.reconnect_base_delay_ms",
        &config.socket.reconnect_base_delay_ms.to_string(),
    ));
    lines.push(render_line(
        "socket.reconnect_max_delay_ms",
        &config.socket.reconnect_max_delay_ms.to_string(),
    ));
    lines.push(render_line("socket.flow_ttl_secs", &config.socket.flow_ttl_secs.to_string()));
    lines.push(render_line("logging.level", &config.logging.level));
    lines.push(render_line("logging.format", &format!("{:?}", config.logging.format)));

    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("  {key} = {value}")
}

/// Keeps enough of the token to identify it, never enough to use it.
fn redact_token(token: &str) -> String {
    if token.is_empty() {
        return "(not set)".to_string();
    }
    let prefix: String = token.chars().take(9).collect();
    format!("{prefix}***")
}
