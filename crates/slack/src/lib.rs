//! Slack Integration - Socket Mode dispatch core
//!
//! This crate provides the Slack interface for huddle:
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack plus the
//!   serial dispatch loop and its acknowledgment discipline
//! - **Events** (`events`) - Typed envelope/event model and the exhaustive
//!   event router
//! - **Mentions** (`mentions`) - `@huddle` mention replies (greeting,
//!   weather stub, fallback)
//! - **Flows** (`flows`) - Two-step interactive exchanges (prompt →
//!   selection → confirmation) with a TTL-bounded registry
//! - **Blocks** (`blocks`) - Outbound message bodies (plain text and
//!   styled attachments with selectable options)
//! - **Client** (`client`) - Thin Web API client (`chat.postMessage`,
//!   `users.info`, `apps.connections.open`)
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode, subscribe to `app_mention`, add a slash command
//! 3. Set env vars: `HUDDLE_SLACK_APP_TOKEN`, `HUDDLE_SLACK_BOT_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! Socket Mode stream → DispatchLoop → EventRouter → Handlers
//!                          ↓ (ack per event type)        ↓
//!                      transport ←──────────── chat.postMessage
//! ```
//!
//! # Key Types
//!
//! - `DispatchLoop` - Serial envelope consumer with reconnect logic
//! - `EventRouter` - Exhaustive-match classifier over `SlackEvent`
//! - `FlowController` - Prompt/resolve halves of an interactive flow
//! - `ChatClient` / `UserDirectory` - Traits the handlers depend on

pub mod blocks;
pub mod client;
pub mod events;
pub mod flows;
pub mod mentions;
pub mod socket;
pub mod wire;
