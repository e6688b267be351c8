//! Slack Socket Mode bot runtime.
//!
//! - **Socket Mode** (`socket`) - WebSocket loop with acknowledgements and reconnects
//! - **Events** (`events`) - typed envelopes, decoding and the dispatcher
//! - **Slash Commands** (`commands`) - `/hello` and `/was-this-article-useful`
//! - **Block Kit** (`blocks`) - attachment and section builders for replies
//! - **Web API** (`api`) - `users.info`, `chat.postMessage`, `apps.connections.open`
//!
//! ```text
//! Slack ─ws─> SocketModeRunner ─> EventDispatcher ─> handlers ─> SlackWebApi
//!                  ↑                                    │
//!                  └──────── ack (+ reply payload) ─────┘
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod socket;

#[cfg(test)]
mod testing;
