use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    api::{ApiError, PostedMessage, SlackWebApi},
    blocks::{self, MessagePayload},
    events::EventContext,
};

pub const HELLO_COMMAND: &str = "/hello";
pub const ARTICLE_FEEDBACK_COMMAND: &str = "/was-this-article-useful";

/// Slash command fields as delivered in a `slash_commands` socket envelope.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlashCommand {
    Hello { text: String },
    WasThisArticleUseful,
    Unknown { command: String },
}

/// What the router did with a command: either the reply already went out via
/// `chat.postMessage`, or it has to ride on the envelope acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandReply {
    Posted(PostedMessage),
    Acknowledge(MessagePayload),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("failed to post reply for `{command}`: {source}")]
    PostMessage {
        command: String,
        #[source]
        source: ApiError,
    },
}

pub fn parse_slash_command(payload: &SlashCommandPayload) -> SlashCommand {
    match payload.command.as_str() {
        HELLO_COMMAND => SlashCommand::Hello { text: payload.text.clone() },
        ARTICLE_FEEDBACK_COMMAND => SlashCommand::WasThisArticleUseful,
        other => SlashCommand::Unknown { command: other.to_owned() },
    }
}

pub struct CommandRouter {
    api: Arc<dyn SlackWebApi>,
}

impl CommandRouter {
    pub fn new(api: Arc<dyn SlackWebApi>) -> Self {
        Self { api }
    }

    pub async fn route(
        &self,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<CommandReply, CommandRouteError> {
        match parse_slash_command(payload) {
            SlashCommand::Hello { text } => {
                let attachment =
                    blocks::hello_command_reply(&payload.user_name, &text, &ctx.timestamp());
                let posted = self
                    .api
                    .post_message(&payload.channel_id, &MessagePayload::from_attachment(attachment))
                    .await
                    .map_err(|source| CommandRouteError::PostMessage {
                        command: payload.command.clone(),
                        source,
                    })?;
                debug!(
                    correlation_id = %ctx.correlation_id,
                    channel_id = %payload.channel_id,
                    ts = %posted.ts,
                    "posted /hello reply"
                );
                Ok(CommandReply::Posted(posted))
            }
            SlashCommand::WasThisArticleUseful => Ok(CommandReply::Acknowledge(
                MessagePayload::from_attachment(blocks::article_feedback_prompt()),
            )),
            SlashCommand::Unknown { command } => {
                info!(
                    correlation_id = %ctx.correlation_id,
                    command = %command,
                    user_id = %payload.user_id,
                    "unknown slash command"
                );
                Ok(CommandReply::Acknowledge(MessagePayload::from_attachment(
                    blocks::unknown_command_reply(&command),
                )))
            }
        }
    }
}
