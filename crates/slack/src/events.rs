use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    api::{ApiError, PostedMessage, SlackWebApi},
    blocks::{self, MessagePayload},
    commands::{CommandReply, CommandRouteError, CommandRouter, SlashCommandPayload},
};

/// Layout of the `Date` field on every reply.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    AppMention(AppMentionEvent),
    SlashCommand(SlashCommandPayload),
    Interaction(InteractionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::Interaction(_) => SlackEventType::Interaction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Slash commands and interactions are acknowledged after dispatch so the
    /// acknowledgement can carry the reply; everything else is acknowledged on
    /// arrival.
    pub fn acknowledges_before_dispatch(&self) -> bool {
        matches!(self, Self::AppMention(_) | Self::Unsupported { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlackEventType {
    AppMention,
    SlashCommand,
    Interaction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AppMentionEvent {
    #[serde(rename = "channel")]
    pub channel_id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionEvent {
    pub interaction_type: String,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    pub actions: Vec<BlockAction>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockAction {
    pub action_id: String,
    pub block_id: String,
    pub action_type: String,
    pub selected_options: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
    pub received_at: NaiveDateTime,
}

impl EventContext {
    pub fn received_now(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into(), received_at: Local::now().naive_local() }
    }

    pub fn timestamp(&self) -> String {
        self.received_at.format(DATE_FORMAT).to_string()
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self::received_now("unknown-correlation-id")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// Reply was sent with `chat.postMessage`.
    Posted(PostedMessage),
    /// Reply must be attached to the envelope acknowledgement.
    Acknowledge(MessagePayload),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("user lookup for `{user_id}` failed: {source}")]
    UserLookup {
        user_id: String,
        #[source]
        source: ApiError,
    },
    #[error("failed to post mention reply to `{channel_id}`: {source}")]
    PostMessage {
        channel_id: String,
        #[source]
        source: ApiError,
    },
    #[error(transparent)]
    Route(#[from] CommandRouteError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

pub struct EventDispatcher {
    mentions: MentionHandler,
    commands: CommandRouter,
    interactions: InteractionHandler,
}

impl EventDispatcher {
    pub fn new(api: Arc<dyn SlackWebApi>) -> Self {
        Self {
            mentions: MentionHandler::new(api.clone()),
            commands: CommandRouter::new(api),
            interactions: InteractionHandler,
        }
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let result = match &envelope.event {
            SlackEvent::AppMention(event) => {
                self.mentions.handle(event, ctx).await.map(HandlerResult::Posted)?
            }
            SlackEvent::SlashCommand(payload) => {
                match self.commands.route(payload, ctx).await.map_err(EventHandlerError::from)? {
                    CommandReply::Posted(posted) => HandlerResult::Posted(posted),
                    CommandReply::Acknowledge(message) => HandlerResult::Acknowledge(message),
                }
            }
            SlackEvent::Interaction(event) => {
                self.interactions.handle(event, ctx);
                HandlerResult::Processed
            }
            SlackEvent::Unsupported { event_type } => {
                debug!(
                    correlation_id = %ctx.correlation_id,
                    event_type = %event_type,
                    "ignoring unsupported slack event"
                );
                HandlerResult::Ignored
            }
        };

        Ok(result)
    }
}

pub struct MentionHandler {
    api: Arc<dyn SlackWebApi>,
}

impl MentionHandler {
    pub fn new(api: Arc<dyn SlackWebApi>) -> Self {
        Self { api }
    }

    pub async fn handle(
        &self,
        event: &AppMentionEvent,
        ctx: &EventContext,
    ) -> Result<PostedMessage, EventHandlerError> {
        let user = self.api.user_info(&event.user_id).await.map_err(|source| {
            EventHandlerError::UserLookup { user_id: event.user_id.clone(), source }
        })?;

        let attachment = blocks::mention_reply(&user.name, &event.text, &ctx.timestamp());
        self.api
            .post_message(&event.channel_id, &MessagePayload::from_attachment(attachment))
            .await
            .map_err(|source| EventHandlerError::PostMessage {
                channel_id: event.channel_id.clone(),
                source,
            })
    }
}

/// Records interactive callbacks. Nothing is sent back.
pub struct InteractionHandler;

impl InteractionHandler {
    pub fn handle(&self, event: &InteractionEvent, ctx: &EventContext) {
        let action_ids =
            event.actions.iter().map(|action| action.action_id.as_str()).collect::<Vec<_>>();
        info!(
            correlation_id = %ctx.correlation_id,
            interaction_type = %event.interaction_type,
            action_ids = %action_ids.join(","),
            user_id = event.user_id.as_deref().unwrap_or("unknown"),
            "interactive callback received"
        );

        if event.interaction_type != "block_actions" {
            return;
        }

        for action in &event.actions {
            info!(
                correlation_id = %ctx.correlation_id,
                action_id = %action.action_id,
                block_id = %action.block_id,
                action_type = %action.action_type,
                selected_options = ?action.selected_options,
                "block action selection"
            );
        }
    }
}

/// Decodes the `payload` of a socket envelope into a [`SlackEvent`].
///
/// Payloads that do not match the expected shape come back as
/// [`SlackEvent::Unsupported`] so the caller can log and skip them.
pub fn decode_event(envelope_type: &str, payload: Value) -> SlackEvent {
    match envelope_type {
        "events_api" => decode_events_api(payload),
        "slash_commands" => match serde_json::from_value::<SlashCommandPayload>(payload) {
            Ok(command) => SlackEvent::SlashCommand(command),
            Err(error) => undecodable(envelope_type, &error),
        },
        "interactive" => match serde_json::from_value::<RawInteraction>(payload) {
            Ok(interaction) => SlackEvent::Interaction(interaction.into()),
            Err(error) => undecodable(envelope_type, &error),
        },
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    }
}

fn decode_events_api(payload: Value) -> SlackEvent {
    let callback = match serde_json::from_value::<RawEventCallback>(payload) {
        Ok(callback) => callback,
        Err(error) => return undecodable("events_api", &error),
    };

    if callback.callback_type != "event_callback" {
        return SlackEvent::Unsupported { event_type: callback.callback_type };
    }

    let inner_type = callback
        .event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_owned();
    if inner_type != "app_mention" {
        return SlackEvent::Unsupported { event_type: inner_type };
    }

    match serde_json::from_value::<AppMentionEvent>(callback.event) {
        Ok(event) => SlackEvent::AppMention(event),
        Err(error) => undecodable("app_mention", &error),
    }
}

fn undecodable(event_type: &str, error: &serde_json::Error) -> SlackEvent {
    warn!(event_type, error = %error, "could not decode slack event payload");
    SlackEvent::Unsupported { event_type: event_type.to_owned() }
}

#[derive(Debug, Deserialize)]
struct RawEventCallback {
    #[serde(rename = "type")]
    callback_type: String,
    #[serde(default)]
    event: Value,
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    #[serde(rename = "type")]
    interaction_type: String,
    #[serde(default)]
    user: Option<RawIdRef>,
    #[serde(default)]
    channel: Option<RawIdRef>,
    #[serde(default)]
    actions: Vec<RawBlockAction>,
}

#[derive(Debug, Deserialize)]
struct RawIdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawBlockAction {
    action_id: String,
    #[serde(default)]
    block_id: String,
    #[serde(rename = "type", default)]
    action_type: String,
    #[serde(default)]
    selected_options: Vec<RawSelectedOption>,
    #[serde(default)]
    selected_option: Option<RawSelectedOption>,
}

#[derive(Debug, Deserialize)]
struct RawSelectedOption {
    value: String,
}

impl From<RawInteraction> for InteractionEvent {
    fn from(raw: RawInteraction) -> Self {
        Self {
            interaction_type: raw.interaction_type,
            user_id: raw.user.map(|user| user.id),
            channel_id: raw.channel.map(|channel| channel.id),
            actions: raw.actions.into_iter().map(BlockAction::from).collect(),
        }
    }
}

impl From<RawBlockAction> for BlockAction {
    fn from(raw: RawBlockAction) -> Self {
        let selected_options = raw
            .selected_options
            .into_iter()
            .chain(raw.selected_option)
            .map(|option| option.value)
            .collect();
        Self {
            action_id: raw.action_id,
            block_id: raw.block_id,
            action_type: raw.action_type,
            selected_options,
        }
    }
}
