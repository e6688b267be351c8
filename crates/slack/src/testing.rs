use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    api::{ApiError, PostedMessage, SlackUser, SlackWebApi},
    blocks::MessagePayload,
    events::EventContext,
};

impl EventContext {
    /// Context pinned to 2024-05-01 09:30:00.
    pub fn fixed(correlation_id: &str) -> Self {
        let received_at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .expect("valid fixed timestamp");
        Self { correlation_id: correlation_id.to_owned(), received_at }
    }
}

/// In-memory [`SlackWebApi`] that records every call.
#[derive(Default)]
pub struct RecordingSlackApi {
    users: HashMap<String, String>,
    post_error: Option<String>,
    posts: Mutex<Vec<(String, MessagePayload)>>,
    lookups: Mutex<Vec<String>>,
}

impl RecordingSlackApi {
    pub fn failing_posts(error: &str) -> Self {
        Self { post_error: Some(error.to_owned()), ..Self::default() }
    }

    pub fn with_user(mut self, user_id: &str, name: &str) -> Self {
        self.users.insert(user_id.to_owned(), name.to_owned());
        self
    }

    pub fn posts(&self) -> Vec<(String, MessagePayload)> {
        self.posts.lock().expect("posts lock").clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("lookups lock").clone()
    }
}

#[async_trait]
impl SlackWebApi for RecordingSlackApi {
    async fn user_info(&self, user_id: &str) -> Result<SlackUser, ApiError> {
        self.lookups.lock().expect("lookups lock").push(user_id.to_owned());
        match self.users.get(user_id) {
            Some(name) => Ok(SlackUser { id: user_id.to_owned(), name: name.clone() }),
            None => Err(ApiError::Slack {
                method: "users.info".to_owned(),
                error: "user_not_found".to_owned(),
            }),
        }
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessagePayload,
    ) -> Result<PostedMessage, ApiError> {
        if let Some(error) = &self.post_error {
            return Err(ApiError::Slack {
                method: "chat.postMessage".to_owned(),
                error: error.clone(),
            });
        }

        let mut posts = self.posts.lock().expect("posts lock");
        posts.push((channel_id.to_owned(), message.clone()));
        Ok(PostedMessage {
            channel_id: channel_id.to_owned(),
            ts: format!("1700000000.{:06}", posts.len()),
        })
    }
}
