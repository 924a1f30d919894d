use crate::delivery::{DeliveryError, PostResponse, WebhookPoster};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Fake webhook client for testing
///
/// Each URL answers with the last status (or transport failure) configured
/// for it. URLs without a configured answer fail at the transport level.
#[derive(Debug, Default)]
pub struct FakeWebhookPoster {
    answers: Mutex<HashMap<String, Result<u16, String>>>,
    posted: Mutex<Vec<(String, Value)>>,
}

impl FakeWebhookPoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every post to `url` with `status_code`
    pub fn respond_with(&self, url: &str, status_code: u16) {
        self.answers
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(status_code));
    }

    /// Fail every post to `url` before a status is received
    pub fn fail_with(&self, url: &str, message: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(message.to_string()));
    }

    /// The URLs posted to, in order
    pub fn posted_urls(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// The payloads posted to `url`, in order
    pub fn payloads_for(&self, url: &str) -> Vec<Value> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .filter(|(posted, _)| posted == url)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl WebhookPoster for FakeWebhookPoster {
    async fn post_json(&self, url: &Url, payload: &Value) -> Result<PostResponse, DeliveryError> {
        self.posted
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));

        let answer = self
            .answers
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| Err(format!("no answer configured for {url}")));
        match answer {
            Ok(status_code) => Ok(PostResponse::from_status(status_code)),
            Err(message) => Err(DeliveryError::Transport {
                url: url.to_string(),
                source: message.into(),
            }),
        }
    }
}
