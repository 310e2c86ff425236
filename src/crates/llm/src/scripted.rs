//! Deterministic scripted client for tests.

use crate::client::LlmClient;
use crate::error::{LlmError, Result};
use crate::request::LlmRequest;
use crate::response::LlmResponse;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// An [`LlmClient`] that replays canned responses in order.
///
/// Each call to `generate` pops the next scripted text and parses it
/// through [`LlmResponse::from_raw`], so scripts exercise exactly the same
/// extraction path real backends do. When the queue is exhausted the client
/// either repeats the last response (`repeat_last`) or errors.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    repeat_last: bool,
    /// Prompts seen so far, for assertions on prompt construction.
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    /// Client that replays `responses` and then errors.
    pub fn new(responses: Vec<impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            repeat_last: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Client that replays `responses` and then keeps repeating the last one.
    pub fn repeating(responses: Vec<impl Into<String>>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(responses)
        }
    }

    /// All prompts passed to `generate`, in call order.
    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(request.prompt_text());

        let next = self.responses.lock().expect("responses lock").pop_front();
        let text = match next {
            Some(text) => {
                *self.last.lock().expect("last lock") = Some(text.clone());
                text
            }
            None if self.repeat_last => self
                .last
                .lock()
                .expect("last lock")
                .clone()
                .ok_or(LlmError::ScriptExhausted)?,
            None => return Err(LlmError::ScriptExhausted),
        };
        Ok(LlmResponse::from_raw(text))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
