//! Scripted providers for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use contentcurator_shared::{ProviderError, ProviderErrorKind};

use crate::provider::{AiProvider, PromptOptions, ProviderResponse};

/// Answers with a queue of canned results, recording every request.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderErrorKind>>>,
    fallback: Option<String>,
    pub calls: Mutex<Vec<(String, PromptOptions)>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderErrorKind>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, o)| o.model.clone().unwrap_or_default())
            .collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    async fn prompt(
        &self,
        text: &str,
        options: &PromptOptions,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_owned(), options.clone()));

        let next = self.replies.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => reply,
            None => Ok(self.fallback.clone().unwrap_or_default()),
        };

        match reply {
            Ok(content) => Ok(ProviderResponse {
                content,
                input_tokens: 1000,
                output_tokens: 500,
                cost_usd: Some(0.01),
            }),
            Err(kind) => Err(ProviderError {
                message: format!("scripted {} failure", kind.as_str()),
                kind,
                provider: options.provider.clone().unwrap_or_default(),
                model: options.model.clone().unwrap_or_default(),
            }),
        }
    }
}

/// Answers every prompt with the document embedded in it, unchanged.
#[derive(Default)]
pub struct EchoProvider {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl AiProvider for EchoProvider {
    async fn prompt(
        &self,
        text: &str,
        _options: &PromptOptions,
    ) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        let start = text.find("<document>\n").map_or(0, |i| i + "<document>\n".len());
        let end = text.rfind("\n</document>").unwrap_or(text.len());
        Ok(ProviderResponse::from_text(text, &text[start..end]))
    }
}
