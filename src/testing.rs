//! Test doubles for the collaborators of [Assistant](crate::assistant::Assistant).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use crate::backend::{CompletionBackend, FragmentStream};
use crate::catalog::{CatalogFilter, CatalogStore, InMemoryCatalog};
use crate::errors::AssistError;
use crate::prompt::{GenerationParams, LocalizedPrompt, PromptDefinition, PromptRef};
use crate::streaming::{PublishSink, StreamPayload};

/// Records every publish in order.
#[derive(Default)]
pub(crate) struct RecordingSink {
    published: Mutex<Vec<(String, StreamPayload, Vec<u64>)>>,
}

impl RecordingSink {
    pub fn payloads(&self) -> Vec<StreamPayload> {
        self.published.lock().unwrap().iter().map(|(_, payload, _)| payload.clone()).collect()
    }

    /// Distinct `(channel, recipients)` pairs, in order of first use.
    pub fn targets_deduped(&self) -> Vec<(String, Vec<u64>)> {
        let mut targets: Vec<(String, Vec<u64>)> = Vec::new();
        for (channel, _, recipients) in self.published.lock().unwrap().iter() {
            if !targets.iter().any(|(c, r)| c == channel && r == recipients) {
                targets.push((channel.clone(), recipients.clone()));
            }
        }
        targets
    }
}

impl PublishSink for RecordingSink {
    fn publish(&self, channel: &str, payload: &StreamPayload, recipients: &[u64]) {
        self.published.lock().unwrap().push((channel.to_string(), payload.clone(), recipients.to_vec()));
    }
}

/// What a [ScriptedBackend] answers with.
pub(crate) enum Script {
    Text(String),
    Fragments(Vec<String>),
    Fail(fn() -> AssistError),
}

/// A backend answering from a script and remembering what it was asked.
pub(crate) struct ScriptedBackend {
    script: Script,
    calls: AtomicUsize,
    last_request: Mutex<Option<(LocalizedPrompt, GenerationParams)>>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(Script::Text(text.to_string()))
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        Self::new(Script::Fragments(fragments.iter().map(|f| f.to_string()).collect()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<LocalizedPrompt> {
        self.last_request.lock().unwrap().as_ref().map(|(prompt, _)| prompt.clone())
    }

    pub fn last_params(&self) -> Option<GenerationParams> {
        self.last_request.lock().unwrap().as_ref().map(|(_, params)| params.clone())
    }

    fn record(&self, prompt: &LocalizedPrompt, params: &GenerationParams) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((prompt.clone(), params.clone()));
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &LocalizedPrompt, params: &GenerationParams) -> Result<String, AssistError> {
        self.record(prompt, params);
        match &self.script {
            Script::Text(text) => Ok(text.clone()),
            Script::Fragments(fragments) => Ok(fragments.concat()),
            Script::Fail(error) => Err(error()),
        }
    }

    async fn stream(&self,
                    prompt: &LocalizedPrompt,
                    params: &GenerationParams,
                    _cancel: CancellationToken) -> Result<FragmentStream, AssistError> {
        self.record(prompt, params);
        let fragments = match &self.script {
            Script::Text(text) => vec![text.clone()],
            Script::Fragments(fragments) => fragments.clone(),
            Script::Fail(error) => return Err(error()),
        };
        Ok(stream::iter(fragments.into_iter().map(Ok)).boxed())
    }
}

/// A catalog store that takes its time and counts how often it is asked.
pub(crate) struct SlowCatalog {
    inner: InMemoryCatalog,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl SlowCatalog {
    pub fn new(prompts: Vec<PromptDefinition>, delay: Duration) -> Self {
        Self {
            inner: InMemoryCatalog::new(prompts),
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogStore for SlowCatalog {
    async fn enabled_prompts(&self, filter: &CatalogFilter) -> anyhow::Result<Vec<Arc<PromptDefinition>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.enabled_prompts(filter).await
    }

    async fn find(&self, prompt: &PromptRef) -> anyhow::Result<Option<Arc<PromptDefinition>>> {
        self.inner.find(prompt).await
    }
}

/// A catalog store that is always down.
pub(crate) struct BrokenCatalog;

#[async_trait]
impl CatalogStore for BrokenCatalog {
    async fn enabled_prompts(&self, _filter: &CatalogFilter) -> anyhow::Result<Vec<Arc<PromptDefinition>>> {
        anyhow::bail!("catalog store is unreachable")
    }

    async fn find(&self, _prompt: &PromptRef) -> anyhow::Result<Option<Arc<PromptDefinition>>> {
        anyhow::bail!("catalog store is unreachable")
    }
}
