use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use promptcraft::assistant::{Assistant, GenerateOptions};
use promptcraft::backend::{CompletionBackend, FragmentStream};
use promptcraft::catalog::InMemoryCatalog;
use promptcraft::errors::AssistError;
use promptcraft::locale::User;
use promptcraft::prompt::{GenerationParams, LocalizedPrompt, Message, PromptDefinition, PromptRef, PromptType};
use promptcraft::utils::printing::TerminalSink;

const CHANNEL: &str = "/ai-helper/stream-suggestion";

const INPUT: &str = "Teh quick brown fox jumpd over the lazy dog. It was't tired at all.";

const ANSWER: &str = r#"<output>
# Proofread

The quick brown fox **jumped** over the lazy dog. It `wasn't` tired at all.

* fixed *Teh*
* fixed *jumpd*
* fixed *was't*
</output>"#;

/// Plays back a canned answer one character at a time.
struct CannedBackend {
    answer: &'static str,
    delay: Duration,
}

#[async_trait]
impl CompletionBackend for CannedBackend {
    async fn complete(&self, _prompt: &LocalizedPrompt, _params: &GenerationParams) -> Result<String, AssistError> {
        Ok(self.answer.to_string())
    }

    async fn stream(&self,
                    _prompt: &LocalizedPrompt,
                    _params: &GenerationParams,
                    cancel: CancellationToken) -> Result<FragmentStream, AssistError> {
        let delay = self.delay;
        let fragments = stream::iter(self.answer.chars())
            .then(move |c| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, AssistError>(c.to_string())
            })
            .take_until(async move { cancel.cancelled().await })
            .boxed();
        Ok(fragments)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    // Ctrl-C publishes what has been written so far instead of killing the viewer mid-drawing
    ctrlc::set_handler(move || on_interrupt.cancel())?;

    let user = User::new(1);
    let proofread = PromptDefinition::new(1, "proofread", PromptType::Simple, vec![
        Message::system("You are a proofreader. Answer in Markdown inside <output> tags."),
    ]);
    let backend = Arc::new(CannedBackend { answer: ANSWER, delay: Duration::from_millis(30) });
    let sink = Arc::new(TerminalSink::new(CHANNEL).for_recipient(user.id));
    let assistant = Assistant::new("demo", backend, Arc::new(InMemoryCatalog::new(vec![proofread])), sink);

    let outcome = assistant
        .stream(PromptRef::Name("proofread".into()), INPUT, &user, CHANNEL, &GenerateOptions::default(), cancel)
        .await?;
    if outcome.cancelled {
        println!("(interrupted after {} partial updates)", outcome.partial_publishes);
    }
    Ok(())
}
