//! # Streaming
//! Turns the fragments of one streamed completion into throttled publishes.
//!
//! A [StreamState] is folded over the fragment sequence. Each fragment is appended to the accumulated text, the
//! inline diff is recomputed against the whole sanitized text so far (for [PromptType::Diff] prompts), and a partial
//! publish is emitted when [should_flush] allows it. After the last fragment exactly one terminal publish with
//! `done: true` follows, unless the sanitized result is empty.

use std::time::{Duration, Instant};
use futures::StreamExt;
use log::{debug, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use crate::backend::FragmentStream;
use crate::config::ThrottleConfig;
use crate::errors::AssistError;
use crate::prompt::PromptType;
use crate::utils::diff::inline_diff;
use crate::utils::postprocess::markup::{sanitize, sanitize_partial};

/// What viewers of a channel receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamPayload {
    pub result: String,
    pub diff: Option<String>,
    pub done: bool,
}

/// Pushes payloads to the viewers of a channel. Fire-and-forget.
pub trait PublishSink: Send + Sync {
    fn publish(&self, channel: &str, payload: &StreamPayload, recipients: &[u64]);
}

/// Where the publishes of one request go: a channel, visible only to the requesting user.
#[derive(Clone, Copy)]
pub struct PublishTarget<'a> {
    pub sink: &'a dyn PublishSink,
    pub channel: &'a str,
    pub recipient: u64,
}

impl PublishTarget<'_> {
    fn publish(&self, payload: &StreamPayload) {
        self.sink.publish(self.channel, payload, &[self.recipient]);
    }
}

/// Whether accumulated text of `buffer_chars` characters should be published `since_last_flush` after the previous
/// publish.
pub fn should_flush(buffer_chars: usize, since_last_flush: Duration, throttle: &ThrottleConfig) -> bool {
    throttle.flush_always || (buffer_chars > throttle.min_chars && since_last_flush >= throttle.min_interval())
}

/// The immutable side of a streaming request.
#[derive(Debug, Clone, Copy)]
pub struct StreamContext<'a> {
    /// Text the prompt was applied to. Diffs are computed against it.
    pub input: &'a str,
    pub prompt_type: PromptType,
    pub throttle: &'a ThrottleConfig,
}

/// Mutable state of one in-flight streaming request.
#[derive(Debug)]
#[readonly::make]
pub struct StreamState {
    #[readonly]
    pub accumulated: String,
    accumulated_chars: usize,
    #[readonly]
    pub last_diff: Option<String>,
    last_flush: Instant,
    #[readonly]
    pub partial_publishes: usize,
    #[readonly]
    pub done: bool,
}

impl StreamState {
    pub fn new(started: Instant) -> Self {
        Self {
            accumulated: String::new(),
            accumulated_chars: 0,
            last_diff: None,
            last_flush: started,
            partial_publishes: 0,
            done: false,
        }
    }

    /// Fold one fragment into the state. Returns the partial payload to publish, if this fragment triggers a flush.
    pub fn push_fragment(&mut self, fragment: &str, context: &StreamContext, now: Instant) -> Option<StreamPayload> {
        if self.done {
            return None;
        }
        self.accumulated.push_str(fragment);
        self.accumulated_chars += fragment.chars().count();
        let visible = sanitize_partial(&self.accumulated);
        if context.prompt_type == PromptType::Diff {
            self.last_diff = Some(inline_diff(context.input, &visible));
        }

        let since_last_flush = now.saturating_duration_since(self.last_flush);
        if !should_flush(self.accumulated_chars, since_last_flush, context.throttle) {
            return None;
        }
        self.last_flush = now;
        self.partial_publishes += 1;
        debug!("flushing partial result of {} chars", self.accumulated_chars);
        Some(StreamPayload {
            result: visible,
            diff: self.last_diff.clone(),
            done: false,
        })
    }

    /// Close the stream. Returns the terminal payload the first time it is called, provided the sanitized result is
    /// not empty. Later calls return `None`.
    pub fn finish(&mut self, context: &StreamContext) -> Option<StreamPayload> {
        if self.done {
            return None;
        }
        self.done = true;
        let result = sanitize(&self.accumulated);
        if result.is_empty() {
            return None;
        }
        let diff = match context.prompt_type {
            PromptType::Diff => Some(inline_diff(context.input, &result)),
            _ => None,
        };
        Some(StreamPayload { result, diff, done: true })
    }
}

/// Summary of a finished streaming request.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    /// Sanitized final text, empty when the model produced nothing visible.
    pub result: String,
    pub partial_publishes: usize,
    pub terminal_published: bool,
    pub cancelled: bool,
}

/// Consume `fragments` in order, publishing partial and terminal payloads to `target`.
///
/// Cancelling stops consumption; whatever was accumulated so far is still published as the terminal payload.
/// A backend error ends the request without a terminal publish, leaving viewers with the last partial state.
pub async fn drive_stream(mut fragments: FragmentStream,
                          cancel: &CancellationToken,
                          context: &StreamContext<'_>,
                          target: &PublishTarget<'_>) -> Result<StreamOutcome, AssistError> {
    let mut state = StreamState::new(Instant::now());
    let mut cancelled = false;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = fragments.next() => Some(next),
        };
        match next {
            None => {
                warn!("stream to {} cancelled after {} chars", target.channel, state.accumulated.len());
                cancelled = true;
                break;
            }
            Some(None) => break,
            Some(Some(Ok(fragment))) => {
                if let Some(payload) = state.push_fragment(&fragment, context, Instant::now()) {
                    target.publish(&payload);
                }
            }
            Some(Some(Err(err))) => {
                if state.partial_publishes > 0 {
                    warn!("stream to {} failed after {} partial publishes: {}", target.channel, state.partial_publishes, err);
                }
                return Err(err);
            }
        }
    }
    // the producer stops once its stream is dropped
    drop(fragments);

    let terminal = state.finish(context);
    let terminal_published = terminal.is_some();
    let result = match terminal {
        Some(payload) => {
            target.publish(&payload);
            payload.result
        }
        None => String::new(),
    };
    Ok(StreamOutcome {
        result,
        partial_publishes: state.partial_publishes,
        terminal_published,
        cancelled,
    })
}

#[cfg(test)]
mod test_streaming {
    use std::time::{Duration, Instant};
    use futures::stream;
    use futures::StreamExt;
    use tokio_util::sync::CancellationToken;
    use super::{drive_stream, should_flush, PublishTarget, StreamContext, StreamState};
    use crate::config::ThrottleConfig;
    use crate::errors::AssistError;
    use crate::prompt::PromptType;
    use crate::testing::RecordingSink;

    fn fragments(parts: &[&str]) -> crate::backend::FragmentStream {
        let parts: Vec<Result<String, AssistError>> = parts.iter().map(|p| Ok(p.to_string())).collect();
        stream::iter(parts).boxed()
    }

    #[test]
    fn test_should_flush() {
        let throttle = ThrottleConfig::default();
        let enough_time = Duration::from_millis(300);
        assert!(should_flush(11, enough_time, &throttle));
        assert!(!should_flush(10, enough_time, &throttle));
        assert!(!should_flush(11, Duration::from_millis(299), &throttle));
        let always = ThrottleConfig { flush_always: true, ..ThrottleConfig::default() };
        assert!(should_flush(0, Duration::ZERO, &always));
    }

    #[test]
    fn test_push_fragment_throttles_by_time_and_length() {
        let throttle = ThrottleConfig::default();
        let context = StreamContext { input: "", prompt_type: PromptType::Simple, throttle: &throttle };
        let start = Instant::now();
        let mut state = StreamState::new(start);

        assert!(state.push_fragment("Hello", &context, start + Duration::from_secs(1)).is_none(), "too short");
        assert!(state.push_fragment(" world!", &context, start + Duration::from_millis(1100)).is_some());
        assert!(state.push_fragment(" More", &context, start + Duration::from_millis(1200)).is_none(), "too soon");
        let payload = state.push_fragment(" text", &context, start + Duration::from_millis(1400)).unwrap();
        assert_eq!("Hello world! More text", payload.result);
        assert!(!payload.done);
        assert_eq!(2, state.partial_publishes);
    }

    #[test]
    fn test_finish_only_once() {
        let throttle = ThrottleConfig::default();
        let context = StreamContext { input: "", prompt_type: PromptType::Simple, throttle: &throttle };
        let mut state = StreamState::new(Instant::now());
        state.push_fragment("<result>done</result>", &context, Instant::now());
        let terminal = state.finish(&context).unwrap();
        assert_eq!("done", terminal.result);
        assert!(terminal.done);
        assert!(state.finish(&context).is_none());
        assert!(state.push_fragment("late", &context, Instant::now()).is_none());
    }

    #[tokio::test]
    async fn test_diff_stream_with_immediate_flush() {
        let throttle = ThrottleConfig { flush_always: true, ..ThrottleConfig::default() };
        let context = StreamContext { input: "The cat sat.", prompt_type: PromptType::Diff, throttle: &throttle };
        let sink = RecordingSink::default();
        let target = PublishTarget { sink: &sink, channel: "/ai-helper/stream", recipient: 7 };

        let outcome = drive_stream(fragments(&["The ", "dog ", "sat."]), &CancellationToken::new(), &context, &target)
            .await
            .unwrap();

        let published = sink.payloads();
        assert_eq!(4, published.len());
        let terminal = published.last().unwrap();
        assert!(terminal.done);
        assert_eq!("The dog sat.", terminal.result);
        let diff = terminal.diff.as_deref().unwrap();
        assert!(diff.contains("<del>cat</del><ins>dog</ins>"), "{}", diff);
        assert_eq!(1, published.iter().filter(|p| p.done).count());
        assert_eq!(vec![(String::from("/ai-helper/stream"), vec![7])], sink.targets_deduped());
        assert_eq!(3, outcome.partial_publishes);
        assert!(outcome.terminal_published);
    }

    #[tokio::test]
    async fn test_diff_never_shows_wrapper_tags() {
        let throttle = ThrottleConfig { flush_always: true, ..ThrottleConfig::default() };
        let context = StreamContext { input: "The cat sat.", prompt_type: PromptType::Diff, throttle: &throttle };
        let sink = RecordingSink::default();
        let target = PublishTarget { sink: &sink, channel: "c", recipient: 1 };
        let parts = ["<output>\n", "The dog ", "sat.", "\n</output>"];

        drive_stream(fragments(&parts), &CancellationToken::new(), &context, &target).await.unwrap();

        let published = sink.payloads();
        for payload in &published {
            let diff = payload.diff.as_deref().unwrap();
            assert!(!diff.contains("&lt;output") && !diff.contains("&lt;/output"), "{}", diff);
        }
        let terminal = published.last().unwrap();
        assert!(terminal.done);
        assert_eq!(r#"<div class="inline-diff">The <del>cat</del><ins>dog</ins> sat.</div>"#, terminal.diff.as_deref().unwrap());
    }

    #[tokio::test]
    async fn test_partial_results_only_grow() {
        let throttle = ThrottleConfig { flush_always: true, ..ThrottleConfig::default() };
        let context = StreamContext { input: "", prompt_type: PromptType::Simple, throttle: &throttle };
        let sink = RecordingSink::default();
        let target = PublishTarget { sink: &sink, channel: "c", recipient: 1 };
        let parts = ["<res", "ult>\nFirst", " line\n", "second", " line\n</res", "ult>"];

        drive_stream(fragments(&parts), &CancellationToken::new(), &context, &target).await.unwrap();

        let published = sink.payloads();
        for pair in published.windows(2) {
            assert!(pair[1].result.starts_with(&pair[0].result), "{:?} shrank to {:?}", pair[0].result, pair[1].result);
        }
        assert_eq!("First line\nsecond line", published.last().unwrap().result);
    }

    #[tokio::test]
    async fn test_empty_result_has_no_terminal_publish() {
        let throttle = ThrottleConfig { flush_always: true, ..ThrottleConfig::default() };
        let context = StreamContext { input: "x", prompt_type: PromptType::Simple, throttle: &throttle };
        let sink = RecordingSink::default();
        let target = PublishTarget { sink: &sink, channel: "c", recipient: 1 };

        let outcome = drive_stream(fragments(&["<result>", "</result>"]), &CancellationToken::new(), &context, &target)
            .await
            .unwrap();

        assert!(!outcome.terminal_published);
        assert!(sink.payloads().iter().all(|p| !p.done));
    }

    #[tokio::test]
    async fn test_backend_error_keeps_partials_and_skips_terminal() {
        let throttle = ThrottleConfig { flush_always: true, ..ThrottleConfig::default() };
        let context = StreamContext { input: "", prompt_type: PromptType::Simple, throttle: &throttle };
        let sink = RecordingSink::default();
        let target = PublishTarget { sink: &sink, channel: "c", recipient: 1 };
        let parts = vec![Ok("partial".to_string()), Err(AssistError::BackendUnavailable("reset".into()))];

        let err = drive_stream(stream::iter(parts).boxed(), &CancellationToken::new(), &context, &target)
            .await
            .unwrap_err();

        assert!(matches!(err, AssistError::BackendUnavailable(_)));
        let published = sink.payloads();
        assert_eq!(1, published.len());
        assert!(!published[0].done);
    }

    #[tokio::test]
    async fn test_cancelled_stream_publishes_what_it_has_once() {
        let throttle = ThrottleConfig { flush_always: true, ..ThrottleConfig::default() };
        let context = StreamContext { input: "", prompt_type: PromptType::Simple, throttle: &throttle };
        let sink = RecordingSink::default();
        let target = PublishTarget { sink: &sink, channel: "c", recipient: 1 };
        let cancel = CancellationToken::new();
        let cancel_after_first = cancel.clone();
        let parts = stream::iter(vec!["first", " second", " third"])
            .enumerate()
            .map(move |(idx, part)| {
                if idx == 1 {
                    cancel_after_first.cancel();
                }
                Ok::<String, AssistError>(part.to_string())
            })
            .boxed();

        let outcome = drive_stream(parts, &cancel, &context, &target).await.unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.terminal_published);
        let published = sink.payloads();
        assert_eq!(1, published.iter().filter(|p| p.done).count());
        assert!(published.last().unwrap().done);
        assert!(!published.last().unwrap().result.contains("third"));
    }
}
