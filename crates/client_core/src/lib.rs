use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use shared::{
    domain::Phase,
    protocol::{GenerationPayload, ResponseKind, GENERATE_VIDEO_PATH},
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};
use url::Url;

pub mod error;
pub mod event_stream;
pub mod progress;
pub mod session;
pub mod upload;

pub use error::GenerationError;
pub use event_stream::{
    DecodedEvent, EventDecodeError, EventOutcome, EventStreamDecoder, LineTooLong,
    DEFAULT_MAX_LINE_BYTES,
};
pub use progress::{ProgressFrame, SynthesizedProgress};
pub use session::{Session, StartOutcome};
pub use upload::{ImageUpload, SessionInputs, UploadRejected, MAX_UPLOAD_BYTES};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest quiet period tolerated while waiting on the backend, whether for
/// response headers, a JSON body or the next stream chunk.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub endpoint: Url,
    pub connect_timeout: Duration,
    pub stall_timeout: Duration,
    pub max_event_line_bytes: usize,
    pub synthesized_progress: SynthesizedProgress,
}

impl ControllerConfig {
    /// Builds the generation endpoint from the backend base URL.
    pub fn new(backend_url: &str) -> Result<Self> {
        let backend_url = backend_url.trim();
        let mut base = Url::parse(backend_url)
            .with_context(|| format!("invalid backend url '{backend_url}'"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("backend url '{backend_url}' cannot carry a path");
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(GENERATE_VIDEO_PATH)
            .with_context(|| format!("failed to build generation endpoint from '{backend_url}'"))?;

        Ok(Self {
            endpoint,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            max_event_line_bytes: DEFAULT_MAX_LINE_BYTES,
            synthesized_progress: SynthesizedProgress::default(),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_max_event_line_bytes(mut self, limit: usize) -> Self {
        self.max_event_line_bytes = limit;
        self
    }

    pub fn with_synthesized_progress(mut self, progress: SynthesizedProgress) -> Self {
        self.synthesized_progress = progress;
        self
    }
}

/// Owns the generation session and drives it from `start` to a terminal
/// phase. The session is published through a watch channel; `subscribe`
/// hands out receivers for rendering.
///
/// `start` and `retry` spawn the attempt onto the current tokio runtime.
pub struct GenerationController {
    http: Client,
    config: ControllerConfig,
    session: watch::Sender<Session>,
    active: Mutex<Option<JoinHandle<()>>>,
}

impl GenerationController {
    pub fn new(config: ControllerConfig) -> Result<Arc<Self>> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_http_client(config, http))
    }

    pub fn with_http_client(config: ControllerConfig, http: Client) -> Arc<Self> {
        let (session, _) = watch::channel(Session::default());
        Arc::new(Self {
            http,
            config,
            session,
            active: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Waits until the session leaves `Generating` and returns that state.
    pub async fn settled(&self) -> Session {
        let mut rx = self.session.subscribe();
        let settled = match rx.wait_for(|session| session.phase() != Phase::Generating).await {
            Ok(session) => session.clone(),
            Err(_) => self.snapshot(),
        };
        settled
    }

    pub fn start(
        self: &Arc<Self>,
        front: Option<ImageUpload>,
        back: Option<ImageUpload>,
    ) -> StartOutcome {
        let Some(inputs) = SessionInputs::from_parts(front, back) else {
            debug!("start ignored: both images are required");
            return StartOutcome::MissingInputs;
        };
        self.launch(Arc::new(inputs))
    }

    /// Starts a new attempt with the inputs of the failed one.
    pub fn retry(self: &Arc<Self>) -> StartOutcome {
        let inputs = self.session.borrow().inputs().cloned();
        match inputs {
            Some(inputs) => self.launch(inputs),
            None => {
                debug!("retry ignored: no inputs retained");
                StartOutcome::MissingInputs
            }
        }
    }

    /// Returns to `Idle` and abandons any attempt in flight, dropping its
    /// response body.
    pub fn reset(&self) {
        let mut active = self.active_task();
        if let Some(task) = active.take() {
            task.abort();
        }
        self.session.send_modify(Session::reset);
        drop(active);
        info!("generation session reset");
    }

    fn active_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The session transition and the task hand-off happen under the
    /// `active` lock so a concurrent `reset` sees either both or neither.
    fn launch(self: &Arc<Self>, inputs: Arc<SessionInputs>) -> StartOutcome {
        let mut active = self.active_task();
        let mut outcome = StartOutcome::MissingInputs;
        self.session.send_if_modified(|session| {
            outcome = session.begin(Arc::clone(&inputs));
            matches!(outcome, StartOutcome::Started { .. })
        });

        let StartOutcome::Started { attempt } = outcome else {
            warn!(?outcome, "start rejected");
            return outcome;
        };

        let controller = Arc::clone(self);
        let task = tokio::spawn(async move { controller.run_attempt(attempt, inputs).await });
        if let Some(previous) = active.replace(task) {
            previous.abort();
        }
        outcome
    }

    fn update(&self, apply: impl FnOnce(&mut Session) -> bool) -> bool {
        self.session.send_if_modified(apply)
    }

    fn is_current(&self, attempt: u64) -> bool {
        let session = self.session.borrow();
        session.attempt() == attempt && session.phase() == Phase::Generating
    }

    async fn run_attempt(self: Arc<Self>, attempt: u64, inputs: Arc<SessionInputs>) {
        info!(
            attempt,
            endpoint = %self.config.endpoint,
            front_bytes = inputs.front.len(),
            back_bytes = inputs.back.len(),
            "starting video generation"
        );

        match self.generate(attempt, &inputs).await {
            Ok(()) => {
                let session = self.snapshot();
                if session.attempt() == attempt {
                    info!(attempt, phase = ?session.phase(), "video generation finished");
                }
            }
            Err(err) => {
                error!(attempt, error = %err, "video generation failed");
                let failure = err.into_failure();
                self.update(|session| session.fail(attempt, failure));
            }
        }
    }

    async fn generate(&self, attempt: u64, inputs: &SessionInputs) -> Result<(), GenerationError> {
        let form = inputs.to_form()?;
        let request = self
            .http
            .post(self.config.endpoint.clone())
            .multipart(form)
            .send();
        let response = self.within_stall_timeout(request).await??;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        match content_type
            .as_deref()
            .and_then(ResponseKind::from_content_type)
        {
            Some(ResponseKind::EventStream) => {
                debug!(attempt, "consuming event stream response");
                self.consume_event_stream(attempt, response).await
            }
            Some(ResponseKind::Json) => {
                debug!(attempt, "consuming single JSON response");
                self.consume_json(attempt, response).await
            }
            None => Err(GenerationError::UnexpectedFormat { content_type }),
        }
    }

    async fn within_stall_timeout<F: Future>(
        &self,
        fut: F,
    ) -> Result<F::Output, GenerationError> {
        tokio::time::timeout(self.config.stall_timeout, fut)
            .await
            .map_err(|_| GenerationError::Stalled(self.config.stall_timeout))
    }

    async fn consume_event_stream(
        &self,
        attempt: u64,
        response: Response,
    ) -> Result<(), GenerationError> {
        let mut decoder = EventStreamDecoder::with_line_limit(self.config.max_event_line_bytes);
        let mut body = std::pin::pin!(response.bytes_stream());

        loop {
            let Some(chunk) = self.within_stall_timeout(body.next()).await? else {
                break;
            };
            let chunk = chunk?;

            for decoded in decoder.push(&chunk)? {
                let event = match decoded {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(attempt, error = %err, "skipping malformed stream event");
                        continue;
                    }
                };
                debug!(
                    attempt,
                    step = ?event.step,
                    progress = ?event.progress,
                    terminal = event.is_terminal(),
                    "stream event"
                );
                self.update(|session| session.apply_event(attempt, event));
                if !self.is_current(attempt) {
                    return Ok(());
                }
            }
        }

        let discarded = decoder.finish();
        if discarded > 0 {
            warn!(attempt, discarded, "event stream ended inside an unterminated line");
        }
        Err(GenerationError::StreamEnded)
    }

    async fn consume_json(&self, attempt: u64, response: Response) -> Result<(), GenerationError> {
        let body = self.within_stall_timeout(response.bytes()).await??;
        let payload: GenerationPayload = serde_json::from_slice(&body)?;
        let result = payload.into_result()?;

        self.config
            .synthesized_progress
            .play(|frame| {
                self.update(|session| {
                    session.advance(attempt, Some(frame.step), Some(frame.progress))
                });
            })
            .await;

        self.update(|session| session.complete(attempt, result));
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
