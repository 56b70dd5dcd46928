//! Deterministic offline provider.
//!
//! Replays a queue of scripts, one per `generate` call. When the queue is
//! empty a default script is synthesized from the request: one artifact per
//! requested image, or a few progress steps followed by one video. Prompt
//! enhancement appends fixed kind-specific detail to the prompt. Used when
//! running without a gateway (`PROVIDER=scripted`) and by tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use genstudio_core::job::JobKind;
use genstudio_core::types::{ArtifactRef, ConversationHandle};

use crate::events::ProviderEvent;
use crate::provider::{ArtifactStream, GenerationProvider, GenerationRequest, ProviderError};

/// One instruction of a script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Sleep before the next step.
    Wait(Duration),
    Progress(u8),
    Artifact(String),
    /// End the stream with a provider error.
    Fail(String),
    /// Panic while the stream is being polled.
    Panic(String),
    /// Never yield again.
    Hang,
}

#[derive(Default)]
pub struct ScriptedProvider {
    step_delay: Duration,
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    calls: Mutex<Vec<GenerationRequest>>,
    released: Mutex<Vec<ConversationHandle>>,
    enhance_failure: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedProvider {
    /// A provider whose default scripts pause `step_delay` between events.
    pub fn new(step_delay: Duration) -> Self {
        Self {
            step_delay,
            ..Self::default()
        }
    }

    /// Queue a script for the next `generate` call.
    pub fn push_script(&self, steps: Vec<ScriptStep>) {
        lock(&self.scripts).push_back(steps);
    }

    /// Make the next `enhance_prompt` call fail with `message`.
    pub fn fail_next_enhancement(&self, message: impl Into<String>) {
        *lock(&self.enhance_failure) = Some(message.into());
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Conversations released so far, in order.
    pub fn released(&self) -> Vec<ConversationHandle> {
        lock(&self.released).clone()
    }

    fn default_script(&self, request: &GenerationRequest) -> Vec<ScriptStep> {
        let wait = ScriptStep::Wait(self.step_delay);
        match request {
            GenerationRequest::Image(req) => (0..req.params.count.max(1))
                .flat_map(|index| {
                    [
                        wait.clone(),
                        ScriptStep::Artifact(format!(
                            "scripted/{}/image-{index}.png",
                            req.conversation
                        )),
                    ]
                })
                .collect(),
            GenerationRequest::Video(_) => vec![
                wait.clone(),
                ScriptStep::Progress(30),
                wait.clone(),
                ScriptStep::Progress(60),
                wait,
                ScriptStep::Artifact(format!("scripted/video-{}.mp4", uuid::Uuid::new_v4())),
            ],
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn generate(&self, request: GenerationRequest) -> ArtifactStream {
        let steps = lock(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| self.default_script(&request));
        lock(&self.calls).push(request);

        let stream = futures::stream::unfold(steps.into_iter(), |mut steps| async move {
            loop {
                match steps.next()? {
                    ScriptStep::Wait(delay) => tokio::time::sleep(delay).await,
                    ScriptStep::Progress(percent) => {
                        return Some((Ok(ProviderEvent::Progress { percent }), steps));
                    }
                    ScriptStep::Artifact(name) => {
                        return Some((Ok(ProviderEvent::Artifact(ArtifactRef::new(name))), steps));
                    }
                    ScriptStep::Fail(message) => {
                        return Some((Err(ProviderError::Rejected(message)), Vec::new().into_iter()));
                    }
                    ScriptStep::Panic(message) => panic!("{message}"),
                    ScriptStep::Hang => std::future::pending::<()>().await,
                }
            }
        });
        Box::pin(stream)
    }

    async fn release_conversation(
        &self,
        handle: &ConversationHandle,
    ) -> Result<(), ProviderError> {
        lock(&self.released).push(handle.clone());
        Ok(())
    }

    async fn enhance_prompt(&self, prompt: &str, target: JobKind) -> Result<String, ProviderError> {
        if let Some(message) = lock(&self.enhance_failure).take() {
            return Err(ProviderError::Rejected(message));
        }
        let detail = match target {
            JobKind::Image => "highly detailed, soft natural lighting, balanced composition",
            JobKind::Video => "smooth camera movement, cinematic lighting, steady pacing",
        };
        Ok(format!("{}, {detail}", prompt.trim()))
    }
}
