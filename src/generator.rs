//! Session state transitions.
//!
//! Every user action on the page becomes an [`Action`] applied to the
//! session's [`SessionState`] by [`Generator::apply`], which returns an
//! [`Outcome`] telling the page what to show. Generation actions walk
//! `Idle -> Validating -> (Rejected | Moderating) -> (Flagged | Completing) -> Done`;
//! the request counter is bumped only on the way into `Done`.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::GenerationError;
use crate::generation::{CompletionOptions, GenerationClient};
use crate::metrics::MetricsCollector;
use crate::prompt::{build_image_prompt, build_text_prompt, clean_post, first_sentence};
use crate::session::SessionState;
use crate::throttle::ThrottleGate;

/// Sampling used to turn a post into an image description.
pub const IMAGE_DESCRIPTION_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: Some(0.5),
    max_tokens: Some(200),
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    GenerateText { topic: String, style: String },
    /// Uses a random topic and style while the session is feeling lucky.
    RegenerateText { topic: String, style: String },
    GenerateImage,
    AddStyle { style: String },
    RemoveStyle { style: String },
    ResetStyles,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::GenerateText { .. } | Action::RegenerateText { .. } => ActionKind::Text,
            Action::GenerateImage => ActionKind::Image,
            Action::AddStyle { .. } | Action::RemoveStyle { .. } | Action::ResetStyles => ActionKind::Style,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Text,
    Image,
    Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Validating,
    Moderating,
    Completing,
    Done,
    /// Dropped by the throttle gate.
    Throttled,
    Rejected,
    Flagged,
    Failed,
}

impl Phase {
    pub fn is_error(self) -> bool {
        matches!(self, Phase::Throttled | Phase::Rejected | Phase::Flagged | Phase::Failed)
    }
}

impl From<&GenerationError> for Phase {
    fn from(err: &GenerationError) -> Self {
        match err {
            GenerationError::RateLimited => Phase::Throttled,
            GenerationError::EmptyTopic | GenerationError::MissingPost => Phase::Rejected,
            GenerationError::ContentFlagged => Phase::Flagged,
            GenerationError::UpstreamFailure(_) => Phase::Failed,
        }
    }
}

/// What the page should bring into view after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Render {
    Post,
    Image,
    TextError,
    ImageError,
    Styles,
}

impl Render {
    /// Element id on the page to scroll to.
    pub fn anchor(self) -> &'static str {
        match self {
            Render::Post => "post",
            Render::Image => "image",
            Render::TextError => "text-error",
            Render::ImageError => "image-error",
            Render::Styles => "styles",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub kind: ActionKind,
    pub phase: Phase,
    pub render: Render,
}

#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn GenerationClient>,
    catalog: Catalog,
    gate: ThrottleGate,
    metrics: MetricsCollector,
}

impl Generator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        catalog: Catalog,
        gate: ThrottleGate,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            client,
            catalog,
            gate,
            metrics,
        }
    }

    pub fn gate(&self) -> ThrottleGate {
        self.gate
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Apply one action to a session.
    pub async fn apply(&self, state: &mut SessionState, action: Action) -> Outcome {
        let kind = action.kind();
        let lucky_after = !matches!(action, Action::GenerateText { .. });

        let outcome = match action {
            Action::GenerateText { topic, style } => self.generate_text(state, topic, style).await,
            Action::RegenerateText { topic, style } => {
                let (topic, style) = if state.feeling_lucky {
                    self.lucky_selection(state, topic, style).await
                } else {
                    (topic, style)
                };
                self.generate_text(state, topic, style).await
            }
            Action::GenerateImage => self.generate_image(state).await,
            Action::AddStyle { style } => self.edit_styles(state, StyleEdit::Add(style)).await,
            Action::RemoveStyle { style } => self.edit_styles(state, StyleEdit::Remove(style)).await,
            Action::ResetStyles => self.edit_styles(state, StyleEdit::Reset).await,
        };

        state.feeling_lucky = lucky_after;
        if kind != ActionKind::Style {
            self.metrics.record(kind, outcome.phase).await;
        }
        outcome
    }

    async fn generate_text(&self, state: &mut SessionState, topic: String, style: String) -> Outcome {
        let result = self.run_text(state, &topic, &style).await;
        state.topic = topic;
        state.style = style;

        match result {
            Ok(()) => Outcome {
                kind: ActionKind::Text,
                phase: Phase::Done,
                render: Render::Post,
            },
            Err(err) => {
                state.text_error = err.to_string();
                Outcome {
                    kind: ActionKind::Text,
                    phase: Phase::from(&err),
                    render: Render::TextError,
                }
            }
        }
    }

    async fn run_text(&self, state: &mut SessionState, topic: &str, style: &str) -> Result<(), GenerationError> {
        self.gate.check(state)?;

        state.post.clear();
        state.image.clear();
        state.text_error.clear();
        state.image_error.clear();

        tracing::debug!(phase = ?Phase::Validating, "Generating post");
        let prompt = build_text_prompt(topic, style)?;

        tracing::debug!(phase = ?Phase::Moderating, "Generating post");
        if self.client.moderate(&prompt).await? {
            tracing::info!(topic = %topic, style = %style, "Input flagged as inappropriate");
            return Err(GenerationError::ContentFlagged);
        }

        tracing::debug!(phase = ?Phase::Completing, "Generating post");
        let reply = self.client.complete(&prompt, CompletionOptions::default()).await?;

        state.post = clean_post(&reply);
        self.gate.record_success(state);
        tracing::info!(topic = %topic, style = %style, post = %state.post, "Post generated");
        Ok(())
    }

    async fn generate_image(&self, state: &mut SessionState) -> Outcome {
        match self.run_image(state).await {
            Ok(()) => Outcome {
                kind: ActionKind::Image,
                phase: Phase::Done,
                render: Render::Image,
            },
            Err(err) => {
                state.image_error = err.to_string();
                Outcome {
                    kind: ActionKind::Image,
                    phase: Phase::from(&err),
                    render: Render::ImageError,
                }
            }
        }
    }

    async fn run_image(&self, state: &mut SessionState) -> Result<(), GenerationError> {
        self.gate.check(state)?;
        state.image_error.clear();

        if state.post.trim().is_empty() {
            return Err(GenerationError::MissingPost);
        }

        let description_prompt = build_image_prompt(&state.post);
        let reply = self
            .client
            .complete(&description_prompt, IMAGE_DESCRIPTION_OPTIONS)
            .await?;
        let image_prompt = first_sentence(&reply);

        state.image = self.client.image(&image_prompt).await?;
        self.gate.record_success(state);
        tracing::info!(post = %state.post, image_prompt = %image_prompt, "Image generated");
        Ok(())
    }

    /// Random topic and style from what the page offers; falls back to the
    /// given selection when a list is empty or cannot be loaded.
    async fn lucky_selection(&self, state: &SessionState, topic: String, style: String) -> (String, String) {
        let topics = self.catalog.topics().await;
        let styles = self.catalog.styles().await;
        let mut rng = rand::thread_rng();

        let topic = match topics {
            Ok(topics) => topics.choose(&mut rng).cloned().unwrap_or(topic),
            Err(err) => {
                tracing::warn!(error = %err, "Topic catalog unavailable, keeping selection");
                topic
            }
        };

        let style = match styles {
            Ok(styles) => state
                .offered_styles(&styles)
                .choose(&mut rng)
                .cloned()
                .unwrap_or(style),
            Err(err) => {
                tracing::warn!(error = %err, "Style catalog unavailable, keeping selection");
                style
            }
        };

        (topic, style)
    }

    async fn edit_styles(&self, state: &mut SessionState, edit: StyleEdit) -> Outcome {
        let phase = match self.try_edit_styles(state, edit).await {
            Ok(()) => Phase::Done,
            Err(err) => {
                state.text_error = err.to_string();
                Phase::Failed
            }
        };
        Outcome {
            kind: ActionKind::Style,
            phase,
            render: Render::Styles,
        }
    }

    async fn try_edit_styles(&self, state: &mut SessionState, edit: StyleEdit) -> Result<(), GenerationError> {
        if let StyleEdit::Reset = edit {
            state.edited_styles = None;
            return Ok(());
        }

        if state.edited_styles.is_none() {
            let catalog = self
                .catalog
                .styles()
                .await
                .map_err(|e| GenerationError::UpstreamFailure(e.to_string()))?;
            state.edited_styles = Some(catalog.as_ref().clone());
        }
        let styles = state.edited_styles.get_or_insert_with(Vec::new);

        match edit {
            StyleEdit::Add(style) => {
                if !styles.contains(&style) {
                    styles.push(style);
                }
            }
            StyleEdit::Remove(style) => {
                styles.retain(|s| s != &style);
                if state.style == style {
                    state.style.clear();
                }
            }
            StyleEdit::Reset => {}
        }
        Ok(())
    }
}

enum StyleEdit {
    Add(String),
    Remove(String),
    Reset,
}
