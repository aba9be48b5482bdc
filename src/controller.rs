//! Page controller: the chat / history / sample-data state machine.
//!
//! The controller is stateless with respect to navigation. The caller passes
//! the session's current [`NavigationState`] together with one [`UiEvent`];
//! [`PageController::handle`] runs the event to completion and returns a
//! [`Page`] that carries the (possibly new) navigation state, inline banners,
//! and the data the renderer needs. Only [`UiEvent::SelectPage`] changes the
//! navigation state.
//!
//! ```text
//!            SelectPage(*)
//!   ┌──────┐ ◀──────────▶ ┌─────────┐
//!   │ chat │              │ history │
//!   └──────┘ ◀──┐    ┌──▶ └─────────┘
//!               ▼    ▼
//!           ┌─────────────┐
//!           │ sample_data │
//!           └─────────────┘
//! ```
//!
//! Errors never escape `handle`: generation and store failures become error
//! banners and nothing is persisted for a failed chat turn.

use anyhow::Context;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::config::{Config, GenerationConfig};
use crate::error::{ChatError, StoreError};
use crate::generation::{create_generator, Generator};
use crate::metrics::{initialize_metrics_or_warn, Scorer, TurnScores};
use crate::models::{ConversationTurn, Feedback, FeedbackCounts, SampleRecord};
use crate::seed::ensure_initial_data;
use crate::store::Store;

/// Which page the session is looking at. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationState {
    #[default]
    Chat,
    History,
    SampleData,
}

impl NavigationState {
    pub const ALL: [NavigationState; 3] = [
        NavigationState::Chat,
        NavigationState::History,
        NavigationState::SampleData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationState::Chat => "chat",
            NavigationState::History => "history",
            NavigationState::SampleData => "sample_data",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NavigationState::Chat => "Chat",
            NavigationState::History => "History",
            NavigationState::SampleData => "Sample data",
        }
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NavigationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "chat" => Ok(NavigationState::Chat),
            "history" => Ok(NavigationState::History),
            "sample_data" => Ok(NavigationState::SampleData),
            other => Err(format!("unknown page: '{}'", other)),
        }
    }
}

/// One user interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Render the current page without acting.
    Show,
    SelectPage(NavigationState),
    SubmitQuestion { question: String },
    SetFeedback { id: i64, value: Feedback },
    CreateSample { question: String, answer: String },
    UpdateSample { id: i64, question: String, answer: String },
    DeleteSample { id: i64 },
}

impl UiEvent {
    /// Whether this event may be handled while `nav` is displayed.
    fn allowed_on(&self, nav: NavigationState) -> bool {
        match self {
            UiEvent::Show | UiEvent::SelectPage(_) => true,
            UiEvent::SubmitQuestion { .. } => nav == NavigationState::Chat,
            // The chat page offers feedback on the answer it just showed.
            UiEvent::SetFeedback { .. } => {
                matches!(nav, NavigationState::Chat | NavigationState::History)
            }
            UiEvent::CreateSample { .. }
            | UiEvent::UpdateSample { .. }
            | UiEvent::DeleteSample { .. } => nav == NavigationState::SampleData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
}

impl Banner {
    fn info(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Info,
            message: message.into(),
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Error,
            message: message.into(),
        }
    }
}

/// Everything the renderer needs to draw one page.
#[derive(Debug, Clone)]
pub struct Page {
    pub nav: NavigationState,
    pub banners: Vec<Banner>,
    pub body: PageBody,
}

impl Page {
    pub fn has_error(&self) -> bool {
        self.banners.iter().any(|b| b.kind == BannerKind::Error)
    }
}

#[derive(Debug, Clone)]
pub enum PageBody {
    Chat(ChatView),
    History(HistoryView),
    SampleData(SampleDataView),
}

#[derive(Debug, Clone)]
pub struct ChatView {
    pub model_available: bool,
    pub model_name: String,
    /// The turn produced by this request, if any.
    pub answered: Option<ConversationTurn>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    pub entries: Vec<HistoryEntry>,
    pub counts: FeedbackCounts,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub turn: ConversationTurn,
    pub scores: Option<TurnScores>,
}

#[derive(Debug, Clone, Default)]
pub struct SampleDataView {
    pub samples: Vec<SampleRecord>,
}

/// Owns the long-lived collaborators for the lifetime of the process.
pub struct PageController {
    store: Store,
    generator: Generator,
    scorer: Option<Scorer>,
    max_length: u32,
    do_sample: bool,
}

impl PageController {
    pub fn new(
        store: Store,
        generator: Generator,
        scorer: Option<Scorer>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            store,
            generator,
            scorer,
            max_length: config.max_length,
            do_sample: config.do_sample,
        }
    }

    /// Builds every collaborator from config.
    ///
    /// Startup order: metrics resource, store (schema + seed), generator. A
    /// store that cannot be opened aborts startup; a metrics failure only logs.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let scorer = initialize_metrics_or_warn(&config.metrics);

        let store = Store::open(config)
            .await
            .with_context(|| format!("cannot open database at {}", config.db.path.display()))?;
        ensure_initial_data(&store).await?;

        let generator = create_generator(&config.generation)?;
        if generator.is_available() {
            info!(model = generator.model_name(), "text generation ready");
        } else {
            warn!("text generation disabled; the chat page will be unavailable");
        }

        Ok(Self::new(store, generator, scorer, &config.generation))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Runs one chat exchange: generate, then persist on success only.
    pub async fn ask(&self, question: &str) -> Result<ConversationTurn, ChatError> {
        let answer = self
            .generator
            .generate(question, self.max_length, self.do_sample)
            .await
            .inspect_err(|e| error!(error = %e, "generation failed; turn not saved"))?;

        let id = self.store.insert_turn(question.trim(), &answer).await?;
        info!(turn_id = id, "saved conversation turn");
        Ok(self.store.get_turn(id).await?)
    }

    /// Applies `event` on page `nav` and returns the page to display.
    pub async fn handle(&self, nav: NavigationState, event: UiEvent) -> Page {
        let mut banners = Vec::new();

        let nav = match &event {
            UiEvent::SelectPage(next) => *next,
            _ => nav,
        };

        if !event.allowed_on(nav) {
            banners.push(Banner::error(format!(
                "That action is not available on the {} page.",
                nav.label()
            )));
            let body = self.build_body(nav, None, &mut banners).await;
            return Page { nav, banners, body };
        }

        let mut answered = None;
        match event {
            UiEvent::Show | UiEvent::SelectPage(_) => {}
            UiEvent::SubmitQuestion { question } => match self.ask(&question).await {
                Ok(turn) => {
                    banners.push(Banner::success("Answer generated."));
                    answered = Some(turn);
                }
                Err(e) => banners.push(Banner::error(format!("An error occurred: {}", e))),
            },
            UiEvent::SetFeedback { id, value } => {
                let result = self.store.set_feedback(id, value).await;
                push_outcome(&mut banners, result, format!("Feedback saved for turn #{}.", id));
            }
            UiEvent::CreateSample { question, answer } => {
                let result = self.store.insert_sample(question.trim(), answer.trim()).await;
                match result {
                    Ok(id) => banners.push(Banner::success(format!("Added sample #{}.", id))),
                    Err(e) => banners.push(store_banner(&e)),
                }
            }
            UiEvent::UpdateSample {
                id,
                question,
                answer,
            } => {
                let result = self
                    .store
                    .update_sample(id, question.trim(), answer.trim())
                    .await;
                push_outcome(&mut banners, result, format!("Updated sample #{}.", id));
            }
            UiEvent::DeleteSample { id } => {
                let result = self.store.delete_sample(id).await;
                push_outcome(&mut banners, result, format!("Deleted sample #{}.", id));
            }
        }

        let body = self.build_body(nav, answered, &mut banners).await;
        Page { nav, banners, body }
    }

    async fn build_body(
        &self,
        nav: NavigationState,
        answered: Option<ConversationTurn>,
        banners: &mut Vec<Banner>,
    ) -> PageBody {
        match nav {
            NavigationState::Chat => {
                let model_available = self.generator.is_available();
                if !model_available {
                    banners.push(Banner::info(
                        "Chat is unavailable: no text-generation model is configured.",
                    ));
                }
                PageBody::Chat(ChatView {
                    model_available,
                    model_name: self.generator.model_name().to_string(),
                    answered,
                })
            }
            NavigationState::History => match self.history_view().await {
                Ok(view) => PageBody::History(view),
                Err(e) => {
                    banners.push(store_banner(&e));
                    PageBody::History(HistoryView::default())
                }
            },
            NavigationState::SampleData => match self.store.list_samples().await {
                Ok(samples) => PageBody::SampleData(SampleDataView { samples }),
                Err(e) => {
                    banners.push(store_banner(&e));
                    PageBody::SampleData(SampleDataView::default())
                }
            },
        }
    }

    /// Turns (newest first) with scores when the scorer is available.
    pub async fn history_view(&self) -> Result<HistoryView, StoreError> {
        let turns = self.store.list_turns().await?;
        let counts = self.store.feedback_counts().await?;
        let samples = match &self.scorer {
            Some(_) => self.store.list_samples().await?,
            None => Vec::new(),
        };

        Ok(HistoryView {
            entries: score_history(self.scorer.as_ref(), turns, &samples),
            counts,
            metrics_enabled: self.scorer.is_some(),
        })
    }
}

/// Pairs each turn with its scores.
///
/// The reference answer for a turn is the sample whose trimmed question equals
/// the turn's trimmed question. When several samples share a question, the
/// first one in `samples` (lowest id, as listed by the store) is used.
pub fn score_history(
    scorer: Option<&Scorer>,
    turns: Vec<ConversationTurn>,
    samples: &[SampleRecord],
) -> Vec<HistoryEntry> {
    let mut references: HashMap<&str, &str> = HashMap::new();
    if scorer.is_some() {
        for sample in samples {
            references
                .entry(sample.question.trim())
                .or_insert(sample.answer.as_str());
        }
    }

    turns
        .into_iter()
        .map(|turn| {
            let scores = scorer.map(|scorer| {
                let reference = references.get(turn.question.trim()).copied();
                scorer.score_turn(&turn.question, &turn.answer, reference)
            });
            HistoryEntry { turn, scores }
        })
        .collect()
}

fn store_banner(e: &StoreError) -> Banner {
    if let StoreError::Database(_) = e {
        error!(error = %e, "store operation failed");
    }
    Banner::error(e.to_string())
}

fn push_outcome(banners: &mut Vec<Banner>, result: Result<(), StoreError>, success: String) {
    match result {
        Ok(()) => banners.push(Banner::success(success)),
        Err(e) => banners.push(store_banner(&e)),
    }
}
