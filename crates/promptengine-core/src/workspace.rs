//! Generator / workspace state machine
//!
//! `Idle -> Generating -> Active (refining)* -> Idle` via `back()`.
//! Network calls happen elsewhere: `begin_*` hands out the request to send and
//! `finish_*` applies whatever came back, so overlapping refines simply
//! resolve last-write-wins. Every refine is stamped with the draft epoch it
//! was issued against; `back()` and `continue_from()` open a new epoch and
//! replies for an older one are dropped.

use crate::api::{GenerateRequest, GenerateResponse, RefineRequest, RefineResponse};
use crate::catalog::{Mode, ModelId};
use crate::error::ApiError;
use crate::state::{ChatMessage, GenerationResult, HistoryRecord};

/// Assistant turn appended when a refine request fails
pub const REFINE_FALLBACK: &str = "Sorry, I couldn't refine the prompt. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Generating,
    /// Two-pane workspace: editable draft plus refinement chat
    Active,
}

/// A refine on its way to the server, tied to the draft it refines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRefine {
    pub epoch: u64,
    pub request: RefineRequest,
}

#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub phase: Phase,
    pub query: String,
    pub model: ModelId,
    pub mode: Mode,
    pub result: GenerationResult,
    pub transcript: Vec<ChatMessage>,
    /// Visible error for the last failed generate
    pub error: Option<String>,
    refines_in_flight: usize,
    /// Bumped whenever the open draft is thrown away
    epoch: u64,
    /// Phase to return to if the current generate fails
    resume_phase: Phase,
}

impl Workspace {
    pub fn new(model: ModelId, mode: Mode) -> Self {
        Self {
            model,
            mode,
            ..Self::default()
        }
    }

    pub fn is_generating(&self) -> bool {
        self.phase == Phase::Generating
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn is_refining(&self) -> bool {
        self.refines_in_flight > 0
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a generate. `None` means no request should be issued: the query
    /// is blank or a generate is already running.
    pub fn begin_generate(&mut self) -> Option<GenerateRequest> {
        let query = self.query.trim();
        if query.is_empty() || self.is_generating() {
            return None;
        }

        let request = GenerateRequest {
            query: self.query.clone(),
            model: self.model,
            mode: self.mode,
        };
        self.resume_phase = self.phase;
        self.phase = Phase::Generating;
        self.error = None;
        Some(request)
    }

    pub fn finish_generate(&mut self, result: Result<GenerateResponse, ApiError>) {
        if !self.is_generating() {
            // Back was pressed while the request was running
            return;
        }

        match result {
            Ok(response) => {
                self.result = GenerationResult {
                    draft: response.response,
                    sources: response.sources,
                    context: response.context,
                };
                self.phase = Phase::Active;
            }
            Err(e) => {
                tracing::warn!("Generate failed: {}", e);
                self.error = Some(e.user_message());
                self.phase = self.resume_phase;
            }
        }
    }

    /// Optimistically append the user's instruction and build the refine
    /// request. `None` for blank instructions or outside the workspace.
    pub fn begin_refine(&mut self, instruction: &str) -> Option<PendingRefine> {
        let instruction = instruction.trim();
        if instruction.is_empty() || !self.is_active() {
            return None;
        }

        let request = RefineRequest {
            current_prompt: self.result.draft.clone(),
            instruction: instruction.to_string(),
            chat_history: self.transcript.clone(),
            model: self.model,
        };
        self.transcript.push(ChatMessage::user(instruction));
        self.refines_in_flight += 1;
        Some(PendingRefine {
            epoch: self.epoch,
            request,
        })
    }

    /// Exactly one assistant turn per refine: the reply, or the fallback.
    /// A regenerate in between keeps the epoch, so the turn still lands.
    pub fn finish_refine(&mut self, epoch: u64, result: Result<RefineResponse, ApiError>) {
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, "Dropping refine for a discarded draft");
            return;
        }
        self.refines_in_flight = self.refines_in_flight.saturating_sub(1);

        match result {
            Ok(response) => {
                self.transcript.push(ChatMessage::assistant(response.ai_response));
                self.result.draft = response.refined_prompt;
            }
            Err(e) => {
                tracing::warn!("Refine failed: {}", e);
                self.transcript.push(ChatMessage::assistant(REFINE_FALLBACK));
            }
        }
    }

    /// Leave the workspace, discarding the draft (no undo)
    pub fn back(&mut self) {
        self.epoch += 1;
        self.phase = Phase::Idle;
        self.result = GenerationResult::default();
        self.transcript.clear();
        self.error = None;
        self.refines_in_flight = 0;
    }

    /// Seed the workspace with one past exchange, replacing any open draft
    pub fn continue_from(&mut self, record: &HistoryRecord) {
        self.epoch += 1;
        self.transcript = vec![
            ChatMessage::user(record.user.clone()),
            ChatMessage::assistant(record.ai.clone()),
        ];
        self.result = GenerationResult {
            draft: record.ai.clone(),
            sources: Vec::new(),
            context: Vec::new(),
        };
        self.query = record.user.clone();
        self.error = None;
        self.refines_in_flight = 0;
        self.phase = Phase::Active;
    }

    /// Back to a blank generator, keeping the model and mode pickers
    pub fn reset(&mut self) {
        self.back();
        self.query.clear();
    }

    pub fn edit_draft(&mut self, draft: String) {
        self.result.draft = draft;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
