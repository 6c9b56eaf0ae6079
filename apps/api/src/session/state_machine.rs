//! Step transitions for a `Session`.
//!
//! Long-running operations are split in two: `begin_*` validates the step and
//! hands out a ticket while the store guard is held, the Gemini call runs with
//! no guard held, and `complete_*` applies the outcome only if the ticket's
//! epoch still matches. A reset or re-upload in between makes the late result
//! a no-op.

use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::Variation;
use crate::imaging::ImageData;
use crate::session::models::{AppStep, GeneratedHeadshot, HeadshotOrigin, Session, SourceImage};
use crate::styles::{find_style, HeadshotStyle};

/// Everything a generation run needs, captured at `begin_generation`.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub epoch: u64,
    pub source: ImageData,
    pub style: &'static HeadshotStyle,
}

/// Everything an edit needs, captured at `begin_edit`.
#[derive(Debug, Clone)]
pub struct EditTicket {
    pub epoch: u64,
    pub parent_id: Uuid,
    pub image: ImageData,
    pub prompt: String,
}

fn step_conflict(action: &str, step: AppStep) -> AppError {
    AppError::Conflict(format!("Cannot {action} while the session is in the {step:?} step"))
}

impl Session {
    /// Fails unless a new source may be attached in the current step.
    pub fn ensure_accepts_source(&self) -> Result<(), AppError> {
        match self.step {
            AppStep::Upload | AppStep::Style => Ok(()),
            step => Err(step_conflict("upload a new photo", step)),
        }
    }

    pub fn attach_source(&mut self, source: SourceImage) -> Result<(), AppError> {
        self.ensure_accepts_source()?;
        self.source = Some(source);
        self.step = AppStep::Style;
        self.last_error = None;
        self.epoch += 1;
        Ok(())
    }

    /// Selects a style. Leaving the result step keeps the previous results
    /// until the next generation replaces them.
    pub fn choose_style(&mut self, style_id: &str) -> Result<&'static HeadshotStyle, AppError> {
        if !matches!(self.step, AppStep::Style | AppStep::Result) {
            return Err(step_conflict("choose a style", self.step));
        }
        if self.edit_in_flight {
            return Err(AppError::Conflict(
                "Wait for the current edit to finish before changing style".to_string(),
            ));
        }
        let style = find_style(style_id)
            .ok_or_else(|| AppError::Validation(format!("Unknown style '{style_id}'")))?;
        self.style_id = Some(style.id);
        self.step = AppStep::Style;
        Ok(style)
    }

    pub fn begin_generation(&mut self) -> Result<GenerationTicket, AppError> {
        if self.step != AppStep::Style {
            return Err(step_conflict("generate headshots", self.step));
        }
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| AppError::Validation("Upload a photo first".to_string()))?;
        let style = self
            .style_id
            .and_then(find_style)
            .ok_or_else(|| AppError::Validation("Select a style first".to_string()))?;

        let ticket = GenerationTicket {
            epoch: self.epoch,
            source: source.image.clone(),
            style,
        };
        self.step = AppStep::Generating;
        self.last_error = None;
        Ok(ticket)
    }

    /// Applies a finished generation. Returns false when the ticket is stale.
    pub fn complete_generation(
        &mut self,
        epoch: u64,
        outcome: Result<Vec<Variation>, String>,
    ) -> bool {
        if epoch != self.epoch || self.step != AppStep::Generating {
            debug!("Discarding stale generation for session {}", self.id);
            return false;
        }

        match outcome {
            Ok(variations) => {
                self.results = variations
                    .into_iter()
                    .map(|v| {
                        GeneratedHeadshot::new(
                            v.image,
                            HeadshotOrigin::Variation {
                                modifier: v.modifier.to_string(),
                            },
                        )
                    })
                    .collect();
                self.selected_id = self.results.first().map(|r| r.id);
                self.step = if self.results.is_empty() {
                    AppStep::Style
                } else {
                    AppStep::Result
                };
            }
            Err(message) => {
                self.last_error = Some(message);
                self.step = AppStep::Style;
            }
        }
        true
    }

    pub fn select_result(&mut self, result_id: Uuid) -> Result<(), AppError> {
        if self.step != AppStep::Result {
            return Err(step_conflict("select a result", self.step));
        }
        if self.result(result_id).is_none() {
            return Err(AppError::NotFound(format!("Result {result_id} not found")));
        }
        self.selected_id = Some(result_id);
        Ok(())
    }

    pub fn begin_edit(&mut self, prompt: &str) -> Result<EditTicket, AppError> {
        if self.step != AppStep::Result {
            return Err(step_conflict("edit a headshot", self.step));
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::Validation("Edit prompt cannot be empty".to_string()));
        }
        if self.edit_in_flight {
            return Err(AppError::Conflict(
                "An edit is already in progress for this session".to_string(),
            ));
        }
        let parent = self
            .selected()
            .ok_or_else(|| AppError::Conflict("No headshot selected".to_string()))?;

        let ticket = EditTicket {
            epoch: self.epoch,
            parent_id: parent.id,
            image: parent.image.clone(),
            prompt: prompt.to_string(),
        };
        self.edit_in_flight = true;
        self.last_error = None;
        Ok(ticket)
    }

    /// Applies a finished edit: the new image goes to the front and is
    /// selected. Returns the new result id, or `None` if nothing was added.
    pub fn complete_edit(
        &mut self,
        ticket: &EditTicket,
        outcome: Result<ImageData, String>,
    ) -> Option<Uuid> {
        if ticket.epoch != self.epoch {
            debug!("Discarding stale edit for session {}", self.id);
            return None;
        }
        self.edit_in_flight = false;

        match outcome {
            Ok(image) if self.step == AppStep::Result => {
                let edited = GeneratedHeadshot::new(
                    image,
                    HeadshotOrigin::Edit {
                        prompt: ticket.prompt.clone(),
                        parent_id: ticket.parent_id,
                    },
                );
                let id = edited.id;
                self.results.insert(0, edited);
                self.selected_id = Some(id);
                Some(id)
            }
            Ok(_) => None,
            Err(message) => {
                self.last_error = Some(message);
                None
            }
        }
    }

    /// Back to an empty upload step. In-flight work becomes stale.
    pub fn reset(&mut self) {
        self.step = AppStep::Upload;
        self.source = None;
        self.style_id = None;
        self.results.clear();
        self.selected_id = None;
        self.last_error = None;
        self.edit_in_flight = false;
        self.epoch += 1;
    }
}
