//! Pure transition function for the upload, analyze, recommend workflow.
//!
//! `reduce` never performs I/O. Remote calls are requested through an
//! [`Effect`] and their results come back as completion events tagged with
//! the ticket of the request that produced them.

use serde::Serialize;

use super::dto::{
    total_calories, total_calories_burned, ExerciseRecommendation, FoodItem, ImageAsset,
};
use super::error::{TransitionRejected, WorkflowError};
use super::validation::{ImageRules, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    ImageSelected,
    Analyzing,
    FoodDetected,
    RecommendingExercise,
    Complete,
    Error,
}

impl Phase {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Analyzing | Phase::RecommendingExercise)
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    SelectImage(ImageAsset),
    /// The picked image could not even be read, e.g. the upload overran the body limit.
    ImageRejected(ValidationError),
    Analyze,
    RecommendExercise,
    Cancel,
    Retry,
    Clear,
    FoodDetected {
        ticket: u64,
        items: Vec<FoodItem>,
    },
    ExerciseRecommended {
        ticket: u64,
        recommendations: Vec<ExerciseRecommendation>,
    },
    RequestFailed {
        ticket: u64,
        error: WorkflowError,
    },
}

/// Remote call the driver must perform on behalf of the state machine.
#[derive(Debug, Clone)]
pub enum Effect {
    AnalyzeImage {
        ticket: u64,
        image: ImageAsset,
    },
    RecommendExercise {
        ticket: u64,
        food_items: Vec<FoodItem>,
    },
}

impl Effect {
    pub fn ticket(&self) -> u64 {
        match self {
            Effect::AnalyzeImage { ticket, .. } | Effect::RecommendExercise { ticket, .. } => {
                *ticket
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Applied(Option<Effect>),
    Rejected(TransitionRejected),
    /// Completion for a request that was cancelled or superseded.
    Stale,
}

#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub rules: ImageRules,
    pub phase: Phase,
    pub image: Option<ImageAsset>,
    pub food_items: Vec<FoodItem>,
    pub recommendations: Vec<ExerciseRecommendation>,
    pub error: Option<WorkflowError>,
    ticket: u64,
    resume: Phase,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new(ImageRules::default())
    }
}

impl WorkflowState {
    pub fn new(rules: ImageRules) -> Self {
        Self {
            rules,
            phase: Phase::Idle,
            image: None,
            food_items: Vec::new(),
            recommendations: Vec::new(),
            error: None,
            ticket: 0,
            resume: Phase::Idle,
        }
    }

    /// Id of the most recently issued request.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Stable phase that cancel and retry fall back to.
    pub fn resume_phase(&self) -> Phase {
        self.resume
    }

    pub fn total_calories(&self) -> f64 {
        total_calories(&self.food_items)
    }

    pub fn total_calories_burned(&self) -> f64 {
        total_calories_burned(&self.recommendations)
    }

    fn next_ticket(&mut self) -> u64 {
        self.ticket += 1;
        self.ticket
    }

    fn fail(&mut self, error: WorkflowError) {
        self.phase = Phase::Error;
        self.error = Some(error);
    }

    fn select_image(&mut self, asset: ImageAsset) -> Outcome {
        if self.phase.is_in_flight() {
            return Outcome::Rejected(TransitionRejected::RequestInFlight);
        }
        if let Err(e) = self.rules.validate(&asset) {
            return self.reject_image(e);
        }
        self.food_items.clear();
        self.recommendations.clear();
        self.error = None;
        self.image = Some(asset);
        self.phase = Phase::ImageSelected;
        self.resume = Phase::ImageSelected;
        Outcome::Applied(None)
    }

    fn reject_image(&mut self, error: ValidationError) -> Outcome {
        if self.phase.is_in_flight() {
            return Outcome::Rejected(TransitionRejected::RequestInFlight);
        }
        self.food_items.clear();
        self.recommendations.clear();
        self.image = None;
        self.resume = Phase::Idle;
        self.fail(error.into());
        Outcome::Applied(None)
    }

    fn analyze(&mut self) -> Outcome {
        let image = match (self.phase, &self.image) {
            (Phase::ImageSelected | Phase::Error, Some(img)) => img.clone(),
            (phase, _) if phase.is_in_flight() => {
                return Outcome::Rejected(TransitionRejected::RequestInFlight)
            }
            (phase, _) => {
                return Outcome::Rejected(TransitionRejected::InvalidPhase {
                    action: "analyze",
                    phase,
                })
            }
        };
        self.food_items.clear();
        self.recommendations.clear();
        self.error = None;
        self.resume = Phase::ImageSelected;
        self.phase = Phase::Analyzing;
        let ticket = self.next_ticket();
        Outcome::Applied(Some(Effect::AnalyzeImage { ticket, image }))
    }

    fn recommend_exercise(&mut self) -> Outcome {
        match self.phase {
            Phase::FoodDetected | Phase::Complete => {
                if self.food_items.is_empty() {
                    return Outcome::Rejected(TransitionRejected::NoFoodItems);
                }
                self.resume = self.phase;
            }
            // failed recommendation keeps the detected food and its resume phase
            Phase::Error if !self.food_items.is_empty() => {}
            phase if phase.is_in_flight() => {
                return Outcome::Rejected(TransitionRejected::RequestInFlight)
            }
            phase => {
                return Outcome::Rejected(TransitionRejected::InvalidPhase {
                    action: "recommend exercise",
                    phase,
                })
            }
        }
        self.error = None;
        self.phase = Phase::RecommendingExercise;
        let ticket = self.next_ticket();
        Outcome::Applied(Some(Effect::RecommendExercise {
            ticket,
            food_items: self.food_items.clone(),
        }))
    }

    fn cancel(&mut self) -> Outcome {
        if !self.phase.is_in_flight() {
            return Outcome::Rejected(TransitionRejected::InvalidPhase {
                action: "cancel",
                phase: self.phase,
            });
        }
        self.next_ticket();
        self.phase = self.resume;
        Outcome::Applied(None)
    }

    fn retry(&mut self) -> Outcome {
        if self.phase != Phase::Error {
            return Outcome::Rejected(TransitionRejected::InvalidPhase {
                action: "retry",
                phase: self.phase,
            });
        }
        self.error = None;
        self.phase = self.resume;
        Outcome::Applied(None)
    }

    fn clear(&mut self) -> Outcome {
        self.next_ticket();
        self.phase = Phase::Idle;
        self.resume = Phase::Idle;
        self.image = None;
        self.food_items.clear();
        self.recommendations.clear();
        self.error = None;
        Outcome::Applied(None)
    }

    fn is_current(&self, phase: Phase, ticket: u64) -> bool {
        self.phase == phase && self.ticket == ticket
    }
}

/// Applies `event` to `state`. Rejected and stale events leave the state as it was.
pub fn reduce(mut state: WorkflowState, event: Event) -> (WorkflowState, Outcome) {
    let outcome = match event {
        Event::SelectImage(asset) => state.select_image(asset),
        Event::ImageRejected(error) => state.reject_image(error),
        Event::Analyze => state.analyze(),
        Event::RecommendExercise => state.recommend_exercise(),
        Event::Cancel => state.cancel(),
        Event::Retry => state.retry(),
        Event::Clear => state.clear(),
        Event::FoodDetected { ticket, items } => {
            if state.is_current(Phase::Analyzing, ticket) {
                state.food_items = items;
                state.phase = Phase::FoodDetected;
                state.resume = Phase::FoodDetected;
                Outcome::Applied(None)
            } else {
                Outcome::Stale
            }
        }
        Event::ExerciseRecommended {
            ticket,
            recommendations,
        } => {
            if state.is_current(Phase::RecommendingExercise, ticket) {
                state.recommendations = recommendations;
                state.phase = Phase::Complete;
                state.resume = Phase::Complete;
                Outcome::Applied(None)
            } else {
                Outcome::Stale
            }
        }
        Event::RequestFailed { ticket, error } => {
            if state.phase.is_in_flight() && state.ticket == ticket {
                state.fail(error);
                Outcome::Applied(None)
            } else {
                Outcome::Stale
            }
        }
    };
    (state, outcome)
}
