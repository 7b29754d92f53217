//! Upload, analyze, display workflow shared by the web and mobile surfaces.

pub mod dto;
pub mod error;
pub mod machine;
pub mod services;
pub mod validation;

pub use dto::{ExerciseRecommendation, FoodItem, ImageAsset, WorkflowView};
pub use error::{Operation, TransitionRejected, WorkflowError};
pub use machine::{reduce, Effect, Event, Outcome, Phase, WorkflowState};
pub use services::Workflow;
pub use validation::{ImageRules, Surface, ValidationError};
