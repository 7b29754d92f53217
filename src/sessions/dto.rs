use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::workflow::{Surface, WorkflowView};

/// Request body for opening a screen's workflow.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default = "default_surface")]
    pub surface: Surface,
}

fn default_surface() -> Surface {
    Surface::Web
}

/// Session snapshot returned by every session route.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub surface: Surface,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub workflow: WorkflowView,
}
