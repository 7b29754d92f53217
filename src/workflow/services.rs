use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dto::{ImageAsset, WorkflowView};
use super::error::{Operation, TransitionRejected, WorkflowError};
use super::machine::{reduce, Effect, Event, Outcome, WorkflowState};
use super::validation::{ImageRules, ValidationError};
use crate::analysis::AnalysisClient;

struct Inner {
    state: WorkflowState,
    inflight: Option<CancellationToken>,
}

impl Inner {
    fn dispatch(&mut self, event: Event) -> Outcome {
        let (state, outcome) = reduce(std::mem::take(&mut self.state), event);
        self.state = state;
        outcome
    }

    fn view(&self) -> WorkflowView {
        WorkflowView::from(&self.state)
    }
}

/// One screen's workflow: runs the state machine and executes its remote calls.
pub struct Workflow {
    inner: Mutex<Inner>,
    client: Arc<dyn AnalysisClient>,
    timeout: Duration,
}

impl Workflow {
    pub fn new(client: Arc<dyn AnalysisClient>, rules: ImageRules, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: WorkflowState::new(rules),
                inflight: None,
            }),
            client,
            timeout,
        }
    }

    pub async fn view(&self) -> WorkflowView {
        self.inner.lock().await.view()
    }

    pub async fn select_image(&self, asset: ImageAsset) -> Result<WorkflowView, TransitionRejected> {
        self.act(Event::SelectImage(asset)).await
    }

    pub async fn analyze(&self) -> Result<WorkflowView, TransitionRejected> {
        self.act(Event::Analyze).await
    }

    pub async fn recommend_exercise(&self) -> Result<WorkflowView, TransitionRejected> {
        self.act(Event::RecommendExercise).await
    }

    pub async fn cancel(&self) -> Result<WorkflowView, TransitionRejected> {
        self.act(Event::Cancel).await
    }

    pub async fn retry(&self) -> Result<WorkflowView, TransitionRejected> {
        self.act(Event::Retry).await
    }

    /// Records an image that failed before it could be validated, such as an
    /// upload cut off by the body limit.
    pub async fn reject_image(
        &self,
        error: ValidationError,
    ) -> Result<WorkflowView, TransitionRejected> {
        self.act(Event::ImageRejected(error)).await
    }

    /// Accepted from every phase. Abandons any in-flight call.
    pub async fn clear(&self) -> WorkflowView {
        let mut inner = self.inner.lock().await;
        inner.dispatch(Event::Clear);
        if let Some(t) = inner.inflight.take() {
            t.cancel();
        }
        debug!("workflow cleared");
        inner.view()
    }

    async fn act(&self, event: Event) -> Result<WorkflowView, TransitionRejected> {
        let aborts = matches!(event, Event::Cancel);
        let (effect, token) = {
            let mut inner = self.inner.lock().await;
            match inner.dispatch(event) {
                Outcome::Rejected(r) => {
                    debug!(reason = %r, phase = ?inner.state.phase, "transition rejected");
                    return Err(r);
                }
                Outcome::Applied(Some(effect)) => {
                    let token = CancellationToken::new();
                    inner.inflight = Some(token.clone());
                    (effect, token)
                }
                Outcome::Applied(None) | Outcome::Stale => {
                    if aborts {
                        if let Some(t) = inner.inflight.take() {
                            t.cancel();
                        }
                    }
                    debug!(phase = ?inner.state.phase, "transition applied");
                    return Ok(inner.view());
                }
            }
        };

        let ticket = effect.ticket();
        info!(ticket, "remote call started");
        let completion = tokio::select! {
            _ = token.cancelled() => None,
            ev = self.run(effect) => Some(ev),
        };

        let mut inner = self.inner.lock().await;
        match completion {
            Some(ev) => {
                if let Outcome::Stale = inner.dispatch(ev) {
                    debug!(ticket, "dropping stale completion");
                }
            }
            None => debug!(ticket, "remote call abandoned"),
        }
        if !inner.state.phase.is_in_flight() {
            inner.inflight = None;
        }
        Ok(inner.view())
    }

    async fn run(&self, effect: Effect) -> Event {
        match effect {
            Effect::AnalyzeImage { ticket, image } => {
                match self
                    .bounded(Operation::AnalyzeImage, self.client.analyze_image(&image))
                    .await
                {
                    Ok(items) => Event::FoodDetected { ticket, items },
                    Err(error) => Event::RequestFailed { ticket, error },
                }
            }
            Effect::RecommendExercise { ticket, food_items } => {
                match self
                    .bounded(
                        Operation::RecommendExercise,
                        self.client.recommend_exercise(&food_items),
                    )
                    .await
                {
                    Ok(recommendations) => Event::ExerciseRecommended {
                        ticket,
                        recommendations,
                    },
                    Err(error) => Event::RequestFailed { ticket, error },
                }
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: Operation,
        call: impl Future<Output = Result<T, WorkflowError>>,
    ) -> Result<T, WorkflowError> {
        let res = match tokio::time::timeout(self.timeout, call).await {
            Ok(res) => res,
            Err(_) => Err(WorkflowError::Timeout {
                operation,
                after: self.timeout,
            }),
        };
        if let Err(e) = &res {
            warn!(error = %e, kind = e.kind(), "remote call failed");
        }
        res
    }
}
