use anyhow::Context;
use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::dto::{AnalyzeImageResponse, RecommendationRequest, RecommendationResponse};
use crate::config::AnalysisConfig;
use crate::workflow::dto::{ExerciseRecommendation, FoodItem, ImageAsset};
use crate::workflow::error::{Operation, WorkflowError};

pub const ANALYZE_IMAGE_PATH: &str = "/analyze-image";
pub const RECOMMENDATIONS_PATH: &str = "/get_exercise_recommendations";
pub const IMAGE_FIELD: &str = "image";

/// The remote image-analysis service. One request per call, no retries.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze_image(&self, image: &ImageAsset) -> Result<Vec<FoodItem>, WorkflowError>;

    async fn recommend_exercise(
        &self,
        food_items: &[FoodItem],
    ) -> Result<Vec<ExerciseRecommendation>, WorkflowError>;
}

#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpAnalysisClient {
    pub fn new(config: &AnalysisConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("burnfit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build analysis http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let req = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: Operation,
        req: RequestBuilder,
    ) -> Result<T, WorkflowError> {
        let res = req
            .send()
            .await
            .map_err(|e| WorkflowError::transport(operation, e))?;
        let status = res.status();
        if !status.is_success() {
            return Err(WorkflowError::transport(
                operation,
                format!("unexpected status {status}"),
            ));
        }
        let body = res
            .bytes()
            .await
            .map_err(|e| WorkflowError::transport(operation, e))?;
        debug!(%operation, bytes = body.len(), "analysis response received");
        serde_json::from_slice(&body).map_err(|e| WorkflowError::malformed(operation, e))
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze_image(&self, image: &ImageAsset) -> Result<Vec<FoodItem>, WorkflowError> {
        let op = Operation::AnalyzeImage;
        let part = multipart::Part::bytes(image.bytes.to_vec())
            .file_name(image.upload_name().to_string())
            .mime_str(&image.content_type)
            .map_err(|e| WorkflowError::transport(op, e))?;
        let form = multipart::Form::new().part(IMAGE_FIELD, part);

        let body: AnalyzeImageResponse = self
            .send(op, self.post(ANALYZE_IMAGE_PATH).multipart(form))
            .await?;
        check_food_items(&body.food_items).map_err(|d| WorkflowError::malformed(op, d))?;
        Ok(body.food_items)
    }

    async fn recommend_exercise(
        &self,
        food_items: &[FoodItem],
    ) -> Result<Vec<ExerciseRecommendation>, WorkflowError> {
        let op = Operation::RecommendExercise;
        let body: RecommendationResponse = self
            .send(
                op,
                self.post(RECOMMENDATIONS_PATH)
                    .json(&RecommendationRequest { food_items }),
            )
            .await?;
        check_recommendations(&body.recommendations)
            .map_err(|d| WorkflowError::malformed(op, d))?;
        Ok(body.recommendations)
    }
}

fn non_negative(field: &str, name: &str, v: f64) -> Result<(), String> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(format!("{field} of {name:?} must be a non-negative number, got {v}"))
    }
}

fn check_food_items(items: &[FoodItem]) -> Result<(), String> {
    for item in items {
        non_negative("calories", &item.name, item.calories)?;
    }
    Ok(())
}

fn check_recommendations(recs: &[ExerciseRecommendation]) -> Result<(), String> {
    for r in recs {
        non_negative("duration", &r.name, r.duration)?;
        non_negative("calories_burned", &r.name, r.calories_burned)?;
    }
    Ok(())
}

#[cfg(test)]
mod client_tests {
    use std::time::Duration;

    use axum::{
        extract::Multipart,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    use super::*;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: String, api_token: Option<&str>) -> HttpAnalysisClient {
        HttpAnalysisClient::new(&AnalysisConfig {
            base_url,
            api_token: api_token.map(str::to_string),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    /// Echoes the uploaded part back as a food item: name = "<field>:<file>:<mime>", calories = size.
    async fn echo_upload(mut mp: Multipart) -> Result<Json<Value>, StatusCode> {
        if let Some(field) = mp.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
            let name = format!(
                "{}:{}:{}",
                field.name().unwrap_or_default(),
                field.file_name().unwrap_or_default(),
                field.content_type().unwrap_or_default()
            );
            let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            return Ok(Json(json!({
                "food_items": [{ "food_item_name": name, "calories": data.len() }]
            })));
        }
        Err(StatusCode::BAD_REQUEST)
    }

    async fn burn_all(Json(body): Json<Value>) -> Json<Value> {
        let total: f64 = body["food_items"]
            .as_array()
            .map(|items| items.iter().filter_map(|i| i["calories"].as_f64()).sum())
            .unwrap_or_default();
        Json(json!({
            "recommendations": [{ "exercise_name": "walking", "duration": 20, "calories_burned": total }]
        }))
    }

    #[tokio::test]
    async fn analyze_image_sends_single_multipart_image_field() {
        let base = spawn(Router::new().route(ANALYZE_IMAGE_PATH, post(echo_upload))).await;
        let img = ImageAsset::new(vec![7u8; 12], "image/png").with_file_name("plate.png");

        let items = client(base, None).analyze_image(&img).await.unwrap();
        assert_eq!(items, vec![FoodItem::new("image:plate.png:image/png", 12.0)]);
    }

    #[tokio::test]
    async fn recommend_exercise_posts_food_items_as_json() {
        let base = spawn(Router::new().route(RECOMMENDATIONS_PATH, post(burn_all))).await;
        let food = vec![FoodItem::new("apple", 95.0), FoodItem::new("bagel", 245.0)];

        let recs = client(base, None).recommend_exercise(&food).await.unwrap();
        assert_eq!(recs, vec![ExerciseRecommendation::new("walking", 20.0, 340.0)]);
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let base = spawn(Router::new().route(
            ANALYZE_IMAGE_PATH,
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        ))
        .await;
        let img = ImageAsset::new(vec![1u8], "image/jpeg");

        let err = client(base, None).analyze_image(&img).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}"), None)
            .recommend_exercise(&[FoodItem::new("apple", 95.0)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn missing_fields_are_malformed_response() {
        let base = spawn(Router::new().route(
            RECOMMENDATIONS_PATH,
            post(|| async { Json(json!({ "exercises": [] })) }),
        ))
        .await;

        let err = client(base, None)
            .recommend_exercise(&[FoodItem::new("apple", 95.0)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
        assert_eq!(err.user_message(), "Failed to get exercise recommendations");
    }

    #[tokio::test]
    async fn negative_calories_are_malformed_response() {
        let base = spawn(Router::new().route(
            ANALYZE_IMAGE_PATH,
            post(|| async {
                Json(json!({ "food_items": [{ "food_item_name": "ghost", "calories": -5 }] }))
            }),
        ))
        .await;
        let img = ImageAsset::new(vec![1u8], "image/jpeg");

        let err = client(base, None).analyze_image(&img).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn bearer_token_is_attached_when_configured() {
        let base = spawn(Router::new().route(
            RECOMMENDATIONS_PATH,
            post(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer s3cret") => Ok(Json(json!({ "recommendations": [] }))),
                    _ => Err(StatusCode::UNAUTHORIZED),
                }
            }),
        ))
        .await;
        let food = [FoodItem::new("apple", 95.0)];

        assert!(client(base.clone(), Some("s3cret"))
            .recommend_exercise(&food)
            .await
            .unwrap()
            .is_empty());
        let err = client(base, None).recommend_exercise(&food).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = client("http://localhost:9/api/v1/ask_llama/".into(), None);
        assert_eq!(c.base_url, "http://localhost:9/api/v1/ask_llama");
    }
}
