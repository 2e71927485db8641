use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateReviewRequest, Review};

pub struct ReviewService {
    supabase: SupabaseClient,
}

impl ReviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_review(
        &self,
        reviewer_id: Uuid,
        request: CreateReviewRequest,
        auth_token: &str,
    ) -> Result<Review> {
        debug!(
            "Creating review for doctor {} by patient {}",
            request.doctor_id, reviewer_id
        );

        let review_data = json!({
            "reviewer_id": reviewer_id,
            "doctor_id": request.doctor_id,
            "body": request.body,
            "rating": request.rating,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/reviews",
                Some(auth_token),
                Some(review_data),
                Some(headers),
            )
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Failed to create review"));
        }

        let review: Review = serde_json::from_value(result[0].clone())?;
        Ok(review)
    }

    pub async fn list_reviews(
        &self,
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Review>> {
        let path = match doctor_id {
            Some(doctor_id) => format!(
                "/rest/v1/reviews?doctor_id=eq.{}&order=created_at.desc",
                doctor_id
            ),
            None => "/rest/v1/reviews?order=created_at.desc".to_string(),
        };

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let reviews: Vec<Review> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(reviews)
    }
}
