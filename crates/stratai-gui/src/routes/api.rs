use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    routing::post,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratai_core::{ReportSection, ResearchRequest, TaskOutput, report_sections};
use tracing::instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::page::MISSING_INPUT_WARNING;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResearchApiRequest {
    pub company: String,
    pub industry: String,
    #[serde(default)]
    pub serper_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResearchApiResponse {
    pub request_id: String,
    pub company: String,
    pub industry: String,
    pub sections: Vec<ReportSection>,
    pub outputs: Vec<TaskOutput>,
    pub generated_at: DateTime<Utc>,
}

pub fn api_router() -> Router<AppState> {
    Router::new().route("/research", post(run_research))
}

#[instrument(skip_all, fields(company = %payload.company, industry = %payload.industry))]
async fn run_research(
    GuardedState(state): GuardedState,
    Json(payload): Json<ResearchApiRequest>,
) -> Result<Json<ResearchApiResponse>, AppError> {
    let company = payload.company.trim().to_string();
    let industry = payload.industry.trim().to_string();
    let research = state.research();

    let credentials = research
        .resolve_credentials(
            payload.serper_api_key.as_deref(),
            payload.openai_api_key.as_deref(),
        )
        .filter(|_| !company.is_empty() && !industry.is_empty())
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, MISSING_INPUT_WARNING))?;

    let request_id = Uuid::new_v4().to_string();
    let result = research
        .research(
            &request_id,
            ResearchRequest::new(company.clone(), industry.clone(), credentials),
        )
        .await?;

    Ok(Json(ResearchApiResponse {
        request_id,
        company,
        industry,
        sections: report_sections(&result),
        outputs: result.outputs().to_vec(),
        generated_at: Utc::now(),
    }))
}

/// State extractor that enforces the optional bearer token.
pub struct GuardedState(pub AppState);

#[async_trait]
impl FromRequestParts<AppState> for GuardedState {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let app_state = state.clone();

        if let Some(expected) = app_state.auth_token() {
            let provided = parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim);

            match provided {
                Some(token) if token == expected.as_str() => {}
                _ => {
                    return Err(AppError::new(
                        StatusCode::UNAUTHORIZED,
                        "invalid auth token",
                    ));
                }
            }
        }

        Ok(GuardedState(app_state))
    }
}
