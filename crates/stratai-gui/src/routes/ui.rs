use axum::{
    Form, Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use stratai_core::{
    PDF_MIME, ResearchRequest, StratAiError, download_file_name, render_document,
};
use tracing::{instrument, warn};

use super::session::SessionCookie;
use crate::error::AppError;
use crate::metrics;
use crate::page::{MISSING_INPUT_WARNING, render_index};
use crate::state::{AppState, Flash, SessionStore};

#[derive(Debug, Default, Deserialize)]
pub struct ResearchForm {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub serper_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
}

pub fn ui_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/research", post(submit_research))
        .route("/report.pdf", get(download_report))
        .route("/session/end", post(end_session))
}

fn with_session_cookie(session: &SessionCookie, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Some(cookie) = session.set_cookie() {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

async fn index(State(state): State<AppState>, session: SessionCookie) -> Response {
    let context = state.sessions().take_for_render(&session.id);
    with_session_cookie(&session, Html(render_index(context.as_ref())))
}

#[instrument(skip_all, fields(session_id = %session.id))]
async fn submit_research(
    State(state): State<AppState>,
    session: SessionCookie,
    Form(form): Form<ResearchForm>,
) -> Response {
    let company = form.company.trim().to_string();
    let industry = form.industry.trim().to_string();
    let sessions = state.sessions();
    let research = state.research();

    let credentials = research
        .resolve_credentials(form.serper_api_key.as_deref(), form.openai_api_key.as_deref());

    let credentials = match credentials {
        Some(credentials) if !company.is_empty() && !industry.is_empty() => credentials,
        _ => {
            sessions.update(&session.id, |context| {
                context.company = company.clone();
                context.industry = industry.clone();
                context.flashes.push(Flash::warning(MISSING_INPUT_WARNING));
            });
            return with_session_cookie(&session, Redirect::to("/"));
        }
    };

    let request = ResearchRequest::new(company.clone(), industry.clone(), credentials);
    let outcome = research.research(&session.id, request).await;

    sessions.update(&session.id, |context| {
        context.company = company;
        context.industry = industry;
        match outcome {
            Ok(result) => context.result = Some(result),
            Err(err) => {
                context.result = None;
                context
                    .flashes
                    .push(Flash::error(format!("An error occurred during research: {err}")));
            }
        }
    });

    with_session_cookie(&session, Redirect::to("/"))
}

#[instrument(skip_all, fields(session_id = %session.id))]
async fn download_report(
    State(state): State<AppState>,
    session: SessionCookie,
) -> Result<Response, AppError> {
    let sessions = state.sessions();
    let context = sessions
        .get(&session.id)
        .filter(|context| context.result.is_some())
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "no research result for this session"))?;

    let file_name = download_file_name(&context.company, &context.industry);
    let rendered = tokio::task::spawn_blocking(move || {
        render_document(&context.company, &context.industry, context.result.as_deref())
    })
    .await
    .unwrap_or_else(|err| Err(StratAiError::Render(format!("PDF task failed: {err}"))));

    Ok(pdf_response(&sessions, &session.id, &file_name, rendered))
}

/// Attachment on success; otherwise an error flash on the page, leaving the
/// on-screen results in place.
fn pdf_response(
    sessions: &SessionStore,
    session_id: &str,
    file_name: &str,
    rendered: Result<Vec<u8>, StratAiError>,
) -> Response {
    let bytes = match rendered {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "pdf export failed");
            sessions.update(session_id, |context| {
                context
                    .flashes
                    .push(Flash::error(format!("Error generating PDF: {err}")));
            });
            return Redirect::to("/").into_response();
        }
    };

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file_name.replace(['"', '\\', '\r', '\n'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"report.pdf\""));

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(PDF_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

async fn end_session(State(state): State<AppState>, session: SessionCookie) -> Response {
    let sessions = state.sessions();
    if sessions.remove(&session.id) {
        metrics::session_ended(&session.id, sessions.len());
    }

    let mut response = Redirect::to("/").into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, SessionCookie::expire());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FlashKind;

    #[test]
    fn render_failure_redirects_with_an_error_flash() {
        let sessions = SessionStore::default();
        sessions.update("s1", |context| context.company = "Tata".into());

        let response = pdf_response(
            &sessions,
            "s1",
            "Tata_Automotive_AI_Use_Cases.pdf",
            Err(StratAiError::Render("font table missing".into())),
        );
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

        let context = sessions.take_for_render("s1").unwrap();
        assert_eq!(context.company, "Tata");
        assert_eq!(context.flashes.len(), 1);
        assert_eq!(context.flashes[0].kind, FlashKind::Error);
        assert!(context.flashes[0].message.starts_with("Error generating PDF: "));
        assert!(context.flashes[0].message.contains("font table missing"));
    }

    #[test]
    fn rendered_pdf_is_sent_as_attachment() {
        let sessions = SessionStore::default();
        let response = pdf_response(
            &sessions,
            "s1",
            "Tata_Automotive_AI_Use_Cases.pdf",
            Ok(b"%PDF-1.3".to_vec()),
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), PDF_MIME);
        assert!(sessions.is_empty());
    }
}
