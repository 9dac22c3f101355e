use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use super::PORTAL_PATH;
use super::error::WebError;
use super::extractor::{CurrentSession, Operator, TrustedOperator};
use super::render;
use super::state::AppState;
use super::traits::SessionStore;
use super::types::Notice;
use crate::audit::AuditTail;
use crate::bot::{BotBackend, Report, RestartOutcome};
use crate::types::FileName;

pub(super) const LOGS_UNAVAILABLE: &str = "Logs are unavailable right now, please try again later.";
pub(super) const NO_AUDIT_LOG: &str = "No audit log found";

/// Liveness probe.
pub(super) async fn health() -> &'static str {
    "200"
}

pub(super) async fn back_to_portal() -> Redirect {
    Redirect::to(PORTAL_PATH)
}

// ── Files ──────────────────────────────────────────────────────────

pub(super) async fn show_file<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    Path(name): Path<String>,
) -> Response {
    let Ok(name) = name.parse::<FileName>() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.files.read(&name).await {
        Ok(Some(bytes)) => (
            [(CONTENT_TYPE, state.files.content_type().to_string())],
            bytes,
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(error = %e, file = %name, "File read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
pub(super) struct DeleteForm {
    #[serde(default)]
    file: String,
}

pub(super) async fn delete_file<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    TrustedOperator(operator): TrustedOperator,
    Form(form): Form<DeleteForm>,
) -> Result<(PrivateCookieJar, Redirect), WebError> {
    let mut session = operator.session;

    let notice = match form.file.trim().parse::<FileName>() {
        Err(_) => Notice::danger("Illegal input"),
        Ok(name) => match state.files.delete(&name).await {
            Ok(()) => {
                let entry = format!("\"{}\" deleted file \"{name}\"", operator.username);
                if let Err(e) = state.audit.record(&entry).await {
                    tracing::error!(error = %e, "Audit write failed");
                }
                Notice::success(format!("Deleted file \"{name}\""))
            }
            Err(e) => {
                tracing::warn!(error = %e, file = %name, "File deletion failed");
                Notice::danger(e.to_string())
            }
        },
    };

    session.data.push_notice(notice);
    let jar = session.save(&state).await?;
    Ok((jar, Redirect::to(PORTAL_PATH)))
}

// ── Portal ─────────────────────────────────────────────────────────

pub(super) async fn portal<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    mut session: CurrentSession,
) -> Result<(PrivateCookieJar, Html<String>), WebError> {
    let notices = session.data.take_notices();
    let page = render::portal(session.data.username.as_ref(), &notices);

    let jar = if notices.is_empty() {
        session.jar
    } else {
        session.save(&state).await?
    };
    Ok((jar, page))
}

pub(super) async fn denied(operator: Operator) -> Html<String> {
    render::denied(&operator.username)
}

// ── Bot ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct ActionForm {
    #[serde(rename = "type", default)]
    kind: String,
}

fn report_page(title: &str, report: &Report) -> Html<String> {
    render::text_page(title, &report.body, report.notice.as_deref())
}

pub(super) async fn bot_action<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    TrustedOperator(operator): TrustedOperator,
    Form(form): Form<ActionForm>,
) -> Response {
    match form.kind.as_str() {
        "restart" => restart(&state, &operator).await.into_response(),
        "status" => status_page(&state).await.into_response(),
        _ => Redirect::to(PORTAL_PATH).into_response(),
    }
}

async fn restart<B: BotBackend, S>(state: &AppState<B, S>, operator: &Operator) -> Html<String> {
    match state.backend.restart().await {
        Ok(RestartOutcome::Accepted(report)) => {
            let entry = format!(
                "\"{}\" restarted service \"{}\"",
                operator.username,
                state.backend.service_name()
            );
            if let Err(e) = state.audit.record(&entry).await {
                tracing::error!(error = %e, "Audit write failed");
            }
            report_page("Restart", &report)
        }
        Ok(RestartOutcome::Refused(report)) => {
            tracing::warn!(user = %operator.username, "Restart refused by backend");
            report_page("Restart failed", &report)
        }
        Err(e) => {
            tracing::error!(error = %e, "Restart failed");
            render::text_page("Restart failed", &e.to_string(), None)
        }
    }
}

async fn status_page<B: BotBackend, S>(state: &AppState<B, S>) -> Html<String> {
    match state.backend.status().await {
        Ok(report) => report_page("Status", &report),
        Err(e) => {
            tracing::error!(error = %e, "Status query failed");
            render::text_page("Status", &e.to_string(), None)
        }
    }
}

pub(super) async fn bot_status<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    _operator: Operator,
) -> Html<String> {
    status_page(&state).await
}

pub(super) async fn bot_log<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    _operator: Operator,
) -> Html<String> {
    match state.backend.logs().await {
        Ok(Some(log)) => render::text_page("Log (UTC)", &log, None),
        Ok(None) => render::text_page("Log (UTC)", LOGS_UNAVAILABLE, None),
        Err(e) => {
            tracing::error!(error = %e, "Log query failed");
            render::text_page("Log (UTC)", &e.to_string(), None)
        }
    }
}

// ── Audit ──────────────────────────────────────────────────────────

pub(super) async fn audit<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    _operator: Operator,
) -> Html<String> {
    let text = match state.audit.read_recent(state.settings.audit_recent).await {
        Ok(AuditTail::Entries(entries)) => entries.join("\n"),
        Ok(AuditTail::Empty) => NO_AUDIT_LOG.to_string(),
        Err(e) => {
            tracing::error!(error = %e, "Audit read failed");
            e.to_string()
        }
    };
    render::text_page("Audit log", &text, None)
}
