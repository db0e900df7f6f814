use crate::coordinator::StorageMode;
use crate::dates::{date_key, navigable, today};
use crate::errors::AppError;
use crate::models::{
    DeleteRequest, DeleteResponse, Habit, HabitDraft, MoveRequest, MoveResponse, SaveResponse,
    SessionResponse, SignInRequest, SortPayload, ThemePayload, ToggleRequest, ToggleResponse,
    WeekQuery,
};
use crate::state::AppState;
use crate::stats::{Heatmap, WeekView};
use crate::ui::render_index;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use chrono::NaiveDate;
use tracing::{info, warn};

fn anchor_date(query: &WeekQuery) -> Result<NaiveDate, AppError> {
    let anchor = query.date.unwrap_or_else(today);
    if !navigable(anchor) {
        warn!(%anchor, "week out of range");
        return Err(AppError::bad_request("date is outside the supported calendar range"));
    }
    Ok(anchor)
}

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Html<String>, AppError> {
    let anchor = anchor_date(&query)?;
    state.coordinator.ensure_loaded().await;
    let view = state.coordinator.week_view(anchor).await;
    let mode = state.coordinator.mode().await;
    let theme = state.local.read_theme().await;
    Ok(Html(render_index(&view, &mode, theme)))
}

pub async fn toggle_form(
    State(state): State<AppState>,
    Form(payload): Form<ToggleRequest>,
) -> Redirect {
    state.coordinator.ensure_loaded().await;
    state
        .coordinator
        .toggle_completion(&payload.habit_id, payload.date)
        .await;
    Redirect::to(&format!("/?date={}", date_key(payload.date)))
}

pub async fn save_habit_form(
    State(state): State<AppState>,
    Form(draft): Form<HabitDraft>,
) -> Redirect {
    state.coordinator.ensure_loaded().await;
    state.coordinator.save_habit(draft).await;
    Redirect::to("/")
}

pub async fn get_week(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<WeekView>, AppError> {
    let anchor = anchor_date(&query)?;
    state.coordinator.ensure_loaded().await;
    Ok(Json(state.coordinator.week_view(anchor).await))
}

pub async fn get_heatmap(State(state): State<AppState>) -> Json<Heatmap> {
    state.coordinator.ensure_loaded().await;
    Json(state.coordinator.heatmap().await)
}

pub async fn toggle(
    State(state): State<AppState>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let habit_id = payload.habit_id.trim();
    if habit_id.is_empty() {
        return Err(AppError::bad_request("habit_id must not be empty"));
    }

    state.coordinator.ensure_loaded().await;
    let completed = state
        .coordinator
        .toggle_completion(habit_id, payload.date)
        .await;
    Ok(Json(ToggleResponse {
        habit_id: habit_id.to_string(),
        date: payload.date,
        completed,
        streak: state.coordinator.streak(habit_id).await,
    }))
}

pub async fn list_habits(State(state): State<AppState>) -> Json<Vec<Habit>> {
    state.coordinator.ensure_loaded().await;
    Json(state.coordinator.sorted_habits().await)
}

pub async fn save_habit(
    State(state): State<AppState>,
    Json(draft): Json<HabitDraft>,
) -> Json<SaveResponse> {
    state.coordinator.ensure_loaded().await;
    let saved = state.coordinator.save_habit(draft).await;
    Json(SaveResponse { saved })
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Query(request): Query<DeleteRequest>,
) -> Json<DeleteResponse> {
    state.coordinator.ensure_loaded().await;
    let outcome = state
        .coordinator
        .delete_habit(&habit_id, request.confirm)
        .await;
    Json(DeleteResponse { outcome })
}

pub async fn move_habit(
    State(state): State<AppState>,
    Json(request): Json<MoveRequest>,
) -> Json<MoveResponse> {
    state.coordinator.ensure_loaded().await;
    let moved = state
        .coordinator
        .move_habit(request.index, request.direction)
        .await;
    Json(MoveResponse {
        moved,
        habits: state.coordinator.sorted_habits().await,
    })
}

pub async fn get_sort(State(state): State<AppState>) -> Json<SortPayload> {
    Json(SortPayload {
        mode: state.coordinator.sort_mode().await,
    })
}

pub async fn put_sort(
    State(state): State<AppState>,
    Json(payload): Json<SortPayload>,
) -> Json<SortPayload> {
    state.coordinator.set_sort_mode(payload.mode).await;
    Json(payload)
}

pub async fn get_theme(State(state): State<AppState>) -> Json<ThemePayload> {
    Json(ThemePayload {
        theme: state.local.read_theme().await,
    })
}

pub async fn put_theme(
    State(state): State<AppState>,
    Json(payload): Json<ThemePayload>,
) -> Json<ThemePayload> {
    state.local.write_theme(payload.theme).await;
    Json(payload)
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    state.coordinator.ensure_loaded().await;
    Json(session_response(&state.coordinator.mode().await))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let Some(auth) = state.auth.clone() else {
        return Err(AppError::unavailable("remote sync is not configured"));
    };
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }

    let session = if request.sign_up {
        auth.sign_up(email, &request.password).await?
    } else {
        Some(auth.sign_in_with_password(email, &request.password).await?)
    };
    match session {
        Some(session) => state.coordinator.sign_in(session).await,
        None => info!("sign-up pending confirmation"),
    }

    state.coordinator.ensure_loaded().await;
    Ok(Json(session_response(&state.coordinator.mode().await)))
}

pub async fn sign_out(State(state): State<AppState>) -> Json<SessionResponse> {
    if let Some(session) = state.coordinator.sign_out().await {
        if let Some(auth) = &state.auth {
            if let Err(err) = auth.sign_out(&session).await {
                warn!("provider sign-out failed: {err}");
            }
        }
    }

    state.coordinator.ensure_loaded().await;
    Json(session_response(&state.coordinator.mode().await))
}

pub async fn oauth_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Redirect, AppError> {
    let Some(auth) = &state.auth else {
        return Err(AppError::unavailable("remote sync is not configured"));
    };
    if provider.is_empty() || !provider.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::bad_request("unknown provider"));
    }
    Ok(Redirect::to(&auth.oauth_url(&provider)))
}

fn session_response(mode: &StorageMode) -> SessionResponse {
    match mode {
        StorageMode::Guest => SessionResponse {
            mode: mode.label().to_string(),
            user_id: None,
            email: None,
            display_name: None,
        },
        StorageMode::Authenticated(principal) => SessionResponse {
            mode: mode.label().to_string(),
            user_id: Some(principal.id.clone()),
            email: principal.email.clone(),
            display_name: principal.display_name.clone(),
        },
    }
}
