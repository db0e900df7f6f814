use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/toggle", post(handlers::toggle_form))
        .route("/habits", post(handlers::save_habit_form))
        .route("/api/week", get(handlers::get_week))
        .route("/api/heatmap", get(handlers::get_heatmap))
        .route("/api/completions/toggle", post(handlers::toggle))
        .route("/api/habits", get(handlers::list_habits).post(handlers::save_habit))
        .route("/api/habits/move", post(handlers::move_habit))
        .route("/api/habits/:id", delete(handlers::delete_habit))
        .route("/api/sort", get(handlers::get_sort).put(handlers::put_sort))
        .route("/api/theme", get(handlers::get_theme).put(handlers::put_theme))
        .route(
            "/api/session",
            get(handlers::get_session)
                .post(handlers::sign_in)
                .delete(handlers::sign_out),
        )
        .route("/api/session/oauth/:provider", get(handlers::oauth_redirect))
        .with_state(state)
}
