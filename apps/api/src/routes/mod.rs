pub mod health;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};

use crate::auth::require_auth;
use crate::notifications::handlers as notifications;
use crate::plants::handlers as plants;
use crate::rate_limit::enforce_rate_limit;
use crate::state::AppState;
use crate::stats::get_stats;
use crate::uploads::handlers as uploads;

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        // Plants
        .route(
            "/api/plants",
            get(plants::list_plants).post(plants::create_plant),
        )
        .route("/api/plants/water", post(plants::water_plants))
        .route("/api/plants/slug/:slug", get(plants::get_plant_by_slug))
        .route(
            "/api/plants/:id",
            get(plants::get_plant)
                .patch(plants::update_plant)
                .delete(plants::delete_plant),
        )
        // Uploads
        .route("/api/uploads/presign", post(uploads::presign_upload))
        .route("/api/uploads/register", post(uploads::register_upload))
        .route("/api/uploads/usage", get(uploads::upload_usage))
        .route("/api/uploads/*key", delete(uploads::delete_upload))
        // Notifications
        .route(
            "/api/notifications",
            get(notifications::get_notification_config)
                .put(notifications::put_notification_config)
                .delete(notifications::delete_notification_config),
        )
        // Layers run bottom-up: auth first, then the limiter sees the user.
        .route_layer(from_fn_with_state(state.clone(), enforce_rate_limit))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/stats", get(get_stats))
        .merge(protected)
        .with_state(state)
}
