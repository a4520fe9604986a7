use axum::{extract::State, http::StatusCode, Json};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::JsonBody;
use crate::models::notification::{NotificationConfig, NotificationSettings};
use crate::plants::handlers::SuccessResponse;
use crate::state::AppState;

/// GET /api/notifications
pub async fn get_notification_config(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<NotificationConfig>, AppError> {
    Ok(Json(state.notifications.get(&user).await?))
}

/// PUT /api/notifications
/// 201 when the config is created, 200 when it replaces an existing one.
pub async fn put_notification_config(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(settings): JsonBody<NotificationSettings>,
) -> Result<(StatusCode, Json<NotificationConfig>), AppError> {
    let (config, created) = state.notifications.upsert(&user, settings).await?;
    state.stats.invalidate();
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(config)))
}

/// DELETE /api/notifications
pub async fn delete_notification_config(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.notifications.delete(&user).await? {
        return Err(AppError::NotFound("Notification config"));
    }
    state.stats.invalidate();
    Ok(Json(SuccessResponse { success: true }))
}
