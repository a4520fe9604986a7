use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::JsonBody;
use crate::plants::handlers::SuccessResponse;
use crate::state::AppState;

use super::manager::{PresignRequest, PresignedUpload, UploadUsage};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub key: String,
}

/// POST /api/uploads/presign
pub async fn presign_upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<PresignRequest>,
) -> Result<Json<PresignedUpload>, AppError> {
    Ok(Json(
        state.uploads.issue_presigned_upload(&user, request).await?,
    ))
}

/// POST /api/uploads/register
pub async fn register_upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.uploads.register(&user, &request.key).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/uploads/usage
pub async fn upload_usage(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UploadUsage>, AppError> {
    Ok(Json(state.uploads.usage(&user).await?))
}

/// DELETE /api/uploads/*key
pub async fn delete_upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(key): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.uploads.delete_upload(&user, &key).await?;
    Ok(Json(SuccessResponse { success: true }))
}
