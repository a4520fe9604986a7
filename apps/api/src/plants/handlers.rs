use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::JsonBody;
use crate::models::plant::{CreatePlantRequest, PlantPatch};
use crate::plants::photos::{with_photo_urls, PlantView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterRequest {
    #[serde(default)]
    pub plant_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WaterResponse {
    pub success: bool,
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// GET /api/plants
pub async fn list_plants(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<PlantView>>, AppError> {
    let plants = state.plants.get_all(&user).await?;
    let mut views = Vec::with_capacity(plants.len());
    for plant in plants {
        views.push(with_photo_urls(state.objects.as_ref(), &user, plant).await);
    }
    Ok(Json(views))
}

/// POST /api/plants
pub async fn create_plant(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<CreatePlantRequest>,
) -> Result<(StatusCode, Json<PlantView>), AppError> {
    let plant = state.plants.create(&user, request).await?;
    state.stats.invalidate();
    let view = with_photo_urls(state.objects.as_ref(), &user, plant).await;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /api/plants/water
pub async fn water_plants(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<WaterRequest>,
) -> Result<Json<WaterResponse>, AppError> {
    if request.plant_ids.is_empty() {
        return Err(AppError::BadRequest(
            "At least one plant ID is required".to_string(),
        ));
    }
    let updated = state.plants.water_many(&user, &request.plant_ids).await?;
    Ok(Json(WaterResponse {
        success: true,
        updated,
    }))
}

/// GET /api/plants/slug/:slug
pub async fn get_plant_by_slug(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<PlantView>, AppError> {
    let plant = state.plants.get_by_slug(&user, &slug).await?;
    Ok(Json(with_photo_urls(state.objects.as_ref(), &user, plant).await))
}

/// GET /api/plants/:id
pub async fn get_plant(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PlantView>, AppError> {
    let plant = state.plants.get_by_id(&user, &id).await?;
    Ok(Json(with_photo_urls(state.objects.as_ref(), &user, plant).await))
}

/// PATCH /api/plants/:id
pub async fn update_plant(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<PlantPatch>,
) -> Result<Json<PlantView>, AppError> {
    let plant = state.plants.update(&user, &id, patch).await?;
    Ok(Json(with_photo_urls(state.objects.as_ref(), &user, plant).await))
}

/// DELETE /api/plants/:id
pub async fn delete_plant(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.plants.delete(&user, &id).await? {
        return Err(AppError::NotFound("Plant"));
    }
    state.stats.invalidate();
    Ok(Json(SuccessResponse { success: true }))
}
