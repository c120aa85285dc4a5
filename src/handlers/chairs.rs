// src/handlers/chairs.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{AdminUser, AuthenticatedUser},
    models::chair::{
        AddColorPayload, Chair, ChairColor, ChairWithColors, CreateChairPayload, UpdateChairPayload,
        UpdateColorPayload,
    },
};

// POST /api/chairs
#[utoipa::path(
    post,
    path = "/api/chairs",
    tag = "Chairs",
    request_body = CreateChairPayload,
    responses(
        (status = 201, description = "Modelo cadastrado", body = Chair),
        (status = 409, description = "Modelo já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_chair(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(payload): Json<CreateChairPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let chair = app_state.chair_service.create_chair(&payload.model_name).await?;
    Ok((StatusCode::CREATED, Json(chair)))
}

// GET /api/chairs
#[utoipa::path(
    get,
    path = "/api/chairs",
    tag = "Chairs",
    responses((status = 200, description = "Catálogo ativo", body = Vec<ChairWithColors>)),
    security(("api_jwt" = []))
)]
pub async fn list_chairs(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<ChairWithColors>>, AppError> {
    Ok(Json(app_state.chair_service.catalog().await?))
}

// POST /api/chairs/{id}/colors
#[utoipa::path(
    post,
    path = "/api/chairs/{id}/colors",
    tag = "Chairs",
    params(("id" = Uuid, Path, description = "ID da cadeira")),
    request_body = AddColorPayload,
    responses(
        (status = 201, description = "Cor adicionada", body = ChairColor),
        (status = 404, description = "Cadeira não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_color(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddColorPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let color = app_state.chair_service.add_color(id, &payload).await?;
    Ok((StatusCode::CREATED, Json(color)))
}

// PUT /api/chairs/{id}
#[utoipa::path(
    put,
    path = "/api/chairs/{id}",
    tag = "Chairs",
    params(("id" = Uuid, Path, description = "ID da cadeira")),
    request_body = UpdateChairPayload,
    responses(
        (status = 200, description = "Modelo atualizado", body = Chair),
        (status = 404, description = "Cadeira não encontrada"),
        (status = 409, description = "Modelo já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_chair(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateChairPayload>,
) -> Result<Json<Chair>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.chair_service.update_chair(id, &payload).await?))
}

// DELETE /api/chairs/{id}
#[utoipa::path(
    delete,
    path = "/api/chairs/{id}",
    tag = "Chairs",
    params(("id" = Uuid, Path, description = "ID da cadeira")),
    responses(
        (status = 204, description = "Modelo e cores excluídos"),
        (status = 404, description = "Cadeira não encontrada"),
        (status = 409, description = "Modelo usado em requisitos de leads")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_chair(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.chair_service.delete_chair(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// PUT /api/chairs/{id}/colors/{color_id}
#[utoipa::path(
    put,
    path = "/api/chairs/{id}/colors/{color_id}",
    tag = "Chairs",
    params(
        ("id" = Uuid, Path, description = "ID da cadeira"),
        ("color_id" = Uuid, Path, description = "ID da cor")
    ),
    request_body = UpdateColorPayload,
    responses(
        (status = 200, description = "Cor atualizada", body = ChairColor),
        (status = 404, description = "Cor não encontrada nesta cadeira")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_color(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path((id, color_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateColorPayload>,
) -> Result<Json<ChairColor>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.chair_service.update_color(id, color_id, &payload).await?))
}

// DELETE /api/chairs/{id}/colors/{color_id}
#[utoipa::path(
    delete,
    path = "/api/chairs/{id}/colors/{color_id}",
    tag = "Chairs",
    params(
        ("id" = Uuid, Path, description = "ID da cadeira"),
        ("color_id" = Uuid, Path, description = "ID da cor")
    ),
    responses(
        (status = 204, description = "Cor removida"),
        (status = 404, description = "Cor não encontrada nesta cadeira"),
        (status = 409, description = "Cor usada em requisitos de leads")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_color(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path((id, color_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    app_state.chair_service.delete_color(id, color_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
