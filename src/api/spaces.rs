//! Space and element endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{error_response, AppState, AuthUser};
use crate::presence::{PlacedElement, Position};
use crate::spaces::{Space, SpaceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/space", post(create_space))
        .route("/space/all", get(list_spaces))
        .route("/space/element", post(place_element))
        .route("/space/{space_id}", get(get_space).delete(delete_space))
        .route("/admin/element", post(create_element))
}

fn space_error(err: SpaceError) -> Response {
    let status = match err {
        SpaceError::Forbidden => StatusCode::FORBIDDEN,
        SpaceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, err.to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub name: String,
    pub dimensions: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpaceResponse {
    pub space_id: String,
}

async fn create_space(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSpaceRequest>,
) -> Response {
    match state
        .spaces
        .create_space(user.user_id(), &req.name, &req.dimensions)
        .await
    {
        Ok(space) => Json(CreateSpaceResponse { space_id: space.id }).into_response(),
        Err(e) => space_error(e),
    }
}

#[derive(Debug, Serialize)]
pub struct SpaceSummary {
    pub id: String,
    pub name: String,
    pub dimensions: String,
}

impl From<Space> for SpaceSummary {
    fn from(space: Space) -> Self {
        Self {
            dimensions: space.dimensions(),
            id: space.id,
            name: space.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpaceListResponse {
    pub spaces: Vec<SpaceSummary>,
}

async fn list_spaces(State(state): State<AppState>, user: AuthUser) -> Response {
    match state.spaces.list_spaces(user.user_id()).await {
        Ok(spaces) => Json(SpaceListResponse {
            spaces: spaces.into_iter().map(SpaceSummary::from).collect(),
        })
        .into_response(),
        Err(e) => space_error(e),
    }
}

#[derive(Debug, Serialize)]
pub struct SpaceResponse {
    pub dimensions: String,
    pub elements: Vec<PlacedElement>,
}

async fn get_space(State(state): State<AppState>, Path(space_id): Path<String>) -> Response {
    let space = match state.spaces.get_space(&space_id).await {
        Ok(Some(space)) => space,
        Ok(None) => return space_error(SpaceError::SpaceNotFound),
        Err(e) => return space_error(e),
    };
    match state.spaces.space_elements(&space_id).await {
        Ok(elements) => Json(SpaceResponse {
            dimensions: space.dimensions(),
            elements,
        })
        .into_response(),
        Err(e) => space_error(e),
    }
}

async fn delete_space(
    State(state): State<AppState>,
    user: AuthUser,
    Path(space_id): Path<String>,
) -> Response {
    match state.spaces.delete_space(&space_id, user.user_id()).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => space_error(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceElementRequest {
    pub space_id: String,
    pub element_id: String,
    pub x: i64,
    pub y: i64,
}

async fn place_element(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PlaceElementRequest>,
) -> Response {
    match state
        .spaces
        .place_element(
            user.user_id(),
            &req.space_id,
            &req.element_id,
            Position::new(req.x, req.y),
        )
        .await
    {
        Ok(placed) => Json(placed).into_response(),
        Err(e) => space_error(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateElementRequest {
    pub image_url: String,
    pub width: i64,
    pub height: i64,
    #[serde(rename = "static", default)]
    pub is_static: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateElementResponse {
    pub id: String,
}

async fn create_element(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateElementRequest>,
) -> Response {
    if let Err(rejection) = user.require_admin() {
        return rejection;
    }
    match state
        .spaces
        .create_element(&req.image_url, req.width, req.height, req.is_static)
        .await
    {
        Ok(element) => Json(CreateElementResponse { id: element.id }).into_response(),
        Err(e) => space_error(e),
    }
}
