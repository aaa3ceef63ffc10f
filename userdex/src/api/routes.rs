use crate::api::ApiError;
use crate::model::User;
use crate::store::UserStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type SharedStore = Arc<dyn UserStore>;

#[derive(Debug, Deserialize)]
pub struct CreateIndexParams {
    #[serde(rename = "indexName")]
    pub index_name: String,
}

pub async fn create_index(
    State(store): State<SharedStore>,
    Query(params): Query<CreateIndexParams>,
) -> Result<String, ApiError> {
    store.create_index(&params.index_name).await.map_err(|e| {
        tracing::error!("Failed to create index '{}': {:?}", params.index_name, e);
        ApiError::CreateIndex
    })?;

    tracing::info!("Index '{}' is ready", params.index_name);
    Ok(format!("Index '{}' created", params.index_name))
}

async fn upsert(store: &dyn UserStore, user: &User) -> Result<(), ApiError> {
    store.upsert(user).await.map_err(|e| {
        tracing::error!("Failed to upsert user '{}': {:?}", user.key, e);
        ApiError::Upsert
    })
}

pub async fn add_user(
    State(store): State<SharedStore>,
    Json(user): Json<User>,
) -> Result<&'static str, ApiError> {
    upsert(store.as_ref(), &user).await?;
    tracing::debug!("Added user '{}'", user.key);
    Ok("User added successfully")
}

/// Same upsert as [`add_user`], exposed under its own route.
pub async fn update_user(
    State(store): State<SharedStore>,
    Json(user): Json<User>,
) -> Result<&'static str, ApiError> {
    upsert(store.as_ref(), &user).await?;
    tracing::debug!("Updated user '{}'", user.key);
    Ok("User updated successfully")
}

pub async fn get_user(
    Path(key): Path<String>,
    State(store): State<SharedStore>,
) -> Result<Json<User>, ApiError> {
    match store.get(&key).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => {
            tracing::error!("Failed to fetch user '{}': {:?}", key, e);
            Err(ApiError::Retrieve)
        }
    }
}

pub async fn get_all_users(State(store): State<SharedStore>) -> Result<Json<Vec<User>>, ApiError> {
    store.get_all().await.map(Json).map_err(|e| {
        tracing::error!("Failed to fetch users: {:?}", e);
        ApiError::RetrieveAll
    })
}

pub async fn delete_user(
    Path(key): Path<String>,
    State(store): State<SharedStore>,
) -> Result<&'static str, ApiError> {
    match store.delete(&key).await {
        Ok(true) => Ok("User deleted successfully"),
        Ok(false) => {
            tracing::warn!("User '{}' was not deleted", key);
            Err(ApiError::Delete)
        }
        Err(e) => {
            tracing::error!("Failed to delete user '{}': {:?}", key, e);
            Err(ApiError::Delete)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    pub deleted: u64,
}

pub async fn delete_all_users(
    State(store): State<SharedStore>,
) -> Result<Json<DeleteAllResponse>, ApiError> {
    let deleted = store.delete_all().await.map_err(|e| {
        tracing::error!("Failed to delete users: {:?}", e);
        ApiError::DeleteAll
    })?;

    tracing::info!("Deleted {} users", deleted);
    Ok(Json(DeleteAllResponse { deleted }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
}

pub async fn health(State(store): State<SharedStore>) -> (StatusCode, Json<HealthResponse>) {
    let backend = store.backend_name().to_string();
    match store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                backend,
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check against {} failed: {}", backend, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    backend,
                }),
            )
        }
    }
}
