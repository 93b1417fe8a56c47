use crate::api::handlers::{
    error_response, optional_json_body, success_response, ApiResult, AppState,
};
use crate::model::{Prefixes, UserContext};
use crate::store::traits::DatabaseStore;
use axum::{
    body::Bytes,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct CreateBranchRequest {
    /// Absolute descriptor of the ref to branch from
    pub origin: Option<String>,
    pub prefixes: Option<Prefixes>,
}

/// POST /api/branch/{org}/{db}/local/branch/{name}
pub async fn create_branch<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path(path): Path<String>,
    user: UserContext,
    body: Bytes,
) -> ApiResult {
    let request: CreateBranchRequest = optional_json_body("Branch", &body)?;

    match registry
        .create_branch(&path, request.origin.as_deref(), request.prefixes, &user)
        .await
    {
        Ok(branch) => Ok(success_response(
            "BranchResponse",
            json!({
                "api:branch_name": branch.name,
                "api:head": branch.head,
            }),
        )),
        Err(e) => Err(error_response("Branch", e)),
    }
}

/// DELETE /api/branch/{org}/{db}/local/branch/{name}
pub async fn delete_branch<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path(path): Path<String>,
) -> ApiResult {
    match registry.delete_branch(&path).await {
        Ok(()) => Ok(success_response("BranchResponse", json!({}))),
        Err(e) => Err(error_response("Branch", e)),
    }
}
