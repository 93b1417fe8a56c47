use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use log::error;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::{ErrorClass, RegistryError};
use crate::logic::{Registry, RemoteLookup};
use crate::model::{DatabaseDescriptor, DatabaseRecord, UserContext};
use crate::store::traits::DatabaseStore;

pub type AppState<S> = Arc<Registry<S>>;

pub type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `{ "@type": "api:<response_type>", "api:status": "api:success", ..extra }`
pub fn success_response(response_type: &str, extra: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert("@type".to_string(), json!(format!("api:{}", response_type)));
    body.insert("api:status".to_string(), json!("api:success"));
    if let Value::Object(fields) = extra {
        body.extend(fields);
    }
    Json(Value::Object(body))
}

pub fn status_for(error: &RegistryError) -> StatusCode {
    match error.class() {
        ErrorClass::Syntactic | ErrorClass::Conflict => StatusCode::BAD_REQUEST,
        ErrorClass::Referential => match error {
            RegistryError::UnknownOriginDatabase { .. }
            | RegistryError::UnknownOriginBranch { .. }
            | RegistryError::UnknownOriginCommit { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::NOT_FOUND,
        },
        ErrorClass::State | ErrorClass::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The `api:error` object: the kind tag plus the offending identifiers.
pub fn api_error(error: &RegistryError) -> Value {
    let mut fields = Map::new();
    fields.insert("@type".to_string(), json!(format!("api:{}", error.kind())));

    let mut put = |key: &str, value: &str| {
        fields.insert(format!("api:{}", key), json!(value));
    };

    use RegistryError::*;
    match error {
        BadOriginAbsoluteDescriptor { absolute_descriptor }
        | BadTargetAbsoluteDescriptor { absolute_descriptor } => {
            put("absolute_descriptor", absolute_descriptor)
        }
        BadDatabaseName {
            organization_name,
            database_name,
        }
        | UnknownOriginDatabase {
            organization_name,
            database_name,
        }
        | UnknownDatabase {
            organization_name,
            database_name,
        }
        | DatabaseAlreadyExists {
            organization_name,
            database_name,
        }
        | DatabaseDeleting {
            organization_name,
            database_name,
        }
        | LookupTimeout {
            organization_name,
            database_name,
        } => {
            put("organization_name", organization_name);
            put("database_name", database_name);
        }
        UnknownOriginBranch {
            organization_name,
            database_name,
            branch_name,
        }
        | BranchAlreadyExists {
            organization_name,
            database_name,
            branch_name,
        }
        | UnknownBranch {
            organization_name,
            database_name,
            branch_name,
        } => {
            put("organization_name", organization_name);
            put("database_name", database_name);
            put("branch_name", branch_name);
        }
        UnknownOriginCommit {
            organization_name,
            database_name,
            commit_id,
        } => {
            put("organization_name", organization_name);
            put("database_name", database_name);
            put("commit_id", commit_id);
        }
        UnknownRemote {
            organization_name,
            database_name,
            remote_name,
        } => {
            put("organization_name", organization_name);
            put("database_name", database_name);
            put("remote_name", remote_name);
        }
        BadRequestBody { reason } => put("reason", reason),
        BadRemoteName { remote_name } => put("remote_name", remote_name),
        BadRemoteLocation { remote_location } => put("remote_location", remote_location),
        Storage(_) | Corrupted { .. } => {}
    }

    Value::Object(fields)
}

/// Render a registry failure as `(status, body)` for the given response family.
pub fn error_response(response_type: &str, error: RegistryError) -> (StatusCode, Json<Value>) {
    let status = status_for(&error);
    let api_status = match status {
        StatusCode::NOT_FOUND => "api:not_found",
        s if s.is_server_error() => "api:server_error",
        _ => "api:failure",
    };

    if error.class() == ErrorClass::Fatal {
        error!("{} failed: {}", response_type, error);
    }

    (
        status,
        Json(json!({
            "@type": format!("api:{}ErrorResponse", response_type),
            "api:status": api_status,
            "api:message": error.to_string(),
            "api:error": api_error(&error),
        })),
    )
}

pub(crate) fn database_from_path(
    response_type: &str,
    org: &str,
    db: &str,
) -> Result<DatabaseDescriptor, (StatusCode, Json<Value>)> {
    DatabaseDescriptor::new(org, db).map_err(|_| {
        error_response(
            response_type,
            RegistryError::BadDatabaseName {
                organization_name: org.to_string(),
                database_name: db.to_string(),
            },
        )
    })
}

/// Decode a request body that may be left out. An empty (or blank) body
/// gives `T::default()`; anything else must be valid JSON for `T`.
pub(crate) fn optional_json_body<T: DeserializeOwned + Default>(
    response_type: &str,
    body: &Bytes,
) -> Result<T, (StatusCode, Json<Value>)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        error_response(
            response_type,
            RegistryError::BadRequestBody {
                reason: e.to_string(),
            },
        )
    })
}

fn database_summary(record: &DatabaseRecord) -> Value {
    json!({
        "api:organization_name": record.organization_name,
        "api:database_name": record.database_name,
        "api:database_id": record.id,
        "api:state": record.state,
        "api:label": record.label,
        "api:comment": record.comment,
        "api:branch_names": record.branches.keys().collect::<Vec<_>>(),
        "api:remote_names": record.remote_names(),
    })
}

// Database handlers
#[derive(Debug, Default, Deserialize)]
pub struct CreateDatabaseRequest {
    pub label: Option<String>,
    pub comment: Option<String>,
}

pub async fn create_database<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path((org, db)): Path<(String, String)>,
    user: UserContext,
    body: Bytes,
) -> ApiResult {
    let database = database_from_path("DbCreate", &org, &db)?;
    let request: CreateDatabaseRequest = optional_json_body("DbCreate", &body)?;

    match registry
        .create_database(&database, request.label, request.comment, &user)
        .await
    {
        Ok(record) => Ok(success_response(
            "DbCreateResponse",
            json!({ "api:database_id": record.id }),
        )),
        Err(e) => Err(error_response("DbCreate", e)),
    }
}

pub async fn delete_database<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path((org, db)): Path<(String, String)>,
) -> ApiResult {
    let database = database_from_path("DbDelete", &org, &db)?;

    match registry.delete_database(&database).await {
        Ok(()) => Ok(success_response("DbDeleteResponse", json!({}))),
        Err(e) => Err(error_response("DbDelete", e)),
    }
}

pub async fn get_database<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path((org, db)): Path<(String, String)>,
) -> ApiResult {
    let database = database_from_path("DbInfo", &org, &db)?;

    match registry.get_database(&database).await {
        Ok(record) => Ok(success_response("DbInfoResponse", database_summary(&record))),
        Err(e) => Err(error_response("DbInfo", e)),
    }
}

pub async fn list_databases<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path(org): Path<String>,
) -> ApiResult {
    match registry.list_databases(Some(&org)).await {
        Ok(records) => Ok(success_response(
            "DbListResponse",
            json!({ "api:databases": records.iter().map(database_summary).collect::<Vec<_>>() }),
        )),
        Err(e) => Err(error_response("DbList", e)),
    }
}

// Remote handlers
#[derive(Debug, Deserialize)]
pub struct RemoteRequest {
    pub remote_name: String,
    pub remote_location: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoteQuery {
    pub remote_name: Option<String>,
}

pub async fn add_remote<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path((org, db)): Path<(String, String)>,
    RequestJson(request): RequestJson<RemoteRequest>,
) -> ApiResult {
    let database = database_from_path("Remote", &org, &db)?;

    match registry
        .add_remote(&database, &request.remote_name, &request.remote_location)
        .await
    {
        Ok(entry) => Ok(success_response(
            "RemoteResponse",
            json!({ "api:remote_name": entry.remote_name }),
        )),
        Err(e) => Err(error_response("Remote", e)),
    }
}

pub async fn set_remote<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path((org, db)): Path<(String, String)>,
    RequestJson(request): RequestJson<RemoteRequest>,
) -> ApiResult {
    let database = database_from_path("Remote", &org, &db)?;

    match registry
        .set_remote(&database, &request.remote_name, &request.remote_location)
        .await
    {
        Ok(entry) => Ok(success_response(
            "RemoteResponse",
            json!({ "api:remote_name": entry.remote_name }),
        )),
        Err(e) => Err(error_response("Remote", e)),
    }
}

pub async fn get_remote<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path((org, db)): Path<(String, String)>,
    Query(query): Query<RemoteQuery>,
) -> ApiResult {
    let database = database_from_path("Remote", &org, &db)?;

    match registry
        .get_remote(&database, query.remote_name.as_deref())
        .await
    {
        Ok(RemoteLookup::One(entry)) => Ok(success_response(
            "RemoteResponse",
            json!({
                "api:remote_name": entry.remote_name,
                "api:remote_url": entry.remote_location,
            }),
        )),
        Ok(RemoteLookup::All { remote_names, .. }) => Ok(success_response(
            "RemoteResponse",
            json!({ "api:remote_names": remote_names }),
        )),
        Err(e) => Err(error_response("Remote", e)),
    }
}

pub async fn delete_remote<S: DatabaseStore>(
    State(registry): State<AppState<S>>,
    Path((org, db)): Path<(String, String)>,
    Query(query): Query<RemoteQuery>,
) -> ApiResult {
    let database = database_from_path("Remote", &org, &db)?;

    let Some(remote_name) = query.remote_name else {
        return Err(error_response(
            "Remote",
            RegistryError::BadRemoteName {
                remote_name: String::new(),
            },
        ));
    };

    match registry.delete_remote(&database, &remote_name).await {
        Ok(()) => Ok(success_response("RemoteResponse", json!({}))),
        Err(e) => Err(error_response("Remote", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_carries_fields() {
        let error = RegistryError::UnknownOriginDatabase {
            organization_name: "acme".to_string(),
            database_name: "origin-widgets".to_string(),
        };
        let (status, Json(body)) = error_response("Branch", error);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["@type"], "api:BranchErrorResponse");
        assert_eq!(body["api:status"], "api:failure");
        assert_eq!(body["api:error"]["@type"], "api:UnknownOriginDatabase");
        assert_eq!(body["api:error"]["api:organization_name"], "acme");
        assert_eq!(body["api:error"]["api:database_name"], "origin-widgets");
    }

    #[test]
    fn test_status_mapping() {
        let db = DatabaseDescriptor::new("acme", "widgets").unwrap();
        assert_eq!(
            status_for(&RegistryError::unknown_remote(&db, "origin")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&RegistryError::database_deleting(&db)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&RegistryError::Corrupted {
                reason: "x".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let (_, Json(body)) = error_response("Remote", RegistryError::unknown_remote(&db, "origin"));
        assert_eq!(body["api:status"], "api:not_found");
        assert_eq!(body["api:error"]["api:remote_name"], "origin");
    }

    #[test]
    fn test_optional_json_body() {
        let empty: CreateDatabaseRequest = optional_json_body("DbCreate", &Bytes::new()).unwrap();
        assert!(empty.label.is_none());

        let blank: CreateDatabaseRequest =
            optional_json_body("DbCreate", &Bytes::from_static(b" \n")).unwrap();
        assert!(blank.comment.is_none());

        let given: CreateDatabaseRequest =
            optional_json_body("DbCreate", &Bytes::from_static(br#"{"label":"Widgets"}"#)).unwrap();
        assert_eq!(given.label.as_deref(), Some("Widgets"));

        let (status, Json(body)) =
            optional_json_body::<CreateDatabaseRequest>("DbCreate", &Bytes::from_static(br#"{"label":7}"#))
                .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["@type"], "api:DbCreateErrorResponse");
        assert_eq!(body["api:error"]["@type"], "api:BadRequestBody");
    }

    #[test]
    fn test_success_response_merges_fields() {
        let Json(body) = success_response("RemoteResponse", json!({ "api:remote_names": ["origin"] }));
        assert_eq!(body["@type"], "api:RemoteResponse");
        assert_eq!(body["api:status"], "api:success");
        assert_eq!(body["api:remote_names"][0], "origin");
    }
}
