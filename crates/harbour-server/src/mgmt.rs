//! Administrative endpoints under `/mgmt`.
//!
//! Guarded by a single configured admin account. With no admin password
//! configured the whole subtree answers 404.

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use harbour_meta::{parse_basic, MetaError};
use harbour_types::{ObjectRecord, Oid, ProjectRecord};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ServerResult;
use crate::state::{authorization, AppState};

pub const MGMT_AUTHENTICATE: &str = "Basic realm=\"harbour-mgmt\"";

fn same_secret(a: &str, b: &str) -> bool {
    // blake3::Hash equality is constant time.
    blake3::hash(a.as_bytes()) == blake3::hash(b.as_bytes())
}

/// Middleware admitting only the configured admin account.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = &state.config;
    if !config.admin_enabled() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let admitted = parse_basic(&authorization(request.headers()))
        .map(|(user, pass)| {
            // Evaluate both so a wrong user costs the same as a wrong password.
            let user_ok = same_secret(&user, &config.admin_user);
            let pass_ok = same_secret(&pass, &config.admin_pass);
            user_ok & pass_ok
        })
        .unwrap_or(false);

    if !admitted {
        warn!(path = %request.uri().path(), "management request rejected");
        let mut response = StatusCode::UNAUTHORIZED.into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(MGMT_AUTHENTICATE),
        );
        return response;
    }
    next.run(request).await
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Summary {
    pub version: String,
    pub meta_backend: String,
    pub content_backend: String,
    pub auth_mode: String,
    pub objects: u64,
    pub projects: usize,
    pub config: String,
}

/// `GET /mgmt`
pub async fn summary(State(state): State<AppState>) -> ServerResult<Json<Summary>> {
    let (objects, projects) = state
        .meta(|svc| Ok((svc.count_objects()?, svc.list_projects()?.len())))
        .await?;
    Ok(Json(Summary {
        version: env!("CARGO_PKG_VERSION").to_string(),
        meta_backend: state.service.backend_name().to_string(),
        content_backend: state.content.backend_name().to_string(),
        auth_mode: state.service.credentials().mode().name().to_string(),
        objects,
        projects,
        config: state.config.redacted().to_toml_string()?,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectQuery {
    /// Case-insensitive substring of the hex oid.
    #[serde(default)]
    pub oid: Option<String>,
}

/// `GET /mgmt/objects`
pub async fn objects(
    State(state): State<AppState>,
    Query(query): Query<ObjectQuery>,
) -> ServerResult<Json<Vec<ObjectRecord>>> {
    let mut records = state.meta(|svc| svc.list_objects()).await?;
    if let Some(needle) = query.oid.filter(|n| !n.is_empty()) {
        let needle = needle.to_ascii_lowercase();
        records.retain(|r| r.oid.to_hex().contains(&needle));
    }
    Ok(Json(records))
}

/// `GET /mgmt/projects`
pub async fn projects(State(state): State<AppState>) -> ServerResult<Json<Vec<ProjectRecord>>> {
    Ok(Json(state.meta(|svc| svc.list_projects()).await?))
}

/// `GET /mgmt/projects/:name`
pub async fn project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Json<ProjectRecord>> {
    Ok(Json(state.meta(move |svc| svc.find_project(&name)).await?))
}

#[derive(Debug, Deserialize)]
pub struct NewProject {
    pub name: String,
}

/// `POST /mgmt/projects`
pub async fn add_project(
    State(state): State<AppState>,
    Json(body): Json<NewProject>,
) -> ServerResult<StatusCode> {
    let name = body.name.clone();
    state.meta(move |svc| svc.add_project(&name)).await?;
    info!(project = %body.name, "project created");
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Removal {
    pub deleted: bool,
}

/// `DELETE /mgmt/projects/:name/objects/:oid`
///
/// Drops the association. When no project references the object any
/// longer its record and its bytes are removed as well.
pub async fn remove_object(
    State(state): State<AppState>,
    Path((name, oid)): Path<(String, String)>,
) -> ServerResult<Json<Removal>> {
    let oid = Oid::parse(&oid).map_err(MetaError::from)?;
    let deleted = state
        .meta(move |svc| svc.remove_from_project(oid, &name))
        .await?;
    if deleted {
        state.content.delete(&oid).await?;
        info!(oid = %oid, "object deleted");
    }
    Ok(Json(Removal { deleted }))
}

/// `GET /mgmt/users`
pub async fn users(State(state): State<AppState>) -> ServerResult<Json<Vec<String>>> {
    Ok(Json(state.meta(|svc| svc.list_users()).await?))
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub password: String,
}

/// `POST /mgmt/users`
pub async fn add_user(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> ServerResult<StatusCode> {
    let name = body.name.clone();
    state
        .meta(move |svc| svc.add_user(&body.name, &body.password))
        .await?;
    info!(user = %name, "user added");
    Ok(StatusCode::CREATED)
}

/// `DELETE /mgmt/users/:name`
pub async fn delete_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<StatusCode> {
    let user = name.clone();
    state.meta(move |svc| svc.delete_user(&user)).await?;
    info!(user = %name, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_comparison() {
        assert!(same_secret("hunter2", "hunter2"));
        assert!(!same_secret("hunter2", "hunter3"));
        assert!(!same_secret("", "x"));
    }
}
