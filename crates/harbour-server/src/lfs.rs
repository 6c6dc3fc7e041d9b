//! Git LFS transfer API.
//!
//! Clients POST the oid and size of an object to learn where to upload it,
//! PUT its bytes to that link, and GET it back once committed. Media type
//! negotiation follows the `Accept` header: the `+json` type selects the
//! metadata representation, the bare type selects the content.

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::TryStreamExt;
use harbour_meta::MetaError;
use harbour_types::{ObjectRecord, RequestVars};
use serde::{Deserialize, Serialize};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, warn};

use crate::config::HarbourConfig;
use crate::error::{ServerError, ServerResult};
use crate::state::{authorization, AppState};

pub const META_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";
pub const CONTENT_MEDIA_TYPE: &str = "application/vnd.git-lfs";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, String>,
}

/// An object as presented to LFS clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    pub oid: String,
    pub size: i64,
    #[serde(rename = "_links")]
    pub links: BTreeMap<String, Link>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub objects: Vec<RequestVars>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    pub objects: Vec<Representation>,
}

/// The media type named first in the `Accept` header, without parameters.
fn accepted(headers: &HeaderMap) -> &str {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .unwrap_or_default()
}

pub fn object_link(config: &HarbourConfig, rv: &RequestVars) -> String {
    format!(
        "{}://{}/{}/{}/objects/{}",
        config.link_scheme(),
        config.host,
        rv.namespace,
        rv.repo,
        rv.oid
    )
}

pub fn represent(
    config: &HarbourConfig,
    rv: &RequestVars,
    record: &ObjectRecord,
    download: bool,
    upload: bool,
) -> Representation {
    let mut header = BTreeMap::new();
    header.insert("Accept".to_string(), CONTENT_MEDIA_TYPE.to_string());
    if !config.public && !rv.authorization.is_empty() {
        header.insert("Authorization".to_string(), rv.authorization.clone());
    }
    let link = Link {
        href: object_link(config, rv),
        header,
    };

    let mut links = BTreeMap::new();
    if download {
        links.insert("download".to_string(), link.clone());
    }
    if upload {
        links.insert("upload".to_string(), link);
    }
    Representation {
        oid: record.oid.to_hex(),
        size: record.size,
        links,
    }
}

fn meta_json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(META_MEDIA_TYPE));
    response
}

/// `POST /:namespace/:repo/objects`
pub async fn post_object(
    State(state): State<AppState>,
    Path((namespace, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    // A body that does not decode leaves the oid empty; credentials are
    // still checked first and the empty oid is rejected afterwards.
    let rv = serde_json::from_slice::<RequestVars>(&body)
        .unwrap_or_default()
        .with_repo(namespace, repo)
        .with_authorization(authorization(&headers));

    let put_rv = rv.clone();
    let record = state.meta(move |svc| svc.put(&put_rv)).await?;

    let status = if record.existing && state.content.exists(&record).await {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    debug!(oid = %record.oid, existing = record.existing, status = status.as_u16(), "object posted");
    let rep = represent(&state.config, &rv, &record, record.existing, true);
    Ok(meta_json(status, &rep))
}

/// `POST /:namespace/:repo/objects/batch`
pub async fn batch(
    State(state): State<AppState>,
    Path((namespace, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let auth = authorization(&headers);
    let request = match serde_json::from_slice::<BatchRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            let check = auth.clone();
            let admitted = state
                .meta(move |svc| Ok(svc.credentials().authenticate(&check)))
                .await?;
            if !admitted {
                return Err(MetaError::Unauthorized.into());
            }
            return Err(ServerError::BadRequest(format!("malformed batch request: {e}")));
        }
    };

    let objects: Vec<RequestVars> = request
        .objects
        .into_iter()
        .map(|rv| {
            rv.with_repo(namespace.clone(), repo.clone())
                .with_authorization(auth.clone())
        })
        .collect();

    let resolved = state
        .meta(move |svc| {
            let mut resolved = Vec::with_capacity(objects.len());
            for rv in objects {
                match svc.get(&rv) {
                    Ok(record) => {
                        resolved.push((rv, record, true, false));
                        continue;
                    }
                    Err(MetaError::Unauthorized) => return Err(MetaError::Unauthorized),
                    Err(_) => {}
                }
                match svc.put(&rv) {
                    Ok(record) => {
                        let existing = record.existing;
                        resolved.push((rv, record, existing, true));
                    }
                    Err(MetaError::Unauthorized) => return Err(MetaError::Unauthorized),
                    Err(e) => warn!(oid = %rv.oid, error = %e, "batch object skipped"),
                }
            }
            Ok(resolved)
        })
        .await?;

    let response = BatchResponse {
        objects: resolved
            .iter()
            .map(|(rv, record, download, upload)| {
                represent(&state.config, rv, record, *download, *upload)
            })
            .collect(),
    };
    Ok(meta_json(StatusCode::OK, &response))
}

/// `GET|HEAD /:namespace/:repo/objects/:oid`
pub async fn get_object(
    State(state): State<AppState>,
    Path((namespace, repo, oid)): Path<(String, String, String)>,
    method: Method,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let media = accepted(&headers).to_string();
    if media != META_MEDIA_TYPE && media != CONTENT_MEDIA_TYPE {
        return Err(ServerError::NotAcceptable(format!(
            "expected {META_MEDIA_TYPE} or {CONTENT_MEDIA_TYPE}"
        )));
    }

    let rv = RequestVars::new(oid, 0)
        .with_repo(namespace, repo)
        .with_authorization(authorization(&headers));
    let get_rv = rv.clone();
    let record = state.meta(move |svc| svc.get(&get_rv)).await?;
    if !state.content.exists(&record).await {
        return Err(MetaError::ObjectNotFound(record.oid.to_hex()).into());
    }

    if media == META_MEDIA_TYPE {
        let rep = represent(&state.config, &rv, &record, true, false);
        return Ok(meta_json(StatusCode::OK, &rep));
    }

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        let reader = state.content.get(&record).await?;
        Body::from_stream(ReaderStream::new(reader))
    };
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, record.size.to_string()),
        ],
        body,
    )
        .into_response())
}

/// `PUT /:namespace/:repo/objects/:oid`
///
/// The body is verified against the pending record before the ledger entry
/// is committed; a rejected upload never becomes visible.
pub async fn put_object(
    State(state): State<AppState>,
    Path((namespace, repo, oid)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Body,
) -> ServerResult<StatusCode> {
    let rv = RequestVars::new(oid, 0)
        .with_repo(namespace, repo)
        .with_authorization(authorization(&headers));

    let pending_rv = rv.clone();
    let record = state.meta(move |svc| svc.get_pending(&pending_rv)).await?;

    let stream = body
        .into_data_stream()
        .map_err(std::io::Error::other);
    state.content.put(&record, StreamReader::new(stream)).await?;

    state.meta(move |svc| svc.commit(&rv)).await?;
    Ok(StatusCode::OK)
}

/// `GET /search/:oid`
pub async fn search(
    State(state): State<AppState>,
    Path(oid): Path<String>,
    headers: HeaderMap,
) -> ServerResult<StatusCode> {
    let rv = RequestVars::new(oid, 0).with_authorization(authorization(&headers));
    state.meta(move |svc| svc.get(&rv)).await?;
    Ok(StatusCode::OK)
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
