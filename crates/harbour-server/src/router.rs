use axum::http::{HeaderValue, Request};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{lfs, mgmt};

/// Time-ordered request ids, so log lines sort by arrival.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

fn mgmt_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/mgmt", get(mgmt::summary))
        .route("/mgmt/objects", get(mgmt::objects))
        .route("/mgmt/projects", get(mgmt::projects).post(mgmt::add_project))
        .route("/mgmt/projects/:name", get(mgmt::project))
        .route(
            "/mgmt/projects/:name/objects/:oid",
            delete(mgmt::remove_object),
        )
        .route("/mgmt/users", get(mgmt::users).post(mgmt::add_user))
        .route("/mgmt/users/:name", delete(mgmt::delete_user))
        .route_layer(middleware::from_fn_with_state(state, mgmt::require_admin))
}

/// Build the axum router with every Harbour endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(lfs::health))
        .route("/search/:oid", get(lfs::search))
        .merge(mgmt_routes(state.clone()))
        .route("/:namespace/:repo/objects", post(lfs::post_object))
        .route("/:namespace/:repo/objects/batch", post(lfs::batch))
        .route(
            "/:namespace/:repo/objects/:oid",
            get(lfs::get_object).put(lfs::put_object),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}
