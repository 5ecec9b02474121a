//! Bulkhead admission middleware for axum routers.
//!
//! Install with `route_layer` so the matched route is known:
//! ```ignore
//! Router::new()
//!     .route("/orders", post(create_order))
//!     .route_layer(axum::middleware::from_fn_with_state(manager, bulkhead_middleware))
//! ```

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admission::{AdmissionError, OperationContext, PermitLifecycleManager};

/// `(pool, lane)` pairs admitted for the current request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdmittedLanes(pub Vec<(String, String)>);

pub async fn bulkhead_middleware(
    State(manager): State<Arc<PermitLifecycleManager>>,
    mut req: Request,
    next: Next,
) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut ctx = OperationContext::new(route.clone()).with_route(route);

    if let Err(err) = manager.begin(&mut ctx).await {
        let status = match err {
            AdmissionError::UnknownPool(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AdmissionError::Rejected { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        return (status, err.to_string()).into_response();
    }

    req.extensions_mut().insert(AdmittedLanes(ctx.held_lanes()));
    let response = next.run(req).await;

    if response.status().is_server_error() {
        manager.on_failure(&mut ctx);
    } else {
        manager.on_success(&mut ctx);
    }

    response
}
