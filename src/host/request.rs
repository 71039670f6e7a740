//! Request-scoped decorations
//!
//! `Server::attach` wraps a router with [`decorate_request`], which puts the
//! request decorations and the server handle into every request's extensions.
//! Handlers read them back with the [`RequestDecorations`] extractor or
//! `Extension<Server>`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::decorations::NamedValues;
use super::Server;

/// Decorations visible from a request.
#[derive(Clone)]
pub struct RequestDecorations {
    values: Arc<NamedValues>,
}

impl RequestDecorations {
    pub(crate) fn new(values: Arc<NamedValues>) -> Self {
        Self { values }
    }

    pub fn get<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        self.values.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.values.names()
    }
}

/// Middleware that makes decorations reachable from handlers.
pub async fn decorate_request(State(server): State<Server>, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(server.request_decorations());
    req.extensions_mut().insert(server);
    next.run(req).await
}

impl<S> FromRequestParts<S> for RequestDecorations
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestDecorations>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "request decorations are not attached; wrap the router with Server::attach",
        ))
    }
}
