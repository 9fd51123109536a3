#![allow(dead_code)]

use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::any;
use tokio::net::TcpListener;

/// A canned JSON answer for one request path.
#[derive(Debug, Clone)]
pub struct Route {
    path: &'static str,
    status: StatusCode,
    body: String,
}

impl Route {
    pub fn new(path: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            path,
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.into(),
        }
    }
}

/// Serves `routes` on an ephemeral local port and returns its base URL.
pub async fn serve(routes: Vec<Route>) -> anyhow::Result<String> {
    let app = routes.into_iter().fold(Router::new(), |app, route| {
        let Route { path, status, body } = route;
        app.route(
            path,
            any(move || {
                let body = body.clone();
                async move { (status, [(header::CONTENT_TYPE, "application/json")], body) }
            }),
        )
    });

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{address}"))
}

/// A base URL nothing listens on.
pub async fn closed_url() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{address}"))
}
