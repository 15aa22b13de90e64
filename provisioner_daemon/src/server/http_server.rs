use crate::managers::batch_dispatcher::{BatchSubmitter, DispatchError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use command_protocol::Instructions;
use log::{debug, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum HttpServerError {
    #[error("Socket operation failed: {0}")]
    SocketFail(#[from] io::Error),
}

pub struct HttpServer {
    listener: TcpListener,
}

impl HttpServer {
    pub async fn bind(address: SocketAddr) -> Result<Self, HttpServerError> {
        Ok(Self {
            listener: TcpListener::bind(address).await?,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HttpServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(
        self,
        submitter: BatchSubmitter,
        token: Arc<CancellationToken>,
    ) -> Result<(), HttpServerError> {
        info!("Starting HTTP server on {:?}.", self.listener.local_addr());
        axum::serve(self.listener, router(submitter))
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;
        info!("HTTP server stopped.");
        Ok(())
    }
}

pub fn router(submitter: BatchSubmitter) -> Router {
    Router::new()
        .route("/commands", post(submit_commands))
        .route("/health", get(health))
        .with_state(submitter)
}

async fn submit_commands(
    State(submitter): State<BatchSubmitter>,
    Json(instructions): Json<Instructions>,
) -> (StatusCode, String) {
    let count = instructions.command_count();
    debug!("Received batch of {} commands over HTTP.", count);
    match submitter.submit(instructions).await {
        Ok(()) => (StatusCode::OK, format!("Accepted {} commands.", count)),
        Err(err @ DispatchError::Closed) => {
            warn!("Rejecting batch: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::managers::batch_dispatcher::batch_channel;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use http_body_util::BodyExt;
    use parameterized::parameterized;
    use tower::ServiceExt;

    fn post_commands(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/commands")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (submitter, _receiver) = batch_channel(1);
        let response = router(submitter)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn submit_hands_batch_over() {
        let (submitter, mut receiver) = batch_channel(1);
        let body = r#"{"commands": [[
            {"id": "1", "order": {"type": "createVolume", "payload": {"name": "data"}}},
            {"id": "2", "order": {"type": "PULLIMAGE", "payload": {"image": "alpine"}}}
        ]]}"#;
        let response = router(submitter).oneshot(post_commands(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let instructions = receiver.recv().await.unwrap();
        assert_eq!(instructions.command_count(), 2);
        assert_eq!(instructions.commands[0][1].id, "2");
    }

    #[tokio::test]
    #[parameterized(body = {
        "{not json",
        r#"{"commands": [[{"id": "1", "order": {"type": "reboot", "payload": {}}}]]}"#,
        r#"{"commands": "none"}"#
    })]
    async fn submit_rejects_malformed_batch(body: &str) {
        let (submitter, mut receiver) = batch_channel(1);
        let response = router(submitter).oneshot(post_commands(body)).await.unwrap();

        assert!(response.status().is_client_error());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn submit_after_shutdown() {
        let (submitter, receiver) = batch_channel(1);
        drop(receiver);
        let response = router(submitter)
            .oneshot(post_commands(r#"{"commands": []}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn serve_stops_when_cancelled() {
        let (submitter, _receiver) = batch_channel(1);
        let server = HttpServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        let token = Arc::new(CancellationToken::new());
        token.cancel();

        assert!(server.serve(submitter, token).await.is_ok());
    }
}
