//! sick-services: optional HTTP services on top of a live scanner session
//!
//! Endpoints:
//! - `GET /health`
//! - `GET /status`: scanner type, dialect and scan counters
//! - `GET /parameters`: the effective parameter registry
//! - `POST /cola`: send a raw SOPAS command, body `{"request": "..."}`

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::AuxServices;
pub use state::ServiceState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the service router with the given state
pub fn create_router(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(handlers::status::health))
        .route("/status", get(handlers::status::get_status))
        .route("/parameters", get(handlers::parameters::list_parameters))
        .route("/cola", post(handlers::cola::send_cola))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use sick_core::ParameterRegistry;
    use sick_scan::{sopas, CommandSender, Dialect, ScanParser, SessionError};

    /// Answers queued commands like a device would
    fn fake_session() -> CommandSender {
        let (sender, mut rx) = CommandSender::channel();
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let result = match sopas::positive_reply(&req.command) {
                    Some(reply) => Ok(reply.into_bytes().into()),
                    None => Err(SessionError::DeviceRejected {
                        command: req.command.clone(),
                        reply: "sFA 1".to_string(),
                    }),
                };
                let _ = req.reply.send(result);
            }
        });
        sender
    }

    fn start(commands: CommandSender) -> AuxServices {
        let registry = Arc::new(ParameterRegistry::new());
        registry.declare("hostname", "192.168.0.4").unwrap();
        registry.declare("timelimit", 5).unwrap();
        let parser = ScanParser::new("sick_tim_5xx").unwrap().into_shared();
        let state = ServiceState::new(commands, Dialect::Ascii, registry, parser)
            .with_request_timeout(Duration::from_secs(1));
        let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
        AuxServices::start(bind, state).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let services = start(fake_session());
        let body = reqwest::get(format!("{}/health", services.base_url()))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_status_and_parameters() {
        let services = start(fake_session());

        let status: serde_json::Value = reqwest::get(format!("{}/status", services.base_url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["scanner_type"], "sick_tim_5xx");
        assert_eq!(status["dialect"], "A");
        assert_eq!(status["session_available"], true);

        let params: serde_json::Value =
            reqwest::get(format!("{}/parameters", services.base_url()))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(params["hostname"], "192.168.0.4");
        assert_eq!(params["timelimit"], 5);
    }

    #[tokio::test]
    async fn test_cola_roundtrip() {
        let services = start(fake_session());
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/cola", services.base_url()))
            .json(&serde_json::json!({ "request": "sRN DeviceIdent" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["response"], "sRA DeviceIdent");
    }

    #[tokio::test]
    async fn test_cola_errors() {
        let services = start(fake_session());
        let client = reqwest::Client::new();
        let url = format!("{}/cola", services.base_url());

        let resp = client
            .post(&url)
            .json(&serde_json::json!({ "request": "  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(&url)
            .json(&serde_json::json!({ "request": "bogus" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "bad_gateway");
    }

    #[tokio::test]
    async fn test_cola_without_session() {
        let (commands, rx) = CommandSender::channel();
        drop(rx);
        let services = start(commands);

        let resp = reqwest::Client::new()
            .post(format!("{}/cola", services.base_url()))
            .json(&serde_json::json!({ "request": "sRN DeviceIdent" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);
    }

    #[tokio::test]
    async fn test_shutdown_releases_port() {
        let services = start(fake_session());
        let addr = services.local_addr();
        services.shutdown().await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
