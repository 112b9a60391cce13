//! Liveness endpoint for free-tier container hosts.
//!
//! Platforms that idle out quiet containers get two things here: a tiny
//! HTTP server answering `GET /` with a static body, and a self-ping loop
//! that requests that endpoint on an interval so the host sees traffic.
//! Both are opt-in through [`KeepaliveConfig`] and run as background tasks
//! next to the relay.

use std::time::Duration;

use axum::{Router, routing::get};
use tokio::net::TcpListener;

use crate::config::KeepaliveConfig;

/// Body returned by the liveness endpoint.
pub const ALIVE_BODY: &str = "Alive & Running!";

/// Creates the single-route liveness router.
pub fn create_router() -> Router {
    Router::new().route("/", get(alive))
}

async fn alive() -> &'static str {
    ALIVE_BODY
}

/// Binds the liveness server and serves it until the task is aborted.
pub async fn start_keepalive_server(config: &KeepaliveConfig) -> crate::Result<()> {
    let listener = TcpListener::bind(config.bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %config.bind_address, "Keepalive server listening");

    axum::serve(listener, create_router())
        .await
        .map_err(|e| crate::error::Error::KeepaliveServer(e.to_string()))?;

    Ok(())
}

/// Requests the liveness endpoint on `config.ping_interval` forever. The
/// first ping happens a full interval after startup.
pub async fn self_ping_loop(config: KeepaliveConfig) {
    let url = ping_target(&config);
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Keepalive pinger could not build an HTTP client");
            return;
        }
    };

    loop {
        tokio::time::sleep(config.ping_interval).await;
        ping_once(&client, &url).await;
    }
}

/// Explicit ping URL when configured, otherwise loopback onto the local
/// bind port.
fn ping_target(config: &KeepaliveConfig) -> String {
    config
        .ping_url
        .clone()
        .unwrap_or_else(|| format!("http://127.0.0.1:{}/", config.bind_address.port()))
}

async fn ping_once(client: &reqwest::Client, url: &str) {
    match client.get(url).send().await {
        Ok(response) => {
            tracing::debug!(status = response.status().as_u16(), "Keepalive ping");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Keepalive ping failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn alive_returns_static_body() {
        assert_eq!(alive().await, ALIVE_BODY);
    }

    #[test]
    fn ping_target_prefers_explicit_url() {
        let config = KeepaliveConfig {
            ping_url: Some("https://relay.example.com/".to_string()),
            ..KeepaliveConfig::default()
        };
        assert_eq!(ping_target(&config), "https://relay.example.com/");
    }

    #[test]
    fn ping_target_defaults_to_local_bind_port() {
        let config = KeepaliveConfig {
            bind_address: "0.0.0.0:9099".parse().unwrap(),
            ..KeepaliveConfig::default()
        };
        assert_eq!(ping_target(&config), "http://127.0.0.1:9099/");
    }

    #[tokio::test]
    async fn ping_once_requests_the_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ALIVE_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        ping_once(&client, &format!("{}/", server.uri())).await;
    }
}
