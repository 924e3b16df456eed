//! In-process HTTP endpoint component.
//!
//! Serves a declared set of routes from inside the orchestrator process, so
//! stacks can stand up a stub API without any container runtime. Port 0
//! binds an OS-assigned free port.

use crate::components::Component;
use crate::config::OrchestratorConfig;
use crate::error::{FlotillaError, Result};
use crate::events::{LifecycleEvents, LifecycleEventSource};
use crate::host::{HostAware, HostConfig};
use crate::types::component::{ComponentInfo, ComponentLifecycleEvent};
use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// HTTP methods a route can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    fn filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Delete => MethodFilter::DELETE,
        }
    }
}

/// One declared route: a fixed response for a method + path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub method: HttpMethod,
    pub path: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl RouteSpec {
    pub fn get(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            status: 200,
            content_type: "application/json".to_string(),
            body: body.into(),
        }
    }
}

/// Declarative configuration of an [`HttpEndpoint`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEndpointConfig {
    pub name: String,
    /// Port to bind; 0 asks the OS for a free one.
    pub port: u16,
    pub routes: Vec<RouteSpec>,
}

/// Published connection details of a running endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConnectionConfig {
    pub base_url: String,
    pub port: u16,
}

impl HostAware for HttpConnectionConfig {
    fn update_host_references(&self, container_host: &str, public_host: &str) -> Self {
        Self {
            base_url: self.base_url.update_host_references(container_host, public_host),
            port: self.port,
        }
    }
}

struct ServerRuntime {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// An HTTP endpoint served in-process.
pub struct HttpEndpoint {
    config: HttpEndpointConfig,
    source: LifecycleEventSource,
    runtime: Mutex<Option<ServerRuntime>>,
    info: Mutex<Option<ComponentInfo>>,
}

impl HttpEndpoint {
    pub fn new(config: HttpEndpointConfig) -> Self {
        Self {
            config,
            source: LifecycleEventSource::new(),
            runtime: Mutex::new(None),
            info: Mutex::new(None),
        }
    }

    fn build_router(routes: &[RouteSpec]) -> Router {
        // Routes on the same path merge into one method router; axum
        // rejects registering a path twice.
        let mut method_routers: HashMap<String, MethodRouter> = HashMap::new();
        for spec in routes {
            let status = StatusCode::from_u16(spec.status).unwrap_or(StatusCode::OK);
            let content_type = spec.content_type.clone();
            let body = spec.body.clone();
            let handler = move || {
                let content_type = content_type.clone();
                let body = body.clone();
                async move { (status, [(header::CONTENT_TYPE, content_type)], body) }
            };
            let entry = method_routers.remove(&spec.path).unwrap_or_default();
            method_routers.insert(spec.path.clone(), entry.on(spec.method.filter(), handler));
        }

        let mut router = Router::new();
        for (path, method_router) in method_routers {
            router = router.route(&path, method_router);
        }
        router
    }
}

#[async_trait]
impl Component for HttpEndpoint {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> &str {
        "http"
    }

    async fn start(
        &self,
        config: &OrchestratorConfig,
        _hosts: &HostConfig,
    ) -> Result<ComponentInfo> {
        let id = self.id();
        self.source
            .start_with_events(config, &id, async {
                let listener = TcpListener::bind(("0.0.0.0", self.config.port))
                    .await
                    .map_err(|e| FlotillaError::Io { id: id.clone(), source: e })?;
                let port = listener
                    .local_addr()
                    .map_err(|e| FlotillaError::Io { id: id.clone(), source: e })?
                    .port();

                let router = Self::build_router(&self.config.routes);
                let shutdown = CancellationToken::new();
                let server_shutdown = shutdown.clone();
                let server_id = id.clone();
                let handle = tokio::spawn(async move {
                    let result = axum::serve(listener, router)
                        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                        .await;
                    if let Err(e) = result {
                        error!(component = %server_id, error = %e, "HTTP endpoint terminated abnormally");
                    }
                });
                *self.runtime.lock() = Some(ServerRuntime { shutdown, handle });

                info!(component = %id, port, routes = self.config.routes.len(), "HTTP endpoint listening");
                let connection = HttpConnectionConfig {
                    base_url: format!("http://localhost:{}", port),
                    port,
                };
                let info =
                    ComponentInfo::new(None, Arc::new(connection), self.kind(), self.name());
                *self.info.lock() = Some(info.clone());
                Ok(info)
            })
            .await
    }

    async fn stop(&self) -> Result<()> {
        let runtime = self.runtime.lock().take();
        self.source
            .stop_with_events(async {
                if let Some(runtime) = runtime {
                    runtime.shutdown.cancel();
                    runtime.handle.await.map_err(|e| {
                        FlotillaError::ComponentStopFailed {
                            id: self.id(),
                            reason: e.to_string(),
                        }
                    })?;
                }
                Ok(())
            })
            .await
    }

    fn lifecycle_events(&self) -> LifecycleEvents {
        self.source.events()
    }

    fn current_state(&self) -> ComponentLifecycleEvent {
        self.source.current()
    }

    fn info(&self) -> Option<ComponentInfo> {
        self.info.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::component::ComponentState;

    fn endpoint(routes: Vec<RouteSpec>) -> HttpEndpoint {
        HttpEndpoint::new(HttpEndpointConfig { name: "stub-api".to_string(), port: 0, routes })
    }

    #[tokio::test]
    async fn test_endpoint_serves_declared_routes() {
        let component = endpoint(vec![
            RouteSpec::get("/people", r#"[{"name":"ada"}]"#),
            RouteSpec {
                method: HttpMethod::Post,
                path: "/people".to_string(),
                status: 201,
                content_type: "application/json".to_string(),
                body: r#"{"created":true}"#.to_string(),
            },
        ]);

        let info = component
            .start(&OrchestratorConfig::default(), &HostConfig::UNKNOWN)
            .await
            .expect("endpoint should start");
        assert_eq!(component.current_state().state, ComponentState::Running);

        let base_url = info.connection.to_json()["base_url"]
            .as_str()
            .expect("base_url should be published")
            .to_string();

        let body = reqwest::get(format!("{}/people", base_url))
            .await
            .expect("GET should succeed")
            .text()
            .await
            .expect("body should read");
        assert_eq!(body, r#"[{"name":"ada"}]"#);

        let client = reqwest::Client::new();
        let response =
            client.post(format!("{}/people", base_url)).send().await.expect("POST should succeed");
        assert_eq!(response.status().as_u16(), 201);

        component.stop().await.expect("endpoint should stop");
        assert_eq!(component.current_state().state, ComponentState::Stopped);

        // The socket is released once stopped.
        assert!(reqwest::get(format!("{}/people", base_url)).await.is_err());
    }

    #[tokio::test]
    async fn test_endpoint_id_and_info() {
        let component = endpoint(vec![RouteSpec::get("/health", "ok")]);
        assert_eq!(component.id(), "stub-api-http");
        assert!(component.info().is_none());

        component
            .start(&OrchestratorConfig::default(), &HostConfig::UNKNOWN)
            .await
            .expect("endpoint should start");
        let info = component.info().expect("info should be published after start");
        assert_eq!(info.id, "stub-api-http");
        assert_eq!(info.kind, "http");

        component.stop().await.expect("endpoint should stop");
    }
}
