//! Host surface for plugins
//!
//! axum has routers and state but no plugin lifecycle. [`Server`] supplies
//! the pieces a plugin needs from its host:
//! - a registration entry point (`register`)
//! - a tagged log sink (`log`, `subscribe_logs`)
//! - decorations on the server and on every request (`decorate`)
//! - a per-plugin registry of exposed values (`expose`, `plugin_exposures`)
//! - a stop event, fired once on shutdown (`on_stop`, `stop`)
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::new();
//! server.register(&MysqlPlugin::default(), json!({ "decorate": true })).await?;
//!
//! let app = server.attach(Router::new().route("/", get(handler)));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! server.serve(listener, app, shutdown_signal()).await?;
//! ```

pub mod decorations;
pub mod events;
pub mod request;

use async_trait::async_trait;
use axum::{middleware as axum_middleware, Router};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub use decorations::{NamedValues, Surface};
pub use events::{LogEvent, ServerEvents, ServerLog, StopListener};
pub use request::RequestDecorations;

/// Errors raised by the host itself
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{surface} decoration already defined: {name}")]
    DecorationConflict { surface: Surface, name: String },

    #[error("Plugin {0} already registered")]
    AlreadyRegistered(String),

    #[error("Server is stopped, cannot register plugin {0}")]
    Stopped(String),
}

/// A plugin that can be registered with a [`Server`].
#[async_trait]
pub trait Plugin: Send + Sync {
    type Error: From<HostError> + std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str;

    /// Set the plugin up. A returned error fails the registration.
    async fn register(&self, server: &PluginServer, options: Value) -> Result<(), Self::Error>;
}

/// A completed plugin registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub version: String,
    pub registered_at: DateTime<Utc>,
}

struct ServerInner {
    server_decorations: NamedValues,
    request_decorations: Arc<NamedValues>,
    exposures: RwLock<HashMap<String, Arc<NamedValues>>>,
    registrations: RwLock<Vec<Registration>>,
    events: ServerEvents,
}

/// Shared handle to the host. Cloning is cheap.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ServerInner {
                server_decorations: NamedValues::new(),
                request_decorations: Arc::new(NamedValues::new()),
                exposures: RwLock::new(HashMap::new()),
                registrations: RwLock::new(Vec::new()),
                events: ServerEvents::new(),
            }),
        }
    }

    /// Register a plugin with its options.
    ///
    /// The registration is only recorded once the plugin's own `register`
    /// succeeded. A plugin name can be registered once, and not after the
    /// stop event fired.
    pub async fn register<P: Plugin>(&self, plugin: &P, options: Value) -> Result<(), P::Error> {
        if self.is_stopped() {
            return Err(HostError::Stopped(plugin.name().to_string()).into());
        }
        if self.is_registered(plugin.name()) {
            return Err(HostError::AlreadyRegistered(plugin.name().to_string()).into());
        }

        let scoped = PluginServer {
            server: self.clone(),
            plugin: plugin.name(),
        };
        plugin.register(&scoped, options).await?;

        self.inner
            .registrations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registration {
                name: plugin.name().to_string(),
                version: plugin.version().to_string(),
                registered_at: Utc::now(),
            });
        info!("Plugin registered: {} v{}", plugin.name(), plugin.version());
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner
            .registrations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|r| r.name == name)
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.inner
            .registrations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Attach a named value to the server or to every request.
    pub fn decorate<T>(&self, surface: Surface, name: &str, value: T) -> Result<(), HostError>
    where
        T: Send + Sync + 'static,
    {
        let defined = match surface {
            Surface::Server => self.inner.server_decorations.define(name, value),
            Surface::Request => self.inner.request_decorations.define(name, value),
        };
        if !defined {
            return Err(HostError::DecorationConflict {
                surface,
                name: name.to_string(),
            });
        }
        debug!("{} decorated with '{}'", surface, name);
        Ok(())
    }

    /// Attach every `(name, value)` to both surfaces, or none of them.
    ///
    /// Both surfaces stay locked from the conflict check to the last insert.
    pub fn decorate_all<T>(&self, decorations: Vec<(String, T)>) -> Result<(), HostError>
    where
        T: Clone + Send + Sync + 'static,
    {
        // Lock order: server, then request
        let mut on_server = self.inner.server_decorations.write();
        let mut on_request = self.inner.request_decorations.write();

        {
            let mut seen = HashSet::new();
            for (name, _) in &decorations {
                for (surface, taken) in [(Surface::Server, &*on_server), (Surface::Request, &*on_request)] {
                    if taken.contains_key(name) || !seen.insert((surface, name.as_str())) {
                        return Err(HostError::DecorationConflict {
                            surface,
                            name: name.clone(),
                        });
                    }
                }
            }
        }

        for (name, value) in decorations {
            debug!("Server and Request decorated with '{}'", name);
            on_server.insert(name.clone(), Arc::new(value.clone()));
            on_request.insert(name, Arc::new(value));
        }
        Ok(())
    }

    pub fn is_decorated(&self, surface: Surface, name: &str) -> bool {
        match surface {
            Surface::Server => self.inner.server_decorations.contains(name),
            Surface::Request => self.inner.request_decorations.contains(name),
        }
    }

    /// Read a server decoration
    pub fn decoration<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        self.inner.server_decorations.get(name)
    }

    /// Handle to the request decorations, as handlers see them
    pub fn request_decorations(&self) -> RequestDecorations {
        RequestDecorations::new(Arc::clone(&self.inner.request_decorations))
    }

    /// Store a value in a plugin's exposure registry, replacing any previous one.
    pub fn expose<T>(&self, plugin: &str, key: &str, value: T)
    where
        T: Send + Sync + 'static,
    {
        let mut exposures = self.inner.exposures.write().unwrap_or_else(|e| e.into_inner());
        exposures
            .entry(plugin.to_string())
            .or_insert_with(|| Arc::new(NamedValues::new()))
            .set(key, value);
    }

    /// A plugin's exposure registry, if it exposed anything
    pub fn plugin_exposures(&self, plugin: &str) -> Option<Arc<NamedValues>> {
        self.inner
            .exposures
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(plugin)
            .cloned()
    }

    pub fn log(&self, tags: &[&str], data: impl Into<String>) {
        self.inner.events.log().log(tags, data);
    }

    pub fn logger(&self) -> ServerLog {
        self.inner.events.log().clone()
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEvent> {
        self.inner.events.log().subscribe()
    }

    pub fn on_stop<F, Fut>(&self, listener: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.events.on_stop(None, listener);
    }

    /// Fire the stop event. Listeners run once; later calls are no-ops.
    pub async fn stop(&self) {
        info!("Server stopping");
        self.inner.events.emit_stop().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.events.is_stopped()
    }

    /// Wrap a router so handlers can reach request decorations and the server.
    pub fn attach(&self, router: Router) -> Router {
        router.layer(axum_middleware::from_fn_with_state(
            self.clone(),
            request::decorate_request,
        ))
    }

    /// Serve `router` until `shutdown` resolves, then fire the stop event.
    pub async fn serve<F>(&self, listener: TcpListener, router: Router, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let result = axum::serve(listener, self.attach(router))
            .with_graceful_shutdown(shutdown)
            .await;
        self.stop().await;
        result?;
        Ok(())
    }
}

/// The server as seen by one plugin during registration.
///
/// Exposures and stop listeners are scoped to the plugin.
#[derive(Clone)]
pub struct PluginServer {
    server: Server,
    plugin: &'static str,
}

impl PluginServer {
    pub fn plugin(&self) -> &'static str {
        self.plugin
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn expose<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        self.server.expose(self.plugin, key, value);
    }

    pub fn decorate<T>(&self, surface: Surface, name: &str, value: T) -> Result<(), HostError>
    where
        T: Send + Sync + 'static,
    {
        self.server.decorate(surface, name, value)
    }

    pub fn decorate_all<T>(&self, decorations: Vec<(String, T)>) -> Result<(), HostError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.server.decorate_all(decorations)
    }

    pub fn is_decorated(&self, surface: Surface, name: &str) -> bool {
        self.server.is_decorated(surface, name)
    }

    pub fn log(&self, tags: &[&str], data: impl Into<String>) {
        self.server.log(tags, data);
    }

    pub fn logger(&self) -> ServerLog {
        self.server.logger()
    }

    pub fn on_stop<F, Fut>(&self, listener: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.server.inner.events.on_stop(Some(self.plugin), listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Extension, routing::get};
    use axum_test::TestServer;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    enum EchoError {
        #[error(transparent)]
        Host(#[from] HostError),
        #[error("rejected")]
        Rejected,
    }

    struct EchoPlugin;

    #[async_trait]
    impl Plugin for EchoPlugin {
        type Error = EchoError;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn version(&self) -> &'static str {
            "1.0.0"
        }

        async fn register(&self, server: &PluginServer, options: Value) -> Result<(), EchoError> {
            if options["reject"] == json!(true) {
                return Err(EchoError::Rejected);
            }
            server.expose("options", options.to_string());
            server.decorate(Surface::Request, "echo", "hi".to_string())?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_records_plugin_once() {
        let server = Server::new();
        server.register(&EchoPlugin, json!({})).await.unwrap();

        assert!(server.is_registered("echo"));
        assert_eq!(server.registrations()[0].version, "1.0.0");
        assert_eq!(
            server.plugin_exposures("echo").unwrap().get::<String>("options").as_deref(),
            Some("{}")
        );

        let err = server.register(&EchoPlugin, json!({})).await.unwrap_err();
        assert!(matches!(err, EchoError::Host(HostError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn test_failed_register_is_not_recorded() {
        let server = Server::new();
        let err = server.register(&EchoPlugin, json!({ "reject": true })).await.unwrap_err();
        assert!(matches!(err, EchoError::Rejected));
        assert!(!server.is_registered("echo"));
        assert!(server.plugin_exposures("echo").is_none());
    }

    #[test]
    fn test_duplicate_decoration_is_rejected_per_surface() {
        let server = Server::new();
        server.decorate(Surface::Server, "db", 1u8).unwrap();
        server.decorate(Surface::Request, "db", 1u8).unwrap();

        let err = server.decorate(Surface::Server, "db", 2u8).unwrap_err();
        assert_eq!(err.to_string(), "Server decoration already defined: db");
        assert_eq!(server.decoration::<u8>("db"), Some(1));
    }

    #[tokio::test]
    async fn test_register_after_stop_is_rejected() {
        let server = Server::new();
        server.stop().await;

        let err = server.register(&EchoPlugin, json!({})).await.unwrap_err();

        assert!(matches!(err, EchoError::Host(HostError::Stopped(ref name)) if name == "echo"));
        assert!(!server.is_registered("echo"));
        assert!(server.plugin_exposures("echo").is_none());
    }

    #[test]
    fn test_decorate_all_applies_nothing_on_conflict() {
        let server = Server::new();
        server.decorate(Surface::Request, "b", 0u8).unwrap();

        let err = server
            .decorate_all(vec![("a".to_string(), 1u8), ("b".to_string(), 2u8)])
            .unwrap_err();
        assert_eq!(err.to_string(), "Request decoration already defined: b");
        assert!(!server.is_decorated(Surface::Server, "a"));
        assert!(!server.is_decorated(Surface::Server, "b"));

        let err = server
            .decorate_all(vec![("c".to_string(), 1u8), ("c".to_string(), 2u8)])
            .unwrap_err();
        assert!(matches!(err, HostError::DecorationConflict { .. }));
        assert!(!server.is_decorated(Surface::Request, "c"));
    }

    #[test]
    fn test_concurrent_decorate_all_has_one_winner() {
        let server = Server::new();

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let server = server.clone();
                std::thread::spawn(move || {
                    server
                        .decorate_all(vec![("a".to_string(), i), ("b".to_string(), i)])
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        let winner = server.decoration::<u32>("a").unwrap();
        assert_eq!(server.decoration::<u32>("b"), Some(winner));
        let on_request = server.request_decorations();
        assert_eq!(on_request.get::<u32>("a"), Some(winner));
        assert_eq!(on_request.get::<u32>("b"), Some(winner));
    }

    #[tokio::test]
    async fn test_request_decorations_reach_handlers() {
        let server = Server::new();
        server.register(&EchoPlugin, json!({})).await.unwrap();

        let app = server.attach(
            Router::new()
                .route(
                    "/echo",
                    get(|decorations: RequestDecorations| async move {
                        decorations.get::<String>("echo").unwrap_or_default()
                    }),
                )
                .route(
                    "/plugins",
                    get(|Extension(server): Extension<Server>| async move {
                        server.registrations().len().to_string()
                    }),
                ),
        );
        let client = TestServer::new(app).unwrap();

        client.get("/echo").await.assert_text("hi");
        client.get("/plugins").await.assert_text("1");
    }

    #[tokio::test]
    async fn test_stop_runs_plugin_listeners_once() {
        let server = Server::new();
        let scoped = PluginServer {
            server: server.clone(),
            plugin: "counter",
        };
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        scoped.on_stop(move || async move {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        server.stop().await;
        server.stop().await;

        assert!(server.is_stopped());
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
