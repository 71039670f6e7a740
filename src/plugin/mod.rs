//! MySQL pool plugin
//!
//! Registers one or more MySQL pools with a [`Server`](crate::host::Server):
//!
//! 1. validate the options ([`options`])
//! 2. resolve the decoration mode ([`decoration::DecorationMode`])
//! 3. open every pool concurrently ([`connector`])
//! 4. bind the [`MysqlBundle`] as exposures or decorations ([`decoration`])
//! 5. end every pool when the server stops ([`shutdown`])
//!
//! A failed registration leaves neither open pools nor attachments behind.

pub mod connector;
pub mod decoration;
pub mod error;
pub mod options;
pub mod shutdown;


use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::db::{DynDatabasePool, DynDriver, SqlxMySqlDriver};
use crate::host::{Plugin, PluginServer, RequestDecorations, Server};

pub use decoration::DecorationMode;
pub use error::PluginError;
pub use options::{ConnectionConfig, Decoration, ValidatedOptions};

/// Registration name, also the first tag of every log entry
pub const PLUGIN_NAME: &str = env!("CARGO_PKG_NAME");

/// Decoration name used for `decorate: true`
pub const DEFAULT_DECORATION: &str = "mysql";

pub(crate) const TAG_INFO: &str = "info";
pub(crate) const TAG_ERROR: &str = "error";

/// One pool, or several in input order.
#[derive(Clone)]
pub enum Pools {
    Single(DynDatabasePool),
    Many(Vec<DynDatabasePool>),
}

impl Pools {
    /// A single pool for one entry, the ordered list otherwise
    pub fn from_vec(mut pools: Vec<DynDatabasePool>) -> Self {
        if pools.len() == 1 {
            Self::Single(pools.remove(0))
        } else {
            Self::Many(pools)
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DynDatabasePool> {
        match self {
            Self::Single(pool) => std::slice::from_ref(pool).iter(),
            Self::Many(pools) => pools.iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn single(&self) -> Option<&DynDatabasePool> {
        match self {
            Self::Single(pool) => Some(pool),
            Self::Many(_) => None,
        }
    }

    pub fn get(&self, index: usize) -> Option<&DynDatabasePool> {
        self.iter().nth(index)
    }
}

impl fmt::Debug for Pools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identities: Vec<String> = self.iter().map(|p| p.connection_info().identity()).collect();
        match self {
            Self::Single(_) => f.debug_tuple("Single").field(&identities[0]).finish(),
            Self::Many(_) => f.debug_tuple("Many").field(&identities).finish(),
        }
    }
}

/// What the plugin hands to the application: the driver and its pool(s).
#[derive(Clone)]
pub struct MysqlBundle {
    pub lib: DynDriver,
    pub pool: Pools,
}

impl MysqlBundle {
    /// The bundle as exposed on `server`, when registered without `decorate`
    pub fn from_exposures(server: &Server) -> Option<Self> {
        let exposures = server.plugin_exposures(PLUGIN_NAME)?;
        Some(Self {
            lib: exposures.get::<DynDriver>("lib")?,
            pool: exposures.get::<Pools>("pool")?,
        })
    }
}

impl fmt::Debug for MysqlBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlBundle")
            .field("lib", &self.lib.name())
            .field("pool", &self.pool)
            .finish()
    }
}

/// Extractor for the bundle registered with `decorate: true`.
pub struct Mysql(pub MysqlBundle);

impl<S> FromRequestParts<S> for Mysql
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let decorations = RequestDecorations::from_request_parts(parts, state).await?;
        decorations
            .get::<MysqlBundle>(DEFAULT_DECORATION)
            .map(Mysql)
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "mysql decoration is not registered"))
    }
}

/// The plugin. Holds the driver every pool is opened with.
pub struct MysqlPlugin {
    driver: DynDriver,
}

impl Default for MysqlPlugin {
    fn default() -> Self {
        Self::new(Arc::new(SqlxMySqlDriver::default()))
    }
}

impl MysqlPlugin {
    pub fn new(driver: DynDriver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &DynDriver {
        &self.driver
    }
}

#[async_trait]
impl Plugin for MysqlPlugin {
    type Error = PluginError;

    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    async fn register(&self, server: &PluginServer, options: Value) -> Result<(), PluginError> {
        let log = server.logger();

        let options = options::validate(&options).map_err(|err| {
            log.log(&[PLUGIN_NAME, TAG_ERROR], err.to_string());
            err
        })?;
        let mode = DecorationMode::resolve(&options)?;

        let pools = connector::connect_all(&self.driver, &options, &log)
            .await
            .map_err(|err| {
                log.log(&[PLUGIN_NAME, TAG_ERROR], err.to_string());
                err
            })?;

        let bundle = MysqlBundle {
            lib: Arc::clone(&self.driver),
            pool: Pools::from_vec(pools.clone()),
        };
        if let Err(err) = decoration::bind(server, &mode, &bundle) {
            log.log(&[PLUGIN_NAME, TAG_ERROR], err.to_string());
            shutdown::release(&pools, &log).await;
            return Err(err);
        }

        shutdown::install(server, pools);
        Ok(())
    }
}
