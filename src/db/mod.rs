//! Database layer
//!
//! This module is the boundary to the MySQL driver. It provides:
//! - Connection settings (URL or option object) and their resolution
//! - The `Driver` and `DatabasePool` traits the plugin works against
//! - The sqlx backed implementation of both
//!
//! # Usage
//!
//! ```ignore
//! use mysql_pool_plugin::db::{ConnectionSettings, Driver, SqlxMySqlDriver};
//!
//! let params = ConnectionSettings::Url("mysql://app@db/orders".into()).resolve()?;
//! let pool = SqlxMySqlDriver::default().create_pool(&params).await?;
//! pool.ping().await?;
//! pool.close().await?;
//! ```

pub mod pool;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use pool::{DatabasePool, Driver, DynDatabasePool, DynDriver, MysqlDatabase, SqlxMySqlDriver};
pub use settings::{
    ConnectionInfo, ConnectionParams, ConnectionSettings, InvalidConnectionUrl,
    StructuredSettings, DEFAULT_SETTINGS_URL,
};
