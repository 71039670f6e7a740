//! Pool connector
//!
//! Opens one pool per entry. Entries are independent, so all of them are
//! attempted concurrently and the results collected in input order.

use futures::future::join_all;

use super::error::PluginError;
use super::options::{ConnectionConfig, ValidatedOptions};
use super::shutdown;
use super::{TAG_INFO, PLUGIN_NAME};
use crate::db::{DynDatabasePool, DynDriver};
use crate::host::ServerLog;

/// Open a pool for every entry.
///
/// If any entry fails, the pools that did open are ended before the first
/// failure (in input order) is returned.
pub async fn connect_all(
    driver: &DynDriver,
    options: &ValidatedOptions,
    log: &ServerLog,
) -> Result<Vec<DynDatabasePool>, PluginError> {
    let results = join_all(options.iter().map(|entry| connect(driver, entry, log))).await;

    let mut pools = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(pool) => pools.push(pool),
            Err(err) if first_error.is_none() => first_error = Some(err),
            Err(err) => tracing::debug!("Further connection failure: {}", err),
        }
    }

    if let Some(err) = first_error {
        shutdown::release(&pools, log).await;
        return Err(err);
    }
    Ok(pools)
}

/// Open the pool for one entry.
pub async fn connect(
    driver: &DynDriver,
    entry: &ConnectionConfig,
    log: &ServerLog,
) -> Result<DynDatabasePool, PluginError> {
    let params = entry.settings.resolve()?;

    let pool = driver
        .create_pool(&params)
        .await
        .map_err(|source| PluginError::driver(params.info().identity(), source))?;

    log.log(
        &[PLUGIN_NAME, TAG_INFO],
        format!("hapi connection created for {}", pool.connection_info()),
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::RecordingDriver;
    use crate::host::Server;
    use crate::plugin::options::validate;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pools_come_back_in_input_order() {
        let recording = Arc::new(RecordingDriver::new());
        let driver: DynDriver = recording.clone();
        let options = validate(&json!([
            { "settings": "mysql://a@one/db1" },
            { "settings": "mysql://b@two/db2" },
            { "settings": "mysql://c@three/db3" }
        ]))
        .unwrap();

        let pools = connect_all(&driver, &options, &Server::new().logger()).await.unwrap();

        let identities: Vec<String> = pools.iter().map(|p| p.connection_info().identity()).collect();
        assert_eq!(identities, vec!["a@one/db1", "b@two/db2", "c@three/db3"]);
        assert_eq!(recording.created().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_the_driver() {
        let recording = Arc::new(RecordingDriver::new());
        let driver: DynDriver = recording.clone();
        let options = validate(&json!({ "settings": "mysql://localhost" })).unwrap();

        let err = connect_all(&driver, &options, &Server::new().logger()).await.unwrap_err();

        assert!(matches!(err, PluginError::InvalidConnectionUrl(_)));
        assert_eq!(err.to_string(), "Invalid connection URL");
        assert!(recording.created().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_releases_opened_pools() {
        let recording = Arc::new(RecordingDriver::new().failing_on("down"));
        let driver: DynDriver = recording.clone();
        let options = validate(&json!([
            { "settings": "mysql://a@up1/db" },
            { "settings": "mysql://b@down/db" },
            { "settings": "mysql://c@up2/db" }
        ]))
        .unwrap();

        let err = connect_all(&driver, &options, &Server::new().logger()).await.unwrap_err();

        match &err {
            PluginError::DriverConnection { identity, .. } => assert_eq!(identity, "b@down/db"),
            other => panic!("Expected a driver error, got {:?}", other),
        }
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(recording.closed(), vec!["a@up1/db", "c@up2/db"]);
    }
}
