//! Pool status endpoint
//!
//! Lists every pool the plugin made reachable, whether decorated or exposed,
//! and pings each one.

use axum::{extract::Extension, Json};
use futures::future::join_all;
use serde::Serialize;

use super::ApiError;
use crate::db::DynDatabasePool;
use crate::host::{RequestDecorations, Server};
use crate::plugin::MysqlBundle;

/// Where a bundle was found when it is not a decoration
pub const EXPOSED_SOURCE: &str = "exposed";

#[derive(Debug, Serialize)]
pub struct PoolStatus {
    /// Decoration name, or `exposed`
    pub source: String,
    pub index: usize,
    pub identity: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PoolsResponse {
    pub driver: Option<&'static str>,
    pub stopped: bool,
    pub pools: Vec<PoolStatus>,
}

/// GET /api/v1/mysql/pools
pub async fn list_pools(
    Extension(server): Extension<Server>,
    decorations: RequestDecorations,
) -> Result<Json<PoolsResponse>, ApiError> {
    let bundles = collect_bundles(&server, &decorations);
    if bundles.is_empty() {
        return Err(ApiError::service_unavailable("No MySQL pool is registered"));
    }

    let driver = bundles.first().map(|(_, bundle)| bundle.lib.name());
    let targets: Vec<(String, usize, DynDatabasePool)> = bundles
        .iter()
        .flat_map(|(source, bundle)| {
            bundle
                .pool
                .iter()
                .enumerate()
                .map(move |(index, pool)| (source.clone(), index, pool.clone()))
        })
        .collect();

    let pools = join_all(targets.into_iter().map(|(source, index, pool)| async move {
        let result = pool.ping().await;
        PoolStatus {
            source,
            index,
            identity: pool.connection_info().identity(),
            healthy: result.is_ok(),
            error: result.err().map(|e| format!("{:#}", e)),
        }
    }))
    .await;

    Ok(Json(PoolsResponse {
        driver,
        stopped: server.is_stopped(),
        pools,
    }))
}

/// Decorated bundles by name, then the exposed one.
fn collect_bundles(server: &Server, decorations: &RequestDecorations) -> Vec<(String, MysqlBundle)> {
    let mut bundles: Vec<(String, MysqlBundle)> = decorations
        .names()
        .into_iter()
        .filter_map(|name| decorations.get::<MysqlBundle>(&name).map(|bundle| (name, bundle)))
        .collect();

    if let Some(bundle) = MysqlBundle::from_exposures(server) {
        bundles.push((EXPOSED_SOURCE.to_string(), bundle));
    }
    bundles
}
