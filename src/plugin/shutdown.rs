//! Shutdown hook

use super::{PLUGIN_NAME, TAG_ERROR, TAG_INFO};
use crate::db::DynDatabasePool;
use crate::host::{PluginServer, ServerLog};

/// End every pool when the server stops.
pub fn install(server: &PluginServer, pools: Vec<DynDatabasePool>) {
    let log = server.logger();
    server.on_stop(move || async move {
        release(&pools, &log).await;
    });
}

/// End pools one by one, in order. A failure is logged and the next pool is
/// still ended.
pub async fn release(pools: &[DynDatabasePool], log: &ServerLog) {
    for pool in pools {
        let info = pool.connection_info();
        log.log(
            &[PLUGIN_NAME, TAG_INFO],
            format!("ending mysql connection pool for {}", info),
        );
        if let Err(e) = pool.close().await {
            log.log(
                &[PLUGIN_NAME, TAG_ERROR],
                format!("failed to end mysql connection pool for {}: {:#}", info, e),
            );
        }
    }
}
