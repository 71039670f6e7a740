//! In-memory driver for tests
//!
//! Records every pool it creates and every close, in order, and can be told
//! to fail for particular hosts.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::pool::{DatabasePool, Driver, DynDatabasePool};
use super::settings::{ConnectionInfo, ConnectionParams};

#[derive(Default)]
pub(crate) struct RecordingDriver {
    created: Mutex<Vec<ConnectionParams>>,
    closed: Arc<Mutex<Vec<String>>>,
    fail_create_hosts: Vec<String>,
    fail_close_hosts: Vec<String>,
}

impl RecordingDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `create_pool` fails for this host
    pub(crate) fn failing_on(mut self, host: &str) -> Self {
        self.fail_create_hosts.push(host.to_string());
        self
    }

    /// `close` fails for pools on this host
    pub(crate) fn failing_close_on(mut self, host: &str) -> Self {
        self.fail_close_hosts.push(host.to_string());
        self
    }

    /// Parameters of every successfully created pool, in creation order
    pub(crate) fn created(&self) -> Vec<ConnectionParams> {
        self.created.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Identities of every closed pool, in close order
    pub(crate) fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn create_pool(&self, params: &ConnectionParams) -> Result<DynDatabasePool> {
        if self.fail_create_hosts.contains(&params.host) {
            bail!("connect ECONNREFUSED {}:{}", params.host, params.port);
        }
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(params.clone());

        Ok(Arc::new(RecordingPool {
            info: params.info(),
            closed: AtomicBool::new(false),
            fail_close: self.fail_close_hosts.contains(&params.host),
            close_log: Arc::clone(&self.closed),
        }))
    }
}

pub(crate) struct RecordingPool {
    info: ConnectionInfo,
    closed: AtomicBool,
    fail_close: bool,
    close_log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DatabasePool for RecordingPool {
    fn connection_info(&self) -> &ConnectionInfo {
        &self.info
    }

    async fn ping(&self) -> Result<()> {
        if self.is_closed() {
            return Err(anyhow!("pool is closed"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(self.info.identity());

        if self.fail_close {
            bail!("socket hang up while ending pool for {}", self.info);
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            bail!("pool for {} is already closed", self.info);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}
