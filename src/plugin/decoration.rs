//! Exposure and decoration binding
//!
//! Every entry in a registration must ask for the same kind of binding. The
//! kind is resolved once into a [`DecorationMode`] and the bundle is bound in
//! one step after all pools are open.

use super::error::PluginError;
use super::options::{Decoration, ValidatedOptions};
use super::{MysqlBundle, Pools, DEFAULT_DECORATION};
use crate::host::PluginServer;

/// How the bundle reaches the rest of the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecorationMode {
    /// No `decorate` anywhere: `lib` and `pool` go into the plugin's exposures
    Expose,
    /// `decorate: true` everywhere: one bundle under [`DEFAULT_DECORATION`]
    Default,
    /// `decorate: "<name>"` everywhere: one single-pool bundle per entry, by name
    Named(Vec<String>),
}

impl DecorationMode {
    /// Resolve the mode shared by all entries.
    pub fn resolve(options: &ValidatedOptions) -> Result<Self, PluginError> {
        let mut names = Vec::with_capacity(options.len());
        let (mut absent, mut default) = (0usize, 0usize);

        for entry in options.iter() {
            match &entry.decoration {
                None => absent += 1,
                Some(Decoration::Default) => default += 1,
                Some(Decoration::Named(name)) => names.push(name.clone()),
            }
        }

        let kinds = [absent, default, names.len()]
            .iter()
            .filter(|&&count| count > 0)
            .count();
        if kinds > 1 {
            return Err(PluginError::MixedDecoration);
        }

        Ok(if default > 0 {
            Self::Default
        } else if !names.is_empty() {
            Self::Named(names)
        } else {
            Self::Expose
        })
    }
}

/// Bind `bundle` to the server according to `mode`.
///
/// Either every decoration is applied or none is.
pub fn bind(server: &PluginServer, mode: &DecorationMode, bundle: &MysqlBundle) -> Result<(), PluginError> {
    match mode {
        DecorationMode::Expose => {
            server.expose("lib", bundle.lib.clone());
            server.expose("pool", bundle.pool.clone());
            Ok(())
        }
        DecorationMode::Default => decorate_all(server, vec![(DEFAULT_DECORATION.to_string(), bundle.clone())]),
        DecorationMode::Named(names) => {
            let decorations = names
                .iter()
                .cloned()
                .zip(bundle.pool.iter().cloned())
                .map(|(name, pool)| {
                    let single = MysqlBundle {
                        lib: bundle.lib.clone(),
                        pool: Pools::Single(pool),
                    };
                    (name, single)
                })
                .collect();
            decorate_all(server, decorations)
        }
    }
}

fn decorate_all(server: &PluginServer, decorations: Vec<(String, MysqlBundle)>) -> Result<(), PluginError> {
    server.decorate_all(decorations)?;
    Ok(())
}
