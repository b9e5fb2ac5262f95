//! Out-of-tree scorer plugins, loaded as shared libraries.
//!
//! Strategy (b) from the source's re-architecture notes: hot-reload via
//! runtime module re-import doesn't translate to a compiled language, so
//! pluggable scorers are compiled as `cdylib`s exposing one extern symbol.
//! Libraries are never unloaded (`libloading::Library` values are held for
//! the life of the process) — symbol pointers into an unloaded library are
//! immediate undefined behavior, and the registry has no way to prove no
//! `Arc<dyn Scorer>` clone from that library is still reachable.

use crate::scorer::Scorer;
use std::path::Path;

/// Passed to a plugin's entry point so it can hand back the scorers it
/// defines without the host needing to know its types.
pub trait ScorerRegistrar {
    fn register(&mut self, scorer: Box<dyn Scorer>);
}

impl ScorerRegistrar for Vec<Box<dyn Scorer>> {
    fn register(&mut self, scorer: Box<dyn Scorer>) {
        self.push(scorer);
    }
}

/// Signature every plugin must export under the name `autoscorer_register`.
pub type RegisterFn = unsafe extern "C" fn(&mut dyn ScorerRegistrar);

const ENTRY_POINT: &[u8] = b"autoscorer_register\0";

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("failed to load plugin {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: libloading::Error,
    },
    #[error("plugin {path} has no `{symbol}` entry point: {source}")]
    MissingSymbol {
        path: String,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("plugin {path} registered no scorers")]
    Empty { path: String },
}

/// A loaded plugin library. Kept alive for the process lifetime; dropping
/// it while any scorer it defined is still in use would be unsound.
pub struct LoadedPlugin {
    pub(crate) library: libloading::Library,
    pub scorers: Vec<Box<dyn Scorer>>,
}

/// Load a `cdylib` at `path` and collect every scorer it registers.
///
/// # Safety note
/// This calls into foreign code via an FFI symbol. The plugin is assumed
/// to uphold the `autoscorer_register` ABI contract; there is no way to
/// verify that from the host side.
pub fn load(path: &Path) -> Result<LoadedPlugin, PluginError> {
    let path_str = path.display().to_string();

    let library = unsafe { libloading::Library::new(path) }.map_err(|source| PluginError::Load {
        path: path_str.clone(),
        source,
    })?;

    let register: libloading::Symbol<RegisterFn> = unsafe { library.get(ENTRY_POINT) }
        .map_err(|source| PluginError::MissingSymbol {
            path: path_str.clone(),
            symbol: "autoscorer_register",
            source,
        })?;

    let mut scorers: Vec<Box<dyn Scorer>> = Vec::new();
    unsafe { register(&mut scorers) };

    if scorers.is_empty() {
        return Err(PluginError::Empty { path: path_str });
    }

    Ok(LoadedPlugin { library, scorers })
}
