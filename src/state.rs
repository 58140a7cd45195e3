use crate::catalog::{Catalog, CatalogEntry};
use crate::ledger::SpaceLedger;
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The process-wide mutable server state.
///
/// Command handling is serialized by the single dispatcher loop; transfer tasks lock the
///  state only at well-defined points (marking a backing file open before its first write
///  and closed after the last, plus failure-path cleanup), so the lock is never held
///  across a blocking transfer.
#[derive(Debug)]
pub struct ServerState {
    pub ledger: SpaceLedger,
    pub catalog: Catalog,
    /// Backing files currently being written by an in-flight upload. Consulted only for
    ///  cleanup at shutdown, never for regular accounting.
    pub open_files: FxHashSet<PathBuf>,
}

pub type SharedState = Arc<Mutex<ServerState>>;

impl ServerState {
    pub fn new(quota: u64) -> ServerState {
        ServerState {
            ledger: SpaceLedger::new(quota),
            catalog: Catalog::new(),
            open_files: FxHashSet::default(),
        }
    }

    /// Builds the state from the startup scan of the shared folder. Pre-existing files
    ///  may exceed the quota; the surplus is carried as ledger debt.
    pub fn from_index(quota: u64, files: Vec<CatalogEntry>) -> ServerState {
        let mut state = ServerState::new(quota);
        for file in files {
            state.ledger.reserve(file.size);
            state.catalog.insert(file);
        }
        state
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }
}
