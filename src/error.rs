//! Fatal startup errors. Runtime errors (connection I/O, journal writes,
//! timer misfires) are logged and contained instead of propagated.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener on port {port}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to create journal file at {path}")]
    JournalCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install signal handlers")]
    Signal(#[source] io::Error),
}
