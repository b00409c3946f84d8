// Relay module - THE FRONT DOOR
// Request/response operations over the topic cache, pool and chain view

mod error;
mod ingest;
mod service;

pub use error::{ErrorKind, RelayError};
pub use ingest::{spawn_ingest, IngestStats};
pub use service::{GasSnapshot, RelayService, TipsetSnapshot};
