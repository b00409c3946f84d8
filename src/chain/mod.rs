// Chain module - WHERE THE CHAIN IS
// Read-only view of the tip supplied by chain sync

mod tipset;
mod view;

pub use tipset::{GasInfo, TipSummary};
pub use view::{ChainStateError, ChainStateView, TipFeed};
