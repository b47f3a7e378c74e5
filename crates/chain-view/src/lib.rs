//! Chain View - the validator's notion of L2 height and proven height
//!
//! Heights come from an external block source that reconciles L1 reorgs on
//! its own: blocks and proofs can vanish and reappear between two reads.
//! Nothing here caches an answer past a single call.
//! - `L2BlockSource`: the collaborator contract
//! - `MemoryBlockSource`: in-process source that can be pruned and restored
//! - `ChainMonitor`: polls the source and classifies what changed

pub mod memory;
pub mod monitor;
pub mod source;

pub use memory::MemoryBlockSource;
pub use monitor::{ChainEvent, ChainMonitor, ChainUpdate};
pub use source::{ChainPosition, L2BlockSource};
