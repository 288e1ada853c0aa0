//! Hierarchical-Z early culling: the buffer, its fully-associative cache,
//! and the stage that drives both against the traversal's stamp stream
//! (spec §4.3, §4.6).

pub mod hzbuffer;
pub mod hzcache;
pub mod hzstage;

pub use hzbuffer::HZBuffer;
pub use hzcache::{HZCache, InsertResult, SearchResult};
pub use hzstage::{HZConfig, HZStage, HZStageState, MAX_STAMP_BLOCKS};
