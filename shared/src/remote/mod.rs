//! Remote-side read path: batch decode into receive histories, live
//! state application for interpolated and predicted ghosts, and the
//! per-connection packet buffer that keeps decode order ascending.

pub mod chunk_deserializer;
pub mod ghost_update;
pub mod prediction_backup;
pub mod remote_manager;
