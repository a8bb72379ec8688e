//! Durable local store: initialization, session snapshot, image blobs

pub mod images;
pub mod init;
pub mod snapshot;

pub use images::{ImageRow, ImageStore};
pub use init::open_store;
pub use snapshot::{SnapshotStore, STATE_ID};
