//! shelf-core - Core library for Shelf
//!
//! An offline-first record cache: a durable local store that stays writable
//! while disconnected, tags every record with a pending-mutation marker, and
//! replays those mutations against a remote document store once connectivity
//! returns.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use config::ShelfConfig;
pub use connectivity::{
    spawn_listener, ConnectivityMonitor, ManualConnectivity, NetworkStatus, TcpProbe,
};
pub use error::{Error, Result};
pub use models::{Book, FieldValue, Fields, Record, SyncStatus};
pub use remote::{
    HttpRemoteStore, MemoryRemoteStore, RemoteDocument, RemoteError, RemoteResult, RemoteStore,
};
pub use services::{RecordStore, RecordSubscription};
pub use sync::{Coordinator, DrainReport};
