//! Async services shared by the coordinator and clients

mod record_store;

pub use record_store::{RecordStore, RecordSubscription};
