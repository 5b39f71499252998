//! Data models for Shelf

pub mod book;
mod record;

pub use book::Book;
pub use record::{
    generate_record_key, validate_field_name, FieldValue, Fields, Record, SyncStatus,
    RESERVED_FIELDS,
};
