//! # Types Module
//!
//! Request and record shapes shared by the transport and the cache.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RetrieveMultipleRequest`] | Filtered read (`filter`, `select`, `count`) |
//! | [`CreateRequest`] | Record creation with optional representation |
//! | [`DeleteRequest`] | Delete by key, optionally carrying the lookup discriminator |
//! | [`Record`] | Field map returned by the API |

pub mod request;

pub use request::{CreateRequest, DeleteRequest, Record, RetrieveMultipleRequest, ETAG_ANNOTATION};
