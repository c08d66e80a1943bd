//! Raw SQL, one module per table family. Every function takes a `&Connection`
//! so it can run inside the caller's transaction or savepoint.

pub mod audit_ops;
pub mod catalog_ops;
pub mod value_codec;
pub mod versioned_ops;
