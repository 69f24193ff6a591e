//! Streams newline-delimited Bitcoin block and transaction JSON records into
//! a relational Postgres schema: blocks, transactions, inputs, outputs,
//! deduplicated addresses, and derived address-interaction edges.

pub mod db;
pub mod processor;
pub mod record;
pub mod settings;
pub mod store;
