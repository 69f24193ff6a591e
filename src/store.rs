use anyhow::Result;

use crate::record::{BlockRecord, InputRecord, OutputRecord, TransactionRecord};

pub type AddressId = i64;
pub type InputId = i64;
pub type OutputId = i64;

/// Outcome of registering an address hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressEntry {
    /// The hash was not registered before; a new row was written.
    Created(AddressId),
    /// The hash was already registered; nothing was written.
    Existing(AddressId),
}

impl AddressEntry {
    pub fn id(self) -> AddressId {
        match self {
            AddressEntry::Created(id) | AddressEntry::Existing(id) => id,
        }
    }
}

/// Write interface to the relational store.
///
/// The processor drives these operations in a fixed order per record
/// (parents before children), so implementations never see a child row
/// whose transaction row has not been written in the same record. All
/// operations are idempotent under re-ingestion: blocks overwrite, every
/// other entity keeps its existing row.
pub trait ChainStore {
    fn store_block(&mut self, block: &BlockRecord) -> Result<()>;

    /// Writes the canonical transaction row. The record's `inputs` and
    /// `outputs` have already been detached by the normalizer.
    fn store_transaction(&mut self, tx: &TransactionRecord) -> Result<()>;

    fn store_input(&mut self, transaction_hash: &str, input: &InputRecord) -> Result<InputId>;

    fn store_output(&mut self, transaction_hash: &str, output: &OutputRecord) -> Result<OutputId>;

    /// Registers an address hash, deduplicating across the whole store.
    /// A concurrent or repeated registration of the same hash resolves to
    /// `Existing`, never an error.
    fn ensure_address(&mut self, hash: &str) -> Result<AddressEntry>;

    fn link_input_address(&mut self, input: InputId, address: AddressId) -> Result<()>;

    fn link_output_address(&mut self, output: OutputId, address: AddressId) -> Result<()>;

    fn store_interaction(
        &mut self,
        transaction_hash: &str,
        input_address: AddressId,
        output_address: AddressId,
    ) -> Result<()>;

    /// Highest block number already stored, if any. Used to report where a
    /// resumed ingestion run stands.
    fn last_block_number(&mut self) -> Result<Option<i64>>;
}
