use std::collections::BTreeSet;
use std::io::BufRead;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::record::{self, BlockRecord, InputRecord, OutputRecord, Record};
use crate::store::{AddressEntry, AddressId, ChainStore};

/// Counters accumulated over one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub blocks: u64,
    pub transactions: u64,
    pub inputs: u64,
    pub outputs: u64,
    pub addresses_created: u64,
    pub interactions: u64,
    pub skipped_lines: u64,
}

/// Derives the distinct (input address, output address) pairs for one
/// transaction: the cross product of the distinct values on each side.
/// Duplicate addresses collapse, so an address appearing in several inputs
/// or outputs contributes one edge per counterpart, and an empty side
/// yields no pairs. Emission follows the ordered sets, so the result is
/// deterministic for a given transaction.
pub fn derive_interactions<T: Ord + Copy>(inputs: &[T], outputs: &[T]) -> Vec<(T, T)> {
    let distinct_inputs: BTreeSet<T> = inputs.iter().copied().collect();
    let distinct_outputs: BTreeSet<T> = outputs.iter().copied().collect();

    distinct_inputs
        .iter()
        .flat_map(|input| distinct_outputs.iter().map(|output| (*input, *output)))
        .collect()
}

/// Consumes decoded records and sequences their writes against the store.
pub struct RecordProcessor<S: ChainStore> {
    store: S,
    stats: IngestStats,
}

impl<S: ChainStore> RecordProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Reads the stream line by line until end-of-stream, dispatching each
    /// record synchronously before the next line is read.
    ///
    /// A line that cannot be decoded is logged and skipped. An unrecognized
    /// record type halts the run with an error: it means the upstream schema
    /// has drifted and must be fixed there, not absorbed here.
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (line_number, line) in reader.lines().enumerate() {
            let line = line.context("failed to read line from input stream")?;

            match record::decode_line(&line) {
                Ok(Record::Block(block)) => self.process_block(&block)?,
                Ok(Record::Transaction(tx)) => self.process_transaction(tx)?,
                Err(e) if e.is_fatal() => {
                    error!("Halting at line {}: {}", line_number + 1, e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!(
                        "Skipping line {} that was not decoded properly: {}",
                        line_number + 1,
                        e
                    );
                    self.stats.skipped_lines += 1;
                }
            }
        }
        Ok(())
    }

    fn process_block(&mut self, block: &BlockRecord) -> Result<()> {
        info!("Writing block {}", block.number);
        self.store.store_block(block)?;
        self.stats.blocks += 1;
        Ok(())
    }

    /// Writes everything one transaction record decomposes into, in
    /// dependency order: the transaction row, then each input with its
    /// addresses, then each output with its addresses, then the derived
    /// address interactions.
    fn process_transaction(&mut self, mut tx: record::TransactionRecord) -> Result<()> {
        let (tx_inputs, tx_outputs) = tx.split_io();

        info!(
            "Writing transaction {} from block {}",
            tx.hash, tx.block_number
        );
        self.store.store_transaction(&tx)?;
        self.stats.transactions += 1;

        let input_addresses = self.process_inputs(&tx.hash, &tx_inputs)?;
        let output_addresses = self.process_outputs(&tx.hash, &tx_outputs)?;

        for (input_address, output_address) in
            derive_interactions(&input_addresses, &output_addresses)
        {
            debug!(
                "Writing address interaction {} -> {} for transaction {}",
                input_address, output_address, tx.hash
            );
            self.store
                .store_interaction(&tx.hash, input_address, output_address)?;
            self.stats.interactions += 1;
        }

        Ok(())
    }

    /// Writes the inputs in the order given and registers every raw
    /// address-list entry. Returns the accumulated address ids, duplicates
    /// included; the interaction deriver collapses them.
    fn process_inputs(
        &mut self,
        transaction_hash: &str,
        inputs: &[InputRecord],
    ) -> Result<Vec<AddressId>> {
        let mut collected = Vec::new();
        for input in inputs {
            info!(
                "Writing input {} of transaction {}",
                input.index, transaction_hash
            );
            let input_id = self.store.store_input(transaction_hash, input)?;
            self.stats.inputs += 1;

            for address in &input.addresses {
                let address_id = self.register_address(address)?;
                self.store.link_input_address(input_id, address_id)?;
                collected.push(address_id);
            }
        }
        Ok(collected)
    }

    fn process_outputs(
        &mut self,
        transaction_hash: &str,
        outputs: &[OutputRecord],
    ) -> Result<Vec<AddressId>> {
        let mut collected = Vec::new();
        for output in outputs {
            info!(
                "Writing output {} of transaction {}",
                output.index, transaction_hash
            );
            let output_id = self.store.store_output(transaction_hash, output)?;
            self.stats.outputs += 1;

            for address in &output.addresses {
                let address_id = self.register_address(address)?;
                self.store.link_output_address(output_id, address_id)?;
                collected.push(address_id);
            }
        }
        Ok(collected)
    }

    fn register_address(&mut self, address: &str) -> Result<AddressId> {
        debug!("Writing address {}", address);
        match self.store.ensure_address(address)? {
            AddressEntry::Created(id) => {
                self.stats.addresses_created += 1;
                Ok(id)
            }
            AddressEntry::Existing(id) => Ok(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::io::Cursor;

    use super::*;
    use crate::record::TransactionRecord;
    use crate::store::{InputId, OutputId};

    /// In-memory stand-in for the relational store, mirroring its conflict
    /// semantics: blocks overwrite, everything else keeps the existing row.
    #[derive(Debug, Default)]
    struct MemoryStore {
        blocks: BTreeMap<i64, BlockRecord>,
        transactions: BTreeMap<String, TransactionRecord>,
        inputs: BTreeMap<(String, i64), (InputId, InputRecord)>,
        outputs: BTreeMap<(String, i64), (OutputId, OutputRecord)>,
        addresses: BTreeMap<String, AddressId>,
        input_links: BTreeSet<(InputId, AddressId)>,
        output_links: BTreeSet<(OutputId, AddressId)>,
        interactions: BTreeSet<(String, AddressId, AddressId)>,
        next_id: i64,
    }

    impl MemoryStore {
        fn next_id(&mut self) -> i64 {
            self.next_id += 1;
            self.next_id
        }

        fn address_id(&self, hash: &str) -> AddressId {
            self.addresses[hash]
        }
    }

    impl ChainStore for MemoryStore {
        fn store_block(&mut self, block: &BlockRecord) -> Result<()> {
            self.blocks.insert(block.number, block.clone());
            Ok(())
        }

        fn store_transaction(&mut self, tx: &TransactionRecord) -> Result<()> {
            self.transactions
                .entry(tx.hash.clone())
                .or_insert_with(|| tx.clone());
            Ok(())
        }

        fn store_input(&mut self, transaction_hash: &str, input: &InputRecord) -> Result<InputId> {
            let key = (transaction_hash.to_string(), input.index);
            if let Some((id, _)) = self.inputs.get(&key) {
                return Ok(*id);
            }
            let id = self.next_id();
            self.inputs.insert(key, (id, input.clone()));
            Ok(id)
        }

        fn store_output(
            &mut self,
            transaction_hash: &str,
            output: &OutputRecord,
        ) -> Result<OutputId> {
            let key = (transaction_hash.to_string(), output.index);
            if let Some((id, _)) = self.outputs.get(&key) {
                return Ok(*id);
            }
            let id = self.next_id();
            self.outputs.insert(key, (id, output.clone()));
            Ok(id)
        }

        fn ensure_address(&mut self, hash: &str) -> Result<AddressEntry> {
            if let Some(&id) = self.addresses.get(hash) {
                return Ok(AddressEntry::Existing(id));
            }
            let id = self.next_id();
            self.addresses.insert(hash.to_string(), id);
            Ok(AddressEntry::Created(id))
        }

        fn link_input_address(&mut self, input: InputId, address: AddressId) -> Result<()> {
            self.input_links.insert((input, address));
            Ok(())
        }

        fn link_output_address(&mut self, output: OutputId, address: AddressId) -> Result<()> {
            self.output_links.insert((output, address));
            Ok(())
        }

        fn store_interaction(
            &mut self,
            transaction_hash: &str,
            input_address: AddressId,
            output_address: AddressId,
        ) -> Result<()> {
            self.interactions.insert((
                transaction_hash.to_string(),
                input_address,
                output_address,
            ));
            Ok(())
        }

        fn last_block_number(&mut self) -> Result<Option<i64>> {
            Ok(self.blocks.keys().next_back().copied())
        }
    }

    fn block_line(number: i64) -> String {
        format!(
            r#"{{"type":"block","item_id":"block_{number}","number":{number},"hash":"00000000d1145790a8694403d4063f323d499e655c83426834d4ce2f8dd4a2ee","size":490,"stripped_size":490,"weight":1960,"version":1,"merkle_root":"7dac2c5666815c17a3b36427de37bb9d2e2c5ccec3f8633eb91a4205cb4c10ff","timestamp":1231731025,"nonce":"1889418792","bits":"1d00ffff","coinbase_param":"04ffff001d0102","transaction_count":2}}"#
        )
    }

    fn input_json(index: i64, addresses: &[&str]) -> String {
        let addresses = addresses
            .iter()
            .map(|a| format!("{a:?}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"{{"index":{index},"spent_transaction_hash":"0437cd7f8525ceed2324359c2d0ba26006d92d856a9c20fa0241106ee5a597c9","spent_output_index":0,"script_asm":"304402...","script_hex":"4730...","type":"pubkeyhash","sequence":4294967295,"required_signatures":1,"value":5000000000,"addresses":[{addresses}]}}"#
        )
    }

    fn output_json(index: i64, addresses: &[&str]) -> String {
        let addresses = addresses
            .iter()
            .map(|a| format!("{a:?}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"{{"index":{index},"script_asm":"OP_DUP OP_HASH160 ...","script_hex":"76a914...","type":"pubkeyhash","required_signatures":1,"value":1000000000,"addresses":[{addresses}]}}"#
        )
    }

    fn transaction_line(hash: &str, inputs: &[String], outputs: &[String]) -> String {
        format!(
            r#"{{"type":"transaction","item_id":"transaction_{hash}","hash":"{hash}","block_number":170,"block_hash":"00000000d1145790a8694403d4063f323d499e655c83426834d4ce2f8dd4a2ee","block_timestamp":1231731025,"size":275,"virtual_size":275,"version":1,"lock_time":0,"index":1,"is_coinbase":false,"input_count":{},"output_count":{},"input_value":5000000000,"output_value":5000000000,"fee":0,"inputs":[{}],"outputs":[{}]}}"#,
            inputs.len(),
            outputs.len(),
            inputs.join(","),
            outputs.join(","),
        )
    }

    const TX_A: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";
    const TX_B: &str = "a16f3ce4dd5deb92d98ef5cf8afeaf0775ebca408f708b2146c4fb42b41e14be";

    fn run_lines<I: AsRef<str>>(
        store: MemoryStore,
        lines: &[I],
    ) -> (MemoryStore, Result<IngestStats>) {
        let joined = lines
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");
        let mut processor = RecordProcessor::new(store);
        let outcome = processor.run(Cursor::new(joined));
        let stats = processor.stats().clone();
        let RecordProcessor { store, .. } = processor;
        (store, outcome.map(|()| stats))
    }

    #[test]
    fn distinct_cross_product() {
        let edges = derive_interactions(&["a", "b", "a"], &["c", "d"]);
        assert_eq!(edges, vec![("a", "c"), ("a", "d"), ("b", "c"), ("b", "d")]);
    }

    #[test]
    fn empty_side_yields_no_edges() {
        assert!(derive_interactions::<&str>(&[], &["c", "d"]).is_empty());
        assert!(derive_interactions(&["a"], &[]).is_empty());
    }

    #[test]
    fn shared_address_collapses_to_one_entity() {
        let tx1 = transaction_line(
            TX_A,
            &[input_json(0, &["addr-shared"])],
            &[output_json(0, &["addr-out"])],
        );
        let tx2 = transaction_line(
            TX_B,
            &[input_json(0, &["addr-shared"])],
            &[output_json(0, &["addr-other"])],
        );
        let (store, outcome) = run_lines(MemoryStore::default(), &[tx1, tx2]);
        let stats = outcome.unwrap();

        assert_eq!(store.addresses.len(), 3);
        assert_eq!(stats.addresses_created, 3);

        // Both transactions' input bridges point at the same address entity.
        let shared = store.address_id("addr-shared");
        let linked: Vec<_> = store
            .input_links
            .iter()
            .filter(|(_, address)| *address == shared)
            .collect();
        assert_eq!(linked.len(), 2);
    }

    #[test]
    fn interaction_edges_follow_distinct_pairs() {
        // The input side carries "a" twice across two inputs.
        let tx = transaction_line(
            TX_A,
            &[input_json(0, &["a"]), input_json(1, &["a", "b"])],
            &[output_json(0, &["c"]), output_json(1, &["d"])],
        );
        let (store, outcome) = run_lines(MemoryStore::default(), &[tx]);
        let stats = outcome.unwrap();

        assert_eq!(stats.interactions, 4);
        let expected: BTreeSet<_> = [("a", "c"), ("a", "d"), ("b", "c"), ("b", "d")]
            .into_iter()
            .map(|(i, o)| (TX_A.to_string(), store.address_id(i), store.address_id(o)))
            .collect();
        assert_eq!(store.interactions, expected);
    }

    #[test]
    fn coinbase_transaction_yields_no_edges() {
        let tx = transaction_line(TX_A, &[], &[output_json(0, &["addr-miner"])]);
        let (store, outcome) = run_lines(MemoryStore::default(), &[tx]);
        let stats = outcome.unwrap();

        assert_eq!(stats.inputs, 0);
        assert_eq!(stats.outputs, 1);
        assert_eq!(stats.interactions, 0);
        assert!(store.interactions.is_empty());
    }

    #[test]
    fn malformed_line_is_skipped_and_stream_continues() {
        let lines = [block_line(170), "{oops".to_string(), block_line(171)];
        let (store, outcome) = run_lines(MemoryStore::default(), &lines);
        let stats = outcome.unwrap();

        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.skipped_lines, 1);
        assert!(store.blocks.contains_key(&170));
        assert!(store.blocks.contains_key(&171));
    }

    #[test]
    fn unknown_record_type_halts_before_later_lines() {
        let lines = [
            block_line(170),
            r#"{"type":"coinbase_reward","item_id":"z"}"#.to_string(),
            block_line(171),
        ];
        let (store, outcome) = run_lines(MemoryStore::default(), &lines);

        assert!(outcome.is_err());
        assert!(store.blocks.contains_key(&170));
        assert!(!store.blocks.contains_key(&171));
    }

    #[test]
    fn every_listed_address_is_bridged() {
        let tx = transaction_line(
            TX_A,
            &[input_json(0, &["in-1", "in-2"])],
            &[
                output_json(0, &["out-1"]),
                output_json(1, &["out-2", "out-3"]),
            ],
        );
        let (store, outcome) = run_lines(MemoryStore::default(), &[tx]);
        outcome.unwrap();

        for (key, (input_id, input)) in &store.inputs {
            assert_eq!(key.0, TX_A);
            for address in &input.addresses {
                let address_id = store.address_id(address);
                assert!(store.input_links.contains(&(*input_id, address_id)));
            }
        }
        for (output_id, output) in store.outputs.values() {
            for address in &output.addresses {
                let address_id = store.address_id(address);
                assert!(store.output_links.contains(&(*output_id, address_id)));
            }
        }
    }

    #[test]
    fn io_indexes_are_preserved_verbatim() {
        // Sparse indexes must not be renumbered.
        let tx = transaction_line(
            TX_A,
            &[input_json(0, &["a"]), input_json(3, &["b"])],
            &[output_json(7, &["c"])],
        );
        let (store, outcome) = run_lines(MemoryStore::default(), &[tx]);
        outcome.unwrap();

        let input_indexes: Vec<i64> = store.inputs.keys().map(|(_, index)| *index).collect();
        assert_eq!(input_indexes, [0, 3]);
        let output_indexes: Vec<i64> = store.outputs.keys().map(|(_, index)| *index).collect();
        assert_eq!(output_indexes, [7]);
    }

    #[test]
    fn reingesting_a_record_does_not_duplicate_rows() {
        let tx = transaction_line(TX_A, &[input_json(0, &["a"])], &[output_json(0, &["b"])]);
        let lines = [block_line(170), tx.clone(), block_line(170), tx];
        let (store, outcome) = run_lines(MemoryStore::default(), &lines);
        let stats = outcome.unwrap();

        assert_eq!(store.blocks.len(), 1);
        assert_eq!(store.transactions.len(), 1);
        assert_eq!(store.inputs.len(), 1);
        assert_eq!(store.outputs.len(), 1);
        assert_eq!(store.addresses.len(), 2);
        assert_eq!(store.interactions.len(), 1);
        // Only the first pass created address rows.
        assert_eq!(stats.addresses_created, 2);
    }

    #[test]
    fn last_block_number_reports_highest_ingested() {
        let lines = [block_line(170), block_line(168)];
        let (mut store, outcome) = run_lines(MemoryStore::default(), &lines);
        outcome.unwrap();
        assert_eq!(store.last_block_number().unwrap(), Some(170));
    }
}
