use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use tracing::info;

use crate::record::{BlockRecord, InputRecord, OutputRecord, TransactionRecord};
use crate::store::{AddressEntry, AddressId, ChainStore, InputId, OutputId};

// Define migrations
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

pub mod models;
pub mod schema;

/// Type alias for database connection pool
pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Type alias for a connection checked out of the pool
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Creates a Postgres connection pool
pub fn create_connection_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    Pool::builder()
        .connection_timeout(Duration::from_secs(30))
        .test_on_check_out(true)
        .build(manager)
        .context("Failed to create database connection pool")
}

/// Runs database migrations
pub fn run_migrations(conn: &mut PgConnection) -> Result<()> {
    info!("Running database migrations");

    // Run migrations and map the error to anyhow
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(_) => {
            info!("Database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            anyhow::bail!("Failed to run database migrations: {}", e)
        }
    }
}

fn decode_hash(label: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).with_context(|| format!("Failed to decode {} hex string '{}'", label, value))
}

/// Diesel-backed store. Each operation commits as its own unit of work, so a
/// mid-record failure leaves at most the already-written rows behind, and
/// re-ingesting the record converges through the conflict policies below.
pub struct PgStore {
    conn: DbConnection,
}

impl PgStore {
    pub fn new(conn: DbConnection) -> Self {
        Self { conn }
    }

    pub fn from_pool(pool: &DbPool) -> Result<Self> {
        let conn = pool
            .get()
            .context("Failed to get database connection from pool")?;
        Ok(Self::new(conn))
    }
}

impl ChainStore for PgStore {
    /// Re-ingesting a block number overwrites the row rather than creating a
    /// second one.
    fn store_block(&mut self, block: &BlockRecord) -> Result<()> {
        use schema::blocks::dsl::*;

        let record = models::NewBlock {
            number: block.number,
            hash: decode_hash("block hash", &block.hash)?,
            size: block.size,
            stripped_size: block.stripped_size,
            weight: block.weight,
            version: block.version,
            merkle_root: decode_hash("merkle root", &block.merkle_root)?,
            timestamp: block.timestamp,
            nonce: block.nonce.clone(),
            bits: block.bits.clone(),
            coinbase_param: block.coinbase_param.clone(),
            transaction_count: block.transaction_count,
        };

        diesel::insert_into(blocks)
            .values(&record)
            .on_conflict(number)
            .do_update()
            .set(&record)
            .execute(&mut self.conn)
            .with_context(|| format!("Failed to store block {}", block.number))?;

        Ok(())
    }

    /// Re-ingesting a transaction hash keeps the existing row.
    fn store_transaction(&mut self, tx: &TransactionRecord) -> Result<()> {
        use schema::transactions::dsl::*;

        let record = models::NewTransaction {
            hash: decode_hash("transaction hash", &tx.hash)?,
            block_number: tx.block_number,
            block_hash: decode_hash("block hash", &tx.block_hash)?,
            block_timestamp: tx.block_timestamp,
            size: tx.size,
            virtual_size: tx.virtual_size,
            version: tx.version,
            lock_time: tx.lock_time,
            index: tx.index,
            is_coinbase: tx.is_coinbase,
            input_count: tx.input_count,
            output_count: tx.output_count,
            input_value: tx.input_value,
            output_value: tx.output_value,
            fee: tx.fee,
        };

        diesel::insert_into(transactions)
            .values(&record)
            .on_conflict(hash)
            .do_nothing()
            .execute(&mut self.conn)
            .with_context(|| format!("Failed to store transaction {}", tx.hash))?;

        Ok(())
    }

    fn store_input(&mut self, transaction_hash_hex: &str, input: &InputRecord) -> Result<InputId> {
        use schema::inputs::dsl::*;

        let tx_hash = decode_hash("transaction hash", transaction_hash_hex)?;
        let spent_hash = input
            .spent_transaction_hash
            .as_deref()
            .map(|h| decode_hash("spent transaction hash", h))
            .transpose()?;

        let record = models::NewInput {
            transaction_hash: tx_hash.clone(),
            index: input.index,
            spent_transaction_hash: spent_hash,
            spent_output_index: input.spent_output_index,
            script_asm: input.script_asm.clone(),
            script_hex: input.script_hex.clone(),
            script_type: input.script_type.clone(),
            sequence: input.sequence,
            required_signatures: input.required_signatures,
            value: input.value,
        };

        let inserted: Option<InputId> = diesel::insert_into(inputs)
            .values(&record)
            .on_conflict((transaction_hash, index))
            .do_nothing()
            .returning(input_id)
            .get_result(&mut self.conn)
            .optional()
            .with_context(|| {
                format!(
                    "Failed to store input {} of transaction {}",
                    input.index, transaction_hash_hex
                )
            })?;
        if let Some(id) = inserted {
            return Ok(id);
        }

        // Already ingested, reuse the existing row
        inputs
            .filter(transaction_hash.eq(&tx_hash))
            .filter(index.eq(input.index))
            .select(input_id)
            .first(&mut self.conn)
            .with_context(|| {
                format!(
                    "Failed to look up input {} of transaction {}",
                    input.index, transaction_hash_hex
                )
            })
    }

    fn store_output(
        &mut self,
        transaction_hash_hex: &str,
        output: &OutputRecord,
    ) -> Result<OutputId> {
        use schema::outputs::dsl::*;

        let tx_hash = decode_hash("transaction hash", transaction_hash_hex)?;

        let record = models::NewOutput {
            transaction_hash: tx_hash.clone(),
            index: output.index,
            script_asm: output.script_asm.clone(),
            script_hex: output.script_hex.clone(),
            script_type: output.script_type.clone(),
            required_signatures: output.required_signatures,
            value: output.value,
        };

        let inserted: Option<OutputId> = diesel::insert_into(outputs)
            .values(&record)
            .on_conflict((transaction_hash, index))
            .do_nothing()
            .returning(output_id)
            .get_result(&mut self.conn)
            .optional()
            .with_context(|| {
                format!(
                    "Failed to store output {} of transaction {}",
                    output.index, transaction_hash_hex
                )
            })?;
        if let Some(id) = inserted {
            return Ok(id);
        }

        // Already ingested, reuse the existing row
        outputs
            .filter(transaction_hash.eq(&tx_hash))
            .filter(index.eq(output.index))
            .select(output_id)
            .first(&mut self.conn)
            .with_context(|| {
                format!(
                    "Failed to look up output {} of transaction {}",
                    output.index, transaction_hash_hex
                )
            })
    }

    /// A conflicting insert (the hash was registered meanwhile) is not an
    /// error: the existing row wins and is returned as `Existing`.
    fn ensure_address(&mut self, address_hash: &str) -> Result<AddressEntry> {
        use schema::addresses::dsl::*;

        let record = models::NewAddress {
            hash: address_hash.to_string(),
        };

        let inserted: Option<AddressId> = diesel::insert_into(addresses)
            .values(&record)
            .on_conflict(hash)
            .do_nothing()
            .returning(address_id)
            .get_result(&mut self.conn)
            .optional()
            .with_context(|| format!("Failed to store address {}", address_hash))?;
        if let Some(id) = inserted {
            return Ok(AddressEntry::Created(id));
        }

        let id = addresses
            .filter(hash.eq(address_hash))
            .select(address_id)
            .first(&mut self.conn)
            .with_context(|| format!("Failed to look up address {}", address_hash))?;
        Ok(AddressEntry::Existing(id))
    }

    fn link_input_address(&mut self, input: InputId, address: AddressId) -> Result<()> {
        use schema::input_addresses::dsl::*;

        let record = models::NewInputAddress {
            input_id: input,
            address_id: address,
        };

        diesel::insert_into(input_addresses)
            .values(&record)
            .on_conflict((input_id, address_id))
            .do_nothing()
            .execute(&mut self.conn)
            .with_context(|| format!("Failed to link address {} to input {}", address, input))?;

        Ok(())
    }

    fn link_output_address(&mut self, output: OutputId, address: AddressId) -> Result<()> {
        use schema::output_addresses::dsl::*;

        let record = models::NewOutputAddress {
            output_id: output,
            address_id: address,
        };

        diesel::insert_into(output_addresses)
            .values(&record)
            .on_conflict((output_id, address_id))
            .do_nothing()
            .execute(&mut self.conn)
            .with_context(|| format!("Failed to link address {} to output {}", address, output))?;

        Ok(())
    }

    fn store_interaction(
        &mut self,
        transaction_hash_hex: &str,
        input_address: AddressId,
        output_address: AddressId,
    ) -> Result<()> {
        use schema::address_interactions::dsl::*;

        let record = models::NewAddressInteraction {
            transaction_hash: decode_hash("transaction hash", transaction_hash_hex)?,
            input_address_id: input_address,
            output_address_id: output_address,
        };

        diesel::insert_into(address_interactions)
            .values(&record)
            .on_conflict((transaction_hash, input_address_id, output_address_id))
            .do_nothing()
            .execute(&mut self.conn)
            .with_context(|| {
                format!(
                    "Failed to store address interaction {} -> {} for transaction {}",
                    input_address, output_address, transaction_hash_hex
                )
            })?;

        Ok(())
    }

    /// Gets the highest ingested block number from the database
    fn last_block_number(&mut self) -> Result<Option<i64>> {
        use schema::blocks::dsl::*;

        blocks
            .select(number)
            .order(number.desc())
            .first::<i64>(&mut self.conn)
            .optional()
            .context("Failed to query last ingested block")
    }
}
