use diesel::prelude::*;

use super::schema::{
    address_interactions, addresses, blocks, input_addresses, inputs, output_addresses, outputs,
    transactions,
};

// Model for inserting into (and, on re-ingestion, overwriting) the 'blocks'
// table. The primary key is skipped by the changeset derive.
#[derive(Insertable, AsChangeset)]
#[diesel(table_name = blocks)]
pub struct NewBlock {
    pub number: i64,
    pub hash: Vec<u8>, // BYTEA
    pub size: i64,
    pub stripped_size: i64,
    pub weight: i64,
    pub version: i64,
    pub merkle_root: Vec<u8>, // BYTEA
    pub timestamp: i64,
    pub nonce: String,
    pub bits: String,
    pub coinbase_param: String,
    pub transaction_count: i64,
}

// Model for inserting into the 'transactions' table
#[derive(Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction {
    pub hash: Vec<u8>, // BYTEA
    pub block_number: i64,
    pub block_hash: Vec<u8>, // BYTEA
    pub block_timestamp: i64,
    pub size: i64,
    pub virtual_size: i64,
    pub version: i64,
    pub lock_time: i64,
    pub index: i64,
    pub is_coinbase: bool,
    pub input_count: i64,
    pub output_count: i64,
    pub input_value: Option<i64>,
    pub output_value: Option<i64>,
    pub fee: Option<i64>,
}

// Model for inserting into the 'inputs' table
#[derive(Insertable)]
#[diesel(table_name = inputs)]
pub struct NewInput {
    pub transaction_hash: Vec<u8>, // BYTEA
    pub index: i64,
    pub spent_transaction_hash: Option<Vec<u8>>, // BYTEA
    pub spent_output_index: Option<i64>,
    pub script_asm: Option<String>,
    pub script_hex: Option<String>,
    pub script_type: Option<String>,
    pub sequence: i64,
    pub required_signatures: Option<i64>,
    pub value: Option<i64>,
}

// Model for inserting into the 'outputs' table
#[derive(Insertable)]
#[diesel(table_name = outputs)]
pub struct NewOutput {
    pub transaction_hash: Vec<u8>, // BYTEA
    pub index: i64,
    pub script_asm: Option<String>,
    pub script_hex: Option<String>,
    pub script_type: Option<String>,
    pub required_signatures: Option<i64>,
    pub value: Option<i64>,
}

// Model for inserting into the 'addresses' table
#[derive(Insertable)]
#[diesel(table_name = addresses)]
pub struct NewAddress {
    pub hash: String, // VARCHAR(255)
}

// Model for inserting into the 'input_addresses' bridge table
#[derive(Insertable)]
#[diesel(table_name = input_addresses)]
pub struct NewInputAddress {
    pub input_id: i64,
    pub address_id: i64,
}

// Model for inserting into the 'output_addresses' bridge table
#[derive(Insertable)]
#[diesel(table_name = output_addresses)]
pub struct NewOutputAddress {
    pub output_id: i64,
    pub address_id: i64,
}

// Model for inserting into the 'address_interactions' table
#[derive(Insertable)]
#[diesel(table_name = address_interactions)]
pub struct NewAddressInteraction {
    pub transaction_hash: Vec<u8>, // BYTEA
    pub input_address_id: i64,
    pub output_address_id: i64,
}
