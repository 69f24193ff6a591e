use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while turning one stream line into a typed record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line could not be decoded as JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("line is valid JSON but not an object")]
    NotAnObject,

    #[error("record carries no 'type' field")]
    MissingRecordType,

    #[error("record was of type {0:?}, it needs to be of type 'block' or 'transaction'")]
    UnknownRecordType(String),
}

impl DecodeError {
    /// Fatal errors signal that the upstream schema has drifted; the stream
    /// must not continue past them. Everything else is a bad line to skip.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::UnknownRecordType(_) | DecodeError::MissingRecordType
        )
    }
}

/// One decoded stream record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Block(BlockRecord),
    Transaction(TransactionRecord),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockRecord {
    pub number: i64,
    pub hash: String,
    pub size: i64,
    pub stripped_size: i64,
    pub weight: i64,
    pub version: i64,
    pub merkle_root: String,
    pub timestamp: i64,
    pub nonce: String,
    pub bits: String,
    pub coinbase_param: String,
    pub transaction_count: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub block_number: i64,
    pub block_hash: String,
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
    #[serde(default)]
    pub inputs: Vec<InputRecord>,
    #[serde(default)]
    pub outputs: Vec<OutputRecord>,
}

impl TransactionRecord {
    /// Detaches the embedded inputs and outputs, leaving only the canonical
    /// transaction fields behind. Order and `index` values are untouched, and
    /// each sub-record keeps its raw address list, duplicates included.
    pub fn split_io(&mut self) -> (Vec<InputRecord>, Vec<OutputRecord>) {
        (
            std::mem::take(&mut self.inputs),
            std::mem::take(&mut self.outputs),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputRecord {
    pub index: i64,
    pub spent_transaction_hash: Option<String>,
    pub spent_output_index: Option<i64>,
    pub script_asm: Option<String>,
    pub script_hex: Option<String>,
    #[serde(rename = "type")]
    pub script_type: Option<String>,
    pub sequence: i64,
    pub required_signatures: Option<i64>,
    pub value: Option<i64>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputRecord {
    pub index: i64,
    pub script_asm: Option<String>,
    pub script_hex: Option<String>,
    #[serde(rename = "type")]
    pub script_type: Option<String>,
    pub required_signatures: Option<i64>,
    pub value: Option<i64>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Decodes one line of the input stream into a typed record.
///
/// The wire format carries an `item_id` field (discarded) and a `type`
/// discriminator (consumed here). Unknown extra fields are tolerated.
pub fn decode_line(line: &str) -> Result<Record, DecodeError> {
    let mut value: Value = serde_json::from_str(line)?;
    let object = value.as_object_mut().ok_or(DecodeError::NotAnObject)?;

    object.remove("item_id");
    let kind = match object.remove("type") {
        Some(Value::String(kind)) => kind,
        Some(other) => return Err(DecodeError::UnknownRecordType(other.to_string())),
        None => return Err(DecodeError::MissingRecordType),
    };

    match kind.as_str() {
        "block" => Ok(Record::Block(serde_json::from_value(value)?)),
        "transaction" => Ok(Record::Transaction(serde_json::from_value(value)?)),
        _ => Err(DecodeError::UnknownRecordType(kind)),
    }
}
