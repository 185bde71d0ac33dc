use serde::{Deserialize, Serialize};

/// A block number on the upstream chain.
///
/// `0` means "earliest / uninitialised cursor", `-1` means "invalid /
/// unknown", anything else is a real height. The wire form is a
/// `0x`-prefixed lowercase hex string with no leading zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockNumber(pub i64);

impl BlockNumber {
    pub const EARLIEST: BlockNumber = BlockNumber(0);
    pub const INVALID: BlockNumber = BlockNumber(-1);

    pub fn as_i64(self) -> i64 {
        self.0
    }

    pub fn to_hex(self) -> String {
        format!("0x{:x}", self.0)
    }

    /// Parses a `0x`-prefixed hex string into a `BlockNumber`.
    ///
    /// Returns `BlockNumber::INVALID` on malformed input rather than an
    /// error, mirroring the upstream provider's sentinel-on-parse-failure
    /// behaviour (spec.md §7).
    pub fn from_hex(hex_str: &str) -> BlockNumber {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        match i64::from_str_radix(trimmed, 16) {
            Ok(n) => BlockNumber(n),
            Err(_) => BlockNumber::INVALID,
        }
    }

    pub fn inc(self) -> BlockNumber {
        BlockNumber(self.0 + 1)
    }
}

impl std::fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transaction as returned by `eth_getBlockByNumber`.
///
/// `from`/`to` are the only fields the core interprets; everything else
/// is carried through verbatim. `to` is empty for contract-creation
/// transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(rename = "blockHash", default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(rename = "blockNumber", default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(
        rename = "transactionIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_index: Option<String>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "gasPrice", default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// A block as returned by `eth_getBlockByNumber`, with full transaction
/// objects (the `true` parameter). The core reads only `transactions`;
/// the header fields are opaque and passed through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(rename = "parentHash", default, skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(rename = "sha3Uncles", default, skip_serializing_if = "Option::is_none")]
    pub sha3_uncles: Option<String>,
    #[serde(rename = "logsBloom", default, skip_serializing_if = "Option::is_none")]
    pub logs_bloom: Option<String>,
    #[serde(
        rename = "transactionsRoot",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transactions_root: Option<String>,
    #[serde(rename = "stateRoot", default, skip_serializing_if = "Option::is_none")]
    pub state_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(
        rename = "totalDifficulty",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_difficulty: Option<String>,
    #[serde(rename = "extraData", default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(rename = "gasLimit", default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(rename = "gasUsed", default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncles: Vec<String>,
}

/// A single address-keyed observation of a transaction: the pair
/// (lowercased address, transaction) that the filter stage emits.
#[derive(Debug, Clone)]
pub struct AddressTransaction {
    pub address: String,
    pub transaction: Transaction,
}

/// Lowercases an address the way the subscription set and address index
/// key their entries.
pub fn canonical_address(address: &str) -> String {
    address.to_lowercase()
}
