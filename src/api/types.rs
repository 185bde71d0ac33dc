use serde::{Deserialize, Serialize};

use crate::blockchain::Transaction;

#[derive(Debug, Serialize)]
pub struct BlockNumberResponse {
    pub block_number: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub subscribed: bool,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
