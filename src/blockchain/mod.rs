pub mod types;

pub use types::{canonical_address, AddressTransaction, Block, BlockNumber, Transaction};
