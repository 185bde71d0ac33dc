pub mod address_index;
pub mod cursor;
pub mod subscriptions;

pub use address_index::AddressIndex;
pub use cursor::BlockCursorStore;
pub use subscriptions::SubscriptionSet;
