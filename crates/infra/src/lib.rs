//! Infrastructure layer: stores, the ledger, queue providers and the
//! services the API calls.

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod queues;
pub mod seed;
pub mod services;
pub mod store;

pub use catalog::SkuCatalog;
pub use error::{ServiceError, ServiceResult, StoreError};
pub use ledger::{InMemoryLedger, InventoryLedger};
#[cfg(feature = "postgres")]
pub use ledger::PostgresLedger;
pub use notify::{ChangeNotice, ChangeNotifier};
pub use queues::{QueueProvider, QueueProviders};
pub use seed::{SeedData, SeedSummary};
pub use services::{InventoryServices, ServiceSettings, Stores};
pub use store::{InMemoryKeyedStore, KeyedStore};
