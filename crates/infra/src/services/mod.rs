//! Application services: the operations the HTTP layer calls.

use std::sync::Arc;

use stockroom_core::{BatchId, OrderId, ReconciliationId, RepackingItemId, ReturnLineId, WriteOffId};
use stockroom_inventory::{
    ProductionBatch, ReconciliationSession, RepackingItem, ReturnLine, RtoOrder, WriteOff,
};

use crate::catalog::SkuCatalog;
use crate::ledger::{InMemoryLedger, InventoryLedger};
use crate::notify::ChangeNotifier;
use crate::queues::{ProductionQueue, QueueProviders, RepackingQueue, ReturnsQueue, RtoQueue};
use crate::store::InMemoryKeyedStore;

pub mod inward;
pub mod reconciliation;
pub mod scan;
pub mod stock;

pub use inward::{BatchCredit, InwardService, ProductionInward, RepackingResult, ReturnReceipt, RtoReceipt};
pub use reconciliation::{ReconciliationService, SessionView, StartOutcome, SubmitOutcome};
pub use scan::{ScanLookup, ScanResolver};
pub use stock::{BalanceView, StockQuery};

/// Every store the services read or write.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<SkuCatalog>,
    pub ledger: Arc<dyn InventoryLedger>,
    pub batches: Arc<InMemoryKeyedStore<BatchId, ProductionBatch>>,
    pub returns: Arc<InMemoryKeyedStore<ReturnLineId, ReturnLine>>,
    pub rto_orders: Arc<InMemoryKeyedStore<OrderId, RtoOrder>>,
    pub repacking: Arc<InMemoryKeyedStore<RepackingItemId, RepackingItem>>,
    pub write_offs: Arc<InMemoryKeyedStore<WriteOffId, WriteOff>>,
    pub sessions: Arc<InMemoryKeyedStore<ReconciliationId, ReconciliationSession>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::with_ledger(Arc::new(InMemoryLedger::new()))
    }

    /// In-memory operational stores around the given ledger.
    pub fn with_ledger(ledger: Arc<dyn InventoryLedger>) -> Self {
        Self {
            catalog: Arc::new(SkuCatalog::new()),
            ledger,
            batches: Arc::new(InMemoryKeyedStore::new("production batch")),
            returns: Arc::new(InMemoryKeyedStore::new("return line")),
            rto_orders: Arc::new(InMemoryKeyedStore::new("rto order")),
            repacking: Arc::new(InMemoryKeyedStore::new("repacking item")),
            write_offs: Arc::new(InMemoryKeyedStore::new("write-off")),
            sessions: Arc::new(InMemoryKeyedStore::new("reconciliation session")),
        }
    }

    pub fn queue_providers(&self) -> QueueProviders {
        QueueProviders {
            production: Arc::new(ProductionQueue::new(self.catalog.clone(), self.batches.clone())),
            returns: Arc::new(ReturnsQueue::new(self.catalog.clone(), self.returns.clone())),
            rto: Arc::new(RtoQueue::new(self.catalog.clone(), self.rto_orders.clone())),
            repacking: Arc::new(RepackingQueue::new(self.catalog.clone(), self.repacking.clone())),
        }
    }
}

/// Tunables passed in from configuration.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// Upload match rate below which diagnostics are attached.
    pub low_match_threshold: f64,
    pub notice_capacity: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            low_match_threshold: 0.5,
            notice_capacity: 256,
        }
    }
}

/// All services, wired over one set of stores.
#[derive(Clone)]
pub struct InventoryServices {
    pub stores: Stores,
    pub notifier: ChangeNotifier,
    pub queues: QueueProviders,
    pub scan: Arc<ScanResolver>,
    pub stock: Arc<StockQuery>,
    pub inward: Arc<InwardService>,
    pub reconciliation: Arc<ReconciliationService>,
}

impl InventoryServices {
    pub fn new(stores: Stores, settings: ServiceSettings) -> Self {
        let notifier = ChangeNotifier::new(settings.notice_capacity);
        let queues = stores.queue_providers();
        Self {
            scan: Arc::new(ScanResolver::new(stores.catalog.clone(), stores.ledger.clone(), queues.clone())),
            stock: Arc::new(StockQuery::new(stores.catalog.clone(), stores.ledger.clone())),
            inward: Arc::new(InwardService::new(stores.clone(), notifier.clone())),
            reconciliation: Arc::new(ReconciliationService::new(
                stores.clone(),
                notifier.clone(),
                settings.low_match_threshold,
            )),
            stores,
            notifier,
            queues,
        }
    }
}
