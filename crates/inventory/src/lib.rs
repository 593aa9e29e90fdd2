//! Inventory domain for the stockroom service.
//!
//! Pure business rules: SKUs, the append-only stock ledger, the four inward
//! queues and the reconciliation aggregate. No IO, no HTTP, no storage.

pub mod count_sheet;
pub mod ledger;
pub mod production;
pub mod queue;
pub mod reconciliation;
pub mod repacking;
pub mod returns;
pub mod rto;
pub mod sku;

pub use count_sheet::{CountRow, CountSheet, CountSheetError, RowError, SheetDiagnostics, UploadReport};
pub use ledger::{InventoryTransaction, TxnReason, TxnType, fold_balance};
pub use production::{BatchStatus, ProductionBatch, oldest_open_batch};
pub use queue::{InwardSource, PendingQueueItem, QueueSource, SOURCE_PRIORITY, rank_matches, recommend_source};
pub use reconciliation::{
    AdjustmentReason, CountMatch, DeleteSession, ItemUpdate, ReconciliationCommand,
    ReconciliationEvent, ReconciliationItem, ReconciliationSession, ReconciliationStatus,
    RecordCounts, SessionSummary, SnapshotLine, StartSession, SubmitSession, VarianceAdjustment,
};
pub use repacking::{
    RepackingDecision, RepackingItem, RepackingOrigin, RepackingOutcome, RepackingStatus,
    WriteOff, WriteOffReason,
};
pub use returns::{ReturnCondition, ReturnLine, ReturnStatus};
pub use rto::{RtoCondition, RtoDisposition, RtoLine, RtoOrder, RtoProgress, RtoStatus};
pub use sku::{Sku, SkuCode, StockBalance};
