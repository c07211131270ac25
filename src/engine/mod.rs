//! The reconciliation core: reorg safety, notification receipts and the
//! pass that ties them to dispatch.

pub mod receipts;
pub mod reconciler;
pub mod reorg;

pub use receipts::ReceiptLedger;
pub use reconciler::{
    CursorAdvance, ReconciliationEngine, ReconciliationReport, UnitOutcome, UnitReport,
};
pub use reorg::ReorgPolicy;
