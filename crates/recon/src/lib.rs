//! `batcvd-recon`: BAT/CVD settlement reconciliation core.
//!
//! Pure engine crate: receives in-memory tables, returns tables plus
//! annotations. No CLI or IO dependencies.

pub mod aggregate;
pub mod carryover;
pub mod config;
pub mod crossmatch;
pub mod duplicates;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod model;
pub mod normalize;
pub mod remark;

pub use carryover::carry_over;
pub use config::ReconConfig;
pub use crossmatch::cross_match;
pub use engine::{run, StageInput, StageOutput};
pub use enrich::enrich;
pub use error::ReconError;
pub use model::{
    CarryoverOutput, Cell, CrossMatchOutput, DuplicateMarks, EnrichOutput, Partition, SettlementSummary,
    Snapshot, SummaryRow, Table,
};
pub use remark::Remark;
