pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod stores;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{SeedResult, SeedVerification};
pub use stores::{
    ApprovalWorkflow, JobWorkflow, LineItemLedger, MediaLog, SqlApprovalStore, SqlJobStore,
    SqlLineItemStore, SqlMediaStore,
};
