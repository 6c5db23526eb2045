// Application layer - use cases and orchestration.
// Every client (CLI, exporters, tests) goes through `LedgerService`.

pub mod error;
pub mod integrity;
pub mod reporting;
pub mod service;
pub mod transactions;

pub use error::*;
pub use reporting::*;
pub use service::*;
pub use transactions::MAX_WRITE_ATTEMPTS;
