//! Print pipeline
//!
//! # Module structure
//!
//! - [`store`] - job store trait and errors
//! - [`storage`] - embedded redb store
//! - [`remote`] - hosted PostgREST-style store
//! - [`renderer`] - KOT, bill and test page rendering
//! - [`executor`] - delivery to network and USB printers
//! - [`dispatcher`] - claims pending jobs and drives print attempts

pub mod dispatcher;
pub mod executor;
pub mod remote;
pub mod renderer;
pub mod storage;
pub mod store;

pub use dispatcher::{DispatchError, DispatcherStatus, PrintDispatcher, ProcessOutcome};
pub use executor::{PrintExecutor, PrintSink};
pub use remote::RestJobStore;
pub use renderer::{BillRenderer, KotRenderer, RenderOptions, TestPageRenderer, encode};
pub use storage::RedbJobStore;
pub use store::{JobOutcome, JobStore, StoreError, StoreResult};
