//! # connectorrt-executor
//!
//! The generic executor (C9) that every connector call goes through, plus
//! the three facades that sit alongside it: residency routing (C12), the
//! paginated-execution and test-connection contracts, and the clarifier
//! (C13).

pub mod clarifier;
pub mod envelope;
pub mod executor;
pub mod paginate;
pub mod registry;
pub mod residency;
pub mod result;
pub mod test_connection;

pub use clarifier::{Clarifier, ClarifyQuestion, ClarifyRequest, ClarifyResult, QuestionKind};
pub use executor::GenericExecutor;
pub use paginate::{execute_paginated, PaginatedResult};
pub use registry::DefinitionRegistry;
pub use residency::{ResidencyReport, ResidencyRouter, StorageResidency};
pub use result::{ExecuteError, ExecuteRequest, ExecuteResult};
pub use test_connection::test_connection;
