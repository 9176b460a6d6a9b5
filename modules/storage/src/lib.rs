//! Storage module
//!
//! Data-access boundary (`DaoService`) used by query modules, with an in-memory
//! `memory` provider.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod module;
pub use module::{MODULE_NAME, MemoryStorageProvider};

pub mod contract;
pub use contract::{Application, ApplicationSummary, DaoService, Instance};

mod memory;
pub use memory::MemoryDao;
