use std::sync::Arc;

use async_trait::async_trait;
use collector_core::{ModuleCtx, ModuleError, ModuleProvider};

use crate::contract::DaoService;
use crate::memory::MemoryDao;

pub const MODULE_NAME: &str = "storage";

/// `memory` provider of the storage module.
///
/// Exposes `dyn DaoService` and the concrete `MemoryDao` (write access for
/// in-process receivers and tests).
#[derive(Default)]
pub struct MemoryStorageProvider {
    dao: Arc<MemoryDao>,
}

impl MemoryStorageProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve from an existing store.
    #[must_use]
    pub fn with_dao(dao: Arc<MemoryDao>) -> Self {
        Self { dao }
    }
}

#[async_trait]
impl ModuleProvider for MemoryStorageProvider {
    fn module(&self) -> &str {
        MODULE_NAME
    }

    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self, ctx: &ModuleCtx<'_>) -> Result<(), ModuleError> {
        ctx.register::<dyn DaoService>(self.dao.clone())?;
        ctx.register::<MemoryDao>(Arc::clone(&self.dao))?;
        tracing::info!("In-memory storage started");
        Ok(())
    }
}
