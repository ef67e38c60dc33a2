//! ActionPackLoader (spec §4.5, C5): discovery and registration of user-contributed
//! action packs, grounded on the link-time `inventory` registration pattern (no
//! runtime reflection is available or wanted — spec §9 design note).

use ism_core::Action;
use ism_db::{DataAccess, Value};
use ism_errors::{IsmError, Result};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Builds one action instance, bound to the shared control DB and `running` flag.
pub type ActionFactory = fn(Arc<dyn DataAccess>, Arc<AtomicBool>) -> Box<dyn Action>;

/// A discoverable bundle of zero or more action types plus its schema/seed artifacts
/// (spec §4.5, §6 "Action pack layout"). A pack MUST NOT contain nested packs; this is
/// enforced structurally here — a `PackProvider` describes exactly one flat pack and
/// has no way to embed another `PackProvider`, so nesting cannot be expressed at all,
/// let alone detected at runtime.
pub trait PackProvider: Send + Sync {
    /// Action types this pack contributes, excluding any base class (spec §4.5).
    fn action_factories(&self) -> Vec<ActionFactory>;

    /// Optional `CREATE TABLE`-style statements, applied before `data_statements`.
    fn schema_statements(&self) -> Vec<String> {
        Vec::new()
    }

    /// Mandatory seed statements — at least one insert into `actions` per action type.
    /// An empty or absent document is a `MalformedActionPack`.
    fn data_statements(&self) -> Vec<(String, Vec<Value>)>;
}

/// A pack's link-time registration record, submitted via `inventory::submit!` from the
/// pack crate's own code (spec §9 design note: "explicit per-pack registration function
/// called from the pack's initialisation hook").
pub struct PackRegistration {
    pub pack_id: &'static str,
    pub build: fn() -> Box<dyn PackProvider>,
}

inventory::collect!(PackRegistration);

/// Registers every action type from a named pack into the scheduler's action registry,
/// then applies the pack's schema (if present) and data to the control DB (spec §4.5).
pub struct ActionPackLoader {
    db: Arc<dyn DataAccess>,
    running: Arc<AtomicBool>,
}

impl ActionPackLoader {
    pub fn new(db: Arc<dyn DataAccess>, running: Arc<AtomicBool>) -> Self {
        Self { db, running }
    }

    pub async fn import_pack(&self, pack_id: &str) -> Result<Vec<Box<dyn Action>>> {
        let registration = inventory::iter::<PackRegistration>()
            .find(|r| r.pack_id == pack_id)
            .ok_or_else(|| {
                IsmError::MalformedActionPack(pack_id.to_string(), "pack not registered".to_string())
            })?;
        let provider = (registration.build)();

        let data = provider.data_statements();
        if data.is_empty() {
            return Err(IsmError::MalformedActionPack(
                pack_id.to_string(),
                "data document is absent or empty".to_string(),
            ));
        }

        for stmt in provider.schema_statements() {
            self.db.execute_statement(&stmt, &[]).await?;
        }
        for (sql, params) in data {
            self.db.execute_statement(&sql, &params).await?;
        }

        Ok(provider
            .action_factories()
            .into_iter()
            .map(|factory| factory(self.db.clone(), self.running.clone()))
            .collect())
    }
}
