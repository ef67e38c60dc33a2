//! BaseAction (spec §4.3, C3): the helper surface every action composes with, and the
//! single-capability `Action` trait every action implements.

use crate::phase::ExecutionPhase;
use async_trait::async_trait;
use ism_db::{DataAccess, Value};
use ism_errors::{IsmError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A unit of work exposing a single `execute` operation, gated by activation and phase
/// (spec Glossary). Rust has no runtime reflection, so identity is the explicit `name()`
/// string rather than a type name (spec §9 design note).
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self) -> Result<()>;
}

/// Exactly one of hours/seconds/milliseconds must be given to `set_timer_expiry`.
pub enum Duration {
    Hours(u64),
    Seconds(u64),
    Milliseconds(u64),
}

/// Helpers shared by every action: activation, payload, phase, and timer access,
/// centralised on one testable surface (spec §4.3 rationale).
#[derive(Clone)]
pub struct BaseAction {
    name: String,
    db: Arc<dyn DataAccess>,
    running: Arc<AtomicBool>,
}

impl BaseAction {
    pub fn new(name: impl Into<String>, db: Arc<dyn DataAccess>, running: Arc<AtomicBool>) -> Self {
        Self {
            name: name.into(),
            db,
            running,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared scheduler `running` flag (spec §5, §9 design note). `false` requests
    /// shutdown after the in-flight iteration.
    pub fn running_flag(&self) -> &Arc<AtomicBool> {
        &self.running
    }

    pub fn stop_running(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn db(&self) -> &Arc<dyn DataAccess> {
        &self.db
    }

    /// Current execution phase (the single `phases` row with `state=true`).
    pub async fn current_phase(&self) -> Result<ExecutionPhase> {
        let rows = self
            .db
            .execute_query("SELECT execution_phase FROM phases WHERE state = ?", &[Value::Bool(true)])
            .await?;
        let row = rows.first().ok_or(IsmError::ExecutionPhaseNotFound)?;
        let name = row[0].as_str().ok_or(IsmError::ExecutionPhaseNotFound)?;
        ExecutionPhase::parse(name)
    }

    /// `Active() -> bool` (spec §4.3 table): true iff this action's row has
    /// `active=true` and its phase matches current (or is `"ALL"`).
    pub async fn active(&self) -> Result<bool> {
        self.active_for(&self.name).await
    }

    async fn active_for(&self, action: &str) -> Result<bool> {
        let rows = self
            .db
            .execute_query(
                "SELECT active, execution_phase FROM actions WHERE action = ?",
                &[Value::Text(action.to_string())],
            )
            .await?;
        match rows.len() {
            0 => Err(IsmError::MissingDataInControlDatabase(action.to_string())),
            1 => {
                let active = rows[0][0].as_bool().unwrap_or(false);
                let row_phase = rows[0][1].as_str().unwrap_or("");
                if !active {
                    return Ok(false);
                }
                if row_phase == "ALL" {
                    return Ok(true);
                }
                let current = self.current_phase().await?;
                Ok(row_phase == current.as_str())
            }
            _ => Err(IsmError::DuplicateDataInControlDatabase(action.to_string())),
        }
    }

    /// Whether any active action whose name starts with `prefix` exists (used by
    /// `ConfirmReadyToRun`/`ConfirmReadyToStop` to gate on `ActionBefore*`/`ActionAfter*`).
    pub async fn any_active_with_prefix(&self, prefix: &str) -> Result<bool> {
        let rows = self
            .db
            .execute_query("SELECT action FROM actions WHERE active = ?", &[Value::Bool(true)])
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| r[0].as_str())
            .any(|name| name.starts_with(prefix)))
    }

    pub async fn activate(&self, action: &str) -> Result<()> {
        self.db
            .execute_statement(
                "UPDATE actions SET active = ? WHERE action = ?",
                &[Value::Bool(true), Value::Text(action.to_string())],
            )
            .await
    }

    /// `Deactivate(name?)`: with no argument, targets self.
    pub async fn deactivate(&self, action: Option<&str>) -> Result<()> {
        let target = action.unwrap_or(&self.name);
        self.db
            .execute_statement(
                "UPDATE actions SET active = ? WHERE action = ?",
                &[Value::Bool(false), Value::Text(target.to_string())],
            )
            .await
    }

    pub async fn get_payload(&self) -> Result<Option<String>> {
        let rows = self
            .db
            .execute_query(
                "SELECT payload FROM actions WHERE action = ?",
                &[Value::Text(self.name.clone())],
            )
            .await?;
        Ok(rows.first().and_then(|r| r[0].as_str().map(str::to_string)))
    }

    pub async fn set_payload(&self, action: &str, payload: &str) -> Result<()> {
        self.db
            .execute_statement(
                "UPDATE actions SET payload = ? WHERE action = ?",
                &[Value::Text(payload.to_string()), Value::Text(action.to_string())],
            )
            .await
    }

    pub async fn clear_payload(&self) -> Result<()> {
        self.db
            .execute_statement(
                "UPDATE actions SET payload = ? WHERE action = ?",
                &[Value::Null, Value::Text(self.name.clone())],
            )
            .await
    }

    /// Atomically (in the single-writer sense of spec §5) flips exactly one `phases`
    /// row on and all others off: a clear-then-set pair of statements, not a single
    /// merged `UPDATE` (preserves I-1; see DESIGN.md for why the two-step form is kept).
    pub async fn set_execution_phase(&self, phase: ExecutionPhase) -> Result<()> {
        self.db
            .execute_statement(
                "UPDATE phases SET state = ? WHERE state = ?",
                &[Value::Bool(false), Value::Bool(true)],
            )
            .await?;
        self.db
            .execute_statement(
                "UPDATE phases SET state = ? WHERE execution_phase = ?",
                &[Value::Bool(true), Value::Text(phase.as_str().to_string())],
            )
            .await
    }

    /// Inserts or updates the named timer row (spec §4.3). Unlike the original
    /// source's unconditional `UPDATE` (see DESIGN.md), this performs a real per-action
    /// upsert.
    pub async fn set_timer(&self, action: &str, payload: &str, expiry_millis: i64) -> Result<()> {
        let existing = self
            .db
            .execute_query(
                "SELECT action FROM timers WHERE action = ?",
                &[Value::Text(action.to_string())],
            )
            .await?;
        if existing.is_empty() {
            self.db
                .execute_statement(
                    "INSERT INTO timers (action, payload, expiry, active) VALUES (?, ?, ?, ?)",
                    &[
                        Value::Text(action.to_string()),
                        Value::Text(payload.to_string()),
                        Value::Int(expiry_millis),
                        Value::Bool(true),
                    ],
                )
                .await
        } else {
            self.db
                .execute_statement(
                    "UPDATE timers SET payload = ?, expiry = ?, active = ? WHERE action = ?",
                    &[
                        Value::Text(payload.to_string()),
                        Value::Int(expiry_millis),
                        Value::Bool(true),
                        Value::Text(action.to_string()),
                    ],
                )
                .await
        }
    }

    /// Computes an absolute epoch-millisecond expiry from exactly one duration.
    pub fn set_timer_expiry(duration: Duration) -> i64 {
        let millis = match duration {
            Duration::Hours(h) => h * 3_600_000,
            Duration::Seconds(s) => s * 1_000,
            Duration::Milliseconds(m) => m,
        };
        Self::get_epoch_milliseconds() + millis as i64
    }

    pub fn get_epoch_milliseconds() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ism_db::{ConnectOpts, SqliteDataAccess};

    async fn seeded_db() -> (tempfile::TempDir, Arc<dyn DataAccess>) {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteDataAccess::new(dir.path().join("control.db"), ConnectOpts::default());
        db.create_database().await.unwrap();
        crate::schema::bootstrap(&db).await.unwrap();
        (dir, Arc::new(db))
    }

    #[tokio::test]
    async fn active_reflects_phase_gate() {
        let (_dir, db) = seeded_db().await;
        let running = Arc::new(AtomicBool::new(true));
        let base = BaseAction::new("ConfirmReadyToRun", db.clone(), running);
        // Seeded active=true, phase=STARTING, current phase=STARTING: active.
        assert!(base.active().await.unwrap());
        base.set_execution_phase(ExecutionPhase::Running).await.unwrap();
        // Still active=true in the row, but phase no longer matches.
        assert!(!base.active().await.unwrap());
    }

    #[tokio::test]
    async fn set_execution_phase_keeps_single_true_row() {
        let (_dir, db) = seeded_db().await;
        let running = Arc::new(AtomicBool::new(true));
        let base = BaseAction::new("x", db.clone(), running);
        base.set_execution_phase(ExecutionPhase::Running).await.unwrap();
        let rows = db
            .execute_query("SELECT execution_phase FROM phases WHERE state = ?", &[Value::Bool(true)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].as_str(), Some("RUNNING"));
    }

    #[tokio::test]
    async fn set_timer_then_fetch() {
        let (_dir, db) = seeded_db().await;
        let running = Arc::new(AtomicBool::new(true));
        let base = BaseAction::new("x", db.clone(), running);
        let expiry = BaseAction::set_timer_expiry(Duration::Seconds(0));
        base.set_timer("NormalShutdown", "{}", expiry).await.unwrap();
        let rows = db
            .execute_query("SELECT action, expiry, active FROM timers WHERE action = ?", &[Value::Text("NormalShutdown".into())])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][2].as_bool(), Some(true));

        // Re-setting updates rather than duplicating the row.
        base.set_timer("NormalShutdown", "{}", expiry + 1000).await.unwrap();
        let rows = db
            .execute_query("SELECT action FROM timers WHERE action = ?", &[Value::Text("NormalShutdown".into())])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn missing_action_row_errors() {
        let (_dir, db) = seeded_db().await;
        let running = Arc::new(AtomicBool::new(true));
        let base = BaseAction::new("NoSuchAction", db, running);
        let err = base.active().await.unwrap_err();
        assert!(matches!(err, IsmError::MissingDataInControlDatabase(_)));
    }
}
