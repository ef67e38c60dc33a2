//! CoreActions (spec §4.4, C4): the built-in actions that drive the phase state
//! machine.

use crate::action::{Action, BaseAction};
use crate::phase::ExecutionPhase;
use async_trait::async_trait;
use ism_errors::Result;

/// Phase `RUNNING`. A no-op reserved as a well-known dispatch point for inbound
/// message processing by application-contributed packs.
pub struct ProcessInboundMessages(pub BaseAction);

#[async_trait]
impl Action for ProcessInboundMessages {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn execute(&self) -> Result<()> {
        if !self.0.active().await? {
            return Ok(());
        }
        Ok(())
    }
}

/// Phase `STARTING`, initially active. Waits for any active `ActionBefore*` to clear,
/// then transitions to `RUNNING`.
pub struct ConfirmReadyToRun(pub BaseAction);

#[async_trait]
impl Action for ConfirmReadyToRun {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn execute(&self) -> Result<()> {
        if !self.0.active().await? {
            return Ok(());
        }
        if self.0.any_active_with_prefix("ActionBefore").await? {
            return Ok(());
        }
        self.0.set_execution_phase(ExecutionPhase::Running).await?;
        self.0.activate("ProcessInboundMessages").await?;
        self.0.deactivate(None).await
    }
}

/// Phase `NORMAL_SHUTDOWN`. Waits for any active `ActionAfter*` to clear, then
/// transitions to `STOPPED` and clears the scheduler's `running` flag.
pub struct ConfirmReadyToStop(pub BaseAction);

#[async_trait]
impl Action for ConfirmReadyToStop {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn execute(&self) -> Result<()> {
        if !self.0.active().await? {
            return Ok(());
        }
        if self.0.any_active_with_prefix("ActionAfter").await? {
            return Ok(());
        }
        self.0.set_execution_phase(ExecutionPhase::Stopped).await?;
        self.0.stop_running();
        self.0.deactivate(None).await
    }
}

/// Phase `ALL`. Transitions to `NORMAL_SHUTDOWN` and activates `ConfirmReadyToStop`.
pub struct NormalShutdown(pub BaseAction);

#[async_trait]
impl Action for NormalShutdown {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn execute(&self) -> Result<()> {
        if !self.0.active().await? {
            return Ok(());
        }
        self.0
            .set_execution_phase(ExecutionPhase::NormalShutdown)
            .await?;
        self.0.activate("ConfirmReadyToStop").await?;
        self.0.deactivate(None).await
    }
}

/// Phase `ALL`. Transitions to `EMERGENCY_SHUTDOWN`, clears `running` immediately. No
/// grace period, no `After*` wait (spec §4.4 tie-break: this always wins over a
/// concurrently-activated `NormalShutdown`).
pub struct EmergencyShutdown(pub BaseAction);

#[async_trait]
impl Action for EmergencyShutdown {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn execute(&self) -> Result<()> {
        if !self.0.active().await? {
            return Ok(());
        }
        self.0
            .set_execution_phase(ExecutionPhase::EmergencyShutdown)
            .await?;
        self.0.stop_running();
        self.0.deactivate(None).await
    }
}

/// Phase `ALL`, initially active. For each past-due, active timer row, copies its
/// payload into the target action and activates it, then deactivates the timer row
/// (I-4; see DESIGN.md on why this deviates from the original source's sketch).
pub struct CheckTimers(pub BaseAction);

#[async_trait]
impl Action for CheckTimers {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn execute(&self) -> Result<()> {
        if !self.0.active().await? {
            return Ok(());
        }
        let now_ms = BaseAction::get_epoch_milliseconds();
        let db = self.0.db();
        let rows = db
            .execute_query(
                "SELECT action, payload, expiry FROM timers WHERE active = ?",
                &[ism_db::Value::Bool(true)],
            )
            .await?;
        for row in rows {
            let expiry = row[2].as_int().unwrap_or(i64::MAX);
            if expiry >= now_ms {
                continue;
            }
            let action = row[0].as_str().unwrap_or_default().to_string();
            let payload = row[1].as_str().unwrap_or_default().to_string();
            self.0.set_payload(&action, &payload).await?;
            self.0.activate(&action).await?;
            db.execute_statement(
                "UPDATE timers SET active = ? WHERE action = ?",
                &[ism_db::Value::Bool(false), ism_db::Value::Text(action)],
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::bootstrap;
    use ism_db::{ConnectOpts, DataAccess, SqliteDataAccess, Value};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    async fn seeded() -> (tempfile::TempDir, Arc<dyn DataAccess>, Arc<AtomicBool>) {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteDataAccess::new(dir.path().join("control.db"), ConnectOpts::default());
        db.create_database().await.unwrap();
        bootstrap(&db).await.unwrap();
        (dir, Arc::new(db), Arc::new(AtomicBool::new(true)))
    }

    #[tokio::test]
    async fn confirm_ready_to_run_transitions_without_before_actions() {
        let (_dir, db, running) = seeded().await;
        let action = ConfirmReadyToRun(BaseAction::new("ConfirmReadyToRun", db.clone(), running));
        action.execute().await.unwrap();

        let base = BaseAction::new("ProcessInboundMessages", db.clone(), action.0.running_flag().clone());
        assert!(base.active().await.unwrap());
        assert!(!ConfirmReadyToRun(BaseAction::new("ConfirmReadyToRun", db, action.0.running_flag().clone()))
            .0
            .active()
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn confirm_ready_to_run_waits_on_before_actions() {
        let (_dir, db, running) = seeded().await;
        db.execute_statement(
            "INSERT INTO actions (action, execution_phase, active, payload) VALUES (?, ?, ?, ?)",
            &[
                Value::Text("ActionBeforeWork".into()),
                Value::Text("STARTING".into()),
                Value::Bool(true),
                Value::Null,
            ],
        )
        .await
        .unwrap();

        let action = ConfirmReadyToRun(BaseAction::new("ConfirmReadyToRun", db.clone(), running));
        action.execute().await.unwrap();
        // Still STARTING: gated by the active ActionBefore* row.
        assert_eq!(action.0.current_phase().await.unwrap(), ExecutionPhase::Starting);
    }

    #[tokio::test]
    async fn emergency_shutdown_wins_over_normal_shutdown() {
        let (_dir, db, running) = seeded().await;
        db.execute_statement(
            "INSERT INTO actions (action, execution_phase, active, payload) VALUES (?, ?, ?, ?)",
            &[
                Value::Text("ActionAfterWork".into()),
                Value::Text("NORMAL_SHUTDOWN".into()),
                Value::Bool(true),
                Value::Null,
            ],
        )
        .await
        .unwrap();
        let normal = NormalShutdown(BaseAction::new("NormalShutdown", db.clone(), running.clone()));
        normal.0.activate("NormalShutdown").await.unwrap();
        normal.execute().await.unwrap();

        let emergency = EmergencyShutdown(BaseAction::new("EmergencyShutdown", db.clone(), running.clone()));
        emergency.0.activate("EmergencyShutdown").await.unwrap();
        emergency.execute().await.unwrap();

        assert_eq!(
            emergency.0.current_phase().await.unwrap(),
            ExecutionPhase::EmergencyShutdown
        );
        assert!(!running.load(std::sync::atomic::Ordering::Acquire));
    }

    #[tokio::test]
    async fn check_timers_fires_past_due_and_deactivates_timer() {
        let (_dir, db, running) = seeded().await;
        let base = BaseAction::new("CheckTimers", db.clone(), running);
        base.set_timer("NormalShutdown", "{\"x\":1}", BaseAction::get_epoch_milliseconds() - 1000)
            .await
            .unwrap();

        let check = CheckTimers(base);
        check.execute().await.unwrap();

        let target = BaseAction::new("NormalShutdown", db.clone(), check.0.running_flag().clone());
        assert_eq!(target.get_payload().await.unwrap().as_deref(), Some("{\"x\":1}"));
        let rows = db
            .execute_query("SELECT active FROM actions WHERE action = ?", &[Value::Text("NormalShutdown".into())])
            .await
            .unwrap();
        assert_eq!(rows[0][0].as_bool(), Some(true));
        let rows = db
            .execute_query("SELECT active FROM timers WHERE action = ?", &[Value::Text("NormalShutdown".into())])
            .await
            .unwrap();
        assert_eq!(rows[0][0].as_bool(), Some(false));
    }
}
