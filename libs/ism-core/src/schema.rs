//! ControlSchema (spec §4.2, C2): bootstraps `phases`, `actions`, `timers` and seeds
//! them with the initial phase row and the core action inventory.

use crate::phase::{ActionPhase, ExecutionPhase};
use ism_db::{DataAccess, Value};
use ism_errors::Result;

/// One seed row for the `actions` table: class name, eligible phase, initial active
/// state.
pub struct ActionSeed {
    pub name: &'static str,
    pub phase: ActionPhase,
    pub active: bool,
}

/// Ordered `CREATE TABLE` statements. The same DDL is valid against both bound
/// backends (sqlite and mysql both accept `TEXT`/`INTEGER`/`BOOLEAN` column types), so
/// no per-backend branching is needed here; the function still takes no backend
/// parameter deliberately, since adding one with an always-identical body would only
/// invite drift.
pub fn schema_statements() -> Vec<&'static str> {
    vec![
        "CREATE TABLE IF NOT EXISTS phases (\
            execution_phase TEXT UNIQUE NOT NULL, \
            state BOOLEAN NOT NULL\
        )",
        "CREATE TABLE IF NOT EXISTS actions (\
            action TEXT UNIQUE NOT NULL, \
            execution_phase TEXT NOT NULL, \
            active BOOLEAN NOT NULL, \
            payload TEXT\
        )",
        "CREATE TABLE IF NOT EXISTS timers (\
            action TEXT NOT NULL, \
            payload TEXT, \
            expiry INTEGER NOT NULL, \
            active BOOLEAN NOT NULL\
        )",
    ]
}

/// The core action inventory, in registration order (spec §4.4 body order, carried
/// into the dispatcher's registration order per §4.6).
pub fn core_action_seeds() -> Vec<ActionSeed> {
    vec![
        ActionSeed {
            name: "ProcessInboundMessages",
            phase: ActionPhase::Specific(ExecutionPhase::Running),
            active: false,
        },
        ActionSeed {
            name: "ConfirmReadyToRun",
            phase: ActionPhase::Specific(ExecutionPhase::Starting),
            active: true,
        },
        ActionSeed {
            name: "ConfirmReadyToStop",
            phase: ActionPhase::Specific(ExecutionPhase::NormalShutdown),
            active: false,
        },
        ActionSeed {
            name: "NormalShutdown",
            phase: ActionPhase::All,
            active: false,
        },
        ActionSeed {
            name: "EmergencyShutdown",
            phase: ActionPhase::All,
            active: false,
        },
        ActionSeed {
            name: "CheckTimers",
            phase: ActionPhase::All,
            active: true,
        },
    ]
}

/// Applies schema then seed data via `execute_statement`, in listed order (spec §4.2).
pub async fn bootstrap(db: &dyn DataAccess) -> Result<()> {
    for stmt in schema_statements() {
        db.execute_statement(stmt, &[]).await?;
    }

    for phase in ExecutionPhase::all() {
        db.execute_statement(
            "INSERT INTO phases (execution_phase, state) VALUES (?, ?)",
            &[
                Value::Text(phase.as_str().to_string()),
                Value::Bool(phase == ExecutionPhase::Starting),
            ],
        )
        .await?;
    }

    for seed in core_action_seeds() {
        db.execute_statement(
            "INSERT INTO actions (action, execution_phase, active, payload) VALUES (?, ?, ?, ?)",
            &[
                Value::Text(seed.name.to_string()),
                Value::Text(seed.phase.as_str().to_string()),
                Value::Bool(seed.active),
                Value::Null,
            ],
        )
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ism_db::{ConnectOpts, SqliteDataAccess};

    #[tokio::test]
    async fn bootstrap_seeds_single_true_phase_and_all_core_actions() {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteDataAccess::new(dir.path().join("control.db"), ConnectOpts::default());
        db.create_database().await.unwrap();
        bootstrap(&db).await.unwrap();

        let rows = db
            .execute_query("SELECT execution_phase FROM phases WHERE state = ?", &[Value::Bool(true)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].as_str(), Some("STARTING"));

        let rows = db.execute_query("SELECT action FROM actions", &[]).await.unwrap();
        assert_eq!(rows.len(), core_action_seeds().len());
    }
}
