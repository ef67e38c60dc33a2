//! Engine facade (spec §4.7, C7): the single entry point that wires configuration,
//! logging, the control database, the core action inventory, and the scheduler
//! together. Grounded on the teacher's `runner.rs` phase-sequencing pattern
//! (init → register → start → wait → stop) and `apps/hyperspot-server/src/main.rs`'s
//! construction wiring, with the REST/DB-migration phases replaced by control-DB
//! bootstrap and core action registration.

use ism_core::core_actions::{
    CheckTimers, ConfirmReadyToRun, ConfirmReadyToStop, EmergencyShutdown, NormalShutdown,
    ProcessInboundMessages,
};
use ism_core::schema::{bootstrap, core_action_seeds};
use ism_core::{Action, BaseAction};
use ism_db::{ConnectOpts, DataAccess, MySqlDataAccess, SqliteDataAccess};
use ism_errors::{IsmError, Result};
use ism_pack::ActionPackLoader;
use ism_runtime::{init_logging_from_config, EngineConfig};
use ism_scheduler::Scheduler;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Computes `run_timestamp` per the configured stamp format (spec §4.7 step 2).
fn compute_run_timestamp(stamp_format: &str) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch");
    match stamp_format {
        "epoch_seconds" => Ok(now.as_secs().to_string()),
        "epoch_milliseconds" => Ok(now.as_millis().to_string()),
        other => Err(IsmError::TimestampFormatNotRecognised(other.to_string())),
    }
}

/// Builds the one `Box<dyn Action>` for a core action seed name (spec §4.4 list).
fn build_core_action(name: &str, base: BaseAction) -> Result<Box<dyn Action>> {
    let action: Box<dyn Action> = match name {
        "ProcessInboundMessages" => Box::new(ProcessInboundMessages(base)),
        "ConfirmReadyToRun" => Box::new(ConfirmReadyToRun(base)),
        "ConfirmReadyToStop" => Box::new(ConfirmReadyToStop(base)),
        "NormalShutdown" => Box::new(NormalShutdown(base)),
        "EmergencyShutdown" => Box::new(EmergencyShutdown(base)),
        "CheckTimers" => Box::new(CheckTimers(base)),
        other => return Err(IsmError::Other(format!("unknown core action `{other}`"))),
    };
    Ok(action)
}

/// The engine facade (spec C7). Owns the control-database binding, the scheduler, and
/// the run's identity (tag, timestamp, directory).
pub struct Engine {
    db: Arc<dyn DataAccess>,
    scheduler: Arc<Scheduler>,
    pack_loader: ActionPackLoader,
    admin: BaseAction,
    db_name: String,
    run_dir: PathBuf,
    tag: String,
}

impl Engine {
    /// Runs the full construction sequence (spec §4.7, steps 1–7). `tag_override` and
    /// `password_override` correspond to the optional per-construction overrides spec
    /// §6 "Programmatic surface" calls out.
    pub async fn new(
        config: EngineConfig,
        tag_override: Option<String>,
        password_override: Option<String>,
    ) -> Result<Self> {
        let tag = tag_override.unwrap_or_else(|| config.runtime.tag.clone());
        let run_timestamp = compute_run_timestamp(&config.runtime.stamp_format)?;
        let run_dir = PathBuf::from(&config.runtime.root_dir)
            .join(&tag)
            .join(&run_timestamp);
        std::fs::create_dir_all(&run_dir)?;

        init_logging_from_config(config.logging.as_ref(), &run_dir);
        tracing::info!(run_dir = %run_dir.display(), tag = %tag, "engine constructing");

        let opts = ConnectOpts {
            raise_on_sql_error: config.database.raise_on_sql_error,
        };
        let (db, db_name): (Arc<dyn DataAccess>, String) = match config.database.rdbms.as_str() {
            "sqlite3" => {
                let path = run_dir.join("database").join(&config.database.db_name);
                let db_name = config.database.db_name.clone();
                (Arc::new(SqliteDataAccess::new(path, opts)), db_name)
            }
            "mysql" => {
                let host = config
                    .database
                    .host
                    .clone()
                    .ok_or_else(|| IsmError::PropertyKeyNotRecognised("database.host".to_string()))?;
                let user = config
                    .database
                    .user
                    .clone()
                    .ok_or_else(|| IsmError::PropertyKeyNotRecognised("database.user".to_string()))?;
                let password = password_override
                    .or_else(|| config.database.password.clone())
                    .unwrap_or_default();
                let run_db = format!("{}_{}_{}", config.database.db_name, tag, run_timestamp);
                (
                    Arc::new(MySqlDataAccess::new(host, user, password, run_db.clone(), opts)),
                    run_db,
                )
            }
            other => return Err(IsmError::RdbmsNotRecognised(other.to_string())),
        };

        db.create_database().await?;
        bootstrap(db.as_ref()).await?;

        let scheduler = Scheduler::new();
        let running = scheduler.running_flag();
        for seed in core_action_seeds() {
            let base = BaseAction::new(seed.name, db.clone(), running.clone());
            scheduler.register(build_core_action(seed.name, base)?).await;
        }

        let admin = BaseAction::new("__engine__", db.clone(), running.clone());
        let pack_loader = ActionPackLoader::new(db.clone(), running);

        Ok(Self {
            db,
            scheduler,
            pack_loader,
            admin,
            db_name,
            run_dir,
            tag,
        })
    }

    /// `Start(join?)` (spec §4.6/§4.7): delegates to the scheduler.
    pub async fn start(&self, join: bool) -> Result<()> {
        self.scheduler.start(join).await
    }

    /// `Stop()` (spec §4.6): cooperative, idempotent.
    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    /// `ImportActionPack(name)` (spec §4.5): registers every action the named pack
    /// contributes and applies its schema/data.
    pub async fn import_action_pack(&self, pack_id: &str) -> Result<()> {
        let actions = self.pack_loader.import_pack(pack_id).await?;
        for action in actions {
            self.scheduler.register(action).await;
        }
        Ok(())
    }

    pub fn get_database_name(&self) -> &str {
        &self.db_name
    }

    pub async fn get_execution_phase(&self) -> Result<&'static str> {
        Ok(self.admin.current_phase().await?.as_str())
    }

    pub fn get_tag(&self) -> &str {
        &self.tag
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
    }

    pub fn run_dir(&self) -> &std::path::Path {
        &self.run_dir
    }

    /// Exposes the control database for read-only external callers (spec §5 "Shared
    /// resources").
    pub fn database(&self) -> &Arc<dyn DataAccess> {
        &self.db
    }

    /// Last error raised by an action, if the dispatch loop terminated abnormally
    /// (§9.1(c) decision: surfaced here, not swallowed at the scheduler).
    pub async fn last_error(&self) -> Option<String> {
        self.scheduler.last_error().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ism_runtime::{DatabaseConfig, LoggingConfig, RuntimeSection};
    use std::time::Duration;

    fn test_config(root: &std::path::Path) -> EngineConfig {
        EngineConfig {
            database: DatabaseConfig {
                rdbms: "sqlite3".to_string(),
                db_name: "control.db".to_string(),
                host: None,
                user: None,
                password: None,
                raise_on_sql_error: false,
            },
            runtime: RuntimeSection {
                root_dir: root.to_string_lossy().to_string(),
                stamp_format: "epoch_seconds".to_string(),
                tag: "default".to_string(),
            },
            logging: Some(LoggingConfig {
                level: "INFO".to_string(),
                file: None,
                propagate: true,
            }),
        }
    }

    #[tokio::test]
    async fn boot_to_running_transitions_phase_and_activates_process_inbound() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(test_config(dir.path()), None, None).await.unwrap();
        assert_eq!(engine.get_execution_phase().await.unwrap(), "STARTING");

        engine.start(false).await.unwrap();
        // Give the dispatch loop a few passes to clear ConfirmReadyToRun.
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(engine.get_execution_phase().await.unwrap(), "RUNNING");
        engine.stop().await;
    }

    #[tokio::test]
    async fn rejects_unknown_rdbms() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = test_config(dir.path());
        cfg.database.rdbms = "oracle".to_string();
        let err = Engine::new(cfg, None, None).await.unwrap_err();
        assert!(matches!(err, IsmError::RdbmsNotRecognised(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_stamp_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = test_config(dir.path());
        cfg.runtime.stamp_format = "lunar_cycles".to_string();
        let err = Engine::new(cfg, None, None).await.unwrap_err();
        assert!(matches!(err, IsmError::TimestampFormatNotRecognised(_)));
    }

    #[tokio::test]
    async fn get_database_name_reflects_configured_name() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(test_config(dir.path()), None, None).await.unwrap();
        assert_eq!(engine.get_database_name(), "control.db");
    }

    #[tokio::test]
    async fn set_tag_updates_getter() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::new(test_config(dir.path()), None, None).await.unwrap();
        engine.set_tag("custom-tag");
        assert_eq!(engine.get_tag(), "custom-tag");
    }
}
