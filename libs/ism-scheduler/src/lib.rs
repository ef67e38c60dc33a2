//! Scheduler (spec §4.6, C6): a single cooperative round-robin dispatcher running on
//! its own dedicated task. Grounded on the same atomic-status + spawned-task lifecycle
//! shape the teacher's `Lifecycle` type uses, specialised down to the fixed dispatch
//! loop this spec calls for (no generic `Runnable` wrapper, no ready-signal handshake).

use ism_core::Action;
use ism_errors::Result;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl Status {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Status::Stopped,
            1 => Status::Starting,
            2 => Status::Running,
            _ => Status::Stopping,
        }
    }
}

/// Holds the ordered action list and the `running` flag shared with action helpers
/// (spec §4.6, §5, §9 design note).
pub struct Scheduler {
    actions: AsyncMutex<Vec<Box<dyn Action>>>,
    running: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
    handle: AsyncMutex<Option<JoinHandle<()>>>,
    last_error: Arc<AsyncMutex<Option<String>>>,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            actions: AsyncMutex::new(Vec::new()),
            running: Arc::new(AtomicBool::new(true)),
            status: Arc::new(AtomicU8::new(Status::Stopped as u8)),
            handle: AsyncMutex::new(None),
            last_error: Arc::new(AsyncMutex::new(None)),
        })
    }

    /// The shared `running` flag, handed to `BaseAction` instances so core actions can
    /// clear it (`ConfirmReadyToStop`, `EmergencyShutdown`).
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Appends an action to the registry. Registration order is preserved: core
    /// actions first (spec §4.4 order), user-pack actions in pack-import order
    /// (spec §4.6).
    pub async fn register(&self, action: Box<dyn Action>) {
        self.actions.lock().await.push(action);
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    /// Spawns the dedicated dispatch task. Returns immediately unless `join` is true,
    /// in which case it blocks until the loop exits (spec §4.6 `Start(join?)`).
    pub async fn start(self: &Arc<Self>, join: bool) -> Result<()> {
        let already_running = self
            .status
            .compare_exchange(
                Status::Stopped as u8,
                Status::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err();
        if already_running {
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        let this = self.clone();
        let handle = tokio::spawn(async move {
            this.status.store(Status::Running as u8, Ordering::Release);
            tracing::info!("scheduler dispatch loop starting");
            let error = this.dispatch_loop().await.err();
            if let Some(e) = &error {
                tracing::error!(error = %e, "scheduler dispatch loop terminated by action error");
                *this.last_error.lock().await = Some(e.to_string());
            }
            this.running.store(false, Ordering::Release);
            this.status.store(Status::Stopped as u8, Ordering::Release);
            tracing::info!("scheduler dispatch loop stopped");
        });

        if join {
            let _ = handle.await;
        } else {
            *self.handle.lock().await = Some(handle);
        }
        Ok(())
    }

    /// Per-iteration round-robin dispatch: advance an index modulo the action count,
    /// invoke that action's `execute`, repeat until `running=false`. An action error
    /// aborts the loop and is surfaced to the caller (§9.1(c) decision — never
    /// swallowed at this layer).
    async fn dispatch_loop(&self) -> Result<()> {
        let mut index = 0usize;
        while self.running.load(Ordering::Acquire) {
            let count = self.actions.lock().await.len();
            if count == 0 {
                tokio::task::yield_now().await;
                continue;
            }
            index %= count;
            // Execute without holding the registry lock, so a pack import mid-run
            // (which also locks `actions`) is never blocked behind a long-running
            // action.
            let name = {
                let actions = self.actions.lock().await;
                actions[index].name().to_string()
            };
            let result = {
                let actions = self.actions.lock().await;
                actions[index].execute().await
            };
            if let Err(e) = result {
                tracing::error!(action = %name, error = %e, "action returned an error");
                return Err(e);
            }
            index += 1;
        }
        Ok(())
    }

    /// Cooperative stop: sets `running=false`; the in-flight iteration completes, then
    /// the loop exits. Idempotent (P-6): calling `stop` when already stopped is a
    /// no-op.
    pub async fn stop(&self) {
        if self.status() == Status::Stopped {
            return;
        }
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}
