//! Background minting worker lifecycle.
//!
//! A [`Minter`] owns at most one worker task. `start` and `stop` are
//! idempotent and serialized by one async mutex; `stop` returns only after
//! the worker has exited. Each minting pass runs on a blocking thread and
//! observes the same cancellation token, so a stop interrupts a pass between
//! kernel checks.
//!
//! A `stop` future dropped before the worker exits leaves the token
//! cancelled. The next `start` or `stop` finishes that shutdown before doing
//! its own work.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use crate::error::MintError;
use crate::stake::{KernelFound, Staker};

/// Wait between sync checks while the wallet is behind the chain.
pub const SYNC_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Pause between minting passes.
pub const MINT_PAUSE_INTERVAL: Duration = Duration::from_millis(500);

/// What the worker drives on every pass.
pub trait CoinStaker: Send + Sync + 'static {
    /// Minting is skipped while this is false.
    fn chain_synced(&self) -> bool;

    /// One minting-mode search anchored at `from_time`.
    fn create_coin_stake(
        &self,
        from_time: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<KernelFound>, MintError>;

    /// Anchor time for the next pass.
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

impl CoinStaker for Staker {
    fn chain_synced(&self) -> bool {
        Staker::chain_synced(self)
    }

    fn create_coin_stake(
        &self,
        from_time: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<KernelFound>, MintError> {
        Staker::create_coin_stake(self, from_time, cancel)
    }

    fn now(&self) -> i64 {
        Staker::now(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MinterState {
    Stopped,
    Running,
}

/// Counters updated by the worker.
#[derive(Debug, Default)]
pub struct MintingStats {
    passes: AtomicU64,
    kernels_found: AtomicU64,
    failed_passes: AtomicU64,
    last_kernel: parking_lot::Mutex<Option<KernelFound>>,
}

/// Point-in-time copy of [`MintingStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintingStatsSnapshot {
    pub passes: u64,
    pub kernels_found: u64,
    pub failed_passes: u64,
    pub last_kernel: Option<KernelFound>,
}

impl MintingStats {
    fn record(&self, outcome: &Result<Option<KernelFound>, MintError>) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Ok(Some(kernel)) => {
                self.kernels_found.fetch_add(1, Ordering::Relaxed);
                *self.last_kernel.lock() = Some(kernel.clone());
            }
            Ok(None) => {}
            Err(_) => {
                self.failed_passes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> MintingStatsSnapshot {
        MintingStatsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            kernels_found: self.kernels_found.load(Ordering::Relaxed),
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            last_kernel: self.last_kernel.lock().clone(),
        }
    }
}

struct Control {
    state: MinterState,
    cancel: CancellationToken,
}

/// Start/stop controller for the minting worker.
pub struct Minter {
    staker: Arc<dyn CoinStaker>,
    control: Mutex<Control>,
    running: AtomicBool,
    tracker: TaskTracker,
    stats: Arc<MintingStats>,
    sync_retry: Duration,
    mint_pause: Duration,
}

impl fmt::Debug for Minter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Minter")
            .field("running", &self.is_running())
            .field("sync_retry", &self.sync_retry)
            .field("mint_pause", &self.mint_pause)
            .finish_non_exhaustive()
    }
}

impl Minter {
    pub fn new(staker: Arc<dyn CoinStaker>) -> Self {
        let tracker = TaskTracker::new();
        // Closed and empty: `wait_for_shutdown` returns at once until started.
        tracker.close();
        Self {
            staker,
            control: Mutex::new(Control {
                state: MinterState::Stopped,
                cancel: CancellationToken::new(),
            }),
            running: AtomicBool::new(false),
            tracker,
            stats: Arc::new(MintingStats::default()),
            sync_retry: SYNC_RETRY_INTERVAL,
            mint_pause: MINT_PAUSE_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, sync_retry: Duration, mint_pause: Duration) -> Self {
        self.sync_retry = sync_retry;
        self.mint_pause = mint_pause;
        self
    }

    /// True while a worker is live and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.tracker.is_empty()
    }

    pub fn state(&self) -> MinterState {
        if self.is_running() {
            MinterState::Running
        } else {
            MinterState::Stopped
        }
    }

    pub fn stats(&self) -> MintingStatsSnapshot {
        self.stats.snapshot()
    }

    /// Launch the worker. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        let mut control = self.control.lock().await;
        if control.state == MinterState::Running {
            if !control.cancel.is_cancelled() && !self.tracker.is_empty() {
                return false;
            }
            debug!("completing previous stop before start");
            self.finish_stop(&mut control).await;
        }

        let cancel = CancellationToken::new();
        control.cancel = cancel.clone();
        self.tracker.reopen();
        self.tracker.spawn(mint_blocks(
            self.staker.clone(),
            cancel,
            self.stats.clone(),
            self.sync_retry,
            self.mint_pause,
        ));
        self.tracker.close();

        control.state = MinterState::Running;
        self.running.store(true, Ordering::Release);
        info!("minter started");
        true
    }

    /// Cancel the worker and wait for it to exit. Returns `false` if it was
    /// not running.
    pub async fn stop(&self) -> bool {
        let mut control = self.control.lock().await;
        if control.state == MinterState::Stopped {
            return false;
        }

        control.cancel.cancel();
        self.finish_stop(&mut control).await;
        info!("minter stopped");
        true
    }

    /// Wait for a cancelled worker, then record the stop. Dropping this
    /// future leaves the state untouched.
    async fn finish_stop(&self, control: &mut Control) {
        self.tracker.wait().await;
        control.state = MinterState::Stopped;
        self.running.store(false, Ordering::Release);
    }

    /// Wait until the worker has exited, whoever stopped it.
    pub async fn wait_for_shutdown(&self) {
        self.tracker.wait().await;
    }
}

async fn mint_blocks(
    staker: Arc<dyn CoinStaker>,
    cancel: CancellationToken,
    stats: Arc<MintingStats>,
    sync_retry: Duration,
    mint_pause: Duration,
) {
    trace!("minting worker started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        if !staker.chain_synced() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(sync_retry) => continue,
            }
        }

        let from_time = staker.now();
        let pass_staker = staker.clone();
        let pass_cancel = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            pass_staker.create_coin_stake(from_time, &pass_cancel)
        })
        .await;

        match outcome {
            Ok(result) => {
                if let Err(e) = &result {
                    warn!("minting pass failed: {e}");
                }
                stats.record(&result);
            }
            Err(e) => error!("minting pass aborted: {e}"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(mint_pause) => {}
        }
    }
    trace!("minting worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppcmint_core::error::ChainError;
    use ppcmint_core::types::{Hash256, OutPoint};
    use std::sync::atomic::AtomicUsize;

    /// Staker whose passes take a few milliseconds and track concurrency.
    #[derive(Default)]
    struct FakeStaker {
        synced: AtomicBool,
        fail: bool,
        find: bool,
        /// Pass length that ignores cancellation.
        stubborn: Option<Duration>,
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeStaker {
        fn synced() -> Self {
            let s = Self::default();
            s.synced.store(true, Ordering::SeqCst);
            s
        }
    }

    impl CoinStaker for FakeStaker {
        fn chain_synced(&self) -> bool {
            self.synced.load(Ordering::SeqCst)
        }

        fn create_coin_stake(
            &self,
            from_time: i64,
            cancel: &CancellationToken,
        ) -> Result<Option<KernelFound>, MintError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            if let Some(pass) = self.stubborn {
                std::thread::sleep(pass);
            }
            for _ in 0..5 {
                if cancel.is_cancelled() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(2));
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(MintError::Chain(ChainError::Disconnected));
            }
            Ok(self.find.then(|| KernelFound {
                outpoint: OutPoint { txid: Hash256([1; 32]), index: 0 },
                credit: 10,
                tx_time: from_time,
                hash: Hash256::ZERO,
            }))
        }

        fn now(&self) -> i64 {
            1_000
        }
    }

    fn minter(staker: Arc<FakeStaker>) -> Minter {
        Minter::new(staker).with_intervals(Duration::from_millis(5), Duration::from_millis(1))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn start_twice_runs_one_worker() {
        let staker = Arc::new(FakeStaker::synced());
        let m = minter(staker.clone());
        assert!(m.start().await);
        assert!(!m.start().await);
        settle().await;
        assert!(staker.calls.load(Ordering::SeqCst) > 1);
        assert_eq!(staker.max_active.load(Ordering::SeqCst), 1);
        assert!(m.stop().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_when_stopped_is_noop() {
        let m = minter(Arc::new(FakeStaker::synced()));
        assert!(!m.stop().await);
        assert_eq!(m.state(), MinterState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_waits_for_worker_exit() {
        let staker = Arc::new(FakeStaker::synced());
        let m = minter(staker.clone());
        m.start().await;
        settle().await;
        assert!(m.stop().await);
        assert!(!m.is_running());
        assert_eq!(staker.active.load(Ordering::SeqCst), 0);

        let calls = staker.calls.load(Ordering::SeqCst);
        settle().await;
        assert_eq!(staker.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn abandoned_stop_does_not_block_restart() {
        let staker = Arc::new(FakeStaker {
            stubborn: Some(Duration::from_millis(150)),
            ..FakeStaker::synced()
        });
        let m = minter(staker.clone());
        assert!(m.start().await);
        settle().await;

        // The caller gives up while the pass is still running.
        assert!(tokio::time::timeout(Duration::from_millis(20), m.stop()).await.is_err());

        assert!(m.start().await);
        assert!(m.is_running());
        let calls = staker.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(staker.calls.load(Ordering::SeqCst) > calls);
        assert_eq!(staker.max_active.load(Ordering::SeqCst), 1);
        assert!(m.stop().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn abandoned_stop_is_completed_by_next_stop() {
        let staker = Arc::new(FakeStaker {
            stubborn: Some(Duration::from_millis(150)),
            ..FakeStaker::synced()
        });
        let m = minter(staker.clone());
        m.start().await;
        settle().await;
        assert!(tokio::time::timeout(Duration::from_millis(20), m.stop()).await.is_err());

        assert!(m.stop().await);
        assert_eq!(m.state(), MinterState::Stopped);
        assert_eq!(staker.active.load(Ordering::SeqCst), 0);
        assert!(!m.stop().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_gone_after_abandoned_stop_reports_not_running() {
        let staker = Arc::new(FakeStaker {
            stubborn: Some(Duration::from_millis(100)),
            ..FakeStaker::synced()
        });
        let m = minter(staker.clone());
        m.start().await;
        settle().await;
        assert!(tokio::time::timeout(Duration::from_millis(10), m.stop()).await.is_err());

        m.wait_for_shutdown().await;
        assert!(!m.is_running());
        assert_eq!(m.state(), MinterState::Stopped);
        assert!(m.start().await);
        m.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restart_after_stop() {
        let staker = Arc::new(FakeStaker::synced());
        let m = minter(staker.clone());
        m.start().await;
        m.stop().await;
        let calls = staker.calls.load(Ordering::SeqCst);
        assert!(m.start().await);
        assert!(m.is_running());
        settle().await;
        assert!(staker.calls.load(Ordering::SeqCst) > calls);
        m.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unsynced_wallet_does_not_mint() {
        let staker = Arc::new(FakeStaker::default());
        let m = minter(staker.clone());
        m.start().await;
        settle().await;
        assert_eq!(staker.calls.load(Ordering::SeqCst), 0);

        staker.synced.store(true, Ordering::SeqCst);
        settle().await;
        assert!(staker.calls.load(Ordering::SeqCst) > 0);
        m.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_passes_do_not_stop_worker() {
        let staker = Arc::new(FakeStaker { fail: true, ..FakeStaker::synced() });
        let m = minter(staker.clone());
        m.start().await;
        settle().await;
        assert!(m.is_running());
        let stats = m.stats();
        assert!(stats.failed_passes >= 2);
        assert_eq!(stats.kernels_found, 0);
        m.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn found_kernels_are_recorded() {
        let staker = Arc::new(FakeStaker { find: true, ..FakeStaker::synced() });
        let m = minter(staker);
        m.start().await;
        settle().await;
        m.stop().await;
        let stats = m.stats();
        assert!(stats.kernels_found >= 1);
        assert_eq!(stats.last_kernel.unwrap().tx_time, 1_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_for_shutdown_without_start_returns() {
        let m = minter(Arc::new(FakeStaker::synced()));
        tokio::time::timeout(Duration::from_secs(1), m.wait_for_shutdown())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_for_shutdown_observes_external_stop() {
        let m = Arc::new(minter(Arc::new(FakeStaker::synced())));
        m.start().await;

        let waiter = {
            let m = m.clone();
            tokio::spawn(async move { m.wait_for_shutdown().await })
        };
        settle().await;
        assert!(!waiter.is_finished());

        m.stop().await;
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
