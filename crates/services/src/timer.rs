use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use kakomon_core::{Countdown, Tick, TimerPhase};

use crate::observer::{Listeners, Subscription};

const TICK: Duration = Duration::from_secs(1);

/// Invoked once when the countdown reaches zero.
pub type ExpiryCallback = Arc<dyn Fn() + Send + Sync>;

/// Countdown state published after every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub remaining: u32,
    pub phase: TimerPhase,
    pub running: bool,
}

impl TimerSnapshot {
    fn of(countdown: &Countdown) -> Self {
        Self {
            remaining: countdown.remaining(),
            phase: countdown.phase(),
            running: countdown.is_running(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exam countdown driven by a tokio task.
///
/// The ticking task exists only while the countdown runs; `pause`, `reset`,
/// `cancel` and drop abort it.
pub struct ExamTimer {
    countdown: Arc<Mutex<Countdown>>,
    task: Mutex<Option<JoinHandle<()>>>,
    on_expire: Option<ExpiryCallback>,
    listeners: Listeners<TimerSnapshot>,
}

impl ExamTimer {
    #[must_use]
    pub fn new(initial_secs: u32, warning_secs: u32, critical_secs: u32) -> Self {
        Self {
            countdown: Arc::new(Mutex::new(Countdown::new(
                initial_secs,
                warning_secs,
                critical_secs,
            ))),
            task: Mutex::new(None),
            on_expire: None,
            listeners: Listeners::new(),
        }
    }

    #[must_use]
    pub fn on_expire(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_expire = Some(Arc::new(callback));
        self
    }

    /// Begin ticking. No-op while running or after expiry.
    ///
    /// Returns `false` outside a tokio runtime, leaving the countdown stopped.
    pub fn start(&self) -> bool {
        let started = lock(&self.countdown).start();
        started && self.spawn_or_stop()
    }

    pub fn resume(&self) -> bool {
        let resumed = lock(&self.countdown).resume();
        resumed && self.spawn_or_stop()
    }

    fn spawn_or_stop(&self) -> bool {
        if self.spawn_ticker() {
            return true;
        }
        lock(&self.countdown).pause();
        false
    }

    /// Stop ticking, keeping the remaining time. Returns whether it was running.
    pub fn pause(&self) -> bool {
        self.abort_ticker();
        lock(&self.countdown).pause()
    }

    /// Restore the initial budget, stopped. Re-arms an expired countdown.
    pub fn reset(&self) {
        self.abort_ticker();
        lock(&self.countdown).reset();
    }

    /// Stop the ticking task for good; used on session teardown.
    pub fn cancel(&self) {
        self.pause();
    }

    #[must_use]
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::of(&lock(&self.countdown))
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        lock(&self.countdown).remaining()
    }

    #[must_use]
    pub fn elapsed(&self) -> u32 {
        lock(&self.countdown).elapsed()
    }

    #[must_use]
    pub fn phase(&self) -> TimerPhase {
        lock(&self.countdown).phase()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.countdown).is_running()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        lock(&self.countdown).is_expired()
    }

    #[must_use]
    pub fn percent_remaining(&self) -> f64 {
        lock(&self.countdown).percent_remaining()
    }

    /// `HH:MM:SS` from one hour up, `MM:SS` below.
    #[must_use]
    pub fn formatted(&self) -> String {
        lock(&self.countdown).formatted()
    }

    /// Called after each tick with the new state.
    pub fn subscribe(&self, listener: impl Fn(&TimerSnapshot) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn spawn_ticker(&self) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!("no tokio runtime; countdown not started");
            return false;
        };

        let countdown = Arc::clone(&self.countdown);
        let on_expire = self.on_expire.clone();
        let listeners = self.listeners.clone();
        let ticker = handle.spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let (tick, snapshot) = {
                    let mut countdown = lock(&countdown);
                    let tick = countdown.tick();
                    (tick, TimerSnapshot::of(&countdown))
                };
                listeners.notify(&snapshot);
                match tick {
                    Tick::Running(_) => {}
                    Tick::Expired => {
                        debug!("countdown expired");
                        if let Some(callback) = on_expire {
                            callback();
                        }
                        break;
                    }
                    Tick::Idle => break,
                }
            }
        });

        if let Some(previous) = lock(&self.task).replace(ticker) {
            previous.abort();
        }
        true
    }

    fn abort_ticker(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}

impl Drop for ExamTimer {
    fn drop(&mut self) {
        self.abort_ticker();
    }
}

impl fmt::Debug for ExamTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamTimer")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_timer(secs: u32) -> (ExamTimer, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let timer = ExamTimer::new(secs, secs / 4, secs / 10).on_expire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_per_second() {
        let (timer, _) = counting_timer(60);
        assert!(timer.start());
        assert!(!timer.start());

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(timer.remaining(), 50);
        assert_eq!(timer.elapsed(), 10);
        assert_eq!(timer.formatted(), "00:50");
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_fires_exactly_once() {
        let (timer, fired) = counting_timer(5);
        timer.start();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(timer.is_expired());
        assert_eq!(timer.phase(), TimerPhase::Expired);
        assert!(!timer.is_running());

        assert!(!timer.start());
        assert!(!timer.resume());
        assert!(!timer.pause());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_and_resume_continues() {
        let (timer, _) = counting_timer(60);
        timer.start();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert!(timer.pause());
        let frozen = timer.remaining();
        assert_eq!(frozen, 57);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(timer.remaining(), frozen);

        assert!(timer.resume());
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(timer.remaining(), 55);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_budget_and_rearms() {
        let (timer, fired) = counting_timer(3);
        timer.start();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        timer.reset();
        assert_eq!(timer.remaining(), 3);
        assert!(!timer.is_running());
        assert_eq!(timer.phase(), TimerPhase::Normal);

        assert!(timer.start());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn phases_only_move_forward() {
        let (timer, _) = counting_timer(100);
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let _sub = timer.subscribe(move |snapshot| lock(&sink).push(snapshot.phase));

        timer.start();
        tokio::time::sleep(Duration::from_secs(101)).await;

        let phases = lock(&phases).clone();
        assert_eq!(phases.len(), 100);
        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(phases[73], TimerPhase::Normal);
        assert_eq!(phases[74], TimerPhase::Warning);
        assert_eq!(phases[88], TimerPhase::Warning);
        assert_eq!(phases[89], TimerPhase::Critical);
        assert_eq!(phases.last(), Some(&TimerPhase::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_cancels_the_task() {
        let (timer, fired) = counting_timer(2);
        timer.start();
        drop(timer);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_without_runtime_stays_startable() {
        let timer = ExamTimer::new(10, 2, 1);
        assert!(!timer.start());
        assert!(!timer.resume());
        assert!(!timer.is_running());
        assert_eq!(timer.remaining(), 10);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(async {
            assert!(timer.start());
            tokio::time::sleep(std::time::Duration::from_millis(3_500)).await;
            assert_eq!(timer.remaining(), 7);
            timer.cancel();
        });
    }
}
