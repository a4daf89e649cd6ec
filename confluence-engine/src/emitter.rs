//! Load impulse emitters.
//!
//! An emitter is the broadcast point of one datasource graph: the primary
//! datasource, the cache datasource and the merge engine all subscribe to
//! the same emitter and therefore react to the same request.
//!
//! Emitters replay the latest impulse to new subscribers and deliver every
//! emission, identical ones included. Consumers that must not react twice
//! to the same request de-duplicate with [`crate::skip_repeats`].

use std::sync::Arc;
use std::time::Duration;

use confluence_core::{LoadImpulse, LoadImpulseType, Parameters, TimerMode};
use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

/// Broadcast point for load impulses.
pub trait LoadImpulseEmitter: Send + Sync {
    type Params: Parameters;
    type ImpulseType: LoadImpulseType;

    /// Push `load_impulse` to all subscribers.
    fn emit(&self, load_impulse: LoadImpulse<Self::Params, Self::ImpulseType>);

    /// Subscribe. Yields the latest impulse first, if there is one.
    fn load_impulses(&self) -> BoxStream<'static, LoadImpulse<Self::Params, Self::ImpulseType>>;

    /// Latest emitted impulse.
    fn current(&self) -> Option<LoadImpulse<Self::Params, Self::ImpulseType>>;
}

fn impulses_from<P, T>(
    receiver: watch::Receiver<Option<LoadImpulse<P, T>>>,
) -> BoxStream<'static, LoadImpulse<P, T>>
where
    P: Parameters,
    T: LoadImpulseType,
{
    WatchStream::new(receiver).filter_map(future::ready).boxed()
}

// ============================================================================
// DEFAULT EMITTER
// ============================================================================

/// Emitter with an optional seed and replay of the latest impulse.
pub struct DefaultLoadImpulseEmitter<P, T> {
    sender: watch::Sender<Option<LoadImpulse<P, T>>>,
}

impl<P: Parameters, T: LoadImpulseType> DefaultLoadImpulseEmitter<P, T> {
    /// Create an emitter, seeded with `initial` if given.
    pub fn new(initial: Option<LoadImpulse<P, T>>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Create an emitter seeded with `initial`.
    pub fn with_initial(initial: LoadImpulse<P, T>) -> Self {
        Self::new(Some(initial))
    }
}

impl<P: Parameters, T: LoadImpulseType> LoadImpulseEmitter for DefaultLoadImpulseEmitter<P, T> {
    type Params = P;
    type ImpulseType = T;

    fn emit(&self, load_impulse: LoadImpulse<P, T>) {
        debug!(?load_impulse, "emitting load impulse");
        // send_replace notifies even when the impulse is unchanged.
        self.sender.send_replace(Some(load_impulse));
    }

    fn load_impulses(&self) -> BoxStream<'static, LoadImpulse<P, T>> {
        impulses_from(self.sender.subscribe())
    }

    fn current(&self) -> Option<LoadImpulse<P, T>> {
        self.sender.borrow().clone()
    }
}

// ============================================================================
// RECURRING EMITTER
// ============================================================================

struct RecurringChannels<P, T> {
    /// Manual emissions.
    manual: watch::Sender<Option<LoadImpulse<P, T>>>,
    /// What subscribers see: manual emissions plus timer re-emissions.
    output: watch::Sender<Option<LoadImpulse<P, T>>>,
    timer_mode: watch::Sender<TimerMode>,
}

/// Emitter that also re-emits the latest impulse periodically.
///
/// - A manual [`LoadImpulseEmitter::emit`] is forwarded immediately and
///   restarts the period.
/// - [`RecurringLoadImpulseEmitter::set_timer_mode`] cancels the running
///   timer and starts the new one, if any. It does not emit.
/// - With [`TimerMode::None`] the emitter behaves like
///   [`DefaultLoadImpulseEmitter`].
///
/// The timer runs on a spawned task; construction requires a tokio runtime.
pub struct RecurringLoadImpulseEmitter<P, T> {
    channels: Arc<RecurringChannels<P, T>>,
    driver: JoinHandle<()>,
}

fn timer_for(mode: TimerMode) -> Option<Interval> {
    mode.period().map(|period| {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    })
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

impl<P: Parameters, T: LoadImpulseType> RecurringLoadImpulseEmitter<P, T> {
    pub fn new(initial: Option<LoadImpulse<P, T>>, timer_mode: TimerMode) -> Self {
        let (manual, mut manual_rx) = watch::channel(initial.clone());
        let (output, _) = watch::channel(initial);
        let (timer_mode, mut timer_rx) = watch::channel(timer_mode);

        let channels = Arc::new(RecurringChannels {
            manual,
            output,
            timer_mode,
        });

        let driver_channels = Arc::clone(&channels);
        let driver = tokio::spawn(async move {
            let mut timer = timer_for(*timer_rx.borrow_and_update());

            loop {
                tokio::select! {
                    changed = manual_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let latest = manual_rx.borrow_and_update().clone();
                        if latest.is_some() {
                            driver_channels.output.send_replace(latest);
                            timer = timer_for(*timer_rx.borrow());
                        }
                    }

                    changed = timer_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let mode = *timer_rx.borrow_and_update();
                        timer = timer_for(mode);
                        info!(
                            period_ms = Option::<u64>::from(mode),
                            "load impulse timer rescheduled"
                        );
                    }

                    _ = next_tick(&mut timer) => {
                        let latest = driver_channels.output.borrow().clone();
                        if let Some(load_impulse) = latest {
                            debug!(?load_impulse, "timer re-emitting load impulse");
                            driver_channels.output.send_replace(Some(load_impulse));
                        }
                    }
                }
            }
        });

        Self { channels, driver }
    }

    /// Create an emitter that re-emits `initial` every `period`.
    pub fn with_interval(initial: LoadImpulse<P, T>, period: Duration) -> Self {
        Self::new(Some(initial), TimerMode::Interval(period))
    }

    pub fn timer_mode(&self) -> TimerMode {
        *self.channels.timer_mode.borrow()
    }

    /// Replace the timer. Takes effect immediately.
    pub fn set_timer_mode(&self, timer_mode: TimerMode) {
        self.channels.timer_mode.send_replace(timer_mode);
    }
}

impl<P: Parameters, T: LoadImpulseType> LoadImpulseEmitter for RecurringLoadImpulseEmitter<P, T> {
    type Params = P;
    type ImpulseType = T;

    fn emit(&self, load_impulse: LoadImpulse<P, T>) {
        debug!(?load_impulse, "emitting load impulse");
        self.channels.manual.send_replace(Some(load_impulse));
    }

    fn load_impulses(&self) -> BoxStream<'static, LoadImpulse<P, T>> {
        impulses_from(self.channels.output.subscribe())
    }

    fn current(&self) -> Option<LoadImpulse<P, T>> {
        self.channels.manual.borrow().clone()
    }
}

impl<P, T> Drop for RecurringLoadImpulseEmitter<P, T> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
