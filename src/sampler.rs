use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

use crate::context::{Observation, PipelineContext};
use crate::error::Result;
use crate::source::FrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Sampling,
}

/// What a single timer tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A run was started on the blocking pool.
    Started(JoinHandle<()>),
    /// A previous run was still in flight.
    Dropped,
    /// The source had no frame to give.
    NotReady,
}

/// Drives capture -> detect -> classify, one run at a time.
pub struct Sampler {
    context: Arc<PipelineContext>,
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    in_flight: Arc<AtomicBool>,
    dropped_ticks: AtomicU64,
}

impl Sampler {
    pub fn new(context: Arc<PipelineContext>, source: impl FrameSource + 'static) -> Self {
        Self {
            context,
            source: Arc::new(Mutex::new(Box::new(source))),
            in_flight: Arc::new(AtomicBool::new(false)),
            dropped_ticks: AtomicU64::new(0),
        }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    pub fn state(&self) -> SamplerState {
        if self.in_flight.load(Ordering::Acquire) {
            SamplerState::Sampling
        } else {
            SamplerState::Idle
        }
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks.load(Ordering::Acquire)
    }

    /// One timer tick. Never blocks: the run itself happens on tokio's
    /// blocking pool and must be called from inside a runtime.
    pub fn tick(&self) -> TickOutcome {
        // claim first, the source lock is held for the whole of a run
        let Some(guard) = InFlightGuard::claim(&self.in_flight) else {
            self.dropped_ticks.fetch_add(1, Ordering::AcqRel);
            debug!("previous run still in flight, dropping tick");
            return TickOutcome::Dropped;
        };

        let ready = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_ready();
        if !ready {
            trace!("source not ready");
            return TickOutcome::NotReady;
        }

        let context = self.context.clone();
        let source = self.source.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            run_once(&context, &source);
        });

        TickOutcome::Started(handle)
    }

    /// Starts ticking every `period`, first tick one period from now.
    pub fn spawn(self, period: Duration) -> SamplerHandle {
        let sampler = Arc::new(self);
        let ticker = sampler.clone();

        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                // the run is not awaited, overlapping ticks must see it in flight
                drop(ticker.tick());
            }
        });

        info!("sampling every {:?}", period);
        SamplerHandle { sampler, task }
    }
}

fn run_once(context: &PipelineContext, source: &Mutex<Box<dyn FrameSource>>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
        let frame = source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture()?;
        context.process_frame(&frame);
        Ok(())
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("sampling tick failed: {}", e);
            context.publish_no_result();
        }
        Err(payload) => {
            error!("sampling tick panicked: {}", panic_message(payload.as_ref()));
            context.publish_no_result();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A running sampler. Dropping it cancels the timer; a run already in
/// flight finishes on its own.
pub struct SamplerHandle {
    sampler: Arc<Sampler>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn subscribe(&self) -> watch::Receiver<Observation> {
        self.sampler.context.subscribe()
    }

    pub fn stop(self) {
        info!(
            "sampler stopped after {} detections ({} ticks dropped)",
            self.sampler.context.detection_count(),
            self.sampler.dropped_ticks()
        );
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
