//! Lightweight per-stage timing recorder for the aggregation hot path.
//!
//! When the `record` feature is off (the default), [`StageRecorder`] is a
//! zero-sized no-op type. When it is on, each stage gets a pre-allocated
//! sample ring and `begin`/`end` pairs measure elapsed nanoseconds via
//! `Instant`, for offline percentile analysis outside the always-on
//! counters/histogram in [`crate::Metrics`].

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    PipelinePublish = 0,
    PipelineRead = 1,
    ProcessEvent = 2,
    Freeze = 3,
    Persist = 4,
}

pub const NUM_STAGES: usize = 5;
pub const MAX_SAMPLES: usize = 65_536;

#[cfg(feature = "record")]
mod inner {
    use super::*;
    use std::time::Instant;

    struct StageBuf {
        samples: Box<[u64; MAX_SAMPLES]>,
        count: usize,
        pending: Option<Instant>,
    }

    impl StageBuf {
        fn new() -> Self {
            Self {
                samples: vec![0u64; MAX_SAMPLES].into_boxed_slice().try_into().unwrap(),
                count: 0,
                pending: None,
            }
        }
    }

    pub struct StageRecorder {
        stages: Box<[StageBuf; NUM_STAGES]>,
    }

    impl StageRecorder {
        pub fn new() -> Self {
            let stages: Vec<StageBuf> = (0..NUM_STAGES).map(|_| StageBuf::new()).collect();
            Self {
                stages: stages.into_boxed_slice().try_into().ok().unwrap(),
            }
        }

        #[inline(always)]
        pub fn begin(&mut self, stage: Stage) {
            self.stages[stage as usize].pending = Some(Instant::now());
        }

        #[inline(always)]
        pub fn end(&mut self, stage: Stage) {
            let buf = &mut self.stages[stage as usize];
            if let Some(start) = buf.pending.take() {
                let elapsed = start.elapsed().as_nanos() as u64;
                if buf.count < MAX_SAMPLES {
                    buf.samples[buf.count] = elapsed;
                    buf.count += 1;
                }
            }
        }

        pub fn samples(&self, stage: Stage) -> &[u64] {
            let buf = &self.stages[stage as usize];
            &buf.samples[..buf.count]
        }

        pub fn reset(&mut self) {
            for buf in self.stages.iter_mut() {
                buf.count = 0;
            }
        }
    }

    impl Default for StageRecorder {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(not(feature = "record"))]
mod inner {
    use super::*;

    pub struct StageRecorder;

    impl StageRecorder {
        #[inline(always)]
        pub fn new() -> Self {
            Self
        }
        #[inline(always)]
        pub fn begin(&mut self, _stage: Stage) {}
        #[inline(always)]
        pub fn end(&mut self, _stage: Stage) {}
        #[inline(always)]
        pub fn samples(&self, _stage: Stage) -> &[u64] {
            &[]
        }
        #[inline(always)]
        pub fn reset(&mut self) {}
    }

    impl Default for StageRecorder {
        fn default() -> Self {
            Self
        }
    }
}

pub use inner::StageRecorder;
