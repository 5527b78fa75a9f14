use super::{RunSummary, StopReason};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Stage {
    /// About to call the model, either for the first time or with a fresh
    /// tool result.
    #[default]
    Dispatching,
    Settled(StopReason),
}

/// State of a single run. Created when the run starts and dropped when it
/// ends, so the iteration count never carries over to the next run.
#[derive(Debug, Default)]
pub struct LoopRunState {
    iteration_count: usize,
    stage: Stage,
}

impl LoopRunState {
    #[inline]
    pub fn is_dispatching(&self) -> bool {
        self.stage == Stage::Dispatching
    }

    /// Counts one more model call. Returns `false` without counting when
    /// `cap` calls have been made already.
    #[inline]
    pub fn begin_iteration(&mut self, cap: usize) -> bool {
        if self.iteration_count >= cap {
            return false;
        }
        self.iteration_count += 1;
        true
    }

    #[inline]
    pub fn settle(&mut self, reason: StopReason) {
        debug_assert!(self.is_dispatching(), "run is already settled");
        self.stage = Stage::Settled(reason);
    }

    pub fn into_summary(self) -> RunSummary {
        let stop_reason = match self.stage {
            Stage::Settled(reason) => reason,
            Stage::Dispatching => StopReason::IterationCap,
        };
        RunSummary {
            model_calls: self.iteration_count,
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_cap() {
        let mut state = LoopRunState::default();
        for _ in 0..3 {
            assert!(state.begin_iteration(3));
        }
        assert!(!state.begin_iteration(3));
        assert!(state.is_dispatching());
        assert_eq!(
            state.into_summary(),
            RunSummary {
                model_calls: 3,
                stop_reason: StopReason::IterationCap,
            }
        );
    }

    #[test]
    fn test_settle() {
        let mut state = LoopRunState::default();
        assert!(state.begin_iteration(6));
        state.settle(StopReason::Answered);
        assert!(!state.is_dispatching());
        assert_eq!(
            state.into_summary(),
            RunSummary {
                model_calls: 1,
                stop_reason: StopReason::Answered,
            }
        );
    }
}
