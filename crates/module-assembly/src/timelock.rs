//! # Timelock Simulator
//!
//! Drives a privileged call to completion. Immediate outcomes pass through
//! untouched. Deferred outcomes advance the simulated clock to one second past
//! the bound and are re-submitted by the designated executor.

use crate::domain::entities::{CallOutcome, DeferredCall};
use crate::domain::value_objects::{Address, Bytes};
use crate::errors::TimelockError;
use crate::ports::outbound::{Clock, DeferredExecution};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// How a privileged call was completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The call ran when submitted.
    Immediate(Bytes),
    /// The call was deferred and has now been executed.
    Executed {
        /// The proposal that was executed.
        call: DeferredCall,
        /// Return data of the execution.
        result: Bytes,
        /// Simulated time of execution.
        executed_at: u64,
    },
}

impl Resolution {
    /// Return data regardless of path.
    #[must_use]
    pub fn into_result(self) -> Bytes {
        match self {
            Self::Immediate(result) | Self::Executed { result, .. } => result,
        }
    }

    /// True if the call went through the timelock.
    #[must_use]
    pub const fn was_deferred(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}

/// Resolves [`CallOutcome`]s against a clock and an executing contract.
pub struct TimelockSimulator<C: Clock, E: DeferredExecution> {
    clock: Arc<C>,
    execution: Arc<E>,
    executor: Address,
}

impl<C: Clock, E: DeferredExecution> TimelockSimulator<C, E> {
    /// Simulator executing as `executor`.
    pub fn new(clock: Arc<C>, execution: Arc<E>, executor: Address) -> Self {
        Self {
            clock,
            execution,
            executor,
        }
    }

    /// Identity deferred calls are executed as.
    pub fn executor(&self) -> Address {
        self.executor
    }

    /// Complete a submitted call.
    ///
    /// # Errors
    ///
    /// - [`TimelockError::TimeOverflow`] when no time lies past the bound
    /// - Whatever the executing contract rejects
    #[instrument(skip(self, outcome), fields(executor = ?self.executor))]
    pub async fn resolve(&self, outcome: CallOutcome) -> Result<Resolution, TimelockError> {
        let call = match outcome {
            CallOutcome::Immediate(result) => {
                debug!("privileged call completed immediately");
                return Ok(Resolution::Immediate(result));
            }
            CallOutcome::Deferred(call) => call,
        };

        let earliest = call.earliest_execution_time;
        let target_time = earliest
            .checked_add(1)
            .ok_or(TimelockError::TimeOverflow {
                base: earliest,
                offset: 1,
            })?;
        let executed_at = self.clock.advance_to(target_time).await;
        debug!(
            earliest = call.earliest_execution_time,
            now = executed_at,
            "clock advanced past timelock bound"
        );

        let result = self
            .execution
            .execute_deferred(self.executor, call.originating_contract, &call.encoded_call)
            .await?;

        info!(
            target = ?call.originating_contract,
            executed_at,
            "deferred call resolved"
        );
        Ok(Resolution::Executed {
            call,
            result,
            executed_at,
        })
    }

    /// Await a privileged call and complete it.
    ///
    /// # Errors
    ///
    /// Propagates the submission error or the execution error.
    pub async fn run<Fut>(&self, submit: Fut) -> Result<Resolution, TimelockError>
    where
        Fut: Future<Output = Result<CallOutcome, TimelockError>>,
    {
        let outcome = submit.await?;
        self.resolve(outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ControllerConfig, InMemoryController, SimulatedClock};
    use crate::domain::value_objects::U256;
    use crate::ports::outbound::CompositeRegistry;

    const AUTHORITY: Address = Address::repeat_byte(0xa1);
    const EXECUTOR: Address = Address::repeat_byte(0xe1);
    const CONTROLLER: Address = Address::repeat_byte(0xc1);

    fn setup(
        delay_secs: u64,
    ) -> (
        Arc<SimulatedClock>,
        Arc<InMemoryController>,
        TimelockSimulator<SimulatedClock, InMemoryController>,
    ) {
        let clock = Arc::new(SimulatedClock::starting_at(10_000));
        let controller = Arc::new(InMemoryController::new(
            ControllerConfig {
                address: CONTROLLER,
                authority: AUTHORITY,
                executor: EXECUTOR,
                delay_secs,
            },
            Arc::clone(&clock),
        ));
        let simulator =
            TimelockSimulator::new(Arc::clone(&clock), Arc::clone(&controller), EXECUTOR);
        (clock, controller, simulator)
    }

    #[tokio::test]
    async fn test_immediate_passes_through_without_time_advance() {
        let (clock, _, simulator) = setup(0);
        let payload = Bytes::from_slice(&[1, 2, 3]);

        let resolution = simulator
            .resolve(CallOutcome::Immediate(payload.clone()))
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Immediate(payload));
        assert!(!resolution.was_deferred());
        assert_eq!(clock.current(), 10_000);
    }

    #[tokio::test]
    async fn test_deferred_call_executes_one_second_past_bound() {
        let (clock, controller, simulator) = setup(3_600);
        let outcome = controller
            .set_setting(AUTHORITY, "fee", U256::from(42))
            .unwrap();

        let resolution = simulator.resolve(outcome).await.unwrap();

        match resolution {
            Resolution::Executed {
                call, executed_at, ..
            } => {
                assert_eq!(call.earliest_execution_time, 13_600);
                assert_eq!(executed_at, 13_601);
            }
            Resolution::Immediate(_) => panic!("expected the timelock path"),
        }
        assert_eq!(clock.current(), 13_601);
        assert_eq!(controller.setting("fee"), Some(U256::from(42)));
    }

    #[tokio::test]
    async fn test_clock_never_moves_backwards() {
        let (clock, controller, simulator) = setup(60);
        let outcome = controller
            .set_setting(AUTHORITY, "fee", U256::from(1))
            .unwrap();
        clock.advance_by(1_000);

        let resolution = simulator.resolve(outcome).await.unwrap();
        match resolution {
            Resolution::Executed { executed_at, .. } => assert_eq!(executed_at, 11_000),
            Resolution::Immediate(_) => panic!("expected the timelock path"),
        }
        assert_eq!(clock.current(), 11_000);
    }

    #[tokio::test]
    async fn test_bound_at_end_of_time_is_not_executed() {
        let (clock, controller, simulator) = setup(60);
        let call = DeferredCall {
            encoded_call: Bytes::from_slice(&[0; 4]),
            earliest_execution_time: u64::MAX,
            originating_contract: CONTROLLER,
        };

        let err = simulator
            .resolve(CallOutcome::Deferred(call))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TimelockError::TimeOverflow {
                base: u64::MAX,
                offset: 1
            }
        );
        assert_eq!(clock.current(), 10_000);
        assert_eq!(controller.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_executor_is_rejected() {
        let (_, controller, _) = setup(60);
        let clock = Arc::new(SimulatedClock::starting_at(10_000));
        let stranger = Address::repeat_byte(0x99);
        let simulator = TimelockSimulator::new(clock, Arc::clone(&controller), stranger);

        let outcome = controller
            .set_setting(AUTHORITY, "fee", U256::from(1))
            .unwrap();
        let err = simulator.resolve(outcome).await.unwrap_err();
        assert_eq!(
            err,
            TimelockError::UnauthorizedExecutor {
                caller: stranger,
                expected: EXECUTOR
            }
        );
        assert_eq!(controller.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_run_propagates_submission_error() {
        let (_, controller, simulator) = setup(60);
        let stranger = Address::repeat_byte(0x99);

        let err = simulator
            .run(controller.register_composite(stranger, Address::repeat_byte(7)))
            .await
            .unwrap_err();
        assert!(matches!(err, TimelockError::UnauthorizedAuthority { .. }));
    }

    #[tokio::test]
    async fn test_run_registers_composite() {
        let (_, controller, simulator) = setup(60);
        let composite = Address::repeat_byte(7);

        let resolution = simulator
            .run(controller.register_composite(AUTHORITY, composite))
            .await
            .unwrap();
        assert!(resolution.was_deferred());
        assert!(controller.is_registered(composite));
        assert_eq!(controller.pending_count(), 0);
    }
}
