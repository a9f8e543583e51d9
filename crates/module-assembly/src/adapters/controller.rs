//! # Timelocked Controller Adapter
//!
//! In-memory central controller guarded by a timelock. Privileged calls
//! from the authority run immediately when the delay is zero and are
//! otherwise recorded as [`DeferredCall`]s that only the designated executor
//! may complete once the simulated clock is strictly past the bound.

use crate::adapters::clock::SimulatedClock;
use crate::domain::entities::{CallOutcome, DeferredCall, DeferredCallStatus};
use crate::domain::services::{
    address_word, compute_fingerprint, decode_call, encode_call, keccak256, uint_word,
};
use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use crate::errors::TimelockError;
use crate::ports::outbound::{CompositeRegistry, DeferredExecution};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `setSetting(bytes32,uint256)`
pub const SET_SETTING_SIGNATURE: &str = "setSetting(bytes32,uint256)";
/// `registerComposite(address)`
pub const REGISTER_COMPOSITE_SIGNATURE: &str = "registerComposite(address)";

/// Identities and delay of a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Controller's own address (the originating contract of its deferred calls).
    pub address: Address,
    /// Only identity allowed to propose privileged calls.
    pub authority: Address,
    /// Only identity allowed to execute deferred calls.
    pub executor: Address,
    /// Seconds between proposal and the exclusive execution bound. Zero runs calls immediately.
    pub delay_secs: u64,
}

#[derive(Debug, Default)]
struct ControllerState {
    settings: HashMap<Hash, U256>,
    composites: Vec<Address>,
    pending: HashMap<Hash, DeferredCall>,
    executed: HashSet<Hash>,
}

/// In-memory timelocked controller.
#[derive(Debug)]
pub struct InMemoryController {
    config: ControllerConfig,
    clock: Arc<SimulatedClock>,
    state: RwLock<ControllerState>,
}

impl InMemoryController {
    /// Controller reading time from `clock`.
    #[must_use]
    pub fn new(config: ControllerConfig, clock: Arc<SimulatedClock>) -> Self {
        Self {
            config,
            clock,
            state: RwLock::new(ControllerState::default()),
        }
    }

    /// Controller address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.config.address
    }

    /// Key under which a named setting is stored.
    #[must_use]
    pub fn setting_key(name: &str) -> Hash {
        keccak256(name.as_bytes())
    }

    /// Propose changing a setting.
    ///
    /// # Errors
    ///
    /// - [`TimelockError::UnauthorizedAuthority`] if `caller` is not the authority
    /// - [`TimelockError::TimeOverflow`] if the delay pushes the bound past `u64::MAX`
    pub fn set_setting(
        &self,
        caller: Address,
        name: &str,
        value: U256,
    ) -> Result<CallOutcome, TimelockError> {
        let key = Self::setting_key(name);
        let call = encode_call(
            compute_fingerprint(SET_SETTING_SIGNATURE),
            &[*key.as_bytes(), uint_word(value)],
        );
        self.submit(caller, call)
    }

    /// Current value of a setting.
    #[must_use]
    pub fn setting(&self, name: &str) -> Option<U256> {
        self.state
            .read()
            .settings
            .get(&Self::setting_key(name))
            .copied()
    }

    /// True once `composite` has been attached.
    #[must_use]
    pub fn is_registered(&self, composite: Address) -> bool {
        self.state.read().composites.contains(&composite)
    }

    /// Lifecycle of a deferred call this controller recorded.
    ///
    /// Returns `None` for calls it never proposed.
    #[must_use]
    pub fn status(&self, call: &DeferredCall) -> Option<DeferredCallStatus> {
        let id = call.id();
        let state = self.state.read();
        if state.executed.contains(&id) {
            Some(DeferredCallStatus::Executed)
        } else if state.pending.contains_key(&id) {
            Some(call.status(self.clock.current(), false))
        } else {
            None
        }
    }

    /// Number of proposals not yet executed.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.read().pending.len()
    }

    fn submit(&self, caller: Address, encoded_call: Bytes) -> Result<CallOutcome, TimelockError> {
        if caller != self.config.authority {
            warn!(caller = ?caller, "privileged call rejected: caller is not authority");
            return Err(TimelockError::UnauthorizedAuthority {
                caller,
                expected: self.config.authority,
            });
        }

        if self.config.delay_secs == 0 {
            let result = self.dispatch(&encoded_call)?;
            return Ok(CallOutcome::Immediate(result));
        }

        let now = self.clock.current();
        let delay = self.config.delay_secs;
        let earliest_execution_time = now
            .checked_add(delay)
            .ok_or(TimelockError::TimeOverflow {
                base: now,
                offset: delay,
            })?;
        let call = DeferredCall {
            encoded_call,
            earliest_execution_time,
            originating_contract: self.config.address,
        };
        info!(
            controller = ?self.config.address,
            earliest = call.earliest_execution_time,
            "privileged call deferred"
        );
        self.state.write().pending.insert(call.id(), call.clone());
        Ok(CallOutcome::Deferred(call))
    }

    fn dispatch(&self, encoded_call: &Bytes) -> Result<Bytes, TimelockError> {
        let (fp, words) = decode_call(encoded_call.as_slice())
            .ok_or_else(|| TimelockError::MalformedCall("payload is not word aligned".into()))?;

        let mut state = self.state.write();
        if fp == compute_fingerprint(SET_SETTING_SIGNATURE) {
            let [key, value] = words.as_slice() else {
                return Err(TimelockError::MalformedCall(format!(
                    "{SET_SETTING_SIGNATURE} takes 2 words, got {}",
                    words.len()
                )));
            };
            let value = U256::from_big_endian(value);
            state.settings.insert(Hash::new(*key), value);
            debug!(value = %value, "setting updated");
            Ok(Bytes::new())
        } else if fp == compute_fingerprint(REGISTER_COMPOSITE_SIGNATURE) {
            let [word] = words.as_slice() else {
                return Err(TimelockError::MalformedCall(format!(
                    "{REGISTER_COMPOSITE_SIGNATURE} takes 1 word, got {}",
                    words.len()
                )));
            };
            let composite = Address::from_slice(&word[12..])
                .ok_or_else(|| TimelockError::MalformedCall("bad address word".into()))?;
            if !state.composites.contains(&composite) {
                state.composites.push(composite);
            }
            debug!(composite = ?composite, "composite registered");
            Ok(Bytes::new())
        } else {
            Err(TimelockError::MalformedCall(format!("unknown function {fp}")))
        }
    }
}

#[async_trait]
impl DeferredExecution for InMemoryController {
    async fn execute_deferred(
        &self,
        executor: Address,
        target: Address,
        encoded_call: &Bytes,
    ) -> Result<Bytes, TimelockError> {
        if target != self.config.address {
            return Err(TimelockError::UnknownTarget(target));
        }
        if executor != self.config.executor {
            return Err(TimelockError::UnauthorizedExecutor {
                caller: executor,
                expected: self.config.executor,
            });
        }

        let now = self.clock.current();
        let call = {
            let mut state = self.state.write();
            let (id, call) = state
                .pending
                .iter()
                .filter(|(_, call)| call.encoded_call == *encoded_call)
                .min_by_key(|(_, call)| call.earliest_execution_time)
                .map(|(id, call)| (*id, call.clone()))
                .ok_or(TimelockError::UnknownDeferredCall)?;

            if !call.is_executable_at(now) {
                return Err(TimelockError::PrematureExecution {
                    now,
                    earliest: call.earliest_execution_time,
                });
            }
            state.pending.remove(&id);
            state.executed.insert(id);
            call
        };

        info!(
            controller = ?self.config.address,
            now,
            earliest = call.earliest_execution_time,
            "deferred call executed"
        );
        self.dispatch(&call.encoded_call)
    }
}

#[async_trait]
impl CompositeRegistry for InMemoryController {
    async fn register_composite(
        &self,
        caller: Address,
        composite: Address,
    ) -> Result<CallOutcome, TimelockError> {
        let call = encode_call(
            compute_fingerprint(REGISTER_COMPOSITE_SIGNATURE),
            &[address_word(composite)],
        );
        self.submit(caller, call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHORITY: Address = Address::repeat_byte(0xa1);
    const EXECUTOR: Address = Address::repeat_byte(0xe1);
    const CONTROLLER: Address = Address::repeat_byte(0xc1);

    fn controller(delay_secs: u64) -> (Arc<SimulatedClock>, InMemoryController) {
        let clock = Arc::new(SimulatedClock::starting_at(1_000));
        let controller = InMemoryController::new(
            ControllerConfig {
                address: CONTROLLER,
                authority: AUTHORITY,
                executor: EXECUTOR,
                delay_secs,
            },
            Arc::clone(&clock),
        );
        (clock, controller)
    }

    fn deferred(outcome: CallOutcome) -> DeferredCall {
        match outcome {
            CallOutcome::Deferred(call) => call,
            CallOutcome::Immediate(_) => panic!("expected a deferred call"),
        }
    }

    #[test]
    fn test_zero_delay_applies_immediately() {
        let (_, controller) = controller(0);
        let outcome = controller
            .set_setting(AUTHORITY, "fee", U256::from(5))
            .unwrap();
        assert_eq!(outcome, CallOutcome::Immediate(Bytes::new()));
        assert_eq!(controller.setting("fee"), Some(U256::from(5)));
    }

    #[test]
    fn test_non_authority_rejected() {
        let (_, controller) = controller(60);
        let err = controller
            .set_setting(EXECUTOR, "fee", U256::from(5))
            .unwrap_err();
        assert_eq!(
            err,
            TimelockError::UnauthorizedAuthority {
                caller: EXECUTOR,
                expected: AUTHORITY
            }
        );
        assert_eq!(controller.pending_count(), 0);
    }

    #[test]
    fn test_delay_records_proposal() {
        let (_, controller) = controller(60);
        let call = deferred(controller.set_setting(AUTHORITY, "fee", U256::from(5)).unwrap());
        assert_eq!(call.earliest_execution_time, 1_060);
        assert_eq!(call.originating_contract, CONTROLLER);
        assert_eq!(controller.setting("fee"), None);
        assert_eq!(controller.status(&call), Some(DeferredCallStatus::Proposed));
    }

    #[test]
    fn test_bound_past_end_of_time_rejected() {
        let clock = Arc::new(SimulatedClock::starting_at(u64::MAX - 10));
        let controller = InMemoryController::new(
            ControllerConfig {
                address: CONTROLLER,
                authority: AUTHORITY,
                executor: EXECUTOR,
                delay_secs: 100,
            },
            clock,
        );

        let err = controller
            .set_setting(AUTHORITY, "fee", U256::from(5))
            .unwrap_err();
        assert_eq!(
            err,
            TimelockError::TimeOverflow {
                base: u64::MAX - 10,
                offset: 100
            }
        );
        assert_eq!(controller.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_exclusive_time_bound() {
        let (clock, controller) = controller(60);
        let call = deferred(controller.set_setting(AUTHORITY, "fee", U256::from(5)).unwrap());

        clock.advance_to_sync(call.earliest_execution_time);
        let err = controller
            .execute_deferred(EXECUTOR, CONTROLLER, &call.encoded_call)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TimelockError::PrematureExecution {
                now: 1_060,
                earliest: 1_060
            }
        );

        clock.advance_by(1);
        assert_eq!(controller.status(&call), Some(DeferredCallStatus::Executable));
        controller
            .execute_deferred(EXECUTOR, CONTROLLER, &call.encoded_call)
            .await
            .unwrap();
        assert_eq!(controller.setting("fee"), Some(U256::from(5)));
        assert_eq!(controller.status(&call), Some(DeferredCallStatus::Executed));
    }

    #[tokio::test]
    async fn test_deferred_call_consumed_once() {
        let (clock, controller) = controller(10);
        let call = deferred(controller.set_setting(AUTHORITY, "fee", U256::from(1)).unwrap());
        clock.advance_by(11);

        controller
            .execute_deferred(EXECUTOR, CONTROLLER, &call.encoded_call)
            .await
            .unwrap();
        let err = controller
            .execute_deferred(EXECUTOR, CONTROLLER, &call.encoded_call)
            .await
            .unwrap_err();
        assert_eq!(err, TimelockError::UnknownDeferredCall);
    }

    #[tokio::test]
    async fn test_wrong_executor_and_target() {
        let (clock, controller) = controller(10);
        let call = deferred(controller.set_setting(AUTHORITY, "fee", U256::from(1)).unwrap());
        clock.advance_by(11);

        let err = controller
            .execute_deferred(AUTHORITY, CONTROLLER, &call.encoded_call)
            .await
            .unwrap_err();
        assert!(matches!(err, TimelockError::UnauthorizedExecutor { .. }));

        let err = controller
            .execute_deferred(EXECUTOR, Address::repeat_byte(0x99), &call.encoded_call)
            .await
            .unwrap_err();
        assert_eq!(err, TimelockError::UnknownTarget(Address::repeat_byte(0x99)));

        assert_eq!(controller.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_register_composite_deferred() {
        let (clock, controller) = controller(30);
        let composite = Address::repeat_byte(0x77);
        let call = deferred(controller.register_composite(AUTHORITY, composite).await.unwrap());
        assert!(!controller.is_registered(composite));

        clock.advance_to_sync(call.earliest_execution_time + 1);
        controller
            .execute_deferred(EXECUTOR, CONTROLLER, &call.encoded_call)
            .await
            .unwrap();
        assert!(controller.is_registered(composite));
    }

    #[test]
    fn test_unknown_function_rejected() {
        let (_, controller) = controller(0);
        let err = controller
            .submit(AUTHORITY, Bytes::from_slice(&[0xde, 0xad, 0xbe, 0xef]))
            .unwrap_err();
        assert!(matches!(err, TimelockError::MalformedCall(_)));
    }
}
