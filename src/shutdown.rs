use std::time::Duration;

use tracing::debug;

use crate::Result;
use crate::client::DaikinClient;
use crate::types::{ControlCommand, Power, StatusSnapshot};

type TransitionCallback = Box<dyn Fn(&ShutdownState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPolicy {
    pub max_attempts: u32,
    /// The adapter takes a few seconds to reflect a power change in its
    /// status endpoint.
    pub settle_delay: Duration,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            settle_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Attempting { attempt: u32 },
    Verifying { attempt: u32 },
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

impl ShutdownState {
    pub fn initial() -> Self {
        ShutdownState::Attempting { attempt: 1 }
    }

    /// Power-off was sent and the settle delay has elapsed.
    pub fn power_off_sent(self) -> Self {
        match self {
            ShutdownState::Attempting { attempt } => ShutdownState::Verifying { attempt },
            other => other,
        }
    }

    /// Status was read back; `off` is whether it reported power OFF.
    pub fn verified(self, off: bool, max_attempts: u32) -> Self {
        match self {
            ShutdownState::Verifying { attempt } if off => {
                ShutdownState::Succeeded { attempts: attempt }
            }
            ShutdownState::Verifying { attempt } if attempt >= max_attempts => {
                ShutdownState::Failed { attempts: attempt }
            }
            ShutdownState::Verifying { attempt } => ShutdownState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Verified { attempts: u32 },
    Unverified { attempts: u32 },
}

/// What the shutdown loop needs from a device.
#[allow(async_fn_in_trait)]
pub trait PowerSwitch {
    /// Returns whether the device acknowledged the command.
    async fn power_off(&self) -> Result<bool>;
    async fn power_status(&self) -> Result<StatusSnapshot>;
}

impl PowerSwitch for DaikinClient {
    async fn power_off(&self) -> Result<bool> {
        self.set_state(&ControlCommand::new().power(Power::Off)).await
    }

    async fn power_status(&self) -> Result<StatusSnapshot> {
        self.status().await
    }
}

/// Power off, then re-read status until the device confirms it.
pub struct VerifiedShutdown {
    policy: ShutdownPolicy,
    callbacks: Vec<TransitionCallback>,
}

impl VerifiedShutdown {
    pub fn new(policy: ShutdownPolicy) -> Self {
        Self {
            policy,
            callbacks: Vec::new(),
        }
    }

    pub fn on_transition(mut self, f: impl Fn(&ShutdownState) + Send + Sync + 'static) -> Self {
        self.callbacks.push(Box::new(f));
        self
    }

    /// Transport errors are only returned when the device's client surfaces
    /// them; an unverified shutdown is an `Ok` outcome.
    pub async fn run<S: PowerSwitch>(&self, device: &S) -> Result<ShutdownOutcome> {
        let mut state = ShutdownState::initial();
        loop {
            debug!(?state, "shutdown transition");
            for cb in &self.callbacks {
                cb(&state);
            }

            state = match state {
                ShutdownState::Attempting { attempt } => {
                    let acked = device.power_off().await?;
                    debug!(attempt, acked, "power off sent");
                    tokio::time::sleep(self.policy.settle_delay).await;
                    state.power_off_sent()
                }
                ShutdownState::Verifying { .. } => {
                    let status = device.power_status().await?;
                    state.verified(status.power_is_off(), self.policy.max_attempts)
                }
                ShutdownState::Succeeded { attempts } => {
                    return Ok(ShutdownOutcome::Verified { attempts });
                }
                ShutdownState::Failed { attempts } => {
                    return Ok(ShutdownOutcome::Unverified { attempts });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Fields;
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};

    struct FakeSwitch {
        off_from_attempt: Option<u32>,
        power_offs: Cell<u32>,
        reads: Cell<u32>,
    }

    impl FakeSwitch {
        fn new(off_from_attempt: Option<u32>) -> Self {
            Self {
                off_from_attempt,
                power_offs: Cell::new(0),
                reads: Cell::new(0),
            }
        }
    }

    impl PowerSwitch for FakeSwitch {
        async fn power_off(&self) -> Result<bool> {
            self.power_offs.set(self.power_offs.get() + 1);
            Ok(true)
        }

        async fn power_status(&self) -> Result<StatusSnapshot> {
            self.reads.set(self.reads.get() + 1);
            let off = self
                .off_from_attempt
                .is_some_and(|n| self.power_offs.get() >= n);
            let code = if off { "0" } else { "1" };
            Ok(StatusSnapshot::from_raw(
                Fields::new(),
                Fields::from([("pow".to_string(), code.to_string())]),
            ))
        }
    }

    #[test]
    fn transitions() {
        let s = ShutdownState::initial();
        assert_eq!(s, ShutdownState::Attempting { attempt: 1 });
        let s = s.power_off_sent();
        assert_eq!(s, ShutdownState::Verifying { attempt: 1 });
        assert_eq!(s.verified(true, 5), ShutdownState::Succeeded { attempts: 1 });
        assert_eq!(s.verified(false, 5), ShutdownState::Attempting { attempt: 2 });
        assert_eq!(
            ShutdownState::Verifying { attempt: 5 }.verified(false, 5),
            ShutdownState::Failed { attempts: 5 }
        );
    }

    #[test]
    fn terminal_states_do_not_move() {
        let done = ShutdownState::Succeeded { attempts: 2 };
        assert_eq!(done.power_off_sent(), done);
        assert_eq!(done.verified(false, 5), done);
    }

    #[tokio::test(start_paused = true)]
    async fn verified_after_first_attempt() {
        let device = FakeSwitch::new(Some(1));
        let start = tokio::time::Instant::now();

        let outcome = VerifiedShutdown::new(ShutdownPolicy::default())
            .run(&device)
            .await
            .unwrap();

        assert_eq!(outcome, ShutdownOutcome::Verified { attempts: 1 });
        assert_eq!(device.power_offs.get(), 1);
        assert_eq!(device.reads.get(), 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn verified_on_third_attempt() {
        let device = FakeSwitch::new(Some(3));
        let outcome = VerifiedShutdown::new(ShutdownPolicy::default())
            .run(&device)
            .await
            .unwrap();
        assert_eq!(outcome, ShutdownOutcome::Verified { attempts: 3 });
        assert_eq!(device.power_offs.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let device = FakeSwitch::new(None);
        let start = tokio::time::Instant::now();

        let outcome = VerifiedShutdown::new(ShutdownPolicy::default())
            .run(&device)
            .await
            .unwrap();

        assert_eq!(outcome, ShutdownOutcome::Unverified { attempts: 5 });
        assert_eq!(device.power_offs.get(), 5);
        assert_eq!(device.reads.get(), 5);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(25) && elapsed < Duration::from_secs(26));
    }

    #[tokio::test(start_paused = true)]
    async fn policy_bounds_are_configurable() {
        let device = FakeSwitch::new(None);
        let policy = ShutdownPolicy {
            max_attempts: 2,
            settle_delay: Duration::from_millis(100),
        };
        let start = tokio::time::Instant::now();

        let outcome = VerifiedShutdown::new(policy).run(&device).await.unwrap();

        assert_eq!(outcome, ShutdownOutcome::Unverified { attempts: 2 });
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn callbacks_see_every_state() {
        let seen: Arc<Mutex<Vec<ShutdownState>>> = Arc::new(Mutex::new(vec![]));
        let seen_clone = seen.clone();
        let device = FakeSwitch::new(Some(2));

        VerifiedShutdown::new(ShutdownPolicy::default())
            .on_transition(move |state| seen_clone.lock().unwrap().push(*state))
            .run(&device)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ShutdownState::Attempting { attempt: 1 },
                ShutdownState::Verifying { attempt: 1 },
                ShutdownState::Attempting { attempt: 2 },
                ShutdownState::Verifying { attempt: 2 },
                ShutdownState::Succeeded { attempts: 2 },
            ]
        );
    }
}
