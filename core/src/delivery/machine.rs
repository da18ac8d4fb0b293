//! Delivery state machine
//!
//! Pure transition function for the retry-with-fallback loop. The
//! orchestrator performs the side effect that belongs to each state and
//! feeds the outcome back in as a `DeliveryEvent`; nothing here touches the
//! network.
//!
//! Retry accounting after a failed attempt at counter `r`:
//! - `r == max_retries / 2` escalates (prefer fallback) before continuing
//! - `r < max_retries` re-checks the connection with `r + 1`
//! - otherwise the budget is exhausted

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Verify the fabric connection and pick a transport
    ConnectionCheck,
    AttemptDirect,
    /// Inline send over signaling; `after_direct_failure` marks the
    /// immediate fallback inside a failed direct iteration
    AttemptSignaling { after_direct_failure: bool },
    /// Switch the recipient to fallback mode
    Escalate,
    Done,
    Exhausted,
    Disconnected,
    /// Signaling send ended with an error no retry can fix
    Refused,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Done
                | DeliveryState::Exhausted
                | DeliveryState::Disconnected
                | DeliveryState::Refused
        )
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryState::ConnectionCheck => write!(f, "ConnectionCheck"),
            DeliveryState::AttemptDirect => write!(f, "AttemptDirect"),
            DeliveryState::AttemptSignaling {
                after_direct_failure: false,
            } => write!(f, "AttemptSignaling"),
            DeliveryState::AttemptSignaling {
                after_direct_failure: true,
            } => write!(f, "AttemptSignaling(fallback)"),
            DeliveryState::Escalate => write!(f, "Escalate"),
            DeliveryState::Done => write!(f, "Done"),
            DeliveryState::Exhausted => write!(f, "Exhausted"),
            DeliveryState::Disconnected => write!(f, "Disconnected"),
            DeliveryState::Refused => write!(f, "Refused"),
        }
    }
}

/// Outcome of the side effect performed in a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    ConnectionChecked { usable: bool, direct_capable: bool },
    DirectSent,
    DirectFailed,
    SignalingSent,
    SignalingFailed,
    SignalingRefused,
    Escalated,
}

/// Fixed inputs of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Payload is below the inline ceiling and signaling fallback is allowed
    pub inline_eligible: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, inline_eligible: bool) -> Self {
        Self {
            max_retries,
            inline_eligible,
        }
    }

    pub fn escalation_point(&self) -> u32 {
        self.max_retries / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub state: DeliveryState,
    pub retry: u32,
}

impl Step {
    fn stay(state: DeliveryState, retry: u32) -> Self {
        Self { state, retry }
    }
}

pub fn transition(
    state: DeliveryState,
    event: DeliveryEvent,
    retry: u32,
    policy: &RetryPolicy,
) -> Step {
    use DeliveryEvent as E;
    use DeliveryState as S;

    match (state, event) {
        (S::ConnectionCheck, E::ConnectionChecked { usable: false, .. }) => {
            Step::stay(S::Disconnected, retry)
        }
        (
            S::ConnectionCheck,
            E::ConnectionChecked {
                usable: true,
                direct_capable,
            },
        ) => {
            if !direct_capable && policy.inline_eligible {
                Step::stay(
                    S::AttemptSignaling {
                        after_direct_failure: false,
                    },
                    retry,
                )
            } else {
                Step::stay(S::AttemptDirect, retry)
            }
        }

        (S::AttemptDirect, E::DirectSent) => Step::stay(S::Done, retry),
        (S::AttemptDirect, E::DirectFailed) => {
            if policy.inline_eligible {
                Step::stay(
                    S::AttemptSignaling {
                        after_direct_failure: true,
                    },
                    retry,
                )
            } else {
                after_failure(retry, policy)
            }
        }

        (S::AttemptSignaling { .. }, E::SignalingSent) => Step::stay(S::Done, retry),
        (S::AttemptSignaling { .. }, E::SignalingRefused) => Step::stay(S::Refused, retry),
        (S::AttemptSignaling { .. }, E::SignalingFailed) => after_failure(retry, policy),

        (S::Escalate, E::Escalated) => advance(retry, policy),

        // event does not belong to this state
        (state, _) => Step::stay(state, retry),
    }
}

fn after_failure(retry: u32, policy: &RetryPolicy) -> Step {
    if retry == policy.escalation_point() {
        Step::stay(DeliveryState::Escalate, retry)
    } else {
        advance(retry, policy)
    }
}

fn advance(retry: u32, policy: &RetryPolicy) -> Step {
    if retry < policy.max_retries {
        Step {
            state: DeliveryState::ConnectionCheck,
            retry: retry + 1,
        }
    } else {
        Step::stay(DeliveryState::Exhausted, retry)
    }
}
