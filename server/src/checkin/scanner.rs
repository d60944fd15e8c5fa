//! Debounce for a camera or handheld scanner that keeps decoding the same
//! code while it is held up.
//!
//! Once a token is dispatched, every further frame is dropped until the
//! verdict for it has been shown and acknowledged by the operator.

use super::normalize_payload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState<V> {
    /// Waiting for a code.
    Idle,
    /// A token is being verified.
    Dispatched { token: String },
    /// The verdict is on screen.
    Showing { token: String, verdict: V },
}

#[derive(Debug)]
pub struct ScanGate<V> {
    state: ScanState<V>,
    ignored: u64,
}

impl<V> Default for ScanGate<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ScanGate<V> {
    pub fn new() -> Self {
        Self {
            state: ScanState::Idle,
            ignored: 0,
        }
    }

    pub fn state(&self) -> &ScanState<V> {
        &self.state
    }

    /// Frames dropped since the gate was created.
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    /// Returns the token to verify, or `None` when the frame is dropped.
    pub fn offer(&mut self, payload: &str) -> Option<String> {
        if !matches!(self.state, ScanState::Idle) {
            self.ignored += 1;
            return None;
        }
        let token = normalize_payload(payload)?;
        self.state = ScanState::Dispatched {
            token: token.clone(),
        };
        Some(token)
    }

    /// Records the verdict for the dispatched token. Returns `false` when
    /// nothing was in flight.
    pub fn resolve(&mut self, verdict: V) -> bool {
        match std::mem::replace(&mut self.state, ScanState::Idle) {
            ScanState::Dispatched { token } => {
                self.state = ScanState::Showing { token, verdict };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Clears the verdict and re-arms the gate. Ignored while a token is
    /// still in flight.
    pub fn acknowledge(&mut self) -> Option<V> {
        match std::mem::replace(&mut self.state, ScanState::Idle) {
            ScanState::Showing { verdict, .. } => Some(verdict),
            other => {
                self.state = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_up_code_is_dispatched_once() {
        let mut gate: ScanGate<&str> = ScanGate::new();
        assert_eq!(gate.offer("https://x.test/ticket/TOKEN1").as_deref(), Some("TOKEN1"));
        for _ in 0..10 {
            assert_eq!(gate.offer("https://x.test/ticket/TOKEN1"), None);
        }
        assert_eq!(gate.ignored(), 10);
        assert_eq!(
            gate.state(),
            &ScanState::Dispatched {
                token: "TOKEN1".into()
            }
        );
    }

    #[test]
    fn frames_are_ignored_until_acknowledged() {
        let mut gate = ScanGate::new();
        gate.offer("TOKEN1");
        assert!(gate.resolve("verified"));
        assert_eq!(gate.offer("TOKEN2"), None);
        assert!(matches!(gate.state(), ScanState::Showing { verdict: "verified", .. }));

        assert_eq!(gate.acknowledge(), Some("verified"));
        assert_eq!(gate.state(), &ScanState::Idle);
        assert_eq!(gate.offer("TOKEN2").as_deref(), Some("TOKEN2"));
    }

    #[test]
    fn out_of_order_calls_are_no_ops() {
        let mut gate: ScanGate<u8> = ScanGate::new();
        assert!(!gate.resolve(1));
        assert_eq!(gate.acknowledge(), None);

        gate.offer("TOKEN1");
        assert_eq!(gate.acknowledge(), None);
        assert!(matches!(gate.state(), ScanState::Dispatched { .. }));
    }

    #[test]
    fn blank_frames_do_not_arm_the_gate() {
        let mut gate: ScanGate<u8> = ScanGate::new();
        assert_eq!(gate.offer("   "), None);
        assert_eq!(gate.state(), &ScanState::Idle);
        assert_eq!(gate.ignored(), 0);
    }
}
