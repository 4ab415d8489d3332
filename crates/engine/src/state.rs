// ---------------------------------------------------------------------------
// Loop lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the platform connection to authenticate.
    AwaitingReady,
    /// Cycling fetch, format, update, sleep.
    Running,
    /// The connection closed; no further cycles will run.
    Stopped,
}

/// Connection signals that drive lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    ConnectionReady,
    ConnectionClosed,
}

/// Pure transition function for the loop lifecycle.
///
/// Closure wins from every state and is terminal; readiness only matters
/// the first time.
pub fn next_state(current: LoopState, event: LoopEvent) -> LoopState {
    match (current, event) {
        (_, LoopEvent::ConnectionClosed) => LoopState::Stopped,
        (LoopState::AwaitingReady, LoopEvent::ConnectionReady) => LoopState::Running,
        (state, LoopEvent::ConnectionReady) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_starts_the_loop() {
        assert_eq!(
            next_state(LoopState::AwaitingReady, LoopEvent::ConnectionReady),
            LoopState::Running
        );
    }

    #[test]
    fn test_closed_stops_from_every_state() {
        for state in [
            LoopState::AwaitingReady,
            LoopState::Running,
            LoopState::Stopped,
        ] {
            assert_eq!(
                next_state(state, LoopEvent::ConnectionClosed),
                LoopState::Stopped
            );
        }
    }

    #[test]
    fn test_ready_while_running_is_a_noop() {
        assert_eq!(
            next_state(LoopState::Running, LoopEvent::ConnectionReady),
            LoopState::Running
        );
    }

    #[test]
    fn test_stopped_is_terminal() {
        assert_eq!(
            next_state(LoopState::Stopped, LoopEvent::ConnectionReady),
            LoopState::Stopped
        );
    }
}
