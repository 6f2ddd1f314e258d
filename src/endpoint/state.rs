//! Endpoint lifecycle state

/// Endpoint lifecycle phase
///
/// `Created → Active → Closing → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointPhase {
    /// Lease held, relay not running yet
    Created,
    /// Relay running; attach and detach accepted
    Active,
    /// Close in progress
    Closing,
    /// Terminal
    Closed,
}

impl EndpointPhase {
    /// Whether subscription commands are accepted in this phase
    pub fn accepts_subscriptions(&self) -> bool {
        matches!(self, EndpointPhase::Active)
    }

    /// Whether the endpoint is closing or closed
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, EndpointPhase::Closing | EndpointPhase::Closed)
    }

    /// Whether moving to `next` is a valid transition
    pub fn can_transition_to(&self, next: EndpointPhase) -> bool {
        use EndpointPhase::*;

        matches!(
            (self, next),
            (Created, Active) | (Created, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }
}

impl std::fmt::Display for EndpointPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EndpointPhase::Created => "created",
            EndpointPhase::Active => "active",
            EndpointPhase::Closing => "closing",
            EndpointPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}
