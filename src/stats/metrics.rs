//! Transport and session counters

/// Signaling socket counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Wire messages accepted for sending
    pub messages_sent: u64,
    /// Wire messages decoded from the socket
    pub messages_received: u64,
    /// Automatic reconnect attempts scheduled
    pub reconnect_attempts: u64,
}

/// Coordination-level counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinationStats {
    /// Sessions created since startup
    pub sessions_created: u64,
    /// Sessions that ended in error
    pub sessions_failed: u64,
    /// Negotiation payloads relayed to the media backend
    pub signals_relayed: u64,
}
