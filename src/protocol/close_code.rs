//! WebSocket close status codes per RFC 6455 Section 7.4.
//!
//! One canonical representation for the whole crate: transport-native codes
//! are converted to [`CloseCode`] exactly once, at the transport boundary.

// ============================================================================
// CloseCode
// ============================================================================

/// Close status code carried in a Close frame.
///
/// `from_u16` is total: any numeric code is representable, and codes outside
/// the protocol-defined range are accepted by receivers without implied
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection completed its purpose.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is shutting down or leaving.
    GoingAway,
    /// Protocol error (1002). Peer sent a malformed or unexpected frame.
    ProtocolError,
    /// Unsupported data (1003). Peer sent a data type it cannot accept.
    UnsupportedData,
    /// No status present (1005). Receive-only: the Close frame had no code.
    NoStatus,
    /// Abnormal closure (1006). Receive-only: the transport severed without
    /// a Close frame.
    Abnormal,
    /// Invalid payload (1007). Message data inconsistent with its type,
    /// e.g. non-UTF-8 bytes in a text frame.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension missing (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other numeric code, including the application-defined
    /// (3000-3999) and private (4000-4999) ranges.
    Other(u16),
}

impl CloseCode {
    /// Creates a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Returns the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Whether this code has a standard meaning assigned by the protocol
    /// (the 1000-1015 block).
    #[must_use]
    pub const fn is_protocol_defined(&self) -> bool {
        matches!(self.as_u16(), 1000..=1015)
    }

    /// Whether this code falls in the application-defined range (3000-3999),
    /// registered for use by libraries and frameworks.
    #[must_use]
    pub const fn is_application(&self) -> bool {
        matches!(self.as_u16(), 3000..=3999)
    }

    /// Whether this code falls in the private/implementation range
    /// (4000-4999).
    #[must_use]
    pub const fn is_private(&self) -> bool {
        matches!(self.as_u16(), 4000..=4999)
    }

    /// Whether an endpoint may set this code in a Close frame it sends.
    ///
    /// 1004-1006 and 1015 are receive-only per RFC 6455 Section 7.4.1;
    /// everything below 1000 and 1016-2999 is unassigned.
    #[must_use]
    pub const fn is_sendable(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

// ============================================================================
// Tests
// ============================================================================
