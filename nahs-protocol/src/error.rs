//! Error types for each boundary.

use thiserror::Error;

/// Reasoner errors. The first eight variants are the protocol-level
/// taxonomy every reasoner reports; the remaining ones wrap lower layers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReasonerError {
    /// The protocol is not recognized, or this agent does not play the
    /// requested side of it.
    #[error("protocol not supported: {0}")]
    SchemaNotSupported(String),

    /// No open instance has this key.
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// An instance with this key is already known to the reasoner.
    #[error("instance already exists: {0}")]
    DuplicateInstance(String),

    /// A required input parameter was not supplied.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// Roles are missing, undeclared, or do not include this agent.
    #[error("invalid role binding for {instance}: {reason}")]
    InvalidRoleBinding {
        /// Instance (or protocol) the binding belongs to.
        instance: String,
        /// What is wrong with the binding.
        reason: String,
    },

    /// The update does not match the expected action pattern, or is not a
    /// valid protocol run from the current version.
    #[error("invalid transition for {instance}: {reason}")]
    InvalidTransition {
        /// Instance the update was addressed to.
        instance: String,
        /// Why the update was rejected.
        reason: String,
    },

    /// A parameter value could not be parsed or refers to something unknown.
    #[error("malformed value for {name}: '{value}'")]
    MalformedValue {
        /// Parameter name.
        name: String,
        /// Offending value.
        value: String,
    },

    /// A physical resource or a feasible schedule is not available.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A correlation wait failed.
    #[error("correlation error: {0}")]
    Correlation(#[from] CorrelationError),

    /// The transport failed to deliver an event the caller waited on.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Schema lookup or construction failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl ReasonerError {
    /// Shorthand for [`ReasonerError::InvalidTransition`].
    pub fn invalid_transition(instance: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            instance: instance.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ReasonerError::MalformedValue`].
    pub fn malformed(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedValue {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Schema definition and lookup errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The protocol definition is inconsistent.
    #[error("invalid protocol {protocol}: {reason}")]
    Invalid {
        /// Protocol name.
        protocol: String,
        /// What is inconsistent.
        reason: String,
    },

    /// A parameter name is not declared by the protocol.
    #[error("unknown parameter '{name}' in {protocol}")]
    UnknownParameter {
        /// Protocol key.
        protocol: String,
        /// Parameter name.
        name: String,
    },

    /// A protocol key is not present in the schema table.
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// The schema resource could not be decoded.
    #[error("schema resource could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Structural diff failures between two versions of an instance.
///
/// A diff never fails on business grounds; these only say that the newer
/// version cannot be a protocol run starting at the current one.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    /// The two versions belong to different protocols.
    #[error("protocol mismatch: {current} vs {other}")]
    ProtocolMismatch {
        /// Protocol of the current version.
        current: String,
        /// Protocol of the other version.
        other: String,
    },

    /// The two versions have different instance keys.
    #[error("instance key mismatch: {current} vs {other}")]
    KeyMismatch {
        /// Key of the current version.
        current: String,
        /// Key of the other version.
        other: String,
    },

    /// A role binding differs between versions.
    #[error("role '{0}' was rebound")]
    RoleChanged(String),

    /// A value bound in the current version changed.
    #[error("parameter '{name}' changed from '{old}' to '{new}'")]
    ValueChanged {
        /// Parameter name.
        name: String,
        /// Current value.
        old: String,
        /// Value in the other version.
        new: String,
    },

    /// A value bound in the current version is missing from the other.
    #[error("parameter '{0}' was unbound")]
    ValueRemoved(String),

    /// A newly bound parameter is not produced by any enabled action.
    #[error("binding of '{0}' is not explained by any action")]
    UnexplainedBinding(String),
}

/// Correlation (request/reply matching) errors.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    /// A waiter is already registered for this key.
    #[error("a reply is already awaited for {0}")]
    AlreadyPending(String),

    /// No waiter is registered for this key.
    #[error("no reply is awaited for {0}")]
    NotPending(String),

    /// The wait was cancelled before a reply arrived.
    #[error("wait cancelled: {reason}")]
    Cancelled {
        /// Why the wait was cancelled (usually the drop motive).
        reason: String,
    },

    /// The caller-supplied deadline expired.
    #[error("reply for {0} timed out")]
    TimedOut(String),
}

/// Transport errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The target peer is unknown to the transport.
    #[error("peer not found: {0}")]
    PeerNotFound(String),

    /// The peer received the event but its reasoner refused it.
    #[error("event rejected by {peer}: {reason}")]
    Rejected {
        /// Peer that refused the event.
        peer: String,
        /// Reasoner error, rendered.
        reason: String,
    },

    /// Delivery failed for another reason.
    #[error("send failed: {0}")]
    SendFailed(String),
}
