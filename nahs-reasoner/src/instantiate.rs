//! Building fresh instances for protocols this agent initiates.

use nahs_protocol::{Direction, Instance, Protocol, ReasonerError, Roles, Values};
use std::sync::Arc;

/// A fresh, collision-free correlation identifier.
pub fn correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Build a new instance of `protocol`.
///
/// Every protocol-level input must be present in `inputs`; the first
/// missing one, in declaration order, is reported. Key parameters produced
/// by the protocol get a fresh correlation identifier. Inputs the protocol
/// does not declare are ignored.
pub fn instantiate(
    protocol: &Arc<Protocol>,
    roles: Roles,
    inputs: &Values,
) -> Result<Instance, ReasonerError> {
    for param in protocol.inputs() {
        if !inputs.contains_key(&param.name) {
            return Err(ReasonerError::MissingParameter(param.name.clone()));
        }
    }

    let mut instance = Instance::new(Arc::clone(protocol), roles);
    for param in protocol.key_params() {
        if param.direction == Direction::Out {
            instance.set_value(&param.name, correlation_id())?;
        }
    }
    for param in protocol.inputs() {
        if let Some(value) = inputs.get(&param.name) {
            instance.set_value(&param.name, value.clone())?;
        }
    }
    Ok(instance)
}
