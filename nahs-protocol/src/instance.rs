//! Protocol instances — one concrete, stateful run of a protocol.

use crate::error::{DiffError, SchemaError};
use crate::id::{AgentId, InstanceKey, Role};
use crate::protocol::{Action, Protocol};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Role name to participant identity.
pub type Roles = BTreeMap<Role, AgentId>;

/// Parameter name to bound value.
pub type Values = BTreeMap<String, String>;

/// One run of a protocol between specific role holders.
///
/// Values only ever accumulate: once a parameter is bound it keeps its
/// value. Reasoners advance their registered copy exclusively through
/// [`Instance::diff`] followed by [`Instance::merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    protocol: Arc<Protocol>,
    roles: Roles,
    values: Values,
}

impl Instance {
    /// Create an empty instance of `protocol` with the given role bindings.
    pub fn new(protocol: Arc<Protocol>, roles: Roles) -> Self {
        Self {
            protocol,
            roles,
            values: Values::new(),
        }
    }

    /// The protocol this instance runs.
    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    /// `<protocol key>/<key values>`; key parameters that are not bound yet
    /// contribute an empty segment.
    pub fn key(&self) -> InstanceKey {
        let ids = self
            .protocol
            .key_params()
            .map(|p| self.value(&p.name).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        InstanceKey::new(format!("{}/{ids}", self.protocol.key()))
    }

    /// Role bindings.
    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    /// Agent bound to `role`, if any.
    pub fn role(&self, role: &str) -> Option<&AgentId> {
        self.roles.get(role)
    }

    /// Bound values.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Value bound to `name`, if any.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Value bound to `name`, or the empty string.
    pub fn get_value(&self, name: &str) -> &str {
        self.value(name).unwrap_or_default()
    }

    /// Bind `name` on a working copy. The parameter must be declared.
    pub fn set_value(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), SchemaError> {
        if self.protocol.parameter(name).is_none() {
            return Err(SchemaError::UnknownParameter {
                protocol: self.protocol.key().to_string(),
                name: name.to_owned(),
            });
        }
        self.values.insert(name.to_owned(), value.into());
        Ok(())
    }

    /// Actions that lead from this version to `other`, in declaration order.
    ///
    /// An action is reported when every parameter it binds is newly bound in
    /// `other` and every parameter it consumes is bound there. Alternative
    /// actions binding the same parameters are all reported.
    pub fn diff(&self, other: &Instance) -> Result<Vec<Action>, DiffError> {
        if self.protocol.key() != other.protocol.key() {
            return Err(DiffError::ProtocolMismatch {
                current: self.protocol.key().to_string(),
                other: other.protocol.key().to_string(),
            });
        }
        let (current_key, other_key) = (self.key(), other.key());
        if current_key != other_key {
            return Err(DiffError::KeyMismatch {
                current: current_key.to_string(),
                other: other_key.to_string(),
            });
        }
        for (role, agent) in &self.roles {
            if other.roles.get(role) != Some(agent) {
                return Err(DiffError::RoleChanged(role.to_string()));
            }
        }
        if let Some(role) = other.roles.keys().find(|r| !self.roles.contains_key(*r)) {
            return Err(DiffError::RoleChanged(role.to_string()));
        }
        for (name, old) in &self.values {
            match other.values.get(name) {
                None => return Err(DiffError::ValueRemoved(name.clone())),
                Some(new) if new != old => {
                    return Err(DiffError::ValueChanged {
                        name: name.clone(),
                        old: old.clone(),
                        new: new.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        let fresh: BTreeSet<&str> = other
            .values
            .keys()
            .map(String::as_str)
            .filter(|name| !self.values.contains_key(*name))
            .collect();

        let actions: Vec<Action> = self
            .protocol
            .actions()
            .iter()
            .filter(|action| {
                let mut outputs = action.outputs().peekable();
                outputs.peek().is_some()
                    && outputs.all(|p| fresh.contains(p))
                    && action.inputs().all(|p| other.values.contains_key(p))
            })
            .cloned()
            .collect();

        if let Some(unexplained) = fresh
            .iter()
            .find(|name| !actions.iter().any(|a| a.outputs().any(|o| o == **name)))
        {
            return Err(DiffError::UnexplainedBinding((*unexplained).to_owned()));
        }
        Ok(actions)
    }

    /// Copy every value bound in `other` but not here. Existing bindings are
    /// never overwritten; call [`Instance::diff`] first to reject conflicts.
    pub fn merge(&mut self, other: &Instance) {
        for (name, value) in &other.values {
            self.values
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
}
