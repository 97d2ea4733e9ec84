//! Protocol schemas — roles, directional parameters and permissible actions.

use crate::error::SchemaError;
use crate::id::{ProtocolKey, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Direction of a parameter, at protocol level or inside an action.
///
/// At protocol level `In` marks a value supplied by the initiator when the
/// instance is created and `Out` a value produced while the protocol runs.
/// Inside an action `In` means "must already be known" and `Out` means
/// "bound by this action".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Known before.
    In,
    /// Produced.
    Out,
}

/// A parameter declared by a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Protocol-level direction.
    pub direction: Direction,
    /// Whether the parameter is part of the instance key.
    #[serde(default)]
    pub key: bool,
}

/// A parameter reference inside an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameter {
    /// Parameter name; must be declared by the protocol.
    pub name: String,
    /// Whether the action consumes or binds the parameter.
    pub direction: Direction,
}

/// A message one role sends to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Action name, unique within the protocol.
    pub name: String,
    /// Sending role.
    pub from: Role,
    /// Receiving role.
    pub to: Role,
    /// Parameters the action consumes and binds.
    pub params: Vec<ActionParameter>,
}

impl Action {
    /// Parameters this action binds.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.direction == Direction::Out)
            .map(|p| p.name.as_str())
    }

    /// Parameters that must be bound before this action can happen.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.direction == Direction::In)
            .map(|p| p.name.as_str())
    }
}

/// An immutable protocol schema.
///
/// Build one with [`Protocol::builder`] or deserialize it from a schema
/// resource; either way it is validated once and shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawProtocol", into = "RawProtocol")]
pub struct Protocol {
    name: String,
    roles: Vec<Role>,
    params: Vec<Parameter>,
    actions: Vec<Action>,
    key: ProtocolKey,
}

impl Protocol {
    /// Start building a protocol called `name`.
    pub fn builder(name: impl Into<String>) -> ProtocolBuilder {
        ProtocolBuilder {
            raw: RawProtocol {
                name: name.into(),
                roles: Vec::new(),
                params: Vec::new(),
                actions: Vec::new(),
            },
        }
    }

    /// Stable identity key, `Name(RoleA,RoleB)`.
    pub fn key(&self) -> &ProtocolKey {
        &self.key
    }

    /// Protocol name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared roles, in declaration order.
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Declared parameters, in declaration order.
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Declared actions, in declaration order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Look up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Look up an action by name.
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Whether `role` is declared.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }

    /// Protocol-level inputs, in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.direction == Direction::In)
    }

    /// Key parameters, in declaration order.
    pub fn key_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.key)
    }
}

/// Unvalidated wire form of a [`Protocol`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProtocol {
    name: String,
    roles: Vec<Role>,
    params: Vec<Parameter>,
    actions: Vec<Action>,
}

impl TryFrom<RawProtocol> for Protocol {
    type Error = SchemaError;

    fn try_from(raw: RawProtocol) -> Result<Self, Self::Error> {
        let invalid = |reason: String| SchemaError::Invalid {
            protocol: raw.name.clone(),
            reason,
        };

        if raw.roles.is_empty() {
            return Err(invalid("no roles declared".into()));
        }
        let mut seen = HashSet::new();
        for p in &raw.params {
            if !seen.insert(p.name.as_str()) {
                return Err(invalid(format!("parameter '{}' declared twice", p.name)));
            }
        }
        if !raw.params.iter().any(|p| p.key) {
            return Err(invalid("no key parameter".into()));
        }
        let mut names = HashSet::new();
        for action in &raw.actions {
            if !names.insert(action.name.as_str()) {
                return Err(invalid(format!("action '{}' declared twice", action.name)));
            }
            for role in [&action.from, &action.to] {
                if !raw.roles.contains(role) {
                    return Err(invalid(format!(
                        "action '{}' uses undeclared role '{role}'",
                        action.name
                    )));
                }
            }
            for p in &action.params {
                if !seen.contains(p.name.as_str()) {
                    return Err(invalid(format!(
                        "action '{}' uses undeclared parameter '{}'",
                        action.name, p.name
                    )));
                }
            }
        }

        let roles = raw
            .roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let key = ProtocolKey::new(format!("{}({roles})", raw.name));
        Ok(Self {
            name: raw.name,
            roles: raw.roles,
            params: raw.params,
            actions: raw.actions,
            key,
        })
    }
}

impl From<Protocol> for RawProtocol {
    fn from(p: Protocol) -> Self {
        Self {
            name: p.name,
            roles: p.roles,
            params: p.params,
            actions: p.actions,
        }
    }
}

/// Builder for [`Protocol`].
///
/// Parameter and action specs use the textual form `"out ID key"`,
/// `"in origin"`, which keeps catalogs readable.
pub struct ProtocolBuilder {
    raw: RawProtocol,
}

impl ProtocolBuilder {
    /// Declare a role.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.raw.roles.push(Role::new(role));
        self
    }

    /// Declare a parameter, e.g. `"out ID key"` or `"in origin"`.
    pub fn param(mut self, decl: &str) -> Self {
        let (direction, name, rest) = split_decl(decl);
        self.raw.params.push(Parameter {
            name,
            direction,
            key: rest.iter().any(|w| *w == "key"),
        });
        self
    }

    /// Declare an action `from -> to: name[params]`.
    pub fn action(mut self, name: &str, from: &str, to: &str, params: &[&str]) -> Self {
        let params = params
            .iter()
            .map(|decl| {
                let (direction, name, _) = split_decl(decl);
                ActionParameter { name, direction }
            })
            .collect();
        self.raw.actions.push(Action {
            name: name.to_owned(),
            from: Role::new(from),
            to: Role::new(to),
            params,
        });
        self
    }

    /// Validate and build the protocol.
    pub fn build(self) -> Result<Protocol, SchemaError> {
        Protocol::try_from(self.raw)
    }
}

fn split_decl(decl: &str) -> (Direction, String, Vec<&str>) {
    let mut words = decl.split_whitespace();
    let first = words.next().unwrap_or_default();
    let (direction, name) = match first {
        "in" => (Direction::In, words.next().unwrap_or_default()),
        "out" => (Direction::Out, words.next().unwrap_or_default()),
        // Bare names are outputs.
        other => (Direction::Out, other),
    };
    (direction, name.to_owned(), words.collect())
}

/// Immutable table of protocol schemas keyed by protocol identity.
///
/// Loaded once per process and shared by reference with every reasoner.
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    protocols: BTreeMap<ProtocolKey, Arc<Protocol>>,
}

impl SchemaTable {
    /// Build a table from already validated protocols.
    pub fn new(protocols: impl IntoIterator<Item = Protocol>) -> Self {
        Self {
            protocols: protocols
                .into_iter()
                .map(|p| (p.key().clone(), Arc::new(p)))
                .collect(),
        }
    }

    /// Decode a schema resource: a JSON array of protocol definitions.
    pub fn from_json(resource: &str) -> Result<Self, SchemaError> {
        let protocols: Vec<Protocol> = serde_json::from_str(resource)?;
        Ok(Self::new(protocols))
    }

    /// Look up a protocol by key.
    pub fn get(&self, key: &ProtocolKey) -> Result<Arc<Protocol>, SchemaError> {
        self.protocols
            .get(key)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownProtocol(key.to_string()))
    }

    /// Look up a protocol by name.
    pub fn by_name(&self, name: &str) -> Result<Arc<Protocol>, SchemaError> {
        self.protocols
            .values()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownProtocol(name.to_owned()))
    }

    /// All protocols, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Protocol>> {
        self.protocols.values()
    }

    /// Number of protocols.
    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}
