//! The per-agent reasoner: instance book plus handler registry.

use crate::config::ReasonerConfig;
use crate::correlation::CorrelationRegistry;
use crate::dispatcher::Dispatcher;
use crate::handler::{ProtocolHandler, Side};
use async_trait::async_trait;
use nahs_protocol::{
    AgentId, CorrelationError, Event, Instance, InstanceKey, Protocol, ProtocolKey, Reasoner,
    ReasonerError, Roles, SchemaTable, Service, Transport, Values,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

struct Registered {
    handler: Arc<dyn ProtocolHandler>,
    side: Side,
}

struct Dropped {
    instance: Instance,
    motive: String,
}

/// Open and dropped instances. A key lives in exactly one of the two maps.
#[derive(Default)]
struct Book {
    open: BTreeMap<InstanceKey, Instance>,
    dropped: HashMap<InstanceKey, Dropped>,
}

struct Inner {
    agent: AgentId,
    schema: Arc<SchemaTable>,
    handlers: HashMap<ProtocolKey, Registered>,
    config: ReasonerConfig,
    transport: Arc<dyn Transport>,
    // Lock order: book, then replies.
    book: Mutex<Book>,
    replies: CorrelationRegistry<Instance>,
    dispatcher: Dispatcher,
}

/// A [`Reasoner`] that dispatches protocol business rules to registered
/// [`ProtocolHandler`]s.
///
/// Every operation touching the instance book runs under one lock. Handler
/// continuations run after the lock is released, so they may call back into
/// the reasoner, and outbound events go through a [`Dispatcher`] so nothing
/// waits for delivery while holding state.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct ProtocolReasoner {
    inner: Arc<Inner>,
}

/// Builder for [`ProtocolReasoner`].
pub struct ProtocolReasonerBuilder {
    agent: AgentId,
    schema: Arc<SchemaTable>,
    transport: Arc<dyn Transport>,
    config: ReasonerConfig,
    handlers: Vec<(Arc<dyn ProtocolHandler>, Side)>,
}

impl ProtocolReasonerBuilder {
    /// Replace the default configuration.
    pub fn config(mut self, config: ReasonerConfig) -> Self {
        self.config = config;
        self
    }

    /// Play the responder side of the handler's protocol.
    pub fn offer(mut self, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.handlers.push((handler, Side::Provider));
        self
    }

    /// Play the initiator side of the handler's protocol.
    pub fn consume(mut self, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.handlers.push((handler, Side::Consumer));
        self
    }

    /// Check every handler against the schema table and build the reasoner.
    pub fn build(self) -> Result<ProtocolReasoner, ReasonerError> {
        let mut handlers = HashMap::new();
        for (handler, side) in self.handlers {
            let key = handler.protocol();
            let protocol = self
                .schema
                .get(&key)
                .map_err(|_| ReasonerError::SchemaNotSupported(key.to_string()))?;
            let role = handler.role();
            if !protocol.has_role(role.as_str()) {
                return Err(ReasonerError::InvalidRoleBinding {
                    instance: key.to_string(),
                    reason: format!("protocol has no role '{role}'"),
                });
            }
            if handlers.insert(key.clone(), Registered { handler, side }).is_some() {
                tracing::warn!(agent = self.agent.short(), protocol = %key, "nahs.reasoner.handler_replaced");
            }
        }
        let dispatcher = Dispatcher::new(self.agent.clone(), Arc::clone(&self.transport));
        Ok(ProtocolReasoner {
            inner: Arc::new(Inner {
                agent: self.agent,
                schema: self.schema,
                handlers,
                config: self.config,
                transport: self.transport,
                book: Mutex::new(Book::default()),
                replies: CorrelationRegistry::new(),
                dispatcher,
            }),
        })
    }
}

impl ProtocolReasoner {
    /// Start building a reasoner for `agent`.
    pub fn builder(
        agent: AgentId,
        schema: Arc<SchemaTable>,
        transport: Arc<dyn Transport>,
    ) -> ProtocolReasonerBuilder {
        ProtocolReasonerBuilder {
            agent,
            schema,
            transport,
            config: ReasonerConfig::default(),
            handlers: Vec::new(),
        }
    }

    /// Identity of the agent this reasoner acts for.
    pub fn agent(&self) -> &AgentId {
        &self.inner.agent
    }

    /// The shared schema table.
    pub fn schema(&self) -> &Arc<SchemaTable> {
        &self.inner.schema
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ReasonerConfig {
        &self.inner.config
    }

    /// The transport events are sent through.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Protocols this agent responds to, ordered by key.
    pub fn offered(&self) -> Vec<ProtocolKey> {
        self.keys_for(Side::Provider)
    }

    /// Protocols this agent initiates, ordered by key.
    pub fn consumed(&self) -> Vec<ProtocolKey> {
        self.keys_for(Side::Consumer)
    }

    fn keys_for(&self, side: Side) -> Vec<ProtocolKey> {
        let mut keys: Vec<ProtocolKey> = self
            .inner
            .handlers
            .iter()
            .filter(|(_, r)| r.side == side)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn handler(&self, key: &ProtocolKey, side: Option<Side>) -> Result<Arc<dyn ProtocolHandler>, ReasonerError> {
        match self.inner.handlers.get(key) {
            Some(r) if side.is_none_or(|s| s == r.side) => Ok(Arc::clone(&r.handler)),
            _ => Err(ReasonerError::SchemaNotSupported(key.to_string())),
        }
    }

    /// Advertise every offered protocol on the transport.
    pub async fn advertise(&self) {
        for (key, registered) in &self.inner.handlers {
            if registered.side == Side::Provider {
                let service = Service::new(key.clone(), [registered.handler.role()]);
                self.inner.transport.advertise(&self.inner.agent, service).await;
            }
        }
    }

    /// First advertised provider of `role` in `protocol`, other than this
    /// agent.
    pub async fn find_provider(
        &self,
        protocol: &ProtocolKey,
        role: &str,
    ) -> Result<AgentId, ReasonerError> {
        self.inner
            .transport
            .providers(protocol, &role.into())
            .await
            .into_iter()
            .find(|a| a != &self.inner.agent)
            .ok_or_else(|| {
                ReasonerError::ResourceUnavailable(format!("no provider of {role} for {protocol}"))
            })
    }

    /// Instantiate a consumed protocol and send the proposal, without
    /// waiting for an answer.
    pub async fn start(
        &self,
        protocol: &ProtocolKey,
        roles: Roles,
        inputs: Values,
    ) -> Result<Instance, ReasonerError> {
        let protocol = self.lookup(protocol)?;
        let instance = self.instantiate(&protocol, roles, inputs).await?;
        self.notify(&instance, Event::New(instance.clone())).await;
        Ok(instance)
    }

    /// Instantiate a consumed protocol, send the proposal and suspend until
    /// a handler replies with [`ProtocolReasoner::reply`].
    ///
    /// If the configured deadline expires first, the instance is dropped and
    /// the counterparty is told so.
    pub async fn negotiate(
        &self,
        protocol: &ProtocolKey,
        roles: Roles,
        inputs: Values,
    ) -> Result<Instance, ReasonerError> {
        let protocol = self.lookup(protocol)?;
        let instance = self.create(&protocol, roles, inputs)?;
        let key = instance.key();
        // The waiter exists before the instance can receive updates.
        let waiter = self.inner.replies.register(key.clone()).await?;
        if let Err(e) = self.open(&instance).await {
            self.inner.replies.discard(&key, "not opened").await;
            return Err(e);
        }
        self.notify(&instance, Event::New(instance.clone())).await;

        let mut pending = Negotiation {
            reasoner: self,
            key: key.clone(),
            settled: false,
        };
        let outcome = waiter.wait_for(self.inner.config.reply_timeout).await;
        pending.settled = true;
        match outcome {
            Ok(reply) => Ok(reply),
            Err(CorrelationError::TimedOut(k)) => {
                tracing::warn!(agent = self.agent().short(), instance = %key, "nahs.reasoner.reply_timeout");
                self.inner.replies.discard(&key, "reply timed out").await;
                if let Err(e) = self.abandon(&key, "reply timed out").await {
                    tracing::debug!(instance = %key, error = %e, "nahs.reasoner.already_dropped");
                }
                Err(CorrelationError::TimedOut(k).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn lookup(&self, protocol: &ProtocolKey) -> Result<Arc<Protocol>, ReasonerError> {
        self.inner
            .schema
            .get(protocol)
            .map_err(|_| ReasonerError::SchemaNotSupported(protocol.to_string()))
    }

    /// Resolve the pending wait on `instance` with its current version.
    pub async fn reply(&self, instance: &Instance) -> Result<(), ReasonerError> {
        Ok(self
            .inner
            .replies
            .resolve(&instance.key(), instance.clone())
            .await?)
    }

    /// Merge a locally produced version into the open instance and send it
    /// to the other role holders.
    ///
    /// Every new action must be sent by a role this agent plays. Returns the
    /// merged version.
    pub async fn advance(&self, updated: Instance) -> Result<Instance, ReasonerError> {
        let key = updated.key();
        let merged = {
            let mut book = self.inner.book.lock().await;
            let current = book
                .open
                .get_mut(&key)
                .ok_or_else(|| ReasonerError::InstanceNotFound(key.to_string()))?;
            let actions = current
                .diff(&updated)
                .map_err(|e| ReasonerError::invalid_transition(&key, e.to_string()))?;
            if actions.is_empty() {
                return Ok(current.clone());
            }
            if let Some(foreign) = actions
                .iter()
                .find(|a| current.role(a.from.as_str()) != Some(&self.inner.agent))
            {
                return Err(ReasonerError::invalid_transition(
                    &key,
                    format!("action '{}' belongs to role {}", foreign.name, foreign.from),
                ));
            }
            current.merge(&updated);
            current.clone()
        };
        tracing::debug!(agent = self.agent().short(), instance = %key, "nahs.reasoner.advanced");
        self.notify(&merged, Event::Update(merged.clone())).await;
        Ok(merged)
    }

    /// Drop an open instance and tell the other role holders why.
    pub async fn abandon(&self, key: &InstanceKey, motive: &str) -> Result<(), ReasonerError> {
        let instance = self.drop_local(key, motive).await?;
        self.notify(&instance, Event::dropped(key.clone(), motive)).await;
        self.after_drop(instance, motive).await;
        Ok(())
    }

    /// A dropped instance and the motive it was dropped with.
    pub async fn dropped(&self, key: &InstanceKey) -> Option<(Instance, String)> {
        self.inner
            .book
            .lock()
            .await
            .dropped
            .get(key)
            .map(|d| (d.instance.clone(), d.motive.clone()))
    }

    /// Whether `key` is open.
    pub async fn is_open(&self, key: &InstanceKey) -> bool {
        self.inner.book.lock().await.open.contains_key(key)
    }

    /// Number of callers suspended in [`ProtocolReasoner::negotiate`].
    pub async fn pending_replies(&self) -> usize {
        self.inner.replies.len().await
    }

    /// Stop sending and wait for in-flight outbound events.
    pub async fn shutdown(&self) {
        self.inner.dispatcher.shutdown().await;
    }

    async fn notify(&self, instance: &Instance, event: Event) {
        let peers: BTreeSet<&AgentId> = instance
            .roles()
            .values()
            .filter(|a| *a != &self.inner.agent)
            .collect();
        for peer in peers {
            self.inner.dispatcher.submit(peer.clone(), event.clone()).await;
        }
    }

    async fn drop_local(&self, key: &InstanceKey, motive: &str) -> Result<Instance, ReasonerError> {
        let mut book = self.inner.book.lock().await;
        let instance = book
            .open
            .remove(key)
            .ok_or_else(|| ReasonerError::InstanceNotFound(key.to_string()))?;
        book.dropped.insert(
            key.clone(),
            Dropped {
                instance: instance.clone(),
                motive: motive.to_owned(),
            },
        );
        self.inner.replies.discard(key, motive).await;
        tracing::info!(agent = self.agent().short(), instance = %key, motive, "nahs.reasoner.dropped");
        Ok(instance)
    }

    async fn after_drop(&self, instance: Instance, motive: &str) {
        if let Ok(handler) = self.handler(instance.protocol().key(), None) {
            handler.on_drop(self, instance, motive).await;
        }
    }

    fn create(
        &self,
        protocol: &Arc<Protocol>,
        roles: Roles,
        inputs: Values,
    ) -> Result<Instance, ReasonerError> {
        let handler = self.handler(protocol.key(), Some(Side::Consumer))?;
        let instance = handler.instantiate(protocol, roles, &inputs)?;
        self.check_roles(&instance, handler.role().as_str())?;
        Ok(instance)
    }

    async fn open(&self, instance: &Instance) -> Result<(), ReasonerError> {
        let key = instance.key();
        let mut book = self.inner.book.lock().await;
        if book.open.contains_key(&key) || book.dropped.contains_key(&key) {
            return Err(ReasonerError::DuplicateInstance(key.to_string()));
        }
        book.open.insert(key.clone(), instance.clone());
        tracing::debug!(agent = self.agent().short(), instance = %key, "nahs.reasoner.instantiated");
        Ok(())
    }

    fn check_roles(&self, instance: &Instance, role: &str) -> Result<(), ReasonerError> {
        let protocol = instance.protocol();
        let invalid = |reason: String| ReasonerError::InvalidRoleBinding {
            instance: instance.key().to_string(),
            reason,
        };
        if protocol.roles().len() >= 2 && instance.roles().len() < 2 {
            return Err(invalid(format!(
                "{} of {} roles bound",
                instance.roles().len(),
                protocol.roles().len()
            )));
        }
        if let Some(undeclared) = instance.roles().keys().find(|r| !protocol.has_role(r.as_str())) {
            return Err(invalid(format!("undeclared role '{undeclared}'")));
        }
        if instance.role(role) != Some(&self.inner.agent) {
            return Err(invalid(format!("{} does not play {role}", self.inner.agent)));
        }
        Ok(())
    }

    async fn try_register(&self, instance: &Instance) -> Result<Arc<dyn ProtocolHandler>, ReasonerError> {
        let key = instance.key();
        let mut book = self.inner.book.lock().await;
        if book.open.contains_key(&key) || book.dropped.contains_key(&key) {
            return Err(ReasonerError::DuplicateInstance(key.to_string()));
        }
        let protocol = instance.protocol();
        let handler = self.handler(protocol.key(), Some(Side::Provider))?;
        self.check_roles(instance, handler.role().as_str())?;
        if let Some(missing) = protocol
            .key_params()
            .chain(protocol.inputs())
            .find(|p| instance.value(&p.name).is_none())
        {
            return Err(ReasonerError::MissingParameter(missing.name.clone()));
        }
        book.open.insert(key, instance.clone());
        Ok(handler)
    }

    async fn try_update(
        &self,
        next: &Instance,
    ) -> Result<(Arc<dyn ProtocolHandler>, Instance, Vec<nahs_protocol::Action>), ReasonerError> {
        let key = next.key();
        let mut book = self.inner.book.lock().await;
        let current = book
            .open
            .get_mut(&key)
            .ok_or_else(|| ReasonerError::InstanceNotFound(key.to_string()))?;
        let handler = self.handler(current.protocol().key(), None)?;
        let actions = current
            .diff(next)
            .map_err(|e| ReasonerError::invalid_transition(&key, e.to_string()))?;
        handler.expected(current).check(&key, &actions)?;
        handler.validate(next)?;
        current.merge(next);
        Ok((handler, current.clone(), actions))
    }
}

/// An in-flight [`ProtocolReasoner::negotiate`]. If the caller stops waiting
/// before the wait settles, the instance is dropped in the background.
struct Negotiation<'a> {
    reasoner: &'a ProtocolReasoner,
    key: InstanceKey,
    settled: bool,
}

impl Drop for Negotiation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let reasoner = self.reasoner.clone();
        let key = self.key.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = reasoner.abandon(&key, "negotiation cancelled").await {
                        tracing::debug!(instance = %key, error = %e, "nahs.reasoner.already_dropped");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(instance = %key, "nahs.reasoner.cancelled_outside_runtime");
            }
        }
    }
}

#[async_trait]
impl Reasoner for ProtocolReasoner {
    async fn instantiate(
        &self,
        protocol: &Protocol,
        roles: Roles,
        inputs: Values,
    ) -> Result<Instance, ReasonerError> {
        let protocol = self.lookup(protocol.key())?;
        let instance = self.create(&protocol, roles, inputs)?;
        self.open(&instance).await?;
        Ok(instance)
    }

    async fn register_instance(&self, instance: Instance) -> Result<(), ReasonerError> {
        let key = instance.key();
        let handler = match self.try_register(&instance).await {
            Ok(handler) => handler,
            Err(e) => {
                tracing::warn!(agent = self.agent().short(), instance = %key, error = %e, "nahs.reasoner.register_rejected");
                return Err(e);
            }
        };
        tracing::debug!(agent = self.agent().short(), instance = %key, "nahs.reasoner.registered");

        if let Err(e) = handler.on_register(self, instance).await {
            tracing::warn!(agent = self.agent().short(), instance = %key, error = %e, "nahs.reasoner.register_failed");
            if let Err(drop_err) = self.abandon(&key, &e.to_string()).await {
                tracing::debug!(instance = %key, error = %drop_err, "nahs.reasoner.already_dropped");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn update_instance(&self, instance: Instance) -> Result<(), ReasonerError> {
        let key = instance.key();
        let (handler, merged, actions) = match self.try_update(&instance).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(agent = self.agent().short(), instance = %key, error = %e, "nahs.reasoner.update_rejected");
                return Err(e);
            }
        };
        tracing::debug!(
            agent = self.agent().short(),
            instance = %key,
            actions = ?actions.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            "nahs.reasoner.updated"
        );

        if let Err(e) = handler.on_update(self, merged, &actions).await {
            tracing::warn!(agent = self.agent().short(), instance = %key, error = %e, "nahs.reasoner.update_failed");
            if let Err(drop_err) = self.abandon(&key, &e.to_string()).await {
                tracing::debug!(instance = %key, error = %drop_err, "nahs.reasoner.already_dropped");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn drop_instance(&self, key: &InstanceKey, motive: &str) -> Result<(), ReasonerError> {
        let instance = self.drop_local(key, motive).await?;
        self.after_drop(instance, motive).await;
        Ok(())
    }

    async fn get_instance(&self, key: &InstanceKey) -> Option<Instance> {
        self.inner.book.lock().await.open.get(key).cloned()
    }

    async fn instances(&self, protocol: &ProtocolKey) -> Vec<Instance> {
        self.inner
            .book
            .lock()
            .await
            .open
            .values()
            .filter(|i| i.protocol().key() == protocol)
            .cloned()
            .collect()
    }
}
