use super::{finish_ride, parse, parse_datetime, start_ride};
use crate::config::TransportConfig;
use crate::protocols::{ACCEPT, FAILURE, REJECT, SUCCESS, keys};
use crate::station::{self, Station};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nahs_protocol::{
    Action, AgentId, Instance, InstanceKey, ProtocolKey, ReasonerError, Role, Roles, Values,
};
use nahs_reasoner::{Pattern, ProtocolHandler, ProtocolReasoner};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, oneshot};
use tokio::task::JoinHandle;

/// Outcomes of finished transports kept for [`Jobs::wait_for`].
pub const KEPT_OUTCOMES: usize = 64;

type Outcome = Result<(), ReasonerError>;

#[derive(Default)]
struct JobBook {
    running: HashMap<InstanceKey, JoinHandle<()>>,
    finished: VecDeque<(InstanceKey, Outcome)>,
}

#[derive(Default)]
struct JobsInner {
    book: Mutex<JobBook>,
    settled: Notify,
}

/// Accepted transports of one carrier.
///
/// A job leaves the running set when it finishes or its instance is
/// dropped. The last [`KEPT_OUTCOMES`] outcomes stay available to
/// [`Jobs::wait_for`].
#[derive(Clone, Default)]
pub struct Jobs {
    inner: Arc<JobsInner>,
}

impl Jobs {
    /// Number of transports not yet carried out.
    pub async fn scheduled(&self) -> usize {
        self.inner.book.lock().await.running.len()
    }

    /// Wait until the transport `key` has finished and take its outcome.
    ///
    /// `InstanceNotFound` if nothing is running under `key` and no outcome
    /// is kept for it, e.g. after it was cancelled or already waited for.
    pub async fn wait_for(&self, key: &InstanceKey) -> Result<(), ReasonerError> {
        loop {
            let settled = self.inner.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();
            {
                let mut book = self.inner.book.lock().await;
                let position = book.finished.iter().position(|(k, _)| k == key);
                if let Some((_, outcome)) = position.and_then(|at| book.finished.remove(at)) {
                    return outcome;
                }
                if !book.running.contains_key(key) {
                    return Err(ReasonerError::InstanceNotFound(key.to_string()));
                }
            }
            settled.await;
        }
    }

    /// Abort the transport `key` if it is still running.
    pub async fn cancel(&self, key: &InstanceKey) -> bool {
        let job = self.inner.book.lock().await.running.remove(key);
        self.inner.settled.notify_waiters();
        match job {
            Some(job) => {
                job.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every running transport, returning their keys.
    pub async fn cancel_all(&self) -> Vec<InstanceKey> {
        let running: Vec<_> = self.inner.book.lock().await.running.drain().collect();
        self.inner.settled.notify_waiters();
        running
            .into_iter()
            .map(|(key, job)| {
                job.abort();
                key
            })
            .collect()
    }

    async fn track<F>(&self, key: InstanceKey, job: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let jobs = self.clone();
        let mut book = self.inner.book.lock().await;
        let settled_key = key.clone();
        let handle = tokio::spawn(async move {
            let outcome = job.await;
            jobs.settle(settled_key, outcome).await;
        });
        book.running.insert(key, handle);
    }

    async fn settle(&self, key: InstanceKey, outcome: Outcome) {
        let mut book = self.inner.book.lock().await;
        if book.running.remove(&key).is_none() {
            return;
        }
        book.finished.push_back((key, outcome));
        while book.finished.len() > KEPT_OUTCOMES {
            if let Some((evicted, _)) = book.finished.pop_front() {
                tracing::debug!(instance = %evicted, "nahs.transport.outcome_evicted");
            }
        }
        drop(book);
        self.inner.settled.notify_waiters();
    }
}

/// Ask the first carrier on the network to move `bikes` bikes from `src`
/// to `dst`, arriving by `arrival`. Returns the answered instance.
pub(crate) async fn request_transport(
    reasoner: &ProtocolReasoner,
    bikes: usize,
    src: &AgentId,
    dst: &AgentId,
    arrival: DateTime<Utc>,
) -> Result<Instance, ReasonerError> {
    let protocol = keys::bike_transport();
    let carrier = reasoner.find_provider(&protocol, "Transport").await?;
    let roles = Roles::from([
        (Role::new("Requester"), reasoner.agent().clone()),
        (Role::new("Transport"), carrier.clone()),
    ]);
    let inputs = Values::from([
        ("bikeNum".to_owned(), bikes.to_string()),
        ("src".to_owned(), src.to_string()),
        ("dst".to_owned(), dst.to_string()),
        ("datetime".to_owned(), arrival.to_rfc3339()),
    ]);
    tracing::info!(
        agent = reasoner.agent().short(),
        carrier = carrier.short(),
        bikes,
        src = src.short(),
        dst = dst.short(),
        %arrival,
        "nahs.transport.requested"
    );
    reasoner.negotiate(&protocol, roles, inputs).await
}

/// Requester side of BikeTransport.
///
/// The carrier first answers `accept` or `reject`; an accepted transport
/// later reports `success` or `failure`.
#[derive(Debug, Default)]
pub struct TransportRequester;

#[async_trait]
impl ProtocolHandler for TransportRequester {
    fn protocol(&self) -> ProtocolKey {
        keys::bike_transport()
    }

    fn role(&self) -> Role {
        Role::new("Requester")
    }

    fn expected(&self, current: &Instance) -> Pattern {
        match (current.value("rID"), current.value("result")) {
            (None, _) => Pattern::Alternatives(ACCEPT, REJECT),
            (Some(ACCEPT), None) => Pattern::Alternatives(SUCCESS, FAILURE),
            _ => Pattern::Closed,
        }
    }

    fn validate(&self, next: &Instance) -> Result<(), ReasonerError> {
        if let Some(answer) = next.value("rID").filter(|a| ![ACCEPT, REJECT].contains(a)) {
            return Err(ReasonerError::malformed("rID", answer));
        }
        if let Some(result) = next.value("result").filter(|r| ![SUCCESS, FAILURE].contains(r)) {
            return Err(ReasonerError::malformed("result", result));
        }
        Ok(())
    }

    async fn on_update(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
        actions: &[Action],
    ) -> Result<(), ReasonerError> {
        match actions.first().map(|a| a.name.as_str()) {
            Some(ACCEPT | REJECT) => {
                if let Err(e) = reasoner.reply(&instance).await {
                    tracing::debug!(instance = %instance.key(), error = %e, "nahs.transport.unawaited");
                }
            }
            _ if instance.get_value("result") == SUCCESS => {
                tracing::info!(agent = reasoner.agent().short(), instance = %instance.key(), "nahs.transport.completed");
            }
            _ => {
                tracing::warn!(agent = reasoner.agent().short(), instance = %instance.key(), "nahs.transport.failed");
            }
        }
        Ok(())
    }
}

/// Transport side of BikeTransport: accepts feasible schedules and carries
/// them out later.
pub struct Carrier {
    stations: Vec<Station>,
    config: TransportConfig,
    jobs: Jobs,
}

impl Carrier {
    /// Move bikes between `stations`, at the speed in `config`. Scheduled
    /// work is tracked in `jobs`.
    pub fn new(stations: Vec<Station>, config: TransportConfig, jobs: Jobs) -> Self {
        Self {
            stations,
            config,
            jobs,
        }
    }

    fn station(&self, instance: &Instance, name: &str) -> Result<Station, ReasonerError> {
        let id = instance.get_value(name);
        station::find(&self.stations, id)
            .cloned()
            .ok_or_else(|| ReasonerError::malformed(name, id))
    }

    /// Time needed to ride from `src` to `dst`.
    pub fn travel_time(&self, src: &Station, dst: &Station) -> Result<Duration, ReasonerError> {
        let distance = src.coords().distance(&dst.coords());
        Duration::try_from_secs_f64(distance / self.config.speed).map_err(|_| {
            ReasonerError::ResourceUnavailable(format!(
                "cannot cover {distance} at speed {}",
                self.config.speed
            ))
        })
    }
}

#[async_trait]
impl ProtocolHandler for Carrier {
    fn protocol(&self) -> ProtocolKey {
        keys::bike_transport()
    }

    fn role(&self) -> Role {
        Role::new("Transport")
    }

    async fn on_register(
        &self,
        reasoner: &ProtocolReasoner,
        instance: Instance,
    ) -> Result<(), ReasonerError> {
        let bikes: usize = parse(&instance, "bikeNum")?;
        if bikes == 0 {
            return Err(ReasonerError::malformed("bikeNum", instance.get_value("bikeNum")));
        }
        let src = self.station(&instance, "src")?;
        let dst = self.station(&instance, "dst")?;
        let arrival = parse_datetime(&instance, "datetime")?;

        let travel = self.travel_time(&src, &dst)?;
        let pickup = chrono::Duration::from_std(travel)
            .ok()
            .and_then(|t| arrival.checked_sub_signed(t))
            .ok_or_else(|| ReasonerError::malformed("datetime", instance.get_value("datetime")))?;
        if pickup < Utc::now() {
            return Err(ReasonerError::ResourceUnavailable(format!(
                "pickup time {pickup} has already passed"
            )));
        }

        let key = instance.key();
        let mut next = instance;
        next.set_value("rID", ACCEPT)?;
        let job = Job {
            reasoner: reasoner.clone(),
            instance: next.clone(),
            bikes,
            src,
            dst,
            pickup,
            travel,
        };
        // Tracked before the requester can learn it was accepted; the job
        // holds until the acceptance is sent.
        let (go, gate) = oneshot::channel();
        self.jobs.track(key.clone(), job.run(gate)).await;
        if let Err(e) = reasoner.advance(next).await {
            self.jobs.cancel(&key).await;
            return Err(e);
        }
        let _ = go.send(());
        tracing::info!(
            agent = reasoner.agent().short(),
            instance = %key,
            bikes,
            %pickup,
            travel_secs = travel.as_secs_f64(),
            "nahs.transport.scheduled"
        );
        Ok(())
    }

    async fn on_drop(&self, reasoner: &ProtocolReasoner, instance: Instance, motive: &str) {
        let key = instance.key();
        if self.jobs.cancel(&key).await {
            tracing::info!(agent = reasoner.agent().short(), instance = %key, motive, "nahs.transport.cancelled");
        }
    }
}

/// One accepted transport, waiting for its pickup time.
struct Job {
    reasoner: ProtocolReasoner,
    instance: Instance,
    bikes: usize,
    src: Station,
    dst: Station,
    pickup: DateTime<Utc>,
    travel: Duration,
}

impl Job {
    async fn run(self, gate: oneshot::Receiver<()>) -> Result<(), ReasonerError> {
        let key = self.instance.key();
        if gate.await.is_err() {
            return Err(ReasonerError::InstanceNotFound(key.to_string()));
        }
        let wait = (self.pickup - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        if !self.reasoner.is_open(&key).await {
            tracing::info!(agent = self.reasoner.agent().short(), instance = %key, "nahs.transport.skipped");
            return Err(ReasonerError::InstanceNotFound(key.to_string()));
        }
        // Once started, the carry runs to completion even if the job is
        // cancelled, so no bike is left in transit.
        tokio::spawn(self.carry()).await.map_err(|e| {
            ReasonerError::ResourceUnavailable(format!("transport {key} interrupted: {e}"))
        })?
    }

    async fn carry(self) -> Result<(), ReasonerError> {
        // Availability is checked again: bikes may have been rented since
        // the schedule was accepted.
        let Some(bikes) = self.src.reserve_many(self.bikes).await else {
            let available = self.src.available().await;
            tracing::warn!(
                agent = self.reasoner.agent().short(),
                instance = %self.instance.key(),
                requested = self.bikes,
                available,
                "nahs.transport.short"
            );
            self.report(FAILURE).await?;
            return Err(ReasonerError::ResourceUnavailable(format!(
                "{} bikes requested at station {}, {available} available",
                self.bikes,
                self.src.id()
            )));
        };

        let mut rides = Vec::with_capacity(bikes.len());
        for bike in &bikes {
            match start_ride(&self.reasoner, bike, self.instance.get_value("ID")).await {
                Ok(ride) => rides.push(ride),
                Err(e) => {
                    tracing::warn!(bike = bike.short(), error = %e, "nahs.ride.start_failed")
                }
            }
            self.src.release(bike).await;
        }
        tracing::info!(
            agent = self.reasoner.agent().short(),
            station = self.src.id().short(),
            bikes = bikes.len(),
            "nahs.transport.picked_up"
        );

        tokio::time::sleep(self.travel).await;

        for bike in &bikes {
            self.dst.dock_bike(bike).await;
        }
        for ride in &rides {
            if let Err(e) = finish_ride(&self.reasoner, ride, self.dst.id()).await {
                tracing::warn!(ride = %ride.key(), error = %e, "nahs.ride.finish_failed");
            }
        }
        self.report(SUCCESS).await
    }

    async fn report(&self, result: &str) -> Result<(), ReasonerError> {
        let mut next = self.instance.clone();
        next.set_value("result", result)?;
        self.reasoner.advance(next).await?;
        tracing::info!(agent = self.reasoner.agent().short(), instance = %self.instance.key(), result, "nahs.transport.reported");
        Ok(())
    }
}
