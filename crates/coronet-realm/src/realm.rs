//! The per-device dispatcher wiring states, session and transport.
//!
//! Exactly one dispatcher task runs per device. It owns the [`Session`]
//! and the current [`State`] outright; transport reader loops, the beacon
//! and timers only enqueue events, so every transition observes a
//! consistent world and the strict event order is preserved by the queue
//! itself.

use std::sync::Arc;

use coronet_protocol::{AdminMessage, ConnectionAccomplishmentType, DeviceId, Role};
use coronet_transport::{AdminBroadcastChannel, ConnectionManager, Connector};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::beacon::{Acceptor, Beacon};
use crate::config::RealmConfig;
use crate::event::{Event, TimeoutEvent};
use crate::session::Session;
use crate::state::{Disconnects, FollowUp, PeasantState, State, Transition};

/// Ceiling on chained state entries from a single event. Entry replays
/// the last census, which may itself transition; real chains settle in
/// one or two hops, anything longer is a handler bug.
const MAX_CHAINED_ENTRIES: usize = 4;

/// Entry point for running one device's kingdom membership.
pub struct Realm;

impl Realm {
    /// Start the state machine for `local_device` and return its handle.
    ///
    /// Spawns the dispatcher task plus a pump that converts transport
    /// events into state machine events. The device starts Free, scanning
    /// for kingdoms to join.
    pub fn start(
        local_device: DeviceId,
        config: RealmConfig,
        connector: Arc<dyn Connector>,
        beacon: Arc<dyn Beacon>,
        acceptor: Arc<dyn Acceptor>,
    ) -> RealmHandle {
        let (transport_tx, mut transport_rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(connector, transport_tx);
        let broadcast = AdminBroadcastChannel::new(manager.clone());
        let session = Session::new(
            local_device,
            config,
            manager.clone(),
            broadcast,
            beacon,
            acceptor,
        );
        let preparation_cancel = session.preparation_cancel();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pump_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(transport_event) = transport_rx.recv().await {
                if pump_tx.send(Event::from(transport_event)).is_err() {
                    break;
                }
            }
        });

        let (role_tx, role_rx) = watch::channel(Role::Free);
        let beacon = session.beacon_handle();
        let acceptor = session.acceptor_handle();
        let task = tokio::spawn(run(session, event_rx, role_tx));

        RealmHandle {
            events: event_tx,
            preparation_cancel,
            role: role_rx,
            manager,
            beacon,
            acceptor,
            task,
        }
    }
}

/// Handle to a running dispatcher.
pub struct RealmHandle {
    events: mpsc::UnboundedSender<Event>,
    preparation_cancel: Arc<Notify>,
    role: watch::Receiver<Role>,
    manager: ConnectionManager,
    beacon: Arc<dyn Beacon>,
    acceptor: Arc<dyn Acceptor>,
    task: JoinHandle<()>,
}

impl RealmHandle {
    /// Enqueue an event. Beacon implementations feed
    /// [`Event::DeviceDiscovered`] through here.
    pub fn submit(&self, event: Event) {
        // A closed queue means the machine already shut down.
        let _ = self.events.send(event);
    }

    /// Cancel an in-progress crowning preparation wait, leaving the
    /// waiting state unchanged.
    pub fn cancel_crowning_preparation(&self) {
        self.preparation_cancel.notify_waiters();
    }

    /// The device's current role.
    pub fn role(&self) -> Role {
        *self.role.borrow()
    }

    /// Watch channel following role changes.
    pub fn role_changes(&self) -> watch::Receiver<Role> {
        self.role.clone()
    }

    /// The underlying connection manager. Acceptor implementations
    /// register inbound connections here.
    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Stop the dispatcher, silence the beacon and acceptor, and tear
    /// down every tracked connection.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        self.beacon.stop();
        self.acceptor.stop_accepting();
        self.manager.disconnect_all();
    }
}

/// Sleep until an optional deadline, or forever when there is none.
async fn maybe_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run(mut session: Session, mut events: mpsc::UnboundedReceiver<Event>, role_tx: watch::Sender<Role>) {
    let mut state = State::free();
    state.on_enter(&session);
    info!(device = %session.local_device(), %state, "state machine started");

    let mut discovery_deadline = Some(Instant::now() + session.config().discovery_timeout);
    let census_period = session.config().census_interval;
    let mut census_tick = interval_at(Instant::now() + census_period, census_period);
    census_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let event = tokio::select! {
            maybe = events.recv() => match maybe {
                Some(event) => event,
                None => break,
            },
            _ = census_tick.tick() => Event::Timeout(TimeoutEvent::CensusTick),
            _ = maybe_sleep(discovery_deadline) => {
                discovery_deadline = None;
                Event::Timeout(TimeoutEvent::DiscoveryTimeout)
            }
        };

        let previous_role = state.role();
        state = step(state, &mut session, event).await;
        let role = state.role();

        if role != previous_role {
            info!(from = %previous_role, to = %role, "role changed");
            let _ = role_tx.send(role);
            discovery_deadline = if role == Role::Free {
                Some(Instant::now() + session.config().discovery_timeout)
            } else {
                None
            };
        }
    }
    info!(device = %session.local_device(), "state machine stopped");
}

/// Drive one event through the current state and apply the transition's
/// outputs in their contractual order: messages first, then disconnects,
/// then the join-new-king follow-up, then the entry action of the state
/// finally arrived at.
async fn step(state: State, session: &mut Session, event: Event) -> State {
    if let Event::Admin(AdminMessage::Census(ref census)) = event {
        session.record_census(census.clone());
    }

    let mut transition = dispatch(state, session, event).await;
    let mut hops = 0;
    loop {
        let (mut next, mut entered, messages, disconnects, follow_up) = transition.into_parts();

        for message in &messages {
            session.broadcast().post(message).await;
        }
        match disconnects {
            Disconnects::None => {}
            Disconnects::These(connections) => {
                for conn in connections {
                    conn.disconnect();
                }
            }
            Disconnects::All => session.manager().disconnect_all(),
        }
        if let Some(FollowUp::JoinNewKing(new_king)) = follow_up {
            next = join_new_king(session, new_king).await;
            entered = true;
        }

        if !entered || hops >= MAX_CHAINED_ENTRIES {
            return next;
        }
        hops += 1;

        next.on_enter(session);
        info!(%next, "entered state");

        // Replay the last census so the fresh state immediately
        // re-evaluates prior prince and king information.
        let Some(census) = session.last_census().cloned() else {
            return next;
        };
        transition = dispatch(next, session, Event::Admin(AdminMessage::Census(census))).await;
    }
}

/// Dispatch with the failure policy applied: a protocol violation never
/// escapes, the device tears everything down and resolves into Free.
async fn dispatch(state: State, session: &mut Session, event: Event) -> Transition {
    match state.on_event(session, event).await {
        Ok(transition) => transition,
        Err(e) => {
            error!(error = %e, "protocol violation, tearing down and becoming free");
            session.manager().disconnect_all();
            Transition::to(State::free())
        }
    }
}

/// Chase the King named in a bow-down order. Success makes this device a
/// Peasant of the new kingdom; exhausted retries leave it Free.
async fn join_new_king(session: &Session, new_king: DeviceId) -> State {
    let retries = session.config().max_connect_retries;
    match session.manager().connect_to_device(&new_king, retries).await {
        Some(conn) => State::Peasant(PeasantState::new(
            conn,
            ConnectionAccomplishmentType::BowedDown,
        )),
        None => {
            info!(%new_king, "could not join the new king, becoming free");
            State::free()
        }
    }
}
