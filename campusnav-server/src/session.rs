//! Live navigation sessions.
//!
//! A session owns either a single-route tracker or a shuttle tracker. Route
//! replacement is sequence-stamped: every re-fetch takes a ticket and its
//! result is applied only if no newer fetch was requested in the meantime.
//! Shuttle sessions poll bus positions on an interval and are removed once
//! they arrive. Sessions that see no client activity for longer than the idle
//! timeout are evicted by [`SessionStore::spawn_idle_sweeper`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use campusnav_core::Error;
use campusnav_core::tracking::{
    BusPosition, RouteDocument, RouteTracker, ShuttleItinerary, ShuttleLeg, ShuttleTracker,
    TrackingState, TravelMode, WALK_ARRIVAL_METERS,
};
use geo::Point;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::fetch::BusPositionSource;

pub type SessionId = u64;

/// What the client receives after each location update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingView {
    /// `[lng, lat]`
    pub snapped_point: [f64; 2],
    pub on_route: bool,
    pub remaining_distance: f64,
    pub remaining_time: f64,
    pub instruction: String,
    pub clipped_polyline: Vec<[f64; 2]>,
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leg: Option<ShuttleLeg>,
    pub arrived: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bus_positions: Vec<BusPosition>,
}

impl TrackingView {
    fn from_state(state: TrackingState, arrived: bool) -> Self {
        Self {
            snapped_point: [state.snapped_point.x(), state.snapped_point.y()],
            on_route: state.on_route,
            remaining_distance: state.remaining_distance,
            remaining_time: state.remaining_time,
            instruction: state.instruction,
            clipped_polyline: state
                .clipped_polyline
                .iter()
                .map(|p| [p.x(), p.y()])
                .collect(),
            heading: state.heading,
            leg: None,
            arrived,
            bus_positions: Vec::new(),
        }
    }
}

/// Parameters of a pending route re-fetch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteTicket {
    pub ticket: u64,
    pub destination: Point<f64>,
    pub mode: TravelMode,
}

struct RouteSession {
    tracker: RouteTracker,
    destination: Point<f64>,
    requested: u64,
    applied: u64,
}

struct ShuttleSession {
    tracker: ShuttleTracker,
    finished: Arc<AtomicBool>,
    poller: Option<JoinHandle<()>>,
}

impl ShuttleSession {
    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

impl Drop for ShuttleSession {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

enum Session {
    Route(RouteSession),
    Shuttle(ShuttleSession),
}

struct Entry {
    session: Session,
    last_seen: Instant,
}

impl Entry {
    fn new(session: Session) -> Self {
        Self {
            session,
            last_seen: Instant::now(),
        }
    }
}

type Sessions = HashMap<SessionId, Entry>;

/// Client-driven lookup; refreshes the idle clock of the session
fn touch(sessions: &mut Sessions, id: SessionId) -> Option<&mut Session> {
    sessions.get_mut(&id).map(|entry| {
        entry.last_seen = Instant::now();
        &mut entry.session
    })
}

#[derive(Default)]
pub struct SessionStore {
    next_id: AtomicU64,
    sessions: Mutex<Sessions>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start_route(&self, route: RouteDocument, destination: Point<f64>) -> SessionId {
        let id = self.next_id();
        self.lock().insert(
            id,
            Entry::new(Session::Route(RouteSession {
                tracker: RouteTracker::new(route),
                destination,
                requested: 0,
                applied: 0,
            })),
        );
        info!(session = id, "route navigation started");
        id
    }

    /// Starts shuttle navigation and its bus-position poller
    pub fn start_shuttle(
        self: &Arc<Self>,
        itinerary: ShuttleItinerary,
        source: Arc<dyn BusPositionSource>,
        period: Duration,
    ) -> SessionId {
        let id = self.next_id();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let tracker = ShuttleTracker::new(
            itinerary,
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        // The session must exist before the poller's first tick looks it up
        self.lock().insert(
            id,
            Entry::new(Session::Shuttle(ShuttleSession {
                tracker,
                finished,
                poller: None,
            })),
        );

        let poller = tokio::spawn(poll_bus_positions(Arc::downgrade(self), id, source, period));
        match self.lock().get_mut(&id).map(|entry| &mut entry.session) {
            Some(Session::Shuttle(session)) => session.poller = Some(poller),
            // Stopped in the meantime
            _ => poller.abort(),
        }
        info!(session = id, ?period, "shuttle navigation started");
        id
    }

    /// Takes a ticket for a route re-fetch
    pub fn begin_reroute(
        &self,
        id: SessionId,
        mode: Option<TravelMode>,
    ) -> Result<RouteTicket, ApiError> {
        let mut sessions = self.lock();
        match touch(&mut sessions, id) {
            Some(Session::Route(session)) => {
                session.requested += 1;
                Ok(RouteTicket {
                    ticket: session.requested,
                    destination: session.destination,
                    mode: mode.unwrap_or(session.tracker.route().mode),
                })
            }
            Some(Session::Shuttle(_)) => Err(ApiError::Core(Error::InvalidData(
                "shuttle sessions follow a fixed itinerary".to_string(),
            ))),
            None => Err(ApiError::UnknownSession(id)),
        }
    }

    /// Applies a fetched route if `ticket` is still the newest one.
    /// Returns whether the route was applied.
    pub fn apply_route(
        &self,
        id: SessionId,
        ticket: u64,
        route: RouteDocument,
    ) -> Result<bool, ApiError> {
        let mut sessions = self.lock();
        let Some(Session::Route(session)) = touch(&mut sessions, id) else {
            return Err(ApiError::UnknownSession(id));
        };

        if ticket != session.requested || ticket <= session.applied {
            debug!(
                session = id,
                ticket,
                newest = session.requested,
                "dropping stale route"
            );
            return Ok(false);
        }

        session.tracker.replace_route(route);
        session.applied = ticket;
        Ok(true)
    }

    /// Applies a location tick. A shuttle session is removed once it arrives,
    /// after its final view is produced.
    pub fn update_location(&self, id: SessionId, point: Point<f64>) -> Result<TrackingView, ApiError> {
        let mut sessions = self.lock();
        let (view, arrived) = match touch(&mut sessions, id) {
            Some(Session::Route(session)) => {
                let state = session.tracker.update(point);
                let arrived = state.remaining_distance <= WALK_ARRIVAL_METERS;
                return Ok(TrackingView::from_state(state, arrived));
            }
            Some(Session::Shuttle(session)) => {
                let tick = session.tracker.update(point);
                let view = TrackingView {
                    leg: Some(tick.leg),
                    bus_positions: tick.bus_positions,
                    ..TrackingView::from_state(tick.state, tick.arrived)
                };
                (view, session.finished.load(Ordering::SeqCst))
            }
            None => return Err(ApiError::UnknownSession(id)),
        };

        if arrived {
            // Dropping the session aborts its poller
            sessions.remove(&id);
            info!(session = id, "shuttle navigation arrived");
        }
        Ok(view)
    }

    /// Stores the latest bus positions. Returns `false` once the session is
    /// gone or finished.
    pub fn set_bus_positions(&self, id: SessionId, positions: Vec<BusPosition>) -> bool {
        match self.lock().get_mut(&id).map(|entry| &mut entry.session) {
            Some(Session::Shuttle(session)) if !session.finished.load(Ordering::SeqCst) => {
                session.tracker.set_bus_positions(positions);
                true
            }
            _ => false,
        }
    }

    /// Stops navigation; any poller is aborted before this returns
    pub fn stop(&self, id: SessionId) -> Result<(), ApiError> {
        let removed = self.lock().remove(&id);
        match removed {
            Some(_) => {
                info!(session = id, "navigation stopped");
                Ok(())
            }
            None => Err(ApiError::UnknownSession(id)),
        }
    }

    /// Removes sessions without client activity for longer than `max_idle`.
    /// Returns how many were removed.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = now.duration_since(entry.last_seen) <= max_idle;
            if !keep {
                info!(session = *id, "evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }

    /// Periodically evicts idle sessions until the store is dropped
    pub fn spawn_idle_sweeper(self: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        let period = (max_idle / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let evicted = store.purge_idle(max_idle);
                if evicted > 0 {
                    debug!(evicted, remaining = store.len(), "idle sweep");
                }
            }
        })
    }
}

async fn poll_bus_positions(
    store: Weak<SessionStore>,
    id: SessionId,
    source: Arc<dyn BusPositionSource>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let positions = match source.fetch_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(session = id, error = %e, "bus position poll failed");
                continue;
            }
        };

        let Some(store) = store.upgrade() else {
            break;
        };
        if !store.set_bus_positions(id, positions) {
            break;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicUsize;

    use campusnav_core::geometry::polyline_length;
    use campusnav_core::tracking::{RouteStep, ShuttleStop};
    use futures::future::BoxFuture;

    use super::*;

    pub(crate) fn walk(from: Point<f64>, to: Point<f64>, mode: TravelMode) -> RouteDocument {
        let polyline = vec![from, to];
        let distance = polyline_length(&polyline);
        RouteDocument::from_steps(
            vec![RouteStep::new("Walk", polyline, distance, distance / 1.4)],
            mode,
        )
    }

    pub(crate) struct CountingBuses {
        pub(crate) calls: AtomicUsize,
    }

    impl BusPositionSource for CountingBuses {
        fn fetch_positions(&self) -> BoxFuture<'_, Result<Vec<BusPosition>, Error>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok(vec![BusPosition {
                    id: format!("BUS{call}"),
                    location: Point::new(-73.60, 45.47),
                }])
            })
        }
    }

    fn itinerary() -> ShuttleItinerary {
        let start = Point::new(-73.5790, 45.4960);
        let sgw = Point::new(-73.5790, 45.4970);
        let loyola = Point::new(-73.6390, 45.4580);
        let end = Point::new(-73.6390, 45.4590);
        ShuttleItinerary {
            walk_to_stop: walk(start, sgw, TravelMode::Walk),
            bus_ride: walk(sgw, loyola, TravelMode::Drive),
            walk_from_stop: walk(loyola, end, TravelMode::Walk),
            origin_stop: ShuttleStop::new("SGW", sgw),
            destination_stop: ShuttleStop::new("Loyola", loyola),
        }
    }

    #[test]
    fn test_stale_routes_are_dropped() {
        let store = SessionStore::new();
        let a = Point::new(-73.5790, 45.4960);
        let b = Point::new(-73.5790, 45.4970);
        let id = store.start_route(walk(a, b, TravelMode::Walk), b);

        let first = store.begin_reroute(id, None).unwrap();
        let second = store.begin_reroute(id, Some(TravelMode::Bicycle)).unwrap();
        assert_eq!(second.mode, TravelMode::Bicycle);
        assert!(second.ticket > first.ticket);

        // The newer fetch lands first, the older one must not overwrite it
        let newer = walk(a, b, TravelMode::Bicycle);
        assert!(store.apply_route(id, second.ticket, newer).unwrap());
        assert!(!store.apply_route(id, first.ticket, walk(a, b, TravelMode::Walk)).unwrap());

        let view = store.update_location(id, a).unwrap();
        assert!(view.on_route);
        assert!(view.leg.is_none());
    }

    #[test]
    fn test_unknown_session() {
        let store = SessionStore::new();
        assert!(matches!(
            store.update_location(42, Point::new(0.0, 0.0)),
            Err(ApiError::UnknownSession(42))
        ));
        assert!(matches!(store.stop(42), Err(ApiError::UnknownSession(42))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_runs_until_stopped() {
        let store = Arc::new(SessionStore::new());
        let buses = Arc::new(CountingBuses {
            calls: AtomicUsize::new(0),
        });

        let id = store.start_shuttle(itinerary(), buses.clone(), Duration::from_secs(15));
        tokio::time::sleep(Duration::from_secs(31)).await;
        let polled = buses.calls.load(Ordering::SeqCst);
        assert!(polled >= 2, "polled {polled} times");

        let view = store
            .update_location(id, Point::new(-73.5790, 45.4962))
            .unwrap();
        assert_eq!(view.leg, Some(ShuttleLeg::LegOne));
        assert_eq!(view.bus_positions.len(), 1);

        store.stop(id).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(buses.calls.load(Ordering::SeqCst), polled);
        assert!(store.is_empty());
    }

    /// Fails the first poll, then reports one bus
    struct FlakyBuses {
        calls: AtomicUsize,
    }

    impl BusPositionSource for FlakyBuses {
        fn fetch_positions(&self) -> BoxFuture<'_, Result<Vec<BusPosition>, Error>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if call == 0 {
                    return Err(Error::FetchFailed("503 Service Unavailable".to_string()));
                }
                Ok(vec![BusPosition {
                    id: "BUS7".to_string(),
                    location: Point::new(-73.60, 45.47),
                }])
            })
        }
    }

    fn poller_alive(store: &SessionStore, id: SessionId) -> bool {
        match store.lock().get(&id).map(|entry| &entry.session) {
            Some(Session::Shuttle(session)) => session
                .poller
                .as_ref()
                .is_some_and(|poller| !poller.is_finished()),
            _ => false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_polling() {
        let store = Arc::new(SessionStore::new());
        let buses = Arc::new(FlakyBuses {
            calls: AtomicUsize::new(0),
        });
        let id = store.start_shuttle(itinerary(), buses.clone(), Duration::from_secs(15));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(buses.calls.load(Ordering::SeqCst), 1);
        let view = store
            .update_location(id, Point::new(-73.5790, 45.4962))
            .unwrap();
        assert!(view.bus_positions.is_empty());
        assert!(poller_alive(&store, id));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(buses.calls.load(Ordering::SeqCst), 2);
        let view = store
            .update_location(id, Point::new(-73.5790, 45.4962))
            .unwrap();
        assert_eq!(view.bus_positions.len(), 1);
        assert_eq!(view.bus_positions[0].id, "BUS7");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_first_poll_finds_its_session() {
        let store = Arc::new(SessionStore::new());
        let buses = Arc::new(CountingBuses {
            calls: AtomicUsize::new(0),
        });

        let ids: Vec<SessionId> = (0..64)
            .map(|_| store.start_shuttle(itinerary(), buses.clone(), Duration::from_secs(3600)))
            .collect();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // A poller that ran before its session existed would have exited
        for id in ids {
            assert!(poller_alive(&store, id), "poller of session {id} exited");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrival_removes_session() {
        let store = Arc::new(SessionStore::new());
        let buses = Arc::new(CountingBuses {
            calls: AtomicUsize::new(0),
        });
        let id = store.start_shuttle(itinerary(), buses.clone(), Duration::from_secs(15));

        store.update_location(id, Point::new(-73.5790, 45.4970)).unwrap();
        store.update_location(id, Point::new(-73.6390, 45.4580)).unwrap();
        let view = store
            .update_location(id, Point::new(-73.6390, 45.4590))
            .unwrap();
        assert!(view.arrived);
        assert_eq!(view.leg, Some(ShuttleLeg::LegThree));
        assert_eq!(store.len(), 0);

        assert!(matches!(
            store.update_location(id, Point::new(-73.6390, 45.4590)),
            Err(ApiError::UnknownSession(_))
        ));

        let polled = buses.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(buses.calls.load(Ordering::SeqCst), polled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_purged() {
        let store = SessionStore::new();
        let a = Point::new(-73.5790, 45.4960);
        let b = Point::new(-73.5790, 45.4970);
        let abandoned = store.start_route(walk(a, b, TravelMode::Walk), b);
        let active = store.start_route(walk(a, b, TravelMode::Walk), b);

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        store.update_location(active, a).unwrap();
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(store.purge_idle(Duration::from_secs(30 * 60)), 1);
        assert!(matches!(
            store.update_location(abandoned, a),
            Err(ApiError::UnknownSession(_))
        ));
        assert!(store.update_location(active, a).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_abandoned_shuttles() {
        let store = Arc::new(SessionStore::new());
        let buses = Arc::new(CountingBuses {
            calls: AtomicUsize::new(0),
        });
        let sweeper = store.spawn_idle_sweeper(Duration::from_secs(600));
        store.start_shuttle(itinerary(), buses.clone(), Duration::from_secs(15));

        tokio::time::sleep(Duration::from_secs(1000)).await;
        assert!(store.is_empty());

        // The bus poller does not count as client activity and dies with the session
        let polled = buses.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(buses.calls.load(Ordering::SeqCst), polled);
        sweeper.abort();
    }
}
