use std::sync::Arc;

use axum::error_handling::HandleErrorLayer;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{BoxError, Json, Router};
use campusnav_core::geometry::haversine_distance;
use campusnav_core::indoor::{
    BuildingCache, FloorGraph, IndoorPath, Node, NodeKind, shortest_path, shortest_path_to_kind,
};
use campusnav_core::tracking::{Campus, RouteDocument, ShuttleItinerary, TravelMode};
use chrono::NaiveDateTime;
use geo::Point;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, ShuttleConfig};
use crate::error::ApiError;
use crate::fetch::{BusPositionSource, RouteFetcher, RouteRequest};
use crate::session::{SessionId, SessionStore, TrackingView};

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<BuildingCache>,
    pub sessions: Arc<SessionStore>,
    pub routes: Arc<dyn RouteFetcher>,
    pub buses: Arc<dyn BusPositionSource>,
    pub shuttle: Arc<ShuttleConfig>,
    /// Local wall-clock time, used against the shuttle timetable
    pub now: fn() -> NaiveDateTime,
}

pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/buildings", get(list_buildings))
        .route("/buildings/{building}/floors/{floor}/path", get(indoor_path))
        .route("/buildings/{building}/floors/{floor}/nearest", get(nearest_node))
        .route("/sessions", post(start_route))
        .route("/sessions/shuttle", post(start_shuttle))
        .route("/sessions/{id}", delete(stop_session))
        .route("/sessions/{id}/route", post(reroute))
        .route("/sessions/{id}/location", post(update_location))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(config.request_timeout())
                .concurrency_limit(config.max_concurrent_requests.max(1)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn handle_middleware_error(error: BoxError) -> (StatusCode, String) {
    if error.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unhandled internal error: {error}"),
        )
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<LatLng> for Point<f64> {
    fn from(location: LatLng) -> Self {
        Point::new(location.lng, location.lat)
    }
}

fn coordinates(points: &[Point<f64>]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.x(), p.y()]).collect()
}

async fn health() -> &'static str {
    "OK"
}

async fn list_buildings(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(
        state
            .cache
            .catalog()
            .building_names()
            .map(str::to_string)
            .collect(),
    )
}

#[derive(Debug, Serialize)]
struct PathResponse {
    nodes: Vec<String>,
    /// Floor-plan pixels
    cost: f64,
    /// Node positions as image ratios
    positions: Vec<[f64; 2]>,
}

impl PathResponse {
    fn new(path: IndoorPath, graph: &FloorGraph) -> Self {
        let positions = path.positions(graph);
        Self {
            nodes: path.nodes,
            cost: path.cost,
            positions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    from: String,
    to: String,
}

async fn indoor_path(
    State(state): State<AppState>,
    Path((building, floor)): Path<(String, String)>,
    Query(query): Query<PathQuery>,
) -> Result<Json<PathResponse>, ApiError> {
    let graph = state.cache.get(&building)?;
    let floor = graph.floor(&floor)?;
    let path = shortest_path(floor, &query.from, &query.to)?;
    Ok(Json(PathResponse::new(path, floor)))
}

#[derive(Debug, Deserialize)]
struct NearestQuery {
    x: f64,
    y: f64,
    kind: Option<NodeKind>,
}

#[derive(Debug, Serialize)]
struct NearestResponse {
    node: Node,
    /// Path to the closest node of the requested kind
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathResponse>,
}

async fn nearest_node(
    State(state): State<AppState>,
    Path((building, floor_name)): Path<(String, String)>,
    Query(query): Query<NearestQuery>,
) -> Result<Json<NearestResponse>, ApiError> {
    let graph = state.cache.get(&building)?;
    let floor = graph.floor(&floor_name)?;
    let node = floor
        .nearest_node(query.x, query.y)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("floor {floor_name} has no nodes")))?;

    let path = match query.kind {
        Some(kind) => Some(PathResponse::new(
            shortest_path_to_kind(floor, &node.id, kind)?,
            floor,
        )),
        None => None,
    };

    Ok(Json(NearestResponse { node, path }))
}

#[derive(Debug, Serialize)]
struct RouteSummary {
    total_distance: f64,
    total_duration: f64,
    steps: Vec<String>,
    polyline: Vec<[f64; 2]>,
}

impl From<&RouteDocument> for RouteSummary {
    fn from(route: &RouteDocument) -> Self {
        Self {
            total_distance: route.total_distance,
            total_duration: route.total_duration,
            steps: route.steps.iter().map(|s| s.instruction.clone()).collect(),
            polyline: coordinates(&route.polyline),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartRoute {
    origin: LatLng,
    destination: LatLng,
    #[serde(default)]
    mode: TravelMode,
}

#[derive(Debug, Serialize)]
struct RouteStarted {
    session_id: SessionId,
    route: RouteSummary,
    state: TrackingView,
}

async fn start_route(
    State(state): State<AppState>,
    Json(request): Json<StartRoute>,
) -> Result<(StatusCode, Json<RouteStarted>), ApiError> {
    let origin = Point::from(request.origin);
    let destination = Point::from(request.destination);

    let route = state
        .routes
        .fetch_route(RouteRequest {
            origin,
            destination,
            mode: request.mode,
        })
        .await?;
    let summary = RouteSummary::from(&route);

    let session_id = state.sessions.start_route(route, destination);
    let view = state.sessions.update_location(session_id, origin)?;

    Ok((
        StatusCode::CREATED,
        Json(RouteStarted {
            session_id,
            route: summary,
            state: view,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct StartShuttle {
    origin: LatLng,
    destination: LatLng,
}

#[derive(Debug, Serialize)]
struct ShuttleStarted {
    session_id: SessionId,
    departure: NaiveDateTime,
    origin_stop: String,
    destination_stop: String,
    state: TrackingView,
}

async fn start_shuttle(
    State(state): State<AppState>,
    Json(request): Json<StartShuttle>,
) -> Result<(StatusCode, Json<ShuttleStarted>), ApiError> {
    let origin = Point::from(request.origin);
    let destination = Point::from(request.destination);
    let shuttle = &state.shuttle;

    let campus = if haversine_distance(origin, shuttle.stop(Campus::Sgw).location)
        <= haversine_distance(origin, shuttle.stop(Campus::Loyola).location)
    {
        Campus::Sgw
    } else {
        Campus::Loyola
    };
    let departure = shuttle.schedule.next_departure(campus, (state.now)())?;

    let origin_stop = shuttle.stop(campus);
    let destination_stop = shuttle.stop(campus.other());
    let (walk_to_stop, bus_ride, walk_from_stop) = tokio::try_join!(
        state.routes.fetch_route(RouteRequest {
            origin,
            destination: origin_stop.location,
            mode: TravelMode::Walk,
        }),
        state.routes.fetch_route(RouteRequest {
            origin: origin_stop.location,
            destination: destination_stop.location,
            mode: TravelMode::Drive,
        }),
        state.routes.fetch_route(RouteRequest {
            origin: destination_stop.location,
            destination,
            mode: TravelMode::Walk,
        }),
    )?;

    let response_stops = (origin_stop.name.clone(), destination_stop.name.clone());
    let itinerary = ShuttleItinerary {
        walk_to_stop,
        bus_ride,
        walk_from_stop,
        origin_stop,
        destination_stop,
    };

    let session_id = state.sessions.start_shuttle(
        itinerary,
        Arc::clone(&state.buses),
        shuttle.poll_interval(),
    );
    let view = state.sessions.update_location(session_id, origin)?;

    Ok((
        StatusCode::CREATED,
        Json(ShuttleStarted {
            session_id,
            departure,
            origin_stop: response_stops.0,
            destination_stop: response_stops.1,
            state: view,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct Reroute {
    origin: LatLng,
    mode: Option<TravelMode>,
}

#[derive(Debug, Serialize)]
struct RerouteResult {
    applied: bool,
    ticket: u64,
}

async fn reroute(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(request): Json<Reroute>,
) -> Result<Json<RerouteResult>, ApiError> {
    let ticket = state.sessions.begin_reroute(id, request.mode)?;

    let route = state
        .routes
        .fetch_route(RouteRequest {
            origin: request.origin.into(),
            destination: ticket.destination,
            mode: ticket.mode,
        })
        .await?;
    let applied = state.sessions.apply_route(id, ticket.ticket, route)?;

    Ok(Json(RerouteResult {
        applied,
        ticket: ticket.ticket,
    }))
}

async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(location): Json<LatLng>,
) -> Result<Json<TrackingView>, ApiError> {
    Ok(Json(state.sessions.update_location(id, location.into())?))
}

async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, ApiError> {
    state.sessions.stop(id)?;
    Ok(StatusCode::NO_CONTENT)
}
