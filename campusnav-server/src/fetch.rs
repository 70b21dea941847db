//! Outbound HTTP: route fetches from the directions service and live shuttle
//! bus positions.

use campusnav_core::Error;
use campusnav_core::directions::parse_directions;
use campusnav_core::tracking::{BusPosition, RouteDocument, TravelMode};
use futures::future::BoxFuture;
use geo::Point;
use serde::Deserialize;

use crate::config::{DirectionsConfig, ShuttleConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub origin: Point<f64>,
    pub destination: Point<f64>,
    pub mode: TravelMode,
}

pub trait RouteFetcher: Send + Sync {
    fn fetch_route(&self, request: RouteRequest) -> BoxFuture<'_, Result<RouteDocument, Error>>;
}

pub trait BusPositionSource: Send + Sync {
    fn fetch_positions(&self) -> BoxFuture<'_, Result<Vec<BusPosition>, Error>>;
}

fn fetch_failed(error: reqwest::Error) -> Error {
    Error::FetchFailed(error.to_string())
}

fn lat_lng(point: Point<f64>) -> String {
    format!("{},{}", point.y(), point.x())
}

#[derive(Debug, Clone)]
pub struct HttpDirectionsClient {
    client: reqwest::Client,
    config: DirectionsConfig,
}

impl HttpDirectionsClient {
    pub fn new(client: reqwest::Client, config: DirectionsConfig) -> Self {
        Self { client, config }
    }

    async fn fetch(&self, request: RouteRequest) -> Result<RouteDocument, Error> {
        let body = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("origin", lat_lng(request.origin)),
                ("destination", lat_lng(request.destination)),
                ("mode", request.mode.as_directions_param().to_string()),
                ("key", self.config.api_key.clone()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_failed)?
            .text()
            .await
            .map_err(fetch_failed)?;

        parse_directions(&body, request.mode)
    }
}

impl RouteFetcher for HttpDirectionsClient {
    fn fetch_route(&self, request: RouteRequest) -> BoxFuture<'_, Result<RouteDocument, Error>> {
        Box::pin(self.fetch(request))
    }
}

#[derive(Debug, Deserialize)]
struct BusMapResponse {
    d: BusMapData,
}

#[derive(Debug, Deserialize)]
struct BusMapData {
    #[serde(rename = "Points", default)]
    points: Vec<BusMapPoint>,
}

#[derive(Debug, Deserialize)]
struct BusMapPoint {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
}

/// Extracts the buses from a bus-map payload; other map points (stops) are skipped
pub fn parse_bus_positions(body: &str) -> Result<Vec<BusPosition>, Error> {
    let response: BusMapResponse = serde_json::from_str(body)?;
    Ok(response
        .d
        .points
        .into_iter()
        .filter(|point| point.id.starts_with("BUS"))
        .map(|point| BusPosition {
            id: point.id,
            location: Point::new(point.longitude, point.latitude),
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct HttpBusPositions {
    client: reqwest::Client,
    url: String,
}

impl HttpBusPositions {
    pub fn new(client: reqwest::Client, config: &ShuttleConfig) -> Self {
        Self {
            client,
            url: config.bus_positions_url.clone(),
        }
    }

    async fn fetch(&self) -> Result<Vec<BusPosition>, Error> {
        let body = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body("{}")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_failed)?
            .text()
            .await
            .map_err(fetch_failed)?;

        parse_bus_positions(&body)
    }
}

impl BusPositionSource for HttpBusPositions {
    fn fetch_positions(&self) -> BoxFuture<'_, Result<Vec<BusPosition>, Error>> {
        Box::pin(self.fetch())
    }
}
