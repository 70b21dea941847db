//! Parsing of Google-Directions-shaped responses into [`RouteDocument`]s.

use geo::Point;
use itertools::Itertools;
use log::debug;
use serde::Deserialize;

use crate::Error;
use crate::tracking::{RouteDocument, RouteStep, TravelMode};

/// Precision of the encoded polylines returned by the directions service
pub const POLYLINE_PRECISION: u32 = 5;

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<ApiRoute>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    overview_polyline: Option<EncodedPolyline>,
    #[serde(default)]
    legs: Vec<ApiLeg>,
}

#[derive(Debug, Deserialize)]
struct EncodedPolyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    distance: Option<TextValue>,
    duration: Option<TextValue>,
    #[serde(default)]
    steps: Vec<ApiStep>,
}

#[derive(Debug, Deserialize)]
struct ApiStep {
    start_location: LatLng,
    end_location: LatLng,
    distance: TextValue,
    duration: TextValue,
    #[serde(default)]
    html_instructions: String,
    polyline: Option<EncodedPolyline>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<LatLng> for Point<f64> {
    fn from(location: LatLng) -> Self {
        Point::new(location.lng, location.lat)
    }
}

/// Decodes an encoded polyline into `(lng, lat)` points
pub fn decode_polyline(encoded: &str) -> Result<Vec<Point<f64>>, Error> {
    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION)
        .map_err(|e| Error::InvalidData(format!("bad polyline: {e}")))?;
    Ok(line.points().collect())
}

/// Builds a route document from the first route and first leg of a
/// directions response body.
///
/// # Errors
///
/// - [`Error::NoRoutesFound`] for `ZERO_RESULTS`/`NOT_FOUND` or an empty route list
/// - [`Error::FetchFailed`] for any other non-`OK` status
/// - [`Error::MissingPolyline`] when the route has no overview polyline
/// - [`Error::InvalidData`] / [`Error::JsonError`] for malformed bodies
pub fn parse_directions(body: &str, mode: TravelMode) -> Result<RouteDocument, Error> {
    let response: DirectionsResponse = serde_json::from_str(body)?;

    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" | "NOT_FOUND" => return Err(Error::NoRoutesFound),
        status => {
            return Err(Error::FetchFailed(match response.error_message {
                Some(message) => format!("{status}: {message}"),
                None => status.to_string(),
            }));
        }
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or(Error::NoRoutesFound)?;
    let overview = route.overview_polyline.ok_or(Error::MissingPolyline)?;
    let polyline = decode_polyline(&overview.points)?;
    if polyline.is_empty() {
        return Err(Error::MissingPolyline);
    }

    let leg = route
        .legs
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidData("route has no legs".to_string()))?;

    let steps = leg
        .steps
        .into_iter()
        .map(|step| {
            let points = match &step.polyline {
                Some(encoded) => decode_polyline(&encoded.points)?,
                None => vec![step.start_location.into(), step.end_location.into()],
            };
            Ok(RouteStep {
                start: step.start_location.into(),
                end: step.end_location.into(),
                ..RouteStep::new(
                    strip_html(&step.html_instructions),
                    points,
                    step.distance.value,
                    step.duration.value,
                )
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut document = RouteDocument::from_steps(steps, mode);
    document.polyline = polyline;
    if let Some(distance) = leg.distance {
        document.total_distance = distance.value;
    }
    if let Some(duration) = leg.duration {
        document.total_duration = duration.value;
    }

    debug!(
        "Parsed {:?} route: {} steps, {} m, {} s",
        mode,
        document.steps.len(),
        document.total_distance,
        document.total_duration
    );
    Ok(document)
}

/// Removes markup from an instruction, turning block boundaries into spaces
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    text.split_whitespace().join(" ")
}
