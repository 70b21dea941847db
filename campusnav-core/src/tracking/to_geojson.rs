use geo::LineString;
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use serde_json::json;

use super::tracker::TrackingState;
use crate::Error;

impl TrackingState {
    /// Converts the state to a `GeoJSON` `FeatureCollection`: the remaining
    /// route as a line followed by the snapped position as a point.
    pub fn to_geojson(&self) -> Result<FeatureCollection, Error> {
        let line = LineString::from(self.clipped_polyline.clone());
        let route = json!({
            "type": "Feature",
            "geometry": Geometry::new(GeoJsonValue::from(&line)),
            "properties": {
                "feature_type": "remaining_route",
                "remaining_distance": self.remaining_distance,
                "remaining_time": self.remaining_time,
                "instruction": self.instruction,
            }
        });

        let position = json!({
            "type": "Feature",
            "geometry": Geometry::new(GeoJsonValue::from(&self.snapped_point)),
            "properties": {
                "feature_type": "position",
                "on_route": self.on_route,
                "heading": self.heading,
            }
        });

        let features = [route, position]
            .into_iter()
            .map(|value| Feature::from_json_value(value).map_err(|e| Error::GeoJsonError(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        })
    }

    pub fn to_geojson_string(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.to_geojson()?)?)
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;

    use super::*;

    #[test]
    fn test_state_to_geojson() {
        let state = TrackingState {
            snapped_point: Point::new(-73.5788, 45.4975),
            on_route: true,
            remaining_distance: 164.5,
            remaining_time: 118.0,
            instruction: "Turn right onto De Maisonneuve Blvd".to_string(),
            clipped_polyline: vec![
                Point::new(-73.5788, 45.4975),
                Point::new(-73.5788, 45.4980),
                Point::new(-73.5774, 45.4980),
            ],
            heading: Some(0.0),
        };

        let collection = state.to_geojson().unwrap();
        assert_eq!(collection.features.len(), 2);

        let route = &collection.features[0];
        match &route.geometry.as_ref().unwrap().value {
            GeoJsonValue::LineString(coords) => assert_eq!(coords.len(), 3),
            other => panic!("expected a line, got {other:?}"),
        }
        assert_eq!(
            route.property("instruction").and_then(|v| v.as_str()),
            Some("Turn right onto De Maisonneuve Blvd")
        );

        let position = &collection.features[1];
        assert!(matches!(
            position.geometry.as_ref().unwrap().value,
            GeoJsonValue::Point(_)
        ));
        assert_eq!(
            position.property("heading").and_then(serde_json::Value::as_f64),
            Some(0.0)
        );

        let text = state.to_geojson_string().unwrap();
        assert!(text.contains("FeatureCollection"));
    }
}
