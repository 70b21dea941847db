use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Duplicate node id on floor: {0}")]
    DuplicateNode(String),
    #[error("Unknown building: {0}")]
    UnknownBuilding(String),
    #[error("Unknown floor {floor} in building {building}")]
    UnknownFloor { building: String, floor: String },
    #[error("No path found from {from} to {to}")]
    NoPathFound { from: String, to: String },
    #[error("No routes found")]
    NoRoutesFound,
    #[error("No polyline found in the response")]
    MissingPolyline,
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    #[error("No shuttle departure available")]
    NoShuttleAvailable,
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
