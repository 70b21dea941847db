//! Server configuration, read from a TOML file. Every field has a default so
//! an empty (or missing) file yields a working local setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use campusnav_core::tracking::{Campus, CampusDepartures, ShuttleSchedule, ShuttleStop};
use chrono::NaiveTime;
use geo::Point;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// JSON floor-plan catalog
    pub floor_plans: PathBuf,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    /// Sessions without a client request for this long are evicted
    pub session_idle_timeout_secs: u64,
    pub directions: DirectionsConfig,
    pub shuttle: ShuttleConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            floor_plans: PathBuf::from("data/floor_plans.json"),
            request_timeout_secs: 30,
            max_concurrent_requests: 256,
            session_idle_timeout_secs: 30 * 60,
            directions: DirectionsConfig::default(),
            shuttle: ShuttleConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads the config file, or returns the defaults when no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectionsConfig {
    pub base_url: String,
    pub api_key: String,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/directions/json".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopConfig {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl StopConfig {
    pub fn to_stop(&self) -> ShuttleStop {
        ShuttleStop::new(self.name.clone(), Point::new(self.lng, self.lat))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShuttleConfig {
    pub bus_positions_url: String,
    pub poll_interval_secs: u64,
    pub sgw_stop: StopConfig,
    pub loyola_stop: StopConfig,
    pub schedule: ShuttleSchedule,
}

impl Default for ShuttleConfig {
    fn default() -> Self {
        Self {
            bus_positions_url:
                "https://shuttle.concordia.ca/concordiabusmap/WebService/GService.asmx/GetGoogleObject"
                    .to_string(),
            poll_interval_secs: 15,
            sgw_stop: StopConfig {
                name: "SGW".to_string(),
                lat: 45.497_163,
                lng: -73.578_535,
            },
            loyola_stop: StopConfig {
                name: "Loyola".to_string(),
                lat: 45.458_424,
                lng: -73.638_369,
            },
            schedule: default_schedule(),
        }
    }
}

fn times(departures: &[(u32, u32)]) -> Vec<NaiveTime> {
    departures
        .iter()
        .filter_map(|&(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
        .collect()
}

/// Published weekday timetable, used unless the config file gives one
fn default_schedule() -> ShuttleSchedule {
    ShuttleSchedule {
        sgw: CampusDepartures {
            monday_thursday: times(&[(9, 30), (9, 45), (10, 0), (12, 15), (15, 30), (18, 30)]),
            friday: times(&[(9, 45), (10, 0), (12, 15), (15, 30), (18, 15)]),
        },
        loyola: CampusDepartures {
            monday_thursday: times(&[(9, 15), (9, 30), (9, 45), (12, 0), (15, 15), (18, 15)]),
            friday: times(&[(9, 15), (9, 30), (12, 0), (15, 15), (18, 0)]),
        },
    }
}

impl ShuttleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn stop(&self, campus: Campus) -> ShuttleStop {
        match campus {
            Campus::Sgw => self.sgw_stop.to_stop(),
            Campus::Loyola => self.loyola_stop.to_stop(),
        }
    }
}
