//! Inter-campus shuttle timetable.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Campus {
    Sgw,
    Loyola,
}

impl Campus {
    pub fn other(self) -> Self {
        match self {
            Campus::Sgw => Campus::Loyola,
            Campus::Loyola => Campus::Sgw,
        }
    }
}

/// Departure times from one campus. There is no weekend service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampusDepartures {
    #[serde(default)]
    pub monday_thursday: Vec<NaiveTime>,
    #[serde(default)]
    pub friday: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShuttleSchedule {
    #[serde(default)]
    pub sgw: CampusDepartures,
    #[serde(default)]
    pub loyola: CampusDepartures,
}

impl ShuttleSchedule {
    /// Whether no campus has any departure on any day
    pub fn is_empty(&self) -> bool {
        [&self.sgw, &self.loyola]
            .iter()
            .all(|campus| campus.monday_thursday.is_empty() && campus.friday.is_empty())
    }

    /// Departures leaving `campus` on `weekday`, in file order
    pub fn departures(&self, campus: Campus, weekday: Weekday) -> &[NaiveTime] {
        let departures = match campus {
            Campus::Sgw => &self.sgw,
            Campus::Loyola => &self.loyola,
        };
        match weekday {
            Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu => {
                &departures.monday_thursday
            }
            Weekday::Fri => &departures.friday,
            Weekday::Sat | Weekday::Sun => &[],
        }
    }

    /// Earliest departure from `campus` at or after `now`, on the same day
    ///
    /// # Errors
    ///
    /// [`Error::NoShuttleAvailable`] when the day has no service or the last
    /// bus has already left.
    pub fn next_departure(&self, campus: Campus, now: NaiveDateTime) -> Result<NaiveDateTime, Error> {
        self.departures(campus, now.weekday())
            .iter()
            .filter(|departure| **departure >= now.time())
            .min()
            .map(|departure| now.date().and_time(*departure))
            .ok_or(Error::NoShuttleAvailable)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn schedule() -> ShuttleSchedule {
        serde_json::from_str(
            r#"{
                "sgw": {
                    "monday_thursday": ["09:30:00", "09:45:00", "18:30:00"],
                    "friday": ["09:45:00", "10:00:00"]
                },
                "loyola": {
                    "monday_thursday": ["09:15:00", "18:15:00"]
                }
            }"#,
        )
        .unwrap()
    }

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_next_departure_on_weekday() {
        let schedule = schedule();
        // 2026-10-14 is a Wednesday
        let next = schedule.next_departure(Campus::Sgw, at(2026, 10, 14, 9, 31)).unwrap();
        assert_eq!(next, at(2026, 10, 14, 9, 45));

        let exact = schedule.next_departure(Campus::Sgw, at(2026, 10, 14, 9, 30)).unwrap();
        assert_eq!(exact, at(2026, 10, 14, 9, 30));
    }

    #[test]
    fn test_friday_uses_its_own_timetable() {
        let schedule = schedule();
        let next = schedule.next_departure(Campus::Sgw, at(2026, 10, 16, 9, 31)).unwrap();
        assert_eq!(next, at(2026, 10, 16, 9, 45));

        assert!(matches!(
            schedule.next_departure(Campus::Loyola, at(2026, 10, 16, 8, 0)),
            Err(Error::NoShuttleAvailable)
        ));
    }

    #[test]
    fn test_no_service_after_last_bus_or_on_weekends() {
        let schedule = schedule();
        assert!(matches!(
            schedule.next_departure(Campus::Sgw, at(2026, 10, 14, 19, 0)),
            Err(Error::NoShuttleAvailable)
        ));
        assert!(matches!(
            schedule.next_departure(Campus::Sgw, at(2026, 10, 17, 9, 0)),
            Err(Error::NoShuttleAvailable)
        ));
    }

    #[test]
    fn test_campus_wire_names() {
        let campus: Campus = serde_json::from_str("\"LOYOLA\"").unwrap();
        assert_eq!(campus, Campus::Loyola);
        assert_eq!(campus.other(), Campus::Sgw);
    }

    #[test]
    fn test_empty_schedule() {
        assert!(ShuttleSchedule::default().is_empty());
        assert!(!schedule().is_empty());
    }
}
