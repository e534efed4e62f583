use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::Trip;
use crate::classify::TransportMode;

/// Reporting window for the travel summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPeriod {
    #[default]
    Week,
    Month,
    Year,
    All,
}

impl SummaryPeriod {
    /// Earliest trip start included, counting back from `now`
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SummaryPeriod::Week => Some(now - Duration::days(7)),
            SummaryPeriod::Month => Some(now - Duration::days(30)),
            SummaryPeriod::Year => Some(now - Duration::days(365)),
            SummaryPeriod::All => None,
        }
    }
}

impl fmt::Display for SummaryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SummaryPeriod::Week => "week",
            SummaryPeriod::Month => "month",
            SummaryPeriod::Year => "year",
            SummaryPeriod::All => "all",
        };
        f.write_str(name)
    }
}

impl FromStr for SummaryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" => Ok(SummaryPeriod::Week),
            "month" => Ok(SummaryPeriod::Month),
            "year" => Ok(SummaryPeriod::Year),
            "all" => Ok(SummaryPeriod::All),
            _ => Err(format!("unknown summary period: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeTotals {
    pub trips: usize,
    pub distance_km: f64,
    pub time_minutes: f64,
}

/// Totals shown on the trips screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub period: SummaryPeriod,
    pub trip_count: usize,
    pub total_distance_km: f64,
    pub total_cost: f64,
    pub total_carbon_saved_kg: f64,
    pub total_time_minutes: f64,
    pub by_mode: BTreeMap<TransportMode, ModeTotals>,
}

impl TripSummary {
    pub fn compute(trips: &[Trip], period: SummaryPeriod, now: DateTime<Utc>) -> Self {
        let since = period.since(now);
        let mut summary = Self {
            period,
            trip_count: 0,
            total_distance_km: 0.0,
            total_cost: 0.0,
            total_carbon_saved_kg: 0.0,
            total_time_minutes: 0.0,
            by_mode: BTreeMap::new(),
        };

        for trip in trips {
            if let Some(since) = since {
                match trip.origin.time() {
                    Some(started) if started >= since && started <= now => {}
                    _ => continue,
                }
            }

            summary.trip_count += 1;
            summary.total_distance_km += trip.distance_km();
            summary.total_cost += trip.cost_estimate;
            summary.total_carbon_saved_kg += trip.carbon_saved_kg;
            summary.total_time_minutes += trip.duration_minutes();

            let totals = summary.by_mode.entry(trip.mode).or_default();
            totals.trips += 1;
            totals.distance_km += trip.distance_km();
            totals.time_minutes += trip.duration_minutes();
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TripEndpoint;

    fn trip(id: &str, mode: TransportMode, started: DateTime<Utc>, km: f64) -> Trip {
        let start_ms = started.timestamp_millis() as u64;
        Trip {
            id: id.to_string(),
            origin: TripEndpoint {
                latitude: 8.5,
                longitude: 76.9,
                timestamp_ms: start_ms,
            },
            destination: TripEndpoint {
                latitude: 8.6,
                longitude: 76.9,
                timestamp_ms: start_ms + 1_200_000,
            },
            mode,
            purpose: None,
            duration_secs: 1_200.0,
            distance_m: km * 1000.0,
            cost_estimate: km * 2.0,
            carbon_saved_kg: km * 0.1,
            created_at: started,
            confirmed: false,
            precise: true,
            track: Vec::new(),
        }
    }

    #[test]
    fn test_period_filters_by_trip_start() {
        let now = Utc::now();
        let trips = vec![
            trip("a", TransportMode::Bus, now - Duration::days(2), 10.0),
            trip("b", TransportMode::Walk, now - Duration::days(3), 1.0),
            trip("c", TransportMode::Bus, now - Duration::days(20), 5.0),
            trip("d", TransportMode::Ferry, now - Duration::days(200), 8.0),
        ];

        let week = TripSummary::compute(&trips, SummaryPeriod::Week, now);
        assert_eq!(week.trip_count, 2);
        assert!((week.total_distance_km - 11.0).abs() < 1e-9);
        assert!((week.total_time_minutes - 40.0).abs() < 1e-9);

        let month = TripSummary::compute(&trips, SummaryPeriod::Month, now);
        assert_eq!(month.trip_count, 3);
        assert_eq!(month.by_mode[&TransportMode::Bus].trips, 2);
        assert!((month.total_cost - 32.0).abs() < 1e-9);

        let all = TripSummary::compute(&trips, SummaryPeriod::All, now);
        assert_eq!(all.trip_count, 4);
        assert!((all.total_carbon_saved_kg - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("Month".parse::<SummaryPeriod>(), Ok(SummaryPeriod::Month));
        assert!("decade".parse::<SummaryPeriod>().is_err());
    }
}
