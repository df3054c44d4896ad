//! Credit consumption series and heatmaps built from metering rows.

use std::collections::BTreeMap;

use serde::Serialize;
use time::Weekday;

use crate::{MeteringFact, UsageTimestamp};

/// Credits billed in one metered hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub hour: UsageTimestamp,
    pub total_credits: f64,
    pub by_warehouse: BTreeMap<String, f64>,
}

/// Hourly credit time series, oldest hour first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreditSeries {
    pub points: Vec<SeriesPoint>,
    pub total_credits: f64,
}

/// Credits summed over every (weekday, hour-of-day) slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    /// 0 = Monday.
    pub day_of_week: u8,
    pub day_name: &'static str,
    pub hour_of_day: u8,
    pub credits: f64,
}

/// Credits summed per warehouse and hour of day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseHourCell {
    pub warehouse_name: String,
    pub hour_of_day: u8,
    pub credits: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreditHeatmap {
    /// Only slots with metering rows are present.
    pub cells: Vec<HeatmapCell>,
    pub by_warehouse: Vec<WarehouseHourCell>,
    /// Largest value in `cells`, for colour scaling.
    pub max_credits: f64,
}

pub fn credit_series(facts: &[MeteringFact]) -> CreditSeries {
    let mut hours: BTreeMap<UsageTimestamp, BTreeMap<String, f64>> = BTreeMap::new();
    for fact in facts {
        *hours
            .entry(fact.start_time.truncate_to_hour())
            .or_default()
            .entry(fact.warehouse_name.clone())
            .or_default() += fact.credits_used;
    }

    let points = hours
        .into_iter()
        .map(|(hour, by_warehouse)| SeriesPoint {
            hour,
            total_credits: by_warehouse.values().sum(),
            by_warehouse,
        })
        .collect::<Vec<_>>();
    let total_credits = points.iter().map(|point| point.total_credits).sum();

    CreditSeries {
        points,
        total_credits,
    }
}

pub fn credit_heatmap(facts: &[MeteringFact]) -> CreditHeatmap {
    let mut slots: BTreeMap<(u8, u8), f64> = BTreeMap::new();
    let mut warehouse_slots: BTreeMap<(String, u8), f64> = BTreeMap::new();

    for fact in facts {
        let instant = fact.start_time.into_inner();
        let day = instant.weekday().number_days_from_monday();
        let hour = instant.hour();
        *slots.entry((day, hour)).or_default() += fact.credits_used;
        *warehouse_slots
            .entry((fact.warehouse_name.clone(), hour))
            .or_default() += fact.credits_used;
    }

    let cells = slots
        .into_iter()
        .map(|((day_of_week, hour_of_day), credits)| HeatmapCell {
            day_of_week,
            day_name: day_name(day_of_week),
            hour_of_day,
            credits,
        })
        .collect::<Vec<_>>();
    let max_credits = cells.iter().map(|cell| cell.credits).fold(0.0, f64::max);
    let by_warehouse = warehouse_slots
        .into_iter()
        .map(|((warehouse_name, hour_of_day), credits)| WarehouseHourCell {
            warehouse_name,
            hour_of_day,
            credits,
        })
        .collect();

    CreditHeatmap {
        cells,
        by_warehouse,
        max_credits,
    }
}

fn day_name(days_from_monday: u8) -> &'static str {
    let mut weekday = Weekday::Monday;
    for _ in 0..days_from_monday {
        weekday = weekday.next();
    }
    match weekday {
        Weekday::Monday => "Monday",
        Weekday::Tuesday => "Tuesday",
        Weekday::Wednesday => "Wednesday",
        Weekday::Thursday => "Thursday",
        Weekday::Friday => "Friday",
        Weekday::Saturday => "Saturday",
        Weekday::Sunday => "Sunday",
    }
}
