//! Calendar search and per-slot heuristics. Everything here is pure; the
//! suggestion service gathers the inputs from the store.

use chrono::{NaiveDate, NaiveTime};

use shared_models::scheduling::{
    Appointment, AppointmentStatus, AvailabilityWindow, ConfidenceLevel, Provider, TimeOffRequest,
    TimeSlot,
};
use shared_utils::time::{add_minutes, dates_between};

use crate::models::{ScoreStep, SuggestionConfig};

pub struct SlotSearch<'a> {
    pub provider: &'a Provider,
    pub windows: &'a [AvailabilityWindow],
    pub time_off: &'a [TimeOffRequest],
    pub appointments: &'a [Appointment],
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub duration_minutes: i64,
    pub step_minutes: i64,
    pub preferred_time: Option<NaiveTime>,
}

/// Anything but a cancellation occupies the calendar.
pub fn occupies_calendar(appointment: &Appointment) -> bool {
    appointment.status != AppointmentStatus::Cancelled
}

/// Conflict-free slots, preferred start time first, then chronological.
pub fn find_available_slots(search: &SlotSearch) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    if search.duration_minutes <= 0 || search.step_minutes <= 0 {
        return slots;
    }

    let provider_name = search.provider.full_name();
    let blocking: Vec<&Appointment> = search
        .appointments
        .iter()
        .filter(|a| a.provider_id == search.provider.id && occupies_calendar(a))
        .collect();

    for date in dates_between(search.start, search.end) {
        if search.time_off.iter().any(|t| t.blocks(date)) {
            continue;
        }

        let booked_today = blocking.iter().filter(|a| a.appointment_date == date).count();

        let mut windows: Vec<&AvailabilityWindow> = search
            .windows
            .iter()
            .filter(|w| w.applies_to(date))
            .collect();
        windows.sort_by_key(|w| w.start_time);

        for window in windows {
            if let Some(cap) = window.max_appointments_per_day {
                if booked_today as i64 >= cap as i64 {
                    continue;
                }
            }

            let mut start = window.start_time;
            while let Some(end) = add_minutes(start, search.duration_minutes) {
                if end > window.end_time {
                    break;
                }

                let conflict = blocking.iter().any(|a| a.overlaps(date, start, end));
                if !conflict {
                    slots.push(TimeSlot {
                        provider_id: search.provider.id,
                        provider_name: provider_name.clone(),
                        date,
                        start_time: start,
                        end_time: end,
                    });
                }

                match add_minutes(start, search.step_minutes) {
                    Some(next) => start = next,
                    None => break,
                }
            }
        }
    }

    slots.sort_by(|a, b| {
        let a_miss = search.preferred_time.map_or(false, |t| a.start_time != t);
        let b_miss = search.preferred_time.map_or(false, |t| b.start_time != t);
        a_miss
            .cmp(&b_miss)
            .then_with(|| a.date.cmp(&b.date))
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
    slots.dedup_by(|a, b| a.date == b.date && a.start_time == b.start_time);

    slots
}

fn step_score(steps: &[ScoreStep], value: i64, fallback: f64) -> f64 {
    steps
        .iter()
        .find(|step| value <= step.up_to)
        .map_or(fallback, |step| step.score)
}

/// Prefers lighter days.
pub fn day_load_score(config: &SuggestionConfig, same_day_appointments: usize) -> f64 {
    step_score(&config.day_load_steps, same_day_appointments as i64, config.busiest_day_score)
}

/// Prefers slots that sit close to an existing appointment on the same day.
pub fn efficiency_score(config: &SuggestionConfig, slot: &TimeSlot, appointments: &[Appointment]) -> f64 {
    let same_day: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.appointment_date == slot.date && occupies_calendar(a))
        .collect();

    if same_day.is_empty() {
        return config.empty_day_efficiency;
    }

    let min_gap = same_day
        .iter()
        .map(|a| {
            let after = (slot.start_time - a.end_time).num_minutes().abs();
            let before = (a.start_time - slot.end_time).num_minutes().abs();
            after.min(before)
        })
        .min()
        .unwrap_or(i64::MAX);

    step_score(&config.gap_steps, min_gap, config.wide_gap_score)
}

pub fn confidence_for(config: &SuggestionConfig, overall_score: f64) -> ConfidenceLevel {
    if overall_score >= config.high_confidence {
        ConfidenceLevel::High
    } else if overall_score >= config.medium_confidence {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

pub fn reasoning(
    config: &SuggestionConfig,
    provider: &Provider,
    compatibility: f64,
    load_balance: f64,
    efficiency: f64,
) -> String {
    let mut reasons = Vec::new();

    if compatibility >= config.reasoning_threshold {
        reasons.push(format!("Strong compatibility match ({:.0}%)", compatibility * 100.0));
    }
    if load_balance >= config.reasoning_threshold {
        reasons.push("Provider has good availability on this date".to_string());
    }
    if efficiency >= config.reasoning_threshold {
        reasons.push("Minimizes scheduling gaps".to_string());
    }
    if let Some(years) = provider.years_of_experience {
        if years >= config.experienced_years {
            reasons.push(format!("Experienced provider ({} years)", years));
        }
    }
    if reasons.is_empty() {
        reasons.push("Available slot matching requested criteria".to_string());
    }

    format!("{}.", reasons.join(". "))
}
