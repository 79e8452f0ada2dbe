//! Loss-of-load event tracking within one trial.
//!
//! An event opens on the first hour any bus curtails more than the tolerance
//! and closes on the first later hour with no such bus. Events still open at
//! the end of the horizon are closed by [`OutageTracker::finish`].

use serde::Serialize;

/// One loss-of-load event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageRecord {
    pub trial: usize,
    pub start_hour: usize,
    pub duration_hours: usize,
    pub unserved_energy_mwh: f64,
    /// Distinct buses that curtailed during the event
    pub buses_affected: usize,
    pub peak_curtailment_mw: f64,
}

#[derive(Debug, Clone)]
struct OpenEvent {
    start_hour: usize,
    duration_hours: usize,
    unserved_energy_mwh: f64,
    peak_curtailment_mw: f64,
    buses: Vec<bool>,
}

/// Everything one trial contributes to the study indices.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub trial: usize,
    pub events: Vec<OutageRecord>,
    /// Loss-of-load flag per simulated hour
    pub loss_of_load: Vec<bool>,
    pub bus_unserved_mwh: Vec<f64>,
    pub bus_loss_hours: Vec<u32>,
}

impl TrialOutcome {
    pub fn loss_hours(&self) -> usize {
        self.loss_of_load.iter().filter(|flag| **flag).count()
    }

    pub fn unserved_energy_mwh(&self) -> f64 {
        self.events.iter().map(|e| e.unserved_energy_mwh).sum()
    }

    /// Days (blocks of `hours_per_day` hours) containing at least one loss hour.
    pub fn loss_days(&self, hours_per_day: usize) -> usize {
        if hours_per_day == 0 {
            return 0;
        }
        self.loss_of_load
            .chunks(hours_per_day)
            .filter(|day| day.iter().any(|flag| *flag))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct OutageTracker {
    trial: usize,
    tolerance_mw: f64,
    open: Option<OpenEvent>,
    events: Vec<OutageRecord>,
    loss_of_load: Vec<bool>,
    bus_unserved_mwh: Vec<f64>,
    bus_loss_hours: Vec<u32>,
}

impl OutageTracker {
    pub fn new(trial: usize, horizon_hours: usize, n_bus: usize, tolerance_mw: f64) -> Self {
        Self {
            trial,
            tolerance_mw,
            open: None,
            events: Vec::new(),
            loss_of_load: vec![false; horizon_hours],
            bus_unserved_mwh: vec![0.0; n_bus],
            bus_loss_hours: vec![0; n_bus],
        }
    }

    /// Register one hour's per-bus curtailment (MW, held for the hour).
    pub fn record_hour(&mut self, curtailment: &[f64], hour: usize) {
        let short: Vec<bool> = curtailment.iter().map(|c| *c > self.tolerance_mw).collect();
        if !short.iter().any(|s| *s) {
            self.close();
            return;
        }

        let energy: f64 = curtailment
            .iter()
            .zip(&short)
            .filter(|(_, s)| **s)
            .map(|(c, _)| *c)
            .sum();
        if hour >= self.loss_of_load.len() {
            self.loss_of_load.resize(hour + 1, false);
        }
        self.loss_of_load[hour] = true;
        for (bus, (c, s)) in curtailment.iter().zip(&short).enumerate() {
            if *s {
                if let Some(total) = self.bus_unserved_mwh.get_mut(bus) {
                    *total += c;
                }
                if let Some(hours) = self.bus_loss_hours.get_mut(bus) {
                    *hours += 1;
                }
            }
        }

        let n_bus = curtailment.len();
        let event = self.open.get_or_insert_with(|| OpenEvent {
            start_hour: hour,
            duration_hours: 0,
            unserved_energy_mwh: 0.0,
            peak_curtailment_mw: 0.0,
            buses: vec![false; n_bus],
        });
        event.duration_hours += 1;
        event.unserved_energy_mwh += energy;
        event.peak_curtailment_mw = event.peak_curtailment_mw.max(energy);
        for (seen, s) in event.buses.iter_mut().zip(&short) {
            *seen |= *s;
        }
    }

    fn close(&mut self) {
        if let Some(event) = self.open.take() {
            self.events.push(OutageRecord {
                trial: self.trial,
                start_hour: event.start_hour,
                duration_hours: event.duration_hours,
                unserved_energy_mwh: event.unserved_energy_mwh,
                buses_affected: event.buses.iter().filter(|b| **b).count(),
                peak_curtailment_mw: event.peak_curtailment_mw,
            });
        }
    }

    /// Close any event still open at the horizon and hand over the trial's results.
    pub fn finish(mut self) -> TrialOutcome {
        self.close();
        TrialOutcome {
            trial: self.trial,
            events: self.events,
            loss_of_load: self.loss_of_load,
            bus_unserved_mwh: self.bus_unserved_mwh,
            bus_loss_hours: self.bus_loss_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hour_event() {
        let mut tracker = OutageTracker::new(2, 24, 2, 1e-4);
        for hour in 0..24 {
            let curtailment = if hour == 10 { [0.0, 15.0] } else { [0.0, 0.0] };
            tracker.record_hour(&curtailment, hour);
        }
        let outcome = tracker.finish();
        assert_eq!(outcome.events.len(), 1);
        let event = &outcome.events[0];
        assert_eq!(event.trial, 2);
        assert_eq!(event.start_hour, 10);
        assert_eq!(event.duration_hours, 1);
        assert_eq!(event.unserved_energy_mwh, 15.0);
        assert_eq!(event.buses_affected, 1);
        assert_eq!(outcome.loss_hours(), 1);
        assert_eq!(outcome.bus_loss_hours, vec![0, 1]);
    }

    #[test]
    fn test_consecutive_hours_merge_into_one_event() {
        let mut tracker = OutageTracker::new(0, 6, 2, 1e-4);
        tracker.record_hour(&[1.0, 0.0], 1);
        tracker.record_hour(&[0.0, 2.0], 2);
        tracker.record_hour(&[3.0, 3.0], 3);
        tracker.record_hour(&[0.0, 0.0], 4);
        let outcome = tracker.finish();
        assert_eq!(outcome.events.len(), 1);
        let event = &outcome.events[0];
        assert_eq!(event.duration_hours, 3);
        assert_eq!(event.unserved_energy_mwh, 9.0);
        assert_eq!(event.buses_affected, 2);
        assert_eq!(event.peak_curtailment_mw, 6.0);
    }

    #[test]
    fn test_open_event_flushed_at_horizon() {
        let mut tracker = OutageTracker::new(0, 4, 1, 1e-4);
        tracker.record_hour(&[0.0], 0);
        tracker.record_hour(&[5.0], 2);
        tracker.record_hour(&[5.0], 3);
        let outcome = tracker.finish();
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].start_hour, 2);
        assert_eq!(outcome.events[0].duration_hours, 2);
    }

    #[test]
    fn test_solver_noise_below_tolerance_ignored() {
        let mut tracker = OutageTracker::new(0, 2, 1, 1e-4);
        tracker.record_hour(&[5e-5], 0);
        tracker.record_hour(&[0.0], 1);
        let outcome = tracker.finish();
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.loss_hours(), 0);
    }

    #[test]
    fn test_loss_days() {
        let mut tracker = OutageTracker::new(0, 48, 1, 1e-4);
        for hour in 0..48 {
            let c = if matches!(hour, 3 | 5 | 30) { 1.0 } else { 0.0 };
            tracker.record_hour(&[c], hour);
        }
        let outcome = tracker.finish();
        assert_eq!(outcome.events.len(), 3);
        assert_eq!(outcome.loss_days(24), 2);
    }
}
