//! Reliability index accumulation.
//!
//! [`IndexAccumulator`] holds running sums over completed trials. Folding a
//! trial and merging two accumulators are both additive, so partial results
//! from parallel workers combine in any order or grouping. Dispersion of the
//! per-trial LOLH and EUE is tracked with Welford's algorithm and combined
//! across workers with Chan's parallel update.

use crate::outage::TrialOutcome;
use serde::{Deserialize, Serialize};

/// Streaming mean/variance (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    pub count: u64,
    pub mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Combine two disjoint samples (Chan et al.).
    pub fn merge(&self, other: &RunningStats) -> RunningStats {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        RunningStats {
            count: self.count + other.count,
            mean: self.mean + delta * n_b / n,
            m2: self.m2 + other.m2 + delta * delta * n_a * n_b / n,
        }
    }

    /// Unbiased sample variance; zero below two samples.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean, σ/√n.
    pub fn standard_error(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.std_dev() / (self.count as f64).sqrt()
        }
    }

    /// Coefficient of variation of the estimate, σ/(μ·√n). Undefined for a
    /// zero mean or fewer than two samples.
    pub fn cov(&self) -> Option<f64> {
        if self.count < 2 || self.mean <= 0.0 {
            None
        } else {
            Some(self.standard_error() / self.mean)
        }
    }
}

/// Dimensions every accumulator in one study must share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorShape {
    pub horizon_hours: usize,
    pub hours_per_day: usize,
    pub n_bus: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexAccumulator {
    shape: AccumulatorShape,
    trials: u64,
    loss_hours: u64,
    loss_days: u64,
    events: u64,
    unserved_mwh: f64,
    epns_sum: f64,
    mdt_sum: f64,
    hourly_loss_count: Vec<u64>,
    bus_unserved_mwh: Vec<f64>,
    bus_loss_hours: Vec<u64>,
    lolh: RunningStats,
    eue: RunningStats,
}

/// Final study indices. Per-period values refer to one simulated horizon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityIndices {
    pub trials: u64,
    pub horizon_hours: usize,
    /// Probability that a simulated hour has loss of load
    pub lolp: f64,
    /// Loss-of-load hours per period
    pub lolh: f64,
    /// Loss-of-load expectation, hours per period. Equals hours per year only
    /// when the horizon is 8760 h; see `lole_annual`.
    pub lole: f64,
    /// `lole` scaled to an 8760-hour year
    pub lole_annual: f64,
    /// Days with any loss of load, per period
    pub lole_days: f64,
    /// Loss-of-load events per period
    pub lolf: f64,
    /// Expected unserved energy, MWh per period
    pub eue: f64,
    /// Expected power not supplied during loss-of-load hours (MW)
    pub epns: f64,
    /// Mean outage duration (hours)
    pub mdt: f64,
    pub lolh_std_error: f64,
    pub eue_std_error: f64,
    pub lolh_cov: Option<f64>,
    pub eue_cov: Option<f64>,
}

/// Month × hour-of-day percentage of days with loss of load at that hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatMap {
    /// 12 rows (January first) of 24 hourly percentages
    pub values: Vec<Vec<f64>>,
}

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const HOURS_PER_YEAR: f64 = 8760.0;
const DAYS_IN_MONTH: [usize; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

fn month_of(day_of_year: usize) -> usize {
    let mut remaining = day_of_year;
    for (month, days) in DAYS_IN_MONTH.iter().enumerate() {
        if remaining < *days {
            return month;
        }
        remaining -= days;
    }
    11
}

fn per_trial(total: f64, trials: u64) -> f64 {
    if trials == 0 {
        0.0
    } else {
        total / trials as f64
    }
}

impl IndexAccumulator {
    pub fn new(shape: AccumulatorShape) -> Self {
        Self {
            shape,
            trials: 0,
            loss_hours: 0,
            loss_days: 0,
            events: 0,
            unserved_mwh: 0.0,
            epns_sum: 0.0,
            mdt_sum: 0.0,
            hourly_loss_count: vec![0; shape.horizon_hours],
            bus_unserved_mwh: vec![0.0; shape.n_bus],
            bus_loss_hours: vec![0; shape.n_bus],
            lolh: RunningStats::default(),
            eue: RunningStats::default(),
        }
    }

    pub fn shape(&self) -> AccumulatorShape {
        self.shape
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }

    /// Whether the internal arrays match the declared shape.
    pub fn is_well_formed(&self) -> bool {
        self.hourly_loss_count.len() == self.shape.horizon_hours
            && self.bus_unserved_mwh.len() == self.shape.n_bus
            && self.bus_loss_hours.len() == self.shape.n_bus
            && self.lolh.count == self.trials
            && self.eue.count == self.trials
    }

    /// Add one trial's contribution. Loss-free trials only advance the trial count.
    pub fn fold_trial(mut self, outcome: &TrialOutcome) -> Self {
        let loss_hours = outcome.loss_hours();
        let unserved = outcome.unserved_energy_mwh();
        let events = outcome.events.len();

        self.trials += 1;
        self.loss_hours += loss_hours as u64;
        self.loss_days += outcome.loss_days(self.shape.hours_per_day) as u64;
        self.events += events as u64;
        self.unserved_mwh += unserved;
        if loss_hours > 0 {
            self.epns_sum += unserved / loss_hours as f64;
        }
        if events > 0 {
            self.mdt_sum += loss_hours as f64 / events as f64;
        }
        for (count, flag) in self.hourly_loss_count.iter_mut().zip(&outcome.loss_of_load) {
            if *flag {
                *count += 1;
            }
        }
        for (total, e) in self.bus_unserved_mwh.iter_mut().zip(&outcome.bus_unserved_mwh) {
            *total += e;
        }
        for (total, h) in self.bus_loss_hours.iter_mut().zip(&outcome.bus_loss_hours) {
            *total += *h as u64;
        }
        self.lolh.push(loss_hours as f64);
        self.eue.push(unserved);
        self
    }

    /// Combine two accumulators from disjoint trial sets.
    pub fn merge(mut self, other: &IndexAccumulator) -> Result<Self, String> {
        if self.shape != other.shape {
            return Err(format!(
                "accumulator shape {:?} does not match {:?}",
                other.shape, self.shape
            ));
        }
        if !other.is_well_formed() {
            return Err("accumulator arrays do not match its declared shape".to_string());
        }
        self.trials += other.trials;
        self.loss_hours += other.loss_hours;
        self.loss_days += other.loss_days;
        self.events += other.events;
        self.unserved_mwh += other.unserved_mwh;
        self.epns_sum += other.epns_sum;
        self.mdt_sum += other.mdt_sum;
        for (a, b) in self.hourly_loss_count.iter_mut().zip(&other.hourly_loss_count) {
            *a += b;
        }
        for (a, b) in self.bus_unserved_mwh.iter_mut().zip(&other.bus_unserved_mwh) {
            *a += b;
        }
        for (a, b) in self.bus_loss_hours.iter_mut().zip(&other.bus_loss_hours) {
            *a += b;
        }
        self.lolh = self.lolh.merge(&other.lolh);
        self.eue = self.eue.merge(&other.eue);
        Ok(self)
    }

    /// Expectation-valued indices; all zero when no trials were folded.
    pub fn finalize(&self) -> ReliabilityIndices {
        let n = self.trials;
        let lolh = per_trial(self.loss_hours as f64, n);
        ReliabilityIndices {
            trials: n,
            horizon_hours: self.shape.horizon_hours,
            lolp: if self.shape.horizon_hours == 0 {
                0.0
            } else {
                lolh / self.shape.horizon_hours as f64
            },
            lolh,
            lole: lolh,
            lole_annual: if self.shape.horizon_hours == 0 {
                0.0
            } else {
                lolh * HOURS_PER_YEAR / self.shape.horizon_hours as f64
            },
            lole_days: per_trial(self.loss_days as f64, n),
            lolf: per_trial(self.events as f64, n),
            eue: per_trial(self.unserved_mwh, n),
            epns: per_trial(self.epns_sum, n),
            mdt: per_trial(self.mdt_sum, n),
            lolh_std_error: self.lolh.standard_error(),
            eue_std_error: self.eue.standard_error(),
            lolh_cov: self.lolh.cov(),
            eue_cov: self.eue.cov(),
        }
    }

    /// Fraction of trials with loss of load at each simulated hour.
    pub fn hourly_lolp(&self) -> Vec<f64> {
        self.hourly_loss_count
            .iter()
            .map(|c| per_trial(*c as f64, self.trials))
            .collect()
    }

    /// Per-bus `(EUE MWh, loss-of-load hours)` per period.
    pub fn bus_indices(&self) -> Vec<(f64, f64)> {
        self.bus_unserved_mwh
            .iter()
            .zip(&self.bus_loss_hours)
            .map(|(e, h)| (per_trial(*e, self.trials), per_trial(*h as f64, self.trials)))
            .collect()
    }

    /// Month × hour-of-day outage percentages over a 365-day calendar.
    ///
    /// Available only for 24-hour days and whole-day horizons; days past the
    /// first year wrap onto the calendar.
    pub fn heat_map(&self) -> Option<HeatMap> {
        let horizon = self.shape.horizon_hours;
        if self.trials == 0 || self.shape.hours_per_day != 24 || horizon == 0 || horizon % 24 != 0
        {
            return None;
        }
        let mut counts = vec![vec![0u64; 24]; 12];
        let mut days_observed = [0u64; 12];
        for day in 0..horizon / 24 {
            let month = month_of(day % 365);
            days_observed[month] += 1;
            for hour in 0..24 {
                counts[month][hour] += self.hourly_loss_count[day * 24 + hour];
            }
        }
        let values = counts
            .iter()
            .zip(days_observed)
            .map(|(row, days)| {
                row.iter()
                    .map(|c| {
                        if days == 0 {
                            0.0
                        } else {
                            100.0 * *c as f64 / (self.trials * days) as f64
                        }
                    })
                    .collect()
            })
            .collect();
        Some(HeatMap { values })
    }
}
