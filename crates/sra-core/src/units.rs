//! Unit-tagged quantities for adequacy studies.
//!
//! Capacities, energies and durations travel through the registry as newtype
//! wrappers so a rating in MW cannot be confused with an energy in MWh or a
//! repair time in hours.
//!
//! ```
//! use sra_core::units::{Hours, Megawatts, MegawattHours};
//!
//! let e: MegawattHours = Megawatts(50.0) * Hours(4.0);
//! assert_eq!(e.value(), 200.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Div, Mul};

macro_rules! unit {
    ($(#[$meta:meta])* $name:ident, $symbol:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", self.0, $symbol)
            }
        }
    };
}

unit!(
    /// Active power (MW)
    Megawatts,
    "MW"
);
unit!(
    /// Energy (MWh)
    MegawattHours,
    "MWh"
);
unit!(
    /// Duration (h)
    Hours,
    "h"
);

impl Mul<Hours> for Megawatts {
    type Output = MegawattHours;
    fn mul(self, rhs: Hours) -> MegawattHours {
        MegawattHours(self.0 * rhs.0)
    }
}

impl Div<Hours> for MegawattHours {
    type Output = Megawatts;
    fn div(self, rhs: Hours) -> Megawatts {
        Megawatts(self.0 / rhs.0)
    }
}

impl Hours {
    /// Transition rate (1/h) of an exponential holding time with this mean.
    /// An infinite mean maps to a zero rate.
    #[inline]
    pub fn as_rate(self) -> f64 {
        if self.0.is_infinite() {
            0.0
        } else {
            1.0 / self.0
        }
    }
}
