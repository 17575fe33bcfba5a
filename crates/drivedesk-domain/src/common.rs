//! Shared traits and the `Hours` quantity used by the prepaid-hours ledger.

use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exposes a stable identifier for records kept in the dataset.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Finds the record with `id` in a slice of identifiable records.
pub fn find_by_id<T: Identifiable>(items: &[T], id: Uuid) -> Option<&T> {
    items.iter().find(|item| item.id() == id)
}

/// Mutable counterpart of [`find_by_id`].
pub fn find_by_id_mut<T: Identifiable>(items: &mut [T], id: Uuid) -> Option<&mut T> {
    items.iter_mut().find(|item| item.id() == id)
}

/// A signed quantity of lesson time, stored as whole minutes.
///
/// Balances and deductions are summed exactly; conversion to decimal hours
/// only happens at the display boundary.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Hours(i64);

impl Hours {
    pub const ZERO: Hours = Hours(0);

    pub const fn from_minutes(minutes: i64) -> Self {
        Self(minutes)
    }

    pub const fn whole(hours: i64) -> Self {
        Self(hours * 60)
    }

    /// Converts decimal hours, rounding to the nearest minute.
    /// Returns `None` for NaN or infinite input.
    pub fn from_hours(hours: f64) -> Option<Self> {
        if !hours.is_finite() {
            return None;
        }
        let minutes = (hours * 60.0).round();
        if minutes.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Self(minutes as i64))
    }

    pub const fn minutes(self) -> i64 {
        self.0
    }

    pub fn as_hours(self) -> f64 {
        self.0 as f64 / 60.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}h", self.as_hours())
    }
}

impl Add for Hours {
    type Output = Hours;

    fn add(self, rhs: Hours) -> Hours {
        Hours(self.0 + rhs.0)
    }
}

impl Sub for Hours {
    type Output = Hours;

    fn sub(self, rhs: Hours) -> Hours {
        Hours(self.0 - rhs.0)
    }
}

impl Neg for Hours {
    type Output = Hours;

    fn neg(self) -> Hours {
        Hours(-self.0)
    }
}

impl AddAssign for Hours {
    fn add_assign(&mut self, rhs: Hours) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Hours {
    fn sub_assign(&mut self, rhs: Hours) {
        self.0 -= rhs.0;
    }
}

impl Sum for Hours {
    fn sum<I: Iterator<Item = Hours>>(iter: I) -> Hours {
        iter.fold(Hours::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Hours> for Hours {
    fn sum<I: Iterator<Item = &'a Hours>>(iter: I) -> Hours {
        iter.copied().sum()
    }
}
