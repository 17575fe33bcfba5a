//! Order in which a student's packages are drawn down.

use std::fmt::Debug;

use drivedesk_domain::HourPackage;

/// Decides which packages a deduction consumes first.
///
/// Implementations receive the student's packages in insertion order and must
/// reorder them in place. Exhausted packages are filtered out by the caller.
pub trait ConsumptionPolicy: Debug + Send + Sync {
    fn order(&self, packages: &mut Vec<HourPackage>);

    fn name(&self) -> &'static str;
}

/// Oldest purchase first; packages bought on the same day keep insertion order.
#[derive(Debug, Default, Clone, Copy)]
pub struct OldestPurchaseFirst;

impl ConsumptionPolicy for OldestPurchaseFirst {
    fn order(&self, packages: &mut Vec<HourPackage>) {
        packages.sort_by_key(|package| package.purchase_date);
    }

    fn name(&self) -> &'static str {
        "oldest-first"
    }
}

/// Newest purchase first; same-day packages keep insertion order.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewestPurchaseFirst;

impl ConsumptionPolicy for NewestPurchaseFirst {
    fn order(&self, packages: &mut Vec<HourPackage>) {
        packages.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));
    }

    fn name(&self) -> &'static str {
        "newest-first"
    }
}
