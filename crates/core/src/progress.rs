//! Fragment progress and guardian unlock rules.
//!
//! Everything here is derived on read from the catalog and a user's holdings;
//! nothing is persisted.

use std::collections::{HashMap, HashSet};

use crate::model::{Fragment, FragmentId, Guardian, GuardianId, UserFragment};

/// A fragment joined with its guardian. The guardian can be missing when the
/// catalog is inconsistent; such fragments are always locked.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub fragment: Fragment,
    pub guardian: Option<Guardian>,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(fragment: Fragment, guardian: Option<Guardian>) -> Self {
        Self { fragment, guardian }
    }

    fn order(&self) -> Option<u32> {
        self.guardian.as_ref().map(Guardian::progression_order)
    }
}

/// Per-fragment view for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentProgress {
    pub fragment: Fragment,
    pub guardian: Option<Guardian>,
    pub quantity: u32,
    pub percentage: f64,
    pub unlocked: bool,
}

/// `quantity / capacity * 100`, capped at 100. Zero capacity yields 0.
#[must_use]
pub fn percentage(quantity: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    (f64::from(quantity) / f64::from(capacity) * 100.0).min(100.0)
}

fn quantities(owned: &[UserFragment]) -> HashMap<FragmentId, u32> {
    owned.iter().map(|uf| (uf.fragment_id, uf.quantity)).collect()
}

fn held(quantities: &HashMap<FragmentId, u32>, fragment: &Fragment) -> u32 {
    quantities
        .get(&fragment.id())
        .copied()
        .unwrap_or(0)
        .min(fragment.capacity())
}

fn unlocked_with(order: u32, catalog: &[CatalogEntry], quantities: &HashMap<FragmentId, u32>) -> bool {
    if order == 1 {
        return true;
    }
    let Some(current) = catalog.iter().find(|e| e.order() == Some(order)) else {
        return false;
    };
    let Some(previous) = catalog.iter().find(|e| e.order() == Some(order - 1)) else {
        return false;
    };
    let Some(guardian) = current.guardian.as_ref() else {
        return false;
    };
    let prev_pct = percentage(held(quantities, &previous.fragment), previous.fragment.capacity());
    prev_pct >= guardian.unlock_threshold()
}

/// Whether the guardian at `order` is open for a user holding `owned`.
///
/// Order 1 is always open. Any other order opens once the previous guardian's
/// fragment percentage reaches this guardian's threshold. A missing record
/// on either side means locked.
#[must_use]
pub fn is_unlocked(order: u32, catalog: &[CatalogEntry], owned: &[UserFragment]) -> bool {
    unlocked_with(order, catalog, &quantities(owned))
}

/// Join the catalog with a user's holdings, one entry per catalog fragment,
/// in progression order. Fragments without a guardian sort last.
#[must_use]
pub fn aggregate(catalog: &[CatalogEntry], owned: &[UserFragment]) -> Vec<FragmentProgress> {
    let quantities = quantities(owned);
    let mut out: Vec<FragmentProgress> = catalog
        .iter()
        .map(|entry| {
            let quantity = held(&quantities, &entry.fragment);
            let unlocked = entry
                .order()
                .is_some_and(|order| unlocked_with(order, catalog, &quantities));
            FragmentProgress {
                percentage: percentage(quantity, entry.fragment.capacity()),
                fragment: entry.fragment.clone(),
                guardian: entry.guardian.clone(),
                quantity,
                unlocked,
            }
        })
        .collect();
    out.sort_by_key(|p| {
        (
            p.guardian.as_ref().map_or(u32::MAX, Guardian::progression_order),
            p.fragment.id(),
        )
    });
    out
}

/// Ids of the guardians currently open for the user.
#[must_use]
pub fn unlocked_guardian_ids(progress: &[FragmentProgress]) -> HashSet<GuardianId> {
    progress
        .iter()
        .filter(|p| p.unlocked)
        .filter_map(|p| p.guardian.as_ref().map(Guardian::id))
        .collect()
}

/// Total held over total capacity across the whole catalog, rounded to a
/// whole percent.
#[must_use]
pub fn overall_percent(progress: &[FragmentProgress]) -> u32 {
    let held: u64 = progress.iter().map(|p| u64::from(p.quantity)).sum();
    let capacity: u64 = progress.iter().map(|p| u64::from(p.fragment.capacity())).sum();
    if capacity == 0 {
        return 0;
    }
    let pct = (held as f64 / capacity as f64 * 100.0).round().min(100.0);
    // Bounded to 0..=100 above.
    pct as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Area, UserId};
    use crate::time::fixed_now;

    fn entry(id: u64, order: u32, threshold: f64) -> CatalogEntry {
        let guardian = Guardian::new(GuardianId::new(id), format!("G{id}"), Area::Math, order, threshold)
            .unwrap();
        let fragment = Fragment::new(FragmentId::new(id), GuardianId::new(id), format!("F{id}"), 15).unwrap();
        CatalogEntry::new(fragment, Some(guardian))
    }

    fn owned(user: UserId, fragment: u64, quantity: u32) -> UserFragment {
        UserFragment {
            user_id: user,
            fragment_id: FragmentId::new(fragment),
            quantity,
            updated_at: fixed_now(),
        }
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![entry(1, 1, 0.0), entry(2, 2, 60.0), entry(3, 3, 60.0)]
    }

    #[test]
    fn first_guardian_is_always_unlocked() {
        assert!(is_unlocked(1, &catalog(), &[]));
        assert!(is_unlocked(1, &[], &[]));
    }

    #[test]
    fn later_guardians_follow_previous_percentage() {
        let user = UserId::random();
        // 9 / 15 = 60%
        assert!(is_unlocked(2, &catalog(), &[owned(user, 1, 9)]));
        // 8 / 15 = 53.3%
        assert!(!is_unlocked(2, &catalog(), &[owned(user, 1, 8)]));
        assert!(!is_unlocked(3, &catalog(), &[owned(user, 1, 15)]));
    }

    #[test]
    fn missing_records_mean_locked() {
        let user = UserId::random();
        let gap = vec![entry(1, 1, 0.0), entry(3, 3, 0.0)];
        assert!(!is_unlocked(3, &gap, &[owned(user, 1, 15)]));
        assert!(!is_unlocked(4, &catalog(), &[owned(user, 3, 15)]));

        let orphan = CatalogEntry::new(
            Fragment::new(FragmentId::new(9), GuardianId::new(9), "Lost", 15).unwrap(),
            None,
        );
        let mut with_orphan = catalog();
        with_orphan.push(orphan);
        let progress = aggregate(&with_orphan, &[owned(user, 9, 3)]);
        let last = progress.last().unwrap();
        assert_eq!(last.fragment.id(), FragmentId::new(9));
        assert!(!last.unlocked);
    }

    #[test]
    fn aggregate_reports_every_fragment() {
        let user = UserId::random();
        let progress = aggregate(&catalog(), &[owned(user, 1, 15), owned(user, 2, 3)]);
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0].percentage, 100.0);
        assert!((progress[1].percentage - 20.0).abs() < 1e-9);
        assert_eq!(progress[2].quantity, 0);
        assert!(progress[1].unlocked);
        assert!(!progress[2].unlocked);

        let ids = unlocked_guardian_ids(&progress);
        assert!(ids.contains(&GuardianId::new(1)));
        assert!(ids.contains(&GuardianId::new(2)));
        assert!(!ids.contains(&GuardianId::new(3)));
    }

    #[test]
    fn percentage_is_capped_and_zero_safe() {
        assert_eq!(percentage(20, 15), 100.0);
        assert_eq!(percentage(3, 0), 0.0);
    }

    #[test]
    fn overall_percent_uses_catalog_capacity() {
        let user = UserId::random();
        let progress = aggregate(&catalog(), &[owned(user, 1, 15), owned(user, 2, 3)]);
        // 18 / 45
        assert_eq!(overall_percent(&progress), 40);
        assert_eq!(overall_percent(&[]), 0);
    }
}
