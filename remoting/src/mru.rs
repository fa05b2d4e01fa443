//! Most-recently-used ordering of windows, partitioned by virtual desktop.
//!
//! Conceptually a mapping from desktop id to a max-heap of
//! [`WindowActivatedArgs`] ordered by timestamp descending; grounded on
//! `Monarch.h`'s `std::vector<Remoting::WindowActivatedArgs> _mruPeasants`
//! plus its `_clearOldMruEntries` helper, reshaped into `BinaryHeap`s (one
//! per desktop) the way a plain `std::collections::BinaryHeap` is normally
//! reached for in Rust rather than hand-rolling a heap over a `Vec`.

use crate::args::{DesktopId, WindowActivatedArgs};
use crate::peasant::PeasantId;
use std::collections::{BinaryHeap, HashMap};

/// Per-desktop max-heaps of activation records. Each peasant appears in at
/// most one heap at a time (spec.md §3, invariant 3); re-activating a
/// peasant removes its previous entry before inserting the new one.
#[derive(Default)]
pub struct Mru {
    by_desktop: HashMap<DesktopId, BinaryHeap<WindowActivatedArgs>>,
}

impl Mru {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an activation: remove any existing entry for this peasant
    /// across every desktop, then push the new record into its desktop's
    /// heap (creating the heap if this is the first activation seen for
    /// that desktop).
    pub fn handle_activate(&mut self, args: WindowActivatedArgs) {
        self.remove_peasant(args.peasant_id);
        self.by_desktop.entry(args.desktop_id).or_default().push(args);
    }

    /// Remove every entry referring to `peasant_id`, across all desktops.
    /// `BinaryHeap` has no arbitrary-element removal, so each affected
    /// desktop's heap is rebuilt from its filtered contents — an
    /// acceptable full-reheapify at the scale of tens of windows this
    /// structure is sized for (spec.md §9, "MRU structure trade-off").
    pub fn remove_peasant(&mut self, peasant_id: PeasantId) {
        for heap in self.by_desktop.values_mut() {
            if heap.iter().any(|e| e.peasant_id == peasant_id) {
                let remaining: Vec<_> = heap
                    .drain()
                    .filter(|e| e.peasant_id != peasant_id)
                    .collect();
                *heap = BinaryHeap::from(remaining);
            }
        }
    }

    /// The top entry of every desktop's heap, i.e. the most recent
    /// activation known per desktop.
    fn desktop_tops(&self) -> impl Iterator<Item = (&DesktopId, &WindowActivatedArgs)> {
        self.by_desktop
            .iter()
            .filter_map(|(desktop, heap)| heap.peek().map(|top| (desktop, top)))
    }

    /// Every entry currently live in the structure, newest-first within
    /// each desktop. Used by `ignore_quake_window` to walk past a
    /// quake-named top entry into the next-newest candidate on that
    /// desktop.
    fn desktop_entries_descending(&self, desktop: &DesktopId) -> Vec<WindowActivatedArgs> {
        let mut v: Vec<_> = self
            .by_desktop
            .get(desktop)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default();
        v.sort_by(|a, b| b.cmp(a));
        v
    }

    /// Any single peasant id currently present in this structure, i.e. one
    /// that has activated at least once. This is *not* the full
    /// "any registered peasant" fallback spec.md §4.4 describes — a
    /// peasant that has never activated has no MRU entry at all, so that
    /// broader fallback is layered on top by
    /// `Monarch::most_recent_peasant_id`, which additionally consults the
    /// peasant registry when this returns `None`.
    pub fn any_peasant_id(&self) -> Option<PeasantId> {
        self.by_desktop
            .values()
            .flat_map(|h| h.iter())
            .map(|e| e.peasant_id)
            .next()
    }

    pub fn is_empty(&self) -> bool {
        self.by_desktop.values().all(|h| h.is_empty())
    }
}

/// Implements `Monarch::getMostRecentPeasantId`. `is_on_current_desktop`
/// and `is_quake` are injected so this function stays free of any
/// dependency on the desktop oracle or the peasant registry's locking.
pub fn most_recent_peasant_id(
    mru: &Mru,
    limit_to_current_desktop: bool,
    ignore_quake_window: impl Fn(PeasantId) -> bool,
    is_on_current_desktop: impl Fn(&WindowActivatedArgs) -> bool,
) -> PeasantId {
    let mut best: Option<WindowActivatedArgs> = None;

    for (desktop, top) in mru.desktop_tops() {
        if limit_to_current_desktop && !is_on_current_desktop(top) {
            continue;
        }
        let candidate = if ignore_quake_window(top.peasant_id) {
            // Walk past quake entries on this desktop to the next-newest.
            mru.desktop_entries_descending(desktop)
                .into_iter()
                .find(|e| !ignore_quake_window(e.peasant_id))
        } else {
            Some(*top)
        };
        if let Some(candidate) = candidate {
            if best.map_or(true, |b| candidate > b) {
                best = Some(candidate);
            }
        }
    }

    match best {
        Some(entry) => entry.peasant_id,
        None if !limit_to_current_desktop => mru.any_peasant_id().unwrap_or(PeasantId::NONE),
        None => PeasantId::NONE,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::args::NativeHandle;

    fn activated(id: u64, desktop: u128) -> WindowActivatedArgs {
        WindowActivatedArgs::new(PeasantId::new(id), NativeHandle(0), DesktopId(desktop))
    }

    #[test]
    fn reactivation_leaves_single_entry() {
        let mut mru = Mru::new();
        let a = activated(1, 1);
        mru.handle_activate(a);
        std::thread::sleep(std::time::Duration::from_millis(1));
        let a2 = WindowActivatedArgs {
            peasant_id: a.peasant_id,
            hwnd: a.hwnd,
            desktop_id: a.desktop_id,
            activated_time: crate::args::ActivationTimestamp::now(),
        };
        mru.handle_activate(a2);
        assert_eq!(mru.by_desktop.get(&DesktopId(1)).unwrap().len(), 1);
        assert_eq!(*mru.by_desktop.get(&DesktopId(1)).unwrap().peek().unwrap(), a2);
    }

    #[test]
    fn two_peasants_same_desktop_scenario_1() {
        let mut mru = Mru::new();
        mru.handle_activate(activated(1, 1));
        std::thread::sleep(std::time::Duration::from_millis(1));
        mru.handle_activate(activated(2, 1));
        let id = most_recent_peasant_id(&mru, true, |_| false, |_| true);
        assert_eq!(id, PeasantId::new(2));

        std::thread::sleep(std::time::Duration::from_millis(1));
        mru.handle_activate(activated(1, 1));
        let id = most_recent_peasant_id(&mru, true, |_| false, |_| true);
        assert_eq!(id, PeasantId::new(1));
    }

    #[test]
    fn per_desktop_partition_scenario_2() {
        let mut mru = Mru::new();
        mru.handle_activate(activated(1, 0xA));
        std::thread::sleep(std::time::Duration::from_millis(1));
        mru.handle_activate(activated(2, 0xB));
        std::thread::sleep(std::time::Duration::from_millis(1));
        mru.handle_activate(activated(3, 0xA));

        let id = most_recent_peasant_id(
            &mru,
            true,
            |_| false,
            |entry| entry.desktop_id == DesktopId(0xA),
        );
        assert_eq!(id, PeasantId::new(3));
    }

    #[test]
    fn heaps_after_scenario_5() {
        let mut mru = Mru::new();
        mru.handle_activate(activated(1, 0xA));
        std::thread::sleep(std::time::Duration::from_millis(1));
        mru.handle_activate(activated(2, 0xA));
        std::thread::sleep(std::time::Duration::from_millis(1));
        mru.handle_activate(activated(3, 0xA));
        std::thread::sleep(std::time::Duration::from_millis(1));
        mru.handle_activate(activated(2, 0xB));

        assert_eq!(mru.by_desktop[&DesktopId(0xA)].peek().unwrap().peasant_id, PeasantId::new(3));
        assert_eq!(mru.by_desktop[&DesktopId(0xB)].peek().unwrap().peasant_id, PeasantId::new(2));
    }

    #[test]
    fn quake_window_is_skipped_scenario_6() {
        let mut mru = Mru::new();
        mru.handle_activate(activated(1, 1));
        std::thread::sleep(std::time::Duration::from_millis(1));
        mru.handle_activate(activated(2, 1)); // "_quake"

        let id = most_recent_peasant_id(&mru, false, |id| id == PeasantId::new(2), |_| true);
        assert_eq!(id, PeasantId::new(1));
    }

    #[test]
    fn empty_registry_returns_none() {
        let mru = Mru::new();
        assert_eq!(most_recent_peasant_id(&mru, true, |_| false, |_| true), PeasantId::NONE);
    }

    #[test]
    fn killed_peasant_is_absent_after_touch() {
        let mut mru = Mru::new();
        mru.handle_activate(activated(1, 1));
        mru.remove_peasant(PeasantId::new(1));
        assert!(mru.is_empty());
    }
}
