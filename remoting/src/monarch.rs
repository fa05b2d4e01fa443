//! The leader: a singleton registry of every live peasant in the
//! federation, the MRU structure, and the command-line dispatch and summon
//! algorithms. Exactly one `Monarch` is ever constructed per process (the
//! instance a [`crate::window_manager::WindowManager`] holds either is the
//! federation's actual leader or, in isolated mode, a leader only this
//! process can see); there is no cross-`Monarch` coordination inside this
//! type, that is [`crate::class_registry`]'s job.

use crate::args::{
    CommandlineArgs, FindTargetWindowArgs, PeasantInfo, ProposeCommandlineResult,
    RenameRequestArgs, SummonWindowBehavior, SummonWindowSelectionArgs, TargetWindow,
    WindowActivatedArgs,
};
use crate::desktop::DesktopOracle;
use crate::error::Result;
use crate::mru::{most_recent_peasant_id, Mru};
use crate::peasant::PeasantId;
use crate::rpc::{IFollower, ILeader};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

const QUAKE_PREFIX: &str = "_quake";

struct Entry {
    follower: Arc<dyn IFollower>,
    pid: u32,
}

/// Local notifications a host can observe without going through the
/// `ILeader` wire surface, modeled on `mux::MuxNotification`'s
/// subscribe/notify shape.
#[derive(Debug, Clone, Copy)]
pub enum MonarchNotification {
    /// A peasant was pruned from the registry, either because a
    /// cross-process call to it failed or because it quit cleanly.
    WindowClosed(PeasantId),
}

type Subscriber = Box<dyn Fn(MonarchNotification) -> bool + Send + Sync>;
type FindTargetWindowHandler = Box<dyn Fn(&mut FindTargetWindowArgs) + Send + Sync>;

static SUB_ID: AtomicUsize = AtomicUsize::new(0);

pub struct Monarch {
    next_id: AtomicU64,
    registry: RwLock<HashMap<PeasantId, Entry>>,
    mru: RwLock<Mru>,
    desktop_oracle: Arc<dyn DesktopOracle>,
    find_target_window_handler: RwLock<Option<FindTargetWindowHandler>>,
    subscribers: RwLock<HashMap<usize, Subscriber>>,
}

impl Monarch {
    pub fn new(desktop_oracle: Arc<dyn DesktopOracle>) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            registry: RwLock::new(HashMap::new()),
            mru: RwLock::new(Mru::new()),
            desktop_oracle,
            find_target_window_handler: RwLock::new(None),
            subscribers: RwLock::new(HashMap::new()),
        })
    }

    /// Register the single `findTargetWindowRequested` subscriber. A
    /// second call replaces the first, matching "exactly one subscriber"
    /// rather than fanning a proposal out to several.
    pub fn set_find_target_window_handler<F>(&self, handler: F)
    where
        F: Fn(&mut FindTargetWindowArgs) + Send + Sync + 'static,
    {
        *self.find_target_window_handler.write() = Some(Box::new(handler));
    }

    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(MonarchNotification) -> bool + Send + Sync + 'static,
    {
        let id = SUB_ID.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().insert(id, Box::new(subscriber));
    }

    fn notify(&self, notification: MonarchNotification) {
        let mut subs = self.subscribers.write();
        subs.retain(|_, f| f(notification));
    }

    /// Register `follower` and return its id. If it already carries an id
    /// (adopted from a now-dead prior leader), that id is kept and the
    /// allocator is advanced past it; otherwise a fresh id is allocated and
    /// assigned. A failure while reading or assigning the id (the peasant
    /// died between being queued and being registered here) is swallowed:
    /// the peasant is simply not added and `PeasantId::NONE` is returned.
    pub fn add_peasant(&self, follower: Arc<dyn IFollower>, pid: u32) -> PeasantId {
        let existing = follower.get_id().unwrap_or(PeasantId::NONE);
        let id = if existing.is_none() {
            let allocated = PeasantId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
            if follower.assign_id(allocated).is_err() {
                return PeasantId::NONE;
            }
            allocated
        } else {
            self.bump_allocator_past(existing);
            existing
        };
        self.registry.write().insert(id, Entry { follower, pid });
        id
    }

    fn bump_allocator_past(&self, id: PeasantId) {
        let mut current = self.next_id.load(Ordering::SeqCst);
        while id.get() >= current {
            match self
                .next_id
                .compare_exchange(current, id.get() + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Fetch a peasant, probing its liveness with `get_pid` along the way.
    /// A dead peasant is pruned and `None` is returned; callers never see
    /// the underlying peer-unavailable error.
    fn get_peasant(&self, id: PeasantId) -> Option<Arc<dyn IFollower>> {
        let follower = {
            let registry = self.registry.read();
            Arc::clone(&registry.get(&id)?.follower)
        };
        match follower.get_pid() {
            Ok(_) => Some(follower),
            Err(_) => {
                self.prune(id);
                None
            }
        }
    }

    /// Drops the registry entry, then (in a separate critical section) the
    /// MRU entry. The two locks are never held at once: the pruning
    /// discipline this crate follows acquires, mutates, and releases the
    /// registry lock before touching the MRU lock, so a thread blocked on
    /// one of them can never be the other half of a lock-order cycle with
    /// a thread blocked on the other.
    fn prune(&self, id: PeasantId) {
        self.registry.write().remove(&id);
        self.mru.write().remove_peasant(id);
        self.notify(MonarchNotification::WindowClosed(id));
    }

    /// Whether `id`'s window name begins with the quake prefix. Failure to
    /// reach the peasant is treated as "not quake" rather than pruning —
    /// this helper runs from inside MRU selection, which already holds the
    /// MRU read lock, so it only touches the registry lock and leaves
    /// dead-peasant cleanup to whichever call actually tries to use the
    /// result (`execute_commandline`/`summon`, which prune on failure).
    fn is_quake_named(&self, id: PeasantId) -> bool {
        let follower = match self.registry.read().get(&id) {
            Some(entry) => Arc::clone(&entry.follower),
            None => return false,
        };
        follower
            .get_window_name()
            .map(|n| n.starts_with(QUAKE_PREFIX))
            .unwrap_or(false)
    }

    fn most_recent_peasant_id(&self, limit_to_current_desktop: bool, ignore_quake_window: bool) -> PeasantId {
        let id = {
            let mru = self.mru.read();
            most_recent_peasant_id(
                &mru,
                limit_to_current_desktop,
                |id| ignore_quake_window && self.is_quake_named(id),
                |entry| self.desktop_oracle.is_window_on_current_desktop(entry.hwnd),
            )
        };
        if id.is_none() && !limit_to_current_desktop {
            // Nothing in the MRU structure qualifies (or it's empty
            // outright) and the search isn't desktop-limited: fall back to
            // any registered peasant, not just one with an MRU entry,
            // matching the original `_getMostRecentPeasantID`'s
            // `_peasants.begin()` fallback.
            return self.registry.read().keys().next().copied().unwrap_or(PeasantId::NONE);
        }
        id
    }

    /// Linear scan over the registry for a name match, with the liveness
    /// guard every lookup carries: a peasant that fails to answer
    /// `get_window_name` is pruned and skipped rather than aborting the
    /// scan.
    fn lookup_peasant_id_for_name(&self, name: &str) -> PeasantId {
        if name.is_empty() {
            return PeasantId::NONE;
        }
        let snapshot: Vec<(PeasantId, Arc<dyn IFollower>)> = self
            .registry
            .read()
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(&entry.follower)))
            .collect();

        let mut dead = Vec::new();
        let mut found = PeasantId::NONE;
        for (id, follower) in snapshot {
            match follower.get_window_name() {
                Ok(n) if n == name => {
                    found = id;
                    break;
                }
                Ok(_) => {}
                Err(_) => dead.push(id),
            }
        }
        for id in dead {
            self.prune(id);
        }
        found
    }
}

impl ILeader for Monarch {
    fn get_number_of_peasants(&self) -> Result<u64> {
        Ok(self.registry.read().len() as u64)
    }

    fn propose_commandline(&self, args: CommandlineArgs) -> Result<ProposeCommandlineResult> {
        let mut find_args = FindTargetWindowArgs::new(args.clone());
        if let Some(handler) = self.find_target_window_handler.read().as_ref() {
            handler(&mut find_args);
        }

        let requested_name = match &find_args.target {
            TargetWindow::Name(n) => n.clone(),
            _ => String::new(),
        };

        if matches!(find_args.target, TargetWindow::None) {
            return Ok(ProposeCommandlineResult {
                should_create_new_window: false,
                requested_id: None,
                requested_name,
            });
        }

        let resolved_id = match &find_args.target {
            TargetWindow::Id(id) => Some(*id),
            TargetWindow::CurrentDesktop => Some(self.most_recent_peasant_id(true, true)),
            TargetWindow::Existing => Some(self.most_recent_peasant_id(false, true)),
            TargetWindow::Name(n) => Some(self.lookup_peasant_id_for_name(n)),
            TargetWindow::New | TargetWindow::None => None,
        };

        let resolved_id = resolved_id.filter(|id| !id.is_none());

        match resolved_id {
            Some(id) => match self.get_peasant(id) {
                Some(peasant) => match peasant.execute_commandline(args) {
                    Ok(_) => Ok(ProposeCommandlineResult::dispatched(requested_name)),
                    Err(_) => {
                        self.prune(id);
                        Ok(ProposeCommandlineResult::create_new(None, requested_name))
                    }
                },
                // Known id, not currently live: let the new window take it,
                // so `wt -w 17 ...` can reserve id 17 before it exists.
                None => Ok(ProposeCommandlineResult::create_new(Some(id), requested_name)),
            },
            None => Ok(ProposeCommandlineResult::create_new(None, requested_name)),
        }
    }

    fn handle_activate_peasant(&self, args: WindowActivatedArgs) -> Result<()> {
        self.mru.write().handle_activate(args);
        Ok(())
    }

    fn summon_window(&self, args: SummonWindowSelectionArgs) -> Result<bool> {
        let id = match &args.window_name {
            Some(name) if !name.is_empty() => self.lookup_peasant_id_for_name(name),
            _ => {
                let strict = self.most_recent_peasant_id(args.on_current_desktop, true);
                if strict.is_none() {
                    // Nothing survives the quake filter: if the only
                    // candidate at all is a quake window, summon accepts
                    // it rather than reporting no match.
                    self.most_recent_peasant_id(args.on_current_desktop, false)
                } else {
                    strict
                }
            }
        };

        if id.is_none() {
            return Ok(false);
        }

        match self.get_peasant(id) {
            Some(peasant) => match peasant.summon(args.behavior) {
                Ok(_) => Ok(true),
                Err(_) => {
                    self.prune(id);
                    Ok(false)
                }
            },
            None => Ok(false),
        }
    }

    fn request_identify_windows(&self) -> Result<()> {
        let ids: Vec<PeasantId> = self.registry.read().keys().copied().collect();
        for id in ids {
            if let Some(peasant) = self.get_peasant(id) {
                if peasant.display_window_id().is_err() {
                    self.prune(id);
                }
            }
        }
        Ok(())
    }

    fn rename_request(&self, sender_id: PeasantId, mut args: RenameRequestArgs) -> Result<RenameRequestArgs> {
        let existing = self.lookup_peasant_id_for_name(&args.new_name);
        args.succeeded = existing.is_none() || existing == sender_id;
        Ok(args)
    }

    fn does_quake_window_exist(&self) -> Result<bool> {
        let ids: Vec<PeasantId> = self.registry.read().keys().copied().collect();
        Ok(ids.iter().any(|id| self.is_quake_named(*id)))
    }

    fn quit_all(&self) -> Result<()> {
        let ids: Vec<PeasantId> = self.registry.read().keys().copied().collect();
        for id in ids {
            if let Some(peasant) = self.get_peasant(id) {
                if peasant.quit().is_err() {
                    self.prune(id);
                }
            }
        }
        Ok(())
    }

    fn peasant_infos(&self, requesting_pid: u32) -> Result<Vec<PeasantInfo>> {
        let snapshot: Vec<(PeasantId, Arc<dyn IFollower>, u32)> = self
            .registry
            .read()
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(&entry.follower), entry.pid))
            .collect();

        let mut infos = Vec::with_capacity(snapshot.len());
        let mut dead = Vec::new();
        for (id, follower, pid) in snapshot {
            match follower.get_window_name() {
                Ok(name) => infos.push(PeasantInfo {
                    id,
                    name,
                    is_this_process: pid == requesting_pid,
                }),
                Err(_) => dead.push(id),
            }
        }
        for id in dead {
            self.prune(id);
        }
        Ok(infos)
    }

    fn summon_all_windows(&self, behavior: SummonWindowBehavior) -> Result<()> {
        let ids: Vec<PeasantId> = self.registry.read().keys().copied().collect();
        for id in ids {
            if let Some(peasant) = self.get_peasant(id) {
                if peasant.summon(behavior).is_err() {
                    self.prune(id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::args::{DesktopId, NativeHandle, RenameRequestArgs};
    use crate::desktop::NullDesktopOracle;
    use crate::peasant::Peasant;

    fn fresh_monarch() -> Arc<Monarch> {
        Monarch::new(Arc::new(NullDesktopOracle))
    }

    #[test]
    fn add_peasant_allocates_monotonic_ids() {
        let m = fresh_monarch();
        let a = Peasant::new("a");
        let b = Peasant::new("b");
        let id_a = m.add_peasant(a, 100);
        let id_b = m.add_peasant(b, 101);
        assert!(id_b.get() > id_a.get());
    }

    #[test]
    fn add_peasant_keeps_a_pre_labelled_id_and_advances_allocator() {
        let m = fresh_monarch();
        let adopted = Peasant::new("adopted");
        adopted.assign_id(PeasantId::new(7));
        let id = m.add_peasant(adopted, 1);
        assert_eq!(id, PeasantId::new(7));

        let fresh = Peasant::new("fresh");
        let next_id = m.add_peasant(fresh, 2);
        assert!(next_id.get() >= 8);
    }

    #[test]
    fn propose_with_no_resolver_creates_new_window() {
        let m = fresh_monarch();
        let result = m
            .propose_commandline(CommandlineArgs::new(["wt"], "/tmp"))
            .unwrap();
        assert!(result.should_create_new_window);
        assert_eq!(result.requested_id, None);
    }

    #[test]
    fn propose_use_name_dispatches_to_named_peasant() {
        let m = fresh_monarch();
        let one = Peasant::new("one");
        let two = Peasant::new("two");
        m.add_peasant(one, 10);
        m.add_peasant(two, 11);

        m.set_find_target_window_handler(|args| {
            args.target = TargetWindow::Name("two".to_string());
        });

        let result = m
            .propose_commandline(CommandlineArgs::new(["wt"], "/tmp"))
            .unwrap();
        assert!(!result.should_create_new_window);
    }

    /// An `IFollower` whose `execute_commandline` always reports the peer
    /// as unreachable, standing in for a peasant whose process has died
    /// since registration; everything else forwards to a real `Peasant` so
    /// it still answers name lookups normally.
    struct DyingFollower(Arc<Peasant>);

    impl IFollower for DyingFollower {
        fn assign_id(&self, id: PeasantId) -> Result<()> {
            Ok(self.0.assign_id(id))
        }
        fn get_id(&self) -> Result<PeasantId> {
            Ok(self.0.get_id())
        }
        fn get_pid(&self) -> Result<u32> {
            Ok(self.0.get_pid())
        }
        fn get_window_name(&self) -> Result<String> {
            Ok(self.0.get_window_name())
        }
        fn execute_commandline(&self, _args: CommandlineArgs) -> Result<bool> {
            Err(crate::error::RemotingError::PeerUnavailable)
        }
        fn summon(&self, behavior: SummonWindowBehavior) -> Result<()> {
            Ok(self.0.summon(behavior))
        }
        fn display_window_id(&self) -> Result<()> {
            Ok(self.0.display_window_id())
        }
        fn quit(&self) -> Result<()> {
            Ok(self.0.quit())
        }
        fn get_last_activated_args(&self) -> Result<Option<WindowActivatedArgs>> {
            Ok(self.0.get_last_activated_args())
        }
    }

    #[test]
    fn propose_use_name_on_dead_peasant_prunes_and_creates_new() {
        let m = fresh_monarch();
        let two = Peasant::new("two");
        let dying: Arc<dyn IFollower> = Arc::new(DyingFollower(two));
        m.add_peasant(dying, 11);

        m.set_find_target_window_handler(|args| {
            args.target = TargetWindow::Name("two".to_string());
        });

        let result = m
            .propose_commandline(CommandlineArgs::new(["wt"], "/tmp"))
            .unwrap();
        assert!(result.should_create_new_window);
        assert_eq!(m.get_number_of_peasants().unwrap(), 0, "the dead peasant should have been pruned");
    }

    #[test]
    fn rename_rejects_collision_with_a_different_live_peasant() {
        let m = fresh_monarch();
        let one = Peasant::new("one");
        let two = Peasant::new("two");
        let id_one = m.add_peasant(one, 10);
        m.add_peasant(two, 11);

        let result = m
            .rename_request(id_one, RenameRequestArgs::new("two"))
            .unwrap();
        assert!(!result.succeeded);
    }

    #[test]
    fn rename_allows_renaming_to_ones_own_current_name() {
        let m = fresh_monarch();
        let one = Peasant::new("one");
        let id_one = m.add_peasant(one, 10);

        let result = m
            .rename_request(id_one, RenameRequestArgs::new("one"))
            .unwrap();
        assert!(result.succeeded);
    }

    #[test]
    fn summon_named_ignores_on_current_desktop_and_quake_filtering() {
        let m = fresh_monarch();
        let quake = Peasant::new("_quake");
        m.add_peasant(quake, 10);

        let found = m
            .summon_window(SummonWindowSelectionArgs::named("_quake"))
            .unwrap();
        assert!(found);
    }

    #[test]
    fn summon_most_recent_skips_quake_unless_it_is_the_only_candidate() {
        let m = fresh_monarch();
        let quake = Peasant::new("_quake");
        let id = m.add_peasant(quake, 10);
        m.handle_activate_peasant(WindowActivatedArgs::new(id, NativeHandle(1), DesktopId::default()))
            .unwrap();

        let found = m
            .summon_window(SummonWindowSelectionArgs::most_recent(false))
            .unwrap();
        assert!(found, "the quake window is the only candidate, so summon should still find it");
    }

    #[test]
    fn propose_use_existing_falls_back_to_a_registered_peasant_with_no_activations() {
        let m = fresh_monarch();
        let never_activated = Peasant::new("never-activated");
        m.add_peasant(never_activated, 10);

        m.set_find_target_window_handler(|args| {
            args.target = TargetWindow::Existing;
        });

        let result = m
            .propose_commandline(CommandlineArgs::new(["wt"], "/tmp"))
            .unwrap();
        assert!(
            !result.should_create_new_window,
            "a registered peasant that never activated should still be a valid UseExisting target"
        );
    }

    #[test]
    fn does_quake_window_exist_reflects_registered_names() {
        let m = fresh_monarch();
        assert!(!m.does_quake_window_exist().unwrap());
        let quake = Peasant::new("_quake");
        m.add_peasant(quake, 10);
        assert!(m.does_quake_window_exist().unwrap());
    }

    #[test]
    fn peasant_infos_marks_the_requesting_process() {
        let m = fresh_monarch();
        let mine = Peasant::new("mine");
        m.add_peasant(mine, 555);
        let infos = m.peasant_infos(555).unwrap();
        assert_eq!(infos.len(), 1);
        assert!(infos[0].is_this_process);
    }
}
