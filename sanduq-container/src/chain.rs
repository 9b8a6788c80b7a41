//! Per-call resolution state.
//!
//! A [`ResolutionChain`] lives for one top-level resolution and is passed
//! down by reference to every nested lookup made on its behalf. It holds
//! the names being resolved and the classes being constructed; both are
//! released by RAII guards on every exit path, so the chain is empty again
//! when the top-level call returns.
//!
//! Separate calls, including calls on other threads, never share a chain:
//! two requests building the same class at the same time do not see each
//! other as a cycle.
//!
//! A chain cannot see past its own call. Three guards cover the rest:
//! [`WaitGuard`] and [`FillGuard`] track which thread fills which cache
//! slot or proxy cell, so a wait that could never end (on this thread, or
//! across threads that wait on each other) fails instead of blocking.
//! [`InitGuard`] catches a deferred initializer that re-enters its own
//! class through a fresh proxy.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::thread::{self, ThreadId};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::warn;

use crate::class::ClassId;
use crate::error::{CircularDependencyError, Result, SanduqError};

#[derive(Debug, Default)]
pub(crate) struct ResolutionChain {
    names: RefCell<Vec<String>>,
    classes: RefCell<HashSet<ClassId>>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as being resolved.
    ///
    /// Fails if `name` is already being resolved further up this chain.
    pub fn enter_name(&self, name: &str) -> Result<NameGuard<'_>> {
        let mut names = self.names.borrow_mut();
        if names.iter().any(|entered| entered == name) {
            let mut chain = names.clone();
            chain.push(name.to_string());
            return Err(cycle(name, chain));
        }
        names.push(name.to_string());
        Ok(NameGuard { chain: self })
    }

    /// Marks `class` as under construction.
    ///
    /// Fails without touching the set if `class` is already being built
    /// further up this chain.
    pub fn enter_class(&self, class: &ClassId) -> Result<ClassGuard<'_>> {
        if self.classes.borrow().contains(class) {
            let mut chain = self.names.borrow().clone();
            chain.push(class.name().to_string());
            return Err(cycle(class.name(), chain));
        }
        self.classes.borrow_mut().insert(class.clone());
        Ok(ClassGuard {
            chain: self,
            class: class.clone(),
        })
    }

    /// The entry whose resolution asked for the innermost one, if any.
    pub fn requester(&self) -> Option<String> {
        self.names.borrow().iter().rev().nth(1).cloned()
    }

    pub fn is_idle(&self) -> bool {
        self.names.borrow().is_empty() && self.classes.borrow().is_empty()
    }
}

fn cycle(entry: &str, chain: Vec<String>) -> SanduqError {
    warn!(entry, chain = ?chain, "Circular dependency detected!");
    SanduqError::CircularDependency(CircularDependencyError {
        entry: entry.to_string(),
        chain,
    })
}

/// Releases a name entered with [`ResolutionChain::enter_name`].
pub(crate) struct NameGuard<'a> {
    chain: &'a ResolutionChain,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        self.chain.names.borrow_mut().pop();
    }
}

/// Releases a class entered with [`ResolutionChain::enter_class`].
pub(crate) struct ClassGuard<'a> {
    chain: &'a ResolutionChain,
    class: ClassId,
}

impl Drop for ClassGuard<'_> {
    fn drop(&mut self) {
        self.chain.classes.borrow_mut().remove(&self.class);
    }
}

// ── Slots in flight ──

/// Which thread fills which slot, and which slot each blocked thread waits on.
///
/// Slots are keyed by address: the container's cache cells and the cells
/// inside deferred proxies. Both are heap-allocated and outlive every
/// guard that names them.
#[derive(Default)]
struct InFlight {
    owners: HashMap<usize, (ThreadId, String)>,
    waiting: HashMap<ThreadId, usize>,
}

static IN_FLIGHT: Lazy<Mutex<InFlight>> = Lazy::new(Mutex::default);

impl InFlight {
    /// Follows the wait-for edges out of `slot`; if they lead back to a
    /// slot `me` fills, returns the loop starting and ending there.
    fn wait_cycle(&self, me: ThreadId, slot: usize, name: &str) -> Option<Vec<String>> {
        let mut names = vec![name.to_string()];
        let mut current = slot;
        let mut seen = HashSet::new();

        while seen.insert(current) {
            let (owner, owned_name) = self.owners.get(&current)?;
            if *owner == me {
                names.insert(0, owned_name.clone());
                return Some(names);
            }
            current = *self.waiting.get(owner)?;
            let (_, next_name) = self.owners.get(&current)?;
            names.push(next_name.clone());
        }
        None
    }
}

fn slot_key<T>(slot: &T) -> usize {
    slot as *const T as usize
}

/// Registers the current thread as about to wait on a slot.
///
/// Entering fails if the wait could never end: the slot is being filled
/// by this thread, or by a thread that is itself waiting, directly or
/// through others, on a slot this thread fills.
pub(crate) struct WaitGuard {
    thread: ThreadId,
    slot: usize,
}

impl WaitGuard {
    pub fn enter<T>(slot: &T, name: &str) -> Result<Self> {
        let slot = slot_key(slot);
        let thread = thread::current().id();

        let mut in_flight = IN_FLIGHT.lock();
        if let Some(chain) = in_flight.wait_cycle(thread, slot, name) {
            return Err(cycle(name, chain));
        }
        in_flight.waiting.insert(thread, slot);
        Ok(WaitGuard { thread, slot })
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        let mut in_flight = IN_FLIGHT.lock();
        if in_flight.waiting.get(&self.thread) == Some(&self.slot) {
            in_flight.waiting.remove(&self.thread);
        }
    }
}

/// Marks a slot as being filled by the current thread.
///
/// Entered from inside the cell's initializer, so the thread has stopped
/// waiting and now owns the slot.
pub(crate) struct FillGuard {
    slot: usize,
}

impl FillGuard {
    pub fn enter<T>(slot: &T, name: &str) -> Self {
        let slot = slot_key(slot);
        let thread = thread::current().id();

        let mut in_flight = IN_FLIGHT.lock();
        in_flight.waiting.remove(&thread);
        in_flight.owners.insert(slot, (thread, name.to_string()));
        FillGuard { slot }
    }
}

impl Drop for FillGuard {
    fn drop(&mut self) {
        IN_FLIGHT.lock().owners.remove(&self.slot);
    }
}

thread_local! {
    static INITIALIZING: RefCell<HashSet<ClassId>> = RefCell::new(HashSet::new());
}

/// Marks a class as being built by a deferred initializer on this thread.
///
/// Each initializer starts a fresh [`ResolutionChain`], so a chain cannot
/// see a proxy of the same class being forced again from inside the build.
pub(crate) struct InitGuard {
    class: ClassId,
}

impl InitGuard {
    pub fn enter(class: &ClassId) -> Result<Self> {
        let fresh = INITIALIZING.with(|initializing| initializing.borrow_mut().insert(class.clone()));
        if !fresh {
            let name = class.name().to_string();
            return Err(cycle(&name, vec![name.clone(), name.clone()]));
        }
        Ok(InitGuard { class: class.clone() })
    }
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        INITIALIZING.with(|initializing| initializing.borrow_mut().remove(&self.class));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct A;
    struct B;

    #[test]
    fn reentering_a_name_is_a_cycle() {
        let chain = ResolutionChain::new();
        let _a = chain.enter_name("A").unwrap();
        let _b = chain.enter_name("B").unwrap();

        match chain.enter_name("A") {
            Err(SanduqError::CircularDependency(err)) => {
                assert_eq!(err.entry, "A");
                assert_eq!(err.chain, vec!["A", "B", "A"]);
            }
            other => panic!("Expected CircularDependency, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn reentering_a_class_is_a_cycle() {
        let chain = ResolutionChain::new();
        let _a = chain.enter_class(&ClassId::of::<A>()).unwrap();
        let _b = chain.enter_class(&ClassId::of::<B>()).unwrap();
        assert!(chain.enter_class(&ClassId::named::<A>("alias")).is_err());
    }

    #[test]
    fn guards_release_on_drop() {
        let chain = ResolutionChain::new();
        {
            let _name = chain.enter_name("A").unwrap();
            assert_eq!(chain.requester(), None);
            let _class = chain.enter_class(&ClassId::of::<A>()).unwrap();
            let _inner = chain.enter_name("B").unwrap();
            assert!(!chain.is_idle());
            assert_eq!(chain.requester().as_deref(), Some("A"));
        }
        assert!(chain.is_idle());
        assert!(chain.enter_name("A").is_ok());
    }

    #[test]
    fn failed_entry_leaves_state_untouched() {
        let chain = ResolutionChain::new();
        let outer = chain.enter_class(&ClassId::of::<A>()).unwrap();
        assert!(chain.enter_class(&ClassId::of::<A>()).is_err());
        drop(outer);
        assert!(chain.is_idle());
    }

    #[test]
    fn waiting_on_a_slot_this_thread_fills_fails() {
        let slot = 0u8;
        let filling = FillGuard::enter(&slot, "A");

        match WaitGuard::enter(&slot, "A") {
            Err(SanduqError::CircularDependency(err)) => assert_eq!(err.chain, vec!["A", "A"]),
            other => panic!("Expected CircularDependency, got: {:?}", other.map(|_| ())),
        }
        drop(filling);
        assert!(WaitGuard::enter(&slot, "A").is_ok());
    }

    #[test]
    fn threads_waiting_on_each_other_fail() {
        let (a, b) = (0u8, 0u8);
        let (a, b) = (&a, &b);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let _owns_a = FillGuard::enter(a, "A");
        let result = thread::scope(|s| {
            s.spawn(move || {
                let _owns_b = FillGuard::enter(b, "B");
                let _waits = WaitGuard::enter(a, "A");
                ready_tx.send(()).unwrap();
                done_rx.recv().unwrap();
            });

            ready_rx.recv().unwrap();
            let result = WaitGuard::enter(b, "B").map(|_| ());
            done_tx.send(()).unwrap();
            result
        });

        match result {
            Err(SanduqError::CircularDependency(err)) => assert_eq!(err.chain, vec!["A", "B", "A"]),
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn waiting_on_an_unrelated_owner_is_fine() {
        let slot = 0u8;
        let slot = &slot;
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            s.spawn(move || {
                let _owns = FillGuard::enter(slot, "A");
                ready_tx.send(()).unwrap();
                done_rx.recv().unwrap();
            });

            ready_rx.recv().unwrap();
            let waiting = WaitGuard::enter(slot, "A");
            done_tx.send(()).unwrap();
            assert!(waiting.is_ok());
        });
    }

    #[test]
    fn reinitializing_a_class_on_the_same_thread_fails() {
        let outer = InitGuard::enter(&ClassId::of::<A>()).unwrap();
        assert!(InitGuard::enter(&ClassId::of::<B>()).is_ok());
        assert!(matches!(
            InitGuard::enter(&ClassId::of::<A>()),
            Err(SanduqError::CircularDependency(_))
        ));
        drop(outer);
        assert!(InitGuard::enter(&ClassId::of::<A>()).is_ok());
    }

    #[test]
    fn guards_release_during_error_propagation() {
        fn nested(chain: &ResolutionChain) -> Result<()> {
            let _a = chain.enter_name("A")?;
            let _b = chain.enter_name("B")?;
            let _again = chain.enter_name("A")?;
            Ok(())
        }

        let chain = ResolutionChain::new();
        assert!(nested(&chain).is_err());
        assert!(chain.is_idle());
    }
}
