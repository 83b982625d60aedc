//! Process-wide call interception.
//!
//! Rust offers no runtime-wide callback on every function call, so calls are
//! observed at explicit instrumentation points instead. A function opts in by
//! starting its body with [`probe!`](crate::probe):
//!
//! ```rust
//! use tracer::{function_id, probe, FunctionId};
//!
//! const CHECKSUM: FunctionId = function_id!("checksum");
//!
//! fn checksum(data: &[u8]) -> u32 {
//!     probe!(CHECKSUM);
//!     data.iter().map(|b| *b as u32).sum()
//! }
//!
//! assert_eq!(checksum(&[1, 2, 3]), 6);
//! ```
//!
//! Every probe reports a call event on entry and a return event when its
//! guard drops, including during unwinding. Events go to the single
//! installed [`CallHook`]. With no hook installed a probe costs one atomic
//! load.
//!
//! A hook that answers a call event with [`HookControl::Claim`] receives the
//! matching return event itself, marked `claimed`, even if it was
//! uninstalled or replaced while the call was in flight. Unclaimed return
//! events go to whichever hook is installed when the guard drops.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::identity::FunctionId;

/// Kind of call event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Control entered the function
    Call,
    /// Control left the function, by return or unwinding
    Return,
}

/// A call or return observed at an instrumentation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEvent {
    pub kind: EventKind,
    pub function: FunctionId,
    /// Set on a return event whose call this hook claimed
    pub claimed: bool,
}

/// What the hook wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookControl {
    /// Keep receiving events
    Continue,
    /// Keep receiving events and take the return event of this call.
    /// Only meaningful for call events.
    Claim,
    /// Uninstall this hook
    Detach,
}

/// Observer receiving every call and return event in the process.
///
/// Called synchronously on the thread making the call, so it should decide
/// quickly whether an event concerns it.
pub trait CallHook: Send + Sync {
    fn on_event(&self, event: CallEvent) -> HookControl;
}

/// Token identifying who installed the current hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookOwner(u64);

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

impl HookOwner {
    pub fn next() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

struct InstalledHook {
    owner: HookOwner,
    hook: Arc<dyn CallHook>,
}

/// Mirrors whether `SLOT` holds a hook; read on every probe.
static INSTALLED: AtomicBool = AtomicBool::new(false);
static SLOT: RwLock<Option<InstalledHook>> = RwLock::new(None);

/// Install `hook`, replacing whatever hook was installed before.
///
/// Returns the owner of the replaced hook, if any.
pub fn install(owner: HookOwner, hook: Arc<dyn CallHook>) -> Option<HookOwner> {
    let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);
    let previous = slot.replace(InstalledHook { owner, hook });
    INSTALLED.store(true, Ordering::Release);
    previous.map(|installed| installed.owner)
}

/// Remove the installed hook if `owner` installed it.
///
/// Returns whether a hook was removed.
pub fn uninstall(owner: HookOwner) -> bool {
    let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);
    match slot.as_ref() {
        Some(installed) if installed.owner == owner => {
            *slot = None;
            INSTALLED.store(false, Ordering::Release);
            true
        }
        _ => false,
    }
}

/// Whether any hook is installed.
#[inline]
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::Acquire)
}

/// Owner of the installed hook, if any.
pub fn installed_owner() -> Option<HookOwner> {
    SLOT.read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|installed| installed.owner)
}

/// Hook that claimed a call, kept until the call returns.
struct Claimant {
    owner: HookOwner,
    hook: Arc<dyn CallHook>,
}

impl Claimant {
    fn deliver(&self, event: CallEvent) -> HookControl {
        let control = self.hook.on_event(event);
        if control == HookControl::Detach {
            uninstall(self.owner);
        }
        control
    }
}

fn dispatch(event: CallEvent) -> Option<Claimant> {
    if !is_installed() {
        return None;
    }

    // Release the slot before calling out so the hook may toggle itself.
    let current = SLOT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|installed| Claimant {
            owner: installed.owner,
            hook: Arc::clone(&installed.hook),
        })?;

    match current.deliver(event) {
        HookControl::Claim => Some(current),
        HookControl::Continue | HookControl::Detach => None,
    }
}

/// Report a call to `function` and return a guard reporting its return.
#[inline]
pub fn enter(function: FunctionId) -> ProbeGuard {
    let claimant = dispatch(CallEvent {
        kind: EventKind::Call,
        function,
        claimed: false,
    });
    ProbeGuard { function, claimant }
}

/// Reports the return event of a probed call when dropped.
#[must_use = "the return event fires when the guard drops"]
pub struct ProbeGuard {
    function: FunctionId,
    claimant: Option<Claimant>,
}

impl ProbeGuard {
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// Whether a hook claimed this call.
    pub fn is_claimed(&self) -> bool {
        self.claimant.is_some()
    }
}

impl fmt::Debug for ProbeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeGuard")
            .field("function", &self.function)
            .field("claimed_by", &self.claimant.as_ref().map(|claimant| claimant.owner))
            .finish()
    }
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        let function = self.function;
        match self.claimant.take() {
            Some(claimant) => {
                claimant.deliver(CallEvent {
                    kind: EventKind::Return,
                    function,
                    claimed: true,
                });
            }
            None => {
                dispatch(CallEvent {
                    kind: EventKind::Return,
                    function,
                    claimed: false,
                });
            }
        }
    }
}

/// Mark the enclosing function as an instrumentation point.
///
/// The call event fires immediately and the return event fires when the
/// enclosing scope ends.
#[macro_export]
macro_rules! probe {
    ($id:expr) => {
        let _probe = $crate::hook::enter($id);
    };
}

/// Serialises tests that install hooks, since the slot is process-wide.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_id;
    use std::sync::Mutex;

    const PROBED: FunctionId = function_id!("probed");
    const OTHER: FunctionId = function_id!("other");

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<CallEvent>>,
        detach_after: Option<usize>,
        claim: bool,
    }

    impl CallHook for Recorder {
        fn on_event(&self, event: CallEvent) -> HookControl {
            let mut events = self.events.lock().unwrap();
            events.push(event);
            match self.detach_after {
                Some(limit) if events.len() >= limit => HookControl::Detach,
                _ if self.claim && event.kind == EventKind::Call => HookControl::Claim,
                _ => HookControl::Continue,
            }
        }
    }

    fn probed() {
        probe!(PROBED);
        other();
    }

    fn other() {
        probe!(OTHER);
    }

    #[test]
    fn test_probe_without_hook() {
        let _lock = test_lock();
        assert!(!is_installed());
        probed();
        assert!(installed_owner().is_none());
    }

    #[test]
    fn test_events_in_call_order() {
        let _lock = test_lock();
        let owner = HookOwner::next();
        let recorder = Arc::new(Recorder::default());
        install(owner, recorder.clone());

        probed();
        assert!(uninstall(owner));

        let kinds: Vec<_> = recorder
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|event| (event.kind, event.function.name()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::Call, "probed"),
                (EventKind::Call, "other"),
                (EventKind::Return, "other"),
                (EventKind::Return, "probed"),
            ]
        );
    }

    #[test]
    fn test_uninstall_requires_owner() {
        let _lock = test_lock();
        let owner = HookOwner::next();
        let intruder = HookOwner::next();
        install(owner, Arc::new(Recorder::default()));

        assert!(!uninstall(intruder));
        assert!(is_installed());
        assert_eq!(installed_owner(), Some(owner));

        assert!(uninstall(owner));
        assert!(!is_installed());
    }

    #[test]
    fn test_install_replaces_previous_hook() {
        let _lock = test_lock();
        let first = HookOwner::next();
        let second = HookOwner::next();
        assert_eq!(install(first, Arc::new(Recorder::default())), None);
        assert_eq!(install(second, Arc::new(Recorder::default())), Some(first));

        assert_eq!(installed_owner(), Some(second));
        assert!(!uninstall(first));
        assert!(uninstall(second));
    }

    #[test]
    fn test_detach_uninstalls() {
        let _lock = test_lock();
        let owner = HookOwner::next();
        let recorder = Arc::new(Recorder {
            detach_after: Some(1),
            ..Recorder::default()
        });
        install(owner, recorder.clone());

        probed();

        assert!(!is_installed());
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_return_event_on_unwind() {
        let _lock = test_lock();
        let owner = HookOwner::next();
        let recorder = Arc::new(Recorder::default());
        install(owner, recorder.clone());

        let result = std::panic::catch_unwind(|| {
            probe!(PROBED);
            panic!("boom");
        });
        uninstall(owner);

        assert!(result.is_err());
        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Return);
    }

    #[test]
    fn test_claimed_return_reaches_uninstalled_hook() {
        let _lock = test_lock();
        let owner = HookOwner::next();
        let recorder = Arc::new(Recorder {
            claim: true,
            ..Recorder::default()
        });
        install(owner, recorder.clone());

        let guard = enter(PROBED);
        assert!(guard.is_claimed());
        assert!(uninstall(owner));
        drop(guard);

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Return);
        assert!(events[1].claimed);
    }

    #[test]
    fn test_unclaimed_return_goes_to_installed_hook() {
        let _lock = test_lock();
        let first = HookOwner::next();
        let second = HookOwner::next();
        let early = Arc::new(Recorder::default());
        let late = Arc::new(Recorder::default());
        install(first, early.clone());

        let guard = enter(PROBED);
        assert!(!guard.is_claimed());
        install(second, late.clone());
        drop(guard);
        uninstall(second);

        assert_eq!(early.events.lock().unwrap().len(), 1);
        let late_events = late.events.lock().unwrap();
        assert_eq!(late_events.len(), 1);
        assert_eq!(late_events[0].kind, EventKind::Return);
        assert!(!late_events[0].claimed);
    }
}
