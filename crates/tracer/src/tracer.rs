//! The toggle controller.
//!
//! [`Tracer`] owns the registry and is the only place that changes enabled
//! flags or the installation of the interception hook. After every toggle
//! the hook is installed exactly when at least one watched function is
//! enabled, and that decision is made under the same lock as the toggle.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::TracerConfig;
use crate::error::{TracerError, TracerResult};
use crate::hook::{self, CallEvent, CallHook, EventKind, HookControl, HookOwner};
use crate::identity::{FunctionId, Target, WrapperId};
use crate::record::Mechanism;
use crate::registry::{Change, Registry};
use crate::report::Snapshot;
use crate::wrap::Wrapped;

/// Emit an operational message when the tracer was configured with `log`.
macro_rules! log_info {
    ($shared:expr, $($arg:tt)+) => {
        if $shared.config.log {
            tracing::info!(target: "tracer", $($arg)+);
        }
    };
}

/// State shared between a tracer, its wrappers and the installed hook.
#[derive(Debug)]
pub(crate) struct Shared {
    owner: HookOwner,
    config: TracerConfig,
    registry: Mutex<Registry>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CallHook for Shared {
    fn on_event(&self, event: CallEvent) -> HookControl {
        let mut registry = self.lock();
        let watched = registry.is_watched(&event.function);

        match event.kind {
            EventKind::Call => {
                if !watched {
                    return HookControl::Continue;
                }
                if !registry.contains(&event.function) {
                    drop(registry);
                    broken_invariant(event.function);
                }
                match registry.get_mut(&event.function) {
                    Some(record) => {
                        record.begin();
                        HookControl::Claim
                    }
                    None => HookControl::Continue,
                }
            }
            // Only returns of calls this tracer began pop a start time.
            EventKind::Return if event.claimed => {
                let Some(record) = registry.get_mut(&event.function) else {
                    return HookControl::Continue;
                };
                if !watched {
                    // disabled while in flight: the call completes untimed
                    record.discard();
                } else if let Some(elapsed) = record.end() {
                    tracing::trace!(
                        target: "tracer",
                        function = event.function.name(),
                        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                        "watched call recorded"
                    );
                }
                HookControl::Continue
            }
            EventKind::Return => HookControl::Continue,
        }
    }
}

#[cold]
fn broken_invariant(function: FunctionId) -> ! {
    tracing::error!(
        target: "tracer",
        function = %function.path(),
        "watched function has no timing record"
    );
    panic!(
        "Broken internal invariant: watched function \"{}\" is not registered",
        function.path()
    );
}

/// Times selected functions and toggles them at runtime.
///
/// Functions reach the tracer in one of two ways:
///
/// - [`wrap`](Self::wrap) returns a [`Wrapped`] function timing each call
///   made through it.
/// - [`toggle`](Self::toggle) and [`enable`](Self::enable) on a new
///   [`FunctionId`] watch it through the process-wide hook, timing every
///   call that passes its [`probe!`](crate::probe).
///
/// Both feed the same registry and the same report.
///
/// The hook slot is process-wide. When two tracers watch functions at the
/// same time, the one that toggled last owns the hook and the other stops
/// seeing new calls until it toggles again. Calls a tracer already began
/// still return to it.
///
/// ```rust
/// use tracer::{function_id, probe, FunctionId, Tracer};
///
/// const STEP: FunctionId = function_id!("step");
///
/// fn step() {
///     probe!(STEP);
/// }
///
/// let tracer = Tracer::new();
/// tracer.enable([STEP], false);
/// step();
/// tracer.disable([STEP]);
/// step();
///
/// assert_eq!(tracer.snapshot().runs("step"), Some(1));
/// assert!(!tracer.is_hook_installed());
/// ```
#[derive(Debug)]
pub struct Tracer {
    shared: Arc<Shared>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer {
    /// Create a tracer with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TracerConfig::default())
    }

    /// Create a tracer with the given configuration.
    pub fn with_config(config: TracerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                owner: HookOwner::next(),
                config,
                registry: Mutex::new(Registry::new()),
            }),
        }
    }

    pub fn config(&self) -> &TracerConfig {
        &self.shared.config
    }

    /// Wrap `func` so every call through the wrapper is timed as `function`.
    ///
    /// The function is registered enabled with the given recursion policy.
    /// Fails if `function` is already watched through the hook, since one
    /// call would then be timed twice.
    pub fn wrap<F>(&self, function: FunctionId, func: F, summ_recursive: bool) -> TracerResult<Wrapped<F>> {
        let mut registry = self.shared.lock();

        if registry
            .get(&function)
            .is_some_and(|record| record.mechanism() == Mechanism::Watched)
        {
            return Err(TracerError::DoubleInstrumentation {
                name: function.name().to_string(),
            });
        }

        registry.set_enabled(function, true, summ_recursive, Mechanism::Wrapped);
        let wrapper = WrapperId::next();
        registry.register_wrapper(wrapper, function);
        drop(registry);

        log_info!(
            self.shared,
            function = function.name(),
            %wrapper,
            summ_recursive,
            "enabling wrapper trace"
        );

        Ok(Wrapped::new(func, function, wrapper, Arc::clone(&self.shared)))
    }

    /// Flip or set the enabled state of each target.
    ///
    /// With `on` set, every target is switched to that state. Without it, a
    /// known function is flipped and an unknown one is enabled. Enabling a
    /// function seen for the first time watches it through the hook.
    /// `summ_recursive` applies to every target being enabled.
    pub fn toggle<I>(&self, targets: I, summ_recursive: bool, on: Option<bool>)
    where
        I: IntoIterator,
        I::Item: Into<Target>,
    {
        let mut registry = self.shared.lock();
        for target in targets {
            self.toggle_one(&mut registry, target.into(), summ_recursive, on);
        }
        self.sync_hook(&registry);
    }

    /// Enable each target with the given recursion policy.
    pub fn enable<I>(&self, targets: I, summ_recursive: bool)
    where
        I: IntoIterator,
        I::Item: Into<Target>,
    {
        self.toggle(targets, summ_recursive, Some(true));
    }

    /// Enable every registered function.
    pub fn enable_all(&self, summ_recursive: bool) {
        let mut registry = self.shared.lock();
        let ids: Vec<FunctionId> = registry.ids().collect();
        for id in ids {
            self.toggle_one(&mut registry, Target::Function(id), summ_recursive, Some(true));
        }
        self.sync_hook(&registry);
    }

    /// Disable each target. Unknown targets are ignored.
    pub fn disable<I>(&self, targets: I)
    where
        I: IntoIterator,
        I::Item: Into<Target>,
    {
        let mut registry = self.shared.lock();
        for target in targets {
            self.toggle_one(&mut registry, target.into(), false, Some(false));
        }
        self.sync_hook(&registry);
    }

    /// Disable every registered function.
    pub fn disable_all(&self) {
        let mut registry = self.shared.lock();
        let ids: Vec<FunctionId> = registry.ids().collect();
        for id in ids {
            self.toggle_one(&mut registry, Target::Function(id), false, Some(false));
        }
        self.sync_hook(&registry);
    }

    fn toggle_one(&self, registry: &mut Registry, target: Target, summ_recursive: bool, on: Option<bool>) {
        let Some(function) = registry.resolve(target) else {
            tracing::debug!(target: "tracer", wrapper = ?target, "ignoring toggle for a wrapper of another tracer");
            return;
        };

        let enable = on.unwrap_or_else(|| {
            registry
                .get(&function)
                .map_or(true, |record| !record.is_enabled())
        });

        match registry.set_enabled(function, enable, summ_recursive, Mechanism::Watched) {
            Change::Created(_) => {
                log_info!(self.shared, function = function.name(), summ_recursive, "enabling hook trace");
            }
            Change::Enabled => {
                log_info!(self.shared, function = function.name(), summ_recursive, "enabling trace");
            }
            Change::Disabled => {
                log_info!(self.shared, function = function.name(), "disabling trace");
            }
            Change::Unknown => {
                tracing::debug!(target: "tracer", function = function.name(), "nothing to disable");
            }
        }
    }

    /// Install the hook iff something is watched. Called with the registry
    /// locked so no toggle can interleave.
    fn sync_hook(&self, registry: &Registry) {
        if registry.watch_set_is_empty() {
            if hook::uninstall(self.shared.owner) {
                log_info!(self.shared, "interception hook uninstalled");
            }
        } else {
            let displaced = hook::install(self.shared.owner, Arc::clone(&self.shared) as Arc<dyn CallHook>);
            if let Some(previous) = displaced.filter(|previous| *previous != self.shared.owner) {
                tracing::debug!(target: "tracer", ?previous, "replaced the hook of another tracer");
            }
            if self.shared.config.log {
                let watched: Vec<&str> = registry.watched().map(|id| id.name()).collect();
                tracing::info!(target: "tracer", ?watched, "interception hook installed");
            }
        }
    }

    /// Clear recorded runs and pending start times of every function.
    pub fn reset(&self) {
        let mut registry = self.shared.lock();
        registry.reset_all();
        log_info!(self.shared, functions = registry.len(), "reset all traces");
    }

    /// Clear recorded runs and pending start times of the given functions.
    pub fn reset_functions<I>(&self, targets: I)
    where
        I: IntoIterator,
        I::Item: Into<Target>,
    {
        let mut registry = self.shared.lock();
        for target in targets {
            let Some(function) = registry.resolve(target.into()) else {
                continue;
            };
            if let Some(record) = registry.get_mut(&function) {
                record.reset();
                log_info!(self.shared, function = function.name(), "reset trace");
            }
        }
    }

    /// Totals per qualified name, in registration order.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_records(self.shared.lock().iter())
    }

    /// Render the status table with the configured style.
    pub fn render(&self) -> String {
        self.snapshot().render(&self.shared.config.report)
    }

    /// Whether this tracer's hook is the installed one.
    pub fn is_hook_installed(&self) -> bool {
        hook::installed_owner() == Some(self.shared.owner)
    }

    /// Functions currently watched through the hook, in registration order.
    pub fn watched(&self) -> Vec<FunctionId> {
        self.shared.lock().watched().collect()
    }

    /// Every registered function, in registration order.
    pub fn functions(&self) -> Vec<FunctionId> {
        self.shared.lock().ids().collect()
    }

    /// Enabled state of a target, or `None` if it was never registered.
    pub fn is_enabled(&self, target: impl Into<Target>) -> Option<bool> {
        let registry = self.shared.lock();
        let function = registry.resolve(target.into())?;
        registry.get(&function).map(|record| record.is_enabled())
    }

    /// Recursion policy of a target, or `None` if it was never registered.
    pub fn summ_recursive(&self, target: impl Into<Target>) -> Option<bool> {
        let registry = self.shared.lock();
        let function = registry.resolve(target.into())?;
        registry.get(&function).map(|record| record.summ_recursive())
    }

    /// Number of timed invocations of a target the calling thread has in
    /// flight.
    pub fn depth(&self, target: impl Into<Target>) -> Option<usize> {
        let registry = self.shared.lock();
        let function = registry.resolve(target.into())?;
        registry.get(&function).map(|record| record.depth())
    }
}

impl fmt::Display for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if hook::uninstall(self.shared.owner) {
            log_info!(self.shared, "interception hook uninstalled");
        }
    }
}
