//! Explicit per-call wrapping.
//!
//! A [`Wrapped`] function times every call made through it. The wrapped
//! function keeps its calling contract: arguments are passed as a tuple and
//! the output, including any `Result`, comes back untouched.
//!
//! ```rust
//! use tracer::{function_id, Tracer};
//!
//! let tracer = Tracer::new();
//! let add = tracer.wrap(function_id!("add"), |a: i32, b: i32| a + b, false).unwrap();
//!
//! assert_eq!(add.call((2, 3)), 5);
//! assert_eq!(tracer.snapshot().runs("add"), Some(1));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::identity::{FunctionId, Target, WrapperId};
use crate::tracer::Shared;

/// Functions callable with their arguments packed in a tuple.
///
/// Implemented for every `Fn` of up to six arguments.
pub trait Callable<Args> {
    type Output;

    fn invoke(&self, args: Args) -> Self::Output;
}

macro_rules! impl_callable {
    ($($ty:ident $arg:ident),*) => {
        impl<Func, Out, $($ty),*> Callable<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Out,
        {
            type Output = Out;

            #[inline]
            fn invoke(&self, ($($arg,)*): ($($ty,)*)) -> Out {
                (self)($($arg),*)
            }
        }
    };
}

impl_callable!();
impl_callable!(A a);
impl_callable!(A a, B b);
impl_callable!(A a, B b, C c);
impl_callable!(A a, B b, C c, D d);
impl_callable!(A a, B b, C c, D d, E e);
impl_callable!(A a, B b, C c, D d, E e, G g);

/// A function whose calls are timed into its tracer's registry.
#[derive(Clone)]
pub struct Wrapped<F> {
    func: F,
    function: FunctionId,
    wrapper: WrapperId,
    shared: Arc<Shared>,
}

impl<F> Wrapped<F> {
    pub(crate) fn new(func: F, function: FunctionId, wrapper: WrapperId, shared: Arc<Shared>) -> Self {
        Self {
            func,
            function,
            wrapper,
            shared,
        }
    }

    /// Call the wrapped function, timing the call if its record is enabled.
    ///
    /// The enabled flag is checked once on entry. The timing pair completes
    /// even if the function panics.
    #[inline]
    pub fn call<Args>(&self, args: Args) -> <F as Callable<Args>>::Output
    where
        F: Callable<Args>,
    {
        let _timer = TimingGuard::begin(&self.shared, self.function);
        self.func.invoke(args)
    }

    /// Identity of the wrapped function; reports are keyed by it.
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// Identity of this wrapper.
    pub fn wrapper_id(&self) -> WrapperId {
        self.wrapper
    }

    /// Toggle target resolving to the wrapped function's record.
    pub fn target(&self) -> Target {
        Target::Wrapper(self.wrapper)
    }

    pub fn name(&self) -> &'static str {
        self.function.name()
    }

    /// Whether calls are currently timed.
    pub fn is_enabled(&self) -> bool {
        self.shared
            .lock()
            .get(&self.function)
            .is_some_and(|record| record.is_enabled())
    }

    /// The original, untimed function.
    pub fn inner(&self) -> &F {
        &self.func
    }
}

impl<F> fmt::Debug for Wrapped<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("function", &self.function)
            .field("wrapper", &self.wrapper)
            .finish_non_exhaustive()
    }
}

impl<F> From<&Wrapped<F>> for Target {
    fn from(wrapped: &Wrapped<F>) -> Self {
        wrapped.target()
    }
}

/// Ends the timing of one wrapped call when dropped.
pub(crate) struct TimingGuard<'a> {
    shared: &'a Shared,
    function: FunctionId,
}

impl<'a> TimingGuard<'a> {
    /// Begin timing `function`, or return `None` if its record is disabled.
    pub(crate) fn begin(shared: &'a Shared, function: FunctionId) -> Option<Self> {
        let mut registry = shared.lock();
        let record = registry.get_mut(&function)?;
        if !record.is_enabled() {
            return None;
        }
        record.begin();
        Some(Self { shared, function })
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        let mut registry = self.shared.lock();
        if let Some(elapsed) = registry.get_mut(&self.function).and_then(|record| record.end()) {
            tracing::trace!(
                target: "tracer",
                function = self.function.name(),
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "wrapped call recorded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{function_id, Tracer};
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_callable_arities() {
        assert_eq!((|| 7).invoke(()), 7);
        assert_eq!((|a: i32| a * 2).invoke((4,)), 8);
        assert_eq!((|a: i32, b: i32, c: i32| a + b + c).invoke((1, 2, 3)), 6);
        assert_eq!(
            (|a: u8, b: u8, c: u8, d: u8, e: u8, g: u8| a + b + c + d + e + g).invoke((1, 1, 1, 1, 1, 1)),
            6
        );
    }

    #[test]
    fn test_wrapped_records_each_call() {
        let tracer = Tracer::new();
        let nap = tracer
            .wrap(function_id!("nap"), |ms: u64| sleep(Duration::from_millis(ms)), false)
            .unwrap();

        nap.call((5,));
        nap.call((5,));

        let snapshot = tracer.snapshot();
        assert_eq!(snapshot.runs("nap"), Some(2));
        assert!(snapshot.get("nap").unwrap() >= Duration::from_millis(10));
    }

    #[test]
    fn test_wrapped_passes_results_through() {
        let tracer = Tracer::new();
        let parse = tracer
            .wrap(function_id!("parse"), |s: &str| s.parse::<u32>(), false)
            .unwrap();

        assert_eq!(parse.call(("42",)), Ok(42));
        assert!(parse.call(("forty-two",)).is_err());
        assert_eq!(tracer.snapshot().runs("parse"), Some(2));
    }

    #[test]
    fn test_wrapped_times_panicking_call() {
        let tracer = Tracer::new();
        let explode = tracer
            .wrap(function_id!("explode"), || -> u32 { panic!("kaboom") }, false)
            .unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| explode.call(())));

        assert!(result.is_err());
        assert_eq!(tracer.snapshot().runs("explode"), Some(1));
        assert_eq!(tracer.depth(explode.function()), Some(0));
    }

    #[test]
    fn test_wrapper_identity() {
        let tracer = Tracer::new();
        let id = function_id!("identity");
        let first = tracer.wrap(id, |x: i32| x, false).unwrap();
        let second = tracer.wrap(id, |x: i32| x, false).unwrap();

        assert_eq!(first.function(), second.function());
        assert_ne!(first.wrapper_id(), second.wrapper_id());
        assert_eq!(first.name(), "identity");
        assert_eq!(Target::from(&first), Target::Wrapper(first.wrapper_id()));
        assert_eq!((first.inner())(3), 3);
    }

    #[test]
    fn test_debug_output() {
        let tracer = Tracer::new();
        let wrapped = tracer.wrap(function_id!("dbg"), || (), false).unwrap();
        let debug = format!("{:?}", wrapped);
        assert!(debug.contains("Wrapped"));
        assert!(debug.contains("dbg"));
    }
}
