//! Call-Timing Tracer
//!
//! This crate measures the wall-clock time spent inside selected functions
//! and lets individual functions be switched on and off at runtime:
//!
//! - Explicit wrapping: [`Tracer::wrap`] returns a [`Wrapped`] function that
//!   times every call made through it
//! - Interception: functions marked with [`probe!`] can be watched by
//!   identity, without touching their callers, through one process-wide hook
//! - Recursion-aware timing: recursive calls are counted once per outermost
//!   call unless summation of every frame is requested
//! - Aggregate reports as a [`Snapshot`] or a rendered status table
//!
//! The interception hook is installed only while at least one watched
//! function is enabled, so probes cost a single atomic load otherwise.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tracer::{function_id, probe, FunctionId, Tracer};
//!
//! const FIB: FunctionId = function_id!("fib");
//!
//! fn fib(n: u64) -> u64 {
//!     probe!(FIB);
//!     if n < 2 { n } else { fib(n - 1) + fib(n - 2) }
//! }
//!
//! let tracer = Tracer::new();
//!
//! // Watched through the hook; only the outermost call is recorded
//! tracer.enable([FIB], false);
//! assert_eq!(fib(10), 55);
//! tracer.disable([FIB]);
//!
//! // Wrapped explicitly
//! let square = tracer.wrap(function_id!("square"), |x: u64| x * x, false).unwrap();
//! assert_eq!(square.call((12,)), 144);
//!
//! let snapshot = tracer.snapshot();
//! assert_eq!(snapshot.runs("fib"), Some(1));
//! assert_eq!(snapshot.runs("square"), Some(1));
//! assert!(snapshot.get("fib").unwrap() > Duration::ZERO);
//!
//! println!("{}", tracer);
//! ```
//!
//! # Modules
//!
//! - [`hook`] - Process-wide call interception and the [`probe!`] macro
//! - `identity` - Function and wrapper identities
//! - `record` - Per-function timing state and recursion policy
//! - `registry` - Identity to record mapping and the watch set
//! - `wrap` - Explicit per-call wrapping
//! - `tracer` - The toggle controller
//! - `report` - Snapshots and table rendering
//! - `config` - Tracer configuration
//! - `error` - Error types

mod config;
mod error;
pub mod hook;
mod identity;
mod record;
mod registry;
mod report;
mod tracer;
mod wrap;

pub use config::{TracerConfig, MAX_PRECISION};
pub use error::{TracerError, TracerResult};
pub use hook::{CallEvent, CallHook, EventKind, HookControl, HookOwner, ProbeGuard};
pub use identity::{FunctionId, Target, WrapperId};
pub use report::{ReportStyle, Snapshot, SnapshotEntry};
pub use tracer::Tracer;
pub use wrap::{Callable, Wrapped};

/// Re-export for convenience
pub use std::time::Duration;
