//! Function identities used as registry keys.
//!
//! Rust has no runtime reflection that turns an arbitrary callable into a
//! stable token, so identities are declared explicitly, usually as constants
//! next to the function they describe:
//!
//! ```rust
//! use tracer::{function_id, FunctionId};
//!
//! const PARSE: FunctionId = function_id!("Parser::parse");
//!
//! assert_eq!(PARSE.name(), "Parser::parse");
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a function definition.
///
/// Two identities compare equal when both the defining module and the
/// qualified name match. The name alone is what reports show, so two
/// functions in different modules sharing a name are distinct records that
/// print alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId {
    module: &'static str,
    name: &'static str,
}

impl FunctionId {
    /// Create an identity from a module path and a qualified name.
    ///
    /// Prefer the [`function_id!`](crate::function_id) macro, which fills in
    /// the module path of the call site.
    pub const fn new(module: &'static str, name: &'static str) -> Self {
        Self { module, name }
    }

    /// Qualified name used for reporting and logging.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Module path the function was declared in.
    #[inline]
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Fully qualified path, `module::name`.
    pub fn path(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Declare a [`FunctionId`] in the current module.
///
/// ```rust
/// use tracer::function_id;
///
/// let id = function_id!("render_page");
/// assert_eq!(id.module(), module_path!());
/// ```
#[macro_export]
macro_rules! function_id {
    ($name:expr) => {
        $crate::FunctionId::new(module_path!(), $name)
    };
}

static NEXT_WRAPPER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a wrapper produced by [`Tracer::wrap`](crate::Tracer::wrap).
///
/// Distinct from the identity of the function it wraps. The registry keeps a
/// lookup table from wrapper identities back to the wrapped function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WrapperId(u64);

impl WrapperId {
    pub(crate) fn next() -> Self {
        Self(NEXT_WRAPPER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WrapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wrapper#{}", self.0)
    }
}

/// Anything a toggle can be issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A function identity, watched through the interception hook when new
    Function(FunctionId),
    /// A wrapper, resolved to the function it wraps
    Wrapper(WrapperId),
}

impl From<FunctionId> for Target {
    fn from(id: FunctionId) -> Self {
        Target::Function(id)
    }
}

impl From<&FunctionId> for Target {
    fn from(id: &FunctionId) -> Self {
        Target::Function(*id)
    }
}

impl From<WrapperId> for Target {
    fn from(id: WrapperId) -> Self {
        Target::Wrapper(id)
    }
}
