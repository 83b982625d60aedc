//! Tracer demo
//!
//! Times methods, nested functions and recursive calls, toggles some of them
//! at runtime and prints the resulting table. An optional first argument
//! names a JSON file with a `TracerConfig`.
//!
//! Expected totals:
//!
//! - `SomeClass.main_function`: 2.1s (every recursive frame summed)
//! - `SomeClass.main_function.inner_function`: 0.3s
//! - `SomeClass.toggled_function`: 0.2s
//! - `SomeClass.function_without_wrapper`: 0.1s
//! - `SomeClass.class_function`: 0.1s

use std::error::Error;
use std::thread::sleep;
use std::time::Duration;

use tracer::{function_id, probe, FunctionId, Tracer, TracerConfig, TracerResult, Wrapped};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STEP: Duration = Duration::from_millis(100);

const MAIN_FUNCTION: FunctionId = function_id!("SomeClass.main_function");
const INNER_FUNCTION: FunctionId = function_id!("SomeClass.main_function.inner_function");
const TOGGLED_FUNCTION: FunctionId = function_id!("SomeClass.toggled_function");
const FUNCTION_WITHOUT_WRAPPER: FunctionId = function_id!("SomeClass.function_without_wrapper");
const CLASS_FUNCTION: FunctionId = function_id!("SomeClass.class_function");

struct SomeClass {
    main_function: Wrapped<fn(&SomeClass, bool)>,
    inner_function: Wrapped<fn()>,
    toggled_function: Wrapped<fn()>,
}

impl SomeClass {
    fn new(tracer: &Tracer) -> TracerResult<Self> {
        // Switch the last argument to false to time only the outermost call
        let main_function = tracer.wrap(MAIN_FUNCTION, Self::main_function_body as fn(&SomeClass, bool), true)?;
        let inner_function = tracer.wrap(INNER_FUNCTION, inner_function as fn(), false)?;
        let toggled_function = tracer.wrap(TOGGLED_FUNCTION, Self::toggled_function_body as fn(), false)?;

        Ok(Self {
            main_function,
            inner_function,
            toggled_function,
        })
    }

    /// First run (recursive): 0.1s + the second run.
    /// Second run: 0.3s, of which 0.1s is untimed helper work.
    fn main_function(&self, recursive: bool) {
        self.main_function.call((self, recursive));
    }

    fn main_function_body(&self, recursive: bool) {
        sleep(STEP);

        if recursive {
            self.main_function(false);
        } else {
            inner_function_untraced();
            self.inner_function.call(());
        }
    }

    fn toggled_function(&self) {
        self.toggled_function.call(());
    }

    fn toggled_function_body() {
        sleep(STEP);
    }

    fn function_without_wrapper(&self) {
        probe!(FUNCTION_WITHOUT_WRAPPER);
        sleep(STEP);
    }

    fn class_function() {
        probe!(CLASS_FUNCTION);
        sleep(STEP);
    }
}

fn inner_function() {
    sleep(STEP);
}

fn inner_function_untraced() {
    sleep(STEP);
}

fn load_config() -> Result<TracerConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            Ok(TracerConfig::from_json(&json)?)
        }
        None => Ok(TracerConfig::new().with_log(true)),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let tracer = Tracer::with_config(load_config()?);

    // Nothing is registered yet
    println!("{}", tracer);

    let instance = SomeClass::new(&tracer)?;

    for _ in 0..3 {
        instance.main_function(true);
    }

    // Wrapped functions can be toggled through their wrapper
    instance.toggled_function();
    tracer.disable([&instance.toggled_function]);
    instance.toggled_function();
    tracer.enable([&instance.toggled_function], false);
    instance.toggled_function();

    // Probed functions are watched by identity, no wrapper needed
    tracer.toggle([FUNCTION_WITHOUT_WRAPPER], false, None);
    instance.function_without_wrapper();
    tracer.toggle([FUNCTION_WITHOUT_WRAPPER], false, None);
    instance.function_without_wrapper();

    tracer.enable([CLASS_FUNCTION], false);
    SomeClass::class_function();
    tracer.disable([CLASS_FUNCTION]);

    tracing::info!(
        hook_installed = tracer.is_hook_installed(),
        total_ms = tracer.snapshot().total().as_secs_f64() * 1000.0,
        "demo finished"
    );

    println!("{}", tracer);
    Ok(())
}
