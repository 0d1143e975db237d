//! Shared fixtures for the integration tests:
//! - a `Logger` contract with several implementations
//! - a promotable `Config` singleton and services depending on it
//! - mapping providers for value parameters
#![allow(dead_code)]

use ioc::{
    Blueprint, Constructor, Injectable, InjectionTarget, Instance, Mapped, MappingProvider, TypeKey,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Route container logs to the test writer; `RUST_LOG=ioc=debug` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Reference equality that ignores trait-object vtables
pub fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

pub trait Logger: Send + Sync {
    fn name(&self) -> &'static str;
    fn log(&self, line: &str);
    fn lines(&self) -> Vec<String>;
}

#[derive(Default)]
pub struct ConsoleLogger {
    lines: Mutex<Vec<String>>,
}

impl Logger for ConsoleLogger {
    fn name(&self) -> &'static str {
        "console"
    }

    fn log(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Injectable for ConsoleLogger {
    fn blueprint() -> Blueprint<Self> {
        Blueprint::with_default().implements::<dyn Logger, _>(|logger| logger)
    }
}

#[derive(Default)]
pub struct FileLogger;

impl Logger for FileLogger {
    fn name(&self) -> &'static str {
        "file"
    }

    fn log(&self, _line: &str) {}

    fn lines(&self) -> Vec<String> {
        Vec::new()
    }
}

impl Injectable for FileLogger {
    fn blueprint() -> Blueprint<Self> {
        Blueprint::with_default().implements::<dyn Logger, _>(|logger| logger)
    }
}

#[derive(Default)]
pub struct MemoryLogger;

impl Logger for MemoryLogger {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn log(&self, _line: &str) {}

    fn lines(&self) -> Vec<String> {
        Vec::new()
    }
}

impl Injectable for MemoryLogger {
    fn blueprint() -> Blueprint<Self> {
        Blueprint::with_default().implements::<dyn Logger, _>(|logger| logger)
    }
}

#[derive(Debug)]
pub struct Config {
    pub label: String,
}

impl Config {
    pub fn labelled(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::labelled("default")
    }
}

impl Injectable for Config {
    fn blueprint() -> Blueprint<Self> {
        Blueprint::with_default()
    }
}

/// Service with a trait-object and a concrete dependency
pub struct ReportService {
    pub logger: Arc<dyn Logger>,
    pub config: Arc<Config>,
}

impl Injectable for ReportService {
    fn blueprint() -> Blueprint<Self> {
        Blueprint::new().constructor(
            Constructor::new(|mut args| {
                Ok(ReportService {
                    logger: args.take::<dyn Logger>()?,
                    config: args.take::<Config>()?,
                })
            })
            .param::<dyn Logger>("logger")
            .inject::<Config>("config"),
        )
    }
}

/// Service needing a value the registry cannot supply
pub struct Greeter {
    pub greeting: String,
    pub config: Arc<Config>,
}

impl Injectable for Greeter {
    fn blueprint() -> Blueprint<Self> {
        Blueprint::new().constructor(
            Constructor::new(|mut args| {
                Ok(Greeter {
                    greeting: args.take_value::<String>()?,
                    config: args.take::<Config>()?,
                })
            })
            .param::<String>("greeting")
            .inject::<Config>("config"),
        )
    }
}

/// Fan-out over every registered logger
pub struct Broadcaster {
    pub loggers: Vec<Arc<dyn Logger>>,
}

impl Injectable for Broadcaster {
    fn blueprint() -> Blueprint<Self> {
        Blueprint::new().constructor(
            Constructor::new(|mut args| {
                Ok(Broadcaster {
                    loggers: args.take_all::<dyn Logger>()?,
                })
            })
            .many::<dyn Logger>("loggers"),
        )
    }
}

/// Supplies `greeting` for constructor parameters only
pub fn greeting_provider(greeting: &'static str) -> Arc<dyn MappingProvider> {
    Arc::new(
        move |contract: &TypeKey, name: Option<&str>, _parent: Option<&TypeKey>| {
            if *contract == TypeKey::of::<String>() && name == Some("greeting") {
                Mapped::value(
                    Instance::from_value(greeting.to_string()),
                    InjectionTarget::Constructor,
                )
            } else {
                Mapped::none()
            }
        },
    )
}
