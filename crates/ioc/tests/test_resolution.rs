//! Resolution modes, cascade levels, mapping providers and overrides.

mod common;

use anyhow::Result;
use common::*;
use ioc::{
    CascadeLevel, ConstructionCause, Container, ContainerError, Instance, MappingLevel,
    RegisterMode, RegistryKey, ResolveMode, SingletonMode, TypeKey,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

fn scoped_services() -> Result<(Container, Container)> {
    let root = Container::new();
    root.bind::<dyn Logger, ConsoleLogger>().register()?;
    root.register::<Config>(RegisterMode::ContainerSingleton)?;
    root.register::<ReportService>(RegisterMode::Transient)?;
    let child = root.create_child(Some("request"), false).expect("child");
    Ok((root, child))
}

#[test]
fn test_transient_current_keeps_dependencies_scoped() -> Result<()> {
    init_tracing();
    let (_root, child) = scoped_services()?;
    let scoped = child.resolve::<Config>()?;

    let service = child.resolve_transient::<ReportService>(CascadeLevel::Current)?;
    assert!(Arc::ptr_eq(&service.config, &scoped));
    Ok(())
}

#[test]
fn test_transient_with_dependencies_rebuilds_inherited_singletons() -> Result<()> {
    let (root, child) = scoped_services()?;

    // Built fresh instead of promoting the root registration.
    let service = child.resolve_transient::<ReportService>(CascadeLevel::CurrentWithDependencies)?;
    let scoped = child.resolve::<Config>()?;
    assert!(!Arc::ptr_eq(&service.config, &scoped));
    assert!(!Arc::ptr_eq(&service.config, &root.resolve::<Config>()?));
    Ok(())
}

#[test]
fn test_transient_honours_local_and_universal_singletons() -> Result<()> {
    let root = Container::new();
    root.bind::<dyn Logger, ConsoleLogger>()
        .mode(RegisterMode::UniversalSingleton)
        .register()?;
    root.register::<ReportService>(RegisterMode::Transient)?;
    let child = root.create_child(None, false).expect("child");
    child.register::<Config>(RegisterMode::ContainerSingleton)?;

    let local = child.resolve::<Config>()?;
    let logger = root.resolve::<dyn Logger>()?;
    let service = child.resolve_transient::<ReportService>(CascadeLevel::CascadeAll)?;

    assert!(Arc::ptr_eq(&service.config, &local));
    assert!(same(&service.logger, &logger));
    Ok(())
}

#[test]
fn test_transient_mode_on_a_singleton_contract() -> Result<()> {
    let root = Container::new();
    root.register::<Config>(RegisterMode::ContainerWeakSingleton)?;

    let cached = root.resolve::<Config>()?;
    let fresh = root.resolve_transient::<Config>(CascadeLevel::Current)?;
    assert!(!Arc::ptr_eq(&cached, &fresh));
    assert!(Arc::ptr_eq(&cached, &root.resolve::<Config>()?));
    Ok(())
}

#[test]
fn test_logger_singleton_identity() -> Result<()> {
    let root = Container::new();
    root.bind::<dyn Logger, ConsoleLogger>().register()?;

    let first = root.resolve::<dyn Logger>()?;
    first.log("started");
    let second = root.resolve::<dyn Logger>()?;
    assert!(same(&first, &second));
    assert_eq!(second.lines(), vec!["started".to_string()]);
    assert!(root.stats().cache_hits >= 1);
    Ok(())
}

#[test]
fn test_unregistered_type_builds_transiently() -> Result<()> {
    let root = Container::new();
    root.bind::<dyn Logger, ConsoleLogger>().register()?;

    let first = root.resolution_of::<ReportService>().resolve()?;
    let second = root.resolution_of::<ReportService>().resolve()?;
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(same(&first.logger, &second.logger));
    Ok(())
}

#[test]
fn test_value_parameter_requires_mapping() -> Result<()> {
    let root = Container::new();

    let err = root
        .resolution_of::<Greeter>()
        .resolve()
        .err()
        .expect("value dependency");
    assert!(matches!(
        err.root_cause(),
        Some(ConstructionCause::ValueDependency { parameter, .. }) if parameter == "greeting"
    ));

    let greeter = root
        .resolution_of::<Greeter>()
        .mapped(greeting_provider("hello"), MappingLevel::CurrentWithDependencies)
        .resolve()?;
    assert_eq!(greeter.greeting, "hello");
    Ok(())
}

#[test]
fn test_mapping_level_current_does_not_reach_parameters() {
    let root = Container::new();
    let result = root
        .resolution_of::<Greeter>()
        .mapped(greeting_provider("hello"), MappingLevel::Current)
        .resolve();
    assert!(result.is_err());
}

#[test]
fn test_registration_carries_its_mapping() -> Result<()> {
    let root = Container::new();
    root.bind::<Greeter, Greeter>()
        .mapped(greeting_provider("registered"), MappingLevel::CascadeAll)
        .register()?;
    let child = root.create_child(None, false).expect("child");

    assert_eq!(root.resolve::<Greeter>()?.greeting, "registered");
    assert_eq!(child.resolve::<Greeter>()?.greeting, "registered");
    Ok(())
}

#[test]
fn test_override_intercepts_before_registry() -> Result<()> {
    let root = Container::new();
    root.register_instance(Config::labelled("registered"), SingletonMode::ContainerSingleton)?;
    let child = root.create_child(None, false).expect("child");

    child.set_override(|request, _| {
        (request.contract_key() == TypeKey::of::<Config>())
            .then(|| Instance::from_value(Config::labelled("override")))
    })?;

    assert_eq!(child.resolve::<Config>()?.label, "override");
    assert_eq!(root.resolve::<Config>()?.label, "registered");

    let second = child.set_override(|_, _| None);
    assert!(matches!(
        second,
        Err(ContainerError::OverrideAlreadyInstalled { .. })
    ));
    Ok(())
}

#[test]
fn test_override_of_wrong_type_is_ignored() -> Result<()> {
    let root = Container::new();
    root.register_instance(Config::labelled("registered"), SingletonMode::ContainerSingleton)?;
    root.set_override(|_, _| Some(Instance::from_value(42_u64)))?;

    assert_eq!(root.resolve::<Config>()?.label, "registered");
    Ok(())
}

#[test]
fn test_override_feeds_dependencies() -> Result<()> {
    let root = Container::new();
    root.bind::<dyn Logger, ConsoleLogger>().register()?;
    root.set_override(|request, _| {
        (request.contract_name.as_deref() == Some("config"))
            .then(|| Instance::from_value(Config::labelled("from override")))
    })?;

    let service = root.resolution_of::<ReportService>().resolve()?;
    assert_eq!(service.config.label, "from override");
    Ok(())
}

#[test]
fn test_keyed_resolution_falls_back_to_unkeyed() -> Result<()> {
    let root = Container::new();
    root.register_instance(Config::labelled("plain"), SingletonMode::ContainerSingleton)?;
    root.bind_instance::<Config, _>(Config::labelled("primary"))
        .keyed("primary")
        .register()?;

    assert_eq!(root.resolve_keyed::<Config>("primary")?.label, "primary");
    assert_eq!(root.resolve_keyed::<Config>("secondary")?.label, "plain");
    assert_eq!(root.resolve::<Config>()?.label, "plain");
    Ok(())
}

#[test]
fn test_priority_key_flows_to_dependencies() -> Result<()> {
    let root = Container::new();
    root.bind::<dyn Logger, ConsoleLogger>().register()?;
    root.bind::<dyn Logger, FileLogger>().keyed("audit").register()?;
    root.register_keyed::<ReportService>("audit", RegisterMode::Transient)?;

    let service = root.resolve_keyed::<ReportService>("audit")?;
    assert_eq!(service.logger.name(), "file");
    Ok(())
}

#[test]
fn test_creator_singleton_is_lazy() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let root = Container::new();
    root.register_creator(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Config::labelled("created"))
        },
        SingletonMode::ContainerSingleton,
    )?;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let first = root.resolve::<Config>()?;
    let second = root.resolve::<Config>()?;
    assert_eq!(first.label, "created");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A child promotes by running the creator again.
    let child = root.create_child(None, false).expect("child");
    assert_eq!(child.resolve::<Config>()?.label, "created");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_concurrent_promotion_yields_one_instance() -> Result<()> {
    let root = Container::new();
    root.register::<Config>(RegisterMode::ContainerSingleton)?;
    let child = root.create_child(None, false).expect("child");

    let resolved: Vec<Arc<Config>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| child.resolve::<Config>()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("resolver thread"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let first = &resolved[0];
    assert!(resolved.iter().all(|config| Arc::ptr_eq(config, first)));
    assert!(Arc::ptr_eq(first, &child.resolve::<Config>()?));
    // Threads that lose the insert race adopt the winner and are not counted.
    assert_eq!(child.stats().promotions, 1);
    Ok(())
}

#[test]
fn test_resolve_request_with_explicit_mode() -> Result<()> {
    let root = Container::new();
    root.register::<Config>(RegisterMode::ContainerSingleton)?;
    let cached = root.resolve::<Config>()?;

    let instance = root
        .resolution::<Config>()
        .mode(ResolveMode::Transient)
        .resolve_instance()?;
    assert!(instance.is::<Config>());
    let fresh = instance.downcast::<Config>().expect("config");
    // Local container singletons stay shared even when forced.
    assert!(Arc::ptr_eq(&fresh, &cached));
    Ok(())
}

#[test]
fn test_diagnose_and_unregister() -> Result<()> {
    let root = Container::named("root");
    root.register::<Config>(RegisterMode::ContainerSingleton)?;
    root.bind::<dyn Logger, ConsoleLogger>()
        .mode(RegisterMode::UniversalSingleton)
        .register()?;
    let child = root.create_child(Some("child"), false).expect("child");
    let key = RegistryKey::of::<Config>();

    let diagnosis = child.diagnose(&key, true);
    assert!(diagnosis.registered);
    assert!(diagnosis.inherited);
    assert!(!child.diagnose(&key, false).registered);

    let universal = child.diagnose(&RegistryKey::of::<dyn Logger>(), false);
    assert!(universal.registered);
    assert!(universal.message.contains("universal"), "{}", universal.message);

    assert!(root.unregister(&key));
    assert!(!root.unregister(&key));
    assert!(!child.is_registered::<Config>());
    Ok(())
}
