use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use super::Scheduler;
use crate::context::{ContentNegotiation, RequestInfo};
use crate::error::DispatchError;
use crate::server::Request;

static MAY_INIT: Once = Once::new();

fn request(url: &str) -> Arc<RequestInfo> {
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x10000);
    });
    Arc::new(RequestInfo::from_request(
        &Request::get(url).with_header("Cookie", "sid=s1"),
        &ContentNegotiation::default(),
    ))
}

#[test]
fn test_outputs_keyed_by_task_name() {
    let mut s = Scheduler::new();
    s.add_task("session", &[], |ctx| Ok(json!({"sid": ctx.request.cookie("sid")})))
        .unwrap();
    s.add_task("flag", &[], |_| Ok(json!(true))).unwrap();
    let out = s.run(request("/")).unwrap();
    assert_eq!(out["session"], json!({"sid": "s1"}));
    assert_eq!(out["flag"], json!(true));
}

#[test]
fn test_dependency_finishes_before_dependent_starts() {
    let events = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut s = Scheduler::new();

    let log = Arc::clone(&events);
    s.add_task("b", &["a"], move |ctx| {
        log.lock().push("start:b".into());
        let a = ctx.dependency("a").cloned().unwrap_or_default();
        Ok(json!({"seen": a}))
    })
    .unwrap();

    let log = Arc::clone(&events);
    s.add_task("a", &[], move |_| {
        log.lock().push("start:a".into());
        may::coroutine::sleep(Duration::from_millis(20));
        log.lock().push("end:a".into());
        Ok(json!(1))
    })
    .unwrap();

    let out = s.run(request("/")).unwrap();
    assert_eq!(out["b"], json!({"seen": 1}));

    let events = events.lock().clone();
    let end_a = events.iter().position(|e| e == "end:a").unwrap();
    let start_b = events.iter().position(|e| e == "start:b").unwrap();
    assert!(end_a < start_b, "events: {events:?}");
}

#[test]
fn test_dependent_only_sees_its_own_dependencies() {
    let mut s = Scheduler::new();
    s.add_task("a", &[], |_| Ok(json!("a"))).unwrap();
    s.add_task("other", &[], |_| Ok(json!("other"))).unwrap();
    s.add_task("b", &["a"], |ctx| {
        Ok(json!(ctx.dependencies().keys().cloned().collect::<Vec<_>>()))
    })
    .unwrap();
    let out = s.run(request("/")).unwrap();
    assert_eq!(out["b"], json!(["a"]));
}

#[test]
fn test_failed_dependency_skips_dependent() {
    let invoked = Arc::new(AtomicBool::new(false));
    let mut s = Scheduler::new();
    s.add_task("a", &[], |_| Err(DispatchError::with_status(403, "no session")))
        .unwrap();
    let flag = Arc::clone(&invoked);
    s.add_task("b", &["a"], move |_| {
        flag.store(true, Ordering::SeqCst);
        Ok(json!(null))
    })
    .unwrap();

    let err = s.run(request("/")).unwrap_err();
    assert_eq!(err.status(), 403);
    assert_eq!(err.to_string(), "no session");
    assert!(!invoked.load(Ordering::SeqCst));
}

#[test]
fn test_running_tasks_finish_after_failure() {
    let finished = Arc::new(AtomicBool::new(false));
    let mut s = Scheduler::new();
    let flag = Arc::clone(&finished);
    s.add_task("slow", &[], move |_| {
        may::coroutine::sleep(Duration::from_millis(30));
        flag.store(true, Ordering::SeqCst);
        Ok(json!("late"))
    })
    .unwrap();
    s.add_task("fails", &[], |_| Err(DispatchError::handler("boom")))
        .unwrap();

    let err = s.run(request("/")).unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert!(finished.load(Ordering::SeqCst));
}

#[test]
fn test_cycle_rejected_before_any_task_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut s = Scheduler::new();
    for (name, deps) in [("root", &[][..]), ("x", &["y"][..]), ("y", &["x"][..])] {
        let calls = Arc::clone(&calls);
        s.add_task(name, deps, move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!(null))
        })
        .unwrap();
    }

    let err = s.validate().unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    assert!(err.to_string().contains("cycle"));

    let err = s.run(request("/")).unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_undeclared_dependency_is_configuration_error() {
    let mut s = Scheduler::new();
    s.add_task("user", &["session"], |_| Ok(json!(null))).unwrap();
    let err = s.validate().unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    assert!(err.to_string().contains("session"));
}

#[test]
fn test_duplicate_task_name_rejected() {
    let mut s = Scheduler::new();
    s.add_task("a", &[], |_| Ok(json!(1))).unwrap();
    let err = s.add_task("a", &[], |_| Ok(json!(2))).unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    assert_eq!(s.len(), 1);
}

#[test]
fn test_validate_returns_topological_order() {
    let mut s = Scheduler::new();
    s.add_task("c", &["b", "b"], |_| Ok(json!(null))).unwrap();
    s.add_task("b", &["a"], |_| Ok(json!(null))).unwrap();
    s.add_task("a", &[], |_| Ok(json!(null))).unwrap();
    assert_eq!(s.task("c").unwrap().dependencies, vec!["b".to_string()]);
    assert_eq!(s.validate().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn test_panicking_task_becomes_handler_error() {
    let mut s = Scheduler::new();
    s.add_task("explodes", &[], |_| -> Result<serde_json::Value, DispatchError> {
        panic!("task blew up")
    })
    .unwrap();
    let err = s.run(request("/")).unwrap_err();
    assert_eq!(err.status(), 500);
    assert!(err.to_string().contains("task blew up"));
}

#[test]
fn test_empty_scheduler_returns_empty_map() {
    let s = Scheduler::new();
    assert!(s.is_empty());
    assert!(s.run(request("/")).unwrap().is_empty());
}
