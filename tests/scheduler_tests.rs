//! Pre-request task graphs running on the may runtime

use brrtmvc::context::{ContentNegotiation, RequestInfo};
use brrtmvc::scheduler::Scheduler;
use brrtmvc::server::Request;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod common;
use common::test_server::setup_may_runtime;

fn request() -> Arc<RequestInfo> {
    setup_may_runtime();
    Arc::new(RequestInfo::from_request(
        &Request::get("/dashboard"),
        &ContentNegotiation::default(),
    ))
}

#[test]
fn test_independent_tasks_overlap() {
    let mut s = Scheduler::new();
    for name in ["a", "b", "c"] {
        s.add_task(name, &[], |_| {
            may::coroutine::sleep(Duration::from_millis(100));
            Ok(json!("done"))
        })
        .unwrap();
    }

    let started = Instant::now();
    let out = s.run(request()).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(out.len(), 3);
    assert!(elapsed < Duration::from_millis(280), "took {elapsed:?}");
}

#[test]
fn test_diamond_graph_respects_every_edge() {
    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let mut s = Scheduler::new();
    for (name, deps) in [
        ("join", &["left", "right"][..]),
        ("left", &["root"][..]),
        ("right", &["root"][..]),
        ("root", &[][..]),
    ] {
        let log = Arc::clone(&log);
        s.add_task(name, deps, move |ctx| {
            log.lock().push(name);
            let seen: Vec<&String> = ctx.dependencies().keys().collect();
            Ok(json!(seen))
        })
        .unwrap();
    }

    let out = s.run(request()).unwrap();
    assert_eq!(out["join"], json!(["left", "right"]));
    assert_eq!(out["left"], json!(["root"]));

    let log = log.lock().clone();
    let pos = |n: &str| log.iter().position(|x| *x == n).unwrap();
    assert_eq!(pos("root"), 0);
    assert!(pos("left") < pos("join"));
    assert!(pos("right") < pos("join"));
}

#[test]
fn test_scheduler_runs_fresh_for_every_request() {
    let mut s = Scheduler::new();
    s.add_task("path", &[], |ctx| Ok(json!(ctx.request.path))).unwrap();

    let first = s.run(request()).unwrap();
    let second = s
        .run(Arc::new(RequestInfo::from_request(
            &Request::get("/other"),
            &ContentNegotiation::default(),
        )))
        .unwrap();
    assert_eq!(first["path"], "/dashboard");
    assert_eq!(second["path"], "/other");
}
