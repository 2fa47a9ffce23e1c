//! End-to-end tests for the request pipeline
//!
//! Every test builds the blog fixture from `common` and drives it through
//! `Dispatcher::dispatch` with an in-memory response, in both HTML and JSON
//! output modes.

use brrtmvc::dispatcher::DispatcherOptions;
use brrtmvc::error::DispatchError;
use brrtmvc::profiler::{FileSink, MemorySink};
use brrtmvc::scheduler::Scheduler;
use brrtmvc::server::{BufferedResponse, Request, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON};
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod common;
use common::blog;

fn send(req: Request) -> (u16, BufferedResponse) {
    let d = blog::dispatcher();
    let mut res = BufferedResponse::new();
    let status = d.dispatch(&req, &mut res);
    (status, res)
}

fn ajax(url: &str) -> Request {
    Request::get(url).with_header("X-Requested-With", "XMLHttpRequest")
}

#[test]
fn test_sync_view_renders_html() {
    let (status, res) = send(Request::get("/"));
    assert_eq!(status, 200);
    assert_eq!(res.status, 200);
    assert_eq!(res.body_text(), "<span>foo</span>");
    assert_eq!(res.header("content-type"), Some(CONTENT_TYPE_HTML));
    assert!(res.finished);
}

#[test]
fn test_sync_view_renders_json_for_ajax_header() {
    let (status, res) = send(ajax("/"));
    assert_eq!(status, 200);
    assert_eq!(res.body_json().unwrap(), json!({"test": {"bar": "foo", "site": "brrt blog", "session": {"user": "anonymous"}}}));
    assert_eq!(res.header("content-type"), Some(CONTENT_TYPE_JSON));
}

#[test]
fn test_json_query_flag_selects_json() {
    let (_, res) = send(Request::get("/?json=true"));
    assert_eq!(res.body_json().unwrap()["test"]["bar"], "foo");
    let (_, res) = send(Request::get("/?json=false"));
    assert_eq!(res.body_text(), "<span>foo</span>");
}

#[test]
fn test_task_output_params_and_locals_reach_the_view() {
    let req = Request::get("/posts/hello-world").with_header("Cookie", "sid=ada");
    let (status, res) = send(req);
    assert_eq!(status, 200);
    assert_eq!(
        res.body_text(),
        "<h1>hello-world</h1><p>ada</p><i>welcome back</i>"
    );
}

#[test]
fn test_wildcard_route_captures_rest_of_path() {
    let (_, res) = send(Request::get("/files/docs/guide%20v2.txt"));
    assert_eq!(res.body_text(), "docs&#x2f;guide v2.txt");
}

#[test]
fn test_request_values_are_escaped_in_html() {
    let req = Request::get("/posts/%3Cscript%3Ealert(1)%3C%2Fscript%3E").with_header("cookie", "sid=\"o'neil\"");
    let (status, res) = send(req);
    assert_eq!(status, 200);
    assert_eq!(
        res.body_text(),
        "<h1>&lt;script&gt;alert(1)&lt;&#x2f;script&gt;</h1><p>&quot;o&#x27;neil&quot;</p><i>welcome back</i>"
    );
}

#[test]
fn test_request_values_are_raw_in_json() {
    let (_, res) = send(ajax("/files/a%3Cb"));
    assert_eq!(res.body_json().unwrap()["file"]["splat"], "a<b");
}

#[test]
fn test_unregistered_path_is_404_in_html_and_json() {
    let (status, res) = send(Request::get("/nope"));
    assert_eq!(status, 404);
    assert_eq!(res.status, 404);
    assert_eq!(res.body_text(), "<h1>Not found: &#x2f;nope</h1>");
    assert!(res.finished);

    let (status, res) = send(ajax("/nope?x=1"));
    assert_eq!(status, 404);
    let body = res.body_json().unwrap();
    assert_eq!(body["code"], 404);
    assert_eq!(body["url"], "/nope?x=1");
    assert!(body["message"].as_str().unwrap().contains("/nope"));
}

#[test]
fn test_any_method_on_unknown_route_is_404() {
    for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS] {
        let req = Request::new(method.clone(), "/", [("x-requested-with", "XMLHttpRequest")]);
        let (status, res) = send(req);
        assert_eq!(status, 404, "{method}");
        assert_eq!(res.body_json().unwrap()["code"], 404);
    }
}

#[test]
fn test_missing_group_or_action_is_404() {
    for url in ["/missing-action", "/missing-group"] {
        let (status, _) = send(Request::get(url));
        assert_eq!(status, 404, "{url}");
    }
}

#[test]
fn test_declared_status_uses_generic_error_template() {
    let (status, res) = send(Request::get("/teapot"));
    assert_eq!(status, 418);
    assert_eq!(res.status, 418);
    assert_eq!(res.body_text(), "<h1>Error 418</h1>");
}

#[test]
fn test_error_without_templates_falls_back_to_json_payload() {
    let d = blog::dispatcher();
    let bare = brrtmvc::Dispatcher::new(
        d.routes().clone(),
        Scheduler::new(),
        d.handlers().clone(),
        brrtmvc::Renderer::new(brrtmvc::TemplateSet::new(), Default::default()),
        DispatcherOptions::default(),
    )
    .unwrap();
    let mut res = BufferedResponse::new();
    assert_eq!(bare.dispatch(&Request::get("/teapot"), &mut res), 418);
    assert_eq!(res.header("content-type"), Some(CONTENT_TYPE_JSON));
    let body = res.body_json().unwrap();
    assert_eq!(body["code"], 418);
    assert_eq!(body["message"], "short and stout");
}

#[test]
fn test_async_action_completes_through_callback() {
    let req = ajax("/async/ok").with_header("cookie", "sid=grace");
    let (status, res) = send(req);
    assert_eq!(status, 200);
    assert_eq!(res.body_json().unwrap()["test"]["bar"], "grace");
}

#[test]
fn test_async_error_is_caught_by_boundary() {
    let (status, res) = send(ajax("/async/fail"));
    assert_eq!(status, 502);
    assert_eq!(res.body_json().unwrap()["message"], "upstream unavailable");
}

#[test]
fn test_panic_in_async_continuation_is_500() {
    let (status, res) = send(ajax("/async/panic"));
    assert_eq!(status, 500);
    let body = res.body_json().unwrap();
    assert!(body["message"].as_str().unwrap().contains("panicked"));
    assert!(res.finished);
}

#[test]
fn test_no_view_gives_empty_body_or_empty_object() {
    let (status, res) = send(Request::get("/empty"));
    assert_eq!(status, 200);
    assert!(res.body.is_empty());
    assert!(res.finished);

    let (_, res) = send(ajax("/empty"));
    assert_eq!(res.body_json().unwrap(), json!({}));
}

#[test]
fn test_layout_wraps_header_and_footer_data() {
    let (_, res) = send(Request::get("/layout"));
    assert_eq!(
        res.body_text(),
        "<header>brrt blog</header><span>main</span><footer>2024</footer>"
    );
}

#[test]
fn test_excluded_views_absent_from_json() {
    let (_, res) = send(ajax("/hidden"));
    let body = res.body_json().unwrap();
    let top = body.as_object().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top["test"]["bar"], "shown");
    assert!(top["test"].get("aside").is_none());
}

#[test]
fn test_post_route_is_method_specific() {
    let req = Request::new(Method::POST, "/posts", std::iter::empty::<(&str, String)>());
    let (status, res) = send(req);
    assert_eq!(status, 200);
    assert_eq!(res.body_text(), "<span>created</span>");
    assert_eq!(send(Request::get("/posts")).0, 404);
}

#[test]
fn test_failed_task_skips_handler_and_reports_its_status() {
    let handler_ran = Arc::new(AtomicBool::new(false));
    let mut scheduler = Scheduler::new();
    scheduler
        .add_task("auth", &[], |ctx| match ctx.request.cookie("sid") {
            Some(_) => Ok(json!(true)),
            None => Err(DispatchError::with_status(403, "login required")),
        })
        .unwrap();
    let flag = Arc::clone(&handler_ran);
    scheduler
        .add_task("audit", &["auth"], move |_| {
            flag.store(true, Ordering::SeqCst);
            Ok(json!(null))
        })
        .unwrap();

    let d = blog::dispatcher_with(scheduler, DispatcherOptions::default());
    let mut res = BufferedResponse::new();
    assert_eq!(d.dispatch(&ajax("/"), &mut res), 403);
    assert_eq!(res.body_json().unwrap()["message"], "login required");
    assert!(!handler_ran.load(Ordering::SeqCst));

    let mut res = BufferedResponse::new();
    let req = ajax("/").with_header("cookie", "sid=1");
    assert_eq!(d.dispatch(&req, &mut res), 200);
    assert!(handler_ran.load(Ordering::SeqCst));
}

#[test]
fn test_profile_recorded_once_per_request() {
    let sink = Arc::new(MemorySink::new());
    let options = DispatcherOptions {
        profiler_sink: Some(sink.clone()),
        ..DispatcherOptions::default()
    };
    let d = blog::dispatcher_with(blog::session_scheduler(), options);

    d.dispatch(&Request::get("/?a=1"), &mut BufferedResponse::new());
    d.dispatch(&Request::get("/nope"), &mut BufferedResponse::new());

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["url"], "/?a=1");

    let request = &records[0]["data"]["request"];
    let total = request["total"].as_u64().unwrap();
    assert_eq!(request["stop"].as_u64().unwrap() - request["start"].as_u64().unwrap(), total);
    assert_eq!(request["data"]["status"], 200);
    assert!(records[0]["data"]["render"]["stop"].is_u64());
    assert!(records[0]["data"]["tasks"].is_object());

    assert_eq!(records[1]["data"]["request"]["data"]["status"], 404);
    assert!(records[1]["data"].get("render").is_none());
}

#[test]
fn test_spans_cut_short_by_errors_are_stopped() {
    let sink = Arc::new(MemorySink::new());
    let options = DispatcherOptions {
        profiler_sink: Some(sink.clone()),
        ..DispatcherOptions::default()
    };
    let d = blog::dispatcher_with(blog::session_scheduler(), options);
    d.dispatch(&Request::get("/teapot"), &mut BufferedResponse::new());

    let records = sink.records();
    let handler = &records[0]["data"]["handler"];
    assert!(handler["stop"].is_u64());
    assert!(handler["total"].is_u64());
    assert_eq!(handler["data"]["aborted"], true);
    assert!(records[0]["data"]["request"]["data"].get("aborted").is_none());
}

#[test]
fn test_file_sink_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.jsonl");
    let options = DispatcherOptions {
        profiler_sink: Some(Arc::new(FileSink::new(&path))),
        ..DispatcherOptions::default()
    };
    let d = blog::dispatcher_with(blog::session_scheduler(), options);
    for url in ["/", "/posts/a", "/nope"] {
        d.dispatch(&Request::get(url), &mut BufferedResponse::new());
    }

    let content = std::fs::read_to_string(&path).unwrap();
    let urls: Vec<String> = content
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls, vec!["/", "/posts/a", "/nope"]);
}

#[test]
fn test_concurrent_requests_do_not_share_state() {
    let d = Arc::new(blog::dispatcher());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let d = Arc::clone(&d);
            std::thread::spawn(move || {
                let req = Request::get(format!("/posts/p{i}")).with_header("cookie", format!("sid=u{i}"));
                let mut res = BufferedResponse::new();
                d.dispatch(&req, &mut res);
                (i, res.body_text())
            })
        })
        .collect();
    for h in handles {
        let (i, body) = h.join().unwrap();
        assert_eq!(body, format!("<h1>p{i}</h1><p>u{i}</p><i>welcome back</i>"));
    }
}
