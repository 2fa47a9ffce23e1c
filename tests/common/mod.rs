#![allow(dead_code)]

pub mod test_server {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x10000);
        });
    }
}

pub mod blog {
    //! A small blog application used across the integration tests

    use brrtmvc::dispatcher::{Dispatcher, DispatcherOptions};
    use brrtmvc::error::DispatchError;
    use brrtmvc::handlers::{HandlerGroup, HandlerRegistry};
    use brrtmvc::renderer::{Renderer, RendererConfig, TemplateSet};
    use brrtmvc::router::{RouteSource, RouteTable};
    use brrtmvc::scheduler::Scheduler;
    use brrtmvc::view::{Slot, View, ViewTree};
    use serde_json::json;
    use std::time::Duration;

    pub const ROUTES: &str = r#"
get:
  /: home.index
  /empty: home.empty
  /teapot: home.teapot
  /layout: home.layout
  /hidden: home.hidden
  /missing-action: home.nope
  /missing-group: ghost.index
  /posts/:slug: posts.show
  /async/ok: remote.ok
  /async/fail: remote.fail
  /async/panic: remote.panic
  /files/*: home.file
post:
  /posts: posts.create
"#;

    pub fn templates() -> TemplateSet {
        let mut t = TemplateSet::new();
        for (name, source) in [
            ("test", "<span>{{ bar }}</span>"),
            ("post", "<h1>{{ slug }}</h1><p>{{ session.user }}</p><i>{{ flash }}</i>"),
            ("header", "<header>{{ site }}</header>"),
            ("footer", "<footer>{{ year }}</footer>"),
            ("file", "{{ splat }}"),
            ("404", "<h1>Not found: {{ url }}</h1>"),
            ("error", "<h1>Error {{ code }}</h1>"),
        ] {
            t.compile(name, source).expect("fixture template compiles");
        }
        t
    }

    pub fn renderer_config() -> RendererConfig {
        RendererConfig {
            default_header: Some("header".into()),
            default_footer: Some("footer".into()),
            defaults: json!({"site": "brrt blog"})
                .as_object()
                .cloned()
                .expect("object"),
        }
    }

    pub fn routes() -> RouteTable {
        let source = RouteSource::parse(ROUTES).expect("fixture routes parse");
        let mut table = RouteTable::new();
        table.batch_load(&source).expect("fixture routes load");
        table
    }

    pub fn handlers() -> HandlerRegistry {
        let home = HandlerGroup::new()
            .sync("index", |_| Ok(Some(View::new("test", json!({"bar": "foo"})).into())))
            .sync("empty", |_| Ok(None))
            .sync("teapot", |_| Err(DispatchError::with_status(418, "short and stout")))
            .sync("layout", |_| {
                Ok(Some(ViewTree::Layout {
                    header: Some(Slot::Data(json!({}))),
                    main: Some(Slot::View(View::new("test", json!({"bar": "main"})))),
                    footer: Some(Slot::Data(json!({"year": 2024}))),
                }))
            })
            .sync("hidden", |_| {
                Ok(Some(
                    vec![
                        View::new("test", json!({"bar": "shown"}))
                            .with_child("aside", View::excluded("test", json!({"bar": "aside"}))),
                        View::excluded("secret", json!({"token": "x"})),
                    ]
                    .into(),
                ))
            })
            .sync("file", |ctx| {
                let splat = ctx.param("splat").unwrap_or_default().to_string();
                Ok(Some(View::new("file", json!({"splat": splat})).into()))
            });

        let posts = HandlerGroup::new()
            .sync("show", |ctx| {
                let slug = ctx.param("slug").unwrap_or_default().to_string();
                ctx.set_local("flash", json!("welcome back"));
                Ok(Some(View::new("post", json!({"slug": slug})).into()))
            })
            .sync("create", |_| Ok(Some(View::new("test", json!({"bar": "created"})).into())));

        let remote = HandlerGroup::new()
            .async_action("ok", |input, done| {
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(10));
                    let user = input.data["session"]["user"].clone();
                    done.done(Ok(Some(View::new("test", json!({"bar": user})).into())));
                });
            })
            .async_action("fail", |_, done| {
                std::thread::spawn(move || {
                    done.done(Err(DispatchError::with_status(502, "upstream unavailable")));
                });
            })
            .async_action("panic", |_, done| {
                std::thread::spawn(move || {
                    let _owned = done;
                    panic!("continuation blew up");
                });
            });

        let mut registry = HandlerRegistry::new();
        registry.register("home", home);
        registry.register("posts", posts);
        registry.register("remote", remote);
        registry
    }

    /// Session task reading the `sid` cookie
    pub fn session_scheduler() -> Scheduler {
        let mut scheduler = Scheduler::new();
        scheduler
            .add_task("session", &[], |ctx| {
                let user = ctx.request.cookie("sid").unwrap_or("anonymous");
                Ok(json!({ "user": user }))
            })
            .expect("task registers");
        scheduler
    }

    pub fn dispatcher_with(scheduler: Scheduler, options: DispatcherOptions) -> Dispatcher {
        super::test_server::setup_may_runtime();
        Dispatcher::new(
            routes(),
            scheduler,
            handlers(),
            Renderer::new(templates(), renderer_config()),
            options,
        )
        .expect("fixture dispatcher builds")
    }

    pub fn dispatcher() -> Dispatcher {
        dispatcher_with(session_scheduler(), DispatcherOptions::default())
    }
}
