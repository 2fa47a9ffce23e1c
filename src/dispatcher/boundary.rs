use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, warn};

use crate::context::RequestContext;
use crate::error::{DispatchError, DispatchResult, ErrorPayload};
use crate::renderer::{write_rendered, Rendered, Renderer};
use crate::server::{ResponseSink, CONTENT_TYPE_JSON};
use crate::view::View;

/// Body sent when producing the real error response fails too
pub const FALLBACK_BODY: &str = r#"{"code":500,"message":"Internal Server Error"}"#;

/// Turn `err` into a response and return the status that was sent
pub(crate) fn handle_error(
    renderer: &Renderer,
    ctx: &RequestContext,
    res: &mut dyn ResponseSink,
    err: &DispatchError,
) -> u16 {
    let status = err.status();
    if err.is_not_found() {
        warn!(
            request_id = %ctx.info.request_id,
            method = %ctx.info.method,
            path = %ctx.info.path,
            error = %err,
            "Route not found"
        );
    } else {
        error!(
            request_id = %ctx.info.request_id,
            method = %ctx.info.method,
            path = %ctx.info.path,
            status = status,
            error = %err,
            trace = err.trace().unwrap_or_default(),
            "Request failed"
        );
    }

    if res.is_committed() {
        error!(
            request_id = %ctx.info.request_id,
            status = status,
            "Response body already sent - ending it without an error body"
        );
        end_committed(ctx, res);
        return status;
    }

    let payload = ErrorPayload::from_error(err, &ctx.info.url);
    let outcome = match catch_unwind(AssertUnwindSafe(|| {
        write_error_response(renderer, ctx, res, status, &payload)
    })) {
        Ok(outcome) => outcome,
        Err(panic) => Err(DispatchError::from_panic("error response", panic.as_ref())),
    };

    match outcome {
        Ok(()) => status,
        Err(second) => {
            error!(
                request_id = %ctx.info.request_id,
                original_error = %err,
                error = %second,
                "Error response failed - sending fallback"
            );
            write_fallback(ctx, res);
            500
        }
    }
}

/// JSON payload in JSON mode; `<status>` or `error` template in HTML mode,
/// with the payload as JSON when neither exists
fn write_error_response(
    renderer: &Renderer,
    ctx: &RequestContext,
    res: &mut dyn ResponseSink,
    status: u16,
    payload: &ErrorPayload,
) -> DispatchResult<()> {
    if res.is_finished() {
        return Err(DispatchError::handler("response already finished"));
    }

    let data = serde_json::to_value(payload)
        .map_err(|e| DispatchError::render(format!("error payload serialization failed: {e}")))?;

    let rendered = match renderer.error_template(status).filter(|_| !ctx.is_ajax()) {
        Some(template) => {
            let mut views = [View::new(template, data)];
            renderer.merge_context(&mut views, ctx);
            Rendered::Html(vec![renderer.render_view(&views[0])?])
        }
        None => Rendered::Json(data),
    };

    res.set_status(status);
    write_rendered(res, rendered)
}

/// Close a response whose body is partly or fully written
fn end_committed(ctx: &RequestContext, res: &mut dyn ResponseSink) {
    if res.is_finished() {
        return;
    }
    if let Err(e) = res.end() {
        error!(
            request_id = %ctx.info.request_id,
            error = %e,
            "Ending committed response failed"
        );
    }
}

fn write_fallback(ctx: &RequestContext, res: &mut dyn ResponseSink) {
    if res.is_committed() {
        end_committed(ctx, res);
        return;
    }
    if res.is_finished() {
        return;
    }
    res.set_status(500);
    res.set_header("Content-Type", CONTENT_TYPE_JSON);
    let result = res.write(FALLBACK_BODY.as_bytes()).and_then(|()| res.end());
    if let Err(e) = result {
        error!(
            request_id = %ctx.info.request_id,
            error = %e,
            "Fallback response failed"
        );
        // The transport must still see the end of the response
        res.end().ok();
    }
}

