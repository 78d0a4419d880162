//! Outer request pipeline: correlation ids, tracing, and the single place
//! where server faults become a problem document.

use std::any::Any;

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use serde::Serialize;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use crate::{config::Environment, error::Fault};

pub const CORRELATION_ID: &str = "x-correlation-id";
const PROBLEM_JSON: &str = "application/problem+json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Problem {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'static str,
    status: u16,
    detail: &'static str,
    correlation_id: Option<String>,
    exception: Option<ProblemException>,
}

#[derive(Debug, Serialize)]
struct ProblemException {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Wraps `router` with panic capture, fault rendering, request tracing and
/// correlation id handling (outermost last).
pub fn apply_standard_layers(router: Router, environment: Environment) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            let correlation_id = request
                .headers()
                .get(CORRELATION_ID)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                correlation_id = %correlation_id
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let correlation_header = HeaderName::from_static(CORRELATION_ID);

    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(environment, render_faults))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(correlation_header.clone()))
        .layer(SetRequestIdLayer::new(correlation_header, MakeRequestUuid))
}

/// Turns a panic inside the pipeline into a 500 carrying a [`Fault`].
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!(panic = %message, "request handler panicked");

    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(Fault {
        kind: "Panic",
        message,
    });
    response
}

async fn render_faults(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let response = next.run(request).await;
    if response.status() != StatusCode::INTERNAL_SERVER_ERROR {
        return response;
    }

    let exception = response
        .extensions()
        .get::<Fault>()
        .filter(|_| environment.exposes_fault_detail())
        .map(|fault| ProblemException {
            message: fault.message.clone(),
            kind: fault.kind,
        });

    let problem = Problem {
        kind: "https://httpstatuses.com/500",
        title: "Unexpected error",
        status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        detail: "An unexpected error occurred.",
        correlation_id,
        exception,
    };
    let body = serde_json::to_vec(&problem).unwrap_or_default();
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
    response
}
