// Copyright 2025 Spanql Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine tests: query execution against the storage contract

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spanql::core::{Attribute, Error, SpanRef, Spanset, Static};
use spanql::executor::{Engine, ExecutionContext};
use spanql::storage::{
    search_meta_conditions, FetcherFn, FetchSpansRequest, FetchSpansResponse, InMemoryFetcher,
    InMemorySpan, SpansetFetcher, SpansetIterator,
};

fn span(id: u8, foo: &str) -> SpanRef {
    InMemorySpan::new(vec![id])
        .with_attribute(Attribute::new("foo"), Static::string(foo))
        .build()
}

fn fixture() -> Vec<Spanset> {
    vec![
        Spanset {
            trace_id: vec![1],
            spans: vec![span(1, "a"), span(2, "b")],
            ..Default::default()
        },
        Spanset {
            trace_id: vec![2],
            spans: vec![span(3, "a"), span(4, "a")],
            ..Default::default()
        },
    ]
}

#[test]
fn test_execute_filters_spans() {
    let fetcher = InMemoryFetcher::new(fixture());
    let response = Engine::new()
        .execute(&ExecutionContext::new(), r#"{ .foo = "a" }"#, &fetcher)
        .unwrap();

    assert_eq!(response.spansets.len(), 2);
    assert_eq!(response.spansets[0].spans.len(), 1);
    assert_eq!(response.spansets[1].spans.len(), 2);
    assert!(response.bytes_read > 0);
}

#[test]
fn test_execute_full_pipeline() {
    let fetcher = InMemoryFetcher::new(fixture());
    let response = Engine::new()
        .execute(
            &ExecutionContext::new(),
            r#"{ .foo = "a" } | count() > 1"#,
            &fetcher,
        )
        .unwrap();

    assert_eq!(response.spansets.len(), 1);
    assert_eq!(response.spansets[0].trace_id, vec![2]);
    assert_eq!(response.spansets[0].scalar, Static::Int(2));
    assert_eq!(
        response.spansets[0].attributes.get("count()"),
        Some(&Static::Int(2))
    );
}

#[test]
fn test_execute_drops_non_matching_traces() {
    let fetcher = InMemoryFetcher::new(fixture());
    let response = Engine::new()
        .execute(&ExecutionContext::new(), r#"{ .foo = "zzz" }"#, &fetcher)
        .unwrap();
    assert!(response.spansets.is_empty());
}

#[test]
fn test_parse_error_surfaces() {
    let fetcher = InMemoryFetcher::new(fixture());
    let err = Engine::new()
        .execute(&ExecutionContext::new(), "{ .foo = ", &fetcher)
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_request_carries_conditions_and_second_pass() {
    // capture the request the engine hands to storage
    let seen: Arc<Mutex<Option<FetchSpansRequest>>> = Arc::new(Mutex::new(None));
    let seen_inner = seen.clone();

    struct Empty;
    impl SpansetIterator for Empty {
        fn next(&mut self, _ctx: &ExecutionContext) -> spanql::Result<Option<Spanset>> {
            Ok(None)
        }
    }

    let fetcher = FetcherFn(
        move |_: &ExecutionContext, request: FetchSpansRequest| -> spanql::Result<FetchSpansResponse> {
            *seen_inner.lock().unwrap() = Some(request);
            Ok(FetchSpansResponse {
                results: Box::new(Empty),
                bytes_read: Box::new(|| 0),
            })
        },
    );

    Engine::new()
        .execute(
            &ExecutionContext::new(),
            r#"{ .foo = "bar" && .baz > 2 }"#,
            &fetcher,
        )
        .unwrap();

    let request = seen.lock().unwrap().take().unwrap();
    assert!(request.all_conditions);
    assert_eq!(request.conditions.len(), 2);
    assert_eq!(request.second_pass_conditions, search_meta_conditions());

    // the installed second pass evaluates the pipeline
    let second_pass = request.second_pass.expect("second pass installed");
    let matching = Spanset {
        spans: vec![InMemorySpan::new(vec![9])
            .with_attribute(Attribute::new("foo"), Static::string("bar"))
            .with_attribute(Attribute::new("baz"), Static::Int(3))
            .build()],
        ..Default::default()
    };
    assert_eq!(second_pass(&matching).unwrap().len(), 1);

    let non_matching = Spanset {
        spans: vec![span(9, "nope")],
        ..Default::default()
    };
    assert!(second_pass(&non_matching).unwrap().is_empty());
}

#[test]
fn test_storage_error_propagates() {
    let fetcher = FetcherFn(
        |_: &ExecutionContext, _: FetchSpansRequest| -> spanql::Result<FetchSpansResponse> {
            Err(Error::storage(std::io::Error::new(
                std::io::ErrorKind::Other,
                "block store unavailable",
            )))
        },
    );
    let err = Engine::new()
        .execute(&ExecutionContext::new(), "{ true }", &fetcher)
        .unwrap_err();
    assert!(err.is_storage());
    assert!(err.to_string().contains("block store unavailable"));
}

#[test]
fn test_cancellation_stops_execution() {
    let fetcher = InMemoryFetcher::new(fixture());
    let ctx = ExecutionContext::new();
    ctx.cancel();
    let err = Engine::new()
        .execute(&ctx, "{ true }", &fetcher)
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn test_cancellation_mid_stream() {
    // cancel from the iterator after the first spanset is served
    struct OneThenHang {
        ctx_handle: spanql::CancellationHandle,
        served: AtomicUsize,
    }
    impl SpansetIterator for OneThenHang {
        fn next(&mut self, ctx: &ExecutionContext) -> spanql::Result<Option<Spanset>> {
            ctx.check_cancelled()?;
            if self.served.fetch_add(1, Ordering::Relaxed) == 0 {
                self.ctx_handle.cancel();
                return Ok(Some(Spanset::default()));
            }
            Ok(Some(Spanset::default()))
        }
    }

    let ctx = ExecutionContext::new();
    let handle = ctx.cancellation_handle();
    let fetcher = FetcherFn(
        move |_: &ExecutionContext, _: FetchSpansRequest| -> spanql::Result<FetchSpansResponse> {
            Ok(FetchSpansResponse {
                results: Box::new(OneThenHang {
                    ctx_handle: handle.clone(),
                    served: AtomicUsize::new(0),
                }),
                bytes_read: Box::new(|| 0),
            })
        },
    );

    let err = Engine::new().execute(&ctx, "{ true }", &fetcher).unwrap_err();
    assert!(err.is_cancelled());
}
