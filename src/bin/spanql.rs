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

//! Spanql CLI - inspect queries and run them against JSON span files

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};

use spanql::core::{hex_encode, Attribute, AttributeScope, Intrinsic, Spanset, Static};
use spanql::executor::{Engine, ExecutionContext};
use spanql::storage::{extract_fetch_spans_request, InMemoryFetcher, InMemorySpan};

/// Git commit embedded at build time
const GIT_COMMIT: Option<&str> = option_env!("SPANQL_GIT_COMMIT");

/// Spanql trace query CLI
#[derive(ClapParser, Debug)]
#[command(name = "spanql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parse trace queries and run them against JSON span files")]
#[command(long_about = "Parse trace queries, inspect the storage conditions they imply, and \
evaluate them against spansets loaded from a JSON file.\n\n\
SPAN FILE FORMAT:\n\
  [{\"traceID\": \"0102\", \"rootServiceName\": \"api\",\n\
    \"spans\": [{\"id\": \"01\", \"durationNanos\": 100,\n\
                \"attributes\": {\"span.foo\": \"bar\", \"duration\": \"100ms\"}}]}]\n\n\
Attribute keys use \"span.\" / \"resource.\" prefixes for scoped attributes,\n\
bare intrinsic names (duration, name, status, kind, ...) for intrinsics, and\n\
anything else for unscoped attributes. String values that read as durations\n\
(\"100ms\", \"1.5s\") become duration values.")]
struct Args {
    /// Query to parse or run
    query: String,

    /// JSON file of spansets to evaluate the query against
    #[arg(short, long)]
    spans: Option<PathBuf>,

    /// Print the parsed pipeline and exit
    #[arg(long)]
    ast: bool,

    /// Print the derived storage conditions and exit
    #[arg(long)]
    conditions: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("spanql: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let pipeline = spanql::parse(&args.query).map_err(|e| e.to_string())?;

    if args.ast {
        println!("{}", pipeline);
        return Ok(());
    }

    if args.conditions || args.spans.is_none() {
        print_conditions(&args.query)?;
        if args.spans.is_none() {
            return Ok(());
        }
    }

    let Some(path) = &args.spans else {
        return Ok(());
    };
    let spansets = load_spansets(path)?;
    let fetcher = InMemoryFetcher::new(spansets);
    let ctx = ExecutionContext::new();
    let response = Engine::new()
        .execute(&ctx, &args.query, &fetcher)
        .map_err(|e| e.to_string())?;

    print_results(&response.spansets);
    if let Some(commit) = GIT_COMMIT {
        eprintln!(
            "{} spanset(s), {} bytes read ({})",
            response.spansets.len(),
            response.bytes_read,
            &commit[..commit.len().min(12)]
        );
    } else {
        eprintln!(
            "{} spanset(s), {} bytes read",
            response.spansets.len(),
            response.bytes_read
        );
    }
    Ok(())
}

fn print_conditions(query: &str) -> Result<(), String> {
    let request = extract_fetch_spans_request(query).map_err(|e| e.to_string())?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["attribute", "op", "operands"]);
    for condition in &request.conditions {
        let operands: Vec<String> = condition.operands.iter().map(|o| o.to_string()).collect();
        table.add_row(vec![
            Cell::new(condition.attribute.to_string()),
            Cell::new(condition.op.to_string()),
            Cell::new(operands.join(", ")),
        ]);
    }
    println!("{}", table);
    println!("all_conditions: {}", request.all_conditions);
    Ok(())
}

fn print_results(spansets: &[Spanset]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["trace", "spans", "scalar", "attributes"]);
    for spanset in spansets {
        let spans: Vec<String> = spanset
            .spans
            .iter()
            .map(|s| hex_encode(s.id()))
            .collect();
        let mut attributes: Vec<String> = spanset
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        attributes.sort();
        table.add_row(vec![
            Cell::new(hex_encode(&spanset.trace_id)),
            Cell::new(spans.join(", ")),
            Cell::new(spanset.scalar.to_string()),
            Cell::new(attributes.join(", ")),
        ]);
    }
    println!("{}", table);
}

// =============================================================================
// JSON loading
// =============================================================================

fn load_spansets(path: &PathBuf) -> Result<Vec<Spanset>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let root: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("invalid JSON: {}", e))?;
    let serde_json::Value::Array(entries) = root else {
        return Err("span file must be a JSON array of spansets".to_string());
    };
    entries.iter().map(parse_spanset).collect()
}

fn parse_spanset(value: &serde_json::Value) -> Result<Spanset, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "spanset must be an object".to_string())?;

    let mut spanset = Spanset {
        trace_id: object
            .get("traceID")
            .and_then(|v| v.as_str())
            .map(hex_decode)
            .transpose()?
            .unwrap_or_default(),
        root_span_name: string_field(object, "rootSpanName"),
        root_service_name: string_field(object, "rootServiceName"),
        start_time_unix_nanos: u64_field(object, "startTimeUnixNanos"),
        duration_nanos: u64_field(object, "durationNanos"),
        ..Default::default()
    };

    if let Some(serde_json::Value::Array(spans)) = object.get("spans") {
        for span in spans {
            spanset.spans.push(parse_span(span)?);
        }
    }
    Ok(spanset)
}

fn parse_span(value: &serde_json::Value) -> Result<spanql::core::SpanRef, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "span must be an object".to_string())?;

    let id = object
        .get("id")
        .and_then(|v| v.as_str())
        .map(hex_decode)
        .transpose()?
        .unwrap_or_default();

    let mut span = InMemorySpan::new(id)
        .with_start_time(u64_field(object, "startTimeUnixNanos"))
        .with_duration(u64_field(object, "durationNanos"));

    if let Some(serde_json::Value::Object(attributes)) = object.get("attributes") {
        for (key, value) in attributes {
            span = span.with_attribute(parse_attribute_key(key), parse_attribute_value(value)?);
        }
    }
    Ok(span.build())
}

fn parse_attribute_key(key: &str) -> Attribute {
    if let Some(name) = key.strip_prefix("span.") {
        return Attribute::scoped(AttributeScope::Span, name);
    }
    if let Some(name) = key.strip_prefix("resource.") {
        return Attribute::scoped(AttributeScope::Resource, name);
    }
    if let Some(name) = key.strip_prefix('.') {
        return Attribute::new(name);
    }
    if let Some(intrinsic) = Intrinsic::from_str(key) {
        return Attribute::intrinsic(intrinsic);
    }
    Attribute::new(key)
}

fn parse_attribute_value(value: &serde_json::Value) -> Result<Static, String> {
    match value {
        serde_json::Value::Bool(b) => Ok(Static::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Static::Int(i))
            } else {
                Ok(Static::Float(n.as_f64().unwrap_or(f64::NAN)))
            }
        }
        serde_json::Value::String(s) => {
            // duration-shaped strings become durations
            if s.starts_with(|c: char| c.is_ascii_digit()) {
                if let Some(nanos) = spanql::core::parse_duration(s) {
                    return Ok(Static::Duration(nanos));
                }
            }
            Ok(Static::string(s.clone()))
        }
        other => Err(format!("unsupported attribute value: {}", other)),
    }
}

fn string_field(object: &serde_json::Map<String, serde_json::Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn u64_field(object: &serde_json::Map<String, serde_json::Value>, key: &str) -> u64 {
    object.get(key).and_then(|v| v.as_u64()).unwrap_or_default()
}

fn hex_decode(text: &str) -> Result<Vec<u8>, String> {
    if text.len() % 2 != 0 {
        return Err(format!("invalid hex id '{}'", text));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| format!("invalid hex id '{}'", text))
        })
        .collect()
}
