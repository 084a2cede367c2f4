use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use muxstream_session::PayloadReport;
use serde::Serialize;

const PREVIEW_BYTES: usize = 32;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PayloadOutput<'a> {
    identifier: &'a str,
    payload_type: u8,
    origin_timestamp: u64,
    latency_ms: u64,
    payload_size: usize,
    payload: String,
    received_at: String,
}

pub fn print_payload(report: &PayloadReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PayloadOutput {
                identifier: report.identifier.as_str(),
                payload_type: report.payload_type,
                origin_timestamp: report.origin_timestamp,
                latency_ms: report.latency_ms,
                payload_size: report.payload.len(),
                payload: as_hex_stream(report.payload.as_ref()),
                received_at: now_unix_millis(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["IDENTIFIER", "TYPE", "SIZE", "LATENCY", "PAYLOAD"])
                .add_row(vec![
                    report.identifier.to_string(),
                    format!("0x{:02X}", report.payload_type),
                    report.payload.len().to_string(),
                    format!("{} ms", report.latency_ms),
                    preview(report.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "identifier={} type=0x{:02X} size={} latency={}ms payload={}",
                report.identifier,
                report.payload_type,
                report.payload.len(),
                report.latency_ms,
                preview(report.payload.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(report.payload.as_ref());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// `0x`-prefixed upper-case hex of the whole payload.
pub fn as_hex_stream(data: &[u8]) -> String {
    let mut out = String::with_capacity(2 + data.len() * 2);
    out.push_str("0x");
    for byte in data {
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

fn preview(data: &[u8]) -> String {
    if data.len() <= PREVIEW_BYTES {
        return as_hex_stream(data);
    }
    format!(
        "{}… ({} bytes)",
        as_hex_stream(&data[..PREVIEW_BYTES]),
        data.len()
    )
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
