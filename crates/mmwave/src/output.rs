use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mmwave_frame::Frame;
use mmwave_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct FrameOutput<'a> {
    #[serde(flatten)]
    frame: &'a Frame,
    #[serde(skip_serializing_if = "Option::is_none")]
    freq_hz: Option<f64>,
}

pub fn print_frame(frame: &Frame, freq_hz: Option<f64>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput { frame, freq_hz };
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
                .set_header(vec![
                    "FRAME", "SUBFRAME", "DYNAMIC", "STATIC", "TRACKED", "FREQ",
                ])
                .add_row(vec![
                    frame.header.frame_number.to_string(),
                    frame.header.subframe_number.to_string(),
                    frame.dynamic_points.len().to_string(),
                    frame.static_points.len().to_string(),
                    frame.tracked_objects.len().to_string(),
                    format_freq(freq_hz),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} subframe={} dynamic={} static={} tracked={} freq={}",
                frame.header.frame_number,
                frame.header.subframe_number,
                frame.dynamic_points.len(),
                frame.static_points.len(),
                frame.tracked_objects.len(),
                format_freq(freq_hz)
            );
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: &port.kind,
                    product: port.product.as_deref(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE", "PRODUCT"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.clone(),
                    port.product.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                match &port.product {
                    Some(product) => println!("{} ({}, {product})", port.name, port.kind),
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
    }
}

fn format_freq(freq_hz: Option<f64>) -> String {
    match freq_hz {
        Some(freq) => format!("{freq:.2}Hz"),
        None => "-".to_string(),
    }
}
