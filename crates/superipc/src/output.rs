use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use superipc_core::{AppError, Envelope};

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
#[serde(rename_all = "camelCase")]
struct EnvelopeOutput<'a> {
    stream: &'a str,
    #[serde(flatten)]
    envelope: &'a Envelope,
}

/// Print envelopes received on `stream`, in order.
pub fn print_envelopes(stream: &str, envelopes: &[Envelope], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for envelope in envelopes {
                let out = EnvelopeOutput { stream, envelope };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STREAM", "MODE", "CALL ID", "CONTENT", "ERROR"]);
            for envelope in envelopes {
                table.add_row(vec![
                    stream.to_string(),
                    envelope.result_mode.to_string(),
                    call_id_cell(envelope),
                    envelope.content.clone().unwrap_or_default(),
                    error_cell(envelope),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for envelope in envelopes {
                println!(
                    "stream={} mode={} call_id={} content={} error={}",
                    stream,
                    envelope.result_mode,
                    call_id_cell(envelope),
                    envelope.content.as_deref().unwrap_or("-"),
                    error_cell(envelope),
                );
            }
        }
    }
}

fn call_id_cell(envelope: &Envelope) -> String {
    envelope
        .call_id
        .map_or_else(|| "-".to_string(), |id| id.to_string())
}

/// Error message, or the raw text when it is not an error envelope.
fn error_cell(envelope: &Envelope) -> String {
    match envelope.error.as_deref() {
        None => "-".to_string(),
        Some(raw) => AppError::from_json(raw)
            .map(|err| err.chain().map(|e| e.message.as_str()).collect::<Vec<_>>().join(": "))
            .unwrap_or_else(|_| raw.to_string()),
    }
}
