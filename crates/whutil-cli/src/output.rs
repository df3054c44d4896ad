use serde_json::Value;
use whutil_core::Envelope;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Ndjson => {
            let payload = serde_json::to_string(envelope)?;
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(envelope)?),
    }

    Ok(())
}

fn render_table(envelope: &Envelope<Value>) -> Result<String, CliError> {
    let mut out = String::new();
    out.push_str(&format!("request_id  : {}\n", envelope.meta.request_id));
    if let Some(trace_id) = &envelope.meta.trace_id {
        out.push_str(&format!("trace_id    : {trace_id}\n"));
    }
    out.push_str(&format!("schema      : {}\n", envelope.meta.schema_version));
    out.push_str(&format!("generated_at: {}\n", envelope.meta.generated_at));
    out.push_str(&format!("source      : {}\n", envelope.meta.source));
    out.push_str(&format!("latency_ms  : {}\n", envelope.meta.latency_ms));

    if !envelope.meta.warnings.is_empty() {
        out.push_str("warnings:\n");
        for warning in &envelope.meta.warnings {
            out.push_str(&format!("  - {warning}\n"));
        }
    }

    match envelope.data.get("summaries").and_then(Value::as_array) {
        Some(summaries) => {
            out.push_str("summaries:\n");
            out.push_str(&summary_table(summaries));
            if let Some(totals) = envelope.data.get("totals") {
                out.push_str("totals:\n");
                for line in serde_json::to_string_pretty(totals)?.lines() {
                    out.push_str(&format!("  {line}\n"));
                }
            }
        }
        None if envelope.data.is_null() => {}
        None => {
            out.push_str("data:\n");
            for line in serde_json::to_string_pretty(&envelope.data)?.lines() {
                out.push_str(&format!("  {line}\n"));
            }
        }
    }

    if !envelope.errors.is_empty() {
        out.push_str("errors:\n");
        for error in &envelope.errors {
            out.push_str(&format!("  - {}: {}\n", error.code, error.message));
        }
    }

    Ok(out)
}

const SUMMARY_COLUMNS: [&str; 6] = [
    "warehouse_name",
    "warehouse_size",
    "num_queries",
    "expected_credits",
    "actual_credits",
    "utilization",
];

fn summary_table(summaries: &[Value]) -> String {
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|summary| {
            SUMMARY_COLUMNS
                .iter()
                .map(|column| format_cell(summary.get(*column)))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = SUMMARY_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, header)| {
            rows.iter()
                .map(|row| row[index].len())
                .chain(std::iter::once(header.len()))
                .max()
                .unwrap_or(header.len())
        })
        .collect();

    let mut out = String::new();
    let header = SUMMARY_COLUMNS
        .iter()
        .zip(&widths)
        .map(|(name, width)| format!("{name:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(&format!("  {}\n", header.trim_end()));
    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(&format!("  {}\n", line.trim_end()));
    }
    out
}

fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::from("-"),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => match number.as_f64() {
            Some(float) if number.is_f64() => format!("{float:.4}"),
            _ => number.to_string(),
        },
        Some(other) => other.to_string(),
    }
}
