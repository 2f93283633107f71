//! Record rendering: JSON, flattened CSV, and a text summary.

use pokedata_core::{Field, Provenance, ReconciledRecord};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output (one flattened row)
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_record(record: &ReconciledRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

/// Field columns followed by classification, quality and warnings.
pub fn csv_header() -> Vec<String> {
    Field::ALL
        .iter()
        .map(|f| f.as_str().to_string())
        .chain(["classification", "quality_score", "warnings"].map(String::from))
        .collect()
}

pub fn csv_row(record: &ReconciledRecord) -> Vec<String> {
    Field::ALL
        .iter()
        .map(|f| record.value(*f).to_plain())
        .chain([
            record.classification().to_string(),
            format!("{:.3}", record.quality_score()),
            record.warning_codes().join(";"),
        ])
        .collect()
}

fn format_csv(record: &ReconciledRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(csv_header())?;
    wtr.write_record(csv_row(record))?;
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &ReconciledRecord) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Card: {} ({})\n",
        record.value(Field::Name).to_plain(),
        record.classification()
    ));
    output.push_str(&format!("Quality: {:.1}%\n\n", record.quality_score() * 100.0));

    let width = Field::ALL.iter().map(|f| f.as_str().len()).max().unwrap_or(0);
    for field in Field::ALL {
        let value = record.value(field).to_plain();
        if value.is_empty() {
            continue;
        }
        let source = match (record.provenance(field), record.confidence(field)) {
            (Provenance::Remote, Some(c)) => format!("remote {c:.2}"),
            (Provenance::Remote, None) => "remote".to_string(),
            (Provenance::Local, _) => "local".to_string(),
            (Provenance::Default, _) => "default".to_string(),
        };
        output.push_str(&format!(
            "  {:<width$}  {}  [{}]\n",
            field.as_str(),
            value,
            source
        ));
    }

    if !record.suggestions().is_empty() {
        output.push_str("\nSuggestions:\n");
        for (field, value) in record.suggestions() {
            output.push_str(&format!("  {}: {}\n", field, value.to_plain()));
        }
    }

    if !record.warnings().is_empty() {
        output.push_str("\nWarnings:\n");
        for code in record.warning_codes() {
            output.push_str(&format!("  - {}\n", code));
        }
    }

    output
}
