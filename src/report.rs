//! Human and JSON renderings of a probe report

use crate::error::Result;
use crate::plugin::bundle;
use crate::plugin::probe::{EntrySource, ProbeReport, StepStatus};
use std::fmt::Write;

fn mark(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Passed => "✓",
        StepStatus::Failed => "✗",
        StepStatus::Skipped => "-",
    }
}

/// Render a report the way it reads on a terminal
pub fn render_text(report: &ProbeReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_text(&mut out, report);
    out
}

fn write_text(out: &mut String, report: &ProbeReport) -> std::fmt::Result {
    writeln!(out, "Testing CLAP plugin: {}", report.plugin_path.display())?;
    if let Some(binary) = &report.binary_path {
        if binary != &report.plugin_path {
            writeln!(out, "Binary: {}", binary.display())?;
        }
    }
    writeln!(out)?;

    for record in &report.steps {
        write!(out, "{} {}", mark(record.status), record.step.label())?;
        if let Some(message) = &record.message {
            write!(out, ": {}", message)?;
        }
        writeln!(out)?;
    }

    if let Some(entry) = &report.entry {
        writeln!(out)?;
        let source = match report.entry_source {
            Some(EntrySource::AccessorFunction) => "get_clap_entry()",
            _ => "clap_entry",
        };
        writeln!(out, "Entry ({}):", source)?;
        writeln!(out, "  CLAP version: {}", entry.clap_version)?;
        for (slot, address) in [
            ("init", &entry.init),
            ("deinit", &entry.deinit),
            ("get_factory", &entry.get_factory),
        ] {
            writeln!(out, "  {}: {}", slot, address.as_deref().unwrap_or("(null)"))?;
        }
    }

    if !report.descriptors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Plugins ({}):", report.descriptors.len())?;
        for desc in &report.descriptors {
            write!(
                out,
                "  [{}] {} ({}) by {} v{}",
                desc.index, desc.name, desc.id, desc.vendor, desc.version
            )?;
            if !desc.features.is_empty() {
                write!(out, " [{}]", desc.features.join(", "))?;
            }
            writeln!(out)?;
        }
    }

    if !report.bundle.is_empty() {
        writeln!(out)?;
        writeln!(out, "Bundle structure:")?;
        out.push_str(&bundle::render_tree(&report.bundle));
    }

    writeln!(out)?;
    match &report.error {
        None => writeln!(out, "✓ All checks passed ({} ms)", report.duration_ms)?,
        Some(error) => writeln!(out, "✗ Probe failed: {}", error)?,
    }
    Ok(())
}

/// Render a report as pretty-printed JSON
pub fn render_json(report: &ProbeReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
