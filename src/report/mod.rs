//! Textual reports generated from a completed scan.
//!
//! Content is plain text split into sections by `#` heading lines; the report
//! detail view renders each section separately through [`sections`].

use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analytics::{self, NetworkStats};
use crate::error::{Result, StoreError};
use crate::model::{ExportFormat, NewReport, ScanDetail, ScanStatus};

/// What the user asked for in the report form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub name: String,
    pub report_type: String,
    pub notes: Option<String>,
    pub export_format: Option<ExportFormat>,
}

/// One heading and the text under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
}

/// Builds a storable report from the snapshot of a completed scan.
///
/// # Errors
///
/// Returns `StoreError::Validation` if the scan is not complete or the report
/// has no name.
pub fn build(
    detail: &ScanDetail, request: ReportRequest, generated_at: DateTime<Utc>,
) -> Result<NewReport> {
    if detail.scan.status != ScanStatus::Complete {
        return Err(StoreError::validation(
            "scan",
            format!("scan {} is not complete", detail.id()),
        )
        .into());
    }

    let content = render(detail, &request, generated_at)?;
    let export_data = request.export_format.map(|format| export_payload(detail, format));

    let new_report = NewReport {
        scan_id: detail.id(),
        scan_name: detail.scan.name.clone(),
        name: request.name,
        report_type: request.report_type,
        content,
        export_data,
        export_format: request.export_format,
    };
    new_report.validate()?;
    Ok(new_report)
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("Unknown")
}

/// Renders the report text.
pub fn render(
    detail: &ScanDetail, request: &ReportRequest, generated_at: DateTime<Utc>,
) -> Result<String> {
    let mut out = String::new();
    write_report(&mut out, detail, request, generated_at)?;
    Ok(out)
}

fn write_report(
    out: &mut String, detail: &ScanDetail, request: &ReportRequest,
    generated_at: DateTime<Utc>,
) -> fmt::Result {
    let scan = &detail.scan;

    writeln!(out, "# Report: {}", request.name)?;
    writeln!(out, "Date: {}", generated_at.format("%Y-%m-%d %H:%M UTC"))?;
    writeln!(out, "Type: {}", request.report_type)?;
    writeln!(out, "Analysis: {}", scan.name)?;
    out.push('\n');

    writeln!(out, "## Analysis details")?;
    writeln!(out, "Location: {}", scan.location)?;
    writeln!(out, "Scanned: {}", scan.created_at.format("%Y-%m-%d %H:%M UTC"))?;
    if let Some(description) = &scan.description {
        writeln!(out, "Description: {}", description)?;
    }
    if let Some(environment) = &scan.environment {
        writeln!(out, "Environment: {}", environment)?;
    }
    out.push('\n');

    writeln!(out, "## Networks detected ({})", detail.networks.len())?;
    for network in &detail.networks {
        let ssid = if network.hidden && network.ssid.is_empty() {
            "<hidden>"
        } else {
            network.ssid.as_str()
        };
        writeln!(out, "- SSID: {} ({})", ssid, network.bssid)?;
        writeln!(out, "  - Channel: {} ({})", network.channel, network.band)?;
        writeln!(
            out,
            "  - Signal: {:.0} dBm ({:.0}%, {})",
            network.signal.dbm(),
            network.signal.percent(),
            network.signal.quality().label()
        )?;
        writeln!(out, "  - Security: {}", or_unknown(network.security.as_deref()))?;
        writeln!(out, "  - Vendor: {}", or_unknown(network.vendor.as_deref()))?;
    }
    out.push('\n');

    writeln!(out, "## Issues detected ({})", detail.issues.len())?;
    for issue in &detail.issues {
        writeln!(out, "- {}", issue.title)?;
        writeln!(out, "  - Type: {}", issue.category.as_str())?;
        writeln!(out, "  - Severity: {}", issue.severity.as_str())?;
        if !issue.description.is_empty() {
            writeln!(out, "  - Description: {}", issue.description)?;
        }
        if let Some(recommendation) = &issue.recommendation {
            writeln!(out, "  - Recommendation: {}", recommendation)?;
        }
        if issue.resolved {
            writeln!(out, "  - Resolved")?;
        }
    }
    out.push('\n');

    if let Some(stats) = analytics::network_stats(&detail.networks) {
        write_stats(out, &stats)?;
        out.push('\n');
    }

    writeln!(out, "## Additional notes")?;
    match request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => writeln!(out, "{}", notes),
        None => writeln!(out, "No additional notes."),
    }
}

fn write_stats(out: &mut String, stats: &NetworkStats) -> fmt::Result {
    writeln!(out, "## Network statistics")?;
    writeln!(out, "Average signal: {:.1} dBm", stats.avg_signal_dbm)?;
    writeln!(out, "Strongest signal: {:.0} dBm", stats.strongest_signal_dbm)?;
    writeln!(out, "Weakest signal: {:.0} dBm", stats.weakest_signal_dbm)?;
    writeln!(out, "Hidden networks: {}", stats.hidden_networks)?;

    let channels: Vec<String> = stats
        .channel_distribution
        .iter()
        .map(|(channel, count)| format!("{}: {}", channel, count))
        .collect();
    writeln!(out, "Channels: {}", channels.join(", "))?;

    let security: Vec<String> = stats
        .security_types
        .iter()
        .map(|(kind, count)| format!("{}: {}", kind, count))
        .collect();
    writeln!(out, "Security: {}", security.join(", "))
}

fn heading(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = trimmed.trim_start_matches('#');
    if rest.len() == trimmed.len() || !rest.starts_with(' ') {
        return None;
    }
    Some(rest.trim())
}

/// Splits report content into sections at heading lines (`# `, `## `, ...).
/// Text before the first heading is dropped.
pub fn sections(content: &str) -> Vec<ReportSection> {
    let mut sections: Vec<ReportSection> = Vec::new();

    for line in content.lines() {
        if let Some(title) = heading(line) {
            sections.push(ReportSection { title: title.to_string(), body: String::new() });
            continue;
        }
        if let Some(current) = sections.last_mut() {
            if !current.body.is_empty() {
                current.body.push('\n');
            }
            current.body.push_str(line.trim());
        }
    }

    for section in &mut sections {
        section.body = section.body.trim().to_string();
    }
    sections
}

/// Structured payload stored with the report for later export.
///
/// PDF output is produced elsewhere from this same payload.
pub fn export_payload(detail: &ScanDetail, format: ExportFormat) -> serde_json::Value {
    let stats = analytics::network_stats(&detail.networks);
    let signal_quality: Vec<serde_json::Value> =
        analytics::signal_quality_buckets(&detail.networks)
            .iter()
            .map(|(quality, count)| json!({ "band": quality, "count": count }))
            .collect();

    json!({
        "format": format,
        "scan": detail.scan,
        "stats": stats,
        "signal_quality": signal_quality,
        "networks": detail.networks,
        "issues": detail.issues,
    })
}
