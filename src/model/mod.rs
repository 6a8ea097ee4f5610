//! Normalized domain model shared by both record stores.
//!
//! Store-specific shapes (percent-based local records, Portuguese column
//! names of the remote tables) are converted to and from these types at the
//! storage boundary.

mod signal;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use signal::{SignalQuality, SignalStrength, MAX_DBM, MIN_DBM};

use crate::error::{Result, StoreError};

pub type ScanId = i64;
pub type NetworkId = i64;
pub type IssueId = i64;
pub type ReportId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    InProgress,
    Complete,
    Cancelled,
}

/// A single survey session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub kind: Option<String>,
    pub environment: Option<String>,
    pub size: Option<String>,
    pub scale: Option<f64>,
    pub floor_plan_ref: Option<String>,
    pub status: ScanStatus,
}

/// Frequency range of a channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Band {
    #[serde(rename = "2.4GHz")]
    Ghz2_4,
    #[serde(rename = "5GHz")]
    Ghz5,
}

impl Band {
    /// Band of a valid channel, `None` for channels outside both ranges.
    pub fn of_channel(channel: u16) -> Option<Band> {
        match channel {
            1..=14 => Some(Band::Ghz2_4),
            36..=165 => Some(Band::Ghz5),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Band::Ghz2_4 => "2.4GHz",
            Band::Ghz5 => "5GHz",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Centre frequency in MHz of a channel.
pub fn channel_frequency_mhz(channel: u16) -> Option<u32> {
    match Band::of_channel(channel)? {
        Band::Ghz2_4 if channel == 14 => Some(2484),
        Band::Ghz2_4 => Some(2407 + 5 * channel as u32),
        Band::Ghz5 => Some(5000 + 5 * channel as u32),
    }
}

/// An access point detected during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    pub scan_id: ScanId,
    pub ssid: String,
    pub bssid: String,
    pub channel: u16,
    pub frequency_mhz: u32,
    pub band: Band,
    pub signal: SignalStrength,
    pub security: Option<String>,
    pub encryption: Option<String>,
    pub vendor: Option<String>,
    pub max_speed_mbps: Option<f64>,
    pub clients_count: u32,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Interference,
    WeakSignal,
    ChannelCongestion,
    SecurityRisk,
    Coverage,
    Performance,
}

impl IssueCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCategory::Interference => "interference",
            IssueCategory::WeakSignal => "weak_signal",
            IssueCategory::ChannelCongestion => "channel_congestion",
            IssueCategory::SecurityRisk => "security_risk",
            IssueCategory::Coverage => "coverage",
            IssueCategory::Performance => "performance",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// A detected network problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub scan_id: ScanId,
    pub network_id: Option<NetworkId>,
    pub category: IssueCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendation: Option<String>,
    pub impact_score: Option<u8>,
    pub auto_detected: bool,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetric {
    pub id: i64,
    pub scan_id: ScanId,
    pub network_id: Option<NetworkId>,
    pub timestamp: DateTime<Utc>,
    pub throughput_down_mbps: Option<f64>,
    pub throughput_up_mbps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub noise_floor_dbm: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoveragePoint {
    pub id: i64,
    pub scan_id: ScanId,
    pub x: f64,
    pub y: f64,
    pub signal: SignalStrength,
    pub throughput_mbps: Option<f64>,
    pub networks_detected: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Pdf,
    Csv,
    Json,
}

/// A generated report. Reports are immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub scan_id: ScanId,
    pub scan_name: String,
    pub name: String,
    pub report_type: String,
    pub content: String,
    pub export_data: Option<serde_json::Value>,
    pub export_format: Option<ExportFormat>,
    pub created_at: DateTime<Utc>,
}

/// A scan joined with all of its child records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanDetail {
    pub scan: Scan,
    pub networks: Vec<Network>,
    pub issues: Vec<Issue>,
    pub performance_metrics: Vec<PerformanceMetric>,
    pub coverage_points: Vec<CoveragePoint>,
}

impl ScanDetail {
    pub fn new(scan: Scan) -> Self {
        ScanDetail {
            scan,
            networks: Vec::new(),
            issues: Vec::new(),
            performance_metrics: Vec::new(),
            coverage_points: Vec::new(),
        }
    }

    pub fn id(&self) -> ScanId {
        self.scan.id
    }
}

fn require_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(field, "must not be empty").into());
    }
    Ok(())
}

fn validate_channel(channel: u16) -> Result<()> {
    if Band::of_channel(channel).is_none() {
        return Err(StoreError::validation(
            "channel",
            format!("{} is neither a 2.4GHz nor a 5GHz channel", channel),
        )
        .into());
    }
    Ok(())
}

fn validate_signal(signal: SignalStrength) -> Result<()> {
    if !signal.is_within_range() {
        return Err(StoreError::validation(
            "signal",
            format!("{} outside {}..={} dBm", signal, MIN_DBM, MAX_DBM),
        )
        .into());
    }
    Ok(())
}

/// Form input for a new scan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewScan {
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub environment: Option<String>,
    pub size: Option<String>,
    pub scale: Option<f64>,
    pub floor_plan_ref: Option<String>,
    pub status: ScanStatus,
}

impl NewScan {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        NewScan { name: name.into(), location: location.into(), ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("location", &self.location)
    }

    pub fn into_scan(self, id: ScanId, created_at: DateTime<Utc>) -> Scan {
        Scan {
            id,
            name: self.name,
            location: self.location,
            description: self.description,
            created_at,
            kind: self.kind,
            environment: self.environment,
            size: self.size,
            scale: self.scale,
            floor_plan_ref: self.floor_plan_ref,
            status: self.status,
        }
    }
}

/// Shallow update of a scan; `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub environment: Option<String>,
    pub size: Option<String>,
    pub scale: Option<f64>,
    pub floor_plan_ref: Option<String>,
    pub status: Option<ScanStatus>,
}

impl ScanPatch {
    pub fn status(status: ScanStatus) -> Self {
        ScanPatch { status: Some(status), ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(location) = &self.location {
            require_text("location", location)?;
        }
        Ok(())
    }

    pub fn apply(self, scan: &mut Scan) {
        if let Some(name) = self.name {
            scan.name = name;
        }
        if let Some(location) = self.location {
            scan.location = location;
        }
        if let Some(description) = self.description {
            scan.description = Some(description);
        }
        if let Some(kind) = self.kind {
            scan.kind = Some(kind);
        }
        if let Some(environment) = self.environment {
            scan.environment = Some(environment);
        }
        if let Some(size) = self.size {
            scan.size = Some(size);
        }
        if let Some(scale) = self.scale {
            scan.scale = Some(scale);
        }
        if let Some(floor_plan_ref) = self.floor_plan_ref {
            scan.floor_plan_ref = Some(floor_plan_ref);
        }
        if let Some(status) = self.status {
            scan.status = status;
        }
    }
}

/// Input for a detected network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNetwork {
    pub ssid: String,
    pub bssid: String,
    pub channel: u16,
    pub signal: SignalStrength,
    pub security: Option<String>,
    pub encryption: Option<String>,
    pub vendor: Option<String>,
    pub max_speed_mbps: Option<f64>,
    pub clients_count: u32,
    pub hidden: bool,
}

impl NewNetwork {
    pub fn validate(&self) -> Result<()> {
        if !self.hidden {
            require_text("ssid", &self.ssid)?;
        }
        require_text("bssid", &self.bssid)?;
        validate_channel(self.channel)?;
        validate_signal(self.signal)
    }

    /// Builds the stored network. The input must have been validated.
    pub fn into_network(
        self, id: NetworkId, scan_id: ScanId, created_at: DateTime<Utc>,
    ) -> Result<Network> {
        let band = Band::of_channel(self.channel)
            .ok_or_else(|| StoreError::validation("channel", "out of range"))?;
        let frequency_mhz = channel_frequency_mhz(self.channel)
            .ok_or_else(|| StoreError::validation("channel", "out of range"))?;

        Ok(Network {
            id,
            scan_id,
            ssid: self.ssid,
            bssid: self.bssid,
            channel: self.channel,
            frequency_mhz,
            band,
            signal: self.signal,
            security: self.security,
            encryption: self.encryption,
            vendor: self.vendor,
            max_speed_mbps: self.max_speed_mbps,
            clients_count: self.clients_count,
            hidden: self.hidden,
            created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkPatch {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub channel: Option<u16>,
    pub signal: Option<SignalStrength>,
    pub security: Option<String>,
    pub encryption: Option<String>,
    pub vendor: Option<String>,
    pub max_speed_mbps: Option<f64>,
    pub clients_count: Option<u32>,
    pub hidden: Option<bool>,
}

impl NetworkPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(bssid) = &self.bssid {
            require_text("bssid", bssid)?;
        }
        if let Some(channel) = self.channel {
            validate_channel(channel)?;
        }
        if let Some(signal) = self.signal {
            validate_signal(signal)?;
        }
        Ok(())
    }

    /// Merges the patch. A channel change re-derives band and frequency.
    pub fn apply(self, network: &mut Network) {
        if let Some(ssid) = self.ssid {
            network.ssid = ssid;
        }
        if let Some(bssid) = self.bssid {
            network.bssid = bssid;
        }
        if let Some(channel) = self.channel {
            if let (Some(band), Some(frequency)) =
                (Band::of_channel(channel), channel_frequency_mhz(channel))
            {
                network.channel = channel;
                network.band = band;
                network.frequency_mhz = frequency;
            }
        }
        if let Some(signal) = self.signal {
            network.signal = signal;
        }
        if let Some(security) = self.security {
            network.security = Some(security);
        }
        if let Some(encryption) = self.encryption {
            network.encryption = Some(encryption);
        }
        if let Some(vendor) = self.vendor {
            network.vendor = Some(vendor);
        }
        if let Some(max_speed) = self.max_speed_mbps {
            network.max_speed_mbps = Some(max_speed);
        }
        if let Some(clients) = self.clients_count {
            network.clients_count = clients;
        }
        if let Some(hidden) = self.hidden {
            network.hidden = hidden;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIssue {
    pub network_id: Option<NetworkId>,
    pub category: IssueCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendation: Option<String>,
    pub impact_score: Option<u8>,
    pub auto_detected: bool,
}

fn validate_impact(score: Option<u8>) -> Result<()> {
    match score {
        Some(score) if !(1..=10).contains(&score) => Err(StoreError::validation(
            "impact_score",
            format!("{} outside 1..=10", score),
        )
        .into()),
        _ => Ok(()),
    }
}

impl NewIssue {
    pub fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        validate_impact(self.impact_score)
    }

    pub fn into_issue(
        self, id: IssueId, scan_id: ScanId, created_at: DateTime<Utc>,
    ) -> Issue {
        Issue {
            id,
            scan_id,
            network_id: self.network_id,
            category: self.category,
            severity: self.severity,
            title: self.title,
            description: self.description,
            recommendation: self.recommendation,
            impact_score: self.impact_score,
            auto_detected: self.auto_detected,
            resolved: false,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IssuePatch {
    pub category: Option<IssueCategory>,
    pub severity: Option<Severity>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub recommendation: Option<String>,
    pub impact_score: Option<u8>,
    pub resolved: Option<bool>,
}

impl IssuePatch {
    pub fn resolved() -> Self {
        IssuePatch { resolved: Some(true), ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        validate_impact(self.impact_score)
    }

    pub fn apply(self, issue: &mut Issue) {
        if let Some(category) = self.category {
            issue.category = category;
        }
        if let Some(severity) = self.severity {
            issue.severity = severity;
        }
        if let Some(title) = self.title {
            issue.title = title;
        }
        if let Some(description) = self.description {
            issue.description = description;
        }
        if let Some(recommendation) = self.recommendation {
            issue.recommendation = Some(recommendation);
        }
        if let Some(score) = self.impact_score {
            issue.impact_score = Some(score);
        }
        if let Some(resolved) = self.resolved {
            issue.resolved = resolved;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewPerformanceMetric {
    pub network_id: Option<NetworkId>,
    pub timestamp: Option<DateTime<Utc>>,
    pub throughput_down_mbps: Option<f64>,
    pub throughput_up_mbps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub noise_floor_dbm: Option<f64>,
}

impl NewPerformanceMetric {
    pub fn validate(&self) -> Result<()> {
        if let Some(loss) = self.packet_loss_percent {
            if !(0.0..=100.0).contains(&loss) {
                return Err(StoreError::validation(
                    "packet_loss",
                    format!("{} outside 0..=100", loss),
                )
                .into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCoveragePoint {
    pub x: f64,
    pub y: f64,
    pub signal: SignalStrength,
    pub throughput_mbps: Option<f64>,
    pub networks_detected: u32,
}

impl NewCoveragePoint {
    pub fn validate(&self) -> Result<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(StoreError::validation("coordinates", "must be finite").into());
        }
        Ok(())
    }
}

/// A report ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub scan_id: ScanId,
    pub scan_name: String,
    pub name: String,
    pub report_type: String,
    pub content: String,
    pub export_data: Option<serde_json::Value>,
    pub export_format: Option<ExportFormat>,
}

impl NewReport {
    pub fn validate(&self) -> Result<()> {
        require_text("report name", &self.name)
    }

    pub fn into_report(self, id: ReportId, created_at: DateTime<Utc>) -> Report {
        Report {
            id,
            scan_id: self.scan_id,
            scan_name: self.scan_name,
            name: self.name,
            report_type: self.report_type,
            content: self.content,
            export_data: self.export_data,
            export_format: self.export_format,
            created_at,
        }
    }
}
