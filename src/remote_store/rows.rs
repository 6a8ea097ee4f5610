//! Wire shapes of the remote tables and their conversion to the model.
//!
//! Signal strength is stored in dBm exactly as measured, together with the
//! derived quality percentage; the percentage is never read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::model::{
    channel_frequency_mhz, Band, CoveragePoint, ExportFormat, IssueCategory,
    IssuePatch, Network, NetworkPatch, NewCoveragePoint, NewIssue, NewNetwork,
    NewPerformanceMetric, NewReport, NewScan, PerformanceMetric, Report, Scan,
    ScanId, ScanPatch, ScanStatus, Severity, SignalStrength,
};

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRow {
    pub id: ScanId,
    pub analise_nome: String,
    pub analise_local: String,
    pub analise_descricao: Option<String>,
    pub analise_tipo: Option<String>,
    pub analise_tamanho: Option<String>,
    pub analise_ambiente: Option<String>,
    pub analise_planta_id: Option<String>,
    pub analise_escala: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<AnalysisRow> for Scan {
    /// Remote analyses have no lifecycle column; a stored analysis counts as
    /// complete.
    fn from(row: AnalysisRow) -> Self {
        Scan {
            id: row.id,
            name: row.analise_nome,
            location: row.analise_local,
            description: row.analise_descricao,
            created_at: row.created_at,
            kind: row.analise_tipo,
            environment: row.analise_ambiente,
            size: row.analise_tamanho,
            scale: row.analise_escala,
            floor_plan_ref: row.analise_planta_id,
            status: ScanStatus::Complete,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisInsert {
    pub analise_nome: String,
    pub analise_local: String,
    pub analise_descricao: Option<String>,
    pub analise_tipo: Option<String>,
    pub analise_tamanho: Option<String>,
    pub analise_ambiente: Option<String>,
    pub analise_planta_id: Option<String>,
    pub analise_escala: Option<f64>,
}

impl From<NewScan> for AnalysisInsert {
    fn from(scan: NewScan) -> Self {
        AnalysisInsert {
            analise_nome: scan.name,
            analise_local: scan.location,
            analise_descricao: scan.description,
            analise_tipo: scan.kind,
            analise_tamanho: scan.size,
            analise_ambiente: scan.environment,
            analise_planta_id: scan.floor_plan_ref,
            analise_escala: scan.scale,
        }
    }
}

fn set<T: Serialize>(map: &mut Map<String, Value>, column: &str, value: Option<T>) {
    if let Some(value) = value {
        if let Ok(value) = serde_json::to_value(value) {
            map.insert(column.to_string(), value);
        }
    }
}

/// Columns changed by a scan patch. The status has no column and is dropped.
pub fn analysis_patch(patch: ScanPatch) -> Map<String, Value> {
    let mut map = Map::new();
    set(&mut map, "analise_nome", patch.name);
    set(&mut map, "analise_local", patch.location);
    set(&mut map, "analise_descricao", patch.description);
    set(&mut map, "analise_tipo", patch.kind);
    set(&mut map, "analise_tamanho", patch.size);
    set(&mut map, "analise_ambiente", patch.environment);
    set(&mut map, "analise_planta_id", patch.floor_plan_ref);
    set(&mut map, "analise_escala", patch.scale);
    map
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkRow {
    pub id: i64,
    pub analise_id: ScanId,
    pub ssid: String,
    pub bssid: String,
    pub signal_strength: f64,
    pub channel: u16,
    pub frequency: Option<u32>,
    pub band: Option<String>,
    pub security_type: Option<String>,
    pub encryption: Option<String>,
    pub vendor: Option<String>,
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub clients_count: u32,
    #[serde(default)]
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
}

fn parse_band(label: &str) -> Option<Band> {
    match label {
        "2.4GHz" => Some(Band::Ghz2_4),
        "5GHz" => Some(Band::Ghz5),
        _ => None,
    }
}

impl NetworkRow {
    /// The band is taken from the channel when it is a known one, otherwise
    /// from the stored label.
    pub fn into_network(self) -> Result<Network> {
        let band = Band::of_channel(self.channel)
            .or_else(|| self.band.as_deref().and_then(parse_band))
            .ok_or_else(|| {
                StoreError::Backend(format!(
                    "network {} has no recognisable band (channel {})",
                    self.id, self.channel
                ))
            })?;
        let frequency_mhz = self
            .frequency
            .or_else(|| channel_frequency_mhz(self.channel))
            .unwrap_or_default();

        Ok(Network {
            id: self.id,
            scan_id: self.analise_id,
            ssid: self.ssid,
            bssid: self.bssid,
            channel: self.channel,
            frequency_mhz,
            band,
            signal: SignalStrength::from_dbm(self.signal_strength),
            security: self.security_type,
            encryption: self.encryption,
            vendor: self.vendor,
            max_speed_mbps: self.max_speed,
            clients_count: self.clients_count,
            hidden: self.is_hidden,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInsert {
    pub analise_id: ScanId,
    pub ssid: String,
    pub bssid: String,
    pub signal_strength: f64,
    pub signal_quality: i32,
    pub channel: u16,
    pub frequency: Option<u32>,
    pub band: &'static str,
    pub security_type: Option<String>,
    pub encryption: Option<String>,
    pub vendor: Option<String>,
    pub max_speed: Option<f64>,
    pub clients_count: u32,
    pub is_hidden: bool,
}

impl NetworkInsert {
    /// The input must have been validated.
    pub fn new(scan_id: ScanId, network: NewNetwork) -> Result<Self> {
        let band = Band::of_channel(network.channel)
            .ok_or_else(|| StoreError::validation("channel", "out of range"))?;
        Ok(NetworkInsert {
            analise_id: scan_id,
            ssid: network.ssid,
            bssid: network.bssid,
            signal_strength: network.signal.dbm(),
            signal_quality: network.signal.percent().round() as i32,
            channel: network.channel,
            frequency: channel_frequency_mhz(network.channel),
            band: band.label(),
            security_type: network.security,
            encryption: network.encryption,
            vendor: network.vendor,
            max_speed: network.max_speed_mbps,
            clients_count: network.clients_count,
            is_hidden: network.hidden,
        })
    }
}

/// Columns changed by a network patch. A channel change also rewrites the
/// band and frequency columns.
pub fn network_patch(patch: NetworkPatch) -> Map<String, Value> {
    let mut map = Map::new();
    set(&mut map, "ssid", patch.ssid);
    set(&mut map, "bssid", patch.bssid);
    if let Some(channel) = patch.channel {
        set(&mut map, "channel", Some(channel));
        set(&mut map, "band", Band::of_channel(channel).map(Band::label));
        set(&mut map, "frequency", channel_frequency_mhz(channel));
    }
    if let Some(signal) = patch.signal {
        set(&mut map, "signal_strength", Some(signal.dbm()));
        set(&mut map, "signal_quality", Some(signal.percent().round() as i32));
    }
    set(&mut map, "security_type", patch.security);
    set(&mut map, "encryption", patch.encryption);
    set(&mut map, "vendor", patch.vendor);
    set(&mut map, "max_speed", patch.max_speed_mbps);
    set(&mut map, "clients_count", patch.clients_count);
    set(&mut map, "is_hidden", patch.hidden);
    map
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueRow {
    pub id: i64,
    pub analise_id: ScanId,
    pub network_id: Option<i64>,
    pub issue_type: IssueCategory,
    pub severity: Severity,
    pub title: String,
    pub description: Option<String>,
    pub recommendation: Option<String>,
    pub impact_score: Option<u8>,
    #[serde(default)]
    pub auto_detected: bool,
    #[serde(default)]
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<IssueRow> for crate::model::Issue {
    fn from(row: IssueRow) -> Self {
        crate::model::Issue {
            id: row.id,
            scan_id: row.analise_id,
            network_id: row.network_id,
            category: row.issue_type,
            severity: row.severity,
            title: row.title,
            description: row.description.unwrap_or_default(),
            recommendation: row.recommendation,
            impact_score: row.impact_score,
            auto_detected: row.auto_detected,
            resolved: row.resolved,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueInsert {
    pub analise_id: ScanId,
    pub network_id: Option<i64>,
    pub issue_type: IssueCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendation: Option<String>,
    pub impact_score: Option<u8>,
    pub auto_detected: bool,
    pub resolved: bool,
}

impl IssueInsert {
    pub fn new(scan_id: ScanId, issue: NewIssue) -> Self {
        IssueInsert {
            analise_id: scan_id,
            network_id: issue.network_id,
            issue_type: issue.category,
            severity: issue.severity,
            title: issue.title,
            description: issue.description,
            recommendation: issue.recommendation,
            impact_score: issue.impact_score,
            auto_detected: issue.auto_detected,
            resolved: false,
        }
    }
}

pub fn issue_patch(patch: IssuePatch) -> Map<String, Value> {
    let mut map = Map::new();
    set(&mut map, "issue_type", patch.category);
    set(&mut map, "severity", patch.severity);
    set(&mut map, "title", patch.title);
    set(&mut map, "description", patch.description);
    set(&mut map, "recommendation", patch.recommendation);
    set(&mut map, "impact_score", patch.impact_score);
    set(&mut map, "resolved", patch.resolved);
    map
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceMetricRow {
    pub id: i64,
    pub analise_id: ScanId,
    pub network_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub throughput_down: Option<f64>,
    pub throughput_up: Option<f64>,
    pub latency: Option<f64>,
    pub packet_loss: Option<f64>,
    pub jitter: Option<f64>,
    pub noise_floor: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<PerformanceMetricRow> for PerformanceMetric {
    fn from(row: PerformanceMetricRow) -> Self {
        PerformanceMetric {
            id: row.id,
            scan_id: row.analise_id,
            network_id: row.network_id,
            timestamp: row.timestamp,
            throughput_down_mbps: row.throughput_down,
            throughput_up_mbps: row.throughput_up,
            latency_ms: row.latency,
            packet_loss_percent: row.packet_loss,
            jitter_ms: row.jitter,
            noise_floor_dbm: row.noise_floor,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetricInsert {
    pub analise_id: ScanId,
    pub network_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub throughput_down: Option<f64>,
    pub throughput_up: Option<f64>,
    pub latency: Option<f64>,
    pub packet_loss: Option<f64>,
    pub jitter: Option<f64>,
    pub noise_floor: Option<f64>,
}

impl PerformanceMetricInsert {
    pub fn new(scan_id: ScanId, metric: NewPerformanceMetric, now: DateTime<Utc>) -> Self {
        PerformanceMetricInsert {
            analise_id: scan_id,
            network_id: metric.network_id,
            timestamp: metric.timestamp.unwrap_or(now),
            throughput_down: metric.throughput_down_mbps,
            throughput_up: metric.throughput_up_mbps,
            latency: metric.latency_ms,
            packet_loss: metric.packet_loss_percent,
            jitter: metric.jitter_ms,
            noise_floor: metric.noise_floor_dbm,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoveragePointRow {
    pub id: i64,
    pub analise_id: ScanId,
    pub x_coordinate: f64,
    pub y_coordinate: f64,
    pub signal_strength: f64,
    pub throughput: Option<f64>,
    #[serde(default)]
    pub networks_detected: u32,
    pub created_at: DateTime<Utc>,
}

impl From<CoveragePointRow> for CoveragePoint {
    fn from(row: CoveragePointRow) -> Self {
        CoveragePoint {
            id: row.id,
            scan_id: row.analise_id,
            x: row.x_coordinate,
            y: row.y_coordinate,
            signal: SignalStrength::from_dbm(row.signal_strength),
            throughput_mbps: row.throughput,
            networks_detected: row.networks_detected,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoveragePointInsert {
    pub analise_id: ScanId,
    pub x_coordinate: f64,
    pub y_coordinate: f64,
    pub signal_strength: f64,
    pub signal_quality: i32,
    pub throughput: Option<f64>,
    pub networks_detected: u32,
}

impl CoveragePointInsert {
    pub fn new(scan_id: ScanId, point: NewCoveragePoint) -> Self {
        CoveragePointInsert {
            analise_id: scan_id,
            x_coordinate: point.x,
            y_coordinate: point.y,
            signal_strength: point.signal.dbm(),
            signal_quality: point.signal.percent().round() as i32,
            throughput: point.throughput_mbps,
            networks_detected: point.networks_detected,
        }
    }
}

/// Analysis columns embedded into a report row.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedAnalysis {
    pub analise_nome: String,
}

/// Projection used when reading reports, embedding the analysis name.
pub const REPORT_SELECT: &str = "*,wifi_analise(analise_nome)";

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRow {
    pub id: i64,
    pub relatorio_nome: Option<String>,
    pub relatorio_analise_id: Option<ScanId>,
    pub relatorio_tipo: Option<String>,
    pub relatorio_notas: Option<String>,
    pub report_data: Option<Value>,
    pub export_format: Option<ExportFormat>,
    pub wifi_analise: Option<EmbeddedAnalysis>,
    pub created_at: DateTime<Utc>,
}

impl ReportRow {
    /// `None` for rows that are not attached to an analysis.
    pub fn into_report(self, scan_name: Option<String>) -> Option<Report> {
        let scan_id = self.relatorio_analise_id?;
        let scan_name = self
            .wifi_analise
            .map(|a| a.analise_nome)
            .or(scan_name)
            .unwrap_or_default();

        Some(Report {
            id: self.id,
            scan_id,
            scan_name,
            name: self.relatorio_nome.unwrap_or_default(),
            report_type: self.relatorio_tipo.unwrap_or_default(),
            content: self.relatorio_notas.unwrap_or_default(),
            export_data: self.report_data,
            export_format: self.export_format,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportInsert {
    pub relatorio_nome: String,
    pub relatorio_analise_id: ScanId,
    pub relatorio_tipo: String,
    pub relatorio_notas: String,
    pub report_data: Option<Value>,
    pub export_format: Option<ExportFormat>,
}

impl From<NewReport> for ReportInsert {
    fn from(report: NewReport) -> Self {
        ReportInsert {
            relatorio_nome: report.name,
            relatorio_analise_id: report.scan_id,
            relatorio_tipo: report.report_type,
            relatorio_notas: report.content,
            report_data: report.export_data,
            export_format: report.export_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;
    use serde_json::json;

    #[test]
    fn test_network_row_conversion() {
        let row: NetworkRow = serde_json::from_value(json!({
            "id": 4,
            "analise_id": 1,
            "ssid": "corp",
            "bssid": "aa:bb:cc:dd:ee:ff",
            "signal_strength": -67,
            "signal_quality": 66,
            "channel": 44,
            "frequency": 5220,
            "band": "5GHz",
            "security_type": "WPA3",
            "encryption": "AES",
            "vendor": null,
            "max_speed": 866.0,
            "clients_count": 7,
            "is_hidden": false,
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        let network = row.into_network().unwrap();
        assert_eq!(network.signal.dbm(), -67.0);
        assert_eq!(network.band, Band::Ghz5);
        assert_eq!(network.scan_id, 1);
        assert_eq!(network.clients_count, 7);
    }

    #[test]
    fn test_network_row_band_fallback() {
        let row: NetworkRow = serde_json::from_value(json!({
            "id": 4, "analise_id": 1, "ssid": "x", "bssid": "y",
            "signal_strength": -70, "channel": 200, "band": "5GHz",
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(row.into_network().unwrap().band, Band::Ghz5);

        let row: NetworkRow = serde_json::from_value(json!({
            "id": 5, "analise_id": 1, "ssid": "x", "bssid": "y",
            "signal_strength": -70, "channel": 200, "band": null,
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert!(row.into_network().is_err());
    }

    #[test]
    fn test_network_insert_keeps_dbm_and_derives() {
        let mut network = fixtures::new_network("corp", 6, -62.4);
        network.hidden = true;
        let insert = serde_json::to_value(NetworkInsert::new(9, network).unwrap()).unwrap();

        assert_eq!(insert["analise_id"], 9);
        assert_eq!(insert["signal_strength"], -62.4);
        assert_eq!(insert["signal_quality"], 54);
        assert_eq!(insert["band"], "2.4GHz");
        assert_eq!(insert["frequency"], 2437);
        assert_eq!(insert["is_hidden"], true);
    }

    #[test]
    fn test_patch_maps_only_set_columns() {
        let map = network_patch(NetworkPatch {
            channel: Some(36),
            vendor: Some("Acme".to_string()),
            ..Default::default()
        });
        assert_eq!(map.len(), 4);
        assert_eq!(map["band"], "5GHz");
        assert_eq!(map["frequency"], 5180);

        assert!(analysis_patch(ScanPatch::status(ScanStatus::Complete)).is_empty());

        let map = network_patch(NetworkPatch {
            signal: Some(SignalStrength::from_dbm(-47.5)),
            ..Default::default()
        });
        assert_eq!(map["signal_strength"], -47.5);
        assert_eq!(map["signal_quality"], 75);
        assert_eq!(issue_patch(IssuePatch::resolved())["resolved"], true);
    }

    #[test]
    fn test_issue_row_uses_wire_names() {
        let row: IssueRow = serde_json::from_value(json!({
            "id": 1, "analise_id": 2, "network_id": null,
            "issue_type": "channel_congestion", "severity": "critical",
            "title": "Crowded channel", "description": "8 networks on channel 6",
            "recommendation": null, "impact_score": 8,
            "auto_detected": true, "resolved": false,
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        let issue: crate::model::Issue = row.into();
        assert_eq!(issue.category, IssueCategory::ChannelCongestion);
        assert_eq!(issue.severity, Severity::Critical);
    }

    #[test]
    fn test_report_row_requires_analysis() {
        let row: ReportRow = serde_json::from_value(json!({
            "id": 1, "relatorio_nome": "r", "relatorio_analise_id": null,
            "relatorio_tipo": null, "relatorio_notas": null,
            "report_data": null, "export_format": null,
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert!(row.into_report(None).is_none());
    }
}
