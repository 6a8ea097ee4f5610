//! This module defines the stored shapes of the local collections.
//!
//! Scans embed their networks and issues. Network signal strength is kept as a
//! 0-100 percentage on disk and converted to dBm when a record leaves the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kv_db::SchemaType;
use crate::model::{
    Band, Issue, Network, NetworkId, Report, Scan, ScanDetail, ScanId,
    SignalStrength,
};

/// Key of the serialized scan collection.
pub const SCANS_KEY: &str = "wifi-analyzer-scans";
/// Key of the serialized report collection.
pub const REPORTS_KEY: &str = "wifi-analyzer-reports";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredNetwork {
    pub id: NetworkId,
    pub ssid: String,
    pub bssid: String,
    pub channel: u16,
    pub frequency: u32,
    pub band: Band,
    /// Quality percentage, 0-100.
    pub signal_strength: f64,
    pub security: Option<String>,
    #[serde(default)]
    pub encryption: Option<String>,
    pub vendor: Option<String>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub clients_count: u32,
    #[serde(default)]
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredNetwork {
    pub fn from_network(network: &Network) -> Self {
        StoredNetwork {
            id: network.id,
            ssid: network.ssid.clone(),
            bssid: network.bssid.clone(),
            channel: network.channel,
            frequency: network.frequency_mhz,
            band: network.band,
            signal_strength: network.signal.percent(),
            security: network.security.clone(),
            encryption: network.encryption.clone(),
            vendor: network.vendor.clone(),
            max_speed: network.max_speed_mbps,
            clients_count: network.clients_count,
            hidden: network.hidden,
            created_at: network.created_at,
        }
    }

    pub fn to_network(&self, scan_id: ScanId) -> Network {
        Network {
            id: self.id,
            scan_id,
            ssid: self.ssid.clone(),
            bssid: self.bssid.clone(),
            channel: self.channel,
            frequency_mhz: self.frequency,
            band: self.band,
            signal: SignalStrength::from_percent(self.signal_strength),
            security: self.security.clone(),
            encryption: self.encryption.clone(),
            vendor: self.vendor.clone(),
            max_speed_mbps: self.max_speed,
            clients_count: self.clients_count,
            hidden: self.hidden,
            created_at: self.created_at,
        }
    }
}

/// A scan with its embedded child records.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredScan {
    #[serde(flatten)]
    pub scan: Scan,
    #[serde(default)]
    pub networks: Vec<StoredNetwork>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl StoredScan {
    pub fn new(scan: Scan) -> Self {
        StoredScan { scan, networks: Vec::new(), issues: Vec::new() }
    }

    pub fn networks(&self) -> Vec<Network> {
        self.networks.iter().map(|n| n.to_network(self.scan.id)).collect()
    }

    pub fn to_detail(&self) -> ScanDetail {
        ScanDetail {
            networks: self.networks(),
            issues: self.issues.clone(),
            ..ScanDetail::new(self.scan.clone())
        }
    }

    /// Largest identifier held by the scan or any embedded record.
    pub fn max_id(&self) -> i64 {
        self.networks
            .iter()
            .map(|n| n.id)
            .chain(self.issues.iter().map(|i| i.id))
            .fold(self.scan.id, i64::max)
    }
}

impl SchemaType for Vec<StoredScan> {
    const KEYSPACE_NAME: &'static str = "scans";
}

impl SchemaType for Vec<Report> {
    const KEYSPACE_NAME: &'static str = "reports";
}
