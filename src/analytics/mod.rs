//! Aggregations over scan data: summary statistics and chart projections.
//!
//! Everything here is a pure single pass over small in-memory lists.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{Band, Issue, Network, ScanDetail, Severity, SignalQuality};

/// Channels shown by the 2.4 GHz utilization chart.
pub const CHANNELS_2_4GHZ: std::ops::RangeInclusive<u16> = 1..=13;

/// Upper bound on the length of [`time_series`].
pub const MAX_SERIES_POINTS: usize = 12;

const UNKNOWN_SECURITY: &str = "Unknown";

/// Summary of the networks found by one scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub total_networks: usize,
    /// Mean signal strength in dBm.
    pub avg_signal_dbm: f64,
    pub strongest_signal_dbm: f64,
    pub weakest_signal_dbm: f64,
    pub channel_distribution: BTreeMap<u16, usize>,
    pub security_types: BTreeMap<String, usize>,
    pub band_distribution: BTreeMap<Band, usize>,
    pub hidden_networks: usize,
}

/// Computes the summary, or `None` for an empty list.
pub fn network_stats(networks: &[Network]) -> Option<NetworkStats> {
    let first = networks.first()?;

    let mut sum = 0.0;
    let mut strongest = first.signal.dbm();
    let mut weakest = first.signal.dbm();
    let mut channel_distribution = BTreeMap::new();
    let mut security_types = BTreeMap::new();
    let mut band_distribution = BTreeMap::new();
    let mut hidden_networks = 0;

    for network in networks {
        let dbm = network.signal.dbm();
        sum += dbm;
        strongest = strongest.max(dbm);
        weakest = weakest.min(dbm);

        *channel_distribution.entry(network.channel).or_insert(0) += 1;
        let security = network
            .security
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SECURITY);
        *security_types.entry(security.to_string()).or_insert(0) += 1;
        *band_distribution.entry(network.band).or_insert(0) += 1;

        if network.hidden {
            hidden_networks += 1;
        }
    }

    // the mean can drift past the extremes by a rounding step
    let avg_signal_dbm = (sum / networks.len() as f64).clamp(weakest, strongest);

    Some(NetworkStats {
        total_networks: networks.len(),
        avg_signal_dbm,
        strongest_signal_dbm: strongest,
        weakest_signal_dbm: weakest,
        channel_distribution,
        security_types,
        band_distribution,
        hidden_networks,
    })
}

/// Network counts per signal band, strongest band first.
pub fn signal_quality_buckets(networks: &[Network]) -> [(SignalQuality, usize); 4] {
    let mut buckets = SignalQuality::ALL.map(|quality| (quality, 0));
    for network in networks {
        let quality = network.signal.quality();
        if let Some(bucket) = buckets.iter_mut().find(|(q, _)| *q == quality) {
            bucket.1 += 1;
        }
    }
    buckets
}

/// Network count per channel. Channels 1-13 are always present; any other
/// channel appears once it is used, so the counts sum to `networks.len()`.
pub fn channel_histogram(networks: &[Network]) -> BTreeMap<u16, usize> {
    let mut histogram: BTreeMap<u16, usize> =
        CHANNELS_2_4GHZ.map(|channel| (channel, 0)).collect();
    for network in networks {
        *histogram.entry(network.channel).or_insert(0) += 1;
    }
    histogram
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelUsage {
    pub channel: u16,
    pub networks: usize,
}

/// Rows for the 2.4 GHz channel chart, one per channel 1-13.
pub fn channel_utilization(networks: &[Network]) -> Vec<ChannelUsage> {
    CHANNELS_2_4GHZ
        .map(|channel| ChannelUsage {
            channel,
            networks: networks.iter().filter(|n| n.channel == channel).count(),
        })
        .collect()
}

/// Issue counts per severity, most severe first.
pub fn severity_histogram(issues: &[Issue]) -> Vec<(Severity, usize)> {
    [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        .into_iter()
        .map(|severity| {
            (severity, issues.iter().filter(|i| i.severity == severity).count())
        })
        .collect()
}

/// Two networks interfere when they share a 5 GHz channel or sit less than
/// five 2.4 GHz channels apart.
fn overlaps(a: &Network, b: &Network) -> bool {
    if a.band != b.band {
        return false;
    }
    match a.band {
        Band::Ghz2_4 => a.channel.abs_diff(b.channel) < 5,
        Band::Ghz5 => a.channel == b.channel,
    }
}

/// Share of networks, in percent, that overlap at least one other network.
pub fn interference_percent(networks: &[Network]) -> f64 {
    if networks.is_empty() {
        return 0.0;
    }
    let overlapping = networks
        .iter()
        .enumerate()
        .filter(|(i, a)| {
            networks.iter().enumerate().any(|(j, b)| *i != j && overlaps(a, b))
        })
        .count();
    100.0 * overlapping as f64 / networks.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    /// Mean signal quality in percent.
    pub signal: f64,
    /// Interference in percent, see [`interference_percent`].
    pub interference: f64,
    pub clients: u32,
}

impl SeriesPoint {
    fn from_scan(detail: &ScanDetail) -> Self {
        let networks = &detail.networks;
        let signal = networks.iter().map(|n| n.signal.percent()).sum::<f64>()
            / networks.len() as f64;
        SeriesPoint {
            timestamp: detail.scan.created_at,
            signal,
            interference: interference_percent(networks),
            clients: networks.iter().map(|n| n.clients_count).sum(),
        }
    }

    fn empty_at(timestamp: DateTime<Utc>) -> Self {
        SeriesPoint { timestamp, signal: 0.0, interference: 0.0, clients: 0 }
    }
}

/// Builds a chart series of exactly `points` rows (clamped to
/// [`MAX_SERIES_POINTS`]), oldest first, from scans that found networks.
///
/// With more scans than points only the newest `points` scans are used.
/// With fewer, the series is front-padded with zero rows spaced one hour
/// apart before the oldest real row. No scans with networks yields an empty
/// series.
pub fn time_series(scans: &[ScanDetail], points: usize) -> Vec<SeriesPoint> {
    let points = points.min(MAX_SERIES_POINTS);
    if points == 0 {
        return Vec::new();
    }

    let mut rows: Vec<SeriesPoint> = scans
        .iter()
        .filter(|s| !s.networks.is_empty())
        .map(SeriesPoint::from_scan)
        .collect();
    rows.sort_by_key(|row| row.timestamp);

    if rows.len() > points {
        return rows.split_off(rows.len() - points);
    }

    let Some(oldest) = rows.first().map(|row| row.timestamp) else {
        return Vec::new();
    };

    let missing = points - rows.len();
    let mut series: Vec<SeriesPoint> = (1..=missing)
        .rev()
        .map(|hours| SeriesPoint::empty_at(oldest - Duration::hours(hours as i64)))
        .collect();
    series.extend(rows);
    series
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallSignal {
    Good,
    Regular,
    Weak,
}

impl OverallSignal {
    fn from_percent(percent: f64) -> Self {
        if percent > 70.0 {
            OverallSignal::Good
        } else if percent > 50.0 {
            OverallSignal::Regular
        } else {
            OverallSignal::Weak
        }
    }

    /// Rough coverage estimate shown next to the label.
    pub fn coverage_percent(self) -> u8 {
        match self {
            OverallSignal::Good => 75,
            OverallSignal::Regular => 50,
            OverallSignal::Weak => 25,
        }
    }
}

/// Headline figures of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_scans: usize,
    pub total_networks: usize,
    pub total_issues: usize,
    pub open_issues: usize,
    pub signal: Option<OverallSignal>,
    pub coverage_percent: u8,
    pub last_scan_at: Option<DateTime<Utc>>,
}

pub fn dashboard_summary(scans: &[ScanDetail]) -> DashboardSummary {
    let networks: Vec<&Network> = scans.iter().flat_map(|s| &s.networks).collect();
    let issues = scans.iter().flat_map(|s| &s.issues);

    let signal = if networks.is_empty() {
        None
    } else {
        let mean = networks.iter().map(|n| n.signal.percent()).sum::<f64>()
            / networks.len() as f64;
        Some(OverallSignal::from_percent(mean))
    };

    DashboardSummary {
        total_scans: scans.len(),
        total_networks: networks.len(),
        total_issues: issues.clone().count(),
        open_issues: issues.filter(|i| !i.resolved).count(),
        signal,
        coverage_percent: signal.map(OverallSignal::coverage_percent).unwrap_or(0),
        last_scan_at: scans.iter().map(|s| s.scan.created_at).max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{fixtures, NewScan, SignalStrength};

    fn networks_on(channels: &[u16]) -> Vec<Network> {
        channels
            .iter()
            .enumerate()
            .map(|(i, ch)| fixtures::network(i as i64, *ch, -60.0))
            .collect()
    }

    fn networks_with_signal(dbms: &[f64]) -> Vec<Network> {
        dbms.iter()
            .enumerate()
            .map(|(i, dbm)| fixtures::network(i as i64, 6, *dbm))
            .collect()
    }

    fn scan_at(id: i64, hours_ago: i64, networks: Vec<Network>) -> ScanDetail {
        let created = Utc::now() - Duration::hours(hours_ago);
        ScanDetail {
            networks,
            ..ScanDetail::new(NewScan::new("s", "l").into_scan(id, created))
        }
    }

    #[test]
    fn test_stats_empty_is_none() {
        assert_eq!(network_stats(&[]), None);
    }

    #[test]
    fn test_stats_mean_between_extremes() {
        let samples: [&[f64]; 4] = [
            &[-40.0, -60.0, -75.0, -90.0],
            &[-55.0],
            &[-33.3, -33.3, -33.3],
            &[-99.9, -30.1, -64.7, -71.2, -88.8],
        ];
        for dbms in samples {
            let stats = network_stats(&networks_with_signal(dbms)).unwrap();
            assert!(stats.avg_signal_dbm >= stats.weakest_signal_dbm);
            assert!(stats.avg_signal_dbm <= stats.strongest_signal_dbm);
        }
    }

    #[test]
    fn test_stats_distributions() {
        let mut networks = networks_on(&[1, 6, 36]);
        networks[0].security = None;
        networks[2].hidden = true;

        let stats = network_stats(&networks).unwrap();
        assert_eq!(stats.total_networks, 3);
        assert_eq!(stats.avg_signal_dbm, -60.0);
        assert_eq!(stats.hidden_networks, 1);
        assert_eq!(stats.security_types.get("Unknown"), Some(&1));
        assert_eq!(stats.security_types.get("WPA2"), Some(&2));
        assert_eq!(stats.band_distribution.get(&Band::Ghz2_4), Some(&2));
        assert_eq!(stats.band_distribution.get(&Band::Ghz5), Some(&1));
        assert_eq!(stats.channel_distribution.get(&36), Some(&1));
    }

    #[test]
    fn test_signal_quality_buckets() {
        let buckets =
            signal_quality_buckets(&networks_with_signal(&[-40.0, -60.0, -75.0, -90.0]));
        assert_eq!(
            buckets,
            [
                (SignalQuality::Excellent, 1),
                (SignalQuality::Good, 1),
                (SignalQuality::Fair, 1),
                (SignalQuality::Weak, 1),
            ]
        );
    }

    #[test]
    fn test_channel_histogram_example() {
        let histogram = channel_histogram(&networks_on(&[1, 1, 6, 6, 6, 11]));

        assert_eq!(histogram[&1], 2);
        assert_eq!(histogram[&6], 3);
        assert_eq!(histogram[&11], 1);
        for channel in CHANNELS_2_4GHZ.filter(|c| ![1, 6, 11].contains(c)) {
            assert_eq!(histogram[&channel], 0);
        }
        assert_eq!(histogram.len(), 13);
    }

    #[test]
    fn test_channel_histogram_sums_to_length() {
        for channels in [&[][..], &[1, 1, 6][..], &[1, 36, 149, 149, 13][..]] {
            let networks = networks_on(channels);
            let total: usize = channel_histogram(&networks).values().sum();
            assert_eq!(total, networks.len());
        }
    }

    #[test]
    fn test_channel_utilization_rows() {
        let rows = channel_utilization(&networks_on(&[1, 6, 6, 36]));
        assert_eq!(rows.len(), 13);
        assert_eq!(rows[0], ChannelUsage { channel: 1, networks: 1 });
        assert_eq!(rows[5], ChannelUsage { channel: 6, networks: 2 });
        assert_eq!(rows.iter().map(|r| r.networks).sum::<usize>(), 3);
    }

    #[test]
    fn test_interference_percent() {
        assert_eq!(interference_percent(&networks_on(&[1, 6, 11])), 0.0);
        assert_eq!(interference_percent(&networks_on(&[1, 3, 11, 36])), 50.0);
        assert_eq!(interference_percent(&networks_on(&[36, 36])), 100.0);
        assert_eq!(interference_percent(&[]), 0.0);
    }

    #[test]
    fn test_time_series_pads_to_requested_length() {
        let scans = vec![
            scan_at(1, 2, networks_on(&[1, 6])),
            scan_at(2, 1, networks_on(&[11])),
            scan_at(3, 0, Vec::new()),
        ];

        let series = time_series(&scans, 5);
        assert_eq!(series.len(), 5);
        assert!(series.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(series[0].clients, 0);
        assert_eq!(series[2].clients, 0);
        assert_eq!(series[3].timestamp, scans[0].scan.created_at);
        assert_eq!(series[4].clients, 2);
        assert_eq!(series[4].signal, SignalStrength::from_dbm(-60.0).percent());
    }

    #[test]
    fn test_time_series_keeps_most_recent_scans() {
        let scans: Vec<ScanDetail> = (0..30)
            .map(|i| scan_at(i, 30 - i, networks_on(&[1])))
            .collect();

        let series = time_series(&scans, 50);
        assert_eq!(series.len(), MAX_SERIES_POINTS);
        assert_eq!(series[0].timestamp, scans[18].scan.created_at);
        assert_eq!(series.last().unwrap().timestamp, scans[29].scan.created_at);
        assert!(series.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let series = time_series(&scans, 3);
        let expected: Vec<_> = scans[27..].iter().map(|s| s.scan.created_at).collect();
        assert_eq!(series.iter().map(|p| p.timestamp).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_time_series_empty() {
        assert!(time_series(&[], 12).is_empty());
        assert!(time_series(&[scan_at(1, 0, Vec::new())], 12).is_empty());
        assert!(time_series(&[scan_at(1, 0, networks_on(&[1]))], 0).is_empty());
    }

    #[test]
    fn test_dashboard_summary() {
        let mut strong = networks_with_signal(&[-45.0, -50.0]);
        strong[0].clients_count = 4;
        let scans = vec![scan_at(1, 3, strong), scan_at(2, 1, Vec::new())];

        let summary = dashboard_summary(&scans);
        assert_eq!(summary.total_scans, 2);
        assert_eq!(summary.total_networks, 2);
        assert_eq!(summary.signal, Some(OverallSignal::Good));
        assert_eq!(summary.coverage_percent, 75);
        assert_eq!(summary.last_scan_at, Some(scans[1].scan.created_at));

        let empty = dashboard_summary(&[]);
        assert_eq!(empty.signal, None);
        assert_eq!(empty.coverage_percent, 0);
        assert_eq!(empty.last_scan_at, None);
    }
}
