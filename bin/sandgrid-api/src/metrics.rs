//! Control-plane API metrics for Prometheus
//!
//! Tracks API operations, latencies, and node pool connections.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// API operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    ListSandboxes,
    GetSandbox,
    UpdateSandboxMetadata,
}

impl ApiOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiOperation::ListSandboxes => "ListSandboxes",
            ApiOperation::GetSandbox => "GetSandbox",
            ApiOperation::UpdateSandboxMetadata => "UpdateSandboxMetadata",
        }
    }
}

/// Per-operation metrics
#[derive(Debug, Default)]
struct OperationMetrics {
    /// Total requests
    requests_total: AtomicU64,
    /// Successful requests (2xx)
    requests_success: AtomicU64,
    /// Client errors (4xx)
    requests_client_error: AtomicU64,
    /// Server errors (5xx)
    requests_server_error: AtomicU64,
    /// Latency sum in microseconds
    latency_sum_us: AtomicU64,
    /// Latency histogram buckets (cumulative counts)
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    latency_buckets: [AtomicU64; 11],
}

const LATENCY_BUCKET_BOUNDARIES_MS: [u64; 11] =
    [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

impl OperationMetrics {
    fn record(&self, status_code: u16, latency_us: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if (200..300).contains(&status_code) {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else if (400..500).contains(&status_code) {
            self.requests_client_error.fetch_add(1, Ordering::Relaxed);
        } else if status_code >= 500 {
            self.requests_server_error.fetch_add(1, Ordering::Relaxed);
        }

        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let latency_ms = latency_us / 1000;
        for (i, &boundary) in LATENCY_BUCKET_BOUNDARIES_MS.iter().enumerate() {
            if latency_ms <= boundary {
                self.latency_buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// API metrics collector
#[derive(Debug)]
pub struct ApiMetrics {
    /// Per-operation metrics
    operations: RwLock<HashMap<ApiOperation, OperationMetrics>>,
    /// Currently connected worker nodes
    connected_nodes: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl ApiMetrics {
    /// Create a new API metrics collector
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            connected_nodes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an API operation
    pub fn record_operation(&self, op: ApiOperation, status_code: u16, latency_us: u64) {
        let mut ops = self.operations.write().unwrap();
        let metrics = ops.entry(op).or_default();
        metrics.record(status_code, latency_us);
    }

    /// A node joined the connection pool
    pub fn node_connected(&self) {
        self.connected_nodes.fetch_add(1, Ordering::Relaxed);
    }

    /// A node left the connection pool
    pub fn node_disconnected(&self) {
        self.connected_nodes.fetch_sub(1, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(4 * 1024);

        // API uptime
        let uptime_secs = self.start_time.elapsed().as_secs();
        writeln!(
            output,
            "# HELP sandgrid_api_uptime_seconds API uptime in seconds"
        )
        .unwrap();
        writeln!(output, "# TYPE sandgrid_api_uptime_seconds counter").unwrap();
        writeln!(output, "sandgrid_api_uptime_seconds {}", uptime_secs).unwrap();

        // Node pool size
        writeln!(
            output,
            "# HELP sandgrid_api_connected_nodes Worker nodes in the connection pool"
        )
        .unwrap();
        writeln!(output, "# TYPE sandgrid_api_connected_nodes gauge").unwrap();
        writeln!(
            output,
            "sandgrid_api_connected_nodes {}",
            self.connected_nodes.load(Ordering::Relaxed)
        )
        .unwrap();

        let ops = self.operations.read().unwrap();

        // Request counters
        writeln!(
            output,
            "# HELP sandgrid_api_requests_total Total API requests by operation and class"
        )
        .unwrap();
        writeln!(output, "# TYPE sandgrid_api_requests_total counter").unwrap();
        for (op, metrics) in ops.iter() {
            let op_name = op.as_str();
            writeln!(
                output,
                "sandgrid_api_requests_total{{operation=\"{}\",status=\"success\"}} {}",
                op_name,
                metrics.requests_success.load(Ordering::Relaxed)
            )
            .unwrap();
            writeln!(
                output,
                "sandgrid_api_requests_total{{operation=\"{}\",status=\"client_error\"}} {}",
                op_name,
                metrics.requests_client_error.load(Ordering::Relaxed)
            )
            .unwrap();
            writeln!(
                output,
                "sandgrid_api_requests_total{{operation=\"{}\",status=\"server_error\"}} {}",
                op_name,
                metrics.requests_server_error.load(Ordering::Relaxed)
            )
            .unwrap();
        }

        // Latency histogram
        writeln!(
            output,
            "# HELP sandgrid_api_request_duration_seconds API request duration histogram"
        )
        .unwrap();
        writeln!(
            output,
            "# TYPE sandgrid_api_request_duration_seconds histogram"
        )
        .unwrap();
        for (op, metrics) in ops.iter() {
            let op_name = op.as_str();
            let total = metrics.requests_total.load(Ordering::Relaxed);
            let sum_us = metrics.latency_sum_us.load(Ordering::Relaxed);

            let mut cumulative = 0u64;
            for (i, &boundary_ms) in LATENCY_BUCKET_BOUNDARIES_MS.iter().enumerate() {
                cumulative += metrics.latency_buckets[i].load(Ordering::Relaxed);
                writeln!(
                    output,
                    "sandgrid_api_request_duration_seconds_bucket{{operation=\"{}\",le=\"{}\"}} {}",
                    op_name,
                    boundary_ms as f64 / 1000.0,
                    cumulative
                )
                .unwrap();
            }
            writeln!(
                output,
                "sandgrid_api_request_duration_seconds_bucket{{operation=\"{}\",le=\"+Inf\"}} {}",
                op_name, total
            )
            .unwrap();
            writeln!(
                output,
                "sandgrid_api_request_duration_seconds_sum{{operation=\"{}\"}} {}",
                op_name,
                sum_us as f64 / 1_000_000.0
            )
            .unwrap();
            writeln!(
                output,
                "sandgrid_api_request_duration_seconds_count{{operation=\"{}\"}} {}",
                op_name, total
            )
            .unwrap();
        }

        output
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Global API metrics instance
static API_METRICS: std::sync::OnceLock<ApiMetrics> = std::sync::OnceLock::new();

/// Get the global API metrics instance
pub fn api_metrics() -> &'static ApiMetrics {
    API_METRICS.get_or_init(ApiMetrics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation() {
        let metrics = ApiMetrics::new();
        metrics.record_operation(ApiOperation::UpdateSandboxMetadata, 200, 5000);
        metrics.record_operation(ApiOperation::UpdateSandboxMetadata, 404, 1000);
        metrics.record_operation(ApiOperation::GetSandbox, 200, 300);

        let output = metrics.export_prometheus();
        assert!(output.contains("sandgrid_api_requests_total"));
        assert!(output.contains("UpdateSandboxMetadata"));
        assert!(output.contains("GetSandbox"));
    }

    #[test]
    fn test_latency_histogram() {
        let metrics = ApiMetrics::new();
        metrics.record_operation(ApiOperation::UpdateSandboxMetadata, 200, 500); // 0.5ms
        metrics.record_operation(ApiOperation::UpdateSandboxMetadata, 200, 50000); // 50ms
        metrics.record_operation(ApiOperation::UpdateSandboxMetadata, 200, 500000); // 500ms

        let output = metrics.export_prometheus();
        assert!(output.contains("sandgrid_api_request_duration_seconds_bucket"));
        assert!(output.contains("le=\"0.001\""));
        assert!(output.contains("le=\"0.05\""));
    }

    #[test]
    fn test_node_gauge() {
        let metrics = ApiMetrics::new();
        metrics.node_connected();
        metrics.node_connected();
        metrics.node_disconnected();

        let output = metrics.export_prometheus();
        assert!(output.contains("sandgrid_api_connected_nodes 1"));
    }
}
