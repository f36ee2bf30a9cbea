//! Tests for the resource sampler

use crate::sampler::{ResourceMonitor, SystemResourceMonitor};

#[tokio::test]
async fn system_monitor_reports_plausible_memory() {
    let monitor = SystemResourceMonitor::new();
    let snapshot = monitor.snapshot().await;

    assert!(snapshot.total_bytes > 0);
    assert!(snapshot.free_bytes <= snapshot.total_bytes);
}

#[tokio::test]
async fn cpu_overload_starts_false_until_reported() {
    let monitor = SystemResourceMonitor::new();
    assert!(!monitor.is_cpu_overloaded().await);

    monitor.report_cpu_overload(true);
    assert!(monitor.is_cpu_overloaded().await);

    monitor.report_cpu_overload(false);
    assert!(!monitor.is_cpu_overloaded().await);
}
