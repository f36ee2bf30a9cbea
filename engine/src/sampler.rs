//! Resource sampling: the leaf the scaling controller builds on.
//!
//! `ResourceSampler` is deliberately side-effect-free aside from reading the
//! local machine's memory counters. CPU overload is not sampled locally; it
//! arrives as a push signal from an external monitor (platform-provided, out
//! of scope here) via [`ResourceMonitor::report_cpu_overload`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sysinfo::System;
use tokio::sync::Mutex;

/// A point-in-time view of memory availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub free_bytes: u64,
    pub total_bytes: u64,
    pub main_process_bytes: u64,
}

/// Supplies memory snapshots and CPU-overload booleans to the scaling
/// controller. The core never probes OS-level details beyond this trait.
#[async_trait]
pub trait ResourceMonitor: Send + Sync {
    async fn snapshot(&self) -> ResourceSnapshot;

    /// True if the most recently reported CPU sample was overloaded.
    async fn is_cpu_overloaded(&self) -> bool;
}

/// The default `ResourceMonitor`, backed by `sysinfo`.
///
/// CPU overload is reported asynchronously through `report_cpu_overload`
/// rather than sampled here; this struct only owns the memory side.
pub struct SystemResourceMonitor {
    system: Mutex<System>,
    pid: sysinfo::Pid,
    cpu_overloaded: AtomicBool,
}

impl SystemResourceMonitor {
    pub fn new() -> Arc<Self> {
        let mut system = System::new_all();
        system.refresh_all();
        let pid = sysinfo::get_current_pid().unwrap_or(sysinfo::Pid::from(0));
        Arc::new(Self {
            system: Mutex::new(system),
            pid,
            cpu_overloaded: AtomicBool::new(false),
        })
    }

    /// Push a fresh CPU-overload reading from an external monitor.
    pub fn report_cpu_overload(&self, overloaded: bool) {
        self.cpu_overloaded.store(overloaded, Ordering::SeqCst);
    }
}

impl Default for SystemResourceMonitor {
    fn default() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        let pid = sysinfo::get_current_pid().unwrap_or(sysinfo::Pid::from(0));
        Self {
            system: Mutex::new(system),
            pid,
            cpu_overloaded: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ResourceMonitor for SystemResourceMonitor {
    async fn snapshot(&self) -> ResourceSnapshot {
        let mut system = self.system.lock().await;
        system.refresh_memory();
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);

        let main_process_bytes = system
            .process(self.pid)
            .map(|p| p.memory())
            .unwrap_or(0);

        ResourceSnapshot {
            free_bytes: system.available_memory(),
            total_bytes: system.total_memory(),
            main_process_bytes,
        }
    }

    async fn is_cpu_overloaded(&self) -> bool {
        self.cpu_overloaded.load(Ordering::SeqCst)
    }
}
