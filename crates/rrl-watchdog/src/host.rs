//! Host environment hooks
//!
//! Heap metrics and GC hints are optional: every consumer treats `None` /
//! `false` as "not exposed" and carries on.

use parking_lot::Mutex;
use sysinfo::{Pid, System};

/// Optional memory metrics and GC hint exposed by the host
pub trait HostEnvironment: Send + Sync + std::fmt::Debug {
    /// Bytes currently in use by this process, if the host can tell
    fn heap_used_bytes(&self) -> Option<u64>;

    /// Ask the host to reclaim memory; returns whether a hint was delivered
    fn request_gc(&self) -> bool {
        false
    }
}

/// Host that exposes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl HostEnvironment for NullHost {
    fn heap_used_bytes(&self) -> Option<u64> {
        None
    }
}

/// Reads the current process's resident memory through `sysinfo`
pub struct SysinfoHost {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoHost {
    /// Host bound to the current process
    #[must_use]
    pub fn current() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(reason) => {
                tracing::warn!(reason, "current pid unavailable, memory probe disabled");
                None
            }
        };

        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl std::fmt::Debug for SysinfoHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoHost").field("pid", &self.pid).finish()
    }
}

impl HostEnvironment for SysinfoHost {
    fn heap_used_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(sysinfo::Process::memory)
    }
}
