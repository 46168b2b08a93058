// PID → display name via the sysinfo process table.

use std::collections::HashMap;
use std::path::Path;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Name shown for an executable path: the bundle name for anything inside an
/// `.app` bundle (helpers fold into their app), else the file stem.
pub(crate) fn display_name_from_path(path: &Path) -> Option<String> {
    let path_str = path.to_string_lossy();
    let lower = path_str.to_ascii_lowercase();
    if let Some(idx) = lower.find(".app/") {
        let bundle = Path::new(&path_str[..idx]);
        if let Some(name) = bundle.file_name().map(|n| n.to_string_lossy().into_owned())
            && !name.is_empty()
        {
            return Some(name);
        }
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

/// Refreshing only the sampled PIDs never evicts the ones that stopped
/// showing up; the table is rebuilt once it outgrows a sample by this much.
const STALE_PROCESS_SLACK: usize = 256;

pub(crate) struct ProcessNamer {
    sys: std::sync::Mutex<System>,
    stale_slack: usize,
}

impl ProcessNamer {
    pub(crate) fn new() -> Self {
        Self::with_slack(STALE_PROCESS_SLACK)
    }

    fn with_slack(stale_slack: usize) -> Self {
        Self {
            sys: std::sync::Mutex::new(System::new()),
            stale_slack,
        }
    }

    /// Resolves each PID to a display name; unknown PIDs become "PID n".
    /// Blocking: call from `spawn_blocking`.
    pub(crate) fn resolve(&self, pids: &[u32]) -> HashMap<u32, String> {
        let sys_pids: Vec<Pid> = pids.iter().map(|p| Pid::from_u32(*p)).collect();
        let mut names = HashMap::with_capacity(pids.len());
        let Ok(mut sys) = self.sys.lock() else {
            for pid in pids {
                names.insert(*pid, format!("PID {pid}"));
            }
            return names;
        };
        let tracked = sys.processes().len();
        if tracked > pids.len() + self.stale_slack {
            tracing::debug!(tracked, sampled = pids.len(), "rebuilding process table");
            *sys = System::new();
        }
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&sys_pids),
            true,
            ProcessRefreshKind::nothing().with_exe(sysinfo::UpdateKind::OnlyIfNotSet),
        );
        for pid in pids {
            let name = sys
                .process(Pid::from_u32(*pid))
                .and_then(|p| {
                    p.exe()
                        .and_then(display_name_from_path)
                        .or_else(|| Some(p.name().to_string_lossy().into_owned()))
                })
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("PID {pid}"));
            names.insert(*pid, name);
        }
        names
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.sys.lock().map(|sys| sys.processes().len()).unwrap_or(0)
    }
}
