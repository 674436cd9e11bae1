//! Process-tree enumeration and termination.
//!
//! Killing is best-effort: a process that already exited (or that we are not
//! allowed to signal) is logged at trace level and otherwise ignored.

use std::collections::HashMap;

use super::error::KillError;

/// Capability to enumerate and signal processes.
pub trait ProcessTree: Send + Sync {
    /// All transitive descendants of `pid`, parents before children
    fn descendants(&self, pid: u32) -> Vec<u32>;

    /// Request termination of a single process
    fn kill(&self, pid: u32) -> Result<(), KillError>;
}

/// Kill `pid` and every descendant that could be enumerated.
///
/// Descendants are listed before the root is signalled so that orphans
/// reparented to init are still found. Returns the number of processes that
/// accepted the signal.
pub fn kill_process_tree(tree: &dyn ProcessTree, pid: u32) -> usize {
    let descendants = tree.descendants(pid);
    let mut killed = 0;

    for target in std::iter::once(pid).chain(descendants) {
        match tree.kill(target) {
            Ok(()) => killed += 1,
            Err(KillError::NoSuchProcess(gone)) => {
                tracing::trace!("Process {} already exited", gone);
            }
            Err(e) => {
                tracing::trace!("Ignoring kill failure: {}", e);
            }
        }
    }

    killed
}

/// Build a parent → children index and walk it breadth-first from `root`
fn collect_descendants(parents: &HashMap<u32, u32>, root: u32) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (&child, &parent) in parents {
        children.entry(parent).or_default().push(child);
    }
    for list in children.values_mut() {
        list.sort_unstable();
    }

    let mut result = Vec::new();
    let mut queue = std::collections::VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        if let Some(kids) = children.get(&current) {
            for &kid in kids {
                if kid != root && !result.contains(&kid) {
                    result.push(kid);
                    queue.push_back(kid);
                }
            }
        }
    }
    result
}

/// [`ProcessTree`] backed by `sysinfo` for enumeration and `nix` for signals
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTree;

impl ProcessTree for SystemProcessTree {
    fn descendants(&self, pid: u32) -> Vec<u32> {
        use sysinfo::{ProcessesToUpdate, System};

        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let parents: HashMap<u32, u32> = system
            .processes()
            .iter()
            .filter_map(|(child, process)| {
                process
                    .parent()
                    .map(|parent| (child.as_u32(), parent.as_u32()))
            })
            .collect();

        collect_descendants(&parents, pid)
    }

    #[cfg(unix)]
    fn kill(&self, pid: u32) -> Result<(), KillError> {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|_| KillError::Failed {
            pid,
            message: "pid out of range".to_string(),
        })?;

        // The root was spawned as a group leader; signal the group first
        let _ = signal::kill(Pid::from_raw(-raw), Signal::SIGTERM);

        match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(KillError::NoSuchProcess(pid)),
            Err(errno) => Err(KillError::Failed {
                pid,
                message: errno.desc().to_string(),
            }),
        }
    }

    #[cfg(not(unix))]
    fn kill(&self, pid: u32) -> Result<(), KillError> {
        use sysinfo::{Pid, ProcessesToUpdate, System};

        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);

        match system.process(target) {
            Some(process) if process.kill() => Ok(()),
            Some(_) => Err(KillError::Failed {
                pid,
                message: "kill request was rejected".to_string(),
            }),
            None => Err(KillError::NoSuchProcess(pid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeTree {
        parents: HashMap<u32, u32>,
        exited: Vec<u32>,
        killed: Mutex<Vec<u32>>,
    }

    impl ProcessTree for FakeTree {
        fn descendants(&self, pid: u32) -> Vec<u32> {
            collect_descendants(&self.parents, pid)
        }

        fn kill(&self, pid: u32) -> Result<(), KillError> {
            if self.exited.contains(&pid) {
                return Err(KillError::NoSuchProcess(pid));
            }
            self.killed.lock().unwrap().push(pid);
            Ok(())
        }
    }

    #[test]
    fn test_collect_descendants_walks_all_levels() {
        // 1 -> 2 -> 4, 1 -> 3, 9 unrelated
        let parents = HashMap::from([(2, 1), (3, 1), (4, 2), (9, 7)]);
        assert_eq!(collect_descendants(&parents, 1), vec![2, 3, 4]);
        assert!(collect_descendants(&parents, 4).is_empty());
    }

    #[test]
    fn test_kill_process_tree_swallows_missing_processes() {
        let tree = FakeTree {
            parents: HashMap::from([(20, 10), (30, 20)]),
            exited: vec![20],
            killed: Mutex::new(Vec::new()),
        };

        let killed = kill_process_tree(&tree, 10);

        assert_eq!(killed, 2);
        assert_eq!(*tree.killed.lock().unwrap(), vec![10, 30]);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_tree_reports_missing_pid() {
        // Pid near the default pid_max is almost never in use
        let result = SystemProcessTree.kill(4_194_000);
        assert!(matches!(
            result,
            Err(KillError::NoSuchProcess(_)) | Err(KillError::Failed { .. })
        ));
    }
}
