// src/worker/priority.rs

//! Best-effort OS priority for the calling worker thread.
//!
//! On Linux `setpriority(PRIO_PROCESS, tid, nice)` targets just the calling
//! thread. Other Unix systems only support it per process, so there it
//! affects the whole process. Elsewhere the call reports "unsupported" and
//! the worker carries on at the default priority.

use anyhow::Result;

use crate::types::Priority;

#[cfg(target_os = "linux")]
pub fn apply_priority(priority: Priority) -> Result<()> {
    // SAFETY: gettid has no preconditions.
    let tid = unsafe { libc::gettid() };
    set_niceness(tid as libc::id_t, priority.niceness())
}

#[cfg(all(unix, not(target_os = "linux")))]
pub fn apply_priority(priority: Priority) -> Result<()> {
    set_niceness(0, priority.niceness())
}

#[cfg(unix)]
fn set_niceness(who: libc::id_t, niceness: i32) -> Result<()> {
    // SAFETY: plain syscall on a valid PRIO_PROCESS target; no pointers.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, who, niceness) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        anyhow::bail!("setpriority({niceness}) failed: {err}");
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn apply_priority(priority: Priority) -> Result<()> {
    anyhow::bail!("thread priority {priority} is not supported on this platform")
}
