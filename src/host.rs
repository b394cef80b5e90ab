//! Host resource probes

use anyhow::{Context, Result};
use std::path::Path;

pub const GIB: u64 = 1024 * 1024 * 1024;

const MEMINFO: &str = "/proc/meminfo";

/// Number of logical CPUs, if it can be determined
pub fn cpu_count() -> Option<usize> {
    std::thread::available_parallelism().ok().map(std::num::NonZeroUsize::get)
}

/// `MemTotal` from `/proc/meminfo`, in bytes
pub fn mem_total() -> Option<u64> {
    let text = std::fs::read_to_string(MEMINFO).ok()?;
    parse_mem_total(&text)
}

/// Parse the `MemTotal:` line (reported in KiB)
pub fn parse_mem_total(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse::<u64>().ok())
        .map(|kib| kib * 1024)
}

/// Bytes available to unprivileged users on the filesystem holding `path`
#[cfg(unix)]
pub fn free_space(path: &Path) -> Result<u64> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).context("Invalid path")?;

    // SAFETY: statvfs is a standard POSIX call. We check the return value
    // before using the result.
    unsafe {
        let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
        if libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) != 0 {
            anyhow::bail!("statvfs failed for {}", path.display());
        }
        let stat = stat.assume_init();
        Ok(u64::from(stat.f_bavail) * stat.f_frsize)
    }
}

#[cfg(not(unix))]
pub fn free_space(_path: &Path) -> Result<u64> {
    anyhow::bail!("Disk space detection not supported on this platform")
}

/// Bytes as GiB with two decimals
pub fn gib(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / GIB as f64)
}
