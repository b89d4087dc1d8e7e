//! Default worker-thread count

use std::sync::OnceLock;

/// Thread ceiling for libaom encodes
pub const AOM_MAX_THREADS: u32 = 64;

static DEFAULT_MAX_THREADS: OnceLock<u32> = OnceLock::new();

/// Thread count used when a session asks for 0
///
/// The CPU count, read once per process. If it cannot be determined this is
/// 0, which libavif treats as single-threaded.
pub fn default_max_threads() -> u32 {
    *DEFAULT_MAX_THREADS.get_or_init(detect_cpu_count)
}

fn detect_cpu_count() -> u32 {
    match std::thread::available_parallelism() {
        Ok(n) => u32::try_from(n.get()).unwrap_or(u32::MAX),
        Err(err) => {
            log::warn!("could not get cpu count: using max_threads=1 ({err})");
            0
        }
    }
}

/// Replace 0 with [`default_max_threads`]
pub fn resolve_max_threads(requested: u32) -> u32 {
    if requested == 0 {
        default_max_threads()
    } else {
        requested
    }
}

/// Apply the libaom thread ceiling when encoding with aom
pub(crate) fn cap_for_aom(max_threads: u32, is_aom: bool) -> u32 {
    if is_aom {
        max_threads.min(AOM_MAX_THREADS)
    } else {
        max_threads
    }
}

/// libavif stores thread counts as `int`
pub(crate) fn native_threads(max_threads: u32) -> i32 {
    i32::try_from(max_threads).unwrap_or(i32::MAX)
}
