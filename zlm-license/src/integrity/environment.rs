//! Probes over the process environment.
//!
//! Detects:
//! - Attached tracers (ptrace-based debuggers)
//! - Instrumentation frameworks mapped into the process (Frida, Xposed, Substrate)
//! - Libraries injected through the dynamic loader environment
//! - Debugger-sized stalls
//! - A modified executable
//!
//! These raise the bar; they do not stop an attacker with full control of
//! the machine.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::integrity::constant_time_eq;

/// Library name fragments of common instrumentation frameworks.
const INSTRUMENTATION_MARKERS: [&str; 6] = [
    "frida",
    "libgum",
    "gadget.so",
    "xposed",
    "substrate",
    "libsubstitute",
];

/// Loader variables that inject code into a process.
const PRELOAD_VARIABLES: [&str; 2] = ["LD_PRELOAD", "DYLD_INSERT_LIBRARIES"];

static EXE_DIGEST: OnceLock<Option<[u8; 32]>> = OnceLock::new();

/// Check /proc/self/status for a tracer (Linux/Android).
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(super) fn tracer_attached() -> bool {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return false;
    };
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|pid| pid.trim().parse::<u32>().ok())
        .is_some_and(|pid| pid != 0)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(super) fn tracer_attached() -> bool {
    false
}

/// Scan /proc/self/maps line by line for instrumentation libraries.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(super) fn instrumentation_mapped() -> bool {
    use std::io::{BufRead, BufReader};

    let Ok(file) = std::fs::File::open("/proc/self/maps") else {
        return false;
    };
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {
                let lower = line.to_ascii_lowercase();
                if INSTRUMENTATION_MARKERS.iter().any(|m| lower.contains(m)) {
                    return true;
                }
            }
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(super) fn instrumentation_mapped() -> bool {
    false
}

pub(super) fn preload_injected() -> bool {
    PRELOAD_VARIABLES
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

/// Rounds of the timing loop; each must stall before the probe trips.
const TIMING_ROUNDS: usize = 3;

/// Per-round stall threshold.
const TIMING_THRESHOLD: Duration = Duration::from_millis(100);

/// Breakpoints and single-stepping stall a loop that normally takes well
/// under a millisecond. One preempted round is scheduler noise.
pub(super) fn timing_anomaly() -> bool {
    all_rounds_stall(TIMING_ROUNDS, TIMING_THRESHOLD, timed_round)
}

fn timed_round() -> Duration {
    let start = Instant::now();
    let mut sum = 0u64;
    for i in 0..1000 {
        sum = sum.wrapping_add(i);
    }
    let elapsed = start.elapsed();
    std::hint::black_box(sum);
    elapsed
}

/// Stops measuring at the first round under `threshold`.
fn all_rounds_stall(
    rounds: usize,
    threshold: Duration,
    mut round: impl FnMut() -> Duration,
) -> bool {
    (0..rounds).all(|_| round() > threshold)
}

/// Compare the running executable against `expected`; the digest is
/// computed once per process.
pub(super) fn executable_modified(expected: Option<[u8; 32]>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    match EXE_DIGEST.get_or_init(compute_exe_digest) {
        Some(actual) => !constant_time_eq(&expected, actual),
        None => true,
    }
}

fn compute_exe_digest() -> Option<[u8; 32]> {
    let path = std::env::current_exe().ok()?;
    let mut file = std::fs::File::open(path).ok()?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).ok()?;
    Some(hasher.finalize().into())
}
