use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Track codec metrics without external dependencies.
pub(crate) struct Metrics;

static VALUES_ENCODED: AtomicU64 = AtomicU64::new(0);
static BYTES_ENCODED: AtomicU64 = AtomicU64::new(0);
static VALUES_DECODED: AtomicU64 = AtomicU64::new(0);
static BYTES_DECODED: AtomicU64 = AtomicU64::new(0);
static ENCODE_ERRORS: AtomicU64 = AtomicU64::new(0);
static DECODE_ERRORS: AtomicU64 = AtomicU64::new(0);
static UNKNOWN_CLASSES: AtomicU64 = AtomicU64::new(0);
static BACK_REFERENCES: AtomicU64 = AtomicU64::new(0);
static ENCODE_LATENCY_TOTAL_NS: AtomicU64 = AtomicU64::new(0);
static ENCODE_LATENCY_MAX_NS: AtomicU64 = AtomicU64::new(0);
static DECODE_LATENCY_TOTAL_NS: AtomicU64 = AtomicU64::new(0);
static DECODE_LATENCY_MAX_NS: AtomicU64 = AtomicU64::new(0);

const NANOSECONDS_PER_MICROSECOND: u128 = 1_000;

impl Metrics {
    #[inline]
    pub(crate) fn record_encode(bytes: usize, elapsed: Duration) {
        VALUES_ENCODED.fetch_add(1, Ordering::Relaxed);
        BYTES_ENCODED.fetch_add(saturating_u64(bytes), Ordering::Relaxed);
        let nanos = nanos(elapsed);
        ENCODE_LATENCY_TOTAL_NS.fetch_add(nanos, Ordering::Relaxed);
        update_max(&ENCODE_LATENCY_MAX_NS, nanos);
    }

    #[inline]
    pub(crate) fn record_decode(bytes: usize, elapsed: Duration) {
        VALUES_DECODED.fetch_add(1, Ordering::Relaxed);
        BYTES_DECODED.fetch_add(saturating_u64(bytes), Ordering::Relaxed);
        let nanos = nanos(elapsed);
        DECODE_LATENCY_TOTAL_NS.fetch_add(nanos, Ordering::Relaxed);
        update_max(&DECODE_LATENCY_MAX_NS, nanos);
    }

    #[inline]
    pub(crate) fn record_encode_error() {
        ENCODE_ERRORS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_decode_error() {
        DECODE_ERRORS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_unknown_class() {
        UNKNOWN_CLASSES.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_back_reference() {
        BACK_REFERENCES.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn totals() -> MetricsSnapshot {
        MetricsSnapshot {
            values_encoded: VALUES_ENCODED.load(Ordering::Relaxed),
            bytes_encoded: BYTES_ENCODED.load(Ordering::Relaxed),
            values_decoded: VALUES_DECODED.load(Ordering::Relaxed),
            bytes_decoded: BYTES_DECODED.load(Ordering::Relaxed),
            encode_errors: ENCODE_ERRORS.load(Ordering::Relaxed),
            decode_errors: DECODE_ERRORS.load(Ordering::Relaxed),
            unknown_classes: UNKNOWN_CLASSES.load(Ordering::Relaxed),
            back_references: BACK_REFERENCES.load(Ordering::Relaxed),
            encode_latency_total_ns: ENCODE_LATENCY_TOTAL_NS.load(Ordering::Relaxed),
            encode_latency_max_ns: ENCODE_LATENCY_MAX_NS.load(Ordering::Relaxed),
            decode_latency_total_ns: DECODE_LATENCY_TOTAL_NS.load(Ordering::Relaxed),
            decode_latency_max_ns: DECODE_LATENCY_MAX_NS.load(Ordering::Relaxed),
        }
    }
}

fn saturating_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn nanos(duration: Duration) -> u64 {
    duration.as_nanos().try_into().unwrap_or(u64::MAX)
}

fn update_max(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while candidate > current {
        match target.compare_exchange_weak(
            current,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(old) => current = old,
        }
    }
}

/// Lightweight snapshot of process-wide codec counters.
///
/// Counters are shared by every encoder and decoder in the process and only
/// ever grow.
#[derive(Default, Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    /// Top-level values written
    pub values_encoded: u64,
    /// Bytes written by successful encodes
    pub bytes_encoded: u64,
    /// Top-level values read
    pub values_decoded: u64,
    /// Bytes consumed by successful decodes
    pub bytes_decoded: u64,
    /// Failed encodes
    pub encode_errors: u64,
    /// Failed decodes
    pub decode_errors: u64,
    /// Class definitions read with no local registration
    pub unknown_classes: u64,
    /// Back-references written or resolved
    pub back_references: u64,
    /// Sum of encode durations
    pub encode_latency_total_ns: u64,
    /// Slowest encode
    pub encode_latency_max_ns: u64,
    /// Sum of decode durations
    pub decode_latency_total_ns: u64,
    /// Slowest decode
    pub decode_latency_max_ns: u64,
}

impl MetricsSnapshot {
    /// Average encode latency in microseconds.
    #[must_use]
    pub fn avg_encode_latency_us(&self) -> Option<u64> {
        average_microseconds(self.encode_latency_total_ns, self.values_encoded)
    }

    /// Average decode latency in microseconds.
    #[must_use]
    pub fn avg_decode_latency_us(&self) -> Option<u64> {
        average_microseconds(self.decode_latency_total_ns, self.values_decoded)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn average_microseconds(total_ns: u64, count: u64) -> Option<u64> {
    if count == 0 {
        return None;
    }

    let total_ns_u128 = u128::from(total_ns);
    Some((total_ns_u128 / (u128::from(count) * NANOSECONDS_PER_MICROSECOND)) as u64)
}
