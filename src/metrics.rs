//! Prometheus metrics collection for trellisd.
//!
//! Tracks session population, frame throughput, dispatch latency, fan-out
//! sizes, and error rates. Exposed on the gateway's `/metrics` endpoint.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry for all metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    // ========================================================================
    // Counters (monotonic increasing)
    // ========================================================================

    /// Total frames received from clients.
    pub static ref FRAMES_IN: IntCounter = IntCounter::new(
        "trellis_frames_in_total",
        "Frames received from clients"
    ).unwrap();

    /// Total frames written to clients.
    pub static ref FRAMES_OUT: IntCounter = IntCounter::new(
        "trellis_frames_out_total",
        "Frames sent to clients"
    ).unwrap();

    /// Total chat messages persisted.
    pub static ref MESSAGES_PERSISTED: IntCounter = IntCounter::new(
        "trellis_messages_persisted_total",
        "Chat messages written to the store"
    ).unwrap();

    /// Total notifications pushed live to an online owner.
    pub static ref NOTIFICATIONS_PUSHED: IntCounter = IntCounter::new(
        "trellis_notifications_pushed_total",
        "Notifications delivered over a live session"
    ).unwrap();

    /// Total sessions displaced by a newer connection for the same user.
    pub static ref SESSIONS_DISPLACED: IntCounter = IntCounter::new(
        "trellis_sessions_displaced_total",
        "Sessions evicted by a newer session for the same user"
    ).unwrap();

    /// Total sessions closed because their outbound queue saturated.
    pub static ref QUEUE_OVERFLOWS: IntCounter = IntCounter::new(
        "trellis_queue_overflows_total",
        "Sessions closed as slow consumers"
    ).unwrap();

    // ========================================================================
    // Gauges (can increase/decrease)
    // ========================================================================

    /// Currently registered sessions.
    pub static ref SESSIONS_ONLINE: IntGauge = IntGauge::new(
        "trellis_sessions_online",
        "Currently registered sessions"
    ).unwrap();

    // ========================================================================
    // Vectors
    // ========================================================================

    /// Dispatch latency per frame type.
    pub static ref DISPATCH_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "trellis_dispatch_seconds",
            "Frame dispatch latency"
        ),
        &["frame_type"]
    ).unwrap();

    /// Handler errors per frame type and stable error code.
    pub static ref FRAME_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("trellis_frame_errors_total", "Handler errors"),
        &["frame_type", "code"]
    ).unwrap();

    /// Presence fan-out deliveries per transition direction.
    pub static ref PRESENCE_FANOUT: IntCounterVec = IntCounterVec::new(
        Opts::new("trellis_presence_fanout_total", "Presence events fanned out"),
        &["direction"]
    ).unwrap();
}

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
/// Registration failures only occur on double-init, which is a programming
/// error, so they are ignored here.
pub fn init() {
    let _ = REGISTRY.register(Box::new(FRAMES_IN.clone()));
    let _ = REGISTRY.register(Box::new(FRAMES_OUT.clone()));
    let _ = REGISTRY.register(Box::new(MESSAGES_PERSISTED.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATIONS_PUSHED.clone()));
    let _ = REGISTRY.register(Box::new(SESSIONS_DISPLACED.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_OVERFLOWS.clone()));
    let _ = REGISTRY.register(Box::new(SESSIONS_ONLINE.clone()));
    let _ = REGISTRY.register(Box::new(DISPATCH_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(FRAME_ERRORS.clone()));
    let _ = REGISTRY.register(Box::new(PRESENCE_FANOUT.clone()));
}

/// Record a completed dispatch for latency tracking.
pub fn record_dispatch(frame_type: &str, seconds: f64) {
    DISPATCH_SECONDS
        .with_label_values(&[frame_type])
        .observe(seconds);
}

/// Record a handler error by frame type and stable code.
pub fn record_frame_error(frame_type: &str, code: &str) {
    FRAME_ERRORS.with_label_values(&[frame_type, code]).inc();
}

/// Record presence fan-out deliveries.
pub fn record_presence_fanout(direction: &str, recipients: usize) {
    PRESENCE_FANOUT
        .with_label_values(&[direction])
        .inc_by(recipients as u64);
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
