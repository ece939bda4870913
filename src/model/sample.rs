//! Position sample: one point-in-time reading supplied by the host.

/// A point-in-time position reading, written as one CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    /// Where the sample was taken (level or room name).
    pub label: String,

    pub x: f32,
    pub y: f32,

    /// Elapsed session time, in seconds.
    pub session_time: f64,

    /// Running counter reported by the host (deaths so far).
    pub deaths: u32,
}
