//! Log-domain helpers. Every probability that reaches the grammar or the
//! search is converted here first; scores are natural logarithms stored as
//! `f32`.

/// `log(1)`.
pub const LOG_ONE: f32 = 0.0;

/// `log(0)`: an impossible transition.
pub const LOG_ZERO: f32 = f32::NEG_INFINITY;

/// Converts a linear probability to the log domain.
///
/// Non-positive inputs map to [`LOG_ZERO`]. Values above one are allowed
/// (the forward-jump-to-final weight can exceed one by construction) and map
/// to positive log values. NaN is rejected by config validation before it can
/// reach this function, but is still mapped to [`LOG_ZERO`] here.
pub fn linear_to_log(p: f64) -> f32 {
    if p.is_nan() || p <= 0.0 {
        return LOG_ZERO;
    }
    p.ln() as f32
}

pub fn log_to_linear(log_p: f32) -> f64 {
    (log_p as f64).exp()
}
