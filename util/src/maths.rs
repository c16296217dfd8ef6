//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Sign of the value, with zero mapping to zero (unlike `Float::signum`, 
/// which maps `+0.0` to `1.0`).
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value > T::zero() {
        T::one()
    }
    else if value < T::zero() {
        -T::one()
    }
    else {
        T::zero()
    }
}

/// Remove a dead-band of half-width `dead_band` from around zero.
///
/// Values with `|value| <= dead_band` map to exactly zero. Values outside the
/// band are shifted towards zero by `dead_band`, so the output is continuous
/// as the input crosses `±dead_band`.
pub fn apply_dead_band<T>(value: T, dead_band: T) -> T
where
    T: Float
{
    if value.abs() > dead_band {
        value - sign(value) * dead_band
    }
    else {
        T::zero()
    }
}
