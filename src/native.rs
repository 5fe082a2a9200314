//! Native routines: compiled, performance-oriented functions that the native
//! task calls into. The runner treats them as opaque through
//! [`NativeRoutine`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    #[error("{routine}: result for input {input} does not fit into 64 bits")]
    Overflow { routine: &'static str, input: i64 },
}

/// An integer function implemented outside of the interpreted side.
pub trait NativeRoutine: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    fn call(&self, input: i64) -> Result<i64, NativeError>;
}

/// The "heavy" compute routine: `x * x + 42`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeavyCompute;

impl NativeRoutine for HeavyCompute {
    fn name(&self) -> &'static str {
        "heavy_compute"
    }

    fn call(&self, input: i64) -> Result<i64, NativeError> {
        heavy_compute(input)
    }
}

pub fn heavy_compute(x: i64) -> Result<i64, NativeError> {
    x.checked_mul(x)
        .and_then(|square| square.checked_add(42))
        .ok_or(NativeError::Overflow {
            routine: "heavy_compute",
            input: x,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn heavy_compute_values() {
        check!(heavy_compute(7) == Ok(91));
        check!(heavy_compute(0) == Ok(42));
        check!(heavy_compute(-3) == Ok(51));
        check!(HeavyCompute.call(7) == heavy_compute(7));
    }

    #[test]
    fn heavy_compute_overflow() {
        check!(
            heavy_compute(i64::MAX)
                == Err(NativeError::Overflow {
                    routine: "heavy_compute",
                    input: i64::MAX
                })
        );
        // largest input whose square fits into i64
        check!(heavy_compute(3_037_000_499).is_ok());
        check!(heavy_compute(3_037_000_500).is_err());
    }
}
