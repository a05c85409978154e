//! Fail-fast validation
//!
//! The check reports the first violation and stops; it never looks at the
//! elements after it. Whether that stops the process is the caller's call.

use crate::error::DemoError;

/// First negative element found by [`sum_non_negative`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvariantViolation {
    /// Position of the offending element
    pub index: usize,

    /// The offending value
    pub value: f64,

    /// Sum of the elements before `index`
    pub partial_total: f64,
}

impl From<InvariantViolation> for DemoError {
    fn from(v: InvariantViolation) -> Self {
        Self::InvariantViolated {
            index: v.index,
            value: v.value,
            partial_total: v.partial_total,
        }
    }
}

/// Sum `values`, requiring every element to be `>= 0.0`
///
/// # Errors
///
/// Returns the first [`InvariantViolation`]; nothing past it is summed.
pub fn sum_non_negative(values: &[f64]) -> Result<f64, InvariantViolation> {
    values
        .iter()
        .enumerate()
        .try_fold(0.0_f64, |total, (index, &value)| {
            if value >= 0.0 {
                Ok(total + value)
            } else {
                Err(InvariantViolation {
                    index,
                    value,
                    partial_total: total,
                })
            }
        })
}
