//! Log2 histogram bucket sizing

use crate::error::ConfigError;

/// Number of log2 buckets needed so that `bound` still lands in range.
///
/// Returns `ceil(log2(bound))`. `name` labels the bound in the error raised
/// for a non-positive value.
pub fn log2_bucket_count(name: &'static str, bound: u64) -> Result<u32, ConfigError> {
    match bound {
        0 => Err(ConfigError::InvalidBound { name, value: bound }),
        1 => Ok(0),
        // Bit length of (bound - 1) is ceil(log2(bound)) without float rounding
        _ => Ok(u64::BITS - (bound - 1).leading_zeros()),
    }
}
