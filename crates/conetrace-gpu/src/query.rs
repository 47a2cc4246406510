//! Timestamp queries.

use ash::vk;

use crate::device::RenderDevice;
use crate::error::Result;

/// Create a timestamp query pool with `count` slots.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_timestamp_query_pool<D: RenderDevice + ?Sized>(
    device: &D,
    count: u32,
) -> Result<vk::QueryPool> {
    let create_info = vk::QueryPoolCreateInfo::default()
        .query_type(vk::QueryType::TIMESTAMP)
        .query_count(count);

    device.create_query_pool(&create_info)
}

/// Raw start and end timestamps read back from a query pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimestampPair {
    pub start: u64,
    pub end: u64,
}

impl TimestampPair {
    /// Ticks between the two timestamps (zero if they are out of order).
    pub fn elapsed_ticks(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Elapsed time in nanoseconds given the device's `timestampPeriod`.
    pub fn elapsed_ns(&self, timestamp_period: f32) -> f64 {
        self.elapsed_ticks() as f64 * f64::from(timestamp_period)
    }

    /// Elapsed time in milliseconds given the device's `timestampPeriod`.
    pub fn elapsed_ms(&self, timestamp_period: f32) -> f64 {
        self.elapsed_ns(timestamp_period) / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_scales_by_period() {
        let pair = TimestampPair {
            start: 1_000,
            end: 3_000,
        };
        assert_eq!(pair.elapsed_ticks(), 2_000);
        assert!((pair.elapsed_ns(0.5) - 1_000.0).abs() < f64::EPSILON);
        assert!((pair.elapsed_ms(1.0) - 0.002).abs() < 1e-12);
    }

    #[test]
    fn reversed_timestamps_saturate() {
        let pair = TimestampPair { start: 10, end: 4 };
        assert_eq!(pair.elapsed_ticks(), 0);
    }
}
