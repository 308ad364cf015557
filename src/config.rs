//! Run configuration: device parameters, seed, timeout and traffic mode.

use std::env;
use std::time::Duration;

use crate::error::{CheckError, Result};
use crate::vseq::TrafficMode;

/// Data width used when the device does not say otherwise.
pub const DEFAULT_DATA_W: u32 = 4;
/// Threshold used when the device does not say otherwise.
pub const DEFAULT_THRESHOLD: i64 = 8;
/// Accumulator target for the infinite accumulate mode.
pub const DEFAULT_ACCUMULATE_TARGET: u64 = 105;
/// Accumulator target for the reactive accumulate mode.
pub const DEFAULT_REACTIVE_TARGET: u64 = 100;
/// Sequence count for the rand-N mode.
pub const DEFAULT_RAND_N: u32 = 105;
/// Sequence count for the reactive rand-N mode.
pub const DEFAULT_REACTIVE_RAND_N: u32 = 50;
/// Repeats of the default producer/consumer pair.
pub const DEFAULT_REPEATS: u32 = 5;
/// Wall-clock guard around a traffic mode.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_THRESHOLD: &str = "SATCHECK_THRESHOLD";
pub const ENV_DATA_W: &str = "SATCHECK_DATA_W";
pub const ENV_SEED: &str = "SATCHECK_SEED";

/// Run-scoped device parameters, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceParams {
    threshold: u64,
    bit_width: u32,
}

impl DeviceParams {
    /// Validate raw boundary parameters.
    ///
    /// An unset or negative threshold has no degraded mode and is rejected,
    /// as is a threshold the data bus cannot represent.
    pub fn new(threshold: Option<i64>, bit_width: u32) -> Result<Self> {
        if bit_width == 0 || bit_width > 64 {
            return Err(CheckError::InvalidBitWidth(bit_width));
        }
        let threshold = threshold.ok_or(CheckError::ThresholdUnset)?;
        if threshold < 0 {
            return Err(CheckError::NegativeThreshold(threshold));
        }
        let threshold = threshold as u64;
        let params = Self {
            threshold,
            bit_width,
        };
        if threshold > params.max_value() {
            return Err(CheckError::ThresholdOutOfRange {
                threshold,
                bit_width,
            });
        }
        Ok(params)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    /// Largest value representable on the data bus.
    pub fn max_value(&self) -> u64 {
        if self.bit_width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bit_width) - 1
        }
    }

    /// Reject values wider than the data bus.
    pub fn check_value(&self, value: u64) -> Result<u64> {
        if value > self.max_value() {
            Err(CheckError::ValueOutOfRange {
                value,
                bit_width: self.bit_width,
            })
        } else {
            Ok(value)
        }
    }
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD as u64,
            bit_width: DEFAULT_DATA_W,
        }
    }
}

/// Everything a bench run needs besides the device itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub params: DeviceParams,
    pub seed: u64,
    pub run_timeout: Duration,
    pub mode: TrafficMode,
}

impl BenchConfig {
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::new()
    }

    /// Defaults overlaid with `SATCHECK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut builder = BenchConfigBuilder::new();
        if let Some(threshold) = read_env::<i64>(ENV_THRESHOLD)? {
            builder = builder.threshold(threshold);
        }
        if let Some(bit_width) = read_env::<u32>(ENV_DATA_W)? {
            builder = builder.bit_width(bit_width);
        }
        if let Some(seed) = read_env::<u64>(ENV_SEED)? {
            builder = builder.seed(seed);
        }
        builder.build()
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            params: DeviceParams::default(),
            seed: 0,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            mode: TrafficMode::default(),
        }
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CheckError::InvalidConfig(format!("{}={:?} is not a valid value", key, raw))),
        Err(_) => Ok(None),
    }
}

/// Builder for [`BenchConfig`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct BenchConfigBuilder {
    threshold: Option<i64>,
    bit_width: u32,
    seed: u64,
    run_timeout: Duration,
    mode: TrafficMode,
}

impl BenchConfigBuilder {
    pub fn new() -> Self {
        Self {
            threshold: Some(DEFAULT_THRESHOLD),
            bit_width: DEFAULT_DATA_W,
            seed: 0,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            mode: TrafficMode::default(),
        }
    }

    pub fn threshold(mut self, threshold: i64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Leave the threshold unconfigured; `build` will reject it.
    pub fn without_threshold(mut self) -> Self {
        self.threshold = None;
        self
    }

    pub fn bit_width(mut self, bit_width: u32) -> Self {
        self.bit_width = bit_width;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn mode(mut self, mode: TrafficMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> Result<BenchConfig> {
        let params = DeviceParams::new(self.threshold, self.bit_width)?;
        if self.run_timeout.is_zero() {
            return Err(CheckError::InvalidConfig("run timeout must be non-zero".into()));
        }
        Ok(BenchConfig {
            params,
            seed: self.seed,
            run_timeout: self.run_timeout,
            mode: self.mode,
        })
    }
}

impl Default for BenchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_reject_unset_threshold() {
        assert_eq!(DeviceParams::new(None, 4), Err(CheckError::ThresholdUnset));
    }

    #[test]
    fn params_reject_negative_threshold() {
        assert_eq!(
            DeviceParams::new(Some(-1), 4),
            Err(CheckError::NegativeThreshold(-1))
        );
    }

    #[test]
    fn params_reject_threshold_wider_than_bus() {
        assert_eq!(
            DeviceParams::new(Some(16), 4),
            Err(CheckError::ThresholdOutOfRange {
                threshold: 16,
                bit_width: 4
            })
        );
        assert!(DeviceParams::new(Some(15), 4).is_ok());
    }

    #[test]
    fn params_reject_bad_width() {
        assert_eq!(DeviceParams::new(Some(1), 0), Err(CheckError::InvalidBitWidth(0)));
        assert_eq!(DeviceParams::new(Some(1), 65), Err(CheckError::InvalidBitWidth(65)));
    }

    #[test]
    fn full_width_bus() {
        let params = DeviceParams::new(Some(i64::MAX), 64).unwrap();
        assert_eq!(params.max_value(), u64::MAX);
        assert!(params.check_value(u64::MAX).is_ok());
    }

    #[test]
    fn check_value_bounds() {
        let params = DeviceParams::default();
        assert_eq!(params.check_value(15), Ok(15));
        assert_eq!(
            params.check_value(16),
            Err(CheckError::ValueOutOfRange {
                value: 16,
                bit_width: 4
            })
        );
    }

    #[test]
    fn builder_defaults_match_default() {
        let built = BenchConfig::builder().build().unwrap();
        assert_eq!(built, BenchConfig::default());
    }

    #[test]
    fn builder_rejects_missing_threshold() {
        let err = BenchConfig::builder().without_threshold().build().unwrap_err();
        assert_eq!(err, CheckError::ThresholdUnset);
    }

    #[test]
    fn env_values_must_parse() {
        env::set_var("SATCHECK_CONFIG_TEST_GARBAGE", "eight");
        assert!(matches!(
            read_env::<u64>("SATCHECK_CONFIG_TEST_GARBAGE"),
            Err(CheckError::InvalidConfig(_))
        ));
        assert_eq!(read_env::<u64>("SATCHECK_CONFIG_TEST_UNSET").unwrap(), None);
        env::set_var("SATCHECK_CONFIG_TEST_NUMBER", " 12 ");
        assert_eq!(read_env::<i64>("SATCHECK_CONFIG_TEST_NUMBER").unwrap(), Some(12));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = BenchConfig::builder()
            .run_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, CheckError::InvalidConfig(_)));
    }
}
