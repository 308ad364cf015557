//! Reference model: saturating, threshold-limited accumulation.

use crate::config::DeviceParams;
use crate::error::Result;
use crate::invariant_ppt::{assert_invariant, MODEL_OVERFLOW_UNCLAMPED, MODEL_SATURATES};

/// Result of one model step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOutput {
    pub value: u64,
    pub overflow: bool,
}

/// Running sum clamped at the threshold.
///
/// Calls must follow the order in which inputs occurred at the device
/// boundary; reordering changes the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceModel {
    params: DeviceParams,
    sum: u64,
    steps: u64,
}

impl ReferenceModel {
    /// Fresh model (sum = 0) for validated parameters.
    pub fn new(params: &DeviceParams) -> Self {
        Self {
            params: *params,
            sum: 0,
            steps: 0,
        }
    }

    /// Build from raw boundary parameters, failing on an unset, negative or
    /// unrepresentable threshold.
    pub fn with_threshold(threshold: Option<i64>, bit_width: u32) -> Result<Self> {
        let params = DeviceParams::new(threshold, bit_width)?;
        Ok(Self::new(&params))
    }

    /// Feed one input value; returns the new accumulated value.
    pub fn apply(&mut self, input: u64) -> Result<ModelOutput> {
        let input = self.params.check_value(input)?;
        let threshold = self.params.threshold();
        // Both operands fit in 64 bits, so the unclamped sum fits in 128.
        let unclamped = self.sum as u128 + input as u128;
        let overflow = unclamped > threshold as u128;
        let value = if overflow { threshold } else { unclamped as u64 };

        assert_invariant(
            MODEL_SATURATES,
            value <= threshold,
            "accumulated value exceeds threshold",
            Some("ReferenceModel::apply"),
        );
        // The previous sum never exceeds the threshold, so the headroom
        // cannot underflow.
        let headroom = threshold - self.sum;
        assert_invariant(
            MODEL_OVERFLOW_UNCLAMPED,
            overflow == (input > headroom),
            "overflow must come from the unclamped sum",
            Some("ReferenceModel::apply"),
        );

        self.sum = value;
        self.steps += 1;
        Ok(ModelOutput { value, overflow })
    }

    /// Start over from zero for a new run.
    pub fn reset(&mut self) {
        self.sum = 0;
        self.steps = 0;
    }

    pub fn sum(&self) -> u64 {
        self.sum
    }

    /// Inputs accepted since construction or the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn threshold(&self) -> u64 {
        self.params.threshold()
    }

    pub fn params(&self) -> &DeviceParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use proptest::prelude::*;

    fn run(model: &mut ReferenceModel, inputs: &[u64]) -> Vec<ModelOutput> {
        inputs.iter().map(|&v| model.apply(v).unwrap()).collect()
    }

    #[test]
    fn saturates_at_threshold() {
        let mut model = ReferenceModel::with_threshold(Some(8), 4).unwrap();
        let out = run(&mut model, &[3, 4, 5]);
        assert_eq!(
            out.iter().map(|o| o.value).collect::<Vec<_>>(),
            vec![3, 7, 8]
        );
        assert_eq!(
            out.iter().map(|o| o.overflow).collect::<Vec<_>>(),
            vec![false, false, true]
        );
    }

    #[test]
    fn zeros_never_overflow() {
        let mut model = ReferenceModel::with_threshold(Some(15), 4).unwrap();
        let out = run(&mut model, &[0, 0, 0]);
        assert!(out.iter().all(|o| o.value == 0 && !o.overflow));
    }

    #[test]
    fn landing_exactly_on_threshold_is_not_overflow() {
        let mut model = ReferenceModel::with_threshold(Some(8), 4).unwrap();
        assert_eq!(
            model.apply(8).unwrap(),
            ModelOutput {
                value: 8,
                overflow: false
            }
        );
        // Saturated; any further non-zero input overflows.
        assert!(model.apply(1).unwrap().overflow);
        assert!(!model.apply(0).unwrap().overflow);
    }

    #[test]
    fn no_wraparound_at_full_width() {
        let mut model = ReferenceModel::with_threshold(Some(i64::MAX), 64).unwrap();
        model.apply(u64::MAX).unwrap();
        let out = model.apply(u64::MAX).unwrap();
        assert_eq!(out.value, i64::MAX as u64);
        assert!(out.overflow);
    }

    #[test]
    fn rejects_input_wider_than_bus() {
        let mut model = ReferenceModel::with_threshold(Some(8), 4).unwrap();
        assert_eq!(
            model.apply(16),
            Err(CheckError::ValueOutOfRange {
                value: 16,
                bit_width: 4
            })
        );
        assert_eq!(model.sum(), 0);
        assert_eq!(model.steps(), 0);
    }

    #[test]
    fn construction_fails_on_bad_threshold() {
        assert_eq!(
            ReferenceModel::with_threshold(None, 4),
            Err(CheckError::ThresholdUnset)
        );
        assert_eq!(
            ReferenceModel::with_threshold(Some(-3), 4),
            Err(CheckError::NegativeThreshold(-3))
        );
    }

    #[test]
    fn reset_restarts_from_zero() {
        let mut model = ReferenceModel::with_threshold(Some(8), 4).unwrap();
        model.apply(6).unwrap();
        model.reset();
        assert_eq!(model.steps(), 0);
        assert_eq!(model.apply(1).unwrap().value, 1);
        assert_eq!(model.steps(), 1);
    }

    proptest! {
        #[test]
        fn order_matters_only_through_the_sum(a in 0u64..16, b in 0u64..16) {
            let mut forward = ReferenceModel::with_threshold(Some(10), 4).unwrap();
            let mut backward = ReferenceModel::with_threshold(Some(10), 4).unwrap();
            forward.apply(a).unwrap();
            backward.apply(b).unwrap();
            // Saturation makes the final sum order-independent for two steps.
            prop_assert_eq!(forward.apply(b).unwrap().value, backward.apply(a).unwrap().value);
        }
    }
}
