//! Contract tests: drive the engine and check the invariants it relies on
//! were actually asserted along the way.

use satcheck::config::BenchConfig;
use satcheck::harness::Bench;
use satcheck::invariant_ppt::{
    contract_test, ACTIVE_ONE_WAY, MODEL_OVERFLOW_UNCLAMPED, MODEL_SATURATES,
    MONITOR_SINGLE_WRITER, PIPELINE_ARRIVAL_ORDER, QUEUE_SINGLE_SLOT, RUN_END_GATE,
    SAMPLER_TAGS_ORIGIN, SCOREBOARD_INDEX_PAIRED, SUPERVISOR_ONE_IN_FLIGHT, TALLY_BALANCED,
    TERMINATION_AT_TARGET,
};
use satcheck::model::ReferenceModel;
use satcheck::sim::SimDevice;
use satcheck::vseq::TrafficMode;

#[test]
fn contract_model_saturation() {
    let mut model = ReferenceModel::with_threshold(Some(8), 4).unwrap();
    model.apply(7).unwrap();
    model.apply(7).unwrap();
    contract_test(
        "model saturation",
        &[MODEL_SATURATES, MODEL_OVERFLOW_UNCLAMPED],
    );
}

#[test]
fn contract_checking_fabric() {
    let config = BenchConfig::builder()
        .mode(TrafficMode::Default { repeats: 3 })
        .build()
        .unwrap();
    let sim = SimDevice::new(config.params);
    let report = Bench::new(config).run_blocking(&sim).unwrap();
    report.check().unwrap();
    contract_test(
        "checking fabric",
        &[
            QUEUE_SINGLE_SLOT,
            SAMPLER_TAGS_ORIGIN,
            PIPELINE_ARRIVAL_ORDER,
            SCOREBOARD_INDEX_PAIRED,
            TALLY_BALANCED,
            RUN_END_GATE,
        ],
    );
}

#[test]
fn contract_supervisor() {
    let config = BenchConfig::builder()
        .mode(TrafficMode::InfiniteAccumulate { target: 20 })
        .build()
        .unwrap();
    let sim = SimDevice::new(config.params);
    Bench::new(config).run_blocking(&sim).unwrap();
    contract_test(
        "supervisor",
        &[
            SUPERVISOR_ONE_IN_FLIGHT,
            MONITOR_SINGLE_WRITER,
            ACTIVE_ONE_WAY,
            TERMINATION_AT_TARGET,
        ],
    );
}
