use faultline_core::{ModelExecutor, RunLimits, RunnerConfig, StopReason, StrategyRunner};
use faultline_explore::generators::DepthFirstStrategy;
use faultline_model::{Behaviour, FailureMode, Fault, FaultInjectionPoint, FaultUid, Faultload};
use faultline_store::ImplicationsStore;

fn a() -> FaultUid {
    FaultUid::root(FaultInjectionPoint::new("A", "GET /", 0))
}

fn call(parent: &FaultUid, name: &str) -> FaultUid {
    parent.as_child(FaultInjectionPoint::new(name, format!("GET /{name}"), 0))
}

fn error(uid: FaultUid, status: u16) -> Behaviour {
    Behaviour::new(uid, Some(FailureMode::http_error(status)))
}

/// A calls B and C. Failures are absorbed unless `c_breaks_a`.
fn fan_out_model(c_breaks_a: bool) -> ImplicationsStore {
    let mut model = ImplicationsStore::new();
    model
        .add_downstream_requests(&a(), [call(&a(), "B"), call(&a(), "C")])
        .unwrap();
    if c_breaks_a {
        model
            .add_upstream_response([error(call(&a(), "C"), 500)], error(a(), 500))
            .unwrap();
    }
    model
}

fn single(uid: FaultUid, status: u16) -> Faultload {
    Faultload::new([Fault::new(uid, FailureMode::http_error(status))])
}

#[test]
fn test_depth_first_tries_every_combination() {
    let mut runner = StrategyRunner::depth_first(RunnerConfig::default(), vec![FailureMode::http_error(500)]);
    let mut executor = ModelExecutor::new(fan_out_model(false));
    let summary = runner.run(&mut executor).unwrap();

    assert_eq!(summary.executed.len(), 4);
    assert_eq!(summary.executed[1], single(call(&a(), "B"), 500));
    assert_eq!(summary.executed[2], single(call(&a(), "C"), 500));
    assert_eq!(summary.executed[3].len(), 2);
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
}

#[test]
fn test_depth_first_stops_at_first_failure() {
    let mut runner = StrategyRunner::depth_first(RunnerConfig::default(), vec![FailureMode::http_error(500)]);
    let mut executor = ModelExecutor::new(fan_out_model(true));
    let summary = runner.run(&mut executor).unwrap();

    assert_eq!(summary.executed.len(), 3);
    assert_eq!(summary.executed[2], single(call(&a(), "C"), 500));
}

#[test]
fn test_second_generator_does_not_repeat_executions() {
    let mut model = ImplicationsStore::new();
    model.add_downstream_requests(&a(), [call(&a(), "B")]).unwrap();

    let mut runner = StrategyRunner::depth_first(RunnerConfig::default(), vec![FailureMode::http_error(500)])
        .with_generator(DepthFirstStrategy::new());
    let mut executor = ModelExecutor::new(model);
    let summary = runner.run(&mut executor).unwrap();

    assert_eq!(
        summary.executed,
        vec![Faultload::empty(), single(call(&a(), "B"), 500)]
    );
    assert_eq!(executor.executions().len(), 2);
    assert_eq!(summary.pruned_by["duplicate"], 1);
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
}

#[test]
fn test_dynamic_explores_pairs_once() {
    let mut runner = StrategyRunner::dynamic(RunnerConfig::default(), vec![FailureMode::http_error(500)]);
    let mut executor = ModelExecutor::new(fan_out_model(false));
    let summary = runner.run(&mut executor).unwrap();

    assert_eq!(summary.executed.len(), 4);
    assert_eq!(summary.executed[3].len(), 2);
    assert_eq!(summary.generated, 3);

    let report = runner.report();
    assert_eq!(report["StrategyRunner"]["executed"], "4");
    assert_eq!(report["DynamicAnalysisStore"]["points"], "3");
    assert!(report.contains_key("DynamicExplorationGenerator"));
}

#[test]
fn test_test_case_limit() {
    let config = RunnerConfig {
        limits: RunLimits {
            max_test_cases: Some(2),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut runner = StrategyRunner::dynamic(config, vec![FailureMode::http_error(500)]);
    let mut executor = ModelExecutor::new(fan_out_model(false));
    let summary = runner.run(&mut executor).unwrap();

    assert_eq!(summary.executed.len(), 2);
    assert_eq!(summary.stop_reason, StopReason::TestCaseLimit);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["stop_reason"], "TestCaseLimit");
    assert_eq!(json["executed"][0], serde_json::json!([]));
}

#[test]
fn test_learns_propagation_along_a_chain() {
    let b = call(&a(), "B");
    let c = call(&b, "C");
    let mut model = ImplicationsStore::new();
    model.add_downstream_requests(&a(), [b.clone()]).unwrap();
    model.add_downstream_requests(&b, [c.clone()]).unwrap();
    model
        .add_upstream_response([error(c.clone(), 503)], error(b.clone(), 503))
        .unwrap();
    model
        .add_upstream_response([error(b.clone(), 503)], error(a(), 503))
        .unwrap();

    let mut runner = StrategyRunner::dynamic(RunnerConfig::default(), vec![FailureMode::http_error(503)]);
    let mut executor = ModelExecutor::new(model);
    let summary = runner.run(&mut executor).unwrap();

    assert_eq!(
        summary.executed,
        vec![Faultload::empty(), single(b.clone(), 503), single(c.clone(), 503)]
    );

    let predicted = runner.store().expected_behaviours(&single(c, 503));
    assert!(predicted.contains(&error(b, 503)));
    assert!(predicted.contains(&error(a(), 503)));
}
