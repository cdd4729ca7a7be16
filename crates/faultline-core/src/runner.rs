use std::collections::{BTreeMap, HashSet};

use faultline_explore::analyzers::{
    ConcurrencyDetector, ConditionalPointDetector, ErrorPropagationDetector, HappensBeforeNeighbourDetector,
    HappyPathDetector, ParentChildDetector, RedundancyAnalyzer, StatusAnalyzer, TimingAnalyzer,
};
use faultline_explore::generators::{DepthFirstStrategy, DynamicExplorationGenerator};
use faultline_explore::pruners::{
    DynamicReductionPruner, FailStopPruner, FaultloadSizePruner, NoImpactPruner, UnreachabilityPruner,
};
use faultline_explore::{Analyzer, FaultloadResult, FeedbackContext, Generator, Pruner};
use faultline_model::{FailureMode, Faultload};
use faultline_store::{DynamicAnalysisStore, PruneDecision};
use faultline_trace::TraversalStrategy;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{LimitChecker, RunnerConfig, StopReason};
use crate::executor::{Executor, ExecutorError};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
    #[error("No generator registered")]
    NoGenerator,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    /// Executed faultloads in order, the initial empty one first.
    pub executed: Vec<Faultload>,
    /// Candidates handed out by generators.
    pub generated: u64,
    /// Candidates rejected by pruners.
    pub pruned: u64,
    /// Pruned candidates per pruner, or per comma-joined group of pruners
    /// that agreed.
    pub pruned_by: BTreeMap<String, u64>,
    pub elapsed_secs: f64,
}

/// Statistics key for candidates that were already executed.
const DUPLICATE: &str = "duplicate";

#[derive(Debug, Default)]
struct PruneStatistics {
    generated: u64,
    pruned: u64,
    pruned_by: BTreeMap<String, u64>,
}

impl PruneStatistics {
    fn record(&mut self, pruners: Vec<&'static str>) {
        self.pruned += 1;
        let key = match pruners.as_slice() {
            [single] => single.to_string(),
            _ => {
                let mut names = pruners;
                names.sort_unstable();
                names.join(", ")
            }
        };
        *self.pruned_by.entry(key).or_insert(0) += 1;
    }
}

/// Drives the generate, execute, learn loop.
///
/// The first faultload is always the empty one. Every later candidate comes
/// from the active generator, which consults the pruners before handing it
/// out; when a generator runs dry the next one takes over.
pub struct StrategyRunner {
    config: RunnerConfig,
    store: DynamicAnalysisStore,
    generators: Vec<Box<dyn Generator>>,
    active: usize,
    analyzers: Vec<Box<dyn Analyzer>>,
    pruners: Vec<Box<dyn Pruner>>,
    limits: LimitChecker,
    started: bool,
    stop_reason: Option<StopReason>,
    executed: Vec<Faultload>,
    seen: HashSet<Faultload>,
    stats: PruneStatistics,
}

impl StrategyRunner {
    /// A runner without generators or analyzers. The size limit and
    /// fail-stop settings register their pruners here.
    pub fn new(config: RunnerConfig, modes: Vec<FailureMode>) -> Self {
        let mut pruners: Vec<Box<dyn Pruner>> = Vec::new();
        if let Some(max) = config.limits.max_faultload_size {
            pruners.push(Box::new(FaultloadSizePruner::new(max)));
        }
        if config.fail_stop {
            pruners.push(Box::new(FailStopPruner::new()));
        }

        Self {
            limits: LimitChecker::new(config.limits.clone()),
            config,
            store: DynamicAnalysisStore::new(modes),
            generators: Vec::new(),
            active: 0,
            analyzers: Vec::new(),
            pruners,
            started: false,
            stop_reason: None,
            executed: Vec::new(),
            seen: HashSet::new(),
            stats: PruneStatistics::default(),
        }
    }

    /// Feedback-driven exploration with every analyzer and pruner.
    pub fn dynamic(config: RunnerConfig, modes: Vec<FailureMode>) -> Self {
        let strategy = TraversalStrategy::new(config.traversal).with_seed(config.seed);
        let generator = DynamicExplorationGenerator::new(strategy, config.breadth_first);
        let optimize_for_retries = config.optimize_for_retries;
        let optimize_for_impactless = config.optimize_for_impactless;

        Self::new(config, modes)
            .with_generator(generator)
            .with_analyzer(HappyPathDetector::new())
            .with_analyzer(ParentChildDetector::new())
            .with_analyzer(HappensBeforeNeighbourDetector::new())
            .with_analyzer(ErrorPropagationDetector::new())
            .with_analyzer(ConditionalPointDetector::new(optimize_for_retries))
            .with_analyzer(RedundancyAnalyzer::new())
            .with_analyzer(TimingAnalyzer::new())
            .with_analyzer(StatusAnalyzer::new())
            .with_analyzer(ConcurrencyDetector::new())
            .with_pruner(DynamicReductionPruner::new())
            .with_pruner(UnreachabilityPruner::new())
            .with_pruner(NoImpactPruner::new(optimize_for_impactless))
    }

    /// Every combination of the happy path's points, stopping at the first
    /// failure.
    pub fn depth_first(config: RunnerConfig, modes: Vec<FailureMode>) -> Self {
        Self::new(config, modes)
            .with_generator(DepthFirstStrategy::new())
            .with_analyzer(HappyPathDetector::new())
            .with_analyzer(RedundancyAnalyzer::new())
    }

    pub fn with_generator(mut self, generator: impl Generator + 'static) -> Self {
        self.generators.push(Box::new(generator));
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl Analyzer + 'static) -> Self {
        self.analyzers.push(Box::new(analyzer));
        self
    }

    pub fn with_pruner(mut self, pruner: impl Pruner + 'static) -> Self {
        self.pruners.push(Box::new(pruner));
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn store(&self) -> &DynamicAnalysisStore {
        &self.store
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn executed(&self) -> &[Faultload] {
        &self.executed
    }

    /// Ask the run to end. The current iteration still completes; the next
    /// call to [`next_faultload`](Self::next_faultload) returns `None`.
    pub fn request_stop(&mut self) {
        self.stop(StopReason::Aborted);
    }

    fn stop(&mut self, reason: StopReason) {
        if self.stop_reason.is_none() {
            info!(?reason, executed = self.executed.len(), "stopping run");
            self.stop_reason = Some(reason);
        }
    }

    /// The next faultload to execute, or `None` once the run is over.
    pub fn next_faultload(&mut self) -> Option<Faultload> {
        if !self.started {
            self.started = true;
            return Some(Faultload::empty());
        }
        if self.stop_reason.is_some() {
            return None;
        }
        if let Some(reason) = self.limits.check(self.executed.len() as u64) {
            self.stop(reason);
            return None;
        }

        let next = self.generate();
        if next.is_none() {
            self.stop(StopReason::Exhausted);
        }
        next
    }

    fn generate(&mut self) -> Option<Faultload> {
        let check_all = self.config.check_all_pruners;
        while self.active < self.generators.len() {
            let store = &self.store;
            let pruners = &self.pruners;
            let seen = &self.seen;
            let stats = &mut self.stats;
            // Generators only deduplicate their own output.
            let mut prune = |faultload: &Faultload| {
                if seen.contains(faultload) {
                    debug!(%faultload, "already executed");
                    stats.record(vec![DUPLICATE]);
                    return PruneDecision::Prune;
                }
                evaluate_pruners(pruners, store, faultload, check_all, stats)
            };

            if let Some(next) = self.generators[self.active].generate(store, &mut prune) {
                self.stats.generated += 1;
                debug!(faultload = %next, "generated candidate");
                return Some(next);
            }

            info!(generator = self.generators[self.active].name(), "generator exhausted");
            self.active += 1;
        }
        None
    }

    /// Learn from one finished execution.
    pub fn handle_result(&mut self, result: FaultloadResult) {
        self.executed.push(result.faultload.clone());
        self.seen.insert(result.faultload.clone());
        self.store.add_historic_result(
            result.trace.injected_faults().clone(),
            result.trace.behaviours().to_vec(),
        );

        if !result.passed && self.config.fail_stop {
            info!(faultload = %result.faultload, "failure found");
            self.stop(StopReason::FailStop);
            return;
        }
        if result.is_initial() && !result.trace.reported_faults().is_empty() {
            warn!(faults = result.trace.reported_faults().len(), "initial run already reports faults");
            self.stop(StopReason::InitialRunFaulty);
            return;
        }
        if result.trace.is_invalid() {
            warn!(faultload = %result.faultload, "invalid trace, skipping feedback");
            return;
        }

        let mut context = FeedbackContext::new(&mut self.store);
        for generator in &mut self.generators {
            generator.handle_feedback(&result, &mut context);
        }
        for analyzer in &mut self.analyzers {
            analyzer.handle_feedback(&result, &mut context);
        }
        for pruner in &mut self.pruners {
            pruner.handle_feedback(&result, &mut context);
        }

        for faults in context.into_explore_requests() {
            for generator in &mut self.generators {
                generator.explore_from(faults.clone());
            }
        }
    }

    /// Run until the generators are exhausted or a limit is hit.
    pub fn run(&mut self, executor: &mut dyn Executor) -> Result<RunSummary, RunnerError> {
        if self.generators.is_empty() {
            return Err(RunnerError::NoGenerator);
        }

        while let Some(faultload) = self.next_faultload() {
            debug!(%faultload, "executing");
            let execution = executor.execute(&faultload)?;
            self.handle_result(FaultloadResult::new(faultload, execution.trace, execution.passed));
        }
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            stop_reason: self.stop_reason.unwrap_or(StopReason::Exhausted),
            executed: self.executed.clone(),
            generated: self.stats.generated,
            pruned: self.stats.pruned,
            pruned_by: self.stats.pruned_by.clone(),
            elapsed_secs: self.limits.elapsed_secs(),
        }
    }

    /// Every component's report keyed by component name, plus the store's
    /// and the runner's own.
    pub fn report(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut reports = BTreeMap::new();
        reports.insert("DynamicAnalysisStore".to_string(), self.store.report());

        let components = self
            .generators
            .iter()
            .map(|g| (g.name(), g.report()))
            .chain(self.analyzers.iter().map(|a| (a.name(), a.report())))
            .chain(self.pruners.iter().map(|p| (p.name(), p.report())));
        for (name, report) in components {
            if !report.is_empty() {
                reports.insert(name.to_string(), report);
            }
        }

        let mut runner = BTreeMap::new();
        runner.insert("executed".to_string(), self.executed.len().to_string());
        runner.insert("generated".to_string(), self.stats.generated.to_string());
        runner.insert("pruned".to_string(), self.stats.pruned.to_string());
        for (pruners, count) in &self.stats.pruned_by {
            runner.insert(format!("pruned_by[{pruners}]"), count.to_string());
        }
        reports.insert("StrategyRunner".to_string(), runner);
        reports
    }
}

fn evaluate_pruners(
    pruners: &[Box<dyn Pruner>],
    store: &DynamicAnalysisStore,
    faultload: &Faultload,
    check_all: bool,
    stats: &mut PruneStatistics,
) -> PruneDecision {
    let decisions: Vec<(&'static str, PruneDecision)> = if check_all {
        pruners
            .par_iter()
            .map(|pruner| (pruner.name(), pruner.prune(faultload, store)))
            .collect()
    } else {
        let mut decisions = Vec::with_capacity(pruners.len());
        for pruner in pruners {
            let decision = pruner.prune(faultload, store);
            decisions.push((pruner.name(), decision));
            if decision == PruneDecision::PruneSupersets {
                break;
            }
        }
        decisions
    };

    let decision = PruneDecision::max_of(decisions.iter().map(|(_, d)| *d));
    if !decision.is_keep() {
        let by: Vec<&'static str> = decisions
            .iter()
            .filter(|(_, d)| *d == decision)
            .map(|(name, _)| *name)
            .collect();
        debug!(%faultload, ?decision, pruners = by.join(", "), "pruned candidate");
        stats.record(by);
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunLimits;
    use faultline_explore::{FeedbackHandler, Reporter};
    use faultline_model::{Fault, FaultInjectionPoint, FaultUid};
    use faultline_store::PruneContext;
    use faultline_trace::{TraceAnalysis, TraceReport, TraceResponse};

    fn root() -> FaultUid {
        FaultUid::root(FaultInjectionPoint::new("A", "A1", 0))
    }

    fn b() -> FaultUid {
        root().as_child(FaultInjectionPoint::new("B", "B1", 0))
    }

    fn trace(root_status: u16, injected: Option<Fault>) -> TraceAnalysis {
        let mut initial = TraceReport::new("t", "a", root());
        initial.is_initial = true;
        initial.response = Some(TraceResponse {
            status: root_status,
            ..TraceResponse::ok()
        });
        let mut child = TraceReport::new("t", "b", b());
        child.parent_span_id = Some("a".to_string());
        if let Some(fault) = injected {
            child.response = Some(TraceResponse {
                status: fault.mode.status().unwrap_or(500),
                ..TraceResponse::ok()
            });
            child.injected_fault = Some(fault);
        }
        TraceAnalysis::new(vec![initial, child]).unwrap()
    }

    fn runner(config: RunnerConfig) -> StrategyRunner {
        StrategyRunner::dynamic(config, vec![FailureMode::http_error(500)])
    }

    #[test]
    fn test_first_faultload_is_empty() {
        let mut runner = runner(RunnerConfig::default());
        assert_eq!(runner.next_faultload(), Some(Faultload::empty()));
    }

    #[test]
    fn test_faulty_initial_run_stops() {
        let mut runner = runner(RunnerConfig::default());
        runner.next_faultload();
        runner.handle_result(FaultloadResult::new(Faultload::empty(), trace(500, None), false));

        assert_eq!(runner.next_faultload(), None);
        assert_eq!(runner.stop_reason(), Some(StopReason::InitialRunFaulty));
    }

    #[test]
    fn test_fail_stop_ends_run() {
        let config = RunnerConfig {
            fail_stop: true,
            ..Default::default()
        };
        let mut runner = runner(config);
        runner.next_faultload();
        runner.handle_result(FaultloadResult::new(Faultload::empty(), trace(200, None), true));

        let next = runner.next_faultload().unwrap();
        let fault = Fault::new(b(), FailureMode::http_error(500));
        assert_eq!(next, Faultload::new([fault.clone()]));
        runner.handle_result(FaultloadResult::new(next, trace(500, Some(fault)), false));

        assert_eq!(runner.next_faultload(), None);
        assert_eq!(runner.stop_reason(), Some(StopReason::FailStop));
        assert_eq!(runner.executed().len(), 2);
    }

    #[test]
    fn test_size_limit_prunes_everything() {
        let config = RunnerConfig {
            check_all_pruners: true,
            limits: RunLimits {
                max_faultload_size: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut runner = runner(config);
        runner.next_faultload();
        runner.handle_result(FaultloadResult::new(Faultload::empty(), trace(200, None), true));

        assert_eq!(runner.next_faultload(), None);
        let summary = runner.summary();
        assert_eq!(summary.stop_reason, StopReason::Exhausted);
        assert_eq!(summary.pruned, 1);
        assert_eq!(summary.pruned_by["FaultloadSizePruner"], 1);
    }

    #[test]
    fn test_stop_request_lets_current_iteration_finish() {
        let mut runner = runner(RunnerConfig::default());
        runner.next_faultload();
        runner.handle_result(FaultloadResult::new(Faultload::empty(), trace(200, None), true));

        let next = runner.next_faultload().unwrap();
        runner.request_stop();
        let fault = Fault::new(b(), FailureMode::http_error(500));
        runner.handle_result(FaultloadResult::new(next, trace(200, Some(fault)), true));

        assert_eq!(runner.next_faultload(), None);
        assert_eq!(runner.stop_reason(), Some(StopReason::Aborted));
        assert_eq!(runner.executed().len(), 2);
        assert_eq!(runner.store().history().len(), 2);
        assert_eq!(runner.summary().stop_reason, StopReason::Aborted);
    }

    struct FixedPruner(&'static str, PruneDecision);

    impl FeedbackHandler for FixedPruner {}

    impl Reporter for FixedPruner {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    impl Pruner for FixedPruner {
        fn prune(&self, _faultload: &Faultload, _context: &dyn PruneContext) -> PruneDecision {
            self.1
        }
    }

    #[test]
    fn test_only_strongest_pruners_are_credited() {
        let pruners: Vec<Box<dyn Pruner>> = vec![
            Box::new(FixedPruner("Weak", PruneDecision::Prune)),
            Box::new(FixedPruner("Strong", PruneDecision::PruneSupersets)),
            Box::new(FixedPruner("Idle", PruneDecision::Keep)),
        ];
        let store = DynamicAnalysisStore::new(vec![FailureMode::http_error(500)]);
        let faultload = Faultload::new([Fault::new(b(), FailureMode::http_error(500))]);
        let mut stats = PruneStatistics::default();

        let decision = evaluate_pruners(&pruners, &store, &faultload, true, &mut stats);
        assert_eq!(decision, PruneDecision::PruneSupersets);
        assert_eq!(stats.pruned_by.len(), 1);
        assert_eq!(stats.pruned_by["Strong"], 1);
    }

    #[test]
    fn test_pruner_groups_are_sorted() {
        let mut stats = PruneStatistics::default();
        stats.record(vec!["UnreachabilityPruner", "DynamicReductionPruner"]);
        stats.record(vec!["FaultloadSizePruner"]);
        assert_eq!(stats.pruned, 2);
        assert_eq!(stats.pruned_by["DynamicReductionPruner, UnreachabilityPruner"], 1);
        assert_eq!(stats.pruned_by["FaultloadSizePruner"], 1);
    }

    #[test]
    fn test_run_without_generator_is_an_error() {
        let mut runner = StrategyRunner::new(RunnerConfig::default(), FailureMode::default_modes());
        let mut executor = crate::executor::ModelExecutor::new(faultline_store::ImplicationsStore::new());
        assert!(matches!(runner.run(&mut executor), Err(RunnerError::NoGenerator)));
    }
}
