use std::collections::BTreeMap;

use faultline_model::Behaviour;

use crate::component::{FeedbackHandler, Reporter};
use crate::context::FeedbackContext;
use crate::result::FaultloadResult;

/// Latency summary for one behaviour, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub count: usize,
}

/// Collects response times per behaviour. Reporting only.
///
/// Reports where a fault was injected are skipped: their timing is the
/// proxy's, not the service's.
#[derive(Debug, Default)]
pub struct TimingAnalyzer {
    durations: BTreeMap<Behaviour, Vec<f64>>,
}

impl TimingAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, behaviour: &Behaviour) -> Option<TimingStats> {
        let durations = self.durations.get(behaviour)?;
        let count = durations.len();
        if count == 0 {
            return None;
        }
        let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
        let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = durations.iter().sum::<f64>() / count as f64;
        Some(TimingStats { min, avg, max, count })
    }
}

impl FeedbackHandler for TimingAnalyzer {
    fn handle_feedback(&mut self, result: &FaultloadResult, _context: &mut FeedbackContext<'_>) {
        for report in result.trace.reports() {
            if report.injected_fault.is_some() {
                continue;
            }
            let Some(response) = &report.response else {
                continue;
            };
            if response.duration_ms <= 0.0 {
                continue;
            }
            self.durations
                .entry(report.behaviour())
                .or_default()
                .push(response.duration_ms);
        }
    }
}

impl Reporter for TimingAnalyzer {
    fn name(&self) -> &'static str {
        "TimingAnalyzer"
    }

    fn report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        for behaviour in self.durations.keys() {
            if let Some(stats) = self.stats(behaviour) {
                report.insert(
                    behaviour.to_string(),
                    format!(
                        "min={:.1}ms avg={:.1}ms max={:.1}ms n={}",
                        stats.min, stats.avg, stats.max, stats.count
                    ),
                );
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures::{fault, uid, TraceBuilder};
    use faultline_model::{FailureMode, Faultload};
    use faultline_store::DynamicAnalysisStore;

    #[test]
    fn test_stats_per_behaviour() {
        let mut store = DynamicAnalysisStore::new(FailureMode::default_modes());
        let mut analyzer = TimingAnalyzer::new();
        let mut context = FeedbackContext::new(&mut store);

        for duration in [10.0, 30.0] {
            let trace = TraceBuilder::new().ok(uid("B")).timed(duration).build();
            analyzer.handle_feedback(&FaultloadResult::new(Faultload::empty(), trace, true), &mut context);
        }
        let injected = fault(uid("B"), 500);
        let trace = TraceBuilder::new().injected(injected.clone()).timed(1.0).build();
        analyzer.handle_feedback(&FaultloadResult::new(Faultload::new([injected]), trace, true), &mut context);

        let stats = analyzer.stats(&Behaviour::none(uid("B"))).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.avg, 20.0);
        assert_eq!(stats.max, 30.0);
        assert!(analyzer.stats(&fault(uid("B"), 500).as_behaviour()).is_none());
    }
}
