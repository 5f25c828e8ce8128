use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use proptest::{collection::vec, prelude::*};
use spbool_bench::{
    lifecycle::{ExperimentInfo, IterationId},
    run_benchmark, Benchmark, LifecycleError,
};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hook {
    SetupBenchmark,
    SetupExperiment(usize),
    SetupIteration(IterationId),
    Exec(IterationId),
    TearDownIteration(IterationId),
    TearDownExperiment(usize),
    TearDownBenchmark,
}

fn id(experiment: usize, iteration: usize) -> IterationId {
    IterationId {
        experiment,
        iteration,
    }
}

#[derive(Error, Debug)]
#[error("injected failure at {0:?}")]
struct Failure(Hook);

// counts scope values that have not been dropped yet
struct Resource {
    live: Rc<Cell<usize>>,
}

impl Drop for Resource {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Default)]
struct Recording {
    iterations: Vec<usize>,
    events: Vec<String>,
    fail_at: Vec<Hook>,
    panic_at: Option<Hook>,
    live: Rc<Cell<usize>>,
    acquired: usize,
}

impl Recording {
    fn new(iterations: Vec<usize>) -> Self {
        Recording {
            iterations,
            ..Default::default()
        }
    }

    fn hook(&mut self, hook: Hook, event: String) -> Result<(), Failure> {
        self.events.push(event);
        if self.panic_at == Some(hook) {
            panic!("injected panic at {:?}", hook);
        }
        if self.fail_at.contains(&hook) {
            return Err(Failure(hook));
        }
        Ok(())
    }

    fn acquire(&mut self) -> Resource {
        self.acquired += 1;
        self.live.set(self.live.get() + 1);
        Resource {
            live: Rc::clone(&self.live),
        }
    }
}

impl Benchmark for Recording {
    type Global = Resource;
    type Experiment = Resource;
    type Iteration = Resource;
    type Error = Failure;

    fn name(&self) -> &str {
        "recording"
    }

    fn experiments_count(&self) -> usize {
        self.iterations.len()
    }

    fn setup_benchmark(&mut self) -> Result<Resource, Failure> {
        self.hook(Hook::SetupBenchmark, "setup_benchmark".to_owned())?;
        Ok(self.acquire())
    }

    fn tear_down_benchmark(&mut self, global: Resource) -> Result<(), Failure> {
        drop(global);
        self.hook(Hook::TearDownBenchmark, "tear_down_benchmark".to_owned())
    }

    fn setup_experiment(
        &mut self,
        _global: &Resource,
        experiment: usize,
    ) -> Result<(Resource, ExperimentInfo), Failure> {
        self.hook(
            Hook::SetupExperiment(experiment),
            format!("setup_experiment {}", experiment),
        )?;
        let info = ExperimentInfo {
            name: format!("exp{}", experiment),
            iterations: self.iterations[experiment],
        };
        Ok((self.acquire(), info))
    }

    fn tear_down_experiment(
        &mut self,
        _global: &Resource,
        state: Resource,
        experiment: usize,
    ) -> Result<(), Failure> {
        drop(state);
        self.hook(
            Hook::TearDownExperiment(experiment),
            format!("tear_down_experiment {}", experiment),
        )
    }

    fn setup_iteration(
        &mut self,
        _global: &Resource,
        _state: &Resource,
        id: IterationId,
    ) -> Result<Resource, Failure> {
        self.hook(
            Hook::SetupIteration(id),
            format!("setup_iteration {}.{}", id.experiment, id.iteration),
        )?;
        Ok(self.acquire())
    }

    fn exec_iteration(
        &mut self,
        _global: &Resource,
        _state: &Resource,
        _iteration: &mut Resource,
        id: IterationId,
    ) -> Result<(), Failure> {
        self.hook(
            Hook::Exec(id),
            format!("exec {}.{}", id.experiment, id.iteration),
        )
    }

    fn tear_down_iteration(
        &mut self,
        _global: &Resource,
        _state: &Resource,
        iteration: Resource,
        id: IterationId,
    ) -> Result<(), Failure> {
        drop(iteration);
        self.hook(
            Hook::TearDownIteration(id),
            format!("tear_down_iteration {}.{}", id.experiment, id.iteration),
        )
    }
}

fn expected_events(iterations: &[usize]) -> Vec<String> {
    let mut events = vec!["setup_benchmark".to_owned()];
    for (e, &n) in iterations.iter().enumerate() {
        events.push(format!("setup_experiment {}", e));
        for i in 0..n {
            events.push(format!("setup_iteration {}.{}", e, i));
            events.push(format!("exec {}.{}", e, i));
            events.push(format!("tear_down_iteration {}.{}", e, i));
        }
        events.push(format!("tear_down_experiment {}", e));
    }
    events.push("tear_down_benchmark".to_owned());
    events
}

#[test]
fn hooks_run_nested() {
    let mut bench = Recording::new(vec![2, 0, 1]);
    let report = run_benchmark(&mut bench).unwrap();
    assert_eq!(bench.events, expected_events(&[2, 0, 1]));
    assert!(!report.is_aborted());
    assert_eq!(report.name, "recording");
    let summary: Vec<_> = report
        .experiments
        .iter()
        .map(|e| (e.name.as_str(), e.iterations()))
        .collect();
    assert_eq!(summary, vec![("exp0", 2), ("exp1", 0), ("exp2", 1)]);
    assert_eq!(bench.acquired, 1 + 3 + 3);
    assert_eq!(bench.live.get(), 0);
}

#[test]
fn no_experiments() {
    let mut bench = Recording::new(vec![]);
    let report = run_benchmark(&mut bench).unwrap();
    assert!(report.experiments.is_empty());
    assert_eq!(bench.events, vec!["setup_benchmark", "tear_down_benchmark"]);
}

#[test]
fn failed_global_setup_aborts() {
    let mut bench = Recording::new(vec![3]);
    bench.fail_at = vec![Hook::SetupBenchmark];
    let report = run_benchmark(&mut bench).unwrap();
    assert!(report.is_aborted());
    assert!(report.experiments.is_empty());
    assert_eq!(
        report.aborted.as_deref(),
        Some("injected failure at SetupBenchmark")
    );
    assert_eq!(bench.events, vec!["setup_benchmark"]);
    assert_eq!(bench.acquired, 0);
}

#[test]
fn exec_failure_tears_down_outer_scopes() {
    let mut bench = Recording::new(vec![3, 2]);
    bench.fail_at = vec![Hook::Exec(id(0, 1))];
    let err = run_benchmark(&mut bench).unwrap_err();
    assert!(matches!(err, LifecycleError::ExecIteration { id: i, .. } if i == id(0, 1)));
    assert_eq!(
        bench.events,
        vec![
            "setup_benchmark",
            "setup_experiment 0",
            "setup_iteration 0.0",
            "exec 0.0",
            "tear_down_iteration 0.0",
            "setup_iteration 0.1",
            "exec 0.1",
            "tear_down_iteration 0.1",
            "tear_down_experiment 0",
            "tear_down_benchmark",
        ]
    );
    assert_eq!(bench.live.get(), 0);
}

#[test]
fn experiment_setup_failure() {
    let mut bench = Recording::new(vec![1, 1]);
    bench.fail_at = vec![Hook::SetupExperiment(1)];
    let err = run_benchmark(&mut bench).unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::SetupExperiment { experiment: 1, .. }
    ));
    assert_eq!(
        &bench.events[bench.events.len() - 3..],
        &["tear_down_experiment 0", "setup_experiment 1", "tear_down_benchmark"]
    );
    assert_eq!(bench.live.get(), 0);
}

#[test]
fn iteration_setup_failure() {
    let mut bench = Recording::new(vec![2]);
    bench.fail_at = vec![Hook::SetupIteration(id(0, 0))];
    let err = run_benchmark(&mut bench).unwrap_err();
    assert!(matches!(err, LifecycleError::SetupIteration { .. }));
    assert_eq!(
        bench.events,
        vec![
            "setup_benchmark",
            "setup_experiment 0",
            "setup_iteration 0.0",
            "tear_down_experiment 0",
            "tear_down_benchmark",
        ]
    );
    assert_eq!(bench.live.get(), 0);
}

#[test]
fn tear_down_failures_are_reported() {
    let mut bench = Recording::new(vec![2]);
    bench.fail_at = vec![Hook::TearDownIteration(id(0, 0))];
    let err = run_benchmark(&mut bench).unwrap_err();
    assert!(matches!(err, LifecycleError::TearDownIteration { .. }));
    assert_eq!(bench.live.get(), 0);

    let mut bench = Recording::new(vec![1]);
    bench.fail_at = vec![Hook::TearDownBenchmark];
    let err = run_benchmark(&mut bench).unwrap_err();
    assert!(matches!(err, LifecycleError::TearDownBenchmark { .. }));
    assert_eq!(bench.events, expected_events(&[1]));
}

#[test]
fn first_failure_wins() {
    let mut bench = Recording::new(vec![1]);
    bench.fail_at = vec![
        Hook::Exec(id(0, 0)),
        Hook::TearDownExperiment(0),
        Hook::TearDownBenchmark,
    ];
    let err = run_benchmark(&mut bench).unwrap_err();
    assert!(matches!(err, LifecycleError::ExecIteration { .. }));
    assert_eq!(bench.events, expected_events(&[1]));
}

#[test]
fn panic_releases_scope_values() {
    let mut bench = Recording::new(vec![2, 2]);
    bench.panic_at = Some(Hook::Exec(id(1, 0)));
    let live = Rc::clone(&bench.live);
    let result = panic::catch_unwind(AssertUnwindSafe(|| run_benchmark(&mut bench)));
    assert!(result.is_err());
    assert_eq!(bench.events.last().map(String::as_str), Some("exec 1.0"));
    assert!(bench.acquired > 0);
    assert_eq!(live.get(), 0);
}

proptest! {
    #[test]
    fn every_scope_is_closed(iterations in vec(0..5usize, 0..5)) {
        let mut bench = Recording::new(iterations.clone());
        let report = run_benchmark(&mut bench).unwrap();
        prop_assert_eq!(&bench.events, &expected_events(&iterations));
        let samples: Vec<_> = report.experiments.iter().map(|e| e.iterations()).collect();
        prop_assert_eq!(samples, iterations);
        prop_assert_eq!(bench.live.get(), 0);
    }
}
