//! Nested setup/tear down protocol shared by all benchmarks.
//!
//! ```text
//! setup_benchmark
//!   setup_experiment(e)
//!     setup_iteration(e, i) -> exec_iteration(e, i) [timed] -> tear_down_iteration(e, i)
//!   tear_down_experiment(e)
//! tear_down_benchmark
//! ```
//!
//! Every scope value is moved into its tear down hook, so it is released exactly
//! once. Tear down still runs when a nested hook fails; when a hook panics the
//! scope values are dropped while unwinding.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::report::{BenchmarkReport, ExperimentReport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExperimentInfo {
    pub name: String,
    pub iterations: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IterationId {
    pub experiment: usize,
    pub iteration: usize,
}

pub trait Benchmark {
    /// State of the whole run, e.g. a backend session.
    type Global;
    /// State of one experiment, e.g. its input matrix.
    type Experiment;
    /// State of one iteration, e.g. its result matrix.
    type Iteration;
    type Error: std::error::Error + 'static;

    fn name(&self) -> &str;

    fn experiments_count(&self) -> usize;

    fn setup_benchmark(&mut self) -> Result<Self::Global, Self::Error>;

    fn tear_down_benchmark(&mut self, global: Self::Global) -> Result<(), Self::Error> {
        drop(global);
        Ok(())
    }

    fn setup_experiment(
        &mut self,
        global: &Self::Global,
        experiment: usize,
    ) -> Result<(Self::Experiment, ExperimentInfo), Self::Error>;

    fn tear_down_experiment(
        &mut self,
        _global: &Self::Global,
        state: Self::Experiment,
        _experiment: usize,
    ) -> Result<(), Self::Error> {
        drop(state);
        Ok(())
    }

    fn setup_iteration(
        &mut self,
        global: &Self::Global,
        state: &Self::Experiment,
        id: IterationId,
    ) -> Result<Self::Iteration, Self::Error>;

    /// The measured unit of work.
    fn exec_iteration(
        &mut self,
        global: &Self::Global,
        state: &Self::Experiment,
        iteration: &mut Self::Iteration,
        id: IterationId,
    ) -> Result<(), Self::Error>;

    fn tear_down_iteration(
        &mut self,
        _global: &Self::Global,
        _state: &Self::Experiment,
        iteration: Self::Iteration,
        _id: IterationId,
    ) -> Result<(), Self::Error> {
        drop(iteration);
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError<E: std::error::Error + 'static> {
    #[error("setup of experiment {experiment} failed")]
    SetupExperiment {
        experiment: usize,
        #[source]
        source: E,
    },
    #[error("setup of iteration {} of experiment {} failed", .id.iteration, .id.experiment)]
    SetupIteration {
        id: IterationId,
        #[source]
        source: E,
    },
    #[error("iteration {} of experiment {} failed", .id.iteration, .id.experiment)]
    ExecIteration {
        id: IterationId,
        #[source]
        source: E,
    },
    #[error("tear down of iteration {} of experiment {} failed", .id.iteration, .id.experiment)]
    TearDownIteration {
        id: IterationId,
        #[source]
        source: E,
    },
    #[error("tear down of experiment {experiment} failed")]
    TearDownExperiment {
        experiment: usize,
        #[source]
        source: E,
    },
    #[error("tear down of the benchmark failed")]
    TearDownBenchmark {
        #[source]
        source: E,
    },
}

// keeps the first failure, a later tear down failure is only logged
fn first_error<T, E: std::error::Error + 'static>(
    primary: Result<T, LifecycleError<E>>,
    tear_down: Result<(), LifecycleError<E>>,
) -> Result<T, LifecycleError<E>> {
    match (primary, tear_down) {
        (Ok(t), Ok(())) => Ok(t),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(ignored)) => {
            log::warn!("{} while handling: {}", ignored, err);
            Err(err)
        }
    }
}

/// Runs every experiment of `bench` and collects the duration of each
/// `exec_iteration` call.
///
/// A failing `setup_benchmark` is logged and yields an aborted report without
/// running any experiment. Any later failure tears down the enclosing scopes and
/// is returned.
pub fn run_benchmark<B: Benchmark>(
    bench: &mut B,
) -> Result<BenchmarkReport, LifecycleError<B::Error>> {
    let name = bench.name().to_owned();
    let global = match bench.setup_benchmark() {
        Ok(global) => global,
        Err(err) => {
            log::error!("{}: benchmark setup failed: {}", name, err);
            return Ok(BenchmarkReport::aborted(name, err.to_string()));
        }
    };

    let mut report = BenchmarkReport::new(name);
    let mut result = Ok(());
    for experiment in 0..bench.experiments_count() {
        match run_experiment(bench, &global, experiment) {
            Ok(experiment_report) => {
                log::info!("{}", experiment_report);
                report.experiments.push(experiment_report);
            }
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }
    let tear_down = bench
        .tear_down_benchmark(global)
        .map_err(|source| LifecycleError::TearDownBenchmark { source });
    first_error(result, tear_down).map(|()| report)
}

fn run_experiment<B: Benchmark>(
    bench: &mut B,
    global: &B::Global,
    experiment: usize,
) -> Result<ExperimentReport, LifecycleError<B::Error>> {
    let (state, info) = bench
        .setup_experiment(global, experiment)
        .map_err(|source| LifecycleError::SetupExperiment { experiment, source })?;
    log::info!(
        "experiment {}: {} ({} iterations)",
        experiment,
        info.name,
        info.iterations
    );

    let mut samples = Vec::with_capacity(info.iterations);
    let mut result = Ok(());
    for iteration in 0..info.iterations {
        let id = IterationId {
            experiment,
            iteration,
        };
        match run_iteration(bench, global, &state, id) {
            Ok(elapsed) => samples.push(elapsed),
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }
    let tear_down = bench
        .tear_down_experiment(global, state, experiment)
        .map_err(|source| LifecycleError::TearDownExperiment { experiment, source });
    first_error(result, tear_down).map(|()| ExperimentReport::new(info.name, samples))
}

fn run_iteration<B: Benchmark>(
    bench: &mut B,
    global: &B::Global,
    state: &B::Experiment,
    id: IterationId,
) -> Result<Duration, LifecycleError<B::Error>> {
    let mut iteration = bench
        .setup_iteration(global, state, id)
        .map_err(|source| LifecycleError::SetupIteration { id, source })?;

    let start = Instant::now();
    let exec = bench.exec_iteration(global, state, &mut iteration, id);
    let elapsed = start.elapsed();

    let tear_down = bench
        .tear_down_iteration(global, state, iteration, id)
        .map_err(|source| LifecycleError::TearDownIteration { id, source });
    let exec = exec
        .map(|()| elapsed)
        .map_err(|source| LifecycleError::ExecIteration { id, source });
    first_error(exec, tear_down)
}
