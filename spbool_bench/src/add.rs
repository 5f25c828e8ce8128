//! The `C = A + A` benchmark over boolean sparse matrices.

use std::path::{Path, PathBuf};

use spbool_coo::{load_matrix, LoadError};
use spbool_csr::BoolCsrMatrix;
use spbool_matrix::Matrix;
use thiserror::Error;

use crate::{
    backend::{Backend, BackendError, DeviceInfo, DeviceMatrix, PlatformInfo, Session},
    lifecycle::{Benchmark, ExperimentInfo, IterationId},
    policy::{
        select_device, select_platform, DeviceKindPolicy, DevicePolicy, NameKeywords,
        PlatformPolicy,
    },
};

pub const BENCHMARK_NAME: &str = "Bool-Add";

/// One input graph and how often to run the operation on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixEntry {
    pub path: PathBuf,
    /// Mirror every edge when loading.
    pub undirected: bool,
    pub iterations: usize,
}

impl MatrixEntry {
    pub fn new<P: AsRef<Path>>(path: P, undirected: bool, iterations: usize) -> Self {
        MatrixEntry {
            path: path.as_ref().to_path_buf(),
            undirected,
            iterations,
        }
    }

    /// The input path as given, so inputs sharing a file name stay apart.
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("no platform matches the platform policy")]
    NoPlatform,
    #[error("no device of platform {platform} matches the device policy")]
    NoDevice { platform: String },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{name} is not square ({rows}x{cols})")]
    NotSquare {
        name: String,
        rows: usize,
        cols: usize,
    },
    #[error("no experiment with index {0}")]
    UnknownExperiment(usize),
}

/// State of a whole run: the selected platform and device and the open session.
pub struct Context<S> {
    pub platform: PlatformInfo,
    pub device: DeviceInfo,
    pub session: S,
}

pub struct AddBenchmark<B, P = NameKeywords, D = DeviceKindPolicy> {
    backend: B,
    platform_policy: P,
    device_policy: D,
    entries: Vec<MatrixEntry>,
}

impl<B: Backend, P: PlatformPolicy, D: DevicePolicy> AddBenchmark<B, P, D> {
    pub fn new(
        backend: B,
        platform_policy: P,
        device_policy: D,
        entries: Vec<MatrixEntry>,
    ) -> Self {
        AddBenchmark {
            backend,
            platform_policy,
            device_policy,
            entries,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

type MatrixOf<B> = <<B as Backend>::Session as Session>::Matrix;

impl<B: Backend, P: PlatformPolicy, D: DevicePolicy> Benchmark for AddBenchmark<B, P, D> {
    type Global = Context<B::Session>;
    type Experiment = MatrixOf<B>;
    type Iteration = MatrixOf<B>;
    type Error = BenchError;

    fn name(&self) -> &str {
        BENCHMARK_NAME
    }

    fn experiments_count(&self) -> usize {
        self.entries.len()
    }

    fn setup_benchmark(&mut self) -> Result<Self::Global, BenchError> {
        let platforms = self.backend.platforms()?;
        for p in &platforms {
            log::info!("platform {}: {} ({})", p.index, p.name, p.vendor);
        }
        let platform = select_platform(&self.platform_policy, &platforms)
            .ok_or(BenchError::NoPlatform)?
            .clone();
        log::info!("selected platform {}: {}", platform.index, platform.name);

        let devices = self.backend.devices(&platform)?;
        for d in &devices {
            log::info!(
                "device {}: {} ({}, {} compute units)",
                d.index,
                d.name,
                d.kind,
                d.compute_units
            );
        }
        let device = select_device(&self.device_policy, &devices)
            .ok_or_else(|| BenchError::NoDevice {
                platform: platform.name.clone(),
            })?
            .clone();
        log::info!("selected device {}: {}", device.index, device.name);

        let session = self.backend.open_session(&platform, &device)?;
        Ok(Context {
            platform,
            device,
            session,
        })
    }

    fn tear_down_benchmark(&mut self, global: Self::Global) -> Result<(), BenchError> {
        log::info!("closing session on {}", global.device.name);
        Ok(global.session.close()?)
    }

    fn setup_experiment(
        &mut self,
        global: &Self::Global,
        experiment: usize,
    ) -> Result<(Self::Experiment, ExperimentInfo), BenchError> {
        let entry = self
            .entries
            .get(experiment)
            .ok_or(BenchError::UnknownExperiment(experiment))?;
        let coo = load_matrix(&entry.path, entry.undirected)?;
        if !coo.is_square() {
            return Err(BenchError::NotSquare {
                name: entry.name(),
                rows: coo.nrows(),
                cols: coo.ncols(),
            });
        }
        let csr = BoolCsrMatrix::from(&coo);
        log::debug!(
            "{}: {} vertices, {} edges",
            entry.name(),
            csr.num_rows(),
            csr.num_nonzeros()
        );
        let input = global.session.create_matrix(&csr)?;
        Ok((
            input,
            ExperimentInfo {
                name: entry.name(),
                iterations: entry.iterations,
            },
        ))
    }

    fn setup_iteration(
        &mut self,
        global: &Self::Global,
        _input: &Self::Experiment,
        _id: IterationId,
    ) -> Result<Self::Iteration, BenchError> {
        Ok(global.session.create_empty()?)
    }

    fn exec_iteration(
        &mut self,
        global: &Self::Global,
        input: &Self::Experiment,
        result: &mut Self::Iteration,
        id: IterationId,
    ) -> Result<(), BenchError> {
        if let Err(err) = global.session.elem_add(input, input, result) {
            panic!(
                "elementwise add failed in iteration {} of experiment {}: {}",
                id.iteration, id.experiment, err
            );
        }
        Ok(())
    }

    fn tear_down_iteration(
        &mut self,
        _global: &Self::Global,
        _input: &Self::Experiment,
        result: Self::Iteration,
        id: IterationId,
    ) -> Result<(), BenchError> {
        log::debug!(
            "iteration {} of experiment {}: result has {} entries",
            id.iteration,
            id.experiment,
            result.num_nonzeros()
        );
        Ok(())
    }
}
