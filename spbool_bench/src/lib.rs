//! Benchmark harness timing boolean elementwise addition on a compute backend.

pub mod add;
pub mod args;
pub mod backend;
pub mod host;
pub mod lifecycle;
pub mod policy;
pub mod report;

pub use add::{AddBenchmark, BenchError, MatrixEntry};
pub use backend::{Backend, BackendError, DeviceMatrix, Session};
pub use host::HostBackend;
pub use lifecycle::{run_benchmark, Benchmark, LifecycleError};
pub use report::{BenchmarkReport, ExperimentReport};
