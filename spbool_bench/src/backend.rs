//! Interface of the compute backend that executes the measured operation.
//!
//! A backend enumerates platforms and their devices and opens a [`Session`] on one
//! device. Matrices created through a session live in backend storage and release
//! it when dropped.

use std::fmt;

use spbool_csr::{BoolCsrMatrix, ShapeError};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Gpu,
    Accelerator,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceKind::Cpu => "CPU",
            DeviceKind::Gpu => "GPU",
            DeviceKind::Accelerator => "accelerator",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Position in enumeration order.
    pub index: usize,
    pub name: String,
    pub vendor: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub kind: DeviceKind,
    pub compute_units: usize,
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("no compute platforms available")]
    NoPlatforms,
    #[error("failed to query devices of platform {platform}: {reason}")]
    DeviceQuery { platform: String, reason: String },
    #[error("failed to open a session on device {device}: {reason}")]
    Session { device: String, reason: String },
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("{live} matrices were still alive when the session was closed")]
    Leaked { live: usize },
}

pub trait DeviceMatrix {
    fn num_rows(&self) -> usize;
    fn num_cols(&self) -> usize;
    fn num_nonzeros(&self) -> usize;
}

pub trait Session {
    type Matrix: DeviceMatrix;

    fn device(&self) -> &DeviceInfo;

    /// Copies `m` into backend storage.
    fn create_matrix(&self, m: &BoolCsrMatrix) -> Result<Self::Matrix, BackendError>;

    /// An empty 0x0 container, to be filled by an operation.
    fn create_empty(&self) -> Result<Self::Matrix, BackendError>;

    /// `out = a + b` over the boolean semiring. Blocks until the result is ready.
    fn elem_add(
        &self,
        a: &Self::Matrix,
        b: &Self::Matrix,
        out: &mut Self::Matrix,
    ) -> Result<(), BackendError>;

    /// Releases the session. Fails if matrices created by it are still alive.
    fn close(self) -> Result<(), BackendError>;
}

pub trait Backend {
    type Session: Session;

    fn platforms(&self) -> Result<Vec<PlatformInfo>, BackendError>;

    fn devices(&self, platform: &PlatformInfo) -> Result<Vec<DeviceInfo>, BackendError>;

    fn open_session(
        &self,
        platform: &PlatformInfo,
        device: &DeviceInfo,
    ) -> Result<Self::Session, BackendError>;
}
