//! In-process backend: a rayon thread pool stands in for the device.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use rayon::{ThreadPool, ThreadPoolBuilder};
use spbool_csr::BoolCsrMatrix;
use spbool_matrix::Matrix;

use crate::backend::{
    Backend, BackendError, DeviceInfo, DeviceKind, DeviceMatrix, PlatformInfo, Session,
};

pub const PLATFORM_NAME: &str = "Host";
pub const PLATFORM_VENDOR: &str = "rayon";

/// Acquisition and release counts of backend resources, shared by every session
/// of a [`HostBackend`].
#[derive(Debug, Default)]
pub struct ResourceStats {
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    matrices_created: AtomicUsize,
    matrices_released: AtomicUsize,
}

impl ResourceStats {
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn matrices_created(&self) -> usize {
        self.matrices_created.load(Ordering::SeqCst)
    }

    pub fn matrices_released(&self) -> usize {
        self.matrices_released.load(Ordering::SeqCst)
    }

    pub fn live_matrices(&self) -> usize {
        self.matrices_created() - self.matrices_released()
    }

    /// Every acquired resource has been released.
    pub fn is_balanced(&self) -> bool {
        self.sessions_opened() == self.sessions_closed()
            && self.matrices_created() == self.matrices_released()
    }
}

#[derive(Debug)]
pub struct HostBackend {
    threads: usize,
    stats: Arc<ResourceStats>,
}

impl Default for HostBackend {
    fn default() -> Self {
        HostBackend::new(num_cpus::get())
    }
}

impl HostBackend {
    pub fn new(threads: usize) -> Self {
        HostBackend {
            threads: threads.max(1),
            stats: Arc::default(),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn stats(&self) -> Arc<ResourceStats> {
        Arc::clone(&self.stats)
    }

    fn platform(&self) -> PlatformInfo {
        PlatformInfo {
            index: 0,
            name: PLATFORM_NAME.to_owned(),
            vendor: PLATFORM_VENDOR.to_owned(),
        }
    }
}

impl Backend for HostBackend {
    type Session = HostSession;

    fn platforms(&self) -> Result<Vec<PlatformInfo>, BackendError> {
        Ok(vec![self.platform()])
    }

    fn devices(&self, platform: &PlatformInfo) -> Result<Vec<DeviceInfo>, BackendError> {
        if *platform != self.platform() {
            return Err(BackendError::DeviceQuery {
                platform: platform.name.clone(),
                reason: "unknown platform".to_owned(),
            });
        }
        Ok(vec![DeviceInfo {
            index: 0,
            name: format!("{} worker threads", self.threads),
            kind: DeviceKind::Cpu,
            compute_units: self.threads,
        }])
    }

    fn open_session(
        &self,
        platform: &PlatformInfo,
        device: &DeviceInfo,
    ) -> Result<HostSession, BackendError> {
        if !self.devices(platform)?.contains(device) {
            return Err(BackendError::Session {
                device: device.name.clone(),
                reason: "unknown device".to_owned(),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(device.compute_units)
            .thread_name(|i| format!("spbool-host-{}", i))
            .build()
            .map_err(|e| BackendError::Session {
                device: device.name.clone(),
                reason: e.to_string(),
            })?;
        self.stats.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(HostSession {
            device: device.clone(),
            pool,
            stats: Arc::clone(&self.stats),
            live: Arc::default(),
            closed: false,
        })
    }
}

pub struct HostSession {
    device: DeviceInfo,
    pool: ThreadPool,
    stats: Arc<ResourceStats>,
    // matrices of this session that have not been dropped yet
    live: Arc<AtomicUsize>,
    closed: bool,
}

impl HostSession {
    fn wrap(&self, csr: BoolCsrMatrix) -> HostMatrix {
        self.stats.matrices_created.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        HostMatrix {
            csr,
            live: Arc::clone(&self.live),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn live_matrices(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Session for HostSession {
    type Matrix = HostMatrix;

    fn device(&self) -> &DeviceInfo {
        &self.device
    }

    fn create_matrix(&self, m: &BoolCsrMatrix) -> Result<HostMatrix, BackendError> {
        Ok(self.wrap(m.clone()))
    }

    fn create_empty(&self) -> Result<HostMatrix, BackendError> {
        Ok(self.wrap(BoolCsrMatrix::default()))
    }

    fn elem_add(
        &self,
        a: &HostMatrix,
        b: &HostMatrix,
        out: &mut HostMatrix,
    ) -> Result<(), BackendError> {
        out.csr = self.pool.install(|| a.csr.elem_add(&b.csr))?;
        Ok(())
    }

    fn close(mut self) -> Result<(), BackendError> {
        self.closed = true;
        self.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
        match self.live_matrices() {
            0 => Ok(()),
            live => Err(BackendError::Leaked { live }),
        }
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("session on {} dropped without being closed", self.device.name);
            self.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A matrix held by a [`HostSession`]. Dropping it releases the storage.
#[derive(Debug)]
pub struct HostMatrix {
    csr: BoolCsrMatrix,
    live: Arc<AtomicUsize>,
    stats: Arc<ResourceStats>,
}

impl HostMatrix {
    pub fn csr(&self) -> &BoolCsrMatrix {
        &self.csr
    }
}

impl DeviceMatrix for HostMatrix {
    fn num_rows(&self) -> usize {
        self.csr.num_rows()
    }

    fn num_cols(&self) -> usize {
        self.csr.num_cols()
    }

    fn num_nonzeros(&self) -> usize {
        self.csr.num_nonzeros()
    }
}

impl Drop for HostMatrix {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.stats.matrices_released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(backend: &HostBackend) -> HostSession {
        let platform = &backend.platforms().unwrap()[0];
        let device = &backend.devices(platform).unwrap()[0];
        backend.open_session(platform, device).unwrap()
    }

    #[test]
    fn enumeration() {
        let backend = HostBackend::new(3);
        let platforms = backend.platforms().unwrap();
        assert_eq!(platforms.len(), 1);
        assert_eq!(platforms[0].name, PLATFORM_NAME);
        let devices = backend.devices(&platforms[0]).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].kind, DeviceKind::Cpu);
        assert_eq!(devices[0].compute_units, 3);

        let other = PlatformInfo {
            index: 1,
            name: "NVIDIA CUDA".to_owned(),
            vendor: "NVIDIA Corporation".to_owned(),
        };
        assert!(matches!(
            backend.devices(&other),
            Err(BackendError::DeviceQuery { .. })
        ));
    }

    #[test]
    fn zero_threads_is_one() {
        assert_eq!(HostBackend::new(0).threads(), 1);
    }

    #[test]
    fn add_and_release() {
        let backend = HostBackend::new(2);
        let stats = backend.stats();
        let session = open(&backend);
        let a = session
            .create_matrix(&BoolCsrMatrix::from_edges(3, &[0, 0, 1, 2], &[1, 2, 0, 1]))
            .unwrap();
        let b = session.create_matrix(&BoolCsrMatrix::identity(3)).unwrap();
        let mut c = session.create_empty().unwrap();
        assert_eq!(c.num_rows(), 0);
        session.elem_add(&a, &b, &mut c).unwrap();
        assert_eq!((c.num_rows(), c.num_cols(), c.num_nonzeros()), (3, 3, 7));
        assert_eq!(c.csr().row(0), &[0, 1, 2]);
        assert_eq!(session.live_matrices(), 3);
        assert_eq!(stats.live_matrices(), 3);

        drop((a, b, c));
        session.close().unwrap();
        assert!(stats.is_balanced());
        assert_eq!(stats.sessions_opened(), 1);
        assert_eq!(stats.matrices_created(), 3);
    }

    #[test]
    fn shape_mismatch() {
        let backend = HostBackend::new(1);
        let session = open(&backend);
        let a = session.create_matrix(&BoolCsrMatrix::new_square(2)).unwrap();
        let b = session.create_matrix(&BoolCsrMatrix::new_square(3)).unwrap();
        let mut c = session.create_empty().unwrap();
        assert!(matches!(
            session.elem_add(&a, &b, &mut c),
            Err(BackendError::Shape(_))
        ));
    }

    #[test]
    fn close_with_live_matrices() {
        let backend = HostBackend::new(1);
        let stats = backend.stats();
        let session = open(&backend);
        let m = session.create_empty().unwrap();
        assert!(matches!(session.close(), Err(BackendError::Leaked { live: 1 })));
        drop(m);
        assert!(stats.is_balanced());
    }

    #[test]
    fn drop_counts_as_close() {
        let backend = HostBackend::new(1);
        let stats = backend.stats();
        drop(open(&backend));
        assert!(stats.is_balanced());
        assert_eq!(stats.sessions_closed(), 1);
    }
}
