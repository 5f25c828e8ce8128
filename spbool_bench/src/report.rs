use std::{fmt, time::Duration};

/// Durations of the measured calls of one experiment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExperimentReport {
    pub name: String,
    pub samples: Vec<Duration>,
}

impl ExperimentReport {
    pub fn new(name: String, samples: Vec<Duration>) -> Self {
        ExperimentReport { name, samples }
    }

    pub fn iterations(&self) -> usize {
        self.samples.len()
    }

    pub fn total(&self) -> Duration {
        self.samples.iter().sum()
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.total().as_secs_f64() / self.samples.len() as f64,
        ))
    }

    pub fn min(&self) -> Option<Duration> {
        self.samples.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    pub fn median(&self) -> Option<Duration> {
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        match sorted.len() {
            0 => None,
            n if n % 2 == 1 => Some(sorted[mid]),
            _ => Some((sorted[mid - 1] + sorted[mid]) / 2),
        }
    }
}

fn fmt_ms(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.3} ms", d.as_secs_f64() * 1e3),
        None => "-".to_owned(),
    }
}

impl fmt::Display for ExperimentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} iterations, total {}, mean {}, median {}, min {}, max {}",
            self.name,
            self.iterations(),
            fmt_ms(Some(self.total())),
            fmt_ms(self.mean()),
            fmt_ms(self.median()),
            fmt_ms(self.min()),
            fmt_ms(self.max()),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkReport {
    pub name: String,
    pub experiments: Vec<ExperimentReport>,
    /// Why global setup failed, if it did.
    pub aborted: Option<String>,
}

impl BenchmarkReport {
    pub fn new(name: String) -> Self {
        BenchmarkReport {
            name,
            experiments: vec![],
            aborted: None,
        }
    }

    pub fn aborted(name: String, reason: String) -> Self {
        BenchmarkReport {
            name,
            experiments: vec![],
            aborted: Some(reason),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "benchmark {}", self.name)?;
        if let Some(reason) = &self.aborted {
            return writeln!(f, "  aborted: {}", reason);
        }
        for (i, experiment) in self.experiments.iter().enumerate() {
            writeln!(f, "  [{}] {}", i, experiment)?;
        }
        Ok(())
    }
}
