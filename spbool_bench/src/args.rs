use std::{path::PathBuf, str::FromStr};

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::{
    add::MatrixEntry,
    backend::DeviceKind,
    policy::{DeviceKindPolicy, NameKeywords},
};

pub const DEFAULT_ITERATIONS: usize = 10;

/// A `-m` argument: `PATH[:undirected|:directed][:ITERATIONS]`. Suffixes that are
/// left out fall back to the global flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixArg {
    pub path: PathBuf,
    pub undirected: Option<bool>,
    pub iterations: Option<usize>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixArgError {
    #[error("matrix entry {0:?} has an empty path")]
    EmptyPath(String),
}

fn parse_direction(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "undirected" | "u" => Some(true),
        "directed" | "d" => Some(false),
        _ => None,
    }
}

impl FromStr for MatrixArg {
    type Err = MatrixArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut path = s;
        let mut iterations = None;
        let mut undirected = None;
        if let Some((head, tail)) = path.rsplit_once(':') {
            if let Ok(n) = tail.parse() {
                iterations = Some(n);
                path = head;
            }
        }
        if let Some((head, tail)) = path.rsplit_once(':') {
            if let Some(u) = parse_direction(tail) {
                undirected = Some(u);
                path = head;
            }
        }
        if path.is_empty() {
            return Err(MatrixArgError::EmptyPath(s.to_owned()));
        }
        Ok(MatrixArg {
            path: PathBuf::from(path),
            undirected,
            iterations,
        })
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum DeviceKindArg {
    #[default]
    Any,
    Cpu,
    Gpu,
    Accelerator,
}

impl DeviceKindArg {
    pub fn kind(self) -> Option<DeviceKind> {
        match self {
            DeviceKindArg::Any => None,
            DeviceKindArg::Cpu => Some(DeviceKind::Cpu),
            DeviceKindArg::Gpu => Some(DeviceKind::Gpu),
            DeviceKindArg::Accelerator => Some(DeviceKind::Accelerator),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "spbool-add", version)]
#[command(about = "Times elementwise addition C = A + A of boolean sparse matrices")]
pub struct CliArgs {
    /// Input graph in Matrix Market format: PATH[:undirected|:directed][:ITERATIONS]
    #[arg(short, long = "matrix", value_name = "ENTRY", required = true)]
    pub matrices: Vec<MatrixArg>,

    /// Iterations of entries without an explicit count
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,

    /// Mirror the edges of entries without an explicit direction
    #[arg(short, long)]
    pub undirected: bool,

    /// Keyword the platform name or vendor must contain; any platform if absent
    #[arg(short, long = "platform", value_name = "KEYWORD")]
    pub platforms: Vec<String>,

    #[arg(long, value_enum, default_value_t = DeviceKindArg::Any)]
    pub device_kind: DeviceKindArg,

    /// Worker threads of the host backend [default: number of CPUs]
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Also write the report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CliArgs {
    pub fn experiments(&self) -> Vec<MatrixEntry> {
        self.matrices
            .iter()
            .map(|arg| {
                MatrixEntry::new(
                    &arg.path,
                    arg.undirected.unwrap_or(self.undirected),
                    arg.iterations.unwrap_or(self.iterations),
                )
            })
            .collect()
    }

    pub fn platform_policy(&self) -> NameKeywords {
        NameKeywords::new(&self.platforms)
    }

    pub fn device_policy(&self) -> DeviceKindPolicy {
        DeviceKindPolicy(self.device_kind.kind())
    }
}
