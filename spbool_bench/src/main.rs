use std::{fs, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use spbool_bench::{args::CliArgs, run_benchmark, AddBenchmark, HostBackend};

fn run(args: &CliArgs) -> anyhow::Result<()> {
    let backend = args.threads.map_or_else(HostBackend::default, HostBackend::new);
    let mut bench = AddBenchmark::new(
        backend,
        args.platform_policy(),
        args.device_policy(),
        args.experiments(),
    );
    let report = run_benchmark(&mut bench)?;
    print!("{}", report);
    if let Some(path) = &args.output {
        fs::write(path, report.to_string())
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Benchmark terminated unexpectedly. Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
