//! Runs process description files against the simulated paging core.
//!
//! ```text
//! vmsim [--ram BYTES] [--swap BYTES]... [--page-shift N] [--eager]
//!       [--log-level LEVEL] PROGRAM...
//! ```
//!
//! Processes get PIDs 1, 2, ... in command-line order and run to completion
//! one after another, most urgent priority first.

mod cpu;
mod loader;
mod logger;

use crate::cpu::Cpu;
use crate::loader::{LoadError, Program};
use crate::logger::StderrLogger;
use kernel_memory_addresses::PageGeometry;
use kernel_mm::{MemoryConfig, MemoryContext, MmError, Populate};
use kernel_syscall::{Kernel, Pid, Process};
use log::LevelFilter;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
enum SimError {
    #[error("{0}\n\n{USAGE}")]
    Usage(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("memory: {0}")]
    Memory(#[from] MmError),
    #[error("cannot install logger: {0}")]
    Logger(#[from] log::SetLoggerError),
}

const USAGE: &str = "usage: vmsim [--ram BYTES] [--swap BYTES]... [--page-shift N] [--eager] \
                     [--log-level LEVEL] PROGRAM...";

#[derive(Debug)]
struct Options {
    config: MemoryConfig,
    log_level: LevelFilter,
    programs: Vec<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, SimError> {
    let mut config = MemoryConfig::default();
    let mut swap = Vec::new();
    let mut log_level = LevelFilter::Info;
    let mut programs = Vec::new();

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| SimError::Usage(format!("{name} needs a value")))
        };
        match arg.as_str() {
            "--ram" => config.ram_size = size(&value("--ram")?)?,
            "--swap" => swap.push(size(&value("--swap")?)?),
            "--page-shift" => {
                let raw = value("--page-shift")?;
                config.geometry = raw
                    .parse()
                    .ok()
                    .and_then(PageGeometry::try_new)
                    .ok_or_else(|| SimError::Usage(format!("bad page shift `{raw}`")))?;
            }
            "--eager" => config.populate = Populate::Eager,
            "--log-level" => {
                let raw = value("--log-level")?;
                log_level = raw
                    .parse()
                    .map_err(|_| SimError::Usage(format!("bad log level `{raw}`")))?;
            }
            "-h" | "--help" => return Err(SimError::Usage(String::from("help requested"))),
            flag if flag.starts_with("--") => {
                return Err(SimError::Usage(format!("unknown option `{flag}`")));
            }
            path => programs.push(PathBuf::from(path)),
        }
    }

    if !swap.is_empty() {
        config.swap_sizes = swap;
    }
    if programs.is_empty() {
        return Err(SimError::Usage(String::from("no program given")));
    }
    Ok(Options {
        config,
        log_level,
        programs,
    })
}

/// Byte count, decimal or `0x` hex.
fn size(raw: &str) -> Result<usize, SimError> {
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|_| SimError::Usage(format!("bad size `{raw}`")))
}

fn run(options: &Options) -> Result<(), SimError> {
    let devices = options.config.build_devices()?;
    let kernel: Kernel = Kernel::new(Arc::clone(&devices));

    let mut loaded: Vec<(Pid, Program)> = Vec::with_capacity(options.programs.len());
    for (pid, path) in (1..).map(Pid::new).zip(&options.programs) {
        let program = loader::load(path)?;
        log::info!(
            "loaded {} as {pid:?} (priority {}, {} instructions)",
            path.display(),
            program.priority,
            program.code.len()
        );
        let mm = MemoryContext::new(Arc::clone(&devices), options.config.populate);
        kernel
            .scheduler()
            .admit_by_priority(Arc::new(Process::new(pid, program.priority, mm)));
        loaded.push((pid, program));
    }
    loaded.sort_by_key(|(_, program)| program.priority);

    for (pid, program) in &loaded {
        let Some(process) = kernel.scheduler().start(*pid) else {
            log::error!("{pid:?} vanished from the ready queues");
            continue;
        };
        let summary = Cpu::new().run(&kernel, &process, program);
        let usage = process.mm().usage(0)?;
        println!(
            "{pid}: {} instructions, {} failed; vma 0 {usage:?}; {} pages resident",
            summary.executed,
            summary.failed,
            process.mm().lock().resident_count()
        );
        kernel.scheduler().finish(*pid);
    }

    devices.ram().dump();
    Ok(())
}

fn main() -> ExitCode {
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = StderrLogger::new(options.log_level).init().map_err(SimError::from) {
        eprintln!("vmsim: {e}");
        return ExitCode::FAILURE;
    }
    log::debug!("{options:?}");

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("vmsim: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> impl Iterator<Item = String> {
        line.split_whitespace()
            .map(String::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn options_override_defaults() {
        let options =
            parse_args(args("--ram 0x200 --swap 4096 --swap 2048 --eager --log-level debug a b"))
                .unwrap();
        assert_eq!(options.config.ram_size, 0x200);
        assert_eq!(options.config.swap_sizes, [4096, 2048]);
        assert_eq!(options.config.populate, Populate::Eager);
        assert_eq!(options.log_level, LevelFilter::Debug);
        assert_eq!(options.programs, [PathBuf::from("a"), PathBuf::from("b")]);

        let options = parse_args(args("--page-shift 12 p")).unwrap();
        assert_eq!(options.config.geometry, PageGeometry::new(12));
    }

    #[test]
    fn second_logger_is_refused() {
        let _ = StderrLogger::new(LevelFilter::Off).init();
        let err = StderrLogger::new(LevelFilter::Off)
            .init()
            .map_err(SimError::from)
            .unwrap_err();
        assert!(matches!(err, SimError::Logger(_)));
        assert!(err.to_string().starts_with("cannot install logger"));
    }

    #[test]
    fn rejects_bad_command_lines() {
        assert!(matches!(parse_args(args("")), Err(SimError::Usage(_))));
        assert!(matches!(parse_args(args("--ram")), Err(SimError::Usage(_))));
        assert!(matches!(parse_args(args("--ram lots p")), Err(SimError::Usage(_))));
        assert!(matches!(parse_args(args("--turbo p")), Err(SimError::Usage(_))));
        assert!(matches!(parse_args(args("--page-shift 40 p")), Err(SimError::Usage(_))));
        assert!(matches!(parse_args(args("--page-shift 0 p")), Err(SimError::Usage(_))));
        assert!(matches!(parse_args(args("--page-shift -1 p")), Err(SimError::Usage(_))));
    }
}
