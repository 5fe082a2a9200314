#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    clippy::perf
    // clippy::restriction,
    // clippy::pedantic
)]
// now allow a few rules which are denied by the above statement
// --> they are ridiculous and not necessary
#![allow(
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::fallible_impl_from
)]
#![deny(missing_debug_implementations)]

use rendezvous_runner::native::HeavyCompute;
use rendezvous_runner::runner::TaskRunner;
use rendezvous_runner::{InterpretedTask, NativeTask, RunConfig};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logs go to stderr so that stdout only carries the result lines.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let runner = TaskRunner::new(RunConfig::default());
    let outcome = match runner.run(NativeTask::new(HeavyCompute), InterpretedTask) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    for result in outcome.results() {
        match result {
            Ok(report) => println!("{report}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
