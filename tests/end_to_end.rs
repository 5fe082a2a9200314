use assert2::check;
use std::process::Command;

#[test]
fn one_run_prints_two_results_and_exits() {
    // `output()` only returns once the process terminated, so a hang fails
    // the test by timing out the test harness.
    let output = Command::new(env!("CARGO_BIN_EXE_rendezvous-runner"))
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    check!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut lines = stdout.lines().collect::<Vec<_>>();
    lines.sort_unstable();
    check!(lines == ["[interpreted] result: 70", "[native] result: 91"]);
}
