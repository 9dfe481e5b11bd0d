//! Startup failure behavior of the ueventfwd binary.

use std::process::Command;

fn ueventfwd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ueventfwd"))
}

#[test]
fn missing_argument_exits_nonzero() {
    let output = ueventfwd().output().expect("failed to run binary");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NETNS"), "usage error should name the argument: {stderr}");
}

#[test]
fn nonexistent_netns_path_exits_one_with_diagnostic() {
    let path = "/nonexistent/netns/handle";
    let output = ueventfwd().arg(path).output().expect("failed to run binary");

    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(path),
        "diagnostic should reference the failing path: {stderr}"
    );
    assert!(
        stderr.contains("namespace handle"),
        "diagnostic should name the failing operation: {stderr}"
    );
}
