use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
};

fn serpentine_map() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../maps/serpentine.txt")
}

fn run_script(extra_args: &[&str], script: &str) -> Vec<serde_json::Value> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ghost-defence"))
        .arg("--grid")
        .arg(serpentine_map())
        .args(["--json", "--cadence-ms", "1"])
        .args(extra_args)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to launch ghost-defence");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(script.as_bytes())
        .expect("failed to write script");
    let output = child.wait_with_output().expect("ghost-defence exits");
    assert!(output.status.success(), "ghost-defence exited with failure");

    String::from_utf8(output.stdout)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("every line is json"))
        .collect()
}

#[test]
fn purchases_are_reflected_in_state() {
    let replies = run_script(&[], "buy basic 1 0\nbuy splash 0 8\nstate\nquit\n");
    let replies: Vec<_> = replies
        .into_iter()
        .filter(|reply| reply["type"] != "progress")
        .collect();

    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0]["type"], "ok");
    assert_eq!(replies[1]["type"], "ok");
    assert_eq!(replies[2]["type"], "state");
    assert_eq!(replies[2]["snapshot"]["balance"], 70);
    assert_eq!(
        replies[2]["snapshot"]["defenders"]
            .as_array()
            .expect("defender list")
            .len(),
        2
    );
}

#[test]
fn rejections_and_parse_errors_do_not_stop_the_shell() {
    let replies = run_script(&[], "buy basic 0 1\nlaunch\nsell 5 5\nroute\n");
    let replies: Vec<_> = replies
        .into_iter()
        .filter(|reply| reply["type"] != "progress")
        .collect();

    assert_eq!(replies[0]["type"], "rejected");
    assert_eq!(replies[1]["type"], "error");
    assert_eq!(replies[2]["type"], "rejected");
    assert_eq!(replies[3]["type"], "route");
    assert_eq!(replies[3]["route"].as_array().expect("route").len(), 30);
}

#[test]
fn waves_run_on_the_clock_until_waited_for() {
    let config = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
    let config = config.to_str().expect("utf-8 path").to_owned();
    let replies = run_script(
        &["--config", &config],
        "buy splash 1 6\nbuy splash 3 3\nwave\nwait\n",
    );

    let progress = replies
        .iter()
        .filter(|reply| reply["type"] == "progress")
        .count();
    let last = replies
        .iter()
        .rev()
        .find(|reply| reply["type"] == "state")
        .expect("final state");

    assert!(progress > 0, "turns were reported");
    assert_ne!(last["snapshot"]["phase"], "WaveActive");
    assert!(last["snapshot"]["tick"].as_u64().expect("tick") > 0);
}
