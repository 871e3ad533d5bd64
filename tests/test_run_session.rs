mod common;

use common::{events_of, fixture_path, json_lines, run_phantomfog};

#[tokio::test]
async fn dry_run_console_session() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().to_str().unwrap();
    let output = run_phantomfog(
        &[
            "run",
            "--dry-run",
            "--no-dashboard",
            "-t",
            "10.20.0.1",
            "--output-dir",
            out,
        ],
        "status\nadd 10.20.0.2\ntargets\nremove 10.20.0.1\nfailures\nexit\n",
    )
    .await;
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rate_per_min: 6.00, attack_score: 0.00, dry_run: true"));
    assert!(stdout.contains("added 10.20.0.2"));
    assert!(stdout.contains("targets: 10.20.0.1, 10.20.0.2"));
    assert!(stdout.contains("removed 10.20.0.1"));
    assert!(stdout.contains("stopping"));

    let log = std::fs::read_to_string(dir.path().join("fog_log.json")).unwrap();
    let events = json_lines(&log);
    assert_eq!(events[0]["type"], "startup");
    assert_eq!(events[0]["dry_run"], true);
    assert_eq!(events[0]["targets"][0], "10.20.0.1");
    assert!(!events_of(&events, "rate_update").is_empty());
    assert_eq!(events_of(&events, "target_added").len(), 1);
    assert_eq!(events_of(&events, "target_removed").len(), 1);
    assert_eq!(events_of(&events, "shutdown").len(), 1);
    assert!(events_of(&events, "noise_sent").is_empty());
    assert!(events_of(&events, "noise_error").is_empty());

    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["sequence"], i as u64);
        assert!(event["timestamp"].is_string());
    }

    // Stdout mirrors the log
    assert_eq!(events_of(&json_lines(&stdout), "startup").len(), 1);

    let fingerprint = std::fs::read_to_string(dir.path().join("fingerprint.json")).unwrap();
    let fingerprint: serde_json::Value = serde_json::from_str(&fingerprint).unwrap();
    assert!(fingerprint["platform"].is_string());
}

#[tokio::test]
async fn config_file_protected_target_is_never_sent_to() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture_path("fog.yaml");
    let output = run_phantomfog(
        &[
            "run",
            "--config",
            config.to_str().unwrap(),
            "--no-dashboard",
            "--no-echo",
            "--output-dir",
            dir.path().to_str().unwrap(),
        ],
        "targets\nexit\n",
    )
    .await;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("targets: 10.20.1.1, 10.20.1.2"));
    assert!(json_lines(&stdout).is_empty(), "--no-echo leaked events");

    let log = std::fs::read_to_string(dir.path().join("fog_log.json")).unwrap();
    let events = json_lines(&log);
    assert_eq!(events[0]["type"], "startup");
    assert_eq!(events[0]["dry_run"], true);
    assert!(
        events_of(&events, "dry_run")
            .iter()
            .all(|e| e["target"] != "10.20.1.2"),
        "protected target saw traffic"
    );
}

#[tokio::test]
async fn end_of_input_stops_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_phantomfog(
        &[
            "run",
            "--dry-run",
            "--no-dashboard",
            "--output-dir",
            dir.path().to_str().unwrap(),
        ],
        "",
    )
    .await;
    assert!(output.status.success());

    let log = std::fs::read_to_string(dir.path().join("fog_log.json")).unwrap();
    let events = json_lines(&log);
    let shutdown = events_of(&events, "shutdown");
    assert_eq!(shutdown.len(), 1);
    assert_eq!(shutdown[0]["reason"], "console closed");
}

#[tokio::test]
async fn event_log_appends_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let args = [
        "run",
        "--dry-run",
        "--no-dashboard",
        "--no-echo",
        "--output-dir",
        dir.path().to_str().unwrap(),
    ];
    assert!(run_phantomfog(&args, "exit\n").await.status.success());
    assert!(run_phantomfog(&args, "exit\n").await.status.success());

    let log = std::fs::read_to_string(dir.path().join("fog_log.json")).unwrap();
    let events = json_lines(&log);
    assert_eq!(events_of(&events, "startup").len(), 2);
    assert_eq!(events_of(&events, "shutdown").len(), 2);
}
