use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use zip::write::FileOptions;
use zip::ZipWriter;

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).expect("create zip");
    let mut zip = ZipWriter::new(file);
    for (name, body) in entries {
        zip.start_file(*name, FileOptions::default()).expect("start file");
        zip.write_all(body).expect("write entry");
    }
    zip.finish().expect("finish zip");
}

#[test]
fn extract_cli_flattens_archive_into_root() {
    let dir = TempDir::new().unwrap();
    write_zip(
        &dir.path().join("rides_2022.zip"),
        &[
            ("rides_2022_jan.csv", b"id,start\n1,2022-01-01\n"),
            ("rides_2022_feb.csv", b"id,start\n2,2022-02-01\n"),
        ],
    );

    let mut cmd = Command::cargo_bin("cycle-hire").expect("Binary exists");
    cmd.arg("extract").arg("--dir").arg(dir.path());

    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("archives found 1, extracted 1")
                .and(predicate::str::contains("moved 2")),
        );

    assert!(dir.path().join("rides_2022_rides_2022_jan.csv").is_file());
    assert!(dir.path().join("rides_2022_rides_2022_feb.csv").is_file());
    assert!(!dir.path().join("rides_2022").join("rides_2022_jan.csv").exists());
}

#[test]
fn extract_cli_json_report_is_valid_json() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.zip"), b"not a zip").unwrap();

    let output = Command::cargo_bin("cycle-hire")
        .expect("Binary exists")
        .args(["extract", "--json", "--dir"])
        .arg(dir.path())
        .output()
        .expect("run cycle-hire");

    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is a JSON report");
    assert_eq!(report["extraction"]["found"], 1);
}

#[test]
fn extract_cli_fails_on_missing_directory() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does_not_exist");

    Command::cargo_bin("cycle-hire")
        .expect("Binary exists")
        .arg("extract")
        .arg("--dir")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Extract phase failed"));
}

#[test]
fn extract_cli_reads_directory_from_config() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("2019");
    fs::create_dir(&nested).unwrap();
    fs::write(nested.join("trips.csv"), b"id\n1\n").unwrap();

    let config = NamedTempFile::new().unwrap();
    fs::write(
        config.path(),
        format!("extract:\n  directory: {}\n", dir.path().display()),
    )
    .unwrap();

    Command::cargo_bin("cycle-hire")
        .expect("Binary exists")
        .arg("extract")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success();

    assert!(dir.path().join("2019_trips.csv").is_file());
}

#[test]
fn download_cli_rejects_unknown_source() {
    Command::cargo_bin("cycle-hire")
        .expect("Binary exists")
        .args(["download", "--source", "Paris_Velib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown source 'Paris_Velib'"));
}

#[test]
fn download_cli_rejects_limit_with_no_limit() {
    Command::cargo_bin("cycle-hire")
        .expect("Binary exists")
        .args(["download", "--limit", "5", "--no-limit"])
        .assert()
        .failure();
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use cycle_hire::cli::{run, Cli, Commands, ExtractArgs};

    let cli = Cli {
        command: Commands::Extract(ExtractArgs {
            dir: Some(std::path::PathBuf::from("dummy_dir_that_does_not_exist")),
            ..Default::default()
        }),
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}

mod endpoint_env {
    use clap::Parser;
    use cycle_hire::cli::{Cli, Commands, DownloadArgs, ENDPOINT_ENV};
    use serial_test::serial;
    use std::env;
    use std::fs::write;
    use tempfile::NamedTempFile;

    fn parse_download(args: &[&str]) -> DownloadArgs {
        let cli = Cli::try_parse_from(args).expect("arguments parse");
        match cli.command {
            Commands::Download(args) => args,
            other => panic!("expected download, got {other:?}"),
        }
    }

    fn config_with_endpoint(endpoint: &str) -> NamedTempFile {
        let file = NamedTempFile::new().expect("temp file");
        write(file.path(), format!("download:\n  endpoint: \"{endpoint}\"\n"))
            .expect("write config");
        file
    }

    #[test]
    #[serial]
    fn endpoint_falls_back_to_environment() {
        env::set_var(ENDPOINT_ENV, "http://127.0.0.1:9000");
        let config = parse_download(&["cycle-hire", "download"]).resolve();
        env::remove_var(ENDPOINT_ENV);

        let config = config.expect("defaults resolve");
        assert_eq!(config.endpoint.as_deref(), Some("http://127.0.0.1:9000"));
    }

    #[test]
    #[serial]
    fn endpoint_flag_wins_over_environment() {
        env::set_var(ENDPOINT_ENV, "http://127.0.0.1:9000");
        let args = &["cycle-hire", "download", "--endpoint", "http://mirror:8080"];
        let config = parse_download(args).resolve();
        env::remove_var(ENDPOINT_ENV);

        let config = config.expect("flags resolve");
        assert_eq!(config.endpoint.as_deref(), Some("http://mirror:8080"));
    }

    #[test]
    #[serial]
    fn config_file_endpoint_wins_over_environment() {
        let file = config_with_endpoint("http://from-config:9000");
        let path = file.path().to_string_lossy().into_owned();

        env::set_var(ENDPOINT_ENV, "http://from-env:9000");
        let config = parse_download(&["cycle-hire", "download", "--config", &path]).resolve();
        env::remove_var(ENDPOINT_ENV);

        let config = config.expect("config resolves");
        assert_eq!(config.endpoint.as_deref(), Some("http://from-config:9000"));
    }

    #[test]
    #[serial]
    fn endpoint_flag_wins_over_config_file() {
        env::remove_var(ENDPOINT_ENV);
        let file = config_with_endpoint("http://from-config:9000");
        let path = file.path().to_string_lossy().into_owned();

        let config = parse_download(&[
            "cycle-hire",
            "download",
            "--config",
            &path,
            "--endpoint",
            "http://mirror:8080",
        ])
        .resolve()
        .expect("config resolves");
        assert_eq!(config.endpoint.as_deref(), Some("http://mirror:8080"));
    }

    #[test]
    #[serial]
    fn limit_flags_override_the_default_cap() {
        env::remove_var(ENDPOINT_ENV);
        let limited = parse_download(&["cycle-hire", "download", "--limit", "3"])
            .resolve()
            .unwrap();
        assert_eq!(limited.policy.max_files, Some(3));
        assert_eq!(limited.endpoint, None);

        let unlimited = parse_download(&[
            "cycle-hire",
            "download",
            "--no-limit",
            "--source",
            "NYC_CitiBike",
        ])
        .resolve()
        .unwrap();
        assert_eq!(unlimited.policy.max_files, None);
        assert_eq!(unlimited.sources.len(), 1);
        assert_eq!(unlimited.sources[0].bucket, "tripdata");
    }
}
