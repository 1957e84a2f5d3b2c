//! Integration tests for cowval-demo crate.
//!
//! These run the whole demo with a one-second refresh period and a timed
//! shutdown in place of Ctrl-C.

use cowval_config::{Config, ConfigLoader};
use cowval_demo::{run_until, DemoSettings};
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn fast_settings() -> DemoSettings {
    DemoSettings {
        update_every: Duration::from_millis(20),
        read_every: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn test_demo_applies_updates_and_counts_errors() {
    let config = Config::default();

    let summary = timeout(
        Duration::from_secs(10),
        run_until(config, fast_settings(), sleep(Duration::from_millis(1500))),
    )
    .await
    .expect("demo did not stop")
    .unwrap();

    assert!(summary.submitted >= 10, "submitted {}", summary.submitted);
    // Shutdown drains everything that was accepted.
    assert!(!summary.table.is_empty());
    assert!(summary.table.len() <= 8);
    assert!(summary.table.resolve("/svc/0/health").is_some());
    // Removals of unknown routes show up as cycle errors.
    assert!(summary.errors >= 1);
    assert!(summary.table.revision() >= 1);
}

#[tokio::test]
async fn test_demo_reads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.toml");
    std::fs::write(
        &path,
        "[reloader]\nrefresh_interval_secs = 60\ndrain_on_shutdown = false\n\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();
    let config = ConfigLoader::new(&path).load().await.unwrap();
    assert_eq!(config.logging.level, "warn");

    // No cycle fires within the run and nothing is drained on shutdown.
    let summary = run_until(config, fast_settings(), sleep(Duration::from_millis(200)))
        .await
        .unwrap();
    assert!(summary.submitted > 0);
    assert!(summary.table.is_empty());
    assert_eq!(summary.errors, 0);
}
