//! These tests need a real scale nearby and are ignored by default:
//! `cargo test --test hardware -- --ignored --nocapture`
//!
//! Step on the scale right before running so it is advertising.

use std::sync::Arc;
use std::time::Duration;

use qn_scale::{events, Config, ScaleScanner, SessionOptions};
use tokio::time::timeout;

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires BLE hardware"]
async fn weighs_on_real_scale() {
    let config = Config::default();
    let scanner = ScaleScanner::new(&config.device_name).await.unwrap();
    let scale = Arc::new(scanner.find_scale(config.scan_timeout()).await.unwrap());

    let (tx, mut rx) = events::channel();
    let handle = Arc::clone(&scale)
        .connect(SessionOptions::from(&config), tx)
        .await
        .unwrap();

    let final_weight = timeout(Duration::from_secs(60), events::settled_weight(&mut rx))
        .await
        .expect("no settled reading within 60s");

    assert!(final_weight.is_some_and(|kg| kg > 0.0));
    scale.disconnect().await.unwrap();
    handle.abort();
}
