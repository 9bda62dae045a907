use std::sync::{Arc, Mutex};

use formatflow_core::{ConversionError, ConversionOptions, InputFile, OutputFormat, QueueConfig};
use formatflow_processing::test_helpers::{corrupt_heic, jpeg_fixture, png_fixture};
use formatflow_worker::{ConversionQueue, QueueError};

fn png_options() -> ConversionOptions {
    ConversionOptions::new(OutputFormat::Png, 1.0)
}

fn start() -> ConversionQueue {
    ConversionQueue::start(QueueConfig::default()).unwrap()
}

#[tokio::test]
async fn test_tasks_complete_in_submission_order() {
    let queue = start();
    let finished = Arc::new(Mutex::new(Vec::new()));

    let mut joins = Vec::new();
    for i in 0..4 {
        let input = InputFile::new(format!("img{}.jpg", i), jpeg_fixture(24 + i * 8, 16));
        let handle = queue.submit(input, png_options()).unwrap();
        let finished = finished.clone();
        joins.push(tokio::spawn(async move {
            let result = handle.wait().await.unwrap();
            finished.lock().unwrap().push(result.output_name);
        }));
    }

    for join in joins {
        join.await.unwrap();
    }

    assert_eq!(
        *finished.lock().unwrap(),
        vec!["img0.png", "img1.png", "img2.png", "img3.png"]
    );
}

#[tokio::test]
async fn test_progress_delivered_before_result() {
    let queue = start();
    let mut percents = Vec::new();

    let result = queue
        .convert(
            InputFile::new("a.png", png_fixture(10, 10)),
            ConversionOptions::new(OutputFormat::WebP, 0.85),
            |p| percents.push(p),
        )
        .await
        .unwrap();

    assert_eq!(result.output_name, "a.webp");
    assert_eq!(percents, vec![5, 30, 60, 100]);
}

#[tokio::test]
async fn test_failure_does_not_block_following_tasks() {
    let queue = start();

    let bad = queue
        .submit(InputFile::new("broken.heic", corrupt_heic()), png_options())
        .unwrap();
    let garbage = queue
        .submit(InputFile::new("x.jpg", b"nope".to_vec()), png_options())
        .unwrap();
    let good = queue
        .submit(InputFile::new("ok.jpg", jpeg_fixture(8, 8)), png_options())
        .unwrap();

    assert!(matches!(
        bad.wait().await,
        Err(QueueError::Conversion(ConversionError::NormalizationFailed(_)))
    ));
    assert!(matches!(
        garbage.wait().await,
        Err(QueueError::Conversion(ConversionError::DecodeFailed(_)))
    ));
    assert_eq!(good.wait().await.unwrap().output_name, "ok.png");
}

#[tokio::test]
async fn test_cancelled_queued_task_resolves_cancelled() {
    let queue = start();

    let first = queue
        .submit(InputFile::new("a.jpg", jpeg_fixture(16, 16)), png_options())
        .unwrap();
    let second = queue
        .submit(InputFile::new("b.jpg", jpeg_fixture(16, 16)), png_options())
        .unwrap();
    let third = queue
        .submit(InputFile::new("c.jpg", jpeg_fixture(16, 16)), png_options())
        .unwrap();
    second.cancel();

    assert!(first.wait().await.is_ok());
    assert!(second.wait().await.unwrap_err().is_cancelled());
    assert!(third.wait().await.is_ok());
}

#[tokio::test]
async fn test_shutdown_resolves_outstanding_handles() {
    let queue = start();

    let a = queue
        .submit(InputFile::new("a.jpg", jpeg_fixture(8, 8)), png_options())
        .unwrap();
    let b = queue
        .submit(InputFile::new("b.jpg", jpeg_fixture(8, 8)), png_options())
        .unwrap();
    queue.shutdown();

    assert_eq!(a.wait().await.unwrap_err(), QueueError::ShutDown);
    assert_eq!(b.wait().await.unwrap_err(), QueueError::ShutDown);

    assert!(queue.is_shut_down());
    let late = queue.submit(InputFile::new("c.jpg", jpeg_fixture(8, 8)), png_options());
    assert_eq!(late.unwrap_err(), QueueError::ShutDown);

    queue.closed().await;
}

#[tokio::test]
async fn test_drop_releases_handles() {
    let queue = start();
    let handle = queue
        .submit(InputFile::new("a.jpg", jpeg_fixture(8, 8)), png_options())
        .unwrap();
    drop(queue);

    assert_eq!(handle.wait().await.unwrap_err(), QueueError::ShutDown);
}

#[test]
fn test_start_outside_runtime_fails_cleanly() {
    let result = ConversionQueue::start(QueueConfig::default());
    assert!(matches!(result, Err(QueueError::DispatchFailed(_))));
}
