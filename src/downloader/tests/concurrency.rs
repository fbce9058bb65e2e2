use super::*;

fn many_attachments(count: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| (format!("a{i}"), format!("file{i}.dat")))
        .collect()
}

fn as_refs(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
    pairs.iter().map(|(id, name)| (id.as_str(), name.as_str())).collect()
}

#[tokio::test]
async fn never_exceeds_configured_concurrency() {
    let fetcher = Arc::new(MockFetcher::new().with_delay(Duration::from_millis(20)));
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone(), |c| {
        c.download.max_concurrent_downloads = 3;
    });
    let pairs = many_attachments(12);

    let report = downloader
        .process(vec![message("m1", "a@example.com", &as_refs(&pairs))])
        .await
        .unwrap();

    assert_eq!(report.written_paths().count(), 12);
    assert!(
        fetcher.max_concurrent() <= 3,
        "observed {} concurrent fetches",
        fetcher.max_concurrent()
    );
    assert!(fetcher.max_concurrent() >= 2, "expected fetches to overlap");
}

#[tokio::test]
async fn concurrency_of_one_is_sequential() {
    let fetcher = Arc::new(MockFetcher::new().with_delay(Duration::from_millis(5)));
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone(), |c| {
        c.download.max_concurrent_downloads = 1;
    });
    let pairs = many_attachments(5);

    downloader
        .process(vec![message("m1", "a@example.com", &as_refs(&pairs))])
        .await
        .unwrap();

    assert_eq!(fetcher.max_concurrent(), 1);
    assert_eq!(fetcher.total_calls(), 5);
}

#[tokio::test]
async fn parallel_batch_is_faster_than_sequential() {
    let delay = Duration::from_millis(50);
    let fetcher = Arc::new(MockFetcher::new().with_delay(delay));
    let (downloader, _temp_dir) = create_test_downloader(fetcher, |c| {
        c.download.max_concurrent_downloads = 4;
    });
    let pairs = many_attachments(4);

    let started = std::time::Instant::now();
    downloader
        .process(vec![message("m1", "a@example.com", &as_refs(&pairs))])
        .await
        .unwrap();

    assert!(
        started.elapsed() < delay * 3,
        "four parallel fetches took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn clones_share_configuration_and_events() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(MockFetcher::new()), |_| {});
    let clone = downloader.clone();
    let mut events = downloader.subscribe();

    clone
        .process(vec![message("m1", "a@example.com", &[("a1", "a.txt")])])
        .await
        .unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        crate::types::Event::BatchStarted { total: 1 }
    ));
    assert_eq!(clone.config().download.base_dir, downloader.config().download.base_dir);
}
