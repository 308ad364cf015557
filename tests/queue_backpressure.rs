use satcheck::queue::{transport_queue, TryPut, QUEUE_CAPACITY};
use tokio::task::LocalSet;

#[test]
fn capacity_is_one() {
    assert_eq!(QUEUE_CAPACITY, 1);
}

#[tokio::test]
async fn second_put_suspends_until_get() {
    let (put, mut get) = transport_queue::<u64>();
    put.put(1).await.unwrap();

    // The slot is taken, so the second put cannot complete right away.
    let blocked = tokio::select! {
        biased;
        _ = put.put(2) => false,
        _ = tokio::task::yield_now() => true,
    };
    assert!(blocked);
    assert_eq!(put.try_put(3), Err(TryPut::Full(3)));

    assert_eq!(get.get().await, Some(1));
    put.put(2).await.unwrap();
    assert_eq!(get.get().await, Some(2));
}

#[tokio::test]
async fn suspended_producer_resumes_in_order() {
    LocalSet::new()
        .run_until(async {
            let (put, mut get) = transport_queue::<u64>();
            let producer = tokio::task::spawn_local(async move {
                for v in 0..5 {
                    put.put(v).await.unwrap();
                }
            });

            let mut seen = Vec::new();
            while let Some(v) = get.get().await {
                seen.push(v);
            }
            producer.await.unwrap();
            assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        })
        .await;
}

#[tokio::test]
async fn never_more_than_one_undelivered() {
    LocalSet::new()
        .run_until(async {
            let (put, mut get) = transport_queue::<u64>();
            let watcher = put.clone();
            let producer = tokio::task::spawn_local(async move {
                for v in 0..3 {
                    put.put(v).await.unwrap();
                }
            });

            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert!(!producer.is_finished());
            assert!(watcher.is_occupied());
            assert_eq!(get.try_get(), Some(0));
            // The suspended put has not delivered yet.
            assert_eq!(get.try_get(), None);

            drop(watcher);
            let mut rest = Vec::new();
            while let Some(v) = get.get().await {
                rest.push(v);
            }
            assert_eq!(rest, vec![1, 2]);
            producer.await.unwrap();
        })
        .await;
}
