use covault_pipeline::{retry_once_on, Stage, StagePanic};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TestError {
    Boom(String),
    Unauthorized,
    Panicked(String),
}

impl From<StagePanic> for TestError {
    fn from(p: StagePanic) -> Self {
        TestError::Panicked(p.0)
    }
}

type TStage<T> = Stage<T, TestError>;

#[tokio::test]
async fn ready_stage_yields_its_value() {
    let stage: TStage<u32> = Stage::ready(7);
    assert_eq!(stage.join().await, Ok(7));
}

#[tokio::test]
async fn downstream_consumes_upstream_result() {
    let input: TStage<Vec<u8>> = Stage::ready(vec![1, 2, 3]);

    let upstream = input.get();
    let doubled: TStage<Vec<u8>> = Stage::spawn(async move {
        let bytes = upstream.await?;
        Ok(bytes.iter().map(|b| b * 2).collect())
    });

    assert_eq!(doubled.join().await, Ok(vec![2, 4, 6]));
}

#[tokio::test]
async fn fan_out_runs_upstream_exactly_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();

    let source: TStage<u32> = Stage::spawn(async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(10)
    });

    let (a, b) = (source.get(), source.get());
    let left: TStage<u32> = Stage::spawn(async move { Ok(a.await? + 1) });
    let right: TStage<u32> = Stage::spawn(async move { Ok(b.await? + 2) });

    assert_eq!(left.join().await, Ok(11));
    assert_eq!(right.join().await, Ok(12));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn independent_branches_run_concurrently() {
    // Both branches wait on the same barrier; if stages ran sequentially
    // this would never complete.
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let (b1, b2) = (barrier.clone(), barrier.clone());
    let token: TStage<&'static str> = Stage::spawn(async move {
        b1.wait().await;
        Ok("token")
    });
    let encrypted: TStage<&'static str> = Stage::spawn(async move {
        b2.wait().await;
        Ok("ciphertext")
    });

    let (t, e) = (token.get(), encrypted.get());
    let upload: TStage<String> = Stage::spawn(async move {
        let token = t.await?;
        let payload = e.await?;
        Ok(format!("{token}:{payload}"))
    });

    assert_eq!(upload.join().await, Ok("token:ciphertext".to_string()));
}

#[tokio::test]
async fn upstream_error_short_circuits_downstream_work() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    let failing: TStage<u32> =
        Stage::spawn(async move { Err(TestError::Boom("fetch failed".into())) });

    let upstream = failing.get();
    let downstream: TStage<u32> = Stage::spawn(async move {
        let value = upstream.await?;
        flag.store(true, Ordering::SeqCst);
        Ok(value + 1)
    });

    assert_eq!(
        downstream.join().await,
        Err(TestError::Boom("fetch failed".into()))
    );
    assert!(!ran.load(Ordering::SeqCst), "downstream work must not run");
}

#[tokio::test]
async fn first_error_propagates_through_chain() {
    let failing: TStage<u32> = Stage::spawn(async move { Err(TestError::Unauthorized) });

    let one = failing.get();
    let middle: TStage<u32> = Stage::spawn(async move { Ok(one.await? + 1) });
    let two = middle.get();
    let last: TStage<u32> = Stage::spawn(async move { Ok(two.await? + 1) });

    assert_eq!(last.join().await, Err(TestError::Unauthorized));
}

#[tokio::test]
async fn panicking_stage_surfaces_as_error() {
    let stage: TStage<u32> = Stage::spawn(async move { panic!("stage exploded") });
    match stage.join().await {
        Err(TestError::Panicked(msg)) => assert!(msg.contains("panic")),
        other => panic!("expected panic error, got {other:?}"),
    }
}

// --- retry wrapper ---

#[tokio::test]
async fn retry_succeeds_on_forced_second_attempt() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let result = retry_once_on(
        |e: &TestError| *e == TestError::Unauthorized,
        move |force| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if force {
                    Ok::<_, TestError>("fresh token worked")
                } else {
                    Err(TestError::Unauthorized)
                }
            }
        },
    )
    .await;

    assert_eq!(result, Ok("fresh token worked"));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retry_makes_no_third_attempt() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let result: Result<(), _> = retry_once_on(
        |e: &TestError| *e == TestError::Unauthorized,
        move |_force| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Unauthorized)
            }
        },
    )
    .await;

    assert_eq!(result, Err(TestError::Unauthorized));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_retryable_error_is_not_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let result: Result<(), _> = retry_once_on(
        |e: &TestError| *e == TestError::Unauthorized,
        move |_force| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Boom("server error".into()))
            }
        },
    )
    .await;

    assert_eq!(result, Err(TestError::Boom("server error".into())));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
