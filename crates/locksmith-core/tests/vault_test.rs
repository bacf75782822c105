//! Vault admission tests: exclusivity, fairness, backpressure, cleanup.

use std::time::Duration;

use locksmith_core::{
    AcquireOutcome, LockSession, ReleaseOutcome, SessionId, Tag, Vault, VaultConfig,
};
use tokio::sync::mpsc;

fn small_vault(queue_capacity: usize) -> Vault {
    Vault::new(VaultConfig { concurrency: 2, queue_capacity, ..VaultConfig::default() })
}

fn session(id: SessionId) -> (LockSession, mpsc::UnboundedReceiver<Tag>) {
    LockSession::new(id)
}

async fn expect_grant(rx: &mut mpsc::UnboundedReceiver<Tag>, tag: &str) {
    let granted = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for grant of {tag:?}"))
        .unwrap_or_else(|| panic!("grant channel closed waiting for {tag:?}"));
    assert_eq!(granted, tag);
}

fn expect_no_grant(rx: &mut mpsc::UnboundedReceiver<Tag>) {
    assert_eq!(rx.try_recv().ok(), None, "unexpected grant");
}

#[tokio::test]
async fn first_acquire_is_granted_and_notified() {
    let vault = small_vault(8);
    let (a, mut a_rx) = session(1);

    let outcome = vault.acquire("x".into(), a).await.unwrap();
    assert_eq!(outcome, AcquireOutcome::Granted);
    expect_grant(&mut a_rx, "x").await;
}

#[tokio::test]
async fn held_tag_enqueues_second_requester() {
    let vault = small_vault(8);
    let (a, mut a_rx) = session(1);
    let (b, mut b_rx) = session(2);

    assert_eq!(vault.acquire("x".into(), a).await.unwrap(), AcquireOutcome::Granted);
    assert_eq!(vault.acquire("x".into(), b).await.unwrap(), AcquireOutcome::Enqueued);

    expect_grant(&mut a_rx, "x").await;
    expect_no_grant(&mut b_rx);

    // Handover after the holder releases.
    assert_eq!(vault.release("x".into(), 1).await.unwrap(), ReleaseOutcome::Released);
    expect_grant(&mut b_rx, "x").await;
}

#[tokio::test]
async fn promotion_follows_fifo_order() {
    let vault = small_vault(8);
    let (d, mut d_rx) = session(4);
    vault.acquire("x".into(), d).await.unwrap();
    expect_grant(&mut d_rx, "x").await;

    let mut waiters = Vec::new();
    for id in [1, 2, 3] {
        let (s, rx) = session(id);
        assert_eq!(vault.acquire("x".into(), s).await.unwrap(), AcquireOutcome::Enqueued);
        waiters.push((id, rx));
    }

    let mut releaser = 4;
    for (id, rx) in &mut waiters {
        assert_eq!(vault.release("x".into(), releaser).await.unwrap(), ReleaseOutcome::Released);
        expect_grant(rx, "x").await;
        releaser = *id;
    }
}

#[tokio::test]
async fn full_queue_rejects_without_disturbing_waiters() {
    let vault = small_vault(1);
    let (a, _a_rx) = session(1);
    let (b, mut b_rx) = session(2);
    let (c, mut c_rx) = session(3);

    assert_eq!(vault.acquire("x".into(), a).await.unwrap(), AcquireOutcome::Granted);
    assert_eq!(vault.acquire("x".into(), b).await.unwrap(), AcquireOutcome::Enqueued);
    assert_eq!(vault.acquire("x".into(), c).await.unwrap(), AcquireOutcome::Rejected);

    // The rejected session got nothing; the queued one is promoted as usual.
    vault.release("x".into(), 1).await.unwrap();
    expect_grant(&mut b_rx, "x").await;
    expect_no_grant(&mut c_rx);
}

#[tokio::test]
async fn release_by_non_holder_changes_nothing() {
    let vault = small_vault(8);
    let (a, mut a_rx) = session(1);
    vault.acquire("x".into(), a).await.unwrap();
    expect_grant(&mut a_rx, "x").await;

    assert_eq!(vault.release("x".into(), 99).await.unwrap(), ReleaseOutcome::NotHolder);
    assert_eq!(vault.release("y".into(), 1).await.unwrap(), ReleaseOutcome::NotHolder);

    // Still held by session 1: a new acquire queues rather than grants.
    let (b, _b_rx) = session(2);
    assert_eq!(vault.acquire("x".into(), b).await.unwrap(), AcquireOutcome::Enqueued);
}

#[tokio::test]
async fn abandon_frees_held_tags_for_others() {
    let vault = small_vault(8);
    let (a, mut a_rx) = session(1);
    vault.acquire("x".into(), a).await.unwrap();
    expect_grant(&mut a_rx, "x").await;
    drop(a_rx);

    vault.abandon(1).await;

    let (b, mut b_rx) = session(2);
    assert_eq!(vault.acquire("x".into(), b).await.unwrap(), AcquireOutcome::Granted);
    expect_grant(&mut b_rx, "x").await;
}

#[tokio::test]
async fn abandon_promotes_next_waiter() {
    let vault = small_vault(8);
    let (a, mut a_rx) = session(1);
    let (b, mut b_rx) = session(2);

    vault.acquire("x".into(), a).await.unwrap();
    expect_grant(&mut a_rx, "x").await;
    vault.acquire("x".into(), b).await.unwrap();

    vault.abandon(1).await;
    expect_grant(&mut b_rx, "x").await;
}

#[tokio::test]
async fn abandon_withdraws_queued_waiters() {
    let vault = small_vault(8);
    let (a, _a_rx) = session(1);
    let (b, b_rx) = session(2);
    let (c, mut c_rx) = session(3);

    vault.acquire("x".into(), a).await.unwrap();
    vault.acquire("x".into(), b).await.unwrap();
    vault.acquire("x".into(), c).await.unwrap();

    // B leaves the queue; the handover skips straight to C.
    drop(b_rx);
    vault.abandon(2).await;
    vault.release("x".into(), 1).await.unwrap();
    expect_grant(&mut c_rx, "x").await;
}

#[tokio::test]
async fn distinct_tags_are_independent() {
    let vault = small_vault(8);
    let (a, mut a_rx) = session(1);
    let (b, mut b_rx) = session(2);

    assert_eq!(vault.acquire("x".into(), a).await.unwrap(), AcquireOutcome::Granted);
    assert_eq!(vault.acquire("y".into(), b).await.unwrap(), AcquireOutcome::Granted);

    expect_grant(&mut a_rx, "x").await;
    expect_grant(&mut b_rx, "y").await;
}

#[tokio::test]
async fn released_tag_state_is_recreated_cleanly() {
    // Release with no waiters drops the tag state; the next acquire must
    // behave exactly like a first acquire.
    let vault = small_vault(1);
    for round in 0..3 {
        let (s, mut rx) = session(round + 10);
        assert_eq!(vault.acquire("x".into(), s).await.unwrap(), AcquireOutcome::Granted);
        expect_grant(&mut rx, "x").await;
        assert_eq!(vault.release("x".into(), round + 10).await.unwrap(), ReleaseOutcome::Released);
    }
}

#[tokio::test]
async fn same_session_may_wait_on_many_tags() {
    let vault = small_vault(8);
    let (holder, _h_rx) = session(1);
    let (w, mut w_rx) = session(2);

    for tag in ["x", "y", "z"] {
        vault.acquire(tag.into(), holder.clone()).await.unwrap();
        assert_eq!(vault.acquire(tag.into(), w.clone()).await.unwrap(), AcquireOutcome::Enqueued);
    }

    vault.abandon(1).await;

    let mut granted = Vec::new();
    for _ in 0..3 {
        let tag = tokio::time::timeout(Duration::from_secs(1), w_rx.recv())
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("missing grant"));
        granted.push(tag);
    }
    granted.sort();
    assert_eq!(granted, ["x", "y", "z"]);
}
