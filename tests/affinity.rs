//! End-to-end session affinity tests.

use std::time::Duration;

mod common;

use common::{client, get, services, session_id, start_proxy, start_upstream, test_settings};

#[tokio::test]
async fn sessions_pin_to_distinct_upstreams() {
    let a = start_upstream("A").await;
    let b = start_upstream("B").await;
    let (proxy, shutdown) = start_proxy(services("svc.local", &[a, b]), test_settings()).await;
    let client = client();

    let r1 = get(&client, proxy, "svc.local", "/", None).await;
    assert_eq!(r1.status(), 200);
    let s1 = session_id(&r1).expect("first session cookie");
    let first = r1.text().await.unwrap();

    let r2 = get(&client, proxy, "svc.local", "/", None).await;
    let s2 = session_id(&r2).expect("second session cookie");
    let second = r2.text().await.unwrap();

    assert_ne!(s1, s2);
    assert_ne!(first, second, "two live sessions share one upstream");

    for _ in 0..5 {
        let cookie = format!("lbc_session_id={}", s1);
        let r = get(&client, proxy, "svc.local", "/", Some(&cookie)).await;
        assert_eq!(session_id(&r).as_deref(), Some(s1.as_str()));
        assert_eq!(r.text().await.unwrap(), first);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn exhausted_pool_waits_for_a_close() {
    let a = start_upstream("A").await;
    let (proxy, shutdown) = start_proxy(services("svc.local", &[a]), test_settings()).await;
    let client = client();

    let r1 = get(&client, proxy, "svc.local", "/", None).await;
    let s1 = session_id(&r1).unwrap();

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { get(&client, proxy, "svc.local", "/", None).await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished(), "new session did not wait for capacity");

    let close = format!("lbc_session_id={}; lbc_close=1", s1);
    let closed = get(&client, proxy, "svc.local", "/", Some(&close)).await;
    assert_eq!(closed.status(), 200);
    assert_eq!(closed.text().await.unwrap(), "session closed");

    let r2 = waiter.await.unwrap();
    assert_eq!(r2.status(), 200);
    let s2 = session_id(&r2).unwrap();
    assert_ne!(s1, s2);
    assert_eq!(r2.text().await.unwrap(), "A");

    shutdown.trigger();
}

#[tokio::test]
async fn acquire_timeout_reports_exhaustion() {
    let a = start_upstream("A").await;
    let mut settings = test_settings();
    settings.timeouts.acquire_ms = 100;
    let (proxy, shutdown) = start_proxy(services("svc.local", &[a]), settings).await;
    let client = client();

    let r1 = get(&client, proxy, "svc.local", "/", None).await;
    assert!(session_id(&r1).is_some());

    let r2 = get(&client, proxy, "svc.local", "/", None).await;
    assert_eq!(r2.status(), 500);
    assert!(session_id(&r2).is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn closed_session_is_forgotten() {
    let a = start_upstream("A").await;
    let (proxy, shutdown) = start_proxy(services("svc.local", &[a]), test_settings()).await;
    let client = client();

    let s1 = session_id(&get(&client, proxy, "svc.local", "/", None).await).unwrap();
    let close = format!("lbc_session_id={}; lbc_close=1", s1);
    let closed = get(&client, proxy, "svc.local", "/", Some(&close)).await;
    let expired = closed
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    assert!(expired.contains("Max-Age=0"));

    let cookie = format!("lbc_session_id={}", s1);
    let stale = get(&client, proxy, "svc.local", "/", Some(&cookie)).await;
    assert_eq!(stale.status(), 500);
    let body = stale.text().await.unwrap();
    assert!(body.contains("session not found"));
    assert!(!body.contains(&s1));

    shutdown.trigger();
}

#[tokio::test]
async fn unknown_host_is_rejected() {
    let a = start_upstream("A").await;
    let (proxy, shutdown) = start_proxy(services("svc.local", &[a]), test_settings()).await;

    let r = get(&client(), proxy, "other.local", "/", None).await;
    assert_eq!(r.status(), 500);
    assert!(r.text().await.unwrap().contains("other.local"));

    shutdown.trigger();
}

#[tokio::test]
async fn host_with_port_matches_configured_name() {
    let a = start_upstream("A").await;
    let (proxy, shutdown) = start_proxy(services("svc.local", &[a]), test_settings()).await;

    let r = get(&client(), proxy, "svc.local:8070", "/", None).await;
    assert_eq!(r.status(), 200);
    assert_eq!(r.text().await.unwrap(), "A");

    shutdown.trigger();
}

#[tokio::test]
async fn session_cookies_are_not_forwarded() {
    let a = start_upstream("A").await;
    let (proxy, shutdown) = start_proxy(services("svc.local", &[a]), test_settings()).await;
    let client = client();

    let s1 = session_id(&get(&client, proxy, "svc.local", "/", None).await).unwrap();
    let cookie = format!("theme=dark; lbc_session_id={}", s1);
    let r = get(&client, proxy, "svc.local", "/cookies", Some(&cookie)).await;
    assert_eq!(r.text().await.unwrap(), "theme=dark");

    shutdown.trigger();
}

#[tokio::test]
async fn concurrent_requests_share_one_lease() {
    let a = start_upstream("A").await;
    let (proxy, shutdown) = start_proxy(services("svc.local", &[a]), test_settings()).await;
    let client = client();

    let s1 = session_id(&get(&client, proxy, "svc.local", "/", None).await).unwrap();
    let cookie = format!("lbc_session_id={}", s1);

    let requests = (0..4).map(|_| {
        let client = client.clone();
        let cookie = cookie.clone();
        async move { get(&client, proxy, "svc.local", "/slow", Some(&cookie)).await }
    });
    let responses = futures_util::future::join_all(requests).await;
    for r in responses {
        assert_eq!(r.status(), 200);
        assert_eq!(r.text().await.unwrap(), "A");
    }

    shutdown.trigger();
}
