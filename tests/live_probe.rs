use std::time::Duration;

use cfcheck::{HostChecker, ReqwestProbeHttpClient, probe};
use url::Url;

// Requires outbound network access; run with `cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn cloudflare_site_is_detected() {
    let client = ReqwestProbeHttpClient::new(
        Duration::from_secs(10),
        cfcheck::fingerprint::DEFAULT_USER_AGENT,
    )
    .unwrap();
    let url = Url::parse("https://www.cloudflare.com/").unwrap();

    let result = probe(&client, &url).await.unwrap();
    assert!(result.server_header);
    assert!(result.response_time > 0);
}

#[tokio::test]
#[ignore]
async fn checker_probes_then_serves_from_cache() {
    let checker = HostChecker::builder().build().unwrap();
    let first = checker.check_host("https://www.cloudflare.com/").await.unwrap();
    assert!(first.is_cloudflare());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = checker.check_host("https://www.cloudflare.com/").await.unwrap();
    assert_eq!(first, second);
}
