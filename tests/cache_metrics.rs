mod support;

use std::collections::HashSet;

use coinrank::cache::{
    METRIC_CACHE_FAULT_TOTAL, METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL,
    METRIC_CACHE_PRIME_MS,
};
use metrics_util::debugging::DebuggingRecorder;

use support::harness;

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let h = harness();
    h.service.set_bitcoin("BTC", 65_000).await.expect("set");

    // hit on the item entry, miss on the ranking entry
    h.service.get_bitcoin("BTC").await.expect("get");
    h.service.list_ranked().await.expect("list");

    h.service.prime().await.expect("prime");

    h.cache.fail_writes(true);
    h.service.set_bitcoin("ETH", 3_500).await.expect("set");

    let entries = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = entries
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [
        METRIC_CACHE_HIT_TOTAL,
        METRIC_CACHE_MISS_TOTAL,
        METRIC_CACHE_FAULT_TOTAL,
        METRIC_CACHE_PRIME_MS,
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let fault_ops: HashSet<String> = entries
        .iter()
        .filter(|(composite_key, _, _, _)| composite_key.key().name() == METRIC_CACHE_FAULT_TOTAL)
        .flat_map(|(composite_key, _, _, _)| {
            composite_key
                .key()
                .labels()
                .filter(|label| label.key() == "op")
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(fault_ops.contains("write"), "fault labels: {fault_ops:?}");
}
