//! Prometheus metrics for the asset pipeline.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Registry holding every pipeline metric.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static IMAGES_PROMOTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encore_images_promoted_total",
        "Total number of images moved from staging to their permanent location",
    )
    .expect("metric creation failed")
});

pub static PROMOTION_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encore_promotion_failures_total",
        "Total number of promotions that failed",
    )
    .expect("metric creation failed")
});

pub static VARIANTS_GENERATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encore_variants_generated_total",
        "Total number of derivative images uploaded",
    )
    .expect("metric creation failed")
});

pub static VARIANT_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encore_variant_failures_total",
        "Total number of variant generation runs that failed",
    )
    .expect("metric creation failed")
});

pub static IMAGES_RECLAIMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encore_images_reclaimed_total",
        "Total number of orphaned images soft-deleted",
    )
    .expect("metric creation failed")
});

pub static DEFERRED_TASK_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encore_deferred_task_failures_total",
        "Total number of after-commit tasks that failed",
    )
    .expect("metric creation failed")
});

pub static EXISTENCE_WAIT_GIVE_UPS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encore_existence_wait_give_ups_total",
        "Total number of existence waits that exhausted their attempts",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with [`REGISTRY`]. Idempotent.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let counters: [&IntCounter; 7] = [
            &IMAGES_PROMOTED,
            &PROMOTION_FAILURES,
            &VARIANTS_GENERATED,
            &VARIANT_FAILURES,
            &IMAGES_RECLAIMED,
            &DEFERRED_TASK_FAILURES,
            &EXISTENCE_WAIT_GIVE_UPS,
        ];
        for counter in counters {
            REGISTRY
                .register(Box::new(counter.clone()))
                .expect("metric registration failed");
        }
    });
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_text() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
