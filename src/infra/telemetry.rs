use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "boardstore_config_global_writes_total",
            Unit::Count,
            "Total number of global configuration replacements."
        );
        describe_counter!(
            "boardstore_config_board_writes_total",
            Unit::Count,
            "Total number of board configuration writes, by outcome."
        );
        describe_counter!(
            "boardstore_config_board_removals_total",
            Unit::Count,
            "Total number of board removals."
        );
        describe_gauge!(
            "boardstore_config_event_queue_len",
            Unit::Count,
            "Current number of pending configuration events."
        );
        describe_counter!(
            "boardstore_config_event_dropped_total",
            Unit::Count,
            "Total number of configuration events dropped because the queue was full."
        );
        describe_counter!(
            "boardstore_render_cache_hit_total",
            Unit::Count,
            "Total number of render cache hits."
        );
        describe_counter!(
            "boardstore_render_cache_miss_total",
            Unit::Count,
            "Total number of render cache misses."
        );
        describe_counter!(
            "boardstore_delivery_not_modified_total",
            Unit::Count,
            "Total number of requests answered with 304 Not Modified."
        );
        describe_counter!(
            "boardstore_delivery_rendered_total",
            Unit::Count,
            "Total number of requests answered with a rendered document."
        );
        describe_histogram!(
            "boardstore_delivery_ms",
            Unit::Milliseconds,
            "Conditional delivery latency in milliseconds."
        );
    });
}
