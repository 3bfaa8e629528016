use super::config::TimeoutConfig;
use tower_http::timeout::TimeoutLayer;

/// Build the whole-request timeout layer, if enabled
///
/// A request that runs past the limit is answered with 408 and its handler
/// future is dropped.
pub fn build_timeout_layer(config: &TimeoutConfig) -> Option<TimeoutLayer> {
    config.enabled.then(|| TimeoutLayer::new(config.duration()))
}
