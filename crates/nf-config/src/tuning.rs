use serde_json::Value;

/// Polling/scoring/publishing tunables, read from the layered config with the
/// spec's defaults filled in when a pointer is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineTuning {
    pub min_interval_seconds: i64,
    pub max_interval_seconds: i64,
    pub default_interval_seconds: i64,
    pub adjust_step_seconds: i64,

    pub poll_idle_sleep_seconds: u64,
    pub score_idle_sleep_seconds: u64,
    pub publish_idle_sleep_seconds: u64,

    pub ranker_timeout_seconds: u64,
    pub publish_threshold: f64,
    pub rate_limit_backoff_seconds: i64,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        PipelineTuning {
            min_interval_seconds: 300,
            max_interval_seconds: 14_400,
            default_interval_seconds: 3_600,
            adjust_step_seconds: 60,

            poll_idle_sleep_seconds: 60,
            score_idle_sleep_seconds: 60,
            publish_idle_sleep_seconds: 60,

            ranker_timeout_seconds: 120,
            publish_threshold: 8.0,
            rate_limit_backoff_seconds: 300,
        }
    }
}

impl PipelineTuning {
    /// Overlay values found under `/pipeline/*` in the loaded config JSON on
    /// top of the defaults. Missing or malformed pointers keep the default.
    pub fn from_config(config_json: &Value) -> Self {
        let mut t = PipelineTuning::default();

        if let Some(v) = read_i64_at(config_json, "/pipeline/min_interval_seconds") {
            t.min_interval_seconds = v;
        }
        if let Some(v) = read_i64_at(config_json, "/pipeline/max_interval_seconds") {
            t.max_interval_seconds = v;
        }
        if let Some(v) = read_i64_at(config_json, "/pipeline/default_interval_seconds") {
            t.default_interval_seconds = v;
        }
        if let Some(v) = read_i64_at(config_json, "/pipeline/adjust_step_seconds") {
            t.adjust_step_seconds = v;
        }
        if let Some(v) = read_i64_at(config_json, "/pipeline/poll_idle_sleep_seconds") {
            t.poll_idle_sleep_seconds = v as u64;
        }
        if let Some(v) = read_i64_at(config_json, "/pipeline/score_idle_sleep_seconds") {
            t.score_idle_sleep_seconds = v as u64;
        }
        if let Some(v) = read_i64_at(config_json, "/pipeline/publish_idle_sleep_seconds") {
            t.publish_idle_sleep_seconds = v as u64;
        }
        if let Some(v) = read_i64_at(config_json, "/pipeline/ranker_timeout_seconds") {
            t.ranker_timeout_seconds = v as u64;
        }
        if let Some(v) = read_f64_at(config_json, "/pipeline/publish_threshold") {
            t.publish_threshold = v;
        }
        if let Some(v) = read_i64_at(config_json, "/pipeline/rate_limit_backoff_seconds") {
            t.rate_limit_backoff_seconds = v;
        }

        t
    }

    /// Clamp a candidate interval into `[min_interval_seconds, max_interval_seconds]`.
    pub fn clamp_interval(&self, candidate: i64) -> i64 {
        candidate.clamp(self.min_interval_seconds, self.max_interval_seconds)
    }
}

fn read_i64_at(config: &Value, pointer: &str) -> Option<i64> {
    config.pointer(pointer)?.as_i64()
}

fn read_f64_at(config: &Value, pointer: &str) -> Option<f64> {
    config.pointer(pointer)?.as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let t = PipelineTuning::default();
        assert_eq!(t.min_interval_seconds, 300);
        assert_eq!(t.max_interval_seconds, 14_400);
        assert_eq!(t.default_interval_seconds, 3_600);
        assert_eq!(t.adjust_step_seconds, 60);
        assert_eq!(t.publish_threshold, 8.0);
        assert_eq!(t.rate_limit_backoff_seconds, 300);
    }

    #[test]
    fn from_config_overlays_only_present_pointers() {
        let json = serde_json::json!({"pipeline": {"publish_threshold": 6.5}});
        let t = PipelineTuning::from_config(&json);
        assert_eq!(t.publish_threshold, 6.5);
        assert_eq!(t.min_interval_seconds, 300);
    }

    #[test]
    fn clamp_interval_respects_bounds() {
        let t = PipelineTuning::default();
        assert_eq!(t.clamp_interval(100), 300);
        assert_eq!(t.clamp_interval(999_999), 14_400);
        assert_eq!(t.clamp_interval(4_000), 4_000);
    }
}
