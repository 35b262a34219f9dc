use std::sync::OnceLock;

use brochure_common::observability::{LogConfig, LogFormat};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

#[allow(dead_code)]
pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "brochure-tests",
            emit_stderr: true,
            format: LogFormat::from_env(),
            default_filter: "debug",
            ..LogConfig::default()
        };

        brochure_common::observability::init_logging(config).unwrap_or_default()
    });
}
