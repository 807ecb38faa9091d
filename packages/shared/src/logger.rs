//! Logging setup for the Selah client binaries.

use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Crates whose logs are enabled by default, besides the binary itself
const LIBRARY_TARGETS: [&str; 2] = ["selah_client", "selah_shared"];

/// Install the global tracing subscriber.
///
/// Logs go to stderr so they never interleave with the interactive prompt on
/// stdout. The filter can be overridden using the `RUST_LOG` environment
/// variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "selah-client")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use selah_shared::logger::setup_logger;
///
/// setup_logger("selah-client", "info").expect("logger already installed");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(binary_name, default_log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
}

fn default_directive(binary_name: &str, level: &str) -> String {
    let binary_target = binary_name.replace('-', "_");
    let mut targets: Vec<&str> = LIBRARY_TARGETS.to_vec();
    if !targets.contains(&binary_target.as_str()) {
        targets.push(&binary_target);
    }
    targets
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_covers_libraries_and_binary() {
        // テスト項目: デフォルトのフィルタはライブラリとバイナリの両方に同じレベルを設定する
        // given (前提条件):
        let binary = "selah-probe";

        // when (操作):
        let directive = default_directive(binary, "debug");

        // then (期待する結果):
        assert_eq!(
            directive,
            "selah_client=debug,selah_shared=debug,selah_probe=debug"
        );
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn test_default_directive_does_not_repeat_library_binary() {
        // テスト項目: バイナリ名がライブラリと同じ場合は重複しない
        // given (前提条件):
        let binary = "selah-client";

        // when (操作):
        let directive = default_directive(binary, "warn");

        // then (期待する結果):
        assert_eq!(directive, "selah_client=warn,selah_shared=warn");
    }
}
