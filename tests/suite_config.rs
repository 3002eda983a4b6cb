//! The helper reads the process-wide suite configuration

use hyperfleet_e2e::config::{clear_suite_config, ConfigError};
use hyperfleet_e2e::error::E2eError;
use hyperfleet_e2e::helper::Helper;

#[tokio::test]
async fn test_connect_without_suite_config_fails() {
    clear_suite_config();

    let err = Helper::connect_suite().await.unwrap_err();

    assert!(
        matches!(err, E2eError::Config(ConfigError::SuiteUnset)),
        "got {err}"
    );
}
