//! Shared HTTP client construction.

use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "PARLEY_DISABLE_SYSTEM_PROXY";

/// Build the HTTP client used for provider and channel APIs.
///
/// Setting `PARLEY_DISABLE_SYSTEM_PROXY` bypasses system proxy settings.
pub fn build_http_client() -> Client {
    if should_disable_system_proxy() {
        Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|_| Client::new())
    } else {
        Client::new()
    }
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(any(test, feature = "test-utils"))
}
