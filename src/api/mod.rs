//! Stateless upstream endpoints. Each call takes the shared `reqwest::Client`
//! and a retry policy; services above this layer own config and rate limits.

pub mod heygen;
pub mod livekit;
pub mod openai;

use crate::error::LiveAgentError;
use backon::ExponentialBuilder;
use std::time::Duration;
use url::Url;

pub fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Join `path` onto `base` treating `base` as a directory, so
/// `https://host/v1` + `embeddings` keeps the `v1` segment.
pub fn endpoint(base: &Url, path: &str) -> Result<Url, LiveAgentError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

/// Build the shared outbound HTTP client.
pub fn build_http_client(proxy: Option<&Url>) -> Result<reqwest::Client, LiveAgentError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("live-agent/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(60));
    if let Some(proxy_url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}

/// Local stand-in for upstream APIs: serves `router` on an ephemeral port.
#[cfg(test)]
pub(crate) async fn serve_local(router: axum::Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// One attempt, no sleeping; keeps upstream tests fast.
#[cfg(test)]
pub(crate) fn no_retry() -> ExponentialBuilder {
    ExponentialBuilder::default().with_max_times(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path_segment() {
        let base = Url::parse("https://api.openai.com/v1").unwrap();
        assert_eq!(
            endpoint(&base, "chat/completions").unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        let base = Url::parse("https://api.heygen.com/").unwrap();
        assert_eq!(
            endpoint(&base, "/v1/streaming.create_token").unwrap().as_str(),
            "https://api.heygen.com/v1/streaming.create_token"
        );
    }
}
