//! Display API client (kiosk → GFD backend).
//!
//! The kiosk is identified by the `deviceId` cookie on every request. A
//! one-time passcode is only sent on the first pairing; later connections
//! are resolved from the device mapping the backend keeps for the cookie.

use std::time::Duration;

use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, COOKIE};
use reqwest::Client;
use url::Url;

use super::stream::EventStream;
use super::ClientError;

/// Name of the cookie carrying the device identity.
pub const DEVICE_COOKIE: &str = "deviceId";

/// Header used to resume a stream after the last delivered event.
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// `GET` endpoint opening the event stream.
pub const CONNECT_PATH: &str = "/api/sse/connect";

/// `POST` endpoint tearing the device session down.
pub const DISCONNECT_PATH: &str = "/api/sse/disconnect";

/// Default time limit for the disconnect request.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Typed HTTP client for the GFD **Display API**.
#[derive(Debug, Clone)]
pub struct DisplayClient {
    http: Client,
    base_url: Url,
    disconnect_timeout: Duration,
}

impl DisplayClient {
    /// Create a new `DisplayClient`.
    ///
    /// * `base_url` – root URL of the GFD backend (e.g. `http://localhost:8081`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
            disconnect_timeout: DISCONNECT_TIMEOUT,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure a proxy). Do not set a total request timeout: it would
    /// cut the long-lived event stream.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Change how long [`disconnect`](Self::disconnect) waits for the
    /// backend.
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// A client for another backend that shares this client's connection
    /// pool.
    pub fn with_base_url(&self, base_url: Url) -> Self {
        Self {
            http: self.http.clone(),
            base_url,
            disconnect_timeout: self.disconnect_timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base_url}/api/sse/connect[?otp=...]`.
    ///
    /// The OTP is percent-encoded the way `encodeURIComponent` does it.
    pub fn connect_url(&self, otp: Option<&str>) -> Result<Url, ClientError> {
        let mut url = self.base_url.join(CONNECT_PATH)?;
        match otp.filter(|otp| !otp.is_empty()) {
            Some(otp) => url.set_query(Some(&format!("otp={}", urlencoding::encode(otp)))),
            None => url.set_query(None),
        }
        Ok(url)
    }

    /// `GET /api/sse/connect` – open the device's event stream.
    ///
    /// Fails with [`ClientError::Api`] when the backend rejects the device
    /// or the OTP.
    pub async fn open_stream(
        &self,
        device_id: &str,
        otp: Option<&str>,
        last_event_id: Option<&str>,
    ) -> Result<EventStream, ClientError> {
        let url = self.connect_url(otp)?;
        tracing::debug!(
            base_url = %self.base_url,
            with_otp = otp.is_some_and(|otp| !otp.is_empty()),
            resume_from = last_event_id,
            "Opening event stream"
        );

        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(COOKIE, device_cookie(device_id));
        if let Some(id) = last_event_id {
            request = request.header(LAST_EVENT_ID_HEADER, id);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.starts_with("text/event-stream") {
            return Err(ClientError::UnexpectedContentType(content_type));
        }

        Ok(EventStream::new(resp))
    }

    /// `POST /api/sse/disconnect` – end the device session on the backend.
    ///
    /// Gives up with [`ClientError::Http`] once the disconnect timeout
    /// passes.
    pub async fn disconnect(&self, device_id: &str) -> Result<(), ClientError> {
        let url = self.base_url.join(DISCONNECT_PATH)?;
        tracing::debug!(base_url = %self.base_url, "Requesting server-side disconnect");

        let resp = self
            .http
            .post(url)
            .header(COOKIE, device_cookie(device_id))
            .timeout(self.disconnect_timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }
}

fn device_cookie(device_id: &str) -> String {
    format!("{DEVICE_COOKIE}={device_id}")
}
