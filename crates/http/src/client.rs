//! One long-lived HTTP client per user (§4.3).

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use booking_domain::{Error, Result};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// A per-user HTTP client bound to the upstream base URL, carrying the
/// user's cookie header on every request.
pub struct UserHttpClient {
    base_url: String,
    client: reqwest::Client,
    cookie_header: String,
}

impl UserHttpClient {
    pub fn new(base_url: &str, cookie_header: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cookie_header,
        })
    }

    pub fn set_cookie_header(&mut self, cookie_header: String) {
        self.cookie_header = cookie_header;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn base_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("User-Agent", USER_AGENT.to_string()),
            (
                "Accept",
                "application/json, text/plain, */*".to_string(),
            ),
            ("Referer", format!("{}/pc/", self.base_url)),
            ("Origin", self.base_url.clone()),
            ("Cookie", self.cookie_header.clone()),
        ]
    }

    /// GET a JSON endpoint, raising `UpstreamError` when the status is
    /// outside `expected_status`.
    pub async fn get_json(&self, path: &str, expected_status: &[u16]) -> Result<Value> {
        let mut req = self.client.get(self.url(path));
        for (k, v) in self.base_headers() {
            req = req.header(k, v);
        }
        self.send(req, expected_status).await
    }

    /// POST a form-encoded body.
    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &T,
        expected_status: &[u16],
    ) -> Result<Value> {
        let mut req = self.client.post(self.url(path)).form(form);
        for (k, v) in self.base_headers() {
            req = req.header(k, v);
        }
        self.send(req, expected_status).await
    }

    /// POST a JSON body.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        json: &T,
        expected_status: &[u16],
    ) -> Result<Value> {
        let mut req = self.client.post(self.url(path)).json(json);
        for (k, v) in self.base_headers() {
            req = req.header(k, v);
        }
        self.send(req, expected_status).await
    }

    /// POST a pre-encrypted raw body, as used by order submission (§4.2
    /// step 6), with the additional `sid`/`tim` envelope headers.
    pub async fn post_encrypted_body(
        &self,
        path: &str,
        body: String,
        sid_header: &str,
        tim_header: &str,
        expected_status: &[u16],
    ) -> Result<Value> {
        let mut req = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json;charset=UTF-8")
            .header("sid", sid_header)
            .header("tim", tim_header)
            .body(body);
        for (k, v) in self.base_headers() {
            req = req.header(k, v);
        }
        self.send(req, expected_status).await
    }

    async fn send(&self, req: reqwest::RequestBuilder, expected_status: &[u16]) -> Result<Value> {
        let resp = req.send().await.map_err(from_reqwest)?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(from_reqwest)?;

        if !expected_status.contains(&status) {
            return Err(Error::UpstreamError { status, body: text });
        }

        serde_json::from_str(&text).map_err(|_| Error::UpstreamError {
            status,
            body: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_trims_trailing_slash() {
        let client = UserHttpClient::new("https://sports.example.edu.cn/", "c=1".into(), 10).unwrap();
        assert_eq!(client.base_url, "https://sports.example.edu.cn");
    }

    #[test]
    fn url_joins_base_and_path() {
        let client = UserHttpClient::new("https://sports.example.edu.cn", "c=1".into(), 10).unwrap();
        assert_eq!(
            client.url("/system/user/currentUser"),
            "https://sports.example.edu.cn/system/user/currentUser"
        );
    }
}
