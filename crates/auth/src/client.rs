//! Session Authenticator (C5): `Prepare -> (AwaitCaptcha) -> Submit -> Follow
//! -> Done/Failed`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::redirect::Policy;

use booking_domain::config::LoginConfig;
use booking_domain::{Error, Result};

use crate::scrape::{extract_captcha_info, extract_error_message, extract_form_action, parse_hidden_inputs};
use crate::solver::{should_accept_low_confidence, CaptchaSolver, HumanFallback};

/// State accumulated across the login flow, mirroring the upstream CAS
/// form: hidden fields, the resolved submit action, and captcha
/// bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub submit_url: Option<String>,
    pub form: HashMap<String, String>,
    pub captcha_required: bool,
    pub captcha_image_url: Option<String>,
    pub captcha_uuid: Option<String>,
    pub referer: Option<String>,
}

pub struct AuthResult {
    pub cookie: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthClient {
    http: reqwest::Client,
    cfg: LoginConfig,
}

impl AuthClient {
    pub fn new(cfg: LoginConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .cookie_store(true)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| Error::Config(format!("failed to build auth http client: {e}")))?;
        Ok(Self { http, cfg })
    }

    /// Fetches the login page and scrapes the hidden form fields, submit
    /// action, and (if present) captcha image reference.
    pub async fn prepare(&self) -> Result<AuthState> {
        let login_url = self
            .cfg
            .login_url
            .as_deref()
            .ok_or_else(|| Error::Config("login.login_url is not configured".into()))?;

        let mut url = login_url.to_string();
        let mut hops = 0;
        let html = loop {
            let resp = self.http.get(&url).send().await.map_err(from_reqwest)?;
            if resp.status().is_redirection() {
                hops += 1;
                if hops > self.cfg.prepare_max_redirects {
                    return Err(Error::LoginRejected("too many redirects during prepare".into()));
                }
                let location = resp
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| Error::LoginRejected("redirect without Location header".into()))?
                    .to_string();
                url = resolve_location(&url, &location);
                continue;
            }
            break resp.text().await.map_err(from_reqwest)?;
        };

        let form = parse_hidden_inputs(&html);
        let submit_url = extract_form_action(&html).map(|action| resolve_location(&url, &action));
        let (captcha_image_url, captcha_uuid) = extract_captcha_info(&html);

        Ok(AuthState {
            submit_url,
            form,
            captcha_required: captcha_image_url.is_some(),
            captcha_image_url,
            captcha_uuid,
            referer: Some(url),
        })
    }

    /// Downloads the current captcha image bytes, appending `uuid` and a
    /// cache-busting `_ts` to the image URL and sending the prepare URL
    /// as `Referer`, as §4.5's "Fetch Captcha" step requires.
    pub async fn fetch_captcha(&self, state: &AuthState) -> Result<Vec<u8>> {
        let src = state
            .captcha_image_url
            .as_deref()
            .ok_or_else(|| Error::Other("no captcha pending".into()))?;
        let url = captcha_request_url(src, state.captcha_uuid.as_deref());
        let mut req = self.http.get(&url);
        if let Some(referer) = &state.referer {
            req = req.header(reqwest::header::REFERER, referer.clone());
        }
        let resp = req.send().await.map_err(from_reqwest)?;
        resp.bytes().await.map(|b| b.to_vec()).map_err(from_reqwest)
    }

    /// Re-fetches only the captcha image for a `BadCaptcha` retry: same
    /// `captcha_image_url`/`uuid` as `fetch_captcha`, never re-running
    /// `prepare` (§4.5, §8: "re-fetch the image but do not re-Prepare").
    /// If the upstream rotates the captcha's `uuid` via `Set-Cookie` on
    /// this request, `state.captcha_uuid` is updated from that cookie.
    pub async fn refresh_captcha(&self, state: &mut AuthState) -> Result<Vec<u8>> {
        let src = state
            .captcha_image_url
            .as_deref()
            .ok_or_else(|| Error::Other("no captcha pending".into()))?;
        let url = captcha_request_url(src, state.captcha_uuid.as_deref());
        let mut req = self.http.get(&url);
        if let Some(referer) = &state.referer {
            req = req.header(reqwest::header::REFERER, referer.clone());
        }
        let resp = req.send().await.map_err(from_reqwest)?;
        if let Some(uuid) = extract_uuid_cookie(&resp) {
            state.captcha_uuid = Some(uuid);
        }
        resp.bytes().await.map(|b| b.to_vec()).map_err(from_reqwest)
    }

    /// Submits the login form and, on success, manually follows the
    /// resulting redirect chain to mint the session cookie.
    pub async fn submit(
        &self,
        state: &AuthState,
        username: &str,
        password: &str,
        captcha_text: Option<&str>,
    ) -> Result<AuthResult> {
        let submit_url = state
            .submit_url
            .as_deref()
            .ok_or_else(|| Error::LoginRejected("no submit action resolved".into()))?;

        let mut form = state.form.clone();
        form.insert("username".to_string(), username.to_string());
        form.insert("password".to_string(), password.to_string());
        if let Some(code) = captcha_text {
            form.insert("captcha".to_string(), code.to_string());
            if let Some(uuid) = &state.captcha_uuid {
                form.insert("uuid".to_string(), uuid.clone());
            }
        }

        let mut req = self.http.post(submit_url).form(&form);
        if let Some(referer) = &state.referer {
            req = req.header(reqwest::header::REFERER, referer.clone());
        }
        let resp = req.send().await.map_err(from_reqwest)?;

        if !resp.status().is_redirection() {
            let body = resp.text().await.unwrap_or_default();
            if let Some(msg) = extract_error_message(&body) {
                if msg.contains("验证码") {
                    return Err(Error::BadCaptcha { attempts: 1 });
                }
                return Err(Error::LoginRejected(msg));
            }
            return Err(Error::LoginRejected("login form rejected with no redirect".into()));
        }

        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::LoginRejected("submit succeeded but no Location header".into()))?
            .to_string();

        self.follow_redirects(submit_url, &location).await
    }

    /// Manually walks the post-submit redirect chain until a
    /// non-redirect response is reached, then returns the accumulated
    /// cookie jar contents as a single `Cookie` header value.
    async fn follow_redirects(&self, from: &str, first_location: &str) -> Result<AuthResult> {
        let mut url = resolve_location(from, first_location);
        let mut hops = 0;
        loop {
            let resp = self.http.get(&url).send().await.map_err(from_reqwest)?;
            let cookies: Vec<String> = resp
                .headers()
                .get_all(reqwest::header::SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(|s| s.split(';').next().unwrap_or(s).to_string())
                .collect();
            if !cookies.is_empty() {
                let expires_at = Utc::now() + chrono::Duration::hours(self.cfg.session_ttl_hours);
                return Ok(AuthResult {
                    cookie: cookies.join("; "),
                    expires_at,
                });
            }
            if !resp.status().is_redirection() {
                return Err(Error::LoginRejected(
                    "redirect chain ended without issuing a session cookie".into(),
                ));
            }
            hops += 1;
            if hops > self.cfg.follow_max_redirects {
                return Err(Error::LoginRejected("too many redirects following login".into()));
            }
            let location = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| Error::LoginRejected("redirect without Location header".into()))?
                .to_string();
            url = resolve_location(&url, &location);
        }
    }
}

/// Appends `uuid` (when known) and a millisecond cache-busting `_ts` to
/// a captcha image URL (§4.5 "Fetch Captcha").
fn captcha_request_url(src: &str, uuid: Option<&str>) -> String {
    let ts = Utc::now().timestamp_millis();
    let sep = if src.contains('?') { '&' } else { '?' };
    match uuid {
        Some(uuid) if !src.contains("uuid=") => format!("{src}{sep}uuid={uuid}&_ts={ts}"),
        _ => format!("{src}{sep}_ts={ts}"),
    }
}

/// Scans `Set-Cookie` response headers for a `uuid=` cookie, used to
/// pick up a rotated captcha `uuid` without re-running `prepare`.
fn extract_uuid_cookie(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            raw.split(';')
                .next()
                .and_then(|kv| kv.trim().strip_prefix("uuid="))
                .map(|v| v.to_string())
        })
}

fn resolve_location(base: &str, location: &str) -> String {
    reqwest::Url::parse(base)
        .and_then(|b| b.join(location))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Orchestrates a full login attempt, solving captchas via `solver` and
/// falling back to `fallback` when confidence is too low to try
/// automatically (§4.5).
pub async fn login(
    client: &AuthClient,
    username: &str,
    password: &str,
    solver: Option<&dyn CaptchaSolver>,
    fallback: Option<&dyn HumanFallback>,
) -> Result<AuthResult> {
    let mut state = client.prepare().await?;
    let mut attempt = 0;
    let mut pending_image: Option<Vec<u8>> = None;

    loop {
        let captcha_text = if state.captcha_required {
            let image = match pending_image.take() {
                Some(bytes) => bytes,
                None => client.fetch_captcha(&state).await?,
            };
            let text = match solver {
                Some(solver) => {
                    let (text, confidence) = solver.solve(&image).await?;
                    if confidence >= client_threshold(client)
                        || should_accept_low_confidence(&text, confidence, client_threshold(client))
                    {
                        text
                    } else if let Some(fallback) = fallback {
                        fallback.resolve(&image).await?
                    } else {
                        return Err(Error::BadCaptcha { attempts: attempt });
                    }
                }
                None => match fallback {
                    Some(fallback) => fallback.resolve(&image).await?,
                    None => return Err(Error::Config("captcha required but no solver configured".into())),
                },
            };
            Some(text)
        } else {
            None
        };

        match client.submit(&state, username, password, captcha_text.as_deref()).await {
            Ok(result) => return Ok(result),
            Err(Error::BadCaptcha { .. }) => {
                attempt += 1;
                if attempt > client.cfg.bad_captcha_retries {
                    return Err(Error::BadCaptcha { attempts: attempt });
                }
                pending_image = Some(client.refresh_captcha(&mut state).await?);
                continue;
            }
            Err(other) => return Err(other),
        }
    }
}

fn client_threshold(client: &AuthClient) -> f64 {
    client.cfg.captcha_confidence_threshold as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_location_joins_relative_path() {
        let resolved = resolve_location("https://sports.example.edu.cn/cas/login", "/cas/success?ticket=1");
        assert_eq!(resolved, "https://sports.example.edu.cn/cas/success?ticket=1");
    }

    #[test]
    fn resolve_location_passes_through_absolute_url() {
        let resolved = resolve_location("https://a.example.edu.cn/x", "https://b.example.edu.cn/y");
        assert_eq!(resolved, "https://b.example.edu.cn/y");
    }

    #[test]
    fn captcha_request_url_appends_uuid_and_ts() {
        let url = captcha_request_url("https://sports.example.edu.cn/cas/captcha", Some("abc-123"));
        assert!(url.starts_with("https://sports.example.edu.cn/cas/captcha?uuid=abc-123&_ts="));
    }

    #[test]
    fn captcha_request_url_uses_ampersand_when_query_already_present() {
        let url = captcha_request_url("https://sports.example.edu.cn/cas/captcha?uuid=abc-123", Some("abc-123"));
        assert!(url.starts_with("https://sports.example.edu.cn/cas/captcha?uuid=abc-123&_ts="));
        assert!(!url.contains("uuid=abc-123&uuid="));
    }

    #[test]
    fn captcha_request_url_without_uuid_only_adds_ts() {
        let url = captcha_request_url("https://sports.example.edu.cn/cas/captcha", None);
        assert!(url.starts_with("https://sports.example.edu.cn/cas/captcha?_ts="));
    }
}
