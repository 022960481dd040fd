//! Interactive login sessions behind the facade's `StartLoginSession /
//! SubmitLoginSessionCode / CancelLoginSession / LoginStatus` methods
//! (§4.12). Built directly on the Session Authenticator's low-level
//! `prepare/fetch_captcha/submit/refresh_captcha` steps (C5), since a
//! human supplies the captcha code asynchronously rather than the
//! synchronous `booking_auth::login` helper's injected-solver flow.
//!
//! Sessions idle out after `idle_timeout` (10 minutes per spec.md §5)
//! and are reaped by [`LoginSessionManager::gc_expired`].

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use booking_auth::{AuthClient, AuthState};
use booking_credentials::CredentialStore;
use booking_domain::config::LoginConfig;
use booking_domain::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginSessionStatus {
    AwaitingCaptcha,
    Success,
    Failed,
}

struct PendingLoginSession {
    id: Uuid,
    username: String,
    password: String,
    state: AuthState,
    attempts: u32,
    status: LoginSessionStatus,
    message: Option<String>,
    last_activity: DateTime<Utc>,
}

/// Serializable snapshot returned to facade callers.
#[derive(Debug, Clone, Serialize)]
pub struct LoginSessionInfo {
    pub session_id: Uuid,
    pub status: LoginSessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_image_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&PendingLoginSession> for LoginSessionInfo {
    fn from(s: &PendingLoginSession) -> Self {
        Self {
            session_id: s.id,
            status: s.status,
            captcha_image_base64: None,
            message: s.message.clone(),
        }
    }
}

pub struct LoginSessionManager {
    client: AuthClient,
    credentials: std::sync::Arc<CredentialStore>,
    bad_captcha_retries: u32,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<Uuid, PendingLoginSession>>,
}

impl LoginSessionManager {
    pub fn new(cfg: LoginConfig, credentials: std::sync::Arc<CredentialStore>, idle_timeout: Duration) -> Result<Self> {
        let bad_captcha_retries = cfg.bad_captcha_retries;
        Ok(Self {
            client: AuthClient::new(cfg)?,
            credentials,
            bad_captcha_retries,
            idle_timeout,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// `StartLoginSession(username, password)`: prepares the upstream
    /// login form. If a captcha is required the session parks awaiting
    /// a code; otherwise submit is attempted immediately.
    pub async fn start(&self, username: String, password: String) -> Result<LoginSessionInfo> {
        let state = self.client.prepare().await?;
        let id = Uuid::new_v4();

        let mut session = PendingLoginSession {
            id,
            username: username.clone(),
            password: password.clone(),
            state,
            attempts: 0,
            status: LoginSessionStatus::AwaitingCaptcha,
            message: None,
            last_activity: Utc::now(),
        };

        if !session.state.captcha_required {
            return self.finish_submit(session, None).await;
        }

        let image = self.client.fetch_captcha(&session.state).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let info = LoginSessionInfo {
            session_id: id,
            status: LoginSessionStatus::AwaitingCaptcha,
            captcha_image_base64: Some(encoded),
            message: None,
        };
        session.last_activity = Utc::now();
        self.sessions.write().insert(id, session);
        Ok(info)
    }

    /// `SubmitLoginSessionCode(session_id, code)`: submits the captured
    /// form plus the human-provided captcha text. A `BadCaptcha` result
    /// re-fetches a fresh image and keeps the session awaiting another
    /// code, up to `bad_captcha_retries`.
    pub async fn submit_code(&self, session_id: Uuid, code: Option<String>) -> Result<LoginSessionInfo> {
        let session = {
            let mut sessions = self.sessions.write();
            sessions.remove(&session_id)
        };
        let Some(mut session) = session else {
            return Err(Error::Other(format!("no pending login session {session_id}")));
        };
        session.last_activity = Utc::now();
        self.finish_submit(session, code).await
    }

    async fn finish_submit(&self, mut session: PendingLoginSession, code: Option<String>) -> Result<LoginSessionInfo> {
        match self
            .client
            .submit(&session.state, &session.username, &session.password, code.as_deref())
            .await
        {
            Ok(result) => {
                self.credentials.save(
                    result.cookie,
                    Some(result.expires_at),
                    Some(session.username.clone()),
                    None,
                )?;
                let info = LoginSessionInfo {
                    session_id: session.id,
                    status: LoginSessionStatus::Success,
                    captcha_image_base64: None,
                    message: Some("登录成功".into()),
                };
                Ok(info)
            }
            Err(Error::BadCaptcha { .. }) => {
                session.attempts += 1;
                if session.attempts > self.bad_captcha_retries {
                    return Ok(LoginSessionInfo {
                        session_id: session.id,
                        status: LoginSessionStatus::Failed,
                        captcha_image_base64: None,
                        message: Some("验证码多次错误，登录失败".into()),
                    });
                }
                self.client.refresh_captcha(&mut session.state).await?;
                let image = self.client.fetch_captcha(&session.state).await?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(image);
                let info = LoginSessionInfo {
                    session_id: session.id,
                    status: LoginSessionStatus::AwaitingCaptcha,
                    captcha_image_base64: Some(encoded),
                    message: Some("验证码错误，请重试".into()),
                };
                self.sessions.write().insert(session.id, session);
                Ok(info)
            }
            Err(e) => Ok(LoginSessionInfo {
                session_id: session.id,
                status: LoginSessionStatus::Failed,
                captcha_image_base64: None,
                message: Some(e.to_string()),
            }),
        }
    }

    /// `CancelLoginSession(session_id) → bool`.
    pub fn cancel(&self, session_id: Uuid) -> bool {
        self.sessions.write().remove(&session_id).is_some()
    }

    /// `LoginStatus(session_id) → info?`.
    pub fn status(&self, session_id: Uuid) -> Option<LoginSessionInfo> {
        self.sessions.read().get(&session_id).map(LoginSessionInfo::from)
    }

    /// Evicts sessions idle for longer than `idle_timeout` (§5).
    pub fn gc_expired(&self) {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.idle_timeout).unwrap_or(chrono::Duration::minutes(10));
        self.sessions.write().retain(|_, s| s.last_activity > cutoff);
    }
}
