//! プローブ用認証情報プロバイダー
//!
//! 監視対象サービスのログインAPIからBearerトークンを取得し、プロセス内でキャッシュする。
//! 認証系ステータスでプローブが失敗したら`invalidate()`し、次のサイクルで取り直す（遅延リフレッシュ）。

use crate::common::error::{MonitorError, MonitorResult};
use crate::config::{MonitorConfig, ProbeAccount};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Bearerトークン
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// トークン文字列から作成
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// `Authorization` ヘッダー値
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// 認証情報プロバイダー
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// キャッシュ済みのトークンを返す。なければ取得する
    async fn ensure_credential(&self) -> MonitorResult<Credential>;

    /// キャッシュを破棄する（次回の`ensure_credential`で再取得）
    async fn invalidate(&self);
}

/// ログインリクエスト
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// ログインレスポンス（`token`以外は無視）
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// ログインAPIを叩いてトークンを取得するプロバイダー
pub struct LoginCredentialProvider {
    client: Client,
    login_url: String,
    account: ProbeAccount,
    cached: RwLock<Option<Credential>>,
}

impl LoginCredentialProvider {
    /// 新しいプロバイダーを作成
    pub fn new(client: Client, base_url: &str, login_path: &str, account: ProbeAccount) -> Self {
        let login_url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            login_path.trim_start_matches('/')
        );
        Self {
            client,
            login_url,
            account,
            cached: RwLock::new(None),
        }
    }

    async fn login(&self) -> MonitorResult<Credential> {
        let response = self
            .client
            .post(&self.login_url)
            .json(&LoginRequest {
                username: &self.account.username,
                password: &self.account.password,
            })
            .send()
            .await
            .map_err(|e| MonitorError::Authentication(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Authentication(format!(
                "login rejected with HTTP {}",
                status.as_u16()
            )));
        }

        let body: LoginResponse = response.json().await.map_err(|e| {
            MonitorError::Authentication(format!("login response has no token: {e}"))
        })?;
        if body.token.is_empty() {
            return Err(MonitorError::Authentication(
                "login response has an empty token".to_string(),
            ));
        }

        Ok(Credential::new(body.token))
    }
}

#[async_trait]
impl CredentialProvider for LoginCredentialProvider {
    async fn ensure_credential(&self) -> MonitorResult<Credential> {
        if let Some(credential) = self.cached.read().await.as_ref() {
            return Ok(credential.clone());
        }

        let mut cached = self.cached.write().await;
        // 書き込みロック待ちの間に別タスクが取得済みの場合
        if let Some(credential) = cached.as_ref() {
            return Ok(credential.clone());
        }

        match self.login().await {
            Ok(credential) => {
                info!(username = %self.account.username, "Probe credential acquired");
                *cached = Some(credential.clone());
                Ok(credential)
            }
            Err(e) => {
                warn!(error = %e, "Failed to acquire probe credential");
                Err(e)
            }
        }
    }

    async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        if cached.take().is_some() {
            debug!("Probe credential invalidated");
        }
    }
}

/// 認証情報を持たないプロバイダー（プローブ用アカウント未設定時）
#[derive(Debug, Default, Clone)]
pub struct NoCredentialProvider;

#[async_trait]
impl CredentialProvider for NoCredentialProvider {
    async fn ensure_credential(&self) -> MonitorResult<Credential> {
        Err(MonitorError::Authentication(
            "probe account is not configured".to_string(),
        ))
    }

    async fn invalidate(&self) {}
}

/// 固定トークンを返すプロバイダー
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// 固定トークンで作成
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Credential::new(token),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn ensure_credential(&self) -> MonitorResult<Credential> {
        Ok(self.credential.clone())
    }

    async fn invalidate(&self) {}
}

/// 設定からプロバイダーを選ぶ（アカウント未設定なら認証なし）
pub fn provider_from_config(client: Client, config: &MonitorConfig) -> Arc<dyn CredentialProvider> {
    match &config.probe_account {
        Some(account) => Arc::new(LoginCredentialProvider::new(
            client,
            &config.target_base_url,
            &config.login_path,
            account.clone(),
        )),
        None => {
            info!("No probe account configured, protected endpoints will be marked failed");
            Arc::new(NoCredentialProvider)
        }
    }
}
