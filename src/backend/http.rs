//! reqwest-backed account backend client.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use super::types::{extract_session_token, LoginRequest, RegisterRequest, UploadResponse};
use super::AccountBackend;
use crate::build_info;
use crate::config::BackendConfig;
use crate::error::BackendError;

/// Build an HTTP client with timeout applied.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    // Fall back to reqwest defaults if builder creation fails for any reason.
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(format!("fedsign/{}", build_info::VERSION))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Account backend reached over HTTP JSON endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    register_path: String,
    login_path: String,
    upload_path: String,
}

impl HttpBackend {
    pub fn from_config(config: &BackendConfig, http: reqwest::Client) -> Result<Self, BackendError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::Invalid(
                "backend.base_url is not configured (set it in fedsign.toml or FEDSIGN_BACKEND_URL)"
                    .to_string(),
            ));
        }
        Ok(Self {
            http,
            base_url,
            register_path: config.register_path.clone(),
            login_path: config.login_path.clone(),
            upload_path: config.upload_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Upload a file as multipart field `file`; returns the stored location.
    pub async fn upload_file(&self, path: &Path) -> Result<String, BackendError> {
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            BackendError::Invalid(format!("failed to read {}: {err}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(guess_image_mime(path))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url(&self.upload_path))
            .multipart(form)
            .send()
            .await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status(status, body));
        }
        let payload: UploadResponse = response
            .json()
            .await
            .map_err(|err| BackendError::Invalid(format!("upload response: {err}")))?;
        payload
            .location
            .filter(|location| !location.trim().is_empty())
            .ok_or_else(|| BackendError::Invalid("upload response did not include location".into()))
    }

    async fn post_for_token<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, BackendError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(BackendError::Status(status, text));
        }
        let value = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
        extract_session_token(&value).ok_or(BackendError::MissingToken(status))
    }
}

#[async_trait]
impl AccountBackend for HttpBackend {
    async fn register(&self, request: &RegisterRequest) -> Result<String, BackendError> {
        self.post_for_token(&self.register_path, request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<String, BackendError> {
        self.post_for_token(&self.login_path, request).await
    }
}

fn guess_image_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Address;
    use crate::testsupport::{ScriptedHttpServer, TestTempDir};
    use serde_json::json;

    fn backend_for(server: &ScriptedHttpServer) -> HttpBackend {
        let config = BackendConfig {
            base_url: format!("{}/", server.base_url()),
            ..BackendConfig::default()
        };
        HttpBackend::from_config(&config, reqwest::Client::new()).expect("backend")
    }

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            username: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            password: "Aa1@x@".to_string(),
            confirm_password: "Aa1@x@".to_string(),
            phone_number: String::new(),
            address: Address::default(),
            profile: String::new(),
        }
    }

    #[test]
    fn missing_base_url_is_rejected() {
        let err = HttpBackend::from_config(&BackendConfig::default(), reqwest::Client::new())
            .expect_err("no base url");
        assert!(err.to_string().contains("backend.base_url"));
    }

    #[tokio::test]
    async fn register_posts_json_and_returns_token() {
        let server =
            ScriptedHttpServer::start(vec![(201, json!({"token": "session-1"}).to_string())]).await;
        let token = backend_for(&server).register(&register_request()).await.unwrap();
        assert_eq!(token, "session-1");

        let request = &server.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/v1/auth/register");
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["confirmPassword"], "Aa1@x@");
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let server =
            ScriptedHttpServer::start(vec![(400, json!({"message": "exists"}).to_string())]).await;
        let err = backend_for(&server)
            .register(&register_request())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("exists"));
    }

    #[tokio::test]
    async fn success_without_token_is_missing_token() {
        let server =
            ScriptedHttpServer::start(vec![(200, json!({"message": "already registered"}).to_string())])
                .await;
        let err = backend_for(&server)
            .register(&register_request())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingToken(200)));
    }

    #[tokio::test]
    async fn login_hits_login_path() {
        let server =
            ScriptedHttpServer::start(vec![(200, json!({"accessToken": "s2"}).to_string())]).await;
        let token = backend_for(&server)
            .login(&LoginRequest {
                email: "jane@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(token, "s2");
        assert_eq!(server.requests()[0].path, "/api/v1/auth/login");
    }

    #[tokio::test]
    async fn upload_returns_location() {
        let dir = TestTempDir::new("upload");
        let avatar = dir.write_text("avatar.png", "png-bytes");
        let server = ScriptedHttpServer::start(vec![(
            200,
            json!({"location": "https://cdn.example/avatar.png"}).to_string(),
        )])
        .await;

        let location = backend_for(&server).upload_file(&avatar).await.unwrap();
        assert_eq!(location, "https://cdn.example/avatar.png");
        let request = &server.requests()[0];
        assert_eq!(request.path, "/api/v1/files/upload");
        assert!(request
            .header("content-type")
            .unwrap()
            .starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn upload_of_missing_file_fails_before_request() {
        let server = ScriptedHttpServer::start(vec![]).await;
        let err = backend_for(&server)
            .upload_file(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Invalid(_)));
    }

    #[test]
    fn mime_guess_covers_common_images() {
        assert_eq!(guess_image_mime(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_image_mime(Path::new("a.bin")), "application/octet-stream");
    }
}
