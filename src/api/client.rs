use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::{
    ApiError, ChatCompletionResponse, ChatMessage, ChatRequest, ImageRequest, ImageResponse,
    TranscriptionResponse,
};
use crate::auth::Credential;
use crate::core::config::data::Config;
use crate::core::message::Origin;
use crate::utils::url::construct_api_url;

const DEFAULT_AUDIO_MIME: &str = "audio/x-m4a";

/// Client for the three remote operations. Holds no credential; every call
/// takes the key read for that call.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    chat_model: String,
    image_size: String,
    transcription_model: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::from_config(&Config {
            base_url: Some(base_url.to_string()),
            ..Config::default()
        })
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url(),
            chat_model: config.chat_model().to_string(),
            image_size: config.image_size().to_string(),
            transcription_model: config.transcription_model().to_string(),
        }
    }

    /// Send `prompt` as a single-turn conversation and return the first
    /// choice's content exactly as received (it may be absent).
    pub async fn create_completion(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<Option<String>, ApiError> {
        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages: vec![ChatMessage {
                role: Origin::User.to_api_role().to_string(),
                content: prompt.to_string(),
            }],
        };

        let response: ChatCompletionResponse = self
            .post_json(credential, "chat/completions", &request)
            .await?;
        Ok(response.first_content().map(str::to_owned))
    }

    /// Ask for one image and return its URL.
    pub async fn generate_image(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String, ApiError> {
        let request = ImageRequest {
            prompt: prompt.to_string(),
            n: 1,
            size: self.image_size.clone(),
        };

        let response: ImageResponse = self
            .post_json(credential, "images/generations", &request)
            .await?;
        response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .ok_or(ApiError::EmptyResult("image"))
    }

    /// Upload the audio file at `path` and return the transcript.
    pub async fn transcribe_file(
        &self,
        credential: &Credential,
        path: &Path,
    ) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Audio {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.m4a".to_string());
        self.transcribe_bytes(credential, bytes, &file_name).await
    }

    pub async fn transcribe_bytes(
        &self,
        credential: &Credential,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<String, ApiError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(audio_mime_type(file_name))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.transcription_model.clone());

        let url = construct_api_url(&self.base_url, "audio/transcriptions");
        debug!(%url, file_name, "sending transcription request");
        let response = self
            .http
            .post(url)
            .bearer_auth(credential.expose())
            .multipart(form)
            .send()
            .await?;

        let response: TranscriptionResponse = decode_response(response).await?;
        response.text.ok_or(ApiError::EmptyResult("transcript"))
    }

    async fn post_json<B, T>(
        &self,
        credential: &Credential,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = construct_api_url(&self.base_url, endpoint);
        debug!(%url, "sending request");
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .bearer_auth(credential.expose())
            .json(body)
            .send()
            .await?;
        decode_response(response).await
    }
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let err = ApiError::from_status(status, &body);
        warn!(%status, "API request failed: {err}");
        return Err(err);
    }

    Ok(serde_json::from_str(&body)?)
}

/// Content type for an audio upload, picked from the file extension.
pub fn audio_mime_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp3") | Some("mpga") | Some("mpeg") => "audio/mpeg",
        Some("mp4") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("webm") => "audio/webm",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => DEFAULT_AUDIO_MIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key() -> Credential {
        Credential::new("sk-test")
    }

    #[tokio::test]
    async fn completion_sends_single_user_turn_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(json!({
                "model": "gpt-4",
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  hello there \n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let reply = client.create_completion(&key(), "hi").await.expect("reply");
        assert_eq!(reply.as_deref(), Some("  hello there \n"));
    }

    #[tokio::test]
    async fn completion_without_choices_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        assert_eq!(client.create_completion(&key(), "hi").await.expect("ok"), None);
    }

    #[tokio::test]
    async fn error_status_carries_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = client
            .create_completion(&key(), "hi")
            .await
            .expect_err("401 should fail");
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = client.generate_image(&key(), "cat").await.expect_err("decode");
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn image_request_returns_first_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(body_json(json!({"prompt": "a cat", "n": 1, "size": "1024x1024"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"url": "https://img.example/cat.png"}]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let url = client.generate_image(&key(), "a cat").await.expect("url");
        assert_eq!(url, "https://img.example/cat.png");
    }

    #[tokio::test]
    async fn empty_image_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = client.generate_image(&key(), "a cat").await.expect_err("empty");
        assert!(matches!(err, ApiError::EmptyResult("image")));
    }

    #[tokio::test]
    async fn transcription_uploads_file_and_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_string_contains("whisper-1"))
            .and(body_string_contains("memo.m4a"))
            .and(body_string_contains("audio/x-m4a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "hello world"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("temp dir");
        let audio = dir.path().join("memo.m4a");
        std::fs::write(&audio, b"fake audio").expect("write audio");

        let client = ApiClient::new(&server.uri());
        let text = client.transcribe_file(&key(), &audio).await.expect("text");
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn transcription_without_text_field_fails_but_empty_text_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(body_string_contains("silence.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": ""})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(body_string_contains("odd.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let text = client
            .transcribe_bytes(&key(), b"x".to_vec(), "silence.wav")
            .await
            .expect("empty transcript");
        assert_eq!(text, "");

        let err = client
            .transcribe_bytes(&key(), b"x".to_vec(), "odd.wav")
            .await
            .expect_err("missing text");
        assert!(matches!(err, ApiError::EmptyResult("transcript")));
    }

    #[tokio::test]
    async fn missing_audio_file_is_reported_with_path() {
        let dir = TempDir::new().expect("temp dir");
        let missing = dir.path().join("nope.m4a");
        let client = ApiClient::new("http://127.0.0.1:9");

        let err = client
            .transcribe_file(&key(), &missing)
            .await
            .expect_err("missing file");
        match err {
            ApiError::Audio { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(audio_mime_type("a.MP3"), "audio/mpeg");
        assert_eq!(audio_mime_type("a.wav"), "audio/wav");
        assert_eq!(audio_mime_type("a.m4a"), "audio/x-m4a");
        assert_eq!(audio_mime_type("recording"), "audio/x-m4a");
    }
}
