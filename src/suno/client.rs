use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};

use super::config::*;
use super::error::SunoError;
use super::models::*;
use super::poller::{poll_until_settled, StatusSource};

/// Client bound to one user's Suno session cookie.
///
/// The cookie authenticates against Clerk, which hands out a session id and
/// short-lived JWTs. Every studio API call carries the current JWT, renewed
/// through [`SunoClient::keep_alive`].
pub struct SunoClient {
    client: Client,
    config: SunoConfig,
    cookie: String,
    clerk_version: String,
    session_id: Option<String>,
    token: Option<String>,
}

impl std::fmt::Debug for SunoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SunoClient")
            .field("clerk_version", &self.clerk_version)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl SunoClient {
    /// Builds a client and bootstraps the session: clerk version, session id,
    /// then a first token.
    pub async fn initialize(cookie: &str, config: SunoConfig) -> Result<Self, SunoError> {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            return Err(SunoError::Auth("Suno cookie is missing".to_string()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        let mut suno = Self {
            client,
            config,
            cookie: cookie.to_string(),
            clerk_version: String::new(),
            session_id: None,
            token: None,
        };

        suno.fetch_clerk_version().await?;
        suno.fetch_session_id().await?;
        suno.keep_alive(false).await?;

        log::info!("Suno session established (clerk {})", suno.clerk_version);
        Ok(suno)
    }

    pub fn config(&self) -> &SunoConfig {
        &self.config
    }

    async fn fetch_clerk_version(&mut self) -> Result<(), SunoError> {
        let resp = self.client.get(&self.config.clerk_version_url).send().await?;
        let body: Value = Self::read_json(resp, "clerk version").await?;

        let version = body["tags"]["latest"]
            .as_str()
            .ok_or_else(|| SunoError::Parse("Could not find latest clerk version".to_string()))?;

        self.clerk_version = version.to_string();
        Ok(())
    }

    async fn fetch_session_id(&mut self) -> Result<(), SunoError> {
        let url = format!("{}/v1/client", self.config.clerk_base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("_clerk_js_version", self.clerk_version.as_str())])
            .header(COOKIE, &self.cookie)
            .send()
            .await?;
        let body: Value = Self::read_json(resp, "session").await?;

        match body["response"]["last_active_session_id"].as_str() {
            Some(sid) if !sid.is_empty() => {
                self.session_id = Some(sid.to_string());
                Ok(())
            }
            _ => Err(SunoError::Auth(
                "Failed to get session id; the Suno cookie may need to be updated".to_string(),
            )),
        }
    }

    /// Exchanges the session id for a fresh bearer token. With `wait`, sleeps
    /// a random 1-2 s first so concurrent renewals spread out.
    pub async fn keep_alive(&mut self, wait: bool) -> Result<(), SunoError> {
        let sid = self
            .session_id
            .clone()
            .ok_or_else(|| SunoError::Auth("Session id is not set; cannot renew token".to_string()))?;

        if wait {
            let (min, max) = self.config.keep_alive_jitter;
            tokio::time::sleep(jitter(min, max)).await;
        }

        let url = format!(
            "{}/v1/client/sessions/{}/tokens",
            self.config.clerk_base_url, sid
        );
        let resp = self
            .client
            .post(&url)
            .query(&[("_clerk_js_version", self.clerk_version.as_str())])
            .header(COOKIE, &self.cookie)
            .send()
            .await?;
        let body: Value = Self::read_json(resp, "token renewal").await?;

        let jwt = body["jwt"]
            .as_str()
            .ok_or_else(|| SunoError::Auth("Token renewal returned no jwt".to_string()))?;
        self.token = Some(jwt.to_string());

        log::debug!("Renewed Suno token for session {}", sid);
        Ok(())
    }

    fn auth_headers(&self) -> Result<HeaderMap, SunoError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| SunoError::Auth("No bearer token; call keep_alive first".to_string()))?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| SunoError::Auth(format!("Invalid token: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    async fn studio_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        operation: &str,
    ) -> Result<Value, SunoError> {
        let url = format!("{}{}", self.config.base_url, path);
        log::debug!("{} {} ({})", method, url, operation);

        let mut request = self
            .client
            .request(method, &url)
            .headers(self.auth_headers()?);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await?;
        Self::read_json(resp, operation).await
    }

    async fn read_json(resp: reqwest::Response, operation: &str) -> Result<Value, SunoError> {
        let status = resp.status();
        if status != StatusCode::OK {
            let message = status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string();
            log::warn!("Suno {} failed: HTTP {} {}", operation, status.as_u16(), message);
            return Err(SunoError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| SunoError::Parse(format!("Invalid JSON for {}: {}", operation, e)))
    }

    fn model_or_default(&self, model: Option<&str>) -> String {
        model
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.default_model.as_str())
            .to_string()
    }

    /// Generates from a free-form description.
    pub async fn generate(
        &mut self,
        prompt: &str,
        make_instrumental: bool,
        model: Option<&str>,
        wait_audio: bool,
    ) -> Result<GenerationOutcome, SunoError> {
        let payload = json!({
            "make_instrumental": make_instrumental,
            "mv": self.model_or_default(model),
            "prompt": "",
            "gpt_description_prompt": prompt,
        });
        self.submit(payload, wait_audio).await
    }

    /// Generates from user-written lyrics, style tags and title.
    pub async fn custom_generate(
        &mut self,
        request: &CustomGenerateRequest,
        wait_audio: bool,
    ) -> Result<GenerationOutcome, SunoError> {
        let mut payload = json!({
            "make_instrumental": request.make_instrumental,
            "mv": self.model_or_default(request.model.as_deref()),
            "prompt": request.prompt,
            "tags": request.tags,
            "title": request.title,
        });
        if let Some(negative) = &request.negative_tags {
            payload["negative_tags"] = json!(negative);
        }
        self.submit(payload, wait_audio).await
    }

    /// Continues an existing clip from `continue_at` seconds.
    pub async fn extend_audio(&mut self, request: &ExtendRequest) -> Result<Vec<AudioInfo>, SunoError> {
        self.keep_alive(false).await?;
        let payload = json!({
            "continue_clip_id": request.clip_id,
            "continue_at": request.continue_at,
            "mv": self.model_or_default(request.model.as_deref()),
            "prompt": request.prompt,
            "tags": request.tags,
            "title": request.title,
        });
        let body = self
            .studio_request(Method::POST, "/api/generate/v2/", &[], Some(&payload), "extend")
            .await?;
        let response: GenerateResponse = serde_json::from_value(body)?;
        Ok(response.clips.into_iter().map(AudioInfo::from).collect())
    }

    async fn submit(&mut self, payload: Value, wait_audio: bool) -> Result<GenerationOutcome, SunoError> {
        self.keep_alive(false).await?;

        let body = self
            .studio_request(Method::POST, "/api/generate/v2/", &[], Some(&payload), "generate")
            .await?;
        let response: GenerateResponse = serde_json::from_value(body)?;
        let clips: Vec<AudioInfo> = response.clips.into_iter().map(AudioInfo::from).collect();
        let ids: Vec<String> = clips.iter().map(|c| c.id.clone()).collect();

        log::info!("Submitted Suno generation: {:?}", ids);

        if !wait_audio {
            return Ok(GenerationOutcome::Submitted(clips));
        }

        let policy = self.config.poll.clone();
        poll_until_settled(self, &ids, &policy).await
    }

    /// Fetches current status for the given clips, or the whole feed.
    pub async fn get(&mut self, ids: Option<&[String]>) -> Result<Vec<AudioInfo>, SunoError> {
        self.keep_alive(false).await?;
        self.fetch_feed(ids).await
    }

    async fn fetch_feed(&self, ids: Option<&[String]>) -> Result<Vec<AudioInfo>, SunoError> {
        let joined = ids.filter(|ids| !ids.is_empty()).map(|ids| ids.join(","));
        let query: Vec<(&str, &str)> = match &joined {
            Some(ids) => vec![("ids", ids.as_str())],
            None => Vec::new(),
        };

        let body = self
            .studio_request(Method::GET, "/api/feed/", &query, None, "feed")
            .await?;

        // The feed is either a bare array or wrapped in `clips`.
        let raw: Vec<RawClip> = match body {
            Value::Array(_) => serde_json::from_value(body)?,
            other => serde_json::from_value::<GenerateResponse>(other)?.clips,
        };
        Ok(raw.into_iter().map(AudioInfo::from).collect())
    }

    pub async fn get_clip(&mut self, clip_id: &str) -> Result<Value, SunoError> {
        self.keep_alive(false).await?;
        self.studio_request(
            Method::GET,
            &format!("/api/clip/{}", clip_id),
            &[],
            None,
            "clip",
        )
        .await
    }

    pub async fn get_credits(&mut self) -> Result<Credits, SunoError> {
        self.keep_alive(false).await?;
        let body = self
            .studio_request(Method::GET, "/api/billing/info/", &[], None, "billing info")
            .await?;
        let raw: RawBillingInfo = serde_json::from_value(body)?;
        Ok(raw.into())
    }

    /// Requests lyrics for a prompt and polls until they are written.
    pub async fn generate_lyrics(&mut self, prompt: &str) -> Result<Lyrics, SunoError> {
        self.keep_alive(false).await?;
        let body = self
            .studio_request(
                Method::POST,
                "/api/generate/lyrics/",
                &[],
                Some(&json!({ "prompt": prompt })),
                "lyrics",
            )
            .await?;
        let generate_id = body["id"]
            .as_str()
            .ok_or_else(|| SunoError::Parse("Lyrics response has no id".to_string()))?
            .to_string();

        let path = format!("/api/generate/lyrics/{}", generate_id);
        let deadline = tokio::time::Instant::now() + self.config.poll.timeout;
        loop {
            let body = self
                .studio_request(Method::GET, &path, &[], None, "lyrics status")
                .await?;
            let lyrics: Lyrics = serde_json::from_value(body)?;
            if lyrics.status == "complete" || tokio::time::Instant::now() >= deadline {
                return Ok(lyrics);
            }
            tokio::time::sleep(self.config.lyrics_poll_interval).await;
        }
    }
}

#[async_trait]
impl StatusSource for SunoClient {
    async fn fetch_status(&mut self, ids: &[String]) -> Result<Vec<AudioInfo>, SunoError> {
        self.fetch_feed(Some(ids)).await
    }

    async fn renew(&mut self) -> Result<(), SunoError> {
        self.keep_alive(true).await
    }
}
