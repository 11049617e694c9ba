//! UniFi controller adapter: client snapshots over the REST API and
//! connect/disconnect notifications over the event websocket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt as _;
use log::{debug, error, info, warn};
use reqwest::cookie::{CookieStore as _, Jar};
use reqwest::{StatusCode, Url};
use serde_derive::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, connect_async_tls_with_config};

use crate::config::ControllerConfig;
use crate::controller::{ClientRecord, ClientSource};
use crate::error::ControllerError;
use crate::messages::{ConnectionChange, ControllerEvent, Trigger};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct UnifiController {
    http: reqwest::Client,
    cookies: Arc<Jar>,
    base: Url,
    site: String,
    username: String,
    password: String,
    secure: bool,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiMeta {
    rc: String,
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    meta: ApiMeta,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EventMeta {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventFrame {
    meta: EventMeta,
    #[serde(default)]
    data: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    key: Option<String>,
    user: Option<String>,
    guest: Option<String>,
    msg: Option<String>,
}

impl UnifiController {
    pub fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        let base = Url::parse(&config.url)
            .map_err(|err| ControllerError::InvalidUrl(format!("{}: {err}", config.url)))?;
        let cookies = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .danger_accept_invalid_certs(!config.secure())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(UnifiController {
            http,
            cookies,
            base,
            site: config.site().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            secure: config.secure(),
        })
    }

    pub async fn login(&self) -> Result<(), ControllerError> {
        debug!("Logging in to UniFi controller at {}", self.base);
        let response = self
            .http
            .post(self.endpoint("api/login")?)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ControllerError::Unauthorized)
            }
            _ => {
                response.error_for_status()?;
                Ok(())
            }
        }
    }

    /// Forward controller notifications as scheduler triggers until the
    /// receiving side goes away, reconnecting whenever the socket drops.
    pub async fn listen(&self, tx: mpsc::Sender<Trigger>) {
        loop {
            match self.stream_events(&tx).await {
                Ok(()) => info!("UniFi event stream closed"),
                Err(err) => error!("UniFi event stream error: {err}"),
            }
            if tx.is_closed() {
                break;
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn stream_events(&self, tx: &mpsc::Sender<Trigger>) -> Result<(), ControllerError> {
        self.login().await?;

        let url = self.events_url()?;
        let mut request = url.as_str().into_client_request()?;
        if let Some(cookie) = self.cookies.cookies(&self.base) {
            request.headers_mut().insert(COOKIE, cookie);
        }

        let connector = if self.secure {
            None
        } else {
            Some(Connector::NativeTls(
                native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(true)
                    .build()?,
            ))
        };

        let (mut socket, _) = connect_async_tls_with_config(request, None, false, connector).await?;
        info!("UniFi event stream connected to {url}");

        while let Some(message) = socket.next().await {
            match message? {
                Message::Text(text) => {
                    for event in parse_events(text.as_str()) {
                        debug!("UniFi event: {}", event.message);
                        if tx.send(Trigger::Controller(event)).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Message::Close(frame) => {
                    debug!("UniFi event stream close frame: {:?}", frame);
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn fetch_clients(&self) -> Result<Vec<ClientRecord>, ControllerError> {
        let url = self.endpoint(&format!("api/s/{}/stat/sta", self.site))?;
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ControllerError::Unauthorized);
        }

        let body: ApiResponse = response.error_for_status()?.json().await?;
        if body.meta.rc != "ok" {
            return Err(ControllerError::Api(
                body.meta.msg.unwrap_or(body.meta.rc),
            ));
        }
        Ok(decode_clients(body.data))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ControllerError> {
        self.base
            .join(path)
            .map_err(|err| ControllerError::InvalidUrl(format!("{path}: {err}")))
    }

    fn events_url(&self) -> Result<Url, ControllerError> {
        let mut url = self.endpoint(&format!("wss/s/{}/events", self.site))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ControllerError::InvalidUrl(format!("cannot use {scheme} for {url}")))?;
        Ok(url)
    }
}

#[async_trait]
impl ClientSource for UnifiController {
    async fn clients(&self) -> Result<Vec<ClientRecord>, ControllerError> {
        match self.fetch_clients().await {
            Err(ControllerError::Unauthorized) => {
                debug!("UniFi session expired, logging in again");
                self.login().await?;
                self.fetch_clients().await
            }
            result => result,
        }
    }
}

/// Decode records one at a time so a single odd entry cannot spoil the
/// whole snapshot.
fn decode_clients(data: Vec<serde_json::Value>) -> Vec<ClientRecord> {
    data.into_iter()
        .filter_map(|value| match serde_json::from_value::<ClientRecord>(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("Ignoring malformed client record: {err}");
                None
            }
        })
        .collect()
}

fn parse_events(text: &str) -> Vec<ControllerEvent> {
    let frame: EventFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            debug!("Ignoring unrecognised UniFi frame: {err}");
            return Vec::new();
        }
    };
    if frame.meta.message.as_deref() != Some("events") {
        return Vec::new();
    }

    frame
        .data
        .into_iter()
        .filter_map(|event| {
            let key = event.key?;
            let change = if key.ends_with("_Connected") {
                ConnectionChange::Connected
            } else if key.ends_with("_Disconnected") {
                ConnectionChange::Disconnected
            } else {
                return None;
            };
            Some(ControllerEvent {
                change,
                device: event.user.or(event.guest),
                message: event.msg.unwrap_or(key),
            })
        })
        .collect()
}
