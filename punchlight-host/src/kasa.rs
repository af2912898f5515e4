//! TP-Link Kasa local protocol (the legacy "IOT" flavour).
//!
//! Requests and responses are JSON obfuscated with an autokey XOR cipher
//! (initial key 171). Over TCP port 9999 each message carries a 4-byte
//! big-endian length prefix; discovery is a UDP broadcast of the same
//! `get_sysinfo` query without the prefix.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{timeout, timeout_at, Instant};

use punchlight_core::Hsv;

use crate::device::{LightBackend, LightDevice};
use crate::error::{io_err, HostError};

pub const KASA_PORT: u16 = 9999;
pub const DISCOVERY_WINDOW: Duration = Duration::from_secs(3);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const INITIAL_KEY: u8 = 171;
const MAX_RESPONSE_SIZE: usize = 64 * 1024;
const LIGHTING_SERVICE: &str = "smartlife.iot.smartbulb.lightingservice";

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

pub fn encrypt(plain: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    plain
        .iter()
        .map(|&byte| {
            key ^= byte;
            key
        })
        .collect()
}

pub fn decrypt(cipher: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    cipher
        .iter()
        .map(|&byte| {
            let plain = key ^ byte;
            key = byte;
            plain
        })
        .collect()
}

// ---------------------------------------------------------------------------
// System info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LightState {
    #[serde(default)]
    pub on_off: u8,
}

/// The subset of `get_sysinfo` the controller cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SysInfo {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub mic_type: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub is_color: u8,
    #[serde(default)]
    pub relay_state: Option<u8>,
    #[serde(default)]
    pub light_state: Option<LightState>,
}

impl SysInfo {
    fn kind(&self) -> &str {
        self.mic_type
            .as_deref()
            .or(self.device_type.as_deref())
            .unwrap_or_default()
    }

    pub fn is_light(&self) -> bool {
        let kind = self.kind().to_ascii_uppercase();
        kind.contains("SMARTBULB") || kind.contains("LIGHTSTRIP")
    }

    pub fn is_color(&self) -> bool {
        self.is_color == 1
    }

    pub fn is_on(&self) -> bool {
        match (&self.light_state, self.relay_state) {
            (Some(light), _) => light.on_off == 1,
            (None, Some(relay)) => relay == 1,
            (None, None) => false,
        }
    }
}

fn sysinfo_request() -> Value {
    json!({"system": {"get_sysinfo": {}}})
}

/// Pull `module.method` out of a response, failing on a non-zero `err_code`.
fn method_result<'a>(response: &'a Value, module: &str, method: &str) -> Result<&'a Value, HostError> {
    let result = response
        .get(module)
        .and_then(|m| m.get(method))
        .ok_or_else(|| HostError::Protocol(format!("response has no {module}.{method}")))?;

    let code = result.get("err_code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = result
            .get("err_msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(HostError::Protocol(format!(
            "{module}.{method} failed ({code}): {message}"
        )));
    }
    Ok(result)
}

pub fn parse_sysinfo(response: &Value) -> Result<SysInfo, HostError> {
    let info = method_result(response, "system", "get_sysinfo")?;
    Ok(SysInfo::deserialize(info)?)
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// One TCP request/response per call.
#[derive(Debug, Clone)]
pub struct KasaClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl KasaClient {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn query(&self, request: &Value) -> Result<Value, HostError> {
        timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| HostError::Timeout {
                host: self.host.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
    }

    async fn exchange(&self, request: &Value) -> Result<Value, HostError> {
        let network = |source| HostError::Network {
            host: self.host.clone(),
            source,
        };

        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(network)?;

        let payload = encrypt(&serde_json::to_vec(request)?);
        let mut frame = Vec::with_capacity(payload.len() + 4);
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        stream.write_all(&frame).await.map_err(network)?;

        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await.map_err(network)?;
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_RESPONSE_SIZE {
            return Err(HostError::Protocol(format!(
                "response from {} too large: {len} bytes",
                self.host
            )));
        }

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.map_err(network)?;
        Ok(serde_json::from_slice(&decrypt(&body))?)
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KasaDevice {
    client: KasaClient,
    info: SysInfo,
}

impl KasaDevice {
    pub fn info(&self) -> &SysInfo {
        &self.info
    }

    async fn set_power(&mut self, on: bool) -> Result<(), HostError> {
        let state = u8::from(on);
        if self.info.is_light() {
            let request = json!({
                LIGHTING_SERVICE: {
                    "transition_light_state": {"on_off": state, "ignore_default": 1}
                }
            });
            let response = self.client.query(&request).await?;
            method_result(&response, LIGHTING_SERVICE, "transition_light_state")?;
        } else {
            let request = json!({"system": {"set_relay_state": {"state": state}}});
            let response = self.client.query(&request).await?;
            method_result(&response, "system", "set_relay_state")?;
        }
        self.update().await
    }
}

#[async_trait]
impl LightDevice for KasaDevice {
    fn host(&self) -> &str {
        self.client.host()
    }

    fn alias(&self) -> &str {
        &self.info.alias
    }

    fn is_on(&self) -> bool {
        self.info.is_on()
    }

    fn is_light(&self) -> bool {
        self.info.is_light()
    }

    fn supports_hsv(&self) -> bool {
        self.info.is_light() && self.info.is_color()
    }

    async fn update(&mut self) -> Result<(), HostError> {
        let response = self.client.query(&sysinfo_request()).await?;
        self.info = parse_sysinfo(&response)?;
        Ok(())
    }

    async fn turn_on(&mut self) -> Result<(), HostError> {
        self.set_power(true).await
    }

    async fn turn_off(&mut self) -> Result<(), HostError> {
        self.set_power(false).await
    }

    async fn set_hsv(&mut self, color: Hsv) -> Result<(), HostError> {
        let request = json!({
            LIGHTING_SERVICE: {
                "transition_light_state": {
                    "hue": color.hue,
                    "saturation": color.saturation,
                    "brightness": color.value,
                    "color_temp": 0,
                    "ignore_default": 1
                }
            }
        });
        let response = self.client.query(&request).await?;
        method_result(&response, LIGHTING_SERVICE, "transition_light_state")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KasaBackend {
    pub broadcast: Ipv4Addr,
    pub port: u16,
    pub discovery_window: Duration,
    pub request_timeout: Duration,
}

impl Default for KasaBackend {
    fn default() -> Self {
        Self {
            broadcast: Ipv4Addr::BROADCAST,
            port: KASA_PORT,
            discovery_window: DISCOVERY_WINDOW,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl KasaBackend {
    fn client(&self, host: impl Into<String>) -> KasaClient {
        KasaClient::new(host, self.port, self.request_timeout)
    }
}

#[async_trait]
impl LightBackend for KasaBackend {
    type Device = KasaDevice;

    async fn connect(&self, host: &str) -> Result<KasaDevice, HostError> {
        let client = self.client(host);
        let response = client.query(&sysinfo_request()).await?;
        let info = parse_sysinfo(&response)?;
        Ok(KasaDevice { client, info })
    }

    async fn discover(&self) -> Result<Vec<KasaDevice>, HostError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| io_err("udp discovery socket", e))?;
        socket
            .set_broadcast(true)
            .map_err(|e| io_err("udp discovery socket", e))?;

        let probe = encrypt(&serde_json::to_vec(&sysinfo_request())?);
        socket
            .send_to(&probe, (self.broadcast, self.port))
            .await
            .map_err(|e| io_err(format!("{}:{}", self.broadcast, self.port), e))?;
        tracing::debug!(broadcast = %self.broadcast, port = self.port, "discovery probe sent");

        let deadline = Instant::now() + self.discovery_window;
        let mut seen: HashSet<IpAddr> = HashSet::new();
        let mut found = Vec::new();
        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];

        loop {
            let (len, peer) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => break,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "discovery receive failed");
                    break;
                }
                Ok(Ok(received)) => received,
            };
            if !seen.insert(peer.ip()) {
                continue;
            }

            let parsed = serde_json::from_slice::<Value>(&decrypt(&buf[..len]))
                .map_err(HostError::from)
                .and_then(|response| parse_sysinfo(&response));
            match parsed {
                Ok(info) => {
                    tracing::debug!(peer = %peer.ip(), alias = %info.alias, "device answered discovery");
                    found.push(KasaDevice {
                        client: self.client(peer.ip().to_string()),
                        info,
                    });
                }
                Err(err) => tracing::debug!(peer = %peer, error = %err, "ignoring discovery reply"),
            }
        }

        tracing::info!(count = found.len(), "discovery finished");
        Ok(found)
    }
}
