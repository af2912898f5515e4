//! Drives one smart light according to the punch state.

use chrono::{Local, NaiveDateTime};

use punchlight_core::{DeviceReply, Hsv};

use crate::cache::HostCache;
use crate::color::{warning_color, NO_ISSUES_COLOR};
use crate::device::{LightBackend, LightDevice};
use crate::error::HostError;

pub struct PunchLightController<B: LightBackend> {
    backend: B,
    cache: Option<HostCache>,
    /// Fixed address; skips the cache and broadcast discovery.
    host: Option<String>,
    device: Option<B::Device>,
    last_has_issues: Option<bool>,
}

impl<B: LightBackend> PunchLightController<B> {
    pub fn new(backend: B, cache: Option<HostCache>) -> Self {
        Self {
            backend,
            cache,
            host: None,
            device: None,
            last_has_issues: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn device(&self) -> Option<&B::Device> {
        self.device.as_ref()
    }

    /// Issue state from the most recent `update_light`.
    pub fn last_has_issues(&self) -> Option<bool> {
        self.last_has_issues
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    /// Find and connect to the light. Returns its address.
    ///
    /// Order: configured host, then the cached address (only while it still
    /// answers as a light), then broadcast discovery. A device found by
    /// discovery is written to the cache.
    pub async fn discover_light(&mut self) -> Result<String, HostError> {
        let mut device = match &self.host {
            Some(host) => {
                tracing::info!(host = %host, "connecting to configured light");
                self.backend.connect(host).await?
            }
            None => match self.try_cached().await {
                Some(device) => device,
                None => {
                    let device = self.discover_one().await?;
                    if let Some(cache) = &self.cache {
                        cache.save(device.host());
                    }
                    device
                }
            },
        };

        device.update().await?;
        if !device.is_light() {
            return Err(HostError::NotALight {
                alias: device.alias().to_string(),
            });
        }
        if !device.supports_hsv() {
            return Err(HostError::NoHsv {
                alias: device.alias().to_string(),
            });
        }

        let host = device.host().to_string();
        tracing::info!(alias = %device.alias(), host = %host, "connected to light");
        self.device = Some(device);
        Ok(host)
    }

    async fn try_cached(&self) -> Option<B::Device> {
        let host = self.cache.as_ref()?.load()?;
        tracing::info!(host = %host, "trying cached light address");

        let mut device = match self.backend.connect(&host).await {
            Ok(device) => device,
            Err(err) => {
                tracing::warn!(host = %host, error = %err, "cached address failed; performing discovery");
                return None;
            }
        };
        if let Err(err) = device.update().await {
            tracing::warn!(host = %host, error = %err, "cached address failed; performing discovery");
            return None;
        }
        if !device.is_light() {
            tracing::info!(host = %host, "cached device is not a light; rediscovering");
            return None;
        }
        Some(device)
    }

    async fn discover_one(&self) -> Result<B::Device, HostError> {
        let mut found = self.backend.discover().await?;
        match found.len() {
            0 => Err(HostError::NoDevices),
            1 => Ok(found.remove(0)),
            _ => {
                let mut lights: Vec<B::Device> =
                    found.into_iter().filter(|device| device.is_light()).collect();
                match lights.len() {
                    0 => Err(HostError::NoLights),
                    1 => Ok(lights.remove(0)),
                    _ => Err(HostError::MultipleLights),
                }
            }
        }
    }

    /// Connected device with fresh state, discovering first if needed.
    async fn ready_device(&mut self) -> Result<&mut B::Device, HostError> {
        if self.device.is_none() {
            self.discover_light().await?;
        }
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| HostError::Protocol("light disappeared after discovery".to_string()))?;
        device.update().await?;
        Ok(device)
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Show the punch state, using the local clock for the warning color.
    pub async fn update_light(&mut self, has_issues: bool) -> Result<DeviceReply, HostError> {
        self.update_light_at(has_issues, Local::now().naive_local()).await
    }

    pub async fn update_light_at(
        &mut self,
        has_issues: bool,
        now: NaiveDateTime,
    ) -> Result<DeviceReply, HostError> {
        let device = self.ready_device().await?;
        if !device.is_on() {
            device.turn_on().await?;
        }
        self.last_has_issues = Some(has_issues);

        let color = if has_issues {
            warning_color(now)
        } else {
            NO_ISSUES_COLOR
        };
        self.apply_color(color).await?;

        let reply = DeviceReply::ok().with("action", "on").with("color", color);
        if has_issues {
            tracing::info!(%color, "light set to warning color");
            Ok(reply)
        } else {
            tracing::info!(%color, "light set to soft green (no issues)");
            Ok(reply.with("mode", "no_issues"))
        }
    }

    pub async fn set_color(&mut self, color: Hsv) -> Result<DeviceReply, HostError> {
        let device = self.ready_device().await?;
        if !device.is_on() {
            device.turn_on().await?;
        }
        self.apply_color(color).await?;
        tracing::info!(%color, "light manually set");
        Ok(DeviceReply::ok().with("color", color))
    }

    pub async fn turn_off(&mut self) -> Result<DeviceReply, HostError> {
        let device = self.ready_device().await?;
        if device.is_on() {
            device.turn_off().await?;
        }
        tracing::info!("light turned off");
        Ok(DeviceReply::ok().with("action", "off"))
    }

    /// Rediscover and report where the light is.
    pub async fn discover(&mut self) -> Result<DeviceReply, HostError> {
        let host = self.discover_light().await?;
        let alias = self
            .device
            .as_ref()
            .map(|device| device.alias().to_string())
            .unwrap_or_default();
        Ok(DeviceReply::ok().with("host", host).with("alias", alias))
    }

    /// Re-apply the last known punch state. `Ok(None)` when nothing has been
    /// reported yet.
    pub async fn refresh(&mut self) -> Result<Option<DeviceReply>, HostError> {
        match self.last_has_issues {
            Some(has_issues) => {
                tracing::info!(has_issues, "periodic light refresh");
                self.update_light(has_issues).await.map(Some)
            }
            None => {
                tracing::info!("periodic refresh skipped: no punch data yet");
                Ok(None)
            }
        }
    }

    async fn apply_color(&mut self, color: Hsv) -> Result<(), HostError> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| HostError::Protocol("no light connected".to_string()))?;
        device.set_hsv(color).await?;
        device.update().await
    }
}
