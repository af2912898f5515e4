//! Seams between the controller and the smart-light protocol.

use async_trait::async_trait;

use punchlight_core::Hsv;

use crate::error::HostError;

/// One addressable smart device. State accessors report what the last
/// [`LightDevice::update`] saw.
#[async_trait]
pub trait LightDevice: Send + Sync {
    fn host(&self) -> &str;
    fn alias(&self) -> &str;
    fn is_on(&self) -> bool;
    /// Whether the device exposes light controls at all.
    fn is_light(&self) -> bool;
    fn supports_hsv(&self) -> bool;

    /// Re-read device state.
    async fn update(&mut self) -> Result<(), HostError>;
    async fn turn_on(&mut self) -> Result<(), HostError>;
    async fn turn_off(&mut self) -> Result<(), HostError>;
    async fn set_hsv(&mut self, color: Hsv) -> Result<(), HostError>;
}

/// Finds devices on the local network.
#[async_trait]
pub trait LightBackend: Send + Sync {
    type Device: LightDevice;

    /// Talk to one known address.
    async fn connect(&self, host: &str) -> Result<Self::Device, HostError>;

    /// Broadcast discovery; every device that answered in the window.
    async fn discover(&self) -> Result<Vec<Self::Device>, HostError>;
}
