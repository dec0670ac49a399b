use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A project in the lab account. Instances are created inside one;
/// individual accounts get a single default project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
}

/// Immutable descriptor of a simulated hardware board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareModel {
    /// Human-readable board name.
    pub name: String,
    /// Model identifier used to look up compatible software.
    pub model: String,
    /// Flavor identifier used when creating instances.
    pub flavor: String,
}

/// A firmware/software bundle published for a hardware model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Software {
    pub version: String,
    #[serde(default)]
    pub buildid: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Lifecycle state of a lab instance as reported by the state endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InstanceState {
    Creating,
    On,
    Off,
    Rebooting,
    Deleting,
    Error,
}

/// A provisioned virtual device session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: Uuid,
    pub name: String,
    pub state: InstanceState,
    pub flavor: String,
    #[serde(default)]
    pub os: Option<String>,
}

/// Body for the create-instance call.
#[derive(Debug, Clone, Serialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub project: Uuid,
    pub flavor: String,
    pub os: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osbuild: Option<String>,
}

/// Firmware image kinds accepted by the image endpoint. The encoding
/// is always `plain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Raw firmware binary flashed as the boot image.
    FwBinary,
    /// IoT firmware package (ELF) loaded by the board support layer.
    IotFirmware,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::FwBinary => "fwbinary",
            ImageKind::IotFirmware => "iotfirmware",
        }
    }
}

/// One named GPIO bank: a fixed-width bit array per bank row.
/// Bank `led` maps index 0/1 to the two user LEDs; bank `button`
/// carries the single user-button bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpioBank {
    pub bit_count: u32,
    pub banks: Vec<Vec<u8>>,
}

impl GpioBank {
    /// A single-bit bank holding one value, as sent for button presses.
    pub fn single_bit(value: u8) -> Self {
        GpioBank {
            bit_count: 1,
            banks: vec![vec![value]],
        }
    }
}

/// Full GPIO snapshot: bank name to bit state.
pub type GpioState = HashMap<String, GpioBank>;

/// Simulated environmental sensor values. Readings travel as decimal
/// strings; absent fields are left untouched on writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Peripherals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<String>,
}

/// Location of the live console stream for an instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleEndpoint {
    pub url: String,
}

/// Response to the login call.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Outcome summary of a completed scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub scenario: String,
    pub instance: String,
    pub flavor: String,
    pub mismatches: usize,
    pub timestamp: DateTime<Utc>,
}
