//! Typed catalog records.
//!
//! These mirror the YAML content files. Every field the content may omit is
//! an `Option`, so absence is explicit and checked once at load time rather
//! than at every read site.

use serde::{Deserialize, Serialize};

/// A flight controller specification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    /// Slug identifier, unique across controllers.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Manufacturer id.
    pub brand: String,
    /// MCU id.
    pub mcu: String,
    /// MCU family, used when the MCU record has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcu_family: Option<String>,
    /// Model designation when it differs from the title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Mounting pattern.
    pub mounting: Mounting,
    /// Physical dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Power inputs and ratings.
    pub power: Power,
    /// Port counts and peripherals.
    pub io: Io,
    /// Labelled physical ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peripheral_ports: Option<Vec<PeripheralPort>>,
    /// Hardware openness and revisions.
    pub hardware: Hardware,
    /// On-board sensors.
    #[serde(default)]
    pub sensors: Sensors,
    /// Free-form feature list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    /// Supported firmwares with their support status.
    #[serde(default)]
    pub firmware_support: Vec<FirmwareSupport>,
    /// Product lifecycle (e.g. `active`, `end-of-life`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<String>,
    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// SEO overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<Seo>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Source links.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Verification state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

/// Board mounting pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mounting {
    /// 20×20 mm stack.
    #[serde(rename = "20x20")]
    Stack20,
    /// 25.5×25.5 mm stack.
    #[serde(rename = "25.5x25.5")]
    Stack25,
    /// 30.5×30.5 mm stack.
    #[serde(rename = "30.5x30.5")]
    Stack30,
    /// 35×35 mm stack.
    #[serde(rename = "35x35")]
    Stack35,
    /// Cube carrier board.
    #[serde(rename = "cube")]
    Cube,
    /// Wing form factor.
    #[serde(rename = "wing")]
    Wing,
    /// Anything else.
    #[serde(rename = "custom")]
    Custom,
}

impl Mounting {
    /// The value used in content files, search facets and URLs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stack20 => "20x20",
            Self::Stack25 => "25.5x25.5",
            Self::Stack30 => "30.5x30.5",
            Self::Stack35 => "35x35",
            Self::Cube => "cube",
            Self::Wing => "wing",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Mounting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in millimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_mm: Option<f64>,
    /// Length in millimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_mm: Option<f64>,
    /// Height in millimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_mm: Option<f64>,
    /// Weight in grams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_g: Option<f64>,
}

/// Power section.
///
/// Also used as the override shape for hardware revisions, where every field
/// that is present replaces the base field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Power {
    /// Legacy free-form input voltage description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_in: Option<String>,
    /// Named power inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<PowerInput>>,
    /// Whether power inputs are redundant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundant: Option<bool>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A named power input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerInput {
    /// Input name (e.g. `POWER1`).
    pub name: String,
    /// Input kind.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PowerInputKind>,
    /// Connector description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    /// Accepted voltage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<VoltageRange>,
    /// Current rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentSpec>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Kind of power input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerInputKind {
    /// Power module port.
    PowerModule,
    /// USB.
    Usb,
    /// Direct battery input.
    Battery,
    /// On-board regulator.
    Regulator,
    /// Servo rail.
    ServoRail,
    /// Anything else.
    Other,
}

/// Voltage range of a power input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoltageRange {
    /// Minimum voltage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum voltage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Nominal voltage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal: Option<f64>,
    /// LiPo cell count range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<CellRange>,
    /// Unit, always `V` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Cell count range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    /// Minimum cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    /// Maximum cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

/// Current rating of a power input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentSpec {
    /// Continuous current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous: Option<f64>,
    /// Peak current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak: Option<f64>,
    /// Maximum current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Unit, always `A` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// I/O section of a controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Io {
    /// Number of UARTs.
    pub uarts: u32,
    /// Number of CAN buses.
    pub can: u32,
    /// Number of PWM outputs.
    pub pwm: u32,
    /// Ethernet availability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<bool>,
    /// MicroSD slot.
    pub sd_card: bool,
    /// Peripheral connectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peripherals: Option<Vec<Peripheral>>,
}

/// Partial I/O section used by hardware revision overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoOverride {
    /// Number of UARTs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uarts: Option<u32>,
    /// Number of CAN buses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can: Option<u32>,
    /// Number of PWM outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwm: Option<u32>,
    /// Ethernet availability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<bool>,
    /// MicroSD slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd_card: Option<bool>,
    /// Peripheral connectors, replacing the base list as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peripherals: Option<Vec<Peripheral>>,
}

/// A peripheral connector group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peripheral {
    /// Connector name.
    pub name: String,
    /// Interface kind.
    #[serde(rename = "type")]
    pub kind: InterfaceKind,
    /// Number of identical connectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Protocols carried by the connector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<String>>,
    /// Connector type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    /// Supplied voltage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A labelled physical port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralPort {
    /// Port label.
    pub port: String,
    /// Interface kind.
    #[serde(rename = "type")]
    pub kind: InterfaceKind,
    /// Default assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_use: Option<String>,
    /// Supplied voltage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<String>,
    /// Connector type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Interface kind of a peripheral or port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    /// Serial port.
    Uart,
    /// GPS connector.
    Gps,
    /// I2C bus.
    I2c,
    /// SPI bus.
    Spi,
    /// CAN bus.
    Can,
    /// USB.
    Usb,
    /// Power input or output.
    Power,
    /// PWM outputs.
    Pwm,
    /// RC receiver input.
    Rc,
    /// Analog input.
    Analog,
    /// Debug header.
    Debug,
    /// Video in or out.
    Video,
    /// LED strip.
    Led,
    /// Ethernet.
    Ethernet,
    /// Storage such as MicroSD.
    Storage,
    /// Anything else.
    Other,
}

/// Sensors grouped by category.
///
/// Also the override shape for revisions: each present category list
/// replaces the base list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensors {
    /// Inertial measurement units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu: Option<Vec<SensorRef>>,
    /// Barometers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barometer: Option<Vec<SensorRef>>,
    /// Magnetometers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnetometer: Option<Vec<SensorRef>>,
}

impl Sensors {
    /// Iterate over every sensor id in category order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        [&self.imu, &self.barometer, &self.magnetometer]
            .into_iter()
            .flatten()
            .flatten()
            .map(|sensor| sensor.id.as_str())
    }
}

/// Reference to a sensor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRef {
    /// Sensor id.
    pub id: String,
    /// Number of instances on the board.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Hardware section of a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hardware {
    /// Design openness.
    pub openness: Openness,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Product lifecycle, when recorded here rather than at the top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<String>,
    /// Ordered, append-only revision list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<Vec<HardwareRevision>>,
}

/// Hardware design openness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Openness {
    /// Open hardware.
    Open,
    /// Closed hardware.
    Closed,
    /// Partially open.
    Mixed,
}

/// A named delta describing a later manufacturing variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareRevision {
    /// Slug identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Release date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Human-readable change list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<String>>,
    /// Source links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Sections replaced by this revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<RevisionOverrides>,
}

/// Sections a hardware revision may replace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionOverrides {
    /// Per-category sensor lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensors: Option<Sensors>,
    /// Field-level I/O overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io: Option<IoOverride>,
    /// Field-level power overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerOverride>,
    /// Replacement port list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peripheral_ports: Option<Vec<PeripheralPort>>,
}

impl RevisionOverrides {
    /// True when no section is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensors.is_none()
            && self.io.is_none()
            && self.power.is_none()
            && self.peripheral_ports.is_none()
    }
}

/// Power overrides share the shape of [`Power`].
pub type PowerOverride = Power;

/// Firmware support entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareSupport {
    /// Firmware id (e.g. `ardupilot`).
    pub id: String,
    /// Support status.
    pub status: FirmwareStatus,
}

/// Firmware support status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirmwareStatus {
    /// Target exists but isn't released as stable.
    Beta,
    /// Officially supported.
    Stable,
    /// Support was dropped.
    Deprecated,
    /// Maintained outside the official firmware tree.
    Community,
}

impl FirmwareStatus {
    /// Lowercase facet value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beta => "beta",
            Self::Stable => "stable",
            Self::Deprecated => "deprecated",
            Self::Community => "community",
        }
    }
}

/// SEO overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seo {
    /// Short summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Keywords replacing the record keywords for search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

/// Verification state of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Verification level.
    pub level: VerificationLevel,
    /// Last update date.
    pub last_updated: String,
}

/// How thoroughly a record was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    /// Entered without review.
    Unverified,
    /// Checked by community members.
    Community,
    /// Reviewed by maintainers.
    Reviewed,
}

/// A radio transmitter record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transmitter {
    /// Slug identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Manufacturer id.
    pub brand: String,
    /// Hardware details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<TransmitterHardware>,
    /// Free-form feature list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Source links.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Hardware section of a transmitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransmitterHardware {
    /// Form factor (`handheld`, `tray`, `gamepad`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_factor: Option<String>,
    /// Display type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Revision history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<Vec<HardwareRevision>>,
}

/// A manufacturer lookup record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manufacturer {
    /// Slug identifier.
    pub id: String,
    /// Preferred display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fallback display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Manufacturer {
    /// Display name, falling back from `name` to `title` to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.id)
    }
}

/// An MCU lookup record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mcu {
    /// Slug identifier.
    pub id: String,
    /// Preferred display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fallback display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// MCU family (e.g. `stm32h7`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

impl Mcu {
    /// Display name, falling back from `name` to `title` to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_with_fractional_power_override() {
        let yaml = r"
id: rev-b
name: Rev B
overrides:
  power:
    inputs:
      - name: POWER1
        voltage:
          min: 4.5
          max: 25.2
";
        let revision: HardwareRevision = serde_yaml::from_str(yaml).unwrap();
        let inputs = revision
            .overrides
            .as_ref()
            .and_then(|o| o.power.as_ref())
            .and_then(|p| p.inputs.as_ref())
            .unwrap();
        let voltage = inputs[0].voltage.as_ref().unwrap();
        assert_eq!(voltage.max, Some(25.2));

        let transmitter = Transmitter {
            id: "radiomaster-tx16s".to_string(),
            title: "TX16S".to_string(),
            brand: "radiomaster".to_string(),
            hardware: Some(TransmitterHardware {
                revisions: Some(vec![revision.clone()]),
                ..TransmitterHardware::default()
            }),
            features: Vec::new(),
            keywords: Vec::new(),
            sources: Vec::new(),
            notes: None,
        };
        assert_eq!(transmitter.clone(), transmitter);
        assert_eq!(
            transmitter.hardware.and_then(|h| h.revisions).unwrap()[0],
            revision
        );
    }
}
