//! Hardware revision variants.
//!
//! A controller's revisions are deltas over the base record. Merging builds a
//! fresh, fully owned [`Controller`] for each revision, so a variant can be
//! mutated freely without touching the base record, the revision, or any
//! sibling variant.
//!
//! Replacement rules:
//! - `io` and `power` merge field by field; `io.peripherals` and
//!   `power.inputs` are replaced whole.
//! - `sensors` merge per category; a category absent from both sides stays
//!   absent, and an empty override list stays empty.
//! - `peripheral_ports` is replaced whole.
//!
//! Overrides are assumed valid; see [`crate::catalog::Validator`].

use serde::Serialize;

use crate::catalog::{Controller, HardwareRevision, Io, IoOverride, Power, Sensors};

/// Id of the implicit base variant.
pub const BASE_VARIANT_ID: &str = "base";

/// Label of the implicit base variant.
pub const BASE_VARIANT_LABEL: &str = "Base Hardware";

/// A materialized specification for the base hardware or one revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionVariant {
    /// `base` or the revision id.
    pub id: String,
    /// `Base Hardware` or the revision name.
    pub label: String,
    /// The merged specification.
    pub spec: Controller,
    /// The revision this variant was built from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<HardwareRevision>,
    /// True only for the base variant.
    pub is_base: bool,
}

/// Overlay one revision onto a base controller.
#[must_use]
pub fn merge_revision(base: &Controller, revision: &HardwareRevision) -> Controller {
    let mut merged = base.clone();

    let Some(overrides) = &revision.overrides else {
        return merged;
    };

    if let Some(io) = &overrides.io {
        merged.io = merge_io(&base.io, io);
    }
    if let Some(power) = &overrides.power {
        merged.power = merge_power(&base.power, power);
    }
    if let Some(sensors) = &overrides.sensors {
        merged.sensors = merge_sensors(&base.sensors, sensors);
    }
    if let Some(ports) = &overrides.peripheral_ports {
        merged.peripheral_ports = Some(ports.clone());
    }

    merged
}

/// Build the base variant followed by one variant per revision.
///
/// Revisions keep their declaration order. Duplicate revision ids yield
/// separate variants.
#[must_use]
pub fn build_variants(base: &Controller) -> Vec<RevisionVariant> {
    let revisions = base.hardware.revisions.as_deref().unwrap_or_default();

    let mut variants = Vec::with_capacity(revisions.len() + 1);
    variants.push(RevisionVariant {
        id: BASE_VARIANT_ID.to_string(),
        label: BASE_VARIANT_LABEL.to_string(),
        spec: base.clone(),
        revision: None,
        is_base: true,
    });

    variants.extend(revisions.iter().map(|revision| RevisionVariant {
        id: revision.id.clone(),
        label: revision.name.clone(),
        spec: merge_revision(base, revision),
        revision: Some(revision.clone()),
        is_base: false,
    }));

    variants
}

fn merge_io(base: &Io, over: &IoOverride) -> Io {
    Io {
        uarts: over.uarts.unwrap_or(base.uarts),
        can: over.can.unwrap_or(base.can),
        pwm: over.pwm.unwrap_or(base.pwm),
        ethernet: over.ethernet.or(base.ethernet),
        sd_card: over.sd_card.unwrap_or(base.sd_card),
        peripherals: over
            .peripherals
            .clone()
            .or_else(|| base.peripherals.clone()),
    }
}

fn merge_power(base: &Power, over: &Power) -> Power {
    Power {
        voltage_in: over
            .voltage_in
            .clone()
            .or_else(|| base.voltage_in.clone()),
        inputs: over.inputs.clone().or_else(|| base.inputs.clone()),
        redundant: over.redundant.or(base.redundant),
        notes: over.notes.clone().or_else(|| base.notes.clone()),
    }
}

fn merge_sensors(base: &Sensors, over: &Sensors) -> Sensors {
    Sensors {
        imu: over.imu.clone().or_else(|| base.imu.clone()),
        barometer: over.barometer.clone().or_else(|| base.barometer.clone()),
        magnetometer: over
            .magnetometer
            .clone()
            .or_else(|| base.magnetometer.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::spec::{
        Hardware, InterfaceKind, Mounting, Openness, Peripheral, PeripheralPort, PowerInput,
        RevisionOverrides, SensorRef,
    };

    fn sensor(id: &str) -> SensorRef {
        SensorRef {
            id: id.to_string(),
            count: None,
            notes: None,
        }
    }

    fn peripheral(name: &str) -> Peripheral {
        Peripheral {
            name: name.to_string(),
            kind: InterfaceKind::Uart,
            count: Some(1),
            interfaces: Some(vec!["uart".to_string()]),
            connector: None,
            voltage: None,
            notes: None,
        }
    }

    fn input(name: &str) -> PowerInput {
        PowerInput {
            name: name.to_string(),
            kind: None,
            connector: None,
            voltage: None,
            current: None,
            notes: None,
        }
    }

    fn base() -> Controller {
        Controller {
            id: "holybro-kakute-h7".to_string(),
            title: "Kakute H7".to_string(),
            brand: "holybro".to_string(),
            mcu: "stm32h743".to_string(),
            mcu_family: None,
            model: None,
            mounting: Mounting::Stack30,
            dimensions: None,
            power: Power {
                voltage_in: Some("2-6S".to_string()),
                inputs: Some(vec![input("POWER1")]),
                redundant: Some(false),
                notes: None,
            },
            io: Io {
                uarts: 4,
                can: 1,
                pwm: 8,
                ethernet: None,
                sd_card: true,
                peripherals: Some(vec![peripheral("GPS")]),
            },
            peripheral_ports: Some(vec![PeripheralPort {
                port: "UART1".to_string(),
                kind: InterfaceKind::Uart,
                default_use: None,
                voltage: None,
                connector: None,
                notes: None,
            }]),
            hardware: Hardware {
                openness: Openness::Closed,
                notes: None,
                lifecycle: None,
                revisions: None,
            },
            sensors: Sensors {
                imu: Some(vec![sensor("bmi270")]),
                barometer: Some(vec![sensor("bmp280")]),
                magnetometer: None,
            },
            features: Vec::new(),
            firmware_support: Vec::new(),
            lifecycle: None,
            keywords: Vec::new(),
            seo: None,
            notes: None,
            sources: Vec::new(),
            verification: None,
        }
    }

    fn revision(id: &str, overrides: Option<RevisionOverrides>) -> HardwareRevision {
        HardwareRevision {
            id: id.to_string(),
            name: id.to_uppercase(),
            released: Some("2024-01-01".to_string()),
            notes: None,
            changes: None,
            sources: None,
            overrides,
        }
    }

    fn io_override(uarts: u32) -> RevisionOverrides {
        RevisionOverrides {
            io: Some(IoOverride {
                uarts: Some(uarts),
                ..IoOverride::default()
            }),
            ..RevisionOverrides::default()
        }
    }

    #[test]
    fn test_io_field_level_fallthrough() {
        let merged = merge_revision(&base(), &revision("v2", Some(io_override(6))));

        assert_eq!(merged.io.uarts, 6);
        assert_eq!(merged.io.can, 1);
        assert_eq!(merged.io.pwm, 8);
        assert!(merged.io.sd_card);
        assert_eq!(merged.io.peripherals, base().io.peripherals);
    }

    #[test]
    fn test_io_peripherals_replaced_whole() {
        let overrides = RevisionOverrides {
            io: Some(IoOverride {
                peripherals: Some(vec![peripheral("CAN"), peripheral("I2C")]),
                ..IoOverride::default()
            }),
            ..RevisionOverrides::default()
        };
        let merged = merge_revision(&base(), &revision("v2", Some(overrides)));

        let names: Vec<_> = merged
            .io
            .peripherals
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["CAN", "I2C"]);
        assert_eq!(merged.io.uarts, 4);
    }

    #[test]
    fn test_power_field_level() {
        let overrides = RevisionOverrides {
            power: Some(Power {
                redundant: Some(true),
                inputs: Some(vec![input("POWER1"), input("POWER2")]),
                ..Power::default()
            }),
            ..RevisionOverrides::default()
        };
        let merged = merge_revision(&base(), &revision("v2", Some(overrides)));

        assert_eq!(merged.power.redundant, Some(true));
        assert_eq!(merged.power.voltage_in.as_deref(), Some("2-6S"));
        assert_eq!(merged.power.inputs.map(|i| i.len()), Some(2));
    }

    #[test]
    fn test_sensors_per_category() {
        let overrides = RevisionOverrides {
            sensors: Some(Sensors {
                imu: Some(vec![sensor("icm42688p")]),
                barometer: Some(Vec::new()),
                magnetometer: None,
            }),
            ..RevisionOverrides::default()
        };
        let merged = merge_revision(&base(), &revision("v2", Some(overrides)));

        assert_eq!(merged.sensors.imu, Some(vec![sensor("icm42688p")]));
        assert_eq!(merged.sensors.barometer, Some(Vec::new()));
        assert_eq!(merged.sensors.magnetometer, None);
    }

    #[test]
    fn test_sensor_category_falls_through() {
        let overrides = RevisionOverrides {
            sensors: Some(Sensors {
                magnetometer: Some(vec![sensor("ist8310")]),
                ..Sensors::default()
            }),
            ..RevisionOverrides::default()
        };
        let merged = merge_revision(&base(), &revision("v2", Some(overrides)));

        assert_eq!(merged.sensors.imu, Some(vec![sensor("bmi270")]));
        assert_eq!(merged.sensors.barometer, Some(vec![sensor("bmp280")]));
        assert_eq!(merged.sensors.magnetometer, Some(vec![sensor("ist8310")]));
    }

    #[test]
    fn test_peripheral_ports_replaced_whole() {
        let overrides = RevisionOverrides {
            peripheral_ports: Some(Vec::new()),
            ..RevisionOverrides::default()
        };
        let merged = merge_revision(&base(), &revision("v2", Some(overrides)));

        assert_eq!(merged.peripheral_ports, Some(Vec::new()));
    }

    #[test]
    fn test_revision_without_overrides_matches_base() {
        let merged = merge_revision(&base(), &revision("v2", None));
        assert_eq!(merged, base());
    }

    #[test]
    fn test_merge_isolation() {
        let original = base();
        let rev = revision("v2", Some(io_override(6)));
        let rev_before = rev.clone();

        let mut merged = merge_revision(&original, &rev);
        merged.sensors.imu.as_mut().unwrap().push(sensor("extra"));
        merged.io.peripherals.as_mut().unwrap()[0].name = "changed".to_string();
        merged.power.inputs.as_mut().unwrap().clear();

        assert_eq!(original, base());
        assert_eq!(rev, rev_before);
    }

    #[test]
    fn test_variant_isolation() {
        let mut controller = base();
        controller.hardware.revisions = Some(vec![revision("v2", None)]);

        let mut variants = build_variants(&controller);
        variants[0].spec.sensors.imu.as_mut().unwrap().clear();

        assert_eq!(variants[1].spec.sensors.imu, Some(vec![sensor("bmi270")]));
        assert_eq!(controller.sensors.imu, Some(vec![sensor("bmi270")]));
    }

    #[test]
    fn test_build_variants_without_revisions() {
        let variants = build_variants(&base());

        assert_eq!(variants.len(), 1);
        assert!(variants[0].is_base);
        assert_eq!(variants[0].id, BASE_VARIANT_ID);
        assert_eq!(variants[0].label, BASE_VARIANT_LABEL);
        assert!(variants[0].revision.is_none());
    }

    #[test]
    fn test_build_variants_count_and_order() {
        let mut controller = base();
        controller.hardware.revisions = Some(vec![
            revision("v2", Some(io_override(6))),
            revision("v3", Some(io_override(8))),
            revision("v4", None),
        ]);

        let variants = build_variants(&controller);

        assert_eq!(variants.len(), 4);
        assert!(variants[0].is_base);
        assert!(variants[1..].iter().all(|v| !v.is_base));
        let ids: Vec<_> = variants.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["base", "v2", "v3", "v4"]);
        assert_eq!(variants[1].label, "V2");
        assert_eq!(variants[1].spec.io.uarts, 6);
        assert_eq!(variants[2].spec.io.uarts, 8);
        assert_eq!(variants[3].spec.io.uarts, 4);
        assert_eq!(variants[2].revision.as_ref().map(|r| r.id.as_str()), Some("v3"));
    }

    #[test]
    fn test_duplicate_revision_ids_preserved() {
        let mut controller = base();
        controller.hardware.revisions = Some(vec![
            revision("v2", Some(io_override(6))),
            revision("v2", Some(io_override(7))),
        ]);

        let variants = build_variants(&controller);

        assert_eq!(variants.len(), 3);
        assert_eq!(variants[1].id, "v2");
        assert_eq!(variants[2].id, "v2");
        assert_eq!(variants[2].spec.io.uarts, 7);
    }
}
