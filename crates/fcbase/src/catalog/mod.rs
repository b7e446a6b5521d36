//! Catalog records: typed model, loading and validation.

mod load;
pub mod spec;
mod validate;

pub use load::{load_dir, load_file, slug_for, Catalog, Entry};
pub use spec::{
    Controller, FirmwareStatus, FirmwareSupport, Hardware, HardwareRevision, Io, IoOverride,
    Manufacturer, Mcu, Mounting, Openness, Power, PowerOverride, RevisionOverrides, SensorRef,
    Sensors, Transmitter,
};
pub use validate::{Issue, Severity, Validator};
