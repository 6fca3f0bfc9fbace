use std::fmt;

use serde::Serialize;

use crate::protocol::{FALLBACK_TEMPERATURE, FIXED_HUMIDITY, Fields, TEMPERATURE_UNAVAILABLE};
use crate::{Error, Result};

/// Device code to display label, per status key.
pub static TRANSLATIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "mode",
        &[("0", "Auto"), ("2", "Dry"), ("3", "Cooling"), ("4", "Heating"), ("6", "Fan")],
    ),
    ("pow", &[("0", "OFF"), ("1", "ON")]),
    (
        "f_rate",
        &[
            ("A", "Auto"),
            ("B", "Eco"),
            ("3", "1"),
            ("4", "2"),
            ("5", "3"),
            ("6", "4"),
            ("7", "5"),
        ],
    ),
    (
        "f_dir",
        &[("0", "Off"), ("1", "Vertical"), ("2", "Horizontal"), ("3", "3D")],
    ),
];

/// Label for `code` under `key`, if the table knows it.
pub fn translate(key: &str, code: &str) -> Option<&'static str> {
    TRANSLATIONS
        .iter()
        .find(|(k, _)| *k == key)
        .and_then(|(_, labels)| labels.iter().find(|(c, _)| *c == code))
        .map(|(_, label)| *label)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    On,
    Off,
}

impl Power {
    pub fn code(self) -> &'static str {
        match self {
            Power::On => "1",
            Power::Off => "0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Dry,
    Cool,
    Heat,
    Fan,
}

impl Mode {
    pub fn code(self) -> &'static str {
        match self {
            Mode::Auto => "0",
            Mode::Dry => "2",
            Mode::Cool => "3",
            Mode::Heat => "4",
            Mode::Fan => "6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FanRate {
    Auto,
    Eco,
    #[value(name = "1")]
    Level1,
    #[value(name = "2")]
    Level2,
    #[value(name = "3")]
    Level3,
    #[value(name = "4")]
    Level4,
    #[value(name = "5")]
    Level5,
}

impl FanRate {
    pub fn code(self) -> &'static str {
        match self {
            FanRate::Auto => "A",
            FanRate::Eco => "B",
            FanRate::Level1 => "3",
            FanRate::Level2 => "4",
            FanRate::Level3 => "5",
            FanRate::Level4 => "6",
            FanRate::Level5 => "7",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FanDirection {
    Off,
    Vertical,
    Horizontal,
    #[value(name = "3d")]
    ThreeD,
}

impl FanDirection {
    pub fn code(self) -> &'static str {
        match self {
            FanDirection::Off => "0",
            FanDirection::Vertical => "1",
            FanDirection::Horizontal => "2",
            FanDirection::ThreeD => "3",
        }
    }
}

/// Requested changes. Unset fields keep the device's current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlCommand {
    power: Option<Power>,
    mode: Option<Mode>,
    target_temperature: Option<String>,
    fan_rate: Option<FanRate>,
    fan_direction: Option<FanDirection>,
}

impl ControlCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power(mut self, power: Power) -> Self {
        self.power = Some(power);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Setpoint as the adapter expects it, e.g. `"24"` or `"24.5"`.
    pub fn target_temperature(mut self, temp: impl Into<String>) -> Self {
        self.target_temperature = Some(temp.into());
        self
    }

    pub fn fan_rate(mut self, rate: FanRate) -> Self {
        self.fan_rate = Some(rate);
        self
    }

    pub fn fan_direction(mut self, dir: FanDirection) -> Self {
        self.fan_direction = Some(dir);
        self
    }

    /// Overlay this command on the current control info, yielding the full
    /// parameter set `set_control_info` requires, in wire order.
    pub fn merge(&self, current: &Fields) -> Vec<(&'static str, String)> {
        let pick = |requested: Option<&str>, key: &str, default: &str| -> String {
            requested
                .or_else(|| current.get(key).map(String::as_str))
                .unwrap_or(default)
                .to_string()
        };

        let pow = pick(self.power.map(Power::code), "pow", Power::Off.code());
        let mode = pick(self.mode.map(Mode::code), "mode", Mode::Auto.code());
        let mut stemp = pick(self.target_temperature.as_deref(), "stemp", FALLBACK_TEMPERATURE);
        let f_rate = pick(self.fan_rate.map(FanRate::code), "f_rate", FanRate::Auto.code());
        let f_dir = pick(
            self.fan_direction.map(FanDirection::code),
            "f_dir",
            FanDirection::Off.code(),
        );

        // The adapter rejects its own "no setpoint" marker on writes.
        if stemp.is_empty() || stemp == TEMPERATURE_UNAVAILABLE {
            stemp = FALLBACK_TEMPERATURE.to_string();
        }

        vec![
            ("pow", pow),
            ("mode", mode),
            ("stemp", stemp),
            ("shum", FIXED_HUMIDITY.to_string()),
            ("f_rate", f_rate),
            ("f_dir", f_dir),
        ]
    }
}

/// Merged sensor and control info with known codes replaced by labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatusSnapshot(Fields);

impl StatusSnapshot {
    /// Control info wins on key collisions.
    pub fn from_raw(sensors: Fields, control: Fields) -> Self {
        let mut fields = sensors;
        fields.extend(control);
        for (key, value) in fields.iter_mut() {
            if let Some(label) = translate(key, value.as_str()) {
                *value = label.to_string();
            }
        }
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn power_is_off(&self) -> bool {
        self.get("pow") == Some("OFF")
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let setting = |key: &str| self.get(key).unwrap_or("??");
        let reading = |key: &str| self.get(key).unwrap_or("--");

        writeln!(f, "[DEVICE STATUS]")?;
        writeln!(f, "Power:    {}", setting("pow"))?;
        writeln!(f, "Mode:     {}", setting("mode"))?;
        writeln!(f, "Fan:      {} | Airflow: {}", setting("f_rate"), setting("f_dir"))?;
        writeln!(
            f,
            "Inside:   {}\u{00b0}C | Target: {}\u{00b0}C",
            reading("htemp"),
            reading("stemp")
        )?;
        write!(f, "Outside:  {}\u{00b0}C", reading("otemp"))
    }
}

/// Outcome of one request to the adapter.
#[derive(Debug)]
pub enum DeviceReply {
    Ok(Fields),
    Unreachable(Error),
}

impl DeviceReply {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DeviceReply::Unreachable(_))
    }

    /// Compatibility view: an unreachable device looks like an empty answer.
    pub fn into_fields(self) -> Fields {
        match self {
            DeviceReply::Ok(fields) => fields,
            DeviceReply::Unreachable(_) => Fields::new(),
        }
    }

    pub fn into_result(self) -> Result<Fields> {
        match self {
            DeviceReply::Ok(fields) => Ok(fields),
            DeviceReply::Unreachable(e) => Err(e),
        }
    }
}

/// How high-level client operations treat an unreachable device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnreachablePolicy {
    /// Substitute an empty answer and carry on.
    #[default]
    Empty,
    /// Return the transport error to the caller.
    Surface,
}
