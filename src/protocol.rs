use std::collections::BTreeMap;

/// Flat `key=value` fields as returned by the adapter.
pub type Fields = BTreeMap<String, String>;

pub const UUID_HEADER: &str = "X-Daikin-uuid";

pub const SENSOR_INFO_PATH: &str = "/aircon/get_sensor_info";
pub const CONTROL_INFO_PATH: &str = "/aircon/get_control_info";
pub const SET_CONTROL_INFO_PATH: &str = "/aircon/set_control_info";

/// Key holding the whole body when the adapter answers with something that
/// is not a `key=value` list.
pub const RAW_KEY: &str = "raw";

/// The adapter reports this instead of a setpoint in modes without one.
pub const TEMPERATURE_UNAVAILABLE: &str = "--";
pub const FALLBACK_TEMPERATURE: &str = "22";

/// BRP069B41 exposes no humidity control; `shum` is still mandatory on writes.
pub const FIXED_HUMIDITY: &str = "0";

const ACK_KEY: &str = "ret";
const ACK_OK: &str = "OK";

pub fn parse_response(body: &str) -> Fields {
    if !body.contains('=') {
        return Fields::from([(RAW_KEY.to_string(), body.to_string())]);
    }
    body.trim()
        .split(',')
        .filter_map(|segment| segment.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn acknowledgement(fields: &Fields) -> Option<&str> {
    fields.get(ACK_KEY).map(String::as_str)
}

pub fn is_acknowledged(fields: &Fields) -> bool {
    acknowledgement(fields) == Some(ACK_OK)
}
