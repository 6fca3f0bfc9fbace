mod client;
mod config;
mod error;
mod logger;
mod protocol;
mod shutdown;
mod types;

pub use client::{DaikinClient, DaikinClientBuilder};
pub use config::{CONFIG_FILE_NAME, Settings, default_locations, new_installation_uuid};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::{
    CONTROL_INFO_PATH, Fields, RAW_KEY, SENSOR_INFO_PATH, SET_CONTROL_INFO_PATH, UUID_HEADER,
    acknowledgement, is_acknowledged, parse_response,
};
pub use shutdown::{
    PowerSwitch, ShutdownOutcome, ShutdownPolicy, ShutdownState, VerifiedShutdown,
};
pub use types::*;
