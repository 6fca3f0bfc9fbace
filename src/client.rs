use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest::tls::Version;
use tracing::{debug, trace};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    CONTROL_INFO_PATH, Fields, SENSOR_INFO_PATH, SET_CONTROL_INFO_PATH, UUID_HEADER,
    acknowledgement, is_acknowledged, parse_response,
};
use crate::types::*;
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DaikinClientBuilder {
    address: String,
    uuid: String,
    protocol: String,
    timeout: Duration,
    legacy_device_tls: bool,
    unreachable_policy: UnreachablePolicy,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl DaikinClientBuilder {
    pub fn new(address: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            uuid: uuid.into(),
            protocol: "https".to_string(),
            timeout: DEFAULT_TIMEOUT,
            legacy_device_tls: false,
            unreachable_policy: UnreachablePolicy::default(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn protocol(mut self, proto: &str) -> Self {
        self.protocol = proto.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Talk to the adapter's outdated TLS stack.
    ///
    /// BRP069B41 firmware ships a self-signed certificate that matches no
    /// hostname, and may offer only CBC or DHE suites that rustls does not
    /// implement. Enabling this switches the client to the native TLS
    /// backend, accepts any certificate and hostname, and lowers the minimum
    /// protocol to TLS 1.0. Only enable it for a client that talks to the
    /// adapter and nothing else.
    pub fn legacy_device_tls(mut self, enabled: bool) -> Self {
        self.legacy_device_tls = enabled;
        self
    }

    pub fn unreachable_policy(mut self, policy: UnreachablePolicy) -> Self {
        self.unreachable_policy = policy;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<DaikinClient> {
        HeaderValue::from_str(&self.uuid).map_err(|_| Error::InvalidHeader(self.uuid.clone()))?;

        let mut http = reqwest::Client::builder().timeout(self.timeout);
        if self.legacy_device_tls {
            http = http
                .use_native_tls()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .min_tls_version(Version::TLS_1_0);
        }
        let http = http.build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, path)?)),
            _ => None,
        };

        Ok(DaikinClient {
            http,
            base_url: format!("{}://{}", self.protocol, self.address),
            uuid: self.uuid,
            policy: self.unreachable_policy,
            logger,
        })
    }
}

pub struct DaikinClient {
    http: reqwest::Client,
    base_url: String,
    uuid: String,
    policy: UnreachablePolicy,
    logger: Option<Mutex<MessageLogger>>,
}

impl DaikinClient {
    pub fn builder(address: impl Into<String>, uuid: impl Into<String>) -> DaikinClientBuilder {
        DaikinClientBuilder::new(address, uuid)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One GET against the adapter. Transport faults become
    /// [`DeviceReply::Unreachable`]; HTTP error statuses still parse the body.
    pub async fn request(&self, path: &str, params: &[(&str, String)]) -> DeviceReply {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "requesting");
        self.with_logger(|logger| logger.log_request(path, params));

        match self.fetch(&url, params).await {
            Ok((status, fields)) => {
                self.with_logger(|logger| logger.log_response(path, status, &fields));
                DeviceReply::Ok(fields)
            }
            Err(e) => {
                debug!(url = %url, error = %e, "device unreachable");
                self.with_logger(|logger| logger.log_unreachable(path, &e.to_string()));
                DeviceReply::Unreachable(e)
            }
        }
    }

    pub async fn sensor_info(&self) -> DeviceReply {
        self.request(SENSOR_INFO_PATH, &[]).await
    }

    pub async fn control_info(&self) -> DeviceReply {
        self.request(CONTROL_INFO_PATH, &[]).await
    }

    /// Sensor and control info merged and translated for display.
    ///
    /// Under [`UnreachablePolicy::Empty`] this never fails; missing keys
    /// mean "unknown".
    pub async fn status(&self) -> Result<StatusSnapshot> {
        let sensors = self.settle(self.sensor_info().await)?;
        let control = self.settle(self.control_info().await)?;
        Ok(StatusSnapshot::from_raw(sensors, control))
    }

    /// Apply `command` on top of the current control info.
    ///
    /// Returns whether the adapter acknowledged the write with `ret=OK`.
    pub async fn set_state(&self, command: &ControlCommand) -> Result<bool> {
        let reply = self.write_control_info(command).await?;
        Ok(is_acknowledged(&reply))
    }

    /// Like [`set_state`](Self::set_state), but returns the adapter's reply
    /// so callers can report its `ret` value.
    pub async fn write_control_info(&self, command: &ControlCommand) -> Result<Fields> {
        let current = self.settle(self.control_info().await)?;
        let params = command.merge(&current);
        debug!(?command, ?params, "writing control info");

        let reply = self.settle(self.request(SET_CONTROL_INFO_PATH, &params).await)?;
        if !is_acknowledged(&reply) {
            debug!(ret = acknowledgement(&reply).unwrap_or(""), "write not acknowledged");
        }
        Ok(reply)
    }

    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> Result<(u16, Fields)> {
        let mut req = self.http.get(url).header(UUID_HEADER, self.uuid.as_str());
        if !params.is_empty() {
            req = req.query(params);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "non-success status from device");
        }
        let body = resp.text().await?;
        trace!(body = %body, "device response");
        Ok((status.as_u16(), parse_response(&body)))
    }

    fn settle(&self, reply: DeviceReply) -> Result<Fields> {
        match self.policy {
            UnreachablePolicy::Empty => Ok(reply.into_fields()),
            UnreachablePolicy::Surface => reply.into_result(),
        }
    }

    fn with_logger(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            f(&mut *logger);
        }
    }
}
