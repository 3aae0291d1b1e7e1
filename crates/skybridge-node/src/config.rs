//! Run configuration.
//!
//! [`NetConfig`] comes from the shared simulator settings document (the same
//! JSON file the physics simulator reads); unknown keys are ignored.
//! [`IpcConfig`] says where to listen for the network simulator and comes
//! from the environment.

use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use skybridge_clock::SimTime;
use skybridge_router::{validate_participant_name, CONTROL_STATION};

use crate::error::{Error, Result};

fn default_update_granularity() -> f64 {
    0.01
}

fn default_segment_size() -> u32 {
    1448
}

fn default_unit() -> f64 {
    1.0
}

fn default_cong_area() -> [f64; 3] {
    [0.0, 0.0, 10.0]
}

fn default_enb_positions() -> Vec<[f64; 3]> {
    vec![[0.0, 0.0, 0.0]]
}

fn default_n_rbs() -> u32 {
    6
}

fn default_tcp_buf_size() -> u32 {
    71680
}

fn default_cqi_timer_threshold() -> u32 {
    10
}

fn default_p2p_data_rate() -> String {
    "10Gb/s".to_string()
}

fn default_p2p_mtu() -> u32 {
    1500
}

fn default_p2p_delay() -> f64 {
    1e-3
}

fn enabled() -> u8 {
    1
}

/// Vehicle names are the keys of the `Vehicles` object, in document order.
fn vehicle_names<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let vehicles = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(vehicles.into_iter().map(|(name, _)| name).collect())
}

/// Network and timing parameters for one run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetConfig {
    /// Maximum clock step, in simulated seconds
    #[serde(default = "default_update_granularity")]
    pub update_granularity: f64,
    #[serde(default = "default_segment_size")]
    pub segment_size: u32,
    #[serde(default = "default_unit")]
    pub num_of_cong: f64,
    #[serde(default = "default_unit")]
    pub cong_rate: f64,
    #[serde(default = "default_cong_area")]
    pub cong_area: [f64; 3],
    #[serde(default = "default_enb_positions")]
    pub init_enb_ap_pos: Vec<[f64; 3]>,
    #[serde(default = "default_n_rbs")]
    pub n_rbs: u32,
    #[serde(rename = "TcpSndBufSize", default = "default_tcp_buf_size")]
    pub tcp_snd_buf_size: u32,
    #[serde(rename = "TcpRcvBufSize", default = "default_tcp_buf_size")]
    pub tcp_rcv_buf_size: u32,
    #[serde(rename = "CqiTimerThreshold", default = "default_cqi_timer_threshold")]
    pub cqi_timer_threshold: u32,
    #[serde(rename = "LteTxPower", default)]
    pub lte_tx_power: f64,
    #[serde(default = "default_p2p_data_rate")]
    pub p2p_data_rate: String,
    #[serde(default = "default_p2p_mtu")]
    pub p2p_mtu: u32,
    #[serde(default = "default_p2p_delay")]
    pub p2p_delay: f64,
    #[serde(default)]
    pub use_wifi: u8,
    #[serde(default = "enabled")]
    pub is_main_log_enabled: u8,
    #[serde(default = "enabled")]
    pub is_gcs_log_enabled: u8,
    #[serde(default = "enabled")]
    pub is_uav_log_enabled: u8,
    #[serde(default)]
    pub is_cong_log_enabled: u8,
    #[serde(default)]
    pub is_sync_log_enabled: u8,
    /// Simulated end time; absent means run until stopped
    #[serde(default)]
    pub end_time: Option<f64>,
    /// Vehicle participant names
    #[serde(rename = "Vehicles", deserialize_with = "vehicle_names")]
    pub vehicles: Vec<String>,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            update_granularity: default_update_granularity(),
            segment_size: default_segment_size(),
            num_of_cong: default_unit(),
            cong_rate: default_unit(),
            cong_area: default_cong_area(),
            init_enb_ap_pos: default_enb_positions(),
            n_rbs: default_n_rbs(),
            tcp_snd_buf_size: default_tcp_buf_size(),
            tcp_rcv_buf_size: default_tcp_buf_size(),
            cqi_timer_threshold: default_cqi_timer_threshold(),
            lte_tx_power: 0.0,
            p2p_data_rate: default_p2p_data_rate(),
            p2p_mtu: default_p2p_mtu(),
            p2p_delay: default_p2p_delay(),
            use_wifi: 0,
            is_main_log_enabled: enabled(),
            is_gcs_log_enabled: enabled(),
            is_uav_log_enabled: enabled(),
            is_cong_log_enabled: 0,
            is_sync_log_enabled: 0,
            end_time: None,
            vehicles: Vec::new(),
        }
    }
}

impl FromStr for NetConfig {
    type Err = Error;

    fn from_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl NetConfig {
    /// Read and parse a settings document.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = json.parse()?;
        tracing::info!(
            "Loaded settings from {} ({} vehicles)",
            path.display(),
            config.vehicles.len()
        );
        Ok(config)
    }

    /// Effective end time; infinite when unset.
    pub fn end_time(&self) -> SimTime {
        self.end_time.unwrap_or(f64::INFINITY)
    }

    /// Every router endpoint: the control station first, then the vehicles.
    pub fn participants(&self) -> Vec<String> {
        std::iter::once(CONTROL_STATION.to_string())
            .chain(self.vehicles.iter().cloned())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.update_granularity.is_finite() && self.update_granularity > 0.0) {
            return Err(Error::Config(format!(
                "updateGranularity must be a positive number, got {}",
                self.update_granularity
            )));
        }
        if let Some(end_time) = self.end_time {
            if end_time.is_nan() || end_time < 0.0 {
                return Err(Error::Config(format!(
                    "endTime must be non-negative, got {}",
                    end_time
                )));
            }
        }
        if self.segment_size == 0 || self.tcp_snd_buf_size == 0 || self.tcp_rcv_buf_size == 0 {
            return Err(Error::Config(
                "segmentSize and TCP buffer sizes must be non-zero".to_string(),
            ));
        }
        for name in &self.vehicles {
            validate_participant_name(name)?;
        }
        Ok(())
    }

    /// Space-delimited configuration line for the network simulator.
    ///
    /// Field order is fixed by the simulator's parser. `endTime` is not sent.
    pub fn to_wire(&self) -> String {
        let mut fields: Vec<String> = vec![
            self.update_granularity.to_string(),
            self.segment_size.to_string(),
            self.num_of_cong.to_string(),
            self.cong_rate.to_string(),
        ];
        fields.extend(self.cong_area.iter().map(f64::to_string));

        fields.push(self.vehicles.len().to_string());
        fields.extend(self.vehicles.iter().cloned());

        fields.push(self.init_enb_ap_pos.len().to_string());
        for pos in &self.init_enb_ap_pos {
            fields.extend(pos.iter().map(f64::to_string));
        }

        fields.extend([
            self.n_rbs.to_string(),
            self.tcp_snd_buf_size.to_string(),
            self.tcp_rcv_buf_size.to_string(),
            self.cqi_timer_threshold.to_string(),
            self.lte_tx_power.to_string(),
            self.p2p_data_rate.clone(),
            self.p2p_mtu.to_string(),
            self.p2p_delay.to_string(),
            self.use_wifi.to_string(),
            self.is_main_log_enabled.to_string(),
            self.is_gcs_log_enabled.to_string(),
            self.is_uav_log_enabled.to_string(),
            self.is_cong_log_enabled.to_string(),
            self.is_sync_log_enabled.to_string(),
        ]);
        fields.join(" ")
    }
}

/// Where the node listens for the network simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct IpcConfig {
    /// Settings document
    pub settings_path: PathBuf,
    /// Clock channel: config line and step replies out, ready tokens in
    pub stepper_addr: SocketAddr,
    /// Progress notices in
    pub notice_addr: SocketAddr,
    /// Host the per-endpoint directive listeners bind to
    pub endpoint_host: IpAddr,
    pub gcs_port: u16,
    /// Vehicle `i` listens on `vehicle_port_base + i`
    pub vehicle_port_base: u16,
}

impl Default for IpcConfig {
    fn default() -> Self {
        let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        Self {
            settings_path: PathBuf::from("settings.json"),
            stepper_addr: SocketAddr::new(any, 8001),
            notice_addr: SocketAddr::new(any, 9000),
            endpoint_host: any,
            gcs_port: 4998,
            vehicle_port_base: 6000,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}

impl IpcConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            settings_path: env_or("SKYBRIDGE_SETTINGS", defaults.settings_path)?,
            stepper_addr: env_or("SKYBRIDGE_STEPPER_ADDR", defaults.stepper_addr)?,
            notice_addr: env_or("SKYBRIDGE_NOTICE_ADDR", defaults.notice_addr)?,
            endpoint_host: env_or("SKYBRIDGE_ENDPOINT_HOST", defaults.endpoint_host)?,
            gcs_port: env_or("SKYBRIDGE_GCS_PORT", defaults.gcs_port)?,
            vehicle_port_base: env_or("SKYBRIDGE_VEHICLE_PORT_BASE", defaults.vehicle_port_base)?,
        })
    }

    pub fn gcs_addr(&self) -> SocketAddr {
        SocketAddr::new(self.endpoint_host, self.gcs_port)
    }

    pub fn vehicle_addr(&self, index: usize) -> Result<SocketAddr> {
        u16::try_from(index)
            .ok()
            .and_then(|i| self.vehicle_port_base.checked_add(i))
            .map(|port| SocketAddr::new(self.endpoint_host, port))
            .ok_or_else(|| Error::Config(format!("no port left for vehicle {}", index)))
    }
}
