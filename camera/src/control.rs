use capture_node_common::config::SensorConfig;
use tracing::{debug, info};

use crate::CameraError;

/// Pushes sensor settings to the camera's `/control?var=<name>&val=<value>` endpoint.
pub struct SensorControl {
    client: reqwest::Client,
    control_url: reqwest::Url,
}

impl SensorControl {
    pub fn new(control_url: &str) -> Result<Self, CameraError> {
        let control_url = crate::parse_url(control_url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(CameraError::Connect)?;
        Ok(Self {
            client,
            control_url,
        })
    }

    /// Apply every setting in order; the first rejected one aborts.
    pub async fn apply(&self, sensor: &SensorConfig) -> Result<(), CameraError> {
        let settings = control_settings(sensor);
        for &(name, value) in &settings {
            self.set(name, value).await?;
        }
        info!(count = settings.len(), "sensor settings applied");
        Ok(())
    }

    async fn set(&self, name: &'static str, value: i32) -> Result<(), CameraError> {
        let mut url = self.control_url.clone();
        url.query_pairs_mut()
            .append_pair("var", name)
            .append_pair("val", &value.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(CameraError::Connect)?;
        if !response.status().is_success() {
            return Err(CameraError::Control {
                name,
                value,
                status: response.status().as_u16(),
            });
        }
        debug!(name, value, "sensor setting accepted");
        Ok(())
    }
}

/// Control variable names and values for a sensor configuration.
pub fn control_settings(sensor: &SensorConfig) -> Vec<(&'static str, i32)> {
    vec![
        ("framesize", sensor.frame_size.index()),
        ("quality", i32::from(sensor.jpeg_quality)),
        ("awb", i32::from(sensor.white_balance)),
        ("awb_gain", i32::from(sensor.awb_gain)),
        ("aec", i32::from(sensor.exposure_ctrl)),
        ("agc", i32::from(sensor.gain_ctrl)),
        ("brightness", i32::from(sensor.brightness)),
        ("contrast", i32::from(sensor.contrast)),
        ("saturation", i32::from(sensor.saturation)),
        ("sharpness", i32::from(sensor.sharpness)),
    ]
}
