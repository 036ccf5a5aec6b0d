// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture provider
//!
//! Cameras are discovered through a `gstreamer::DeviceMonitor` filtered on
//! `Video/Source`, which covers V4L2, libcamera and PipeWire sources depending
//! on which plugins are installed. Each session runs its own pipeline, see
//! [`pipeline`].

pub mod pipeline;

use super::types::*;
use super::{CaptureProvider, CaptureSession, FrameHandler};
use crate::constants::CapturePreset;
use gstreamer::prelude::*;
use parking_lot::Mutex;
use pipeline::GStreamerSession;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Elements every capture pipeline needs
const REQUIRED_ELEMENTS: [&str; 4] = ["videoconvert", "videoscale", "capsfilter", "appsink"];

/// Device properties that may carry the camera placement
const LOCATION_PROPERTIES: [&str; 3] = [
    "api.libcamera.location",
    "camera.location",
    "device.location",
];

/// Device properties that may carry a stable device path
const PATH_PROPERTIES: [&str; 4] = ["api.v4l2.path", "device.path", "object.path", "node.name"];

/// Capture provider backed by GStreamer device sources
pub struct GStreamerProvider {
    /// Devices from the last enumeration, keyed by [`CameraDevice::path`]
    devices: Mutex<HashMap<String, gstreamer::Device>>,
}

impl GStreamerProvider {
    pub fn new() -> BackendResult<Self> {
        gstreamer::init().map_err(|e| BackendError::NotAvailable(e.to_string()))?;

        for element in REQUIRED_ELEMENTS {
            if gstreamer::ElementFactory::find(element).is_none() {
                return Err(BackendError::NotAvailable(format!(
                    "GStreamer element '{}' is not installed",
                    element
                )));
            }
        }

        info!(version = %gstreamer::version_string(), "GStreamer provider initialized");
        Ok(Self {
            devices: Mutex::new(HashMap::new()),
        })
    }

    fn discover(&self) -> Vec<CameraDevice> {
        let monitor = gstreamer::DeviceMonitor::new();
        monitor.add_filter(Some("Video/Source"), None);
        if let Err(e) = monitor.start() {
            warn!(error = %e, "Failed to start device monitor");
            return Vec::new();
        }
        let found = monitor.devices();
        monitor.stop();

        let mut cameras = Vec::with_capacity(found.len());
        let mut devices = HashMap::with_capacity(found.len());

        for (index, device) in found.into_iter().enumerate() {
            let name = device.display_name().to_string();
            let props = device.properties();

            let mut path = props
                .as_ref()
                .and_then(|p| string_property(p, &PATH_PROPERTIES))
                .unwrap_or_else(|| format!("gst:{}", index));
            if devices.contains_key(&path) {
                path = format!("{}#{}", path, index);
            }

            let position = props
                .as_ref()
                .and_then(|p| string_property(p, &LOCATION_PROPERTIES))
                .and_then(|location| CameraPosition::from_location(&location))
                .unwrap_or(if index == 0 {
                    // Single built-in webcams rarely report a location
                    CameraPosition::Front
                } else {
                    CameraPosition::External
                });

            debug!(name = %name, path = %path, position = %position, "Found camera");
            cameras.push(CameraDevice::new(name, path.clone(), position));
            devices.insert(path, device);
        }

        info!(count = cameras.len(), "Enumerated GStreamer cameras");
        *self.devices.lock() = devices;
        cameras
    }
}

fn string_property(props: &gstreamer::StructureRef, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| props.get::<String>(*key).ok())
        .filter(|value| !value.is_empty())
}

impl CaptureProvider for GStreamerProvider {
    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::GStreamer
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.discover()
    }

    fn open_session(
        &self,
        device: &CameraDevice,
        preset: CapturePreset,
        handler: Arc<dyn FrameHandler>,
    ) -> BackendResult<Box<dyn CaptureSession>> {
        let mut gst_device = self.devices.lock().get(&device.path).cloned();
        if gst_device.is_none() {
            // Device list may predate a hotplug; refresh once
            self.discover();
            gst_device = self.devices.lock().get(&device.path).cloned();
        }
        let gst_device =
            gst_device.ok_or_else(|| BackendError::DeviceNotFound(device.path.clone()))?;

        let session = GStreamerSession::open(&gst_device, device, preset, handler)?;
        Ok(Box::new(session))
    }
}
