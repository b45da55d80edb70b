//! Device handles, discovery and platform capabilities.
//!
//! The session engine only ever borrows a [`DeviceHandle`]; enumerating and
//! choosing devices happens here, behind the [`DeviceDiscovery`] trait so the
//! UI can be driven by a fake list in tests.

use crate::prompt::Outcome;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What is known about a device. Used for display only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceDescriptor {
    Usb {
        vendor_id: u16,
        product_id: u16,
        manufacturer: Option<String>,
        product: Option<String>,
    },
    Bluetooth {
        service_class_id: Option<String>,
    },
    Pci,
    Unknown,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usb {
                vendor_id,
                product_id,
                product,
                ..
            } => {
                write!(f, "USB Device {vendor_id:04x}:{product_id:04x}")?;
                if let Some(product) = product {
                    write!(f, " ({product})")?;
                }
                Ok(())
            }
            Self::Bluetooth {
                service_class_id: Some(id),
            } => write!(f, "Bluetooth ID: {id}"),
            Self::Bluetooth {
                service_class_id: None,
            } => write!(f, "Bluetooth device"),
            Self::Pci => write!(f, "PCI device"),
            Self::Unknown => write!(f, "(unknown device)"),
        }
    }
}

/// Opaque identifier of a port plus its immutable descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    path: String,
    descriptor: DeviceDescriptor,
}

impl DeviceHandle {
    pub fn new(path: impl Into<String>, descriptor: DeviceDescriptor) -> Self {
        Self {
            path: path.into(),
            descriptor,
        }
    }

    /// A handle for a path typed by the user, with nothing else known.
    pub fn unknown(path: impl Into<String>) -> Self {
        Self::new(path, DeviceDescriptor::Unknown)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.descriptor)
    }
}

impl From<serialport::SerialPortInfo> for DeviceHandle {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let descriptor = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => DeviceDescriptor::Usb {
                vendor_id: usb.vid,
                product_id: usb.pid,
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            serialport::SerialPortType::BluetoothPort => DeviceDescriptor::Bluetooth {
                service_class_id: None,
            },
            serialport::SerialPortType::PciPort => DeviceDescriptor::Pci,
            serialport::SerialPortType::Unknown => DeviceDescriptor::Unknown,
        };
        Self::new(info.port_name, descriptor)
    }
}

/// Selection criteria for [`DeviceDiscovery::request_new_device`].
///
/// A set `path` must match exactly. When any vendor or service-class ids are
/// given the device must match one of them; otherwise every device passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub path: Option<String>,
    pub usb_vendor_ids: Vec<u16>,
    pub bluetooth_service_class_ids: Vec<String>,
}

impl DeviceFilter {
    pub fn by_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, device: &DeviceHandle) -> bool {
        if self.path.as_deref().is_some_and(|path| path != device.path()) {
            return false;
        }
        if self.usb_vendor_ids.is_empty() && self.bluetooth_service_class_ids.is_empty() {
            return true;
        }

        match device.descriptor() {
            DeviceDescriptor::Usb { vendor_id, .. } => self.usb_vendor_ids.contains(vendor_id),
            DeviceDescriptor::Bluetooth {
                service_class_id: Some(id),
            } => self.bluetooth_service_class_ids.contains(id),
            _ => false,
        }
    }
}

/// Source of device handles.
pub trait DeviceDiscovery: Send + Sync {
    /// Devices currently present.
    fn list_known_devices(&self) -> Vec<DeviceHandle>;

    /// Pick a device matching `filter`; `Cancelled` when nothing matches.
    fn request_new_device(&self, filter: &DeviceFilter) -> Outcome<DeviceHandle> {
        self.list_known_devices()
            .into_iter()
            .find(|device| filter.matches(device))
            .into()
    }
}

/// Enumerates the ports the operating system reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDiscovery;

impl DeviceDiscovery for SystemDiscovery {
    fn list_known_devices(&self) -> Vec<DeviceHandle> {
        match serialport::available_ports() {
            Ok(ports) => {
                let mut devices: Vec<DeviceHandle> =
                    ports.into_iter().map(DeviceHandle::from).collect();
                devices.sort_by(|a, b| a.path().cmp(b.path()));
                devices
            }
            Err(e) => {
                warn!(error = %e, "port enumeration failed");
                Vec::new()
            }
        }
    }
}

/// A fixed list of devices.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    devices: Arc<parking_lot::Mutex<Vec<DeviceHandle>>>,
}

impl StaticDiscovery {
    pub fn new(devices: Vec<DeviceHandle>) -> Self {
        Self {
            devices: Arc::new(parking_lot::Mutex::new(devices)),
        }
    }

    /// Replace the list, as if devices were plugged in or removed.
    pub fn set(&self, devices: Vec<DeviceHandle>) {
        *self.devices.lock() = devices;
    }
}

impl DeviceDiscovery for StaticDiscovery {
    fn list_known_devices(&self) -> Vec<DeviceHandle> {
        self.devices.lock().clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Added(DeviceHandle),
    Removed(DeviceHandle),
}

/// Polls a discovery provider and reports additions and removals.
pub struct DeviceWatcher {
    token: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl DeviceWatcher {
    /// Start polling. The devices present now form the baseline and are not
    /// reported; only later differences are.
    pub fn spawn(
        discovery: Arc<dyn DeviceDiscovery>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<DeviceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let known = index(discovery.list_known_devices());
        let task = tokio::spawn(watch_loop(discovery, interval, known, tx, token.clone()));
        (Self { token, task }, rx)
    }

    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "device watcher task failed");
        }
    }
}

fn index(devices: Vec<DeviceHandle>) -> BTreeMap<String, DeviceHandle> {
    devices
        .into_iter()
        .map(|device| (device.path().to_string(), device))
        .collect()
}

async fn snapshot(discovery: &Arc<dyn DeviceDiscovery>) -> BTreeMap<String, DeviceHandle> {
    let discovery = Arc::clone(discovery);
    match tokio::task::spawn_blocking(move || discovery.list_known_devices()).await {
        Ok(devices) => index(devices),
        Err(e) => {
            warn!(error = %e, "device enumeration task failed");
            BTreeMap::new()
        }
    }
}

async fn watch_loop(
    discovery: Arc<dyn DeviceDiscovery>,
    interval: Duration,
    mut known: BTreeMap<String, DeviceHandle>,
    tx: mpsc::UnboundedSender<DeviceEvent>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let current = snapshot(&discovery).await;
        for (path, device) in &known {
            if !current.contains_key(path) {
                debug!(port = %path, "device removed");
                let _ = tx.send(DeviceEvent::Removed(device.clone()));
            }
        }
        for (path, device) in &current {
            if !known.contains_key(path) {
                debug!(port = %path, "device added");
                let _ = tx.send(DeviceEvent::Added(device.clone()));
            }
        }
        known = current;

        if tx.is_closed() {
            break;
        }
    }
}

/// Platform features, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Serial ports can be enumerated and opened.
    pub serial: bool,
    /// Bluetooth serial ports are reported by the platform.
    pub bluetooth: bool,
}

static CAPABILITIES: Lazy<Capabilities> = Lazy::new(|| {
    let serial = serialport::available_ports().is_ok();
    let bluetooth =
        serial && cfg!(any(target_os = "linux", target_os = "windows", target_os = "macos"));
    debug!(serial, bluetooth, "platform capabilities detected");
    Capabilities { serial, bluetooth }
});

impl Capabilities {
    pub fn detect() -> Self {
        *CAPABILITIES
    }
}
