//! BLE HID-over-GATT link: advertising, connect/disconnect tracking, and
//! the `core::BleSink`/`diag::BleStatus` adapters the rest of the firmware
//! drives the link through. Adapted from the teacher's single-keyboard
//! `ble::Server`, generalized to the composite keyboard+mouse descriptor
//! and to a synchronous, non-retried send (spec: "not retried").

use embassy_time::{Duration, Timer};
use esp32_nimble::{
    enums::{AuthReq, SecurityIOCap},
    utilities::mutex::Mutex,
    BLEAdvertisementData, BLECharacteristic, BLEDevice, BLEError, BLEHIDDevice, BLEServer,
};
use futures::{channel::mpsc::Receiver, StreamExt};
use log::{info, warn};
use std::sync::Arc;
use usbd_hid::descriptor::SerializedDescriptor;

use crate::{core::BleSink, diag, hid, led};

/// A single HID input-report characteristic handle.
pub type HidWriter = Arc<Mutex<BLECharacteristic>>;

/// One outbound report queued from the core pipeline to the BLE sending
/// task, mirroring the teacher's `hid::Report` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingReport {
    /// A full 8-byte keyboard report.
    Keyboard([u8; 8]),
    /// A full 3-byte mouse report.
    Mouse([u8; 3]),
}

/// Implements `core::BleSink` by handing reports to a bounded channel
/// instead of touching the GATT characteristic directly, so `Core` never
/// blocks on BLE stack internals. The real send happens in
/// [`Server::listen_for_reports`] on the BLE task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: futures::channel::mpsc::Sender<OutgoingReport>,
}

impl ChannelSink {
    /// Wraps a sender half of the report channel.
    #[must_use]
    pub fn new(tx: futures::channel::mpsc::Sender<OutgoingReport>) -> Self {
        Self { tx }
    }
}

impl BleSink for ChannelSink {
    fn send_keyboard(&mut self, report: &[u8; 8]) -> bool {
        self.tx.try_send(OutgoingReport::Keyboard(*report)).is_ok()
    }

    fn send_mouse(&mut self, report: &[u8; 3]) -> bool {
        self.tx.try_send(OutgoingReport::Mouse(*report)).is_ok()
    }
}

/// Static BLE advertising/device identity.
#[derive(Debug, Clone)]
pub struct Config {
    /// Device name advertised to centrals.
    pub device_name: &'static str,
}

/// Owns the BLE HOGP server, its two HID input characteristics, and drives
/// the advertise/connect/disconnect lifecycle.
pub struct Server {
    device: &'static mut BLEDevice,
    #[allow(clippy::struct_field_names)]
    server: &'static mut BLEServer,
    input_keyboard: HidWriter,
    input_mouse: HidWriter,
    notifications_enabled: Arc<Mutex<bool>>,
}

impl Server {
    /// Stands up the GATT HOGP service with a composite keyboard+mouse
    /// report map and starts listening for connection events.
    pub fn initialize(config: &Config) -> Result<Self, BLEError> {
        BLEDevice::set_device_name(config.device_name)?;

        let device = BLEDevice::take();

        device
            .security()
            .set_auth(AuthReq::all())
            .set_io_cap(SecurityIOCap::NoInputNoOutput)
            .resolve_rpa();

        let server = device.get_server();

        server.on_connect(|_, r| {
            info!("ble: connection established: {r:?}");
        });

        server.on_disconnect(|t, r| match r {
            Ok(()) => info!("ble: connection closed: {t:?}"),
            Err(err) => warn!("ble: connection aborted, cause: (code: {} {err}", err.code()),
        });

        let notifications_enabled = Arc::new(Mutex::new(false));
        let (input_keyboard, input_mouse) =
            Self::initialize_hid_service(device, server, config, &notifications_enabled)?;

        Ok(Self {
            device,
            server,
            input_keyboard,
            input_mouse,
            notifications_enabled,
        })
    }

    fn initialize_hid_service(
        device: &mut BLEDevice,
        server: &mut BLEServer,
        config: &Config,
        notifications_enabled: &Arc<Mutex<bool>>,
    ) -> Result<(HidWriter, HidWriter), BLEError> {
        let mut hid_device = BLEHIDDevice::new(server);

        let input_keyboard = hid_device.input_report(hid::ReportType::Keyboard as u8);
        let input_mouse = hid_device.input_report(hid::ReportType::Mouse as u8);

        let flag = Arc::clone(notifications_enabled);
        input_keyboard
            .lock()
            .on_subscribe(move |_characteristic, _desc, subscribed| {
                *flag.lock() = subscribed;
            });

        hid_device.manufacturer("chordbridge");
        hid_device.pnp(
            0x02,
            hid::APPLE_INC_VENDOR_ID,
            hid::APPLE_BLUETOOTH_HID_KEYBOARD_PRODUCT_ID,
            0x0210,
        );
        hid_device.set_battery_level(100);
        hid_device.hid_info(0x00, 0x03);
        hid_device.report_map(hid::Report::desc());

        let advertising = device.get_advertising();

        advertising.lock().scan_response(false).set_data(
            BLEAdvertisementData::new()
                .name(config.device_name)
                .appearance(hid::BLE_APPEARANCE_KEYBOARD)
                .add_service_uuid(hid_device.hid_service().lock().uuid()),
        )?;

        Ok((input_keyboard, input_mouse))
    }

    /// Runs the advertise → wait-for-connection → forward-reports →
    /// wait-for-disconnection loop forever, reflecting link state on
    /// `indicator` and draining `rx` for the real notify sends while
    /// connected.
    pub async fn run(
        &mut self,
        rx: &mut Receiver<OutgoingReport>,
        indicator: &mut led::ConnectionIndicator<'_>,
    ) -> anyhow::Result<()> {
        loop {
            info!("ble: advertising started");
            self.device.get_advertising().lock().start()?;

            self.wait_for_connection().await;
            self.device.get_advertising().lock().stop()?;
            indicator.set_ble_connected(true).await?;
            info!("ble: advertising stopped, connected");

            self.listen_for_reports(rx).await;
            indicator.set_ble_connected(false).await?;
            info!("ble: disconnected");
        }
    }

    async fn listen_for_reports(&self, rx: &mut Receiver<OutgoingReport>) {
        loop {
            let next = futures::future::select(
                Box::pin(rx.next()),
                Box::pin(self.wait_for_disconnection()),
            )
            .await;
            match next {
                futures::future::Either::Left((Some(report), _)) => self.send(report),
                futures::future::Either::Left((None, _)) | futures::future::Either::Right(_) => return,
            }
        }
    }

    fn send(&self, report: OutgoingReport) {
        if !self.connected() {
            return;
        }
        match report {
            OutgoingReport::Keyboard(bytes) => {
                self.input_keyboard.lock().set_value(&bytes).notify();
            }
            OutgoingReport::Mouse(bytes) => {
                self.input_mouse.lock().set_value(&bytes).notify();
            }
        }
    }

    async fn wait_for_connection(&self) {
        loop {
            Timer::after(Duration::from_millis(100)).await;
            if self.server.connected_count() > 0 {
                return;
            }
        }
    }

    async fn wait_for_disconnection(&self) {
        loop {
            Timer::after(Duration::from_millis(500)).await;
            if self.server.connected_count() == 0 {
                return;
            }
        }
    }

    fn connected(&self) -> bool {
        self.server.connected_count() > 0
    }
}

impl diag::BleStatus for Server {
    fn is_connected(&self) -> bool {
        self.connected()
    }

    fn notifications_enabled(&self) -> bool {
        *self.notifications_enabled.lock()
    }

    fn send_keyboard_dry_run(&mut self, report: &[u8; 8]) -> bool {
        self.input_keyboard.lock().set_value(report).notify();
        self.connected()
    }
}
