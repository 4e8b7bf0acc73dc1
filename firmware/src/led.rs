//! GPIO connection-status indicators (grounded in `m4g_led.h`'s
//! `set_usb_connected`/`set_ble_connected` pair): one LED tracks the USB
//! host link, the other the BLE central link.

use std::ops::Deref;

use embassy_time::{Duration, Timer};
use esp_idf_svc::{
    hal::gpio::{AnyIOPin, InputOutput, PinDriver},
    sys::EspError,
};

/// One GPIO-driven LED.
pub struct Led<'d> {
    pin: PinDriver<'d, AnyIOPin, InputOutput>,
}

impl<'d> Led<'d> {
    /// Claims `pin` as an LED driver.
    pub fn new(pin: impl Into<AnyIOPin>) -> Result<Self, EspError> {
        Ok(Self {
            pin: PinDriver::input_output(pin.into())?,
        })
    }

    /// Turns the LED on and waits for the pin to settle high.
    pub async fn on(&mut self) -> anyhow::Result<()> {
        self.pin.set_high()?;
        self.pin.wait_for_high().await?;

        Ok(())
    }

    /// Turns the LED off and waits for the pin to settle low.
    pub async fn off(&mut self) -> anyhow::Result<()> {
        self.pin.set_low()?;
        self.pin.wait_for_low().await?;

        Ok(())
    }
}

/// Default blink duration used while a link is searching/advertising.
pub const DEFAULT_SEARCHING_BLINK_DURATION: Duration = Duration::from_millis(400);

impl<'d> Deref for Blinker<'d> {
    type Target = Led<'d>;

    fn deref(&self) -> &Self::Target {
        &self.led
    }
}

/// A single LED that can blink at a caller-chosen rate instead of just
/// being on or off, used while a link is searching for its peer.
pub struct Blinker<'d> {
    led: Led<'d>,
    blink_duration: Duration,
}

impl<'d> From<Led<'d>> for Blinker<'d> {
    fn from(led: Led<'d>) -> Self {
        Self::new(led, DEFAULT_SEARCHING_BLINK_DURATION)
    }
}

impl<'d> Blinker<'d> {
    /// Wraps `led` with a blink rate.
    pub fn new(led: Led<'d>, blink_duration: Duration) -> Self {
        Self { led, blink_duration }
    }

    /// Toggles the LED on then off once, holding each phase for the
    /// configured duration.
    pub async fn blink(&mut self) -> anyhow::Result<()> {
        self.led.on().await?;
        Timer::after(self.blink_duration).await;

        self.led.off().await?;
        Timer::after(self.blink_duration).await;

        Ok(())
    }
}

/// Drives the USB-link and BLE-link status LEDs and remembers their last
/// commanded state for the startup diagnostic dump.
pub struct ConnectionIndicator<'d> {
    usb_led: Led<'d>,
    ble_led: Led<'d>,
    usb_connected: bool,
    ble_connected: bool,
}

impl<'d> ConnectionIndicator<'d> {
    /// Claims the two status pins; both start in the "disconnected" state.
    pub fn new(usb_pin: impl Into<AnyIOPin>, ble_pin: impl Into<AnyIOPin>) -> Result<Self, EspError> {
        Ok(Self {
            usb_led: Led::new(usb_pin)?,
            ble_led: Led::new(ble_pin)?,
            usb_connected: false,
            ble_connected: false,
        })
    }

    /// Reflects the USB host link state on its LED.
    pub async fn set_usb_connected(&mut self, connected: bool) -> anyhow::Result<()> {
        if connected {
            self.usb_led.on().await?;
        } else {
            self.usb_led.off().await?;
        }
        self.usb_connected = connected;
        Ok(())
    }

    /// Reflects the BLE central link state on its LED.
    pub async fn set_ble_connected(&mut self, connected: bool) -> anyhow::Result<()> {
        if connected {
            self.ble_led.on().await?;
        } else {
            self.ble_led.off().await?;
        }
        self.ble_connected = connected;
        Ok(())
    }

    /// Last commanded USB-link state.
    #[must_use]
    pub fn usb_connected(&self) -> bool {
        self.usb_connected
    }

    /// Last commanded BLE-link state.
    #[must_use]
    pub fn ble_connected(&self) -> bool {
        self.ble_connected
    }
}

impl<'d> crate::diag::LedStatus for ConnectionIndicator<'d> {
    fn usb_connected(&self) -> bool {
        Self::usb_connected(self)
    }

    fn ble_connected(&self) -> bool {
        Self::ble_connected(self)
    }
}
