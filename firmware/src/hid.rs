//! Composite BLE HID report descriptor: keyboard (report id 0x01) + mouse
//! (report id 0x02), the two report kinds `core::BleSink` sends.
use usbd_hid::descriptor::generator_prelude::*;

// Source: <https://developer.nordicsemi.com/nRF5_SDK/nRF51_SDK_v4.x.x/doc/html/group___b_l_e___a_p_p_e_a_r_a_n_c_e_s.html#gac08ceb7b199eceefc4650399a3a7ff75>
pub const BLE_APPEARANCE_KEYBOARD: u16 = 0x03c1;
// Source: <https://the-sz.com/products/usbid/index.php?v=0x05AC&p=0x820A>
pub const APPLE_INC_VENDOR_ID: u16 = 0x05ac;
pub const APPLE_BLUETOOTH_HID_KEYBOARD_PRODUCT_ID: u16 = 0x820a;

/// Report ids for the composite keyboard+mouse descriptor. The report id of
/// BLE should start from 0x01. Must match `#[gen_hid_descriptor]` below.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportType {
    Keyboard = 0x01,
    Mouse = 0x02,
}

/// `KeyboardReport` describes a report and its companion descriptor used to
/// send keyboard key presses to the host (modifiers + up to 6 keycodes).
#[gen_hid_descriptor(
    (collection = APPLICATION, usage_page = GENERIC_DESKTOP, usage = KEYBOARD) = {
        (report_id = 0x01,) = {
            (usage_page = KEYBOARD, usage_min = 0xE0, usage_max = 0xE7) = {
                #[packed_bits 8] #[item_settings data,variable,absolute] modifier=input;
            };
            (usage_min = 0x00, usage_max = 0xFF) = {
                #[item_settings constant,variable,absolute] reserved=input;
            };
            (usage_page = LEDS, usage_min = 0x01, usage_max = 0x05) = {
                #[packed_bits 5] #[item_settings data,variable,absolute] leds=output;
            };
            (usage_page = KEYBOARD, usage_min = 0x00, usage_max = 0xDD) = {
                #[item_settings data,array,absolute] keycodes=input;
            };
        };
    },
    (collection = APPLICATION, usage_page = GENERIC_DESKTOP, usage = MOUSE) = {
        (collection = PHYSICAL, usage = POINTER) = {
            (report_id = 0x02,) = {
                (usage_page = BUTTON, usage_min = BUTTON_1, usage_max = BUTTON_8) = {
                    #[packed_bits 8] #[item_settings data,variable,absolute] buttons=input;
                };
                (usage_page = GENERIC_DESKTOP,) = {
                    (usage = X,) = {
                        #[item_settings data,variable,relative] x=input;
                    };
                    (usage = Y,) = {
                        #[item_settings data,variable,relative] y=input;
                    };
                };
            };
        };
    },
)]
#[allow(dead_code)]
#[derive(Default)]
pub struct Report {
    pub modifier: u8,
    pub reserved: u8,
    pub leds: u8,
    pub keycodes: [u8; 6],
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
}
