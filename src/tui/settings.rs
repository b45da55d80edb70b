//! Fields of the settings panel and how Left/Right change them.

use crate::decode::TextEncoding;
use crate::port::{DataBits, FlowControl, Parity, StopBits, COMMON_BAUD_RATES, DEFAULT_BAUD_RATE};
use crate::session::SessionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Baud,
    DataBits,
    Parity,
    StopBits,
    FlowControl,
    Encoding,
}

impl SettingsField {
    pub const ALL: [SettingsField; 6] = [
        Self::Baud,
        Self::DataBits,
        Self::Parity,
        Self::StopBits,
        Self::FlowControl,
        Self::Encoding,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Baud => "Baud",
            Self::DataBits => "Data bits",
            Self::Parity => "Parity",
            Self::StopBits => "Stop bits",
            Self::FlowControl => "Flow",
            Self::Encoding => "Encoding",
        }
    }

    pub fn value(self, settings: &SessionSettings) -> String {
        let port = &settings.port;
        match self {
            Self::Baud => port.effective_baud_rate().to_string(),
            Self::DataBits => u8::from(port.data_bits).to_string(),
            Self::Parity => format!("{:?}", port.parity).to_lowercase(),
            Self::StopBits => u8::from(port.stop_bits).to_string(),
            Self::FlowControl => match port.flow_control {
                FlowControl::None => "none".to_string(),
                FlowControl::Hardware => "RTS/CTS".to_string(),
            },
            Self::Encoding => settings.encoding.label(),
        }
    }

    /// Step this field of `settings` to the next (or previous) option.
    pub fn adjust(self, settings: &mut SessionSettings, forward: bool) {
        let port = &mut settings.port;
        match self {
            Self::Baud => {
                let current = port.effective_baud_rate();
                let pos = COMMON_BAUD_RATES
                    .iter()
                    .position(|b| *b == current)
                    .or_else(|| COMMON_BAUD_RATES.iter().position(|b| *b == DEFAULT_BAUD_RATE))
                    .unwrap_or(0);
                port.baud_rate = COMMON_BAUD_RATES[step(pos, COMMON_BAUD_RATES.len(), forward)];
            }
            Self::DataBits => {
                port.data_bits = match port.data_bits {
                    DataBits::Seven => DataBits::Eight,
                    DataBits::Eight => DataBits::Seven,
                };
            }
            Self::Parity => {
                const OPTIONS: [Parity; 3] = [Parity::None, Parity::Even, Parity::Odd];
                let pos = OPTIONS.iter().position(|p| *p == port.parity).unwrap_or(0);
                port.parity = OPTIONS[step(pos, OPTIONS.len(), forward)];
            }
            Self::StopBits => {
                port.stop_bits = match port.stop_bits {
                    StopBits::One => StopBits::Two,
                    StopBits::Two => StopBits::One,
                };
            }
            Self::FlowControl => {
                port.flow_control = match port.flow_control {
                    FlowControl::None => FlowControl::Hardware,
                    FlowControl::Hardware => FlowControl::None,
                };
            }
            Self::Encoding => {
                let options = TextEncoding::supported();
                let pos = options
                    .iter()
                    .position(|e| *e == settings.encoding)
                    .unwrap_or(0);
                settings.encoding = options[step(pos, options.len(), forward)];
            }
        }
    }
}

fn step(pos: usize, len: usize, forward: bool) -> usize {
    if forward {
        (pos + 1) % len
    } else {
        (pos + len - 1) % len
    }
}
