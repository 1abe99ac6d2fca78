//! Session parameter tracking.
//!
//! The server reports parameter values through ParameterStatus messages,
//! both during startup and whenever a SET changes one. A few of them
//! influence how values decode, so the engine keeps the latest state here
//! and hands it to every decoder call.

use std::collections::HashMap;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Tracked server session parameters.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    parameters: HashMap<String, String>,
    iso_dates: bool,
    timezone: Option<Tz>,
}

impl SessionState {
    /// Create an empty session state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parameter value reported by the server.
    ///
    /// Recognised keys take effect immediately:
    /// - `client_encoding` must be UTF8; anything else is a fatal
    ///   configuration error.
    /// - `DateStyle` with an `ISO` prefix enables parsing of textual
    ///   date/time values; other styles leave them as raw text.
    /// - `TimeZone` is resolved to an IANA zone when possible.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "client_encoding" => {
                if !value.eq_ignore_ascii_case("UTF8") {
                    return Err(Error::Config(format!(
                        "client_encoding must be UTF8, server reports {value}"
                    )));
                }
            }
            "DateStyle" => {
                self.iso_dates = value == "ISO" || value.starts_with("ISO,");
            }
            "TimeZone" => {
                self.timezone = Tz::from_str(value).ok();
            }
            _ => {}
        }
        self.parameters.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Latest reported value for a parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(|s| s.as_str())
    }

    /// True when DateStyle is ISO and textual date/time values parse.
    pub fn iso_dates(&self) -> bool {
        self.iso_dates
    }

    /// The session time zone, when it resolved to an IANA zone.
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }
}
