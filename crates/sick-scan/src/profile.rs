//! Scanner profiles and the scan parser
//!
//! A profile carries the capability data other components decide on,
//! chiefly the number of scan layers. The parser holds the per-process
//! acquisition settings and classifies incoming telegrams; decoding the
//! samples themselves is out of scope.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

/// Command prefix of scan data telegrams
pub const SCAN_DATA_PREFIX: &[u8] = b"sSN LMDscandata";

/// Capability data for one scanner family
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerProfile {
    /// Value of the `scanner_type` parameter
    pub name: &'static str,
    /// Number of scan layers reported by the device
    pub layers: u8,
    /// Default minimum range in metres
    pub range_min: f64,
    /// Default maximum range in metres
    pub range_max: f64,
    /// Default time between two measurements in seconds
    pub time_increment: f64,
}

const fn profile(
    name: &'static str,
    layers: u8,
    range_min: f64,
    range_max: f64,
    time_increment: f64,
) -> ScannerProfile {
    ScannerProfile {
        name,
        layers,
        range_min,
        range_max,
        time_increment,
    }
}

/// Known scanner families
pub const PROFILES: &[ScannerProfile] = &[
    profile("sick_lms_1xx", 1, 0.05, 20.0, 0.000_073_6),
    profile("sick_lms_1xxx", 4, 0.2, 64.0, 0.000_013_9),
    profile("sick_lms_4xxx", 1, 0.05, 3.0, 0.000_001_3),
    profile("sick_lms_5xx", 1, 0.05, 80.0, 0.000_046_3),
    profile("sick_lrs_4xxx", 1, 0.1, 130.0, 0.000_013_9),
    profile("sick_mrs_1xxx", 4, 0.2, 64.0, 0.000_055_5),
    profile("sick_mrs_6xxx", 24, 0.2, 250.0, 0.000_013_9),
    profile("sick_rms_3xx", 1, 0.1, 200.0, 0.0),
    profile("sick_tim_240", 1, 0.05, 10.0, 0.000_333),
    profile("sick_tim_5xx", 1, 0.05, 25.0, 0.000_046_3),
    profile("sick_tim_7xx", 1, 0.05, 25.0, 0.000_046_3),
    profile("sick_tim_7xxS", 1, 0.05, 25.0, 0.000_046_3),
];

/// Errors from profile lookup
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("unknown scanner type: {0}")]
    UnknownScannerType(String),
}

impl ScannerProfile {
    /// Look up a profile by scanner type
    pub fn lookup(scanner_type: &str) -> Result<&'static ScannerProfile, ProfileError> {
        PROFILES
            .iter()
            .find(|p| p.name == scanner_type)
            .ok_or_else(|| ProfileError::UnknownScannerType(scanner_type.to_string()))
    }
}

/// Classification of an incoming telegram payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Telegram {
    /// Scan data event
    ScanData,
    /// Any other device message, as text
    Reply(String),
}

/// Per-process scan parser
#[derive(Debug, Clone)]
pub struct ScanParser {
    profile: &'static ScannerProfile,
    range_min: f64,
    range_max: f64,
    time_increment: f64,
    use_binary_protocol: bool,
    scans: u64,
}

/// Parser shared between the controller and the live session
pub type SharedParser = Arc<Mutex<ScanParser>>;

impl ScanParser {
    /// Build a parser for `scanner_type` with profile defaults
    pub fn new(scanner_type: &str) -> Result<Self, ProfileError> {
        let profile = ScannerProfile::lookup(scanner_type)?;
        debug!(scanner_type, layers = profile.layers, "Scan parser created");
        Ok(Self {
            profile,
            range_min: profile.range_min,
            range_max: profile.range_max,
            time_increment: profile.time_increment,
            use_binary_protocol: true,
            scans: 0,
        })
    }

    pub fn into_shared(self) -> SharedParser {
        Arc::new(Mutex::new(self))
    }

    pub fn scanner_type(&self) -> &'static str {
        self.profile.name
    }

    pub fn layers(&self) -> u8 {
        self.profile.layers
    }

    pub fn range_min(&self) -> f64 {
        self.range_min
    }

    pub fn set_range_min(&mut self, value: f64) {
        self.range_min = value;
    }

    pub fn range_max(&self) -> f64 {
        self.range_max
    }

    pub fn set_range_max(&mut self, value: f64) {
        self.range_max = value;
    }

    pub fn time_increment(&self) -> f64 {
        self.time_increment
    }

    pub fn set_time_increment(&mut self, value: f64) {
        self.time_increment = value;
    }

    pub fn use_binary_protocol(&self) -> bool {
        self.use_binary_protocol
    }

    pub fn set_use_binary_protocol(&mut self, binary: bool) {
        self.use_binary_protocol = binary;
    }

    /// Number of scan telegrams seen so far
    pub fn scans(&self) -> u64 {
        self.scans
    }

    /// Classify one framed payload
    pub fn parse_telegram(&mut self, payload: &[u8]) -> Telegram {
        if payload.starts_with(SCAN_DATA_PREFIX) {
            self.scans += 1;
            trace!(scans = self.scans, len = payload.len(), "Scan telegram");
            Telegram::ScanData
        } else {
            Telegram::Reply(reply_text(payload))
        }
    }
}

/// Printable part of a reply: the command text up to the first binary byte
pub fn reply_text(payload: &[u8]) -> String {
    let end = payload
        .iter()
        .position(|b| !(b.is_ascii_graphic() || *b == b' '))
        .unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}
