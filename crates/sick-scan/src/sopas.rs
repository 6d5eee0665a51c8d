//! SOPAS command texts and reply helpers

use std::net::Ipv4Addr;

use crate::profile::SCAN_DATA_PREFIX;

/// Read the device identification
pub const DEVICE_IDENT: &str = "sRN DeviceIdent";
/// Subscribe to scan data events
pub const START_SCAN_DATA: &str = "sEN LMDscandata 1";
/// Unsubscribe from scan data events
pub const STOP_SCAN_DATA: &str = "sEN LMDscandata 0";
/// Log in as authorized client
pub const SET_ACCESS_MODE: &str = "sMN SetAccessMode 03 F4724744";
/// Persist written parameters
pub const WRITE_ALL: &str = "sMN mEEwriteall";
/// Leave configuration mode
pub const RUN: &str = "sMN Run";

/// Command writing a new device IP address, octets in hex
pub fn set_ip_command(ip: Ipv4Addr) -> String {
    let octets: Vec<String> = ip.octets().iter().map(|o| hex::encode_upper([*o])).collect();
    format!("sWN EIIpAddr {}", octets.join(" "))
}

/// True for `sFA` error replies
pub fn is_error_reply(payload: &[u8]) -> bool {
    payload.starts_with(b"sFA")
}

pub fn is_scan_data(payload: &[u8]) -> bool {
    payload.starts_with(SCAN_DATA_PREFIX)
}

/// Positive reply a device sends for `command`
///
/// The method code is mapped (`sRN` to `sRA`, `sWN` to `sWA`, `sMN` to
/// `sAN`, `sEN` to `sEA`) and the rest of the command is echoed. Unknown
/// method codes yield `None`.
pub fn positive_reply(command: &str) -> Option<String> {
    let method = command.get(..3)?;
    let rest = &command[3..];
    let answer = match method {
        "sRN" => "sRA",
        "sWN" => "sWA",
        "sMN" => "sAN",
        "sEN" => "sEA",
        _ => return None,
    };
    Some(format!("{}{}", answer, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_ip_command() {
        let cmd = set_ip_command(Ipv4Addr::new(192, 168, 0, 10));
        assert_eq!(cmd, "sWN EIIpAddr C0 A8 00 0A");
    }

    #[test]
    fn test_positive_reply() {
        assert_eq!(
            positive_reply(START_SCAN_DATA).as_deref(),
            Some("sEA LMDscandata 1")
        );
        assert_eq!(
            positive_reply(SET_ACCESS_MODE).as_deref(),
            Some("sAN SetAccessMode 03 F4724744")
        );
        assert_eq!(positive_reply("xyz"), None);
        assert_eq!(positive_reply(""), None);
    }

    #[test]
    fn test_reply_classes() {
        assert!(is_error_reply(b"sFA 5"));
        assert!(!is_error_reply(b"sRA DeviceIdent"));
        assert!(is_scan_data(b"sSN LMDscandata 1"));
    }
}
