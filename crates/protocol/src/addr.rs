//! IPv4 wire address codec.
//!
//! DCC control messages carry IPv4 addresses as a single unsigned decimal
//! integer: the four octets packed most-significant-first. This scheme is
//! IPv4-only by design.

use crate::ProtocolError;

/// Converts a dotted-quad IPv4 address to its packed decimal wire form.
///
/// The input must be exactly four dot-separated octets, each in 0..=255.
pub fn ip_to_wire(addr: &str) -> Result<String, ProtocolError> {
    let mut packed: u64 = 0;
    let mut octets = 0;
    for part in addr.split('.') {
        let octet: u64 = part
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(addr.to_string()))?;
        if octet > 255 {
            return Err(ProtocolError::InvalidAddress(addr.to_string()));
        }
        packed = packed * 256 + octet;
        octets += 1;
    }
    if octets != 4 {
        return Err(ProtocolError::InvalidAddress(addr.to_string()));
    }
    Ok(packed.to_string())
}

/// Converts the packed decimal wire form back to a dotted quad.
///
/// Input that does not parse as an integer is returned unchanged: some
/// clients put arbitrary text in the address slot and the session may still
/// proceed, so degrading here is deliberately non-fatal.
pub fn wire_to_ip(wire: &str) -> String {
    let Ok(mut packed) = wire.parse::<u64>() else {
        return wire.to_string();
    };
    let mut quad = String::new();
    for _ in 0..3 {
        quad = format!(".{}{}", packed % 256, quad);
        packed /= 256;
    }
    format!("{packed}{quad}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(ip_to_wire("127.0.0.1").unwrap(), "2130706433");
        assert_eq!(wire_to_ip("2130706433"), "127.0.0.1");
        assert_eq!(ip_to_wire("0.0.0.0").unwrap(), "0");
        assert_eq!(wire_to_ip("0"), "0.0.0.0");
        assert_eq!(ip_to_wire("255.255.255.255").unwrap(), "4294967295");
        assert_eq!(wire_to_ip("4294967295"), "255.255.255.255");
    }

    #[test]
    fn roundtrip_valid_quads() {
        let samples = [
            "0.0.0.0",
            "1.2.3.4",
            "10.0.0.1",
            "127.0.0.1",
            "172.16.254.3",
            "192.168.1.10",
            "203.0.113.77",
            "255.255.255.255",
        ];
        for addr in samples {
            assert_eq!(wire_to_ip(&ip_to_wire(addr).unwrap()), addr);
        }
    }

    #[test]
    fn roundtrip_octet_boundaries() {
        for octet in [0u32, 1, 127, 128, 254, 255] {
            let addr = format!("{octet}.{octet}.{octet}.{octet}");
            assert_eq!(wire_to_ip(&ip_to_wire(&addr).unwrap()), addr);
        }
    }

    #[test]
    fn garbage_returned_unchanged() {
        assert_eq!(wire_to_ip("not-a-number"), "not-a-number");
        assert_eq!(wire_to_ip(""), "");
        assert_eq!(wire_to_ip("12.34"), "12.34");
        assert_eq!(wire_to_ip("-5"), "-5");
    }

    #[test]
    fn wrong_octet_count_rejected() {
        assert!(ip_to_wire("1.2.3").is_err());
        assert!(ip_to_wire("1.2.3.4.5").is_err());
        assert!(ip_to_wire("").is_err());
    }

    #[test]
    fn out_of_range_octet_rejected() {
        assert!(ip_to_wire("256.0.0.1").is_err());
        assert!(ip_to_wire("1.2.3.999").is_err());
    }

    #[test]
    fn non_numeric_octet_rejected() {
        assert!(ip_to_wire("a.b.c.d").is_err());
        assert!(ip_to_wire("1.2..4").is_err());
    }
}
