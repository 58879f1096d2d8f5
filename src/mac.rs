// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MAC address lookup and the EUI64 identifier we derive from it.
//!
//! The identifier is *not* the IEEE modified EUI-64 (no `ff:fe` filler, no
//! U/L bit flip). It is the MAC's vendor half, a fixed `00:01` segment, then
//! the device half:
//!
//! ```text
//! aa:bb:cc:dd:ee:ff  ->  aa:bb:cc:00:01:dd:ee:ff
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Length of the formatted identifier, and so of the NV index holding it.
pub const EUI64_STR_LEN: usize = 23;

const SYSFS_NET: &str = "/sys/class/net";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Reads the hardware address of `interface` from sysfs.
    pub fn of_interface(interface: &str) -> Result<Self> {
        Self::of_interface_in(Path::new(SYSFS_NET), interface)
    }

    fn of_interface_in(root: &Path, interface: &str) -> Result<Self> {
        let fail = |reason: String| Error::Interface {
            interface: interface.to_string(),
            reason,
        };
        // The kernel truncates names to IFNAMSIZ - 1.
        if interface.is_empty() || interface.len() > 15 || interface.contains('/') {
            return Err(fail("not a valid interface name".into()));
        }
        let path: PathBuf = root.join(interface).join("address");
        let text = std::fs::read_to_string(&path)
            .map_err(|e| fail(format!("{}: {e}", path.display())))?;
        let mac: MacAddress = text.trim().parse().map_err(fail)?;
        if mac.0 == [0; 6] {
            return Err(fail("interface has no hardware address".into()));
        }
        Ok(mac)
    }
}

impl FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(format!("expected 6 octets in {s:?}"));
        }
        let mut out = [0u8; 6];
        for (byte, part) in out.iter_mut().zip(&parts) {
            let mut buf = [0u8; 1];
            hex::decode_to_slice(part, &mut buf)
                .map_err(|e| format!("bad octet {part:?}: {e}"))?;
            *byte = buf[0];
        }
        Ok(MacAddress(out))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_octets(f, &self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Eui64(pub [u8; 8]);

impl From<MacAddress> for Eui64 {
    fn from(mac: MacAddress) -> Self {
        let [a, b, c, d, e, f] = mac.0;
        Eui64([a, b, c, 0x00, 0x01, d, e, f])
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_octets(f, &self.0)
    }
}

fn write_octets(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for (i, b) in bytes.iter().enumerate() {
        if i != 0 {
            f.write_str(":")?;
        }
        write!(f, "{b:02x}")?;
    }
    Ok(())
}
