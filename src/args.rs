// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command lines of the two tools.

use crate::error::{Error, Result};
use crate::mac::MacAddress;
use crate::store::NvSlot;
use crate::version::{SnapshotConfig, DEFAULT_GREENGRASSD};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Derives this board's EUI64 from its Wi-Fi MAC and burns it into a TPM NV
/// index.
#[derive(Debug, Parser)]
#[command(version)]
pub struct FlashArgs {
    /// Network interface whose hardware address seeds the identifier.
    #[clap(short, long, default_value = "wlan0")]
    pub interface: String,
    /// Use this MAC instead of asking the interface. Handy on a bench
    /// machine that isn't the target.
    #[clap(long)]
    pub mac: Option<MacAddress>,
    /// NV index to define and write (any base, as long as it isn't octal).
    #[clap(long, default_value = "0x1500100", value_parser = parse_int::parse::<u32>)]
    pub nv_index: u32,
    /// TPMA_NV attribute bits for the new index.
    #[clap(long, default_value = "0x2000A", value_parser = parse_int::parse::<u32>)]
    pub nv_attributes: u32,
    /// Size of the index in bytes.
    #[clap(long, default_value = "23", value_parser = parse_int::parse::<u16>)]
    pub nv_size: u16,
    /// Scratch file the identifier is staged in for `tpm2_nvwrite`.
    #[clap(long, default_value = "EUI.bin")]
    pub eui_file: PathBuf,
    /// Derive and print the identifier, but don't touch the file or the TPM.
    #[clap(short = 'n', long)]
    pub dry_run: bool,
    /// Read the index back after writing and check it.
    #[clap(long)]
    pub verify: bool,
}

impl FlashArgs {
    pub fn nv_slot(&self) -> NvSlot {
        NvSlot {
            index: self.nv_index,
            attributes: self.nv_attributes,
            size: self.nv_size,
            ..NvSlot::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Both,
    Publish,
    Subscribe,
}

impl Mode {
    pub fn subscribes(self) -> bool {
        matches!(self, Mode::Both | Mode::Subscribe)
    }

    pub fn publishes(self) -> bool {
        matches!(self, Mode::Both | Mode::Publish)
    }
}

/// Reports this board's identifier and firmware versions over AWS IoT MQTT
/// whenever someone asks.
#[derive(Debug, Parser)]
#[command(version)]
pub struct ReporterArgs {
    /// Your AWS IoT custom endpoint.
    #[clap(short, long)]
    pub endpoint: String,
    /// Root CA file path.
    #[clap(short, long = "rootCA")]
    pub root_ca: PathBuf,
    /// Certificate file path.
    #[clap(short, long)]
    pub cert: Option<PathBuf>,
    /// Private key file path.
    #[clap(short, long)]
    pub key: Option<PathBuf>,
    /// Port number override. Defaults to 443 for WebSocket, 8883 otherwise.
    #[clap(short, long)]
    pub port: Option<u16>,
    /// Use MQTT over WebSocket.
    #[clap(short, long)]
    pub websocket: bool,
    /// Targeted thing name.
    #[clap(short = 'n', long = "thingName", default_value = "Bot")]
    pub thing_name: String,
    /// Targeted client id.
    #[clap(short = 'i', long = "clientId", default_value = "GG_Switch")]
    pub client_id: String,
    /// Topic the --message is published to.
    #[clap(short, long, default_value = "sdk/test/Python")]
    pub topic: String,
    /// Operation mode.
    #[clap(short, long, value_enum, default_value_t = Mode::Both)]
    pub mode: Mode,
    /// Message published to --topic once connected (publish/both modes).
    #[clap(short = 'M', long, default_value = "Hello World!")]
    pub message: String,

    /// NV index holding the identifier.
    #[clap(long, default_value = "0x1500100", value_parser = parse_int::parse::<u32>)]
    pub nv_index: u32,
    /// Authorization hierarchy used to read the index.
    #[clap(long, default_value = "0x40000001", value_parser = parse_int::parse::<u32>)]
    pub nv_auth: u32,
    /// Bytes to read from the index.
    #[clap(long, default_value = "23", value_parser = parse_int::parse::<u16>)]
    pub nv_size: u16,
    /// Path of the Greengrass daemon queried for its version.
    #[clap(long, default_value = DEFAULT_GREENGRASSD)]
    pub greengrassd: PathBuf,
    /// Also leave the snapshot banners in this directory.
    #[clap(long)]
    pub scratch_dir: Option<PathBuf>,
    /// Report an empty banner instead of failing when uname or greengrassd
    /// can't be run.
    #[clap(long)]
    pub lenient: bool,
    /// Turn on the MQTT client's debug chatter.
    #[clap(short, long)]
    pub verbose: bool,
}

/// How we authenticate to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// X.509 client certificate over plain TLS.
    Certificate { cert: PathBuf, key: PathBuf },
    /// MQTT over WebSocket + TLS.
    WebSocket,
}

/// Broker connection parameters that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub endpoint: String,
    pub port: u16,
    pub root_ca: PathBuf,
    pub auth: Auth,
    pub client_id: String,
}

impl ReporterArgs {
    /// Checks the authentication flags and fills in the port default.
    /// Nothing touches the network before this succeeds.
    pub fn connection(&self) -> Result<ConnectionSettings> {
        let auth = match (self.websocket, &self.cert, &self.key) {
            (true, cert, key) if cert.is_some() || key.is_some() => {
                return Err(Error::BadArguments(
                    "X.509 cert authentication and WebSocket are mutually exclusive. \
                     Please pick one."
                        .into(),
                ))
            }
            (true, _, _) => Auth::WebSocket,
            (false, Some(cert), Some(key)) => Auth::Certificate {
                cert: cert.clone(),
                key: key.clone(),
            },
            (false, _, _) => {
                return Err(Error::BadArguments(
                    "Missing credentials for authentication.".into(),
                ))
            }
        };
        let port = self.port.unwrap_or(match auth {
            Auth::WebSocket => 443,
            Auth::Certificate { .. } => 8883,
        });

        Ok(ConnectionSettings {
            endpoint: self.endpoint.clone(),
            port,
            root_ca: self.root_ca.clone(),
            auth,
            client_id: self.client_id.clone(),
        })
    }

    pub fn nv_slot(&self) -> NvSlot {
        NvSlot {
            index: self.nv_index,
            auth: self.nv_auth,
            size: self.nv_size,
            ..NvSlot::default()
        }
    }

    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            greengrassd: self.greengrassd.clone(),
            lenient: self.lenient,
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DEFAULT_NV_AUTH;

    fn reporter(extra: &[&str]) -> ReporterArgs {
        let mut argv = vec!["version-reporter", "-e", "abc-ats.iot.us-east-1.amazonaws.com", "-r", "root.pem"];
        argv.extend_from_slice(extra);
        ReporterArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cert_auth_defaults_to_8883() {
        let conn = reporter(&["-c", "dev.crt", "-k", "dev.key"]).connection().unwrap();
        assert_eq!(conn.port, 8883);
        assert_eq!(
            conn.auth,
            Auth::Certificate {
                cert: "dev.crt".into(),
                key: "dev.key".into()
            }
        );
        assert_eq!(conn.client_id, "GG_Switch");
    }

    #[test]
    fn websocket_defaults_to_443() {
        let conn = reporter(&["--websocket"]).connection().unwrap();
        assert_eq!(conn.port, 443);
        assert_eq!(conn.auth, Auth::WebSocket);
    }

    #[test]
    fn port_override_wins() {
        let conn = reporter(&["-w", "-p", "8443"]).connection().unwrap();
        assert_eq!(conn.port, 8443);
    }

    #[test]
    fn websocket_and_cert_conflict() {
        let err = reporter(&["-w", "-c", "dev.crt", "-k", "dev.key"])
            .connection()
            .unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)));

        let err = reporter(&["-w", "-k", "dev.key"]).connection().unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)));
    }

    #[test]
    fn missing_credentials_rejected() {
        assert!(matches!(
            reporter(&[]).connection().unwrap_err(),
            Error::BadArguments(_)
        ));
        assert!(matches!(
            reporter(&["-c", "dev.crt"]).connection().unwrap_err(),
            Error::BadArguments(_)
        ));
    }

    #[test]
    fn original_long_flags_parse() {
        let args = reporter(&[
            "--websocket",
            "--thingName",
            "Gateway",
            "--clientId",
            "ssk-01",
            "--mode",
            "subscribe",
            "--nv-index",
            "0x1500200",
        ]);
        assert_eq!(args.thing_name, "Gateway");
        assert_eq!(args.client_id, "ssk-01");
        assert_eq!(args.mode, Mode::Subscribe);
        assert!(!args.mode.publishes());
        assert_eq!(args.nv_slot().index, 0x0150_0200);
        assert_eq!(args.nv_slot().auth, DEFAULT_NV_AUTH);
    }

    #[test]
    fn unknown_mode_is_usage_error() {
        let err = ReporterArgs::try_parse_from([
            "version-reporter", "-e", "x", "-r", "y", "-w", "-m", "sideways",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn flash_defaults() {
        let args = FlashArgs::try_parse_from(["eui-flash"]).unwrap();
        assert_eq!(args.interface, "wlan0");
        assert_eq!(args.nv_slot(), NvSlot::default());
        assert_eq!(args.eui_file, PathBuf::from("EUI.bin"));
    }

    #[test]
    fn flash_takes_mac_override() {
        let args = FlashArgs::try_parse_from(["eui-flash", "--mac", "aa:bb:cc:dd:ee:ff", "-n"]).unwrap();
        assert_eq!(args.mac, Some(MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])));
        assert!(args.dry_run);
    }
}
