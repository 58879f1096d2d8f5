// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Startup snapshot of the identifier and version banners.

use crate::error::{Error, Result};
use crate::store::{decode_banner, ProvisioningStore};
use crate::tool::ToolRunner;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// `device_type` value for this class of board.
pub const DEVICE_TYPE: &str = "2";

const FIRMWARE_CHARS: usize = 27;
const GREENGRASS_CHARS: usize = 23;

pub const DEFAULT_GREENGRASSD: &str = "/greengrass/ggc/core/greengrassd";

/// Status payload published in answer to a version query. Field order is
/// the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionBundle {
    pub device_type: String,
    pub greengrass: String,
    #[serde(rename = "EUI64")]
    pub eui64: String,
    pub firmware: String,
}

impl VersionBundle {
    /// Builds the bundle from untrimmed banners, applying the fixed-width
    /// cuts.
    pub fn new(eui64: &str, firmware: &str, greengrass: &str) -> Self {
        VersionBundle {
            device_type: DEVICE_TYPE.to_string(),
            greengrass: truncate_chars(greengrass, GREENGRASS_CHARS),
            eui64: eui64.to_string(),
            firmware: truncate_chars(firmware, FIRMWARE_CHARS),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// How to collect the snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub greengrassd: PathBuf,
    /// Substitute an empty string for a banner whose tool fails.
    pub lenient: bool,
    /// Also leave the raw banners on disk for other tooling.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            greengrassd: PathBuf::from(DEFAULT_GREENGRASSD),
            lenient: false,
            scratch_dir: None,
        }
    }
}

/// Reads the identifier from `store` and the banners via `runner`.
///
/// A failed identity read is always fatal; there is nothing useful to report
/// without it.
pub fn snapshot(
    store: &dyn ProvisioningStore,
    runner: &dyn ToolRunner,
    config: &SnapshotConfig,
) -> Result<VersionBundle> {
    let eui64 = store.read_identity()?;
    if eui64.is_empty() {
        log::warn!("identity NV index is empty; was eui-flash run?");
    }

    let firmware = banner(runner, "uname", &["-a"], config.lenient)?;
    let greengrassd = config.greengrassd.display().to_string();
    let greengrass = banner(runner, &greengrassd, &["-v"], config.lenient)?;

    if let Some(dir) = &config.scratch_dir {
        write_scratch(dir, &eui64, &firmware, &greengrass)?;
    }

    let bundle = VersionBundle::new(&eui64, &firmware, &greengrass);
    log::info!(
        "snapshot: EUI64={} firmware={:?} greengrass={:?}",
        bundle.eui64,
        bundle.firmware,
        bundle.greengrass
    );
    Ok(bundle)
}

fn banner(runner: &dyn ToolRunner, program: &str, args: &[&str], lenient: bool) -> Result<String> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    match runner.run(program, &args) {
        Ok(out) => Ok(decode_banner(&out)),
        Err(e) if lenient => {
            log::warn!("{e}; reporting empty banner");
            Ok(String::new())
        }
        Err(e) => Err(Error::Provisioning(e)),
    }
}

fn write_scratch(dir: &Path, eui64: &str, firmware: &str, greengrass: &str) -> Result<()> {
    std::fs::write(dir.join("EUI_original.bin"), eui64)?;
    std::fs::write(dir.join("Firmware.bin"), firmware)?;
    std::fs::write(dir.join("ggc_version.bin"), greengrass)?;
    Ok(())
}
