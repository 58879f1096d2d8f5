// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Where the device identity lives: a TPM NV index, reached through the
//! tpm2-tools 3.x command line.

use crate::error::{Error, Result};
use crate::mac::EUI64_STR_LEN;
use crate::tool::ToolRunner;
use std::path::PathBuf;

pub const DEFAULT_NV_INDEX: u32 = 0x0150_0100;
/// TPM_RH_OWNER, the hierarchy the index is read through.
pub const DEFAULT_NV_AUTH: u32 = 0x4000_0001;
/// OWNERWRITE | POLICYWRITE | OWNERREAD.
pub const DEFAULT_NV_ATTRIBUTES: u32 = 0x0002_000A;

/// Read and write access to the provisioned identifier.
pub trait ProvisioningStore {
    fn read_identity(&self) -> Result<String>;
    fn write_identity(&self, identity: &str) -> Result<()>;
}

/// Geometry and policy of the NV index holding the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvSlot {
    pub index: u32,
    pub auth: u32,
    pub size: u16,
    pub attributes: u32,
}

impl Default for NvSlot {
    fn default() -> Self {
        NvSlot {
            index: DEFAULT_NV_INDEX,
            auth: DEFAULT_NV_AUTH,
            size: EUI64_STR_LEN as u16,
            attributes: DEFAULT_NV_ATTRIBUTES,
        }
    }
}

pub struct Tpm2Store<R> {
    runner: R,
    slot: NvSlot,
    /// `tpm2_nvwrite` only takes its data from a file. Absent for stores
    /// that only read.
    scratch: Option<PathBuf>,
}

impl<R: ToolRunner> Tpm2Store<R> {
    /// A store that can write, staging the identifier in `scratch`.
    pub fn new(runner: R, slot: NvSlot, scratch: impl Into<PathBuf>) -> Self {
        Tpm2Store {
            runner,
            slot,
            scratch: Some(scratch.into()),
        }
    }

    pub fn read_only(runner: R, slot: NvSlot) -> Self {
        Tpm2Store {
            runner,
            slot,
            scratch: None,
        }
    }

    /// Raw bytes currently held in the index.
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        let args = vec![
            "-x".to_string(),
            format!("{:#x}", self.slot.index),
            "-a".to_string(),
            format!("{:#x}", self.slot.auth),
            "-s".to_string(),
            self.slot.size.to_string(),
        ];
        Ok(self.runner.run("tpm2_nvread", &args)?)
    }

    fn define(&self) -> Result<()> {
        let args = vec![
            "-x".to_string(),
            format!("{:#x}", self.slot.index),
            "-a".to_string(),
            "o".to_string(),
            "-s".to_string(),
            self.slot.size.to_string(),
            "-b".to_string(),
            format!("{:#x}", self.slot.attributes),
        ];
        self.runner.run("tpm2_nvdefine", &args)?;
        Ok(())
    }
}

impl<R: ToolRunner> ProvisioningStore for Tpm2Store<R> {
    fn read_identity(&self) -> Result<String> {
        Ok(decode_banner(&self.read_raw()?))
    }

    fn write_identity(&self, identity: &str) -> Result<()> {
        let scratch = self.scratch.as_ref().ok_or_else(|| {
            Error::BadArguments("read-only store has no scratch file to stage the identity in".into())
        })?;
        std::fs::write(scratch, identity)?;
        log::info!(
            "defining NV index {:#x} ({} bytes, attributes {:#x})",
            self.slot.index,
            self.slot.size,
            self.slot.attributes,
        );
        self.define()?;

        let args = vec![
            "-x".to_string(),
            format!("{:#x}", self.slot.index),
            "-a".to_string(),
            "o".to_string(),
            scratch.display().to_string(),
        ];
        self.runner.run("tpm2_nvwrite", &args)?;
        Ok(())
    }
}

/// Turns tool output into text: lossy UTF-8, with trailing NULs (unwritten
/// NV bytes) and whitespace dropped.
pub fn decode_banner(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::fake::FakeRunner;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn write_defines_then_writes() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("EUI.bin");
        let runner = FakeRunner::default()
            .with("tpm2_nvdefine", b"")
            .with("tpm2_nvwrite", b"");
        let store = Tpm2Store::new(runner, NvSlot::default(), &scratch);

        store.write_identity("aa:bb:cc:00:01:dd:ee:ff").unwrap();

        assert_eq!(
            std::fs::read_to_string(&scratch).unwrap(),
            "aa:bb:cc:00:01:dd:ee:ff"
        );
        let calls = store.runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "tpm2_nvdefine");
        assert_eq!(
            calls[0].1,
            args(&["-x", "0x1500100", "-a", "o", "-s", "23", "-b", "0x2000a"])
        );
        assert_eq!(calls[1].0, "tpm2_nvwrite");
        assert_eq!(
            calls[1].1,
            args(&["-x", "0x1500100", "-a", "o", &scratch.display().to_string()])
        );
    }

    #[test]
    fn failed_define_stops_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default()
            .failing("tpm2_nvdefine")
            .with("tpm2_nvwrite", b"");
        let store = Tpm2Store::new(runner, NvSlot::default(), dir.path().join("EUI.bin"));

        let err = store.write_identity("aa:bb:cc:00:01:dd:ee:ff").unwrap_err();
        assert!(matches!(err, Error::Provisioning(_)));
        assert_eq!(store.runner.programs(), vec!["tpm2_nvdefine".to_string()]);
    }

    #[test]
    fn read_trims_padding() {
        let runner = FakeRunner::default().with("tpm2_nvread", b"aa:bb:cc:00:01:dd:ee:ff\0\0\n");
        let store = Tpm2Store::read_only(runner, NvSlot::default());

        assert_eq!(store.read_identity().unwrap(), "aa:bb:cc:00:01:dd:ee:ff");
        let calls = store.runner.calls.borrow();
        assert_eq!(
            calls[0].1,
            args(&["-x", "0x1500100", "-a", "0x40000001", "-s", "23"])
        );
    }

    #[test]
    fn read_only_store_refuses_writes() {
        let runner = FakeRunner::default()
            .with("tpm2_nvdefine", b"")
            .with("tpm2_nvwrite", b"");
        let store = Tpm2Store::read_only(runner, NvSlot::default());

        let err = store.write_identity("aa:bb:cc:00:01:dd:ee:ff").unwrap_err();
        assert!(matches!(err, Error::BadArguments(_)));
        assert!(store.runner.programs().is_empty());
    }

    #[test]
    fn read_failure_is_provisioning_error() {
        let runner = FakeRunner::default().failing("tpm2_nvread");
        let store = Tpm2Store::read_only(runner, NvSlot::default());
        assert!(matches!(
            store.read_identity().unwrap_err(),
            Error::Provisioning(_)
        ));
    }
}
