// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context, Result};
use clap::Parser;
use ssk_provision::args::FlashArgs;
use ssk_provision::mac::{Eui64, MacAddress};
use ssk_provision::store::{decode_banner, ProvisioningStore, Tpm2Store};
use ssk_provision::tool::SystemRunner;
use ssk_provision::Error;

fn main() -> Result<()> {
    let args = FlashArgs::parse();
    ssk_provision::init_logging(&[]);

    println!("---> Getting Wifi-MAC Address <---");
    let mac = match args.mac {
        Some(mac) => {
            println!("using MAC from the command line, not {}", args.interface);
            mac
        }
        None => MacAddress::of_interface(&args.interface)
            .with_context(|| format!("reading MAC of {}", args.interface))?,
    };
    println!("{mac}");

    println!("---> Converted Wifi-MAC Address to EUI64 Unique-Format <---");
    let eui = Eui64::from(mac).to_string();
    println!("{eui}");

    if eui.len() > usize::from(args.nv_size) {
        bail!(
            "identifier is {} bytes but the NV index is only {}",
            eui.len(),
            args.nv_size
        );
    }

    if args.dry_run {
        println!("You requested a dry run; nothing has been written.");
        return Ok(());
    }

    println!("---> EUI64 Unique-Format Writing To TPM Protected NV Area <---");
    let store = Tpm2Store::new(SystemRunner, args.nv_slot(), &args.eui_file);
    store
        .write_identity(&eui)
        .with_context(|| format!("writing identity to NV index {:#x}", args.nv_index))?;
    println!("written OK ({} staged in {})", eui, args.eui_file.display());

    if args.verify {
        println!("reading back...");
        let raw = store.read_raw().context("reading identity back")?;
        let found = decode_banner(&raw);
        if found != eui {
            println!("**** VERIFY FAILED ****");
            println!("{}", pretty_hex::pretty_hex(&raw));
            return Err(Error::Mismatch {
                expected: eui,
                found,
            }
            .into());
        }
        println!("read-back matches.");
    }

    Ok(())
}
