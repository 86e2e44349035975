//! Admin credential generator for attentium-node.
//!
//! Prints a fresh `admin_key` as a TOML snippet ready to paste into the node
//! configuration, or writes it to the file given as the first argument.
//!
//! Usage:
//!   cargo run --bin attentium-keygen [output-file]

use rand::rngs::OsRng;
use rand::RngCore;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Bytes of entropy in a generated key.
const KEY_BYTES: usize = 32;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let key = hex::encode(bytes);

    let snippet = format!(
        "# Generated {}\n# Send as the X-Admin-Key header to create campaigns without payment.\nadmin_key = \"{key}\"\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );

    match env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &snippet)?;
            println!("Admin key written to {}", path.display());
            println!("WARNING: Keep this file secure! Anyone holding the key can create unpaid campaigns.");
        }
        None => print!("{snippet}"),
    }

    Ok(())
}
