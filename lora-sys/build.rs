//! Build script for lora-sys
//!
//! Points the linker at the prebuilt native driver. The library itself is
//! built and installed outside of cargo (it ships with the radio board's SDK).

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=LORA_LIB_DIR");

    // Without LORA_LIB_DIR the system search path (e.g. /usr/local/lib) is used.
    if let Some(dir) = env::var_os("LORA_LIB_DIR") {
        let dir = PathBuf::from(dir);
        if !dir.exists() {
            println!(
                "cargo:warning=LORA_LIB_DIR points at {} which does not exist",
                dir.display()
            );
        }
        println!("cargo:rustc-link-search=native={}", dir.display());
    }
}
