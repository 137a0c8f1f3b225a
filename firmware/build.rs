use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    // Put the linker scripts somewhere the linker can find them
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    for script in ["memory.x", "device.x"] {
        fs::copy(script, out.join(script)).unwrap();
        println!("cargo:rerun-if-changed={script}");
    }
    println!("cargo:rustc-link-search={}", out.display());

    // Host builds of the library never link the runtime
    let target = env::var("TARGET").unwrap_or_default();
    if target.starts_with("thumbv8m") {
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        if env::var_os("CARGO_FEATURE_DEFMT").is_some() {
            println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
        }
    }
}
