// Build script that tries to generate the C header with `cbindgen`.
// If `cbindgen` is not available, it copies the checked-in `include/chirp.h`
// to $OUT_DIR.
//
// Either way, consumers can include the header from:
//   - chirp-ffi/include/chirp.h   (checked-in)
//   - $OUT_DIR/chirp.h

use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/chirp.h");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR")) else {
        println!("cargo:warning=chirp-ffi: cargo did not set CARGO_MANIFEST_DIR/OUT_DIR");
        return;
    };
    let crate_dir = PathBuf::from(crate_dir);
    let header_repo = crate_dir.join("include").join("chirp.h");
    let header_out = PathBuf::from(out_dir).join("chirp.h");

    let cbindgen_ok = Command::new("cbindgen")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    if cbindgen_ok {
        let generated = Command::new("cbindgen")
            .args(["--crate", "chirp-ffi", "--lang", "C", "--output"])
            .arg(&header_out)
            .current_dir(&crate_dir)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if generated {
            let _ = fs::copy(&header_out, &header_repo);
            println!("cargo:warning=chirp-ffi: generated header with cbindgen -> {}", header_out.display());
            return;
        }
        println!("cargo:warning=chirp-ffi: cbindgen failed; falling back to checked-in header");
    }

    if let Err(e) = fs::copy(&header_repo, &header_out) {
        println!("cargo:warning=chirp-ffi: could not copy include/chirp.h to OUT_DIR: {e}");
    }
}
