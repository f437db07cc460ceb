// build.rs
//
// Windows only: compiles the SpoutDX C-ABI bridge (native/spout_bridge.cpp) together with the
// Spout SDK sources it needs into a static lib, links the D3D11 system libraries, and sets
// `cfg(has_spout)` so `output::spout` uses the real sender.
//
// The Spout SDK is not vendored. Point SPOUT_SDK_DIR at a checkout of
// https://github.com/leadedge/Spout2 (the directory containing SPOUTSDK/). Without it the crate
// still builds; the sender channel just fails to open at runtime and the plugin stays inert.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};

// SpoutDX + the SpoutGL helpers it depends on, relative to SPOUTSDK/.
const SPOUT_SOURCES: &[&str] = &[
    "SpoutDirectX/SpoutDX/SpoutDX.cpp",
    "SpoutGL/SpoutDirectX.cpp",
    "SpoutGL/SpoutSenderNames.cpp",
    "SpoutGL/SpoutSharedMemory.cpp",
    "SpoutGL/SpoutFrameCount.cpp",
    "SpoutGL/SpoutCopy.cpp",
    "SpoutGL/SpoutUtils.cpp",
];

fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed=native/spout_bridge.cpp");
    println!("cargo:rerun-if-changed=native/spout_bridge.h");
    println!("cargo:rerun-if-env-changed=SPOUT_SDK_DIR");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return Ok(());
    }

    let Ok(sdk_dir) = env::var("SPOUT_SDK_DIR") else {
        println!("cargo:warning=SPOUT_SDK_DIR not set; building without Spout output");
        return Ok(());
    };

    let sdk = PathBuf::from(sdk_dir).join("SPOUTSDK");
    ensure!(
        sdk.is_dir(),
        "SPOUT_SDK_DIR must contain SPOUTSDK/ (looked in {})",
        sdk.display()
    );

    compile_bridge(&sdk).context("compiling the SpoutDX bridge")?;

    println!("cargo:rustc-link-lib=d3d11");
    println!("cargo:rustc-link-lib=dxgi");
    println!("cargo:rustc-link-lib=user32");
    println!("cargo:rustc-link-lib=shlwapi");
    println!("cargo:rustc-link-lib=winmm");
    println!("cargo:rustc-cfg=has_spout");
    Ok(())
}

fn compile_bridge(sdk: &Path) -> anyhow::Result<()> {
    let mut build = cc::Build::new();
    build
        .cpp(true)
        .file("native/spout_bridge.cpp")
        .include("native")
        .include(sdk.join("SpoutDirectX/SpoutDX"))
        .include(sdk.join("SpoutGL"))
        .define("UNICODE", None)
        .define("_UNICODE", None)
        .flag_if_supported("/std:c++17")
        .flag_if_supported("/EHsc")
        .warnings(false);

    for rel in SPOUT_SOURCES {
        let src = sdk.join(rel);
        ensure!(src.is_file(), "missing Spout SDK source {}", src.display());
        println!("cargo:rerun-if-changed={}", src.display());
        build.file(src);
    }

    build.try_compile("spout_bridge")?; // -> spout_bridge.lib
    Ok(())
}
