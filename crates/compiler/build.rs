//! Build script for vectorize-compiler.
//!
//! Locates the vectorize-intrinsics static library so it can be embedded
//! into the compiler binary/library, and compiles the wire-protocol
//! `.proto` schema with `prost-build`.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    verify_intrinsics_version();
    embed_intrinsics_lib();
    compile_proto();
}

fn embed_intrinsics_lib() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // OUT_DIR = target/<profile>/build/<pkg>-<hash>/out
    let target_dir = out_dir
        .parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .expect("could not locate target directory from OUT_DIR");

    let direct_lib = target_dir.join("libvectorize_intrinsics.a");
    let lib_path = if direct_lib.exists() {
        direct_lib
    } else {
        let deps_dir = target_dir.join("deps");
        find_intrinsics_in_deps(&deps_dir).unwrap_or_else(|| {
            panic!(
                "intrinsics static library not found.\nLooked in: {}\nAnd deps: {}\nOUT_DIR was: {}",
                direct_lib.display(),
                deps_dir.display(),
                out_dir.display()
            )
        })
    };

    println!(
        "cargo:rustc-env=VECTORIZE_INTRINSICS_LIB_PATH={}",
        lib_path.display()
    );
    println!("cargo:rerun-if-changed={}", lib_path.display());
}

fn find_intrinsics_in_deps(deps_dir: &PathBuf) -> Option<PathBuf> {
    if !deps_dir.exists() {
        return None;
    }
    fs::read_dir(deps_dir).ok()?.find_map(|entry| {
        let entry = entry.ok()?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with("libvectorize_intrinsics") && name_str.ends_with(".a") {
            Some(entry.path())
        } else {
            None
        }
    })
}

fn verify_intrinsics_version() {
    let compiler_version = env!("CARGO_PKG_VERSION");
    let cargo_toml = fs::read_to_string("Cargo.toml").expect("failed to read compiler Cargo.toml");
    let intrinsics_version = cargo_toml
        .lines()
        .find(|line| line.contains("vectorize-intrinsics") && line.contains("version"))
        .and_then(|line| line.split("version = \"").nth(1))
        .and_then(|s| s.split('"').next())
        .expect("could not find vectorize-intrinsics version in Cargo.toml");
    let intrinsics_version = intrinsics_version.trim_start_matches('=');

    if compiler_version != intrinsics_version {
        panic!(
            "version mismatch: vectorize-compiler {compiler_version} vs. \
             vectorize-intrinsics {intrinsics_version}; the embedded intrinsics \
             library must match the compiler's own version exactly"
        );
    }
}

fn compile_proto() {
    unsafe {
        env::set_var("PROTOC", protobuf_src::protoc());
    }
    prost_build::compile_protos(&["proto/expression.proto"], &["proto/"])
        .expect("failed to compile proto/expression.proto");
}
