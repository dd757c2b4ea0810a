fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Pass through SYSREV_GIT_HASH from the release build environment
    println!("cargo:rerun-if-env-changed=SYSREV_GIT_HASH");
    if let Ok(hash) = std::env::var("SYSREV_GIT_HASH") {
        println!("cargo:rustc-env=SYSREV_GIT_HASH={}", hash);
    }
}
