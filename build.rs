use std::env;

fn main() {
    // Version string shared by --version and the User-Agent header
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".to_string());
    let version = match env::var("HTAIL_BUILD_SUFFIX") {
        Ok(suffix) if !suffix.is_empty() => format!("{version}+{suffix}"),
        _ => version,
    };
    println!("cargo:rustc-env=HTAIL_VERSION={version}");

    println!("cargo:rerun-if-env-changed=HTAIL_BUILD_SUFFIX");
    println!("cargo:rerun-if-changed=Cargo.toml");
}
