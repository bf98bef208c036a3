fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let git = |args: &[&str]| {
        std::process::Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    };

    let pkg = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    // Release tags print the plain version; anything else is a dev build.
    let version = if git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some() {
        pkg
    } else {
        match git(&["rev-parse", "--short", "HEAD"]) {
            Some(hash) if !hash.is_empty() => format!("{pkg}-dev+{hash}"),
            _ => format!("{pkg}-dev"),
        }
    };
    println!("cargo:rustc-env=HOUSE_GUIDE_VERSION={version}");
}
