//! Build script for fwdctl
//!
//! Handles compile-time configuration for distro packagers and embeds
//! build-time information (git commit, dirty status, build timestamp).

fn main() {
    // Re-run build if the packager's iptables path changes
    println!("cargo:rerun-if-env-changed=FWDCTL_SYSTEM_IPTABLES_PATH");

    // Embed git commit, build time, and dirty status
    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
