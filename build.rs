use std::{env, fs, path::PathBuf};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let target = env::var("TARGET").unwrap_or_default();

    // 1) Pico 1W: copy our memory-pico1w.x to OUT_DIR as memory.x
    if target.starts_with("thumbv6m") {
        let memory_x =
            fs::read_to_string("memory-pico1w.x").expect("Failed to read memory-pico1w.x");
        fs::write(out_dir.join("memory.x"), memory_x).expect("Failed to write memory.x");
        println!("cargo:rustc-link-search={}", out_dir.display());
        println!("cargo:rerun-if-changed=memory-pico1w.x");
    }

    // 2) Load optional env files (still supported for convenience)
    let _ = dotenvy::from_filename(".env");
    load_home_env(".pico.env");

    // 3) Embed wifi_config.txt, or an empty file so the crate still builds without one
    let wifi_config = fs::read_to_string("wifi_config.txt").unwrap_or_default();
    if wifi_config.is_empty() && env::var_os("CARGO_FEATURE_WIFI").is_some() {
        println!("cargo:warning=WIFI feature enabled but wifi_config.txt is missing or empty");
    }
    fs::write(out_dir.join("wifi_config.txt"), wifi_config)
        .expect("Failed to write wifi_config.txt");
    println!("cargo:rerun-if-changed=wifi_config.txt");

    // 4) Expose the time settings as compile-time constants
    let ntp_host = env_or_default("NTP_HOST", "pool.ntp.org");
    let utc_offset = env_or_default("UTC_OFFSET_HOURS", "0");
    println!("cargo:rustc-env=NTP_HOST={ntp_host}");
    println!("cargo:rustc-env=UTC_OFFSET_HOURS={utc_offset}");

    println!("cargo:rerun-if-env-changed=NTP_HOST");
    println!("cargo:rerun-if-env-changed=UTC_OFFSET_HOURS");
    println!("cargo:rerun-if-changed=.env");
}

fn load_home_env(file: &str) {
    let Some(home) = env::var_os("USERPROFILE").or_else(|| env::var_os("HOME")) else {
        return;
    };
    let _ = dotenvy::from_path(PathBuf::from(home).join(file));
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
