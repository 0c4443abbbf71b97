use std::fs;
use std::path::Path;

use ime_client::settings::{self, Settings};

pub fn settings_export() {
    print!("{}", settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(settings::parse_settings_toml(&content), "Error: {}");
    println!(
        "OK: transport.use_remote={}, transport.port={}, session.capabilities={:?}",
        s.transport.use_remote,
        s.transport.port.as_deref().unwrap_or("-"),
        s.session.capabilities
    );
}

/// Settings from `file` (defaults otherwise) with `IME_*` overrides applied.
pub fn load(file: Option<&str>) -> Settings {
    let mut s = match file {
        Some(file) => die!(Settings::load(Path::new(file)), "Error: {}"),
        None => Settings::default(),
    };
    s.transport.apply_env();
    s
}
