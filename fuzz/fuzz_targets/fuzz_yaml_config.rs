#![no_main]

use libfuzzer_sys::fuzz_target;
use vtysh_fuzz::Config;

fuzz_target!(|data: &[u8]| {
    // Try to parse arbitrary bytes as YAML config
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        if let Ok(config) = serde_saphyr::from_str::<Config>(yaml_str) {
            // Validation must reject or accept, never panic
            let _ = vtysh_fuzz::config::validate_config(&config);
        }
    }
});
