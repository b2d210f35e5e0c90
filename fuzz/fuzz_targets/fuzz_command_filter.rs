#![no_main]

use libfuzzer_sys::fuzz_target;
use vtysh_fuzz::CommandFilter;

fuzz_target!(|data: (Vec<String>, Vec<String>, &str)| {
    let (whitelist, blacklist, command) = data;

    // Arbitrary patterns either compile or are rejected
    if let Ok(filter) = CommandFilter::compile(&whitelist, &blacklist, &[], &[]) {
        let _verdict = filter.check(command);
    }
});
