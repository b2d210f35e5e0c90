#![no_main]

use libfuzzer_sys::fuzz_target;
use vtysh_fuzz::config::Substitutions;
use vtysh_fuzz::prepare_command;

fuzz_target!(|data: (&str, Vec<(String, String)>)| {
    let (line, pairs) = data;
    let substitutions: Substitutions = pairs.into_iter().collect();

    // Arbitrary substitution tables must never panic
    let _ = prepare_command(line, &substitutions);

    // Without substitutions tokens are single-space separated and a
    // second pass changes nothing
    let plain = prepare_command(line, &Substitutions::new());
    assert_eq!(plain.trim(), plain);
    assert!(!plain.contains("  "));
    assert_eq!(prepare_command(&plain, &Substitutions::new()), plain);
});
