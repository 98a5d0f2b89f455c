mod fixtures;

use fixtures::TestEnv;

#[test]
fn test_double_start_warns_and_stop_reports() {
    let env = TestEnv::new("logging:\n  perf:\n    level: DEBUG\n");
    let perf = env.ctx.perflog().unwrap();

    perf.start("e");
    perf.start("e");
    let taken = perf.stop("e");

    assert!(taken.is_some());
    let lines = env.read_log("perf");
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("[D] \"e\" event tracking started"));
    assert!(lines[1].contains("[W] \"e\" event already started, resetting start time"));
    assert!(lines[2].contains("[I] \"e\" event took "));
    assert!(lines[2].contains(" seconds ("));
}

#[test]
fn test_stop_never_started() {
    let env = TestEnv::new("");
    let perf = env.ctx.perflog().unwrap();

    assert_eq!(perf.stop("never-started"), None);
    assert!(env.read_log("perf")[0].contains("[E] \"never-started\" not being tracked, call .start first"));
}

#[test]
fn test_perf_attributes_to_caller() {
    let env = TestEnv::new("");
    let perf = env.ctx.perflog().unwrap();

    perf.start("boot");
    let line = line!() + 1;
    perf.stop("boot");

    assert!(env.read_log("perf")[0].ends_with(&format!("({}:{})", file!(), line)));
}
