//! End-to-end runs mixing every order kind

use orderkit::{
    BoxedOrder, DataOrder, EngineOptions, EnvOrder, Environment, Error, FailurePolicy,
    MemoryEnvironment, Order, RunOrder, ScriptOrder, SystemEnvironment, execute_simple,
};
use serial_test::serial;
use tempfile::TempDir;

fn script(sequence: i64, id: &str, source: &str, dir: &TempDir) -> ScriptOrder {
    ScriptOrder::new(Order::new(sequence, id), source).with_source_dir(dir.path())
}

#[test]
#[serial]
fn shared_data_reaches_later_scripts() {
    let dir = TempDir::new().unwrap();
    let orders: Vec<BoxedOrder> = vec![
        Box::new(script(1, "print", "echo #shared[seed]", &dir)),
        Box::new(DataOrder::new(Order::new(0, "seed"), "42")),
    ];

    let outcome =
        execute_simple(orders, &mut MemoryEnvironment::new(), &EngineOptions::default()).unwrap();

    let output = outcome.report("print").unwrap().output_str();
    assert!(output.contains("42"));
    assert!(!output.contains("#shared[seed]"));
    assert_eq!(outcome.global.data["#data:seed"], "42");
}

#[test]
#[serial]
fn targeted_variables_only_reach_listed_orders() {
    let dir = TempDir::new().unwrap();
    let orders: Vec<BoxedOrder> = vec![
        Box::new(EnvOrder::new(Order::new(0, "route"), "ORDERKIT_X", "y").with_targets(["B", "C"])),
        Box::new(script(1, "A", "echo \"a=${ORDERKIT_X:-unset}\"", &dir)),
        Box::new(script(2, "B", "echo \"b=${ORDERKIT_X:-unset}\"", &dir)),
        Box::new(script(3, "C", "echo \"c=${ORDERKIT_X:-unset}\"", &dir)),
    ];
    let mut env = MemoryEnvironment::new();

    let outcome = execute_simple(orders, &mut env, &EngineOptions::default()).unwrap();

    assert_eq!(outcome.report("A").unwrap().output_str(), "a=unset\n");
    assert_eq!(outcome.report("B").unwrap().output_str(), "b=y\n");
    assert_eq!(outcome.report("C").unwrap().output_str(), "c=y\n");
    assert!(outcome.global.env_vars.is_empty());
    assert_eq!(env.var("ORDERKIT_X"), None);
}

#[test]
#[serial]
fn failing_order_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let unwritable = ScriptOrder::new(Order::new(0, "broken"), "echo never")
        .with_source_dir(dir.path().join("does-not-exist"));
    let orders: Vec<BoxedOrder> = vec![
        Box::new(unwritable),
        Box::new(EnvOrder::new(Order::new(1, "env"), "ORDERKIT_AFTER", "yes")),
        Box::new(script(2, "check", "echo \"$ORDERKIT_AFTER\"", &dir)),
    ];
    let mut env = MemoryEnvironment::new();

    let outcome = execute_simple(orders, &mut env, &EngineOptions::default()).unwrap();

    let broken = outcome.report("broken").unwrap();
    assert_eq!(broken.exit_code, 1);
    assert!(matches!(broken.errors.as_slice(), [Error::ScriptWrite { .. }]));
    assert_eq!(outcome.global.env_vars["ORDERKIT_AFTER"], "yes");
    assert_eq!(outcome.report("check").unwrap().output_str(), "yes\n");

    let summary = outcome.summary();
    assert_eq!(summary.executed, 3);
    assert_eq!(summary.failed, 1);
}

#[test]
#[serial]
fn halt_policy_skips_remaining_orders() {
    let dir = TempDir::new().unwrap();
    let orders: Vec<BoxedOrder> = vec![
        Box::new(script(0, "fails", "exit 1", &dir)),
        Box::new(DataOrder::new(Order::new(1, "late"), "value")),
    ];
    let opts = EngineOptions {
        failure: FailurePolicy::Halt,
        ..Default::default()
    };

    let outcome = execute_simple(orders, &mut MemoryEnvironment::new(), &opts).unwrap();

    assert_eq!(outcome.skipped, vec!["late".to_string()]);
    assert!(outcome.global.data.is_empty());
    assert!(!outcome.summary().is_success());
}

#[test]
fn unknown_target_is_dropped() {
    let orders: Vec<BoxedOrder> = vec![
        Box::new(EnvOrder::new(Order::new(0, "route"), "X", "y").with_targets(["nobody"])),
        Box::new(DataOrder::new(Order::new(1, "after"), "ran")),
    ];

    let outcome =
        execute_simple(orders, &mut MemoryEnvironment::new(), &EngineOptions::default()).unwrap();

    assert!(!outcome.contexts.contains_key("nobody"));
    assert!(outcome.contexts.values().all(|ctx| ctx.env_vars.is_empty()));
    assert_eq!(outcome.global.data["#data:after"], "ran");
    assert!(outcome.summary().is_success());
}

#[test]
fn run_orders_are_sequenced_but_inert() {
    let orders: Vec<BoxedOrder> = vec![
        Box::new(RunOrder {
            order: Order::new(0, "server"),
            command: "definitely-not-a-command".into(),
            args: Vec::new(),
            find: true,
        }),
        Box::new(DataOrder::new(Order::new(1, "after"), "ran")),
    ];

    let outcome =
        execute_simple(orders, &mut MemoryEnvironment::new(), &EngineOptions::default()).unwrap();

    assert!(outcome.report("server").unwrap().is_empty());
    assert_eq!(outcome.global.data["#data:after"], "ran");
}

#[test]
#[serial]
fn global_env_order_sets_process_variable() {
    let key = "ORDERKIT_GLOBAL_ENV";
    let mut env = SystemEnvironment;
    env.remove_var(key).unwrap();
    let orders: Vec<BoxedOrder> = vec![Box::new(EnvOrder::new(Order::new(0, "a"), key, "1"))];

    let outcome = execute_simple(orders, &mut env, &EngineOptions::default()).unwrap();

    assert_eq!(outcome.global.env_vars[key], "1");
    assert_eq!(std::env::var(key).as_deref(), Ok("1"));
    env.remove_var(key).unwrap();
}

#[test]
#[serial]
fn script_overrides_are_undone_for_the_next_order() {
    let dir = TempDir::new().unwrap();
    let key = "ORDERKIT_FOO";
    let mut env = SystemEnvironment;
    env.set_var(key, "old").unwrap();

    let orders: Vec<BoxedOrder> = vec![
        Box::new(EnvOrder::new(Order::new(0, "inject"), key, "bar").with_targets(["first"])),
        Box::new(script(1, "first", &format!("echo \"${key}\""), &dir)),
        Box::new(script(2, "second", &format!("echo \"${key}\""), &dir)),
    ];

    let outcome = execute_simple(orders, &mut env, &EngineOptions::default()).unwrap();

    assert_eq!(outcome.report("first").unwrap().output_str(), "bar\n");
    assert_eq!(outcome.report("second").unwrap().output_str(), "old\n");
    assert_eq!(std::env::var(key).as_deref(), Ok("old"));
    env.remove_var(key).unwrap();
}

#[test]
#[serial]
fn output_variable_chains_scripts() {
    let dir = TempDir::new().unwrap();
    let orders: Vec<BoxedOrder> = vec![
        Box::new(script(0, "detect", "echo linux", &dir).with_output_var("platform")),
        Box::new(script(1, "use", "echo \"building for #shared[platform]\"", &dir)),
    ];

    let outcome =
        execute_simple(orders, &mut MemoryEnvironment::new(), &EngineOptions::default()).unwrap();

    assert_eq!(
        outcome.report("use").unwrap().output_str(),
        "building for linux\n"
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
