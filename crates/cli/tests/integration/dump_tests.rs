use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn dump_lists_steps_and_umbrella_targets() {
  let env = TestEnv::with_template(2);

  env
    .stepmake()
    .arg("dump")
    .assert()
    .success()
    .stdout(predicate::str::contains("step<N>_*.c"))
    .stdout(predicate::str::contains("steps.c"))
    .stdout(predicate::str::contains("s0 s1"))
    .stdout(predicate::str::contains("ss0 ss1"));

  assert!(env.compile_log().is_empty());
}

#[test]
fn dump_json_reflects_overrides() {
  let env = TestEnv::new(1);

  let output = env
    .stepmake()
    .env("CC", "clang")
    .env("STEPMAKE_DEBUG", "")
    .args(["dump", "-o", "json", "--opt-level=-O0", "--sdk-root", "/opt/sdk"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["compiler"]["program"], "clang");
  assert_eq!(json["compiler"]["opt_level"], "-O0");
  assert!(json["compiler"]["debug"].is_null());
  assert_eq!(json["compiler"]["sdk_root"], "/opt/sdk");
  assert_eq!(json["steps"][0]["regen_alias"], "ss0");
  assert_eq!(json["steps"][0]["executable_exists"], false);
}

#[test]
fn dump_does_not_need_a_working_compiler() {
  let env = TestEnv::new(1);
  env.break_compiler(1);

  env.stepmake().arg("dump").assert().success();
}
