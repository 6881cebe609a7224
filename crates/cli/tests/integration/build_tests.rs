use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn all_builds_one_executable_per_step() {
  let env = TestEnv::new(3);

  env
    .stepmake()
    .assert()
    .success()
    .stdout(predicate::str::contains("Built step 0"))
    .stdout(predicate::str::contains("Built step 2"));

  for n in 0..3 {
    assert!(env.exe(n).exists(), "missing executable for step {}", n);
  }
  assert_eq!(env.compile_log().len(), 3);
  assert_eq!(env.read("step1_read"), "/* step 1 */\n/* util */\n");
}

#[test]
fn second_run_has_nothing_to_do() {
  let env = TestEnv::new(3);

  env.stepmake().arg("all").assert().success();
  env
    .stepmake()
    .arg("all")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to do"));

  assert_eq!(env.compile_log().len(), 3);
}

#[test]
fn deleted_executable_is_the_only_rebuild() {
  let env = TestEnv::new(3);
  env.stepmake().assert().success();

  std::fs::remove_file(env.exe(1)).unwrap();
  env.stepmake().assert().success();

  let log = env.compile_log();
  assert_eq!(log.len(), 4);
  assert_eq!(log[3], "step1_read.c");
}

#[test]
fn touched_support_file_rebuilds_everything() {
  let env = TestEnv::new(2);
  env.stepmake().assert().success();
  env.age("step0_repl", 600);
  env.age("step1_read", 600);

  env.write_file("util.c", "/* util v2 */\n");
  env.stepmake().assert().success();

  assert_eq!(env.compile_log().len(), 4);
  assert!(env.read("step0_repl").ends_with("/* util v2 */\n"));
}

#[test]
fn single_step_targets() {
  let env = TestEnv::new(3);

  env.stepmake().arg("s1").assert().success();
  env.stepmake().arg("step2_eval").assert().success();

  assert_eq!(env.compile_log(), vec!["step1_read.c", "step2_eval.c"]);
  assert!(!env.exe(0).exists());
}

#[test]
fn failing_compiler_fails_every_step_with_its_exit_code() {
  let env = TestEnv::new(2);
  env.write_file("step0_repl", "old build");
  env.age("step0_repl", 7200);
  env.break_compiler(3);

  env
    .stepmake()
    .assert()
    .code(3)
    .stderr(predicate::str::contains("step 0"))
    .stderr(predicate::str::contains("step 1"))
    .stderr(predicate::str::contains("refusing to compile"));

  assert_eq!(env.read("step0_repl"), "old build");
  assert!(!env.exe(1).exists());
}

#[test]
fn unknown_step_is_rejected_before_building() {
  let env = TestEnv::new(2);

  env
    .stepmake()
    .args(["s0", "s9"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no step 9"));

  assert!(env.compile_log().is_empty());
}

#[test]
fn unknown_target_is_rejected() {
  let env = TestEnv::new(1);

  env
    .stepmake()
    .arg("install")
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown target `install`"));
}

#[test]
fn duplicate_step_index_is_a_configuration_error() {
  let env = TestEnv::new(2);
  env.write_file("step01_again.c", "dup\n");

  env
    .stepmake()
    .assert()
    .failure()
    .stderr(predicate::str::contains("defined twice"));

  assert!(env.compile_log().is_empty());
}

#[test]
fn misnamed_step_file_is_a_configuration_error() {
  let env = TestEnv::new(1);
  env.write_file("stepAB_mal.c", "?\n");

  env
    .stepmake()
    .assert()
    .failure()
    .stderr(predicate::str::contains("stepAB_mal.c"));
}

#[test]
fn letter_step_builds_after_numbered_steps() {
  let env = TestEnv::new(1);
  env.write_file("stepA_mal.c", "/* step A */\n");
  env.settle();

  env
    .stepmake()
    .assert()
    .success()
    .stdout(predicate::str::contains("Built step A"));

  assert_eq!(env.read("stepA_mal"), "/* step A */\n/* util */\n");
  assert!(env.exe(0).exists());

  std::fs::remove_file(env.path("stepA_mal")).unwrap();
  env.stepmake().arg("sA").assert().success();
  let mut log = env.compile_log();
  log.sort();
  assert_eq!(log, vec!["step0_repl.c", "stepA_mal.c", "stepA_mal.c"]);
}

#[test]
fn failure_without_a_step_names_its_task() {
  let env = TestEnv::new(1);
  // A non-empty directory where the executable goes makes the final rename fail.
  std::fs::create_dir(env.path("step0_repl")).unwrap();
  env.write_file("step0_repl/keep", "");
  std::fs::File::open(env.path("step0_repl"))
    .unwrap()
    .set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(7200))
    .unwrap();

  env
    .stepmake()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("compile:0: io error"));
}

#[test]
fn missing_support_file_fails_fast() {
  let env = TestEnv::new(1);
  std::fs::remove_file(env.path("util.c")).unwrap();

  env
    .stepmake()
    .assert()
    .failure()
    .stderr(predicate::str::contains("support file not found"));
}

#[test]
fn json_output_reports_compiled_steps() {
  let env = TestEnv::new(2);

  let output = env.stepmake().args(["-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["exit_code"], 0);
  assert_eq!(json["compiled"].as_object().unwrap().len(), 2);
  assert!(json["failed"].as_array().unwrap().is_empty());
}

#[test]
fn directory_option_selects_the_project() {
  let env = TestEnv::new(1);

  let mut cmd = env.stepmake();
  cmd.current_dir(std::env::temp_dir());
  cmd.arg("-C").arg(env.root()).assert().success();

  assert!(env.exe(0).exists());
}

#[test]
fn jobs_option_limits_parallelism_without_changing_results() {
  let env = TestEnv::new(3);

  env.stepmake().args(["-j", "1"]).assert().success();

  assert_eq!(env.compile_log().len(), 3);
}
