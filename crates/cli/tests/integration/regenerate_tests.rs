use predicates::prelude::*;

use super::common::TestEnv;

const STEP1: &str = "#include <stdio.h>
int main(void) {
  puts(\"repl\");
  puts(\"read\"); // @step 1
  return 0;
}
";

#[test]
fn regenerate_target_filters_template_into_step_source() {
  let env = TestEnv::with_template(3);
  env.age("step1_read.c", 7200);

  env
    .stepmake()
    .arg("ss1")
    .assert()
    .success()
    .stdout(predicate::str::contains("Regenerated step 1"));

  assert_eq!(env.read("step1_read.c"), STEP1);
  assert_eq!(env.read("step0_repl.c"), "/* step 0 */\n");
  assert!(env.compile_log().is_empty());
}

#[test]
fn regenerate_all_rewrites_every_source_without_compiling() {
  let env = TestEnv::with_template(3);
  for n in 0..3 {
    env.age(&env.source_name(n), 7200);
  }

  env.stepmake().arg("regenerate-all").assert().success();

  assert!(!env.read("step0_repl.c").contains("read"));
  assert_eq!(env.read("step1_read.c"), STEP1);
  assert!(env.read("step2_eval.c").contains("eval"));
  assert!(!env.read("step2_eval.c").contains("env"));
  assert!(env.compile_log().is_empty());
}

#[test]
fn newer_template_regenerates_before_compiling() {
  let env = TestEnv::with_template(2);
  env.age("step0_repl.c", 7200);
  env.age("step1_read.c", 7200);

  env.stepmake().arg("all").assert().success();

  assert_eq!(env.read("step1_read.c"), STEP1);
  assert!(env.read("step1_read").starts_with(STEP1));
  assert_eq!(env.compile_log().len(), 2);

  env
    .stepmake()
    .arg("all")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to do"));
}

#[test]
fn fresh_sources_are_not_regenerated() {
  let env = TestEnv::with_template(2);

  env.stepmake().arg("all").assert().success();
  env
    .stepmake()
    .arg("ss1")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to do"));

  assert_eq!(env.read("step1_read.c"), "/* step 1 */\n");
}

#[test]
fn regeneration_without_template_is_rejected() {
  let env = TestEnv::new(1);

  env
    .stepmake()
    .arg("ss0")
    .assert()
    .failure()
    .stderr(predicate::str::contains("no template configured"));
}

#[test]
fn failing_filter_keeps_source_and_skips_compile() {
  let env = TestEnv::with_template(2);
  env.write_script("badfilter", "#!/bin/sh\necho \"filter exploded\" >&2\nexit 5\n");
  env.write_stepfile(&format!(
    "[template]\npath = \"steps.c\"\nfilter = [\"{}\", \"{{step}}\"]\n",
    env.path("badfilter").display()
  ));
  env.age("step0_repl.c", 7200);
  env.age("step1_read.c", 7200);

  env
    .stepmake()
    .arg("s1")
    .assert()
    .code(5)
    .stderr(predicate::str::contains("filter exploded"))
    .stderr(predicate::str::contains("skipped compile:1"));

  assert_eq!(env.read("step1_read.c"), "/* step 1 */\n");
  assert!(!env.exe(1).exists());
  assert!(env.compile_log().is_empty());
}

#[test]
fn custom_marker_is_passed_to_the_built_in_filter() {
  let env = TestEnv::with_template(2);
  env.write_file("steps.c", "common\nonly one #> 1\nlater #> 2\n");
  env.write_stepfile("[template]\npath = \"steps.c\"\nmarker = \"#>\"\n");

  env.stepmake().arg("ss1").assert().success();

  assert_eq!(env.read("step1_read.c"), "common\nonly one #> 1\n");
}

#[test]
fn letter_step_is_regenerated_with_every_tagged_line() {
  let env = TestEnv::with_template(1);
  env.write_file("stepA_mal.c", "/* step A */\n");
  env.write_file("steps.c", "base\nread // @step 1\nmal // @step A\n");
  env.settle();
  env.age("stepA_mal.c", 7200);

  env
    .stepmake()
    .arg("ssA")
    .assert()
    .success()
    .stdout(predicate::str::contains("Regenerated step A"));

  assert_eq!(env.read("stepA_mal.c"), "base\nread // @step 1\nmal // @step A\n");
}
