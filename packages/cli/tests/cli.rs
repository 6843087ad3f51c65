//! Argument-parsing and early-exit-code coverage that doesn't need a live
//! MySQL server — everything here fails before `connect_gateways` is ever
//! called.

use assert_cmd::Command;

#[test]
fn missing_required_args_exits_with_clap_usage_error() {
    Command::cargo_bin("schema-sync")
        .unwrap()
        .assert()
        .failure()
        .code(2);
}

#[test]
fn unknown_case_policy_exits_one() {
    Command::cargo_bin("schema-sync")
        .unwrap()
        .args([
            "--data-model",
            "does-not-matter.json",
            "--db-config",
            "does-not-matter.json",
            "--case",
            "kebab",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn missing_data_model_file_exits_one() {
    let dir = std::env::temp_dir().join("schema-sync-cli-test-missing-model");
    std::fs::create_dir_all(&dir).unwrap();
    let db_config = dir.join("db-config.json");
    std::fs::write(
        &db_config,
        r#"{"host":"localhost","user":"root","password":"","database":"app","port":3306,"ssl":null,"moduleSchemaMapping":[]}"#,
    )
    .unwrap();

    Command::cargo_bin("schema-sync")
        .unwrap()
        .args([
            "--data-model",
            dir.join("does-not-exist.json").to_str().unwrap(),
            "--db-config",
            db_config.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(1);
}
