use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn help_works() {
    Command::cargo_bin("agency-store")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("entity store"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init",
        "client",
        "project",
        "task",
        "charge",
        "timer",
        "equipment",
        "collection",
        "migrate",
    ];

    for cmd in subcommands {
        Command::cargo_bin("agency-store")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn unknown_collection_is_rejected() {
    Command::cargo_bin("agency-store")
        .expect("binary")
        .args(["collection", "invoices"])
        .assert()
        .failure();
}
