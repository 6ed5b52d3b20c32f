use std::path::PathBuf;

use agency_store::error::{exit_codes, EntityKind, Error};
use agency_store::ledger::{SessionTarget, TimeTrackingLedger};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::not_found(EntityKind::Project, "p1");
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let lock = Error::LockFailed(PathBuf::from("data/store.lock"));
    assert_eq!(lock.exit_code(), exit_codes::STORAGE_UNAVAILABLE);
    assert!(lock.is_storage_unavailable());

    let corrupt = Error::CorruptRecord {
        collection: "time_tracking",
        reason: "bad start".to_string(),
    };
    assert_eq!(corrupt.exit_code(), exit_codes::STORAGE_UNAVAILABLE);
}

#[test]
fn conflict_reports_the_running_session() {
    let mut ledger = TimeTrackingLedger::default();
    ledger
        .start("dana", SessionTarget::default())
        .expect("first start");
    let err = ledger
        .start("dana", SessionTarget::default())
        .expect_err("second start");

    assert_eq!(err.exit_code(), exit_codes::CONFLICT);
    assert!(err.to_string().contains("dana already has an active session"));
    let details = err.details().expect("details");
    assert_eq!(details["user_id"], "dana");
}

#[test]
fn not_found_details_name_the_entity() {
    let err = Error::not_found(EntityKind::Client, "c9");
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    assert!(err.to_string().contains("c9"));

    let details = err.details().expect("details");
    assert_eq!(details["kind"], "client");
    assert_eq!(details["id"], "c9");
}
