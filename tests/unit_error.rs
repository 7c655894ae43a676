use std::path::PathBuf;

use questlog::error::{exit_codes, Error};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::TaskNotFound("abc".to_string());
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let config = Error::InvalidConfig("bad".to_string());
    assert_eq!(config.exit_code(), exit_codes::USER_ERROR);

    let store = Error::StoreUnavailable("offline".to_string());
    assert_eq!(store.exit_code(), exit_codes::STORE_UNAVAILABLE);

    let lock = Error::LockFailed(PathBuf::from("ledger.json.lock"));
    assert_eq!(lock.exit_code(), exit_codes::STORE_UNAVAILABLE);

    let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
    assert_eq!(io.exit_code(), exit_codes::STORE_UNAVAILABLE);
}
