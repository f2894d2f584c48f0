//! Tests for `error` module

use super::engine::EngineError;
use super::error::Error;
use std::path::PathBuf;

#[test]
fn test_codes_are_in_messages() {
    let errors = [
        Error::InvalidArgument("x".into()),
        Error::DimensionMismatch {
            expected: 3,
            actual: 2,
        },
        Error::DuplicateLabel(7),
        Error::PermissionDenied("x".into()),
        Error::AlreadyExists(PathBuf::from("/a")),
        Error::NotFound(PathBuf::from("/b")),
        Error::CapacityExceeded {
            requested: 9,
            reason: "x".into(),
        },
        Error::Engine(EngineError::LabelNotFound(1)),
        Error::Closed,
        Error::Config("x".into()),
        Error::Io(std::io::Error::other("x")),
        Error::Serialization("x".into()),
    ];
    for (i, err) in errors.iter().enumerate() {
        let code = format!("VECDEX-{:03}", i + 1);
        assert_eq!(err.code(), code);
        assert!(err.to_string().starts_with(&format!("[{code}]")), "{err}");
    }
}

#[test]
fn test_invalid_argument_classification() {
    assert!(Error::InvalidArgument("x".into()).is_invalid_argument());
    assert!(Error::DuplicateLabel(1).is_invalid_argument());
    assert!(Error::DimensionMismatch {
        expected: 1,
        actual: 2
    }
    .is_invalid_argument());
    assert!(!Error::Closed.is_invalid_argument());
    assert!(!Error::Engine(EngineError::DuplicateLabel(1)).is_invalid_argument());
}

#[test]
fn test_recoverability() {
    assert!(!Error::Closed.is_recoverable());
    assert!(!Error::Engine(EngineError::Corrupted("bad".into())).is_recoverable());
    assert!(Error::Engine(EngineError::LabelNotFound(3)).is_recoverable());
    assert!(Error::DuplicateLabel(3).is_recoverable());
}

#[test]
fn test_engine_error_passes_through_verbatim() {
    let err: Error = EngineError::AlreadyDeleted(42).into();
    assert!(matches!(err, Error::Engine(EngineError::AlreadyDeleted(42))));
    assert!(err.to_string().contains("label 42 is already deleted"));
}

#[test]
fn test_json_error_converts() {
    let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Serialization(_)));
}
