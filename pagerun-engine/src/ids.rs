// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed identifiers for runs.

use crate::errors::EngineError;
use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};

/// The kind marker for run identifiers.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunKind {}

impl TypedUuidKind for RunKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("run");
        TAG
    }
}

/// The identifier of a test run.
pub type RunUuid = TypedUuid<RunKind>;

/// The reserved all-zero run identifier.
///
/// Referencing it creates the run on demand, so pages can report results without a harness
/// having called `create-run` first.
pub const NIL_RUN_ID: RunUuid = RunUuid::from_u128(0);

/// Parses a run identifier received from a transport.
///
/// Empty input is treated as a null identifier.
pub fn parse_run_id(input: &str) -> Result<RunUuid, EngineError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EngineError::MissingRunId);
    }
    trimmed
        .parse::<RunUuid>()
        .map_err(|error| EngineError::InvalidRunId {
            input: input.to_owned(),
            error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use test_case::test_case;

    #[test]
    fn parses_nil() {
        assert_eq!(
            parse_run_id("00000000-0000-0000-0000-000000000000").unwrap(),
            NIL_RUN_ID
        );
    }

    #[test]
    fn parses_and_trims() {
        let run_id = RunUuid::new_v4();
        assert_eq!(parse_run_id(&format!("  {run_id}\n")).unwrap(), run_id);
    }

    #[test_case(""; "empty")]
    #[test_case("   "; "whitespace")]
    #[test_case("not-a-uuid"; "garbage")]
    #[test_case("00000000-0000-0000-0000"; "truncated")]
    fn rejects_invalid(input: &str) {
        let error = parse_run_id(input).expect_err("input is invalid");
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
    }
}
