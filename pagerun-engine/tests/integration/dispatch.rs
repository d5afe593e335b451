// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::untagged_registry;
use color_eyre::eyre::{Result, bail};
use pagerun_engine::{
    errors::ErrorKind,
    operation::{CacheDirective, Operation, Reply},
};
use pretty_assertions::assert_eq;
use quick_trx::{RunOutcome, TestRun};

fn parse(json: &str) -> Operation {
    serde_json::from_str(json).expect("valid operation")
}

#[test]
fn scripted_run() -> Result<()> {
    let registry = untagged_registry();

    let response = registry.dispatch(Operation::CreateRun)?;
    assert_eq!(response.cache, CacheDirective::NoStore);
    let Reply::RunId(run_id) = &response.reply else {
        bail!("unexpected reply: {:?}", response.reply);
    };
    let run_id = *run_id;

    let script = [
        format!(r#"{{"op": "set-pages", "runId": "{run_id}", "pages": " a.html , ,b.html"}}"#),
        format!(r#"{{"op": "set-name-prefix", "runId": "{run_id}", "prefix": "suite/"}}"#),
        format!(
            r#"{{"op": "log-test-start", "runId": "{run_id}", "name": "t1",
                "startTime": "2024-01-01T00:00:00Z"}}"#
        ),
        format!(
            r#"{{"op": "log-assert", "runId": "{run_id}", "name": "t1", "pass": true,
                "message": "fine"}}"#
        ),
        format!(
            r#"{{"op": "log-test-done", "runId": "{run_id}", "name": "t1", "failures": 0,
                "total": 1, "endTime": "2024-01-01T00:00:01.250Z"}}"#
        ),
    ];
    let replies = script
        .iter()
        .map(|json| registry.dispatch(parse(json)).map(|response| response.reply))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(
        replies,
        vec![
            Reply::PageCount(2),
            Reply::Done,
            Reply::Done,
            Reply::Done,
            Reply::Done,
        ]
    );

    let advance =
        format!(r#"{{"op": "advance-page", "runId": "{run_id}", "failures": 0, "total": 1}}"#);
    let pages: Vec<_> = (0..3)
        .map(|_| registry.dispatch(parse(&advance)).map(|response| response.reply))
        .collect::<Result<_, _>>()?;
    assert_eq!(
        pages,
        vec![
            Reply::NextPage("a.html".to_owned()),
            Reply::NextPage("b.html".to_owned()),
            Reply::NextPage(String::new()),
        ]
    );

    let response = registry.dispatch(parse(&format!(
        r#"{{"op": "is-in-progress", "runId": "{run_id}"}}"#
    )))?;
    assert_eq!(response.reply, Reply::InProgress(false));
    assert_eq!(response.cache, CacheDirective::Default);

    let response = registry.dispatch(parse(&format!(
        r#"{{"op": "get-report", "runId": "{run_id}"}}"#
    )))?;
    assert_eq!(response.cache, CacheDirective::NoStore);
    let Reply::Report(xml) = &response.reply else {
        bail!("unexpected reply: {:?}", response.reply);
    };
    let run = TestRun::deserialize_from_str(xml)?;
    assert_eq!(run.results[0].test_name, "suite/t1");
    assert_eq!(run.result_summary.outcome, RunOutcome::Passed);

    let response = registry.dispatch(Operation::ListActive)?;
    assert_eq!(response.reply, Reply::RunIds(vec![run_id]));
    assert_eq!(response.cache, CacheDirective::Default);
    Ok(())
}

#[test]
fn invalid_run_ids_are_rejected() {
    let registry = untagged_registry();
    for run_id in ["", "  ", "not-a-run"] {
        let error = registry
            .dispatch(Operation::MarkInProgress {
                run_id: run_id.to_owned(),
            })
            .expect_err("run id is invalid");
        assert_eq!(error.kind(), ErrorKind::InvalidArgument, "for {run_id:?}");
    }
}

#[test]
fn assert_before_start_is_not_found() -> Result<()> {
    let registry = untagged_registry();
    let run_id = "00000000-0000-0000-0000-000000000000";
    let error = registry
        .dispatch(parse(&format!(
            r#"{{"op": "log-test-done", "runId": "{run_id}", "name": "early",
                "failures": 0, "total": 0, "endTime": "2024-01-01T00:00:00Z"}}"#
        )))
        .expect_err("test was never started");
    assert_eq!(error.kind(), ErrorKind::NotFound);

    // The nil run was still created by the reference.
    let response = registry.dispatch(Operation::ListActive)?;
    assert_eq!(response.reply, Reply::RunIds(vec![run_id.parse()?]));
    Ok(())
}
