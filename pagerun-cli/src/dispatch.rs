// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, PagerunExitCode, Result, log_engine_error},
    output::{OutputContext, OutputOpts},
    script::{ScriptStep, parse_script, substitute_last_run},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use pagerun_engine::{
    config::EngineConfig,
    ids::{RunUuid, parse_run_id},
    operation::{OperationName, Reply, Response},
    registry::RunRegistry,
};
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// Coordinate browser-driven test runs and aggregate their results.
///
/// pagerun keeps a registry of test runs in memory. Test pages report their progress against a
/// run, and the accumulated results are rendered as a TRX report.
#[derive(Debug, Parser)]
#[command(version, name = "pagerun")]
pub struct PagerunApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[clap(subcommand)]
    command: Command,
}

impl PagerunApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext, stdout: &mut dyn Write) -> Result<i32> {
        let root = current_dir()?;
        let config = self.config_opts.make_config(&root)?;

        match self.command {
            Command::Replay {
                script,
                keep_going,
                report,
            } => {
                let replay = Replay {
                    registry: RunRegistry::new(config),
                    keep_going,
                    output,
                };
                replay.exec(&script, report.as_deref(), stdout)
            }
            Command::ShowConfig => {
                serde_json::to_writer_pretty(&mut *stdout, &config)
                    .map_err(|err| ExpectedError::SerializeOutputError { err })?;
                writeln!(stdout).map_err(|err| ExpectedError::WriteOutputError { err })?;
                Ok(PagerunExitCode::OK)
            }
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: current-dir/.config/pagerun.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self, root: &Utf8Path) -> Result<EngineConfig> {
        Ok(EngineConfig::from_sources(
            self.config_file.as_deref(),
            root,
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a script of operations against a fresh registry
    ///
    /// The script has one JSON-encoded operation per line, for example
    /// `{"op": "log-test-start", "runId": "@last", "name": "t1", "startTime": "..."}`.
    /// Blank lines and lines starting with `#` are skipped. The run identifier `@last` refers to
    /// the run most recently created by the script.
    ///
    /// Each response is printed to stdout as a JSON line.
    Replay {
        /// Path to the script
        #[arg(value_name = "SCRIPT")]
        script: Utf8PathBuf,

        /// Continue after an operation fails
        #[arg(long)]
        keep_going: bool,

        /// Write the report of the last referenced run to this path
        #[arg(long, value_name = "PATH")]
        report: Option<Utf8PathBuf>,
    },

    /// Show the effective configuration as JSON
    ShowConfig,
}

struct Replay {
    registry: RunRegistry,
    keep_going: bool,
    output: OutputContext,
}

impl Replay {
    fn exec(
        &self,
        script: &Utf8Path,
        report: Option<&Utf8Path>,
        stdout: &mut dyn Write,
    ) -> Result<i32> {
        let contents =
            std::fs::read_to_string(script).map_err(|err| ExpectedError::ScriptReadError {
                path: script.to_owned(),
                err,
            })?;
        let steps = parse_script(script, &contents)?;

        let styles = self.output.stderr_styles();
        let mut last_created: Option<RunUuid> = None;
        let mut last_referenced: Option<RunUuid> = None;
        let mut failed = 0;
        let mut executed = 0;

        for ScriptStep {
            line,
            mut operation,
        } in steps
        {
            if !substitute_last_run(&mut operation, last_created) {
                warn!("line {line}: `@last` used before any run was created");
            }
            if let Some(run_id) = operation.run_id().and_then(|s| parse_run_id(s).ok()) {
                last_referenced = Some(run_id);
            }

            let op = operation.name();
            executed += 1;
            let record = match self.registry.dispatch(operation) {
                Ok(response) => {
                    if let Reply::RunId(run_id) = &response.reply {
                        last_created = Some(*run_id);
                        last_referenced = Some(*run_id);
                    }
                    StepRecord::Ok { line, op, response }
                }
                Err(error) => {
                    log_engine_error(line, &error, &styles);
                    failed += 1;
                    StepRecord::Error {
                        line,
                        op,
                        kind: error.kind().to_string(),
                        message: error.to_string(),
                    }
                }
            };
            write_json_line(stdout, &record)?;

            if failed > 0 && !self.keep_going {
                break;
            }
        }

        if let Some(path) = report {
            self.write_report(path, last_referenced)?;
        }

        if self.output.verbose {
            info!("replayed {executed} operations, {failed} failed");
        }

        if failed > 0 {
            Ok(PagerunExitCode::OPERATION_FAILED)
        } else {
            Ok(PagerunExitCode::OK)
        }
    }

    fn write_report(&self, path: &Utf8Path, run_id: Option<RunUuid>) -> Result<()> {
        let Some(run_id) = run_id else {
            warn!("no run was referenced by the script, not writing a report to {path}");
            return Ok(());
        };

        let xml = self
            .registry
            .get_report(run_id)
            .map_err(|err| ExpectedError::ReportRenderError { err })?;
        std::fs::write(path, xml).map_err(|err| ExpectedError::ReportWriteError {
            path: path.to_owned(),
            err,
        })?;
        info!("wrote report for run {run_id} to {path}");
        Ok(())
    }
}

/// One line of `pagerun replay` output.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum StepRecord {
    Ok {
        line: usize,
        #[serde(serialize_with = "serialize_name")]
        op: OperationName,
        #[serde(flatten)]
        response: Response,
    },
    Error {
        line: usize,
        #[serde(serialize_with = "serialize_name")]
        op: OperationName,
        kind: String,
        message: String,
    },
}

fn serialize_name<S: serde::Serializer>(
    name: &OperationName,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(name.as_str())
}

fn write_json_line(stdout: &mut dyn Write, record: &StepRecord) -> Result<()> {
    let line = serde_json::to_string(record)
        .map_err(|err| ExpectedError::SerializeOutputError { err })?;
    writeln!(stdout, "{line}").map_err(|err| ExpectedError::WriteOutputError { err })
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirError { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirError {
        err: err.into_io_error(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use camino_tempfile_ext::prelude::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use quick_trx::{RunOutcome, TestOutcome, TestRun};

    fn run_app(args: &[&str]) -> (i32, String) {
        let app = PagerunApp::try_parse_from(std::iter::once("pagerun").chain(args.iter().copied()))
            .expect("arguments are valid");
        let output = app.init_output();
        let mut stdout = Vec::new();
        let code = app.exec(output, &mut stdout).expect("exec succeeded");
        (code, String::from_utf8(stdout).expect("stdout is UTF-8"))
    }

    fn parse_lines(stdout: &str) -> Vec<serde_json::Value> {
        stdout
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line is JSON"))
            .collect()
    }

    const SCRIPT: &str = indoc! {r#"
        {"op": "create-run"}
        {"op": "set-pages", "runId": "@last", "pages": "a.html,b.html"}
        {"op": "log-test-start", "runId": "@last", "name": "t1", "startTime": "2024-01-01T00:00:00Z"}
        {"op": "log-assert", "runId": "@last", "name": "t1", "pass": false, "message": "m", "actual": "1", "expected": "2"}
        {"op": "log-test-done", "runId": "@last", "name": "t1", "failures": 1, "total": 1, "endTime": "2024-01-01T00:00:01Z"}
        {"op": "advance-page", "runId": "@last"}
    "#};

    #[test]
    fn replay_writes_responses_and_report() {
        let temp_dir = Utf8TempDir::new().expect("created temp dir");
        let config = temp_dir.child("pagerun.toml");
        config
            .write_str("[pages]\ntag-run-id = false\n")
            .expect("wrote config");
        let script = temp_dir.child("script.jsonl");
        script.write_str(SCRIPT).expect("wrote script");
        let report = temp_dir.path().join("report.trx");

        let (code, stdout) = run_app(&[
            "--color",
            "never",
            "--config-file",
            config.as_str(),
            "replay",
            script.as_str(),
            "--report",
            report.as_str(),
        ]);
        assert_eq!(code, PagerunExitCode::OK);

        let lines = parse_lines(&stdout);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0]["op"], "create-run");
        assert_eq!(lines[0]["cache"], "no-store");
        assert_eq!(lines[1]["reply"]["page-count"], 2);
        assert_eq!(lines[5]["reply"]["next-page"], "a.html");

        let xml = std::fs::read_to_string(&report).expect("report was written");
        let run = TestRun::deserialize_from_str(&xml).expect("report is valid");
        assert_eq!(run.id.to_string(), lines[0]["reply"]["run-id"]);
        assert_eq!(run.results[0].outcome, TestOutcome::Failed);
        assert_eq!(run.result_summary.outcome, RunOutcome::Failed);
    }

    #[test]
    fn replay_stops_at_first_failure() {
        let temp_dir = Utf8TempDir::new().expect("created temp dir");
        let script = temp_dir.child("script.jsonl");
        script
            .write_str(indoc! {r#"
                {"op": "create-run"}
                {"op": "log-test-done", "runId": "@last", "name": "never-started", "failures": 0, "total": 0, "endTime": "2024-01-01T00:00:00Z"}
                {"op": "is-in-progress", "runId": "@last"}
            "#})
            .expect("wrote script");

        let (code, stdout) = run_app(&["--color", "never", "replay", script.as_str()]);
        assert_eq!(code, PagerunExitCode::OPERATION_FAILED);
        let lines = parse_lines(&stdout);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["line"], 2);
        assert_eq!(lines[1]["kind"], "not found");

        let (code, stdout) = run_app(&[
            "--color",
            "never",
            "replay",
            "--keep-going",
            script.as_str(),
        ]);
        assert_eq!(code, PagerunExitCode::OPERATION_FAILED);
        let lines = parse_lines(&stdout);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["reply"]["in-progress"], true);
        assert_eq!(lines[2]["cache"], "default");
    }

    #[test]
    fn show_config_prints_json() {
        let (code, stdout) = run_app(&["--color", "never", "show-config"]);
        assert_eq!(code, PagerunExitCode::OK);
        let config: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
        assert_eq!(config["pages"]["run-id-param"], "runId");
        assert_eq!(config["registry"]["allow-nil-run"], true);
    }
}
