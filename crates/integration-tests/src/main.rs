//! Integration tests for vutils
//!
//! Runs the `vutils` binary against a live libvirt named by
//! `VUTILS_INTEGRATION_CONNECT`; without it every test is reported as ignored.

use std::process::Output;

use camino::Utf8Path;
use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use libtest_mimic::{Arguments, Trial};
use serde_json::Value;
use tempfile::NamedTempFile;
use xshell::{cmd, Shell};

pub(crate) use integration_tests::{integration_test, CONNECT_ENV, INTEGRATION_TESTS};
use linkme::distributed_slice;

mod tests {
    pub mod call;
    pub mod domain;
    pub mod storage;
}

/// Get the path to the vutils binary, checking VUTILS_PATH env var first, then falling back to "vutils"
pub(crate) fn get_vutils_command() -> Result<String> {
    if let Ok(path) = std::env::var("VUTILS_PATH") {
        return Ok(path);
    }
    // Force the user to set this if we're running from the project dir
    if let Some(path) = ["target/debug/vutils", "target/release/vutils"]
        .into_iter()
        .find(|p| Utf8Path::new(p).exists())
    {
        return Err(eyre!(
            "Detected {path} - set VUTILS_PATH={path} to run using this binary"
        ));
    }
    Ok("vutils".to_owned())
}

fn connect_uri() -> Option<String> {
    std::env::var(CONNECT_ENV).ok().filter(|uri| !uri.is_empty())
}

/// Captured output from a command with decoded stdout/stderr strings
pub(crate) struct CapturedOutput {
    pub output: Output,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Create from a raw Output
    pub fn new(output: Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        Self {
            output,
            stdout,
            stderr,
        }
    }

    /// Get the exit code
    pub fn exit_code(&self) -> Option<i32> {
        self.output.status.code()
    }

    /// Assert the exit code, printing stderr on mismatch
    pub fn assert_exit(&self, code: i32, context: &str) {
        assert_eq!(
            self.exit_code(),
            Some(code),
            "{} exited unexpectedly: {}",
            context,
            self.stderr
        );
    }

    /// Parse stdout as a result envelope
    pub fn envelope(&self) -> Result<Value> {
        serde_json::from_str(&self.stdout)
            .with_context(|| format!("Parsing envelope from: {}", self.stdout))
    }
}

/// Run vutils against the test connection, capturing output
pub(crate) fn run_vutils(args: &[&str]) -> Result<CapturedOutput> {
    let sh = Shell::new()?;
    let bin = get_vutils_command()?;
    let uri = connect_uri().ok_or_else(|| eyre!("{} is not set", CONNECT_ENV))?;
    let output = cmd!(sh, "{bin} --connect {uri} {args...}")
        .ignore_status()
        .output()?;
    Ok(CapturedOutput::new(output))
}

/// Run vutils expecting a successful envelope, returning it
pub(crate) fn run_vutils_ok(args: &[&str]) -> Result<Value> {
    let output = run_vutils(args)?;
    output.assert_exit(0, &args.join(" "));
    let envelope = output.envelope()?;
    assert_eq!(envelope["success"], Value::Bool(true), "{}", output.stdout);
    Ok(envelope)
}

/// Write a descriptor to a temporary file for `--xmlconfig`
pub(crate) fn write_descriptor(xml: &str) -> Result<NamedTempFile> {
    let file = NamedTempFile::new()?;
    std::fs::write(file.path(), xml).context("Writing descriptor")?;
    Ok(file)
}

/// Temporary file path as a CLI argument
pub(crate) fn path_arg(file: &NamedTempFile) -> Result<&str> {
    file.path()
        .to_str()
        .ok_or_else(|| eyre!("Non-UTF-8 temporary path"))
}

#[distributed_slice(INTEGRATION_TESTS)]
static TEST_VERSION: integration_tests::IntegrationTest =
    integration_tests::IntegrationTest::new("version", test_version);

fn test_version() -> Result<()> {
    let sh = Shell::new()?;
    let bin = get_vutils_command()?;
    let output = cmd!(sh, "{bin} --version").read()?;
    assert!(output.starts_with("vutils "), "unexpected: {}", output);
    Ok(())
}

fn main() {
    let args = Arguments::from_args();
    let skip = connect_uri().is_none();
    if skip {
        eprintln!("{} is not set; marking all tests ignored", CONNECT_ENV);
    }

    // Collect tests from the distributed slice
    let tests: Vec<Trial> = INTEGRATION_TESTS
        .iter()
        .map(|test| {
            let name = test.name;
            let f = test.f;
            Trial::test(name, move || f().map_err(|e| format!("{:?}", e).into()))
                .with_ignored_flag(skip)
        })
        .collect();

    // Run the tests and exit with the result
    libtest_mimic::run(&args, tests).exit();
}
