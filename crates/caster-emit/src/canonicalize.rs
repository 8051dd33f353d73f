//! Output canonicalization hook
//!
//! A canonicalizer rewrites rendered source into its canonical layout (for
//! Go, what `gofmt` produces). Failures are not fatal: the emitter keeps
//! the raw text and reports the failure.

use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Rewrites rendered file text
pub trait Canonicalizer: Send + Sync {
    /// Canonical text of `source`, or the tool's complaint
    ///
    /// # Errors
    ///
    /// Returns the canonicalizer's message when the text is rejected.
    fn canonicalize(&self, path: &Path, source: &str) -> std::result::Result<String, String>;
}

/// Leaves text untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Canonicalizer for PassThrough {
    fn canonicalize(&self, _path: &Path, source: &str) -> std::result::Result<String, String> {
        Ok(source.to_string())
    }
}

impl<F> Canonicalizer for F
where
    F: Fn(&Path, &str) -> std::result::Result<String, String> + Send + Sync,
{
    fn canonicalize(&self, path: &Path, source: &str) -> std::result::Result<String, String> {
        self(path, source)
    }
}

/// Pipes text through an external formatter such as `gofmt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCanonicalizer {
    program: String,
    args: Vec<String>,
}

impl CommandCanonicalizer {
    /// Formatter invoked as `program args...`, reading stdin
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `gofmt` from `PATH`
    #[must_use]
    pub fn gofmt() -> Self {
        Self::new("gofmt", Vec::<String>::new())
    }

    /// Run the formatter over `source`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the program cannot be run and
    /// [`Error::Canonicalize`] when it rejects the input.
    pub fn run(&self, path: &Path, source: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(Error::canonicalize(
                path,
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        String::from_utf8(output.stdout)
            .map_err(|err| Error::canonicalize(path, err.to_string()))
    }
}

impl Canonicalizer for CommandCanonicalizer {
    fn canonicalize(&self, path: &Path, source: &str) -> std::result::Result<String, String> {
        self.run(path, source).map_err(|err| err.to_string())
    }
}
