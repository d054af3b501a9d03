use console::style;
use folio_core::storage::{self, ErrorKind};
use serde::Serialize;

/// JSON shape of every result printed with `--json`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope<'a, T: Serialize> {
    Success {
        success: bool,
        data: &'a T,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<&'a str>,
    },
    Failure {
        success: bool,
        error: String,
        kind: ErrorKind,
    },
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn success(data: &'a T, message: Option<&'a str>) -> Self {
        Envelope::Success { success: true, data, message }
    }
}

impl Envelope<'static, ()> {
    pub fn failure(err: &anyhow::Error) -> Self {
        Envelope::Failure { success: false, error: format!("{:#}", err), kind: error_kind(err) }
    }
}

/// Finds the store error kind anywhere in the error chain.
pub fn error_kind(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<storage::Error>() {
            return e.kind();
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return ErrorKind::Io;
        }
    }
    ErrorKind::InvalidArgument
}

/// Where and how command results are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool) -> Self {
        Output { json, quiet }
    }

    /// Prints a successful result: the envelope in JSON mode, otherwise the message (unless
    /// quiet) followed by the human rendering of `data`.
    pub fn emit<T: Serialize>(
        &self,
        data: &T,
        message: Option<&str>,
        render: impl FnOnce(&T) -> String,
    ) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&Envelope::success(data, message))?);
            return Ok(());
        }
        if let Some(message) = message {
            if !self.quiet {
                println!("{} {}", style("✔").green(), message);
            }
        }
        let body = render(data);
        if !body.is_empty() {
            println!("{}", body);
        }
        Ok(())
    }

    /// Prints a failed result. JSON failures go to stdout like any other envelope.
    pub fn failure(&self, err: &anyhow::Error) {
        if self.json {
            match serde_json::to_string_pretty(&Envelope::failure(err)) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize error: {}", e),
            }
        } else {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
        }
    }
}

/// Wraps `text` to the terminal width with a fixed indent.
pub fn wrap_indented(text: &str, indent: &str) -> String {
    let width = console::Term::stdout().size_checked().map_or(80, |(_, cols)| cols as usize).min(100);
    let options = textwrap::Options::new(width).initial_indent(indent).subsequent_indent(indent);
    textwrap::fill(text, options)
}
