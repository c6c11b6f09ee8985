use std::borrow::Cow;
use std::fmt::Write;

use serde_json::Value;
use shell_escape::unix;
use tinytemplate::error::Error as TemplateError;

/// Quote a string so a POSIX shell reads it back as exactly one word
///
/// Plain words (`[A-Za-z0-9_=/,.+-]`) are returned unchanged, everything else is single quoted.
/// Strings holding control characters are written as an ANSI-C `$'...'` word instead, so a
/// newline in a job name can never end a `#SBATCH` line early and start a command.
///
/// NUL can't be carried by a shell word at all, so job requests and resource requests refuse it
/// before anything reaches this function. A stray one is written as `\x00`.
pub fn quote(value: &str) -> String {
    if value.chars().any(|c| c.is_ascii_control()) {
        ansi_c_quote(value)
    } else {
        unix::escape(Cow::Borrowed(value)).into_owned()
    }
}

fn ansi_c_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 3);
    quoted.push_str("$'");
    for c in value.chars() {
        match c {
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            c if c.is_ascii_control() => {
                // writing to a String can't fail
                let _ = write!(quoted, "\\x{:02x}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// TinyTemplate default formatter: every interpolated value is shell quoted
pub(crate) fn shell_formatter(value: &Value, output: &mut String) -> Result<(), TemplateError> {
    let mut raw = String::new();
    tinytemplate::format_unescaped(value, &mut raw)?;
    output.push_str(&quote(&raw));
    Ok(())
}

/// Opt-out formatter for trusted text (the rendered job command)
pub(crate) fn verbatim_formatter(value: &Value, output: &mut String) -> Result<(), TemplateError> {
    tinytemplate::format_unescaped(value, output)
}
