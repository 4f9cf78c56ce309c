//! Input handling: root URL and output folder from args, prompt, or stdin.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use autoindex_mirror::config::DEFAULT_OUTPUT_DIR;

/// What to mirror and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunTarget {
    pub(crate) root_url: String,
    pub(crate) output_dir: PathBuf,
}

/// Resolves the run target.
///
/// A positional URL wins. Otherwise an interactive terminal is prompted for
/// the URL (and the folder, unless one was configured), and piped stdin is
/// read for its first non-blank line. Returns `None` when no URL was given.
pub(crate) fn resolve_target(
    url_arg: Option<&str>,
    output_dir: Option<PathBuf>,
) -> Result<Option<RunTarget>> {
    if let Some(url) = url_arg {
        return Ok(Some(RunTarget {
            root_url: url.trim().to_string(),
            output_dir: output_dir.unwrap_or_else(default_output_dir),
        }));
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        prompt_target(&mut stdin.lock(), &mut io::stderr(), output_dir)
    } else {
        read_piped_target(&mut stdin.lock(), output_dir)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn prompt_target(
    input: &mut impl BufRead,
    output: &mut impl Write,
    output_dir: Option<PathBuf>,
) -> Result<Option<RunTarget>> {
    let url = prompt_line(input, output, "Listing URL: ")?;
    if url.is_empty() {
        return Ok(None);
    }

    let output_dir = match output_dir {
        Some(dir) => dir,
        None => {
            let answer = prompt_line(input, output, &format!("Local folder [{DEFAULT_OUTPUT_DIR}]: "))?;
            if answer.is_empty() {
                default_output_dir()
            } else {
                PathBuf::from(answer)
            }
        }
    };
    Ok(Some(RunTarget {
        root_url: url,
        output_dir,
    }))
}

fn prompt_line(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> Result<String> {
    write!(output, "{prompt}").context("Failed to write prompt")?;
    output.flush().context("Failed to flush prompt")?;
    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read answer")?;
    Ok(line.trim().to_string())
}

fn read_piped_target(
    input: &mut impl BufRead,
    output_dir: Option<PathBuf>,
) -> Result<Option<RunTarget>> {
    for line in input.lines() {
        let line = line.context("Failed to read URL from stdin")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        return Ok(Some(RunTarget {
            root_url: line.to_string(),
            output_dir: output_dir.unwrap_or_else(default_output_dir),
        }));
    }
    Ok(None)
}
