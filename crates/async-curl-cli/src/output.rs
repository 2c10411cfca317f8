use std::io::{self, Write};

use clap::ValueEnum;

/// How each chunk of response bodies is written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One body after another, each followed by a newline
    Text,
    /// One JSON array of bodies per line, one line per chunk
    Json,
}

pub fn write_chunk<W: Write>(out: &mut W, format: OutputFormat, bodies: &[String]) -> io::Result<()> {
    match format {
        OutputFormat::Text => {
            for body in bodies {
                writeln!(out, "{body}")?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, bodies)?;
            writeln!(out)?;
        }
    }
    out.flush()
}
