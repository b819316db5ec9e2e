use clap::{Parser, Subcommand, ValueEnum};

/// Sitemap cache and generation service for the CMS.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve sitemaps over HTTP and refresh them on a schedule (default)
    Serve,
    /// Run only the periodic refresh loop, sharing artifacts through Redis
    Refresh,
    /// Regenerate every sitemap once, print the summary, and exit
    Generate,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable, colored output
    Pretty,
    /// One JSON object per line
    Json,
}

const fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}
