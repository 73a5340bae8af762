//! Output format flag

/// How command results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Colored text and tables
    #[default]
    Pretty,
    /// `{data, meta}` envelope
    Json,
}
