//! Text report of a finished session.
//!
//! ```text
//! Total Samples: 65
//! Minimum Samples to Display: 5
//! Minimum Percent Usage to Display: 1
//!
//! Alpha: 92% samples: 60
//!
//! Beta: 7% samples: 5
//!
//! ```

use crate::aggregate::Profile;
use crate::error::Result;
use crate::symbols::{SourceLine, Symbolizer};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One function that passed both thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub name: String,
    pub address: u64,
    pub samples: u64,
    /// Share of all resolved samples, rounded down
    pub percent: u64,
    /// Source location of the function entry, when line numbers are on
    pub location: Option<SourceLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub total_samples: u64,
    pub min_samples: u64,
    pub min_percent: u64,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    /// Apply the display thresholds to a profile.
    ///
    /// Line lookups only happen when `line_numbers` is set, and only for
    /// functions that made it into the report.
    pub fn build(
        profile: &Profile,
        min_samples: u64,
        min_percent: u64,
        line_numbers: bool,
        symbolizer: &dyn Symbolizer,
    ) -> Self {
        let total = profile.total_samples;

        let entries = profile
            .functions
            .iter()
            .filter_map(|function| {
                let percent = percent_of(function.samples, total)?;
                if function.samples < min_samples || percent < min_percent {
                    return None;
                }

                let location = if line_numbers {
                    symbolizer.resolve_line(function.address)
                } else {
                    None
                };

                Some(ReportEntry {
                    name: function.name.clone(),
                    address: function.address,
                    samples: function.samples,
                    percent,
                    location,
                })
            })
            .collect();

        Report {
            total_samples: total,
            min_samples,
            min_percent,
            entries,
        }
    }

    /// Write the report to `w`
    pub fn render<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write!(w, "{}", self)
    }

    /// Create (or truncate) `path` and write the report into it
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.render(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Samples: {}", self.total_samples)?;
        writeln!(f, "Minimum Samples to Display: {}", self.min_samples)?;
        writeln!(f, "Minimum Percent Usage to Display: {}", self.min_percent)?;
        writeln!(f)?;

        for entry in &self.entries {
            writeln!(
                f,
                "{}: {} samples: {}",
                entry.name,
                format_percent(entry.percent),
                entry.samples
            )?;
            if let Some(location) = &entry.location {
                writeln!(f, "In file: {}", location)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// `count * 100 / total` rounded down; `None` for an empty profile
fn percent_of(count: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    Some((u128::from(count) * 100 / u128::from(total)) as u64)
}

fn format_percent(percent: u64) -> String {
    if percent == 0 {
        "<1%".to_string()
    } else {
        format!("{}%", percent)
    }
}
