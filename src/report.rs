//! Age distribution report.

use crate::IngestResult;
use csv_async::{AsyncWriterBuilder, QuoteStyle};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::io::AsyncWrite;

/// Fixed, non-overlapping age ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBand {
    /// age < 20
    Under20,
    /// 20 <= age <= 40
    From20To40,
    /// 40 < age <= 60
    From40To60,
    /// age > 60
    Over60,
}

impl AgeBand {
    pub const ALL: [AgeBand; 4] = [
        AgeBand::Under20,
        AgeBand::From20To40,
        AgeBand::From40To60,
        AgeBand::Over60,
    ];

    pub fn of(age: i64) -> Self {
        match age {
            i64::MIN..=19 => AgeBand::Under20,
            20..=40 => AgeBand::From20To40,
            41..=60 => AgeBand::From40To60,
            _ => AgeBand::Over60,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Key used in JSON responses.
    pub fn key(self) -> &'static str {
        match self {
            AgeBand::Under20 => "<20",
            AgeBand::From20To40 => "20-40",
            AgeBand::From40To60 => "40-60",
            AgeBand::Over60 => ">60",
        }
    }

    /// Label used in the printed report.
    pub fn label(self) -> &'static str {
        match self {
            AgeBand::Under20 => "< 20",
            AgeBand::From20To40 => "20 to 40",
            AgeBand::From40To60 => "40 to 60",
            AgeBand::Over60 => "> 60",
        }
    }
}

/// Share of records per band, in percent with two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AgeDistribution {
    pub total: u64,
    percentages: [f64; 4],
}

impl AgeDistribution {
    /// From per-band counts indexed by [`AgeBand::index`].
    /// With no records every band is `0`.
    pub fn from_counts(counts: [u64; 4]) -> Self {
        let total: u64 = counts.iter().sum();
        let mut percentages = [0.0; 4];
        if total > 0 {
            for (pct, count) in percentages.iter_mut().zip(counts) {
                *pct = round2(count as f64 / total as f64 * 100.0);
            }
        }
        Self { total, percentages }
    }

    pub fn percentage(&self, band: AgeBand) -> f64 {
        self.percentages[band.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgeBand, f64)> + '_ {
        AgeBand::ALL.into_iter().map(|band| (band, self.percentage(band)))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Serialize for AgeDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(AgeBand::ALL.len()))?;
        for (band, pct) in self.iter() {
            map.serialize_entry(band.key(), &pct)?;
        }
        map.end()
    }
}

/// Write the report as a two-column, fully quoted CSV table.
pub async fn write_report<W>(distribution: &AgeDistribution, writer: W) -> IngestResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut wtr = AsyncWriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .create_writer(writer);
    wtr.write_record(["Age-Group", "% Distribution"]).await?;
    for (band, pct) in distribution.iter() {
        let value = format!("{pct:.2}");
        wtr.write_record([band.label(), value.as_str()]).await?;
    }
    wtr.flush().await?;
    Ok(())
}
