use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

use crate::source::SourceRecord;

/// Random extra delay added to sleeps so concurrent workers don't wake in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterRange {
    pub min: Duration,
    pub max: Duration,
}

impl JitterRange {
    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub const fn none() -> Self {
        Self::from_millis(0, 0)
    }

    pub fn sample(&self) -> Duration {
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        let low = low.as_millis() as u64;
        let high = high.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(low..=high))
    }
}

/// Terminal state of one source record. Found exactly when `track_id` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub record: SourceRecord,
    pub track_id: Option<String>,
}

impl ResolutionOutcome {
    pub fn found(record: SourceRecord, track_id: String) -> Self {
        Self {
            record,
            track_id: Some(track_id),
        }
    }

    pub fn not_found(record: SourceRecord) -> Self {
        Self {
            record,
            track_id: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.track_id.is_some()
    }
}

/// Outcomes bucketed by the scheduler, both in completion order.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub resolved: Vec<ResolutionOutcome>,
    pub not_found: Vec<ResolutionOutcome>,
}

impl ResolutionReport {
    pub fn push(&mut self, outcome: ResolutionOutcome) {
        if outcome.is_found() {
            self.resolved.push(outcome);
        } else {
            self.not_found.push(outcome);
        }
    }

    pub fn len(&self) -> usize {
        self.resolved.len() + self.not_found.len()
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.resolved
            .iter()
            .filter_map(|outcome| outcome.track_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    /// Zero-based position of the chunk in submission order.
    pub index: usize,
    pub size: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub added: usize,
    pub failed_chunks: Vec<ChunkFailure>,
}

/// What an operator sees at the end of a transfer.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub playlist_name: String,
    pub playlist_id: String,
    pub found: usize,
    pub not_found: Vec<String>,
    pub added: usize,
    pub failed_chunks: Vec<ChunkFailure>,
    pub not_found_file: Option<PathBuf>,
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Playlist '{}' ({}) created with {} tracks.",
            self.playlist_name, self.playlist_id, self.added
        )?;
        writeln!(f, "{} found, {} not found", self.found, self.not_found.len())?;

        if !self.failed_chunks.is_empty() {
            writeln!(f, "{} batch(es) failed to add:", self.failed_chunks.len())?;
            for chunk in &self.failed_chunks {
                writeln!(
                    f,
                    " - batch {} ({} tracks): {}",
                    chunk.index + 1,
                    chunk.size,
                    chunk.reason
                )?;
            }
        }

        if self.not_found.is_empty() {
            if self.failed_chunks.is_empty() {
                writeln!(f, "All songs were successfully added!")?;
            }
            return Ok(());
        }

        writeln!(f, "Some songs were not found:")?;
        for line in &self.not_found {
            writeln!(f, " - {}", line)?;
        }
        if let Some(path) = &self.not_found_file {
            writeln!(f, "Not-found songs saved to '{}'", path.display())?;
        }

        Ok(())
    }
}
