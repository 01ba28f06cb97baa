//! Chunk planning and session fingerprints

use std::fmt;
use std::ops::{Range, RangeInclusive};

use super::types::ClientError;

/// Highest part count a multipart upload may have
pub const MAX_PARTS: u32 = 10_000;

/// Split of a source of `file_size` bytes into `part_size` chunks.
///
/// Parts are numbered from 1. Every part except the last is exactly
/// `part_size` bytes; the last carries the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    part_size: u64,
    total_parts: u32,
}

impl ChunkPlan {
    pub fn new(file_size: u64, part_size: u64) -> Result<Self, ClientError> {
        if file_size == 0 {
            return Err(ClientError::EmptySource);
        }
        if part_size == 0 {
            return Err(ClientError::InvalidPlan(
                "part size must be positive".to_string(),
            ));
        }
        let total_parts = file_size.div_ceil(part_size);
        if total_parts > MAX_PARTS as u64 {
            return Err(ClientError::InvalidPlan(format!(
                "{} bytes in {} byte parts needs {} parts, more than {}",
                file_size, part_size, total_parts, MAX_PARTS
            )));
        }
        Ok(Self {
            file_size,
            part_size,
            total_parts: total_parts as u32,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    pub fn part_numbers(&self) -> RangeInclusive<u32> {
        1..=self.total_parts
    }

    /// Byte range of a part; empty for numbers outside the plan
    pub fn part_range(&self, part_number: u32) -> Range<u64> {
        if part_number == 0 || part_number > self.total_parts {
            return 0..0;
        }
        let start = (part_number as u64 - 1) * self.part_size;
        let end = (start + self.part_size).min(self.file_size);
        start..end
    }

    pub fn part_len(&self, part_number: u32) -> u64 {
        let range = self.part_range(part_number);
        range.end - range.start
    }

    /// Total bytes covered by the given parts
    pub fn bytes_for<I>(&self, part_numbers: I) -> u64
    where
        I: IntoIterator<Item = u32>,
    {
        part_numbers.into_iter().map(|n| self.part_len(n)).sum()
    }
}

/// Identity of "the same upload attempt" for resume.
///
/// Built from name, size and modification time only. Two different files
/// agreeing on all three share a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(name: &str, size: u64, modified_millis: i64) -> Self {
        Self(format!("upload-state:{}-{}-{}", name, size, modified_millis))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
