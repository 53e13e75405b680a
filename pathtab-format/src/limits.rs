//! Output and traversal limits

use crate::error::{PathTabError, Result};
use serde::Deserialize;

/// Limits applied while flattening and rendering
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum rendered output size in bytes (default: 64 MiB, hard: 1 GiB)
    pub max_output_bytes: usize,
    /// Maximum number of rows (default: 1,000,000, hard: 16,000,000)
    pub max_rows: usize,
    /// Maximum nesting depth followed during flatten (default: 64, hard: 512)
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_output_bytes: 64 * 1024 * 1024,
            max_rows: 1_000_000,
            max_depth: 64,
        }
    }
}

impl Limits {
    /// Hard maximum limits that cannot be exceeded
    pub fn hard_maximums() -> Self {
        Self {
            max_output_bytes: 1024 * 1024 * 1024,
            max_rows: 16_000_000,
            max_depth: 512,
        }
    }

    /// Validate limits against hard maximums
    pub fn validate(&self) -> Result<()> {
        let hard = Self::hard_maximums();

        if self.max_output_bytes > hard.max_output_bytes {
            return Err(PathTabError::InvalidConfig(format!(
                "max_output_bytes {} exceeds hard limit {}",
                self.max_output_bytes, hard.max_output_bytes
            )));
        }

        if self.max_rows > hard.max_rows {
            return Err(PathTabError::InvalidConfig(format!(
                "max_rows {} exceeds hard limit {}",
                self.max_rows, hard.max_rows
            )));
        }

        if self.max_depth > hard.max_depth {
            return Err(PathTabError::InvalidConfig(format!(
                "max_depth {} exceeds hard limit {}",
                self.max_depth, hard.max_depth
            )));
        }

        Ok(())
    }

    /// Fail with [`PathTabError::LimitExceeded`] once `actual` passes the output limit
    pub fn check_output(&self, actual: usize) -> Result<()> {
        if actual > self.max_output_bytes {
            return Err(PathTabError::LimitExceeded {
                what: "output bytes",
                limit: self.max_output_bytes,
                actual,
            });
        }
        Ok(())
    }

    /// Fail with [`PathTabError::LimitExceeded`] once `actual` passes the row limit
    pub fn check_rows(&self, actual: usize) -> Result<()> {
        if actual > self.max_rows {
            return Err(PathTabError::LimitExceeded {
                what: "rows",
                limit: self.max_rows,
                actual,
            });
        }
        Ok(())
    }
}
