//! Output accounting against the configured byte limit

use pathtab_format::{Limits, Result};
use std::io::Write;

/// Writer that fails once the output limit would be passed
///
/// The limit is checked before each write, so a failed render never emits the
/// piece that would exceed it.
pub struct Sink<'l, W: Write> {
    out: W,
    written: usize,
    limits: &'l Limits,
}

impl<'l, W: Write> Sink<'l, W> {
    /// Wrap `out`
    pub fn new(out: W, limits: &'l Limits) -> Self {
        Self {
            out,
            written: 0,
            limits,
        }
    }

    /// Write `text`
    ///
    /// # Errors
    ///
    /// Returns [`PathTabError::LimitExceeded`](pathtab_format::PathTabError::LimitExceeded)
    /// with the size the output would have reached.
    pub fn push(&mut self, text: &str) -> Result<()> {
        let next = self.written + text.len();
        self.limits.check_output(next)?;
        self.out.write_all(text.as_bytes())?;
        self.written = next;
        Ok(())
    }

    /// Bytes written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and return the inner writer
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_before_the_limit() {
        let limits = Limits {
            max_output_bytes: 5,
            ..Limits::default()
        };
        let mut sink = Sink::new(Vec::new(), &limits);
        sink.push("abc").unwrap();
        let err = sink.push("def").unwrap_err();
        match err {
            pathtab_format::PathTabError::LimitExceeded { limit, actual, .. } => {
                assert_eq!(limit, 5);
                assert_eq!(actual, 6);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(sink.written(), 3);
        assert_eq!(sink.finish().unwrap(), b"abc");
    }
}
