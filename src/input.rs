use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use mpa::utils::source::{ByteSource, ReadOnlySource};

/// Opens `input_path` as a byte source. Use "-" for stdin, which cannot
/// seek.
pub struct InputReader {
    source: Box<dyn ByteSource>,
    is_pipe: bool,
}

impl InputReader {
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path = input_path.as_ref();
        let is_pipe = path.as_os_str() == "-";

        let source: Box<dyn ByteSource> = if is_pipe {
            Box::new(ReadOnlySource::new(io::stdin()))
        } else {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Box::new(file)
        };

        Ok(Self { source, is_pipe })
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    pub fn into_source(self) -> Box<dyn ByteSource> {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_is_stdin() -> Result<()> {
        let input = InputReader::new("-")?;
        assert!(input.is_pipe());
        assert!(!input.into_source().is_seekable());
        Ok(())
    }

    #[test]
    fn missing_file_names_path() {
        let err = InputReader::new("/nonexistent/stream.mp3")
            .err()
            .map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Failed to open /nonexistent/stream.mp3")
        );
    }
}
