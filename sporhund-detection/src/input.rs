//! Log input sources: plain files, gzip-compressed files, standard input.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use flate2::read::GzDecoder;

use crate::error::ScanError;

/// A scannable line source. Gzip is detected by a `.gz` suffix on the
/// filename; everything else is read as raw text.
#[derive(Debug, Clone)]
pub enum LogInput {
    Stdin,
    Path(PathBuf),
}

impl LogInput {
    pub fn open(&self) -> Result<Box<dyn BufRead>, ScanError> {
        match self {
            Self::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
            Self::Path(path) => {
                let file = File::open(path)?;
                if path.extension().is_some_and(|ext| ext == "gz") {
                    Ok(Box::new(BufReader::new(GzDecoder::new(file))))
                } else {
                    Ok(Box::new(BufReader::new(file)))
                }
            }
        }
    }

    /// Display name for logging.
    pub fn name(&self) -> String {
        match self {
            Self::Stdin => "<stdin>".to_string(),
            Self::Path(path) => path.display().to_string(),
        }
    }
}
