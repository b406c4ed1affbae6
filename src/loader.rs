use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::ofx::{self, OfxDocument};

/// Reads one statement file and keeps the parsed document for the rest of
/// the run.
pub struct StatementLoader {
    path: PathBuf,
    cached: Option<OfxDocument>,
}

impl StatementLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed document; the file is read only on the first call.
    pub fn statement(&mut self) -> Result<&OfxDocument> {
        let doc = match self.cached.take() {
            Some(doc) => doc,
            None => self.read()?,
        };
        Ok(self.cached.insert(doc))
    }

    fn read(&self) -> Result<OfxDocument> {
        debug!("reading statement {}", self.path.display());
        let unreadable = |reason: String| Error::SourceUnreadable {
            path: self.path.clone(),
            reason,
        };
        let bytes = std::fs::read(&self.path).map_err(|e| unreadable(e.to_string()))?;
        let content = ofx::decode(&bytes);
        ofx::parse(&content).map_err(|e| unreadable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "<OFX><STMTRS><BANKACCTFROM><ACCTID>999</BANKACCTFROM></STMTRS></OFX>";

    #[test]
    fn test_statement_is_cached_after_first_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stmt.ofx");
        std::fs::write(&path, MINIMAL).unwrap();

        let mut loader = StatementLoader::new(&path);
        let first = loader.statement().unwrap().clone();
        std::fs::remove_file(&path).unwrap();
        let second = loader.statement().unwrap();
        assert_eq!(&first, second);
        assert_eq!(second.account.as_ref().unwrap().number.as_deref(), Some("999"));
    }

    #[test]
    fn test_windows_1252_payee_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stmt.ofx");
        let mut bytes = b"OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\nENCODING:USASCII\nCHARSET:1252\n\n\
            <OFX><STMTRS><BANKTRANLIST><STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20240101<TRNAMT>-3.50<FITID>c1<NAME>CAF"
            .to_vec();
        bytes.push(0xC9);
        bytes.extend_from_slice(b"</STMTTRN></BANKTRANLIST></STMTRS></OFX>");
        std::fs::write(&path, bytes).unwrap();

        let mut loader = StatementLoader::new(&path);
        let stmt = loader.statement().unwrap().statement.as_ref().unwrap();
        assert_eq!(stmt.transactions[0].payee, "CAFÉ");
    }

    #[test]
    fn test_missing_file_is_source_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = StatementLoader::new(dir.path().join("nope.ofx"));
        let err = loader.statement().unwrap_err();
        assert!(matches!(err, Error::SourceUnreadable { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_non_ofx_content_is_source_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stmt.csv");
        std::fs::write(&path, "Date,Description,Amount\n01/15/2025,COFFEE,-4.00\n").unwrap();
        let mut loader = StatementLoader::new(&path);
        match loader.statement() {
            Err(Error::SourceUnreadable { path: p, reason }) => {
                assert_eq!(p, path);
                assert!(reason.contains("<OFX>"));
            }
            other => panic!("expected SourceUnreadable, got {other:?}"),
        }
    }
}
