use crate::error::SheetTablesError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub(crate) enum UnifiedReaderError {
    #[error("No data from remote file: '{0}'")]
    RemoteFileNoDataError(String),
}

/// A unified reader that can handle both local files and remote URLs
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// Remote URL reader (in-memory buffer)
    Remote(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a file from either a local path or remote URL.
    /// Remote URLs are fetched with DuckDB's `read_blob`, which handles credentials and protocols.
    pub(crate) fn new(file_name: &str) -> Result<UnifiedReader, SheetTablesError> {
        if Self::is_remote_url(file_name) {
            tracing::debug!(file_name, "fetching remote workbook through read_blob");
            Self::read_blob_with_duckdb(file_name)
        } else {
            let file = File::open(file_name)?;
            Ok(UnifiedReader::Local(BufReader::new(file)))
        }
    }

    /// Checks if a file name represents a remote URL
    pub(crate) fn is_remote_url(file_name: &str) -> bool {
        if let Ok(url) = Url::parse(file_name) {
            // Windows drive letters parse as one-letter schemes
            url.scheme() != "file" && url.scheme().len() > 1
        } else {
            false
        }
    }

    /// Checks whether the content begins with `signature`, leaving the reader at the start.
    pub(crate) fn starts_with(&mut self, signature: &[u8]) -> Result<bool, SheetTablesError> {
        let mut buffer = vec![0u8; signature.len()];
        self.seek(SeekFrom::Start(0))?;
        let matched = match self.read_exact(&mut buffer) {
            Ok(()) => buffer == signature,
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => false,
            Err(error) => Err(error)?,
        };
        self.seek(SeekFrom::Start(0))?;
        Ok(matched)
    }

    fn read_blob_with_duckdb(file_name: &str) -> Result<UnifiedReader, SheetTablesError> {
        let connection = duckdb::Connection::open_in_memory()?;
        let result: Result<Vec<u8>, _> = connection.query_row("SELECT content FROM read_blob(?)", [file_name], |row| row.get(0));
        connection.close().map_err(|(_, e)| e)?;

        let bytes = result?;
        if bytes.is_empty() {
            Err(UnifiedReaderError::RemoteFileNoDataError(file_name.to_owned()))?;
        }
        Ok(UnifiedReader::Remote(Cursor::new(bytes)))
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Remote(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Remote(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote_url() {
        assert!(!UnifiedReader::is_remote_url("report.xlsx"));
        assert!(!UnifiedReader::is_remote_url("/path/to/report.xlsx"));
        assert!(!UnifiedReader::is_remote_url("./relative/report.ods"));
        assert!(!UnifiedReader::is_remote_url("C:\\reports\\report.xlsx"));
        assert!(!UnifiedReader::is_remote_url("file:///path/to/report.xlsx"));

        assert!(UnifiedReader::is_remote_url("http://example.com/report.xlsx"));
        assert!(UnifiedReader::is_remote_url("https://example.com/report.xlsx"));
        assert!(UnifiedReader::is_remote_url("s3://bucket/report.xlsx"));
    }

    #[test]
    fn test_open_local_file() {
        assert!(UnifiedReader::new("Cargo.toml").is_ok());
        assert!(UnifiedReader::new("non_existent_file.xlsx").is_err());
    }

    #[test]
    fn test_starts_with_rewinds() {
        let mut reader = UnifiedReader::Remote(Cursor::new(b"PK\x03\x04rest".to_vec()));
        assert!(reader.starts_with(b"PK\x03\x04").unwrap());
        assert!(!reader.starts_with(b"\xD0\xCF\x11\xE0").unwrap());
        assert!(!reader.starts_with(b"PK\x03\x04rest-and-more").unwrap());

        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "PK\x03\x04rest");
    }
}
