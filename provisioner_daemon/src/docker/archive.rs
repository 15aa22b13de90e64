use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Builder, EntryType, Header};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Destination '{0}' does not name a file.")]
    InvalidDestination(String),
    #[error("Failed to build archive: {0}")]
    Build(#[from] io::Error),
}

/// Directory the archive is extracted into and the file name inside it.
pub fn split_destination(destination: &str) -> Result<(String, String), ArchiveError> {
    let path = Path::new(destination);
    let invalid = || ArchiveError::InvalidDestination(destination.to_string());
    if destination.ends_with('/') {
        return Err(invalid());
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(invalid)?;
    let directory = match path.parent().and_then(|parent| parent.to_str()) {
        Some("") | None => "/",
        Some(parent) => parent,
    };
    Ok((directory.to_string(), file_name.to_string()))
}

/// Tar archive holding one regular file owned by root.
pub fn single_file_archive(file_name: &str, mode: u32, data: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default(),
    );

    let mut builder = Builder::new(Vec::new());
    builder.append_data(&mut header, file_name, data)?;
    Ok(builder.into_inner()?)
}
