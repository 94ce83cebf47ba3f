use crate::rcv::*;

use std::path::Path;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Reads a ballot file, making sure that it is an existing, readable text file.
pub fn read_text_file(path: &str) -> RcvResult<String> {
    let p = Path::new(path);
    ensure!(p.exists(), MissingFileSnafu { path });
    ensure!(!p.is_dir(), IsDirectorySnafu { path });
    let bytes = fs::read(p).context(ReadingFileSnafu { path })?;
    // Binary files usually contain NUL bytes, text files never do.
    ensure!(!bytes.contains(&0), NotTextSnafu { path });
    let contents = String::from_utf8(bytes).ok().context(NotTextSnafu { path })?;
    debug!("read_text_file: {}: {} bytes", path, contents.len());
    Ok(contents)
}
