use std::io;
use std::io::Write as _;
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace `path` with `contents` via a sibling temp file, so readers never
/// observe a half-written file.
pub fn write_atomic_text(path: &Path, contents: &str) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Err(io::Error::other(format!(
            "invalid path for atomic write: {}",
            path.display()
        )));
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    if !contents.ends_with('\n') {
        tmp.write_all(b"\n")?;
    }
    tmp.flush()?;

    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn adds_trailing_newline_and_creates_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");

        write_atomic_text(&path, "{}").expect("write atomic");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "{}\n");
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");

        write_atomic_text(&path, "first\n").expect("first write");
        write_atomic_text(&path, "second\n").expect("second write");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), "second\n");
    }
}
