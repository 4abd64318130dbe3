//! Capability-based filesystem helpers shared by the geotap crates.
#![forbid(unsafe_code)]

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use chrono::{DateTime, Utc};
use std::io::{self, Read};

/// Open a UTF-8 file path using ambient authority.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Open the directory containing `path` and return it with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Return whether `path` exists and is a regular file.
///
/// A missing file or parent directory yields `Ok(false)`.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Modification time of the file at `path`, in UTC.
pub fn modified_time(path: &Utf8Path) -> io::Result<DateTime<Utc>> {
    let (dir, name) = open_dir_and_file(path)?;
    let modified = dir.metadata(name.as_str())?.modified()?.into_std();
    Ok(DateTime::<Utc>::from(modified))
}

/// Copy `reader` into a new file called `name` inside `dir`.
///
/// Returns the full path of the written file.
pub fn write_into_dir(dir: &Utf8Path, name: &str, reader: &mut dyn Read) -> io::Result<Utf8PathBuf> {
    let handle = fs_utf8::Dir::open_ambient_dir(dir, ambient_authority())?;
    let mut file = handle.create(name)?;
    io::copy(reader, &mut file)?;
    Ok(dir.join(name))
}

/// Create any missing ancestors of `path`.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
        return Ok(());
    };
    let (anchor, relative) = split_anchor(parent);
    if relative.as_str().is_empty() {
        return Ok(());
    }
    fs_utf8::Dir::open_ambient_dir(&anchor, ambient_authority())?.create_dir_all(&relative)
}

/// Split `path` into its root (drive, UNC prefix or `/`, else `.`) and the
/// relative remainder.
fn split_anchor(path: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    let mut components = path.components();
    let mut anchor = Utf8PathBuf::new();
    while let Some(component @ (Utf8Component::Prefix(_) | Utf8Component::RootDir)) =
        components.clone().next()
    {
        anchor.push(component);
        components.next();
    }
    if anchor.as_str().is_empty() {
        anchor.push(".");
    }
    (anchor, components.as_path().to_path_buf())
}
