//! Transient cookie jars for the downloader.
//!
//! A jar lives in the cookies staging directory only while the download that
//! needs it runs. It is a [`tempfile::NamedTempFile`], so it is deleted when
//! the [`CookieJarFile`] is dropped regardless of how the download ended.

use std::io::Write;
use std::path::Path;

use stemdub_core::cookie::{write_netscape, Cookie};

/// A cookie jar on disk, deleted on drop.
#[derive(Debug)]
pub struct CookieJarFile {
    file: tempfile::NamedTempFile,
    count: usize,
}

impl CookieJarFile {
    /// Path handed to the downloader.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of cookie lines written.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Delete the jar now, reporting any failure.
    pub fn close(self) -> stemdub_core::Result<()> {
        self.file.close()?;
        Ok(())
    }
}

/// Write `cookies` as a Netscape cookie jar with a unique name inside `dir`.
///
/// Every cookie is validated first; nothing is written if one is malformed.
pub fn materialize_cookies(dir: &Path, cookies: &[Cookie]) -> stemdub_core::Result<CookieJarFile> {
    for cookie in cookies {
        cookie.validate()?;
    }

    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("cookies_")
        .suffix(".txt")
        .tempfile_in(dir)?;

    write_netscape(&mut file, cookies)?;
    file.as_file_mut().sync_all()?;

    tracing::debug!(
        "wrote {} cookie(s) to {}",
        cookies.len(),
        file.path().display()
    );

    Ok(CookieJarFile {
        file,
        count: cookies.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_cookie() {
        let tmp = tempfile::tempdir().unwrap();
        let cookies = vec![
            Cookie::new("session", "abc", ".example.com"),
            Cookie::new("pref", "dark", "example.com"),
        ];
        let jar = materialize_cookies(tmp.path(), &cookies).unwrap();
        assert_eq!(jar.len(), 2);

        let text = std::fs::read_to_string(jar.path()).unwrap();
        let data: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(data.len(), 2);
        assert!(data[0].starts_with(".example.com\tTRUE\t"));
        assert!(data[1].starts_with("example.com\tFALSE\t"));

        let name = jar.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cookies_") && name.ends_with(".txt"), "{name}");
    }

    #[test]
    fn jar_names_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let a = materialize_cookies(tmp.path(), &[]).unwrap();
        let b = materialize_cookies(tmp.path(), &[]).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.is_empty());
    }

    #[test]
    fn jar_is_removed_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let jar = materialize_cookies(tmp.path(), &[Cookie::new("a", "1", "x.com")]).unwrap();
        let path = jar.path().to_path_buf();
        assert!(path.exists());
        drop(jar);
        assert!(!path.exists());
    }

    #[test]
    fn malformed_cookie_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = materialize_cookies(tmp.path(), &[Cookie::new("a", "1\t2", "x.com")]).unwrap_err();
        assert_eq!(err.http_status(), 400);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
