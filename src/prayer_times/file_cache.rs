use chrono::NaiveDate;
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::Result;
use super::methods::CalculationMethod;
use crate::utils::geo::Coordinates;

/// Key → blob store, one file per key under a cache directory.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }

    pub fn save(&self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        // Write then rename so a crash never leaves a half-written entry.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        debug!("file cache: saved {}", key);
        Ok(())
    }

    pub fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry. Returns how many files were deleted.
    pub fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Composite key for one day of prayer data. Coordinates are snapped to the
/// 0.1° grid so nearby points share an entry.
pub fn cache_key(date: NaiveDate, coords: Coordinates, method: CalculationMethod) -> String {
    let c = coords.rounded();
    format!(
        "{}_{:.1}_{:.1}_{}",
        date.format("%Y-%m-%d"),
        c.latitude,
        c.longitude,
        method.api_code()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_save_load_remove() {
        let dir = tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();

        assert!(cache.load("missing").unwrap().is_none());
        cache.save("k1", b"hello").unwrap();
        assert_eq!(cache.load("k1").unwrap().as_deref(), Some(&b"hello"[..]));

        cache.save("k1", b"again").unwrap();
        assert_eq!(cache.load("k1").unwrap().as_deref(), Some(&b"again"[..]));

        cache.remove("k1").unwrap();
        cache.remove("k1").unwrap();
        assert!(cache.load("k1").unwrap().is_none());
    }

    #[test]
    fn test_clear_all() {
        let dir = tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("nested/cache")).unwrap();
        cache.save("a", b"1").unwrap();
        cache.save("b", b"2").unwrap();
        assert_eq!(cache.clear_all().unwrap(), 2);
        assert!(cache.load("a").unwrap().is_none());
        assert_eq!(cache.clear_all().unwrap(), 0);
    }

    #[test]
    fn test_keys_with_separators_stay_inside_dir() {
        let dir = tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.save("../escape/key", b"x").unwrap();
        assert!(cache.load("../escape/key").unwrap().is_some());
        assert!(!dir.path().parent().unwrap().join("escape").exists());
    }

    #[test]
    fn test_cache_key_rounds_coordinates() {
        let a = cache_key(
            date(),
            Coordinates::new(33.6938, 73.0651),
            CalculationMethod::Karachi,
        );
        let b = cache_key(
            date(),
            Coordinates::new(33.7049, 73.0702),
            CalculationMethod::Karachi,
        );
        assert_eq!(a, "2024-01-01_33.7_73.1_1");
        assert_eq!(a, b);

        let other_method = cache_key(
            date(),
            Coordinates::new(33.6938, 73.0651),
            CalculationMethod::MuslimWorldLeague,
        );
        assert_ne!(a, other_method);
    }
}
