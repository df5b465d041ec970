//! Local artifact layout
//!
//! Full files live at `{save_dir}/{model}/{YYYYMMDD}/{file_name}`. Subsets sit
//! next to them as `subset_{fingerprint}__{file_name}`, so differently-subset
//! downloads of the same request never collide.

use std::path::{Path, PathBuf};

use crate::app::models::{Location, Request};
use crate::app::subset::selects_everything;
use crate::constants::files;

/// Directory holding every artifact for one request's run date
pub fn run_dir(save_dir: &Path, model: &str, request: &Request) -> PathBuf {
    save_dir.join(model).join(request.date_stamp())
}

/// Path of the full local artifact
pub fn full_path(save_dir: &Path, model: &str, request: &Request, file_name: &str) -> PathBuf {
    run_dir(save_dir, model, request).join(file_name)
}

/// Eight hex characters identifying a subset of one request
///
/// Built from MD5 digests of the reference time (2), the lead time (2) and
/// the pattern (4), so subsets of the same run sort together.
pub fn fingerprint(request: &Request, pattern: &str) -> String {
    let time = format!("{:x}", md5::compute(request.reference_time().format("%Y%m%d%H%M").to_string()));
    let lead = format!("{:x}", md5::compute(request.fxx().to_string()));
    let search = format!("{:x}", md5::compute(pattern));
    format!("{}{}{}", &time[..2], &lead[..2], &search[..4])
}

/// Artifact path for a pattern; patterns selecting everything map to the full artifact
pub fn artifact_path(full: &Path, request: &Request, pattern: Option<&str>) -> PathBuf {
    match pattern {
        Some(pattern) if !selects_everything(Some(pattern)) => {
            let file_name = full
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            full.with_file_name(format!(
                "{}{}{}{}",
                files::SUBSET_PREFIX,
                fingerprint(request, pattern),
                files::SUBSET_SEPARATOR,
                file_name
            ))
        }
        _ => full.to_path_buf(),
    }
}

/// Copy of a remote index saved beside the full artifact
pub fn index_copy_path(full: &Path, index: &Location) -> Option<PathBuf> {
    index.file_name().map(|name| full.with_file_name(name))
}

/// In-progress sibling of `path`
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, files::TEMP_FILE_SUFFIX)
}

/// Marker name for an output that did not complete
pub fn partial_path(path: &Path) -> PathBuf {
    with_suffix(path, files::PARTIAL_FILE_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(fxx: u32) -> Request {
        let time = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        Request::new("hrrr", time, fxx).unwrap()
    }

    #[test]
    fn test_full_path_layout() {
        let path = full_path(Path::new("/data"), "hrrr", &request(3), "hrrr.t06z.wrfsfcf03.grib2");
        assert_eq!(path, PathBuf::from("/data/hrrr/20240301/hrrr.t06z.wrfsfcf03.grib2"));
    }

    #[test]
    fn test_subset_names_are_distinct_and_stable() {
        let full = PathBuf::from("/data/hrrr/20240301/hrrr.t06z.wrfsfcf03.grib2");
        let tmp = artifact_path(&full, &request(3), Some(":TMP:2 m"));
        let wind = artifact_path(&full, &request(3), Some(":UGRD:10 m"));

        assert_ne!(tmp, wind);
        assert_eq!(tmp, artifact_path(&full, &request(3), Some(":TMP:2 m")));

        let name = tmp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("subset_"));
        assert!(name.ends_with("__hrrr.t06z.wrfsfcf03.grib2"));
        assert_eq!(name.len(), "subset_".len() + 8 + "__hrrr.t06z.wrfsfcf03.grib2".len());

        // Same run, same lead: fingerprints share the first four characters.
        assert_eq!(fingerprint(&request(3), "a")[..4], fingerprint(&request(3), "b")[..4]);
    }

    #[test]
    fn test_match_all_pattern_is_full_artifact() {
        let full = PathBuf::from("/data/x.grib2");
        assert_eq!(artifact_path(&full, &request(0), Some(":")), full);
        assert_eq!(artifact_path(&full, &request(0), None), full);
    }

    #[test]
    fn test_sibling_paths() {
        let path = Path::new("/data/x.grib2");
        assert_eq!(temp_path(path), PathBuf::from("/data/x.grib2.tmp"));
        assert_eq!(partial_path(path), PathBuf::from("/data/x.grib2.partial"));

        let index = Location::parse("https://example.com/a/x.grib2.idx").unwrap();
        assert_eq!(
            index_copy_path(path, &index),
            Some(PathBuf::from("/data/x.grib2.idx"))
        );
    }
}
