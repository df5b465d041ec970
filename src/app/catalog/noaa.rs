//! NOAA/NCEP model templates
//!
//! HRRR, RAP, GFS and HiResW output is mirrored by NOMADS and the NODD
//! cloud buckets, all with wgrib2 indexes next to each GRIB2 file.

use chrono::{Duration as ChronoDuration, NaiveDate};

use super::ModelTemplate;
use crate::app::models::{Request, SourceCandidate};

/// High-Resolution Rapid Refresh, CONUS or Alaska domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hrrr {
    alaska: bool,
}

impl Hrrr {
    pub fn conus() -> Self {
        Self { alaska: false }
    }

    pub fn alaska() -> Self {
        Self { alaska: true }
    }
}

const HRRR_PRODUCTS: &[(&str, &str)] = &[
    ("sfc", "2D surface level fields; 3-km resolution"),
    ("prs", "3D pressure level fields; 3-km resolution"),
    ("nat", "Native level fields; 3-km resolution"),
    ("subh", "Subhourly grids; 3-km resolution"),
];

const HRRRAK_PRODUCTS: &[(&str, &str)] = &[
    ("prs", "3D pressure level fields; 3-km resolution"),
    ("sfc", "2D surface level fields; 3-km resolution"),
    ("nat", "Native level fields; 3-km resolution"),
    ("subh", "Subhourly grids; 3-km resolution"),
];

impl ModelTemplate for Hrrr {
    fn name(&self) -> &str {
        if self.alaska {
            "hrrrak"
        } else {
            "hrrr"
        }
    }

    fn description(&self) -> &str {
        if self.alaska {
            "High-Resolution Rapid Refresh - Alaska"
        } else {
            "High-Resolution Rapid Refresh - CONUS"
        }
    }

    fn details(&self) -> &[(&str, &str)] {
        &[
            ("NOMADS product description", "https://www.nco.ncep.noaa.gov/pmb/products/hrrr/"),
            ("University of Utah HRRR archive", "http://hrrr.chpc.utah.edu/"),
        ]
    }

    fn products(&self) -> &[(&str, &str)] {
        if self.alaska {
            HRRRAK_PRODUCTS
        } else {
            HRRR_PRODUCTS
        }
    }

    fn sources(&self, request: &Request, product: &str) -> Vec<SourceCandidate> {
        let date = request.date_stamp();
        let hour = request.hour_stamp();
        let fxx = request.fxx();
        let (domain, suffix) = if self.alaska {
            ("alaska", ".ak")
        } else {
            ("conus", "")
        };
        let name = self.name();
        let file = format!("hrrr.t{hour}z.wrf{product}f{fxx:02}{suffix}.grib2");
        let pando_file = format!("{name}.t{hour}z.wrf{product}f{fxx:02}.grib2");

        let aws = SourceCandidate::new(
            "aws",
            format!("https://noaa-hrrr-bdp-pds.s3.amazonaws.com/hrrr.{date}/{domain}/{file}"),
        );
        let nomads = SourceCandidate::new(
            "nomads",
            format!(
                "https://nomads.ncep.noaa.gov/pub/data/nccf/com/hrrr/prod/hrrr.{date}/{domain}/{file}"
            ),
        );
        let rest = [
            SourceCandidate::new(
                "google",
                format!(
                    "https://storage.googleapis.com/high-resolution-rapid-refresh/hrrr.{date}/{domain}/{file}"
                ),
            ),
            SourceCandidate::new(
                "pando",
                format!("https://pando-rgw01.chpc.utah.edu/{name}/{product}/{date}/{pando_file}"),
            ),
            SourceCandidate::new(
                "pando2",
                format!("https://pando-rgw02.chpc.utah.edu/{name}/{product}/{date}/{pando_file}"),
            ),
        ];

        // Alaska output lands on NOMADS first.
        let mut sources = if self.alaska {
            vec![nomads, aws]
        } else {
            vec![aws, nomads]
        };
        sources.extend(rest);
        sources
    }
}

/// Rapid Refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rap;

impl ModelTemplate for Rap {
    fn name(&self) -> &str {
        "rap"
    }

    fn description(&self) -> &str {
        "Rapid Refresh (RAP) from NOMADS and Big Data Program"
    }

    fn details(&self) -> &[(&str, &str)] {
        &[("NOMADS product description", "https://www.nco.ncep.noaa.gov/pmb/products/rap")]
    }

    fn products(&self) -> &[(&str, &str)] {
        &[
            ("awp130pgrb", "CONUS Pressure levels; 13-km resolution"),
            ("awp252pgrb", "CONUS Pressure levels; 20-km resolution"),
            ("awp236pgrb", "CONUS Pressure levels; 40-km resolution"),
            ("awp130bgrb", "CONUS Native levels; 13-km resolution"),
            ("awp252bgrb", "CONUS Native levels; 20-km resolution"),
            ("wrfprs", "Full domain Pressure Levels; 13-km"),
            ("wrfnat", "Full domain Native Levels; 13-km"),
            ("awip32", "High-Resolution North American Master Grid; 32-km resolution"),
            ("awp242", "Alaska Quadruple Resolution Pressure levels; 11-km resolution"),
            ("awp200", "Puerto Rico Pressure levels; 16-km resolution"),
            ("awp243", "Eastern North America Pressure levels, 0.4 degree resolution"),
            ("wrfmsl", "WRFMSL; 13-km resolution"),
        ]
    }

    fn sources(&self, request: &Request, product: &str) -> Vec<SourceCandidate> {
        let date = request.date_stamp();
        let file = format!(
            "rap.t{}z.{}f{:02}.grib2",
            request.hour_stamp(),
            product,
            request.fxx()
        );
        vec![
            SourceCandidate::new(
                "aws",
                format!("https://noaa-rap-pds.s3.amazonaws.com/rap.{date}/{file}"),
            ),
            SourceCandidate::new(
                "nomads",
                format!("https://nomads.ncep.noaa.gov/pub/data/nccf/com/rap/prod/rap.{date}/{file}"),
            ),
            SourceCandidate::new(
                "google",
                format!("https://storage.googleapis.com/rapid-refresh/rap.{date}/{file}"),
            ),
        ]
    }
}

/// Global Forecast System atmosphere products
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gfs;

impl Gfs {
    /// GFS v16 moved output under an `atmos/` directory
    fn atmos_cutover() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, 23).unwrap_or_default()
    }
}

impl ModelTemplate for Gfs {
    fn name(&self) -> &str {
        "gfs"
    }

    fn description(&self) -> &str {
        "NOAA Global Forecast System (GFS)"
    }

    fn details(&self) -> &[(&str, &str)] {
        &[
            ("NOMADS product description", "https://www.nco.ncep.noaa.gov/pmb/products/gfs"),
            ("AWS open data", "https://registry.opendata.aws/noaa-gfs-bdp-pds"),
            ("NCAR Research Data Archive", "https://rda.ucar.edu/datasets/d084001/"),
        ]
    }

    fn products(&self) -> &[(&str, &str)] {
        &[
            ("pgrb2.0p25", "common fields, 0.25 degree resolution"),
            ("pgrb2.0p50", "common fields, 0.50 degree resolution"),
            ("pgrb2.1p00", "common fields, 1.00 degree resolution"),
            ("pgrb2b.0p25", "uncommon fields, 0.25 degree resolution"),
            ("pgrb2b.0p50", "uncommon fields, 0.50 degree resolution"),
            ("pgrb2b.1p00", "uncommon fields, 1.00 degree resolution"),
            ("pgrb2full.0p50", "combined grids of 0.50 resolution"),
            ("sfluxgrb", "surface flux fields, T1534 Semi-Lagrangian grid"),
        ]
    }

    fn sources(&self, request: &Request, product: &str) -> Vec<SourceCandidate> {
        let date = request.date_stamp();
        let hour = request.hour_stamp();
        let fxx = request.fxx();
        let atmos = if request.reference_time().date() >= Self::atmos_cutover() {
            "atmos/"
        } else {
            ""
        };
        // Flux files have no dot between product and lead time.
        let separator = if product == "sfluxgrb" { "" } else { "." };
        let post_root =
            format!("gfs.{date}/{hour}/{atmos}gfs.t{hour}z.{product}{separator}f{fxx:03}");

        vec![
            SourceCandidate::new(
                "aws",
                format!("https://noaa-gfs-bdp-pds.s3.amazonaws.com/{post_root}"),
            ),
            SourceCandidate::new(
                "nomads",
                format!("https://nomads.ncep.noaa.gov/pub/data/nccf/com/gfs/prod/{post_root}"),
            ),
            SourceCandidate::new(
                "google",
                format!("https://storage.googleapis.com/global-forecast-system/{post_root}"),
            ),
            SourceCandidate::new(
                "ncar_rda",
                format!(
                    "https://data.rda.ucar.edu/d084001/{}/{date}/gfs.0p25.{date}{hour}.f{fxx:03}.grib2",
                    request.reference_time().format("%Y")
                ),
            ),
        ]
    }

    fn index_suffixes(&self) -> &[&str] {
        &[".idx", ".grb2.inv"]
    }

    fn cycle_interval(&self) -> ChronoDuration {
        ChronoDuration::hours(6)
    }
}

/// High-Resolution Window forecast system; member 2 exists for ARW runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HiresW;

impl ModelTemplate for HiresW {
    fn name(&self) -> &str {
        "hiresw"
    }

    fn description(&self) -> &str {
        "High-Resolution Window (HIRESW) Forecast System"
    }

    fn details(&self) -> &[(&str, &str)] {
        &[("NOMADS product description", "https://www.nco.ncep.noaa.gov/pmb/products/hiresw/")]
    }

    fn products(&self) -> &[(&str, &str)] {
        &[
            ("arw_2p5km", "CONUS 2.5km ARW"),
            ("fv3_2p5km", "CONUS 2.5km FV3"),
            ("arw_5km", "CONUS 5km ARW"),
            ("fv3_5km", "CONUS 5km FV3"),
        ]
    }

    fn sources(&self, request: &Request, product: &str) -> Vec<SourceCandidate> {
        let member = match request.member() {
            Some(2) => "mem2",
            _ => "",
        };
        vec![SourceCandidate::new(
            "nomads",
            format!(
                "https://nomads.ncep.noaa.gov/pub/data/nccf/com/hiresw/prod/hiresw.{}/hiresw.t{}z.{}.f{:02}.conus{}.grib2",
                request.date_stamp(),
                request.hour_stamp(),
                product,
                request.fxx(),
                member
            ),
        )]
    }

    fn cycle_interval(&self) -> ChronoDuration {
        ChronoDuration::hours(12)
    }
}
