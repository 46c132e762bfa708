//! DICOM series loading
//!
//! Reads single-frame CT slices from a directory into an [`ImageStack`].
//! Stored pixel values are kept raw; the rescale slope and intercept are
//! carried on each [`Slice`] so calibration happens in one place.

pub mod tags;

use crate::error::{CatphanError, Result};
use crate::types::{ImageStack, PixelSpacing, Slice};
use dicom_core::PrimitiveValue;
use dicom_object::{open_file, InMemDicomObject};
use log::{debug, info, warn};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tags::{
    get_f64_value, get_multi_f64_value, get_string_value, get_u16_value, require_u16_value,
    BITS_ALLOCATED, COLUMNS,
    IMAGE_POSITION_PATIENT, MANUFACTURER, NUMBER_OF_FRAMES, PIXEL_DATA, PIXEL_REPRESENTATION,
    PIXEL_SPACING, RESCALE_INTERCEPT, RESCALE_SLOPE, ROWS, SAMPLES_PER_PIXEL, SERIES_DESCRIPTION,
    SLICE_LOCATION, SLICE_THICKNESS, STATION_NAME, STUDY_DATE, STUDY_TIME,
};

/// Acquisition details shown alongside the results
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesInfo {
    pub station_name: Option<String>,
    pub manufacturer: Option<String>,
    pub study_date: Option<String>,
    pub study_time: Option<String>,
    pub series_description: Option<String>,
}

impl SeriesInfo {
    pub fn from_dicom(dcm: &InMemDicomObject) -> Self {
        Self {
            station_name: get_string_value(dcm, STATION_NAME),
            manufacturer: get_string_value(dcm, MANUFACTURER),
            study_date: get_string_value(dcm, STUDY_DATE),
            study_time: get_string_value(dcm, STUDY_TIME),
            series_description: get_string_value(dcm, SERIES_DESCRIPTION),
        }
    }
}

/// A loaded series: the sorted stack, its source files in stack order and
/// the acquisition details of the first readable file
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub stack: ImageStack,
    pub files: Vec<PathBuf>,
    pub info: SeriesInfo,
}

/// Loads every readable slice under `directory`
///
/// Files that are not DICOM, multi-frame, compressed or missing position
/// tags are skipped with a warning. The remaining slices are sorted by
/// descending slice location.
///
/// # Errors
///
/// - `IoError` if the directory cannot be listed
/// - `InsufficientSlices` if no file yields a slice
/// - `InvalidStack` if the slices do not form a valid stack
pub fn load_series(directory: impl AsRef<Path>) -> Result<LoadedSeries> {
    let directory = directory.as_ref();
    let files = collect_dicom_files(directory)?;
    info!("Found {} DICOM files in {}", files.len(), directory.display());

    let mut info = None;
    let mut loaded = Vec::with_capacity(files.len());
    for path in files {
        match load_file(&path) {
            Ok((slice, file_info)) => {
                debug!("Loaded {} at {:.2} mm", path.display(), slice.slice_location());
                info.get_or_insert(file_info);
                loaded.push((slice, path));
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    if loaded.is_empty() {
        return Err(CatphanError::InsufficientSlices(format!(
            "no readable CT slices in {}",
            directory.display()
        )));
    }

    loaded.sort_by(|a, b| b.0.slice_location().total_cmp(&a.0.slice_location()));
    let (slices, files): (Vec<Slice>, Vec<PathBuf>) = loaded.into_iter().unzip();
    let stack = ImageStack::new(slices)?;
    info!("Loaded {} slices", stack.len());

    Ok(LoadedSeries {
        stack,
        files,
        info: info.unwrap_or_default(),
    })
}

/// Opens one file and reads its slice and acquisition details
///
/// # Errors
///
/// `DicomError` if the file cannot be parsed, otherwise any [`read_slice`]
/// failure.
pub fn load_file(path: &Path) -> Result<(Slice, SeriesInfo)> {
    let dcm = open_file(path)?;
    let slice = read_slice(&dcm)?;
    Ok((slice, SeriesInfo::from_dicom(&dcm)))
}

/// Builds a slice from an opened DICOM object
///
/// The slice location comes from SliceLocation, falling back to the z
/// component of ImagePositionPatient. Absent rescale tags mean the
/// identity mapping.
///
/// # Errors
///
/// - `TagNotFound` for missing geometry or pixel tags
/// - `InvalidValue` for an unparsable pixel spacing or image size
/// - `DicomError` for multi-frame, colour, encapsulated or truncated
///   pixel data
pub fn read_slice(dcm: &InMemDicomObject) -> Result<Slice> {
    let rows = require_u16_value(dcm, ROWS, "Rows")? as usize;
    let cols = require_u16_value(dcm, COLUMNS, "Columns")? as usize;

    let frames = get_string_value(dcm, NUMBER_OF_FRAMES)
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(1);
    if frames != 1 {
        return Err(CatphanError::DicomError(format!(
            "{} frames; only single-frame slices are supported",
            frames
        )));
    }
    let samples = get_u16_value(dcm, SAMPLES_PER_PIXEL).unwrap_or(1);
    if samples != 1 {
        return Err(CatphanError::DicomError(format!(
            "{} samples per pixel; only greyscale is supported",
            samples
        )));
    }

    let spacing = get_string_value(dcm, PIXEL_SPACING)
        .ok_or_else(|| CatphanError::TagNotFound("PixelSpacing".to_string()))?;
    let spacing = PixelSpacing::parse(&spacing).map_err(CatphanError::InvalidValue)?;

    let location = get_f64_value(dcm, SLICE_LOCATION)
        .or_else(|| {
            get_multi_f64_value(dcm, IMAGE_POSITION_PATIENT).and_then(|v| v.get(2).copied())
        })
        .ok_or_else(|| {
            CatphanError::TagNotFound("SliceLocation or ImagePositionPatient".to_string())
        })?;

    let slope = get_f64_value(dcm, RESCALE_SLOPE).unwrap_or(1.0);
    let intercept = get_f64_value(dcm, RESCALE_INTERCEPT).unwrap_or(0.0);

    let pixels = read_pixels(dcm, rows, cols)?;
    let mut slice = Slice::new(pixels, spacing, location).with_rescale(slope, intercept);
    if let Some(thickness) = get_f64_value(dcm, SLICE_THICKNESS) {
        slice = slice.with_thickness(thickness);
    }
    Ok(slice)
}

/// Decodes native (uncompressed) stored values without any LUT
fn read_pixels(dcm: &InMemDicomObject, rows: usize, cols: usize) -> Result<Array2<f64>> {
    let bits = require_u16_value(dcm, BITS_ALLOCATED, "BitsAllocated")?;
    let signed = get_u16_value(dcm, PIXEL_REPRESENTATION).unwrap_or(0) == 1;

    let elem = dcm
        .element(PIXEL_DATA)
        .map_err(|_| CatphanError::TagNotFound("PixelData".to_string()))?;
    let value = elem.value().primitive().ok_or_else(|| {
        CatphanError::DicomError("encapsulated pixel data is not supported".to_string())
    })?;

    let mut values: Vec<f64> = match (value, bits) {
        (PrimitiveValue::U16(v), 16) if signed => v.iter().map(|&p| p as i16 as f64).collect(),
        (PrimitiveValue::U16(v), 16) => v.iter().map(|&p| p as f64).collect(),
        (PrimitiveValue::I16(v), 16) => v.iter().map(|&p| p as f64).collect(),
        (PrimitiveValue::U8(bytes), 16) => bytes
            .chunks_exact(2)
            .map(|b| {
                let p = u16::from_le_bytes([b[0], b[1]]);
                if signed {
                    p as i16 as f64
                } else {
                    p as f64
                }
            })
            .collect(),
        (PrimitiveValue::U8(bytes), 8) if signed => bytes.iter().map(|&p| p as i8 as f64).collect(),
        (PrimitiveValue::U8(bytes), 8) => bytes.iter().map(|&p| p as f64).collect(),
        _ => {
            return Err(CatphanError::DicomError(format!(
                "unsupported pixel data with {} bits allocated",
                bits
            )))
        }
    };

    let expected = rows * cols;
    if values.len() < expected {
        return Err(CatphanError::DicomError(format!(
            "pixel data holds {} values, expected {}",
            values.len(),
            expected
        )));
    }
    values.truncate(expected);
    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| CatphanError::DicomError(format!("pixel data shape: {}", e)))
}

/// Lists candidate DICOM files in `directory`, sorted by path
///
/// Files ending in `.dcm` or `.dicom` (any case) are accepted directly;
/// files without an extension are accepted when they carry the DICM
/// magic.
pub fn collect_dicom_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match path.extension() {
            Some(ext) => {
                if ext.eq_ignore_ascii_case("dcm") || ext.eq_ignore_ascii_case("dicom") {
                    files.push(path);
                }
            }
            None => {
                if is_dicom_file(&path) {
                    debug!("Found headerless DICOM file: {}", path.display());
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Checks for the 128-byte preamble followed by the `DICM` magic
pub fn is_dicom_file(path: &Path) -> bool {
    use std::fs::File;
    use std::io::Read;

    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut buffer = [0u8; 132];
    match file.read_exact(&mut buffer) {
        Ok(()) => &buffer[128..132] == b"DICM",
        Err(_) => false,
    }
}
