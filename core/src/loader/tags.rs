use crate::error::{CatphanError, Result};
use dicom_core::Tag;
use dicom_object::InMemDicomObject;

// Series description
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
pub const STUDY_DATE: Tag = Tag(0x0008, 0x0020);
pub const STUDY_TIME: Tag = Tag(0x0008, 0x0030);
pub const MANUFACTURER: Tag = Tag(0x0008, 0x0070);
pub const STATION_NAME: Tag = Tag(0x0008, 0x1010);
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);

// Slice position
pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
pub const IMAGE_POSITION_PATIENT: Tag = Tag(0x0020, 0x0032);
pub const SLICE_LOCATION: Tag = Tag(0x0020, 0x1041);

// Image pixel module
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
pub const ROWS: Tag = Tag(0x0028, 0x0010);
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to string
pub fn get_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Helper to get a decimal string value from DICOM tag
///
/// Only the first value of a multi-valued element is read.
pub fn get_f64_value(dcm: &InMemDicomObject, tag: Tag) -> Option<f64> {
    get_multi_f64_value(dcm, tag).and_then(|v| v.first().copied())
}

/// Helper to get every decimal value of a backslash-separated element
///
/// Returns `None` if the tag is missing or any value fails to parse
pub fn get_multi_f64_value(dcm: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    let s = get_string_value(dcm, tag)?;
    s.split('\\')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

/// Helper to get u16 value from DICOM tag
pub fn get_u16_value(dcm: &InMemDicomObject, tag: Tag) -> Option<u16> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_int::<u16>().ok())
}

/// Reads a required u16 tag
///
/// # Errors
///
/// `TagNotFound` naming `name` if the tag is absent, `InvalidValue` if it
/// does not convert to u16.
pub fn require_u16_value(dcm: &InMemDicomObject, tag: Tag, name: &str) -> Result<u16> {
    let elem = dcm
        .element(tag)
        .map_err(|_| CatphanError::TagNotFound(name.to_string()))?;
    Ok(elem.to_int::<u16>()?)
}
