//! Embedded EXIF block of an image, split into the parts this crate edits
//! (capture timestamps, user comment, GPS position) and everything else,
//! which is carried through unchanged when the block is written back.

use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::Path;

use encoding_rs::{Encoding, SHIFT_JIS, UTF_16BE, UTF_16LE};
use exif::experimental::Writer;
use exif::{Field, In, Rational, Reader, Tag, Value};
use img_parts::{Bytes, DynImage, ImageEXIF};
use tracing::{debug, info};

use crate::error::{PhotoError, Result};

const ASCII_PREFIX: &[u8; 8] = b"ASCII\0\0\0";
const JIS_PREFIX: &[u8; 8] = b"JIS\0\0\0\0\0";
const UNICODE_PREFIX: &[u8; 8] = b"UNICODE\0";

/// Tags describing the layout of the TIFF structure itself. The writer
/// synthesizes them, so they are never carried over.
const STRUCTURAL_TAGS: &[Tag] = &[
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
    Tag::StripOffsets,
    Tag::StripByteCounts,
    Tag::TileOffsets,
    Tag::TileByteCounts,
];

/// Degrees, minutes, seconds as (numerator, denominator) pairs.
pub type Dms = [(u32, u32); 3];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureInfo {
    pub date_time_original: Option<String>,
    pub date_time_digitized: Option<String>,
    /// Raw `UserComment` value including its 8-byte charset prefix.
    pub user_comment: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsCoordinate {
    pub dms: Dms,
    /// Hemisphere: "N"/"S" for latitude, "E"/"W" for longitude.
    pub reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpsInfo {
    pub latitude: Option<GpsCoordinate>,
    pub longitude: Option<GpsCoordinate>,
}

#[derive(Debug, Default)]
pub struct ExifMetadata {
    pub capture: CaptureInfo,
    pub gps: GpsInfo,
    /// Every field not modelled above, written back as-is.
    pub passthrough: Vec<Field>,
    /// Embedded JPEG thumbnail (IFD1), written back as-is.
    pub thumbnail: Option<Vec<u8>>,
    /// Byte order of the block the metadata was read from.
    pub little_endian: bool,
}

impl ExifMetadata {
    /// Read the EXIF block of `path`. A missing or corrupt block yields
    /// empty metadata instead of an error.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("{}", e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let unreadable = |reason: String| PhotoError::MetadataUnreadable {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
        let exif = Reader::new()
            .read_from_container(&mut BufReader::new(file))
            .map_err(|e| unreadable(e.to_string()))?;

        let mut metadata = ExifMetadata {
            little_endian: exif.little_endian(),
            ..Default::default()
        };

        let latitude = read_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef);
        let longitude = read_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef);
        let gps_captured = latitude.is_some() && longitude.is_some();
        if gps_captured {
            metadata.gps = GpsInfo { latitude, longitude };
        }

        for field in exif.fields() {
            if STRUCTURAL_TAGS.contains(&field.tag) {
                continue;
            }
            if field.ifd_num == In::PRIMARY {
                match (field.tag, &field.value) {
                    (Tag::DateTimeOriginal, Value::Ascii(parts)) => {
                        metadata.capture.date_time_original = first_ascii(parts);
                        continue;
                    }
                    (Tag::DateTimeDigitized, Value::Ascii(parts)) => {
                        metadata.capture.date_time_digitized = first_ascii(parts);
                        continue;
                    }
                    (Tag::UserComment, Value::Undefined(bytes, _)) => {
                        metadata.capture.user_comment = Some(bytes.clone());
                        continue;
                    }
                    (
                        Tag::GPSLatitude | Tag::GPSLatitudeRef | Tag::GPSLongitude | Tag::GPSLongitudeRef,
                        _,
                    ) if gps_captured => continue,
                    _ => {}
                }
            }
            metadata.passthrough.push(Field {
                tag: field.tag,
                ifd_num: field.ifd_num,
                value: field.value.clone(),
            });
        }

        metadata.thumbnail = read_thumbnail(&exif);
        Ok(metadata)
    }

    /// Decoded `UserComment`, if present and non-empty.
    pub fn comment(&self) -> Option<String> {
        let raw = self.capture.user_comment.as_deref()?;
        let text = decode_user_comment(raw, self.little_endian);
        let text = text.trim_end_matches(['\0', ' ']);
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    pub fn set_comment(&mut self, text: &str) {
        self.capture.user_comment = Some(encode_user_comment(text, self.little_endian));
    }

    /// Position in signed decimal degrees. Without a latitude there is no
    /// GPS data at all.
    pub fn gps(&self) -> Option<(f64, f64)> {
        let lat = self.gps.latitude.as_ref()?;
        let lon = self.gps.longitude.as_ref()?;
        Some((
            dms_to_decimal(&lat.dms, &lat.reference)?,
            dms_to_decimal(&lon.dms, &lon.reference)?,
        ))
    }

    /// Serialize the block and replace the one embedded in `path`.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let write_failed = |reason: String| PhotoError::MetadataWrite {
            path: path.to_path_buf(),
            reason,
        };

        let tiff = self.to_tiff().map_err(|e| write_failed(e.to_string()))?;

        let bytes = fs::read(path).map_err(|e| write_failed(e.to_string()))?;
        let mut image = DynImage::from_bytes(Bytes::from(bytes))
            .map_err(|e| write_failed(e.to_string()))?
            .ok_or_else(|| write_failed("unsupported container format".to_string()))?;
        image.set_exif(Some(Bytes::from(tiff)));
        let encoded = image.encoder().bytes();

        // Write next to the original, then swap, so a failed write never
        // leaves a truncated photo behind.
        let temp_path = path.with_extension("photodate.tmp");
        let result = fs::write(&temp_path, &encoded)
            .and_then(|_| fs::metadata(path))
            .and_then(|meta| fs::set_permissions(&temp_path, meta.permissions()))
            .and_then(|_| fs::rename(&temp_path, path));
        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(write_failed(e.to_string()));
        }

        info!("Successfully wrote metadata to [{}]", path.display());
        Ok(())
    }

    fn to_tiff(&self) -> std::result::Result<Vec<u8>, exif::Error> {
        let mut owned = Vec::new();
        let ascii = |tag: Tag, s: &str| Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![s.as_bytes().to_vec()]),
        };

        if let Some(s) = &self.capture.date_time_original {
            owned.push(ascii(Tag::DateTimeOriginal, s));
        }
        if let Some(s) = &self.capture.date_time_digitized {
            owned.push(ascii(Tag::DateTimeDigitized, s));
        }
        if let Some(bytes) = &self.capture.user_comment {
            owned.push(Field {
                tag: Tag::UserComment,
                ifd_num: In::PRIMARY,
                value: Value::Undefined(bytes.clone(), 0),
            });
        }
        for (coordinate, value_tag, ref_tag) in [
            (&self.gps.latitude, Tag::GPSLatitude, Tag::GPSLatitudeRef),
            (&self.gps.longitude, Tag::GPSLongitude, Tag::GPSLongitudeRef),
        ] {
            if let Some(c) = coordinate {
                owned.push(ascii(ref_tag, &c.reference));
                owned.push(Field {
                    tag: value_tag,
                    ifd_num: In::PRIMARY,
                    value: Value::Rational(
                        c.dms.iter().map(|&(num, denom)| Rational { num, denom }).collect(),
                    ),
                });
            }
        }

        let mut writer = Writer::new();
        for field in owned.iter().chain(self.passthrough.iter()) {
            writer.push_field(field);
        }
        if let Some(thumbnail) = &self.thumbnail {
            writer.set_jpeg(thumbnail, In::THUMBNAIL);
        }

        let mut out = Cursor::new(Vec::new());
        writer.write(&mut out, self.little_endian)?;
        Ok(out.into_inner())
    }
}

fn first_ascii(parts: &[Vec<u8>]) -> Option<String> {
    parts.first().map(|p| String::from_utf8_lossy(p).into_owned())
}

fn read_coordinate(exif: &exif::Exif, value_tag: Tag, ref_tag: Tag) -> Option<GpsCoordinate> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(values) = &field.value else {
        return None;
    };
    let [d, m, s] = values.as_slice() else {
        return None;
    };
    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Ascii(parts) => first_ascii(parts),
            _ => None,
        })
        .unwrap_or_default();
    Some(GpsCoordinate {
        dms: [(d.num, d.denom), (m.num, m.denom), (s.num, s.denom)],
        reference,
    })
}

fn read_thumbnail(exif: &exif::Exif) -> Option<Vec<u8>> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let length = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    exif.buf().get(offset..offset.checked_add(length)?).map(<[u8]>::to_vec)
}

/// Signed decimal degrees; southern and western hemispheres are negative.
pub fn dms_to_decimal(dms: &Dms, reference: &str) -> Option<f64> {
    let mut decimal = 0.0;
    for (&(num, denom), scale) in dms.iter().zip([1.0, 60.0, 3600.0]) {
        if denom == 0 {
            return None;
        }
        decimal += num as f64 / denom as f64 / scale;
    }
    if matches!(reference.trim(), "S" | "W") {
        decimal = -decimal;
    }
    Some(decimal)
}

fn decode_user_comment(raw: &[u8], little_endian: bool) -> String {
    if raw.len() < 8 {
        return String::from_utf8_lossy(raw).into_owned();
    }
    let (prefix, body) = raw.split_at(8);
    let encoding: &'static Encoding = if prefix == UNICODE_PREFIX {
        if little_endian {
            UTF_16LE
        } else {
            UTF_16BE
        }
    } else if prefix == JIS_PREFIX {
        SHIFT_JIS
    } else {
        if prefix != ASCII_PREFIX && prefix.iter().any(|&b| b != 0) {
            debug!("Unknown UserComment charset {:?}, reading as UTF-8", prefix);
        }
        return String::from_utf8_lossy(body).into_owned();
    };
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

fn encode_user_comment(text: &str, little_endian: bool) -> Vec<u8> {
    let mut bytes = UNICODE_PREFIX.to_vec();
    for unit in text.encode_utf16() {
        if little_endian {
            bytes.extend_from_slice(&unit.to_le_bytes());
        } else {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
    }
    bytes
}
