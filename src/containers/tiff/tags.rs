//! TIFF/EXIF tag names
//!
//! Friendly names follow the TIFF 6, EXIF 2.3 and DNG conventions. They are
//! the keys of every metadata map produced by this crate.

/// Tag ids referenced directly by the decoders
pub mod codes {
    pub const NEW_SUBFILE_TYPE: u16 = 0x00FE;
    pub const IMAGE_WIDTH: u16 = 0x0100;
    pub const IMAGE_LENGTH: u16 = 0x0101;
    pub const COMPRESSION: u16 = 0x0103;
    pub const STRIP_OFFSETS: u16 = 0x0111;
    pub const ROWS_PER_STRIP: u16 = 0x0116;
    pub const STRIP_BYTE_COUNTS: u16 = 0x0117;
    pub const SUB_IFD: u16 = 0x014A;
    pub const THUMBNAIL_OFFSET: u16 = 0x0201;
    pub const THUMBNAIL_LENGTH: u16 = 0x0202;
    pub const EXIF_OFFSET: u16 = 0x8769;
    pub const GPS_INFO: u16 = 0x8825;
    pub const MAKER_NOTE: u16 = 0x927C;

    // Panasonic RW2 IFD0
    pub const PANASONIC_JPG_FROM_RAW: u16 = 0x002E;
    pub const PANASONIC_JPEG_END: u16 = 0x0118;

    // Olympus camera settings
    pub const OLYMPUS_PREVIEW_START: u16 = 0x0101;
    pub const OLYMPUS_PREVIEW_LENGTH: u16 = 0x0102;
}

macro_rules! define_tags {
    ($($code:literal => $name:ident),* $(,)?) => {
        /// Friendly name of a standard tag
        pub fn name_of(code: u16) -> Option<&'static str> {
            match code {
                $($code => Some(stringify!($name)),)*
                _ => None,
            }
        }

        /// Tag id for a friendly name
        pub fn code_of(name: &str) -> Option<u16> {
            match name {
                $(stringify!($name) => Some($code),)*
                _ => None,
            }
        }
    };
}

define_tags!(
    0x00FE => NewSubfileType,
    0x00FF => SubfileType,
    0x0100 => ImageWidth,
    0x0101 => ImageLength,
    0x0102 => BitsPerSample,
    0x0103 => Compression,
    0x0106 => PhotometricInterpretation,
    0x0107 => Thresholding,
    0x010A => FillOrder,
    0x010D => DocumentName,
    0x010E => ImageDescription,
    0x010F => Make,
    0x0110 => Model,
    0x0111 => StripOffsets,
    0x0112 => Orientation,
    0x0115 => SamplesPerPixel,
    0x0116 => RowsPerStrip,
    0x0117 => StripByteCounts,
    0x0118 => MinSampleValue,
    0x0119 => MaxSampleValue,
    0x011A => XResolution,
    0x011B => YResolution,
    0x011C => PlanarConfiguration,
    0x011D => PageName,
    0x0128 => ResolutionUnit,
    0x0129 => PageNumber,
    0x012D => TransferFunction,
    0x0131 => Software,
    0x0132 => ModifyDate,
    0x013B => Artist,
    0x013C => HostComputer,
    0x013D => Predictor,
    0x013E => WhitePoint,
    0x013F => PrimaryChromaticities,
    0x0142 => TileWidth,
    0x0143 => TileLength,
    0x0144 => TileOffsets,
    0x0145 => TileByteCounts,
    0x014A => SubIFD,
    0x0152 => ExtraSamples,
    0x0153 => SampleFormat,
    0x0201 => ThumbnailOffset,
    0x0202 => ThumbnailLength,
    0x0211 => YCbCrCoefficients,
    0x0212 => YCbCrSubSampling,
    0x0213 => YCbCrPositioning,
    0x0214 => ReferenceBlackWhite,
    0x02BC => ApplicationNotes,
    0x828D => CFARepeatPatternDim,
    0x828E => CFAPattern2,
    0x8298 => Copyright,
    0x829A => ExposureTime,
    0x829D => FNumber,
    0x8769 => ExifOffset,
    0x8773 => ICCProfile,
    0x8822 => ExposureProgram,
    0x8824 => SpectralSensitivity,
    0x8825 => GPSInfo,
    0x8827 => ISO,
    0x8830 => SensitivityType,
    0x8832 => RecommendedExposureIndex,
    0x9000 => ExifVersion,
    0x9003 => DateTimeOriginal,
    0x9004 => CreateDate,
    0x9010 => OffsetTime,
    0x9011 => OffsetTimeOriginal,
    0x9012 => OffsetTimeDigitized,
    0x9101 => ComponentsConfiguration,
    0x9102 => CompressedBitsPerPixel,
    0x9201 => ShutterSpeedValue,
    0x9202 => ApertureValue,
    0x9203 => BrightnessValue,
    0x9204 => ExposureCompensation,
    0x9205 => MaxApertureValue,
    0x9206 => SubjectDistance,
    0x9207 => MeteringMode,
    0x9208 => LightSource,
    0x9209 => Flash,
    0x920A => FocalLength,
    0x9214 => SubjectArea,
    0x927C => MakerNote,
    0x9286 => UserComment,
    0x9290 => SubSecTime,
    0x9291 => SubSecTimeOriginal,
    0x9292 => SubSecTimeDigitized,
    0xA000 => FlashpixVersion,
    0xA001 => ColorSpace,
    0xA002 => ExifImageWidth,
    0xA003 => ExifImageHeight,
    0xA004 => RelatedSoundFile,
    0xA005 => InteropOffset,
    0xA20E => FocalPlaneXResolution,
    0xA20F => FocalPlaneYResolution,
    0xA210 => FocalPlaneResolutionUnit,
    0xA215 => ExposureIndex,
    0xA217 => SensingMethod,
    0xA300 => FileSource,
    0xA301 => SceneType,
    0xA302 => CFAPattern,
    0xA401 => CustomRendered,
    0xA402 => ExposureMode,
    0xA403 => WhiteBalance,
    0xA404 => DigitalZoomRatio,
    0xA405 => FocalLengthIn35mmFormat,
    0xA406 => SceneCaptureType,
    0xA407 => GainControl,
    0xA408 => Contrast,
    0xA409 => Saturation,
    0xA40A => Sharpness,
    0xA40C => SubjectDistanceRange,
    0xA420 => ImageUniqueID,
    0xA430 => OwnerName,
    0xA431 => SerialNumber,
    0xA432 => LensInfo,
    0xA433 => LensMake,
    0xA434 => LensModel,
    0xA435 => LensSerialNumber,
    0xC612 => DNGVersion,
    0xC613 => DNGBackwardVersion,
    0xC614 => UniqueCameraModel,
    0xC61A => BlackLevel,
    0xC61D => WhiteLevel,
    0xC621 => ColorMatrix1,
    0xC622 => ColorMatrix2,
    0xC628 => AsShotNeutral,
    0xC65A => CalibrationIlluminant1,
    0xC65B => CalibrationIlluminant2,
);

/// Panasonic RW2 meanings for ids that are reused or unnamed in standard TIFF
pub const PANASONIC_ALIASES: &[(u16, &str)] = &[
    (0x0001, "PanasonicRawVersion"),
    (0x0002, "SensorWidth"),
    (0x0003, "SensorHeight"),
    (0x0017, "ISO"),
    (codes::PANASONIC_JPG_FROM_RAW, "JpgFromRaw"),
    (codes::PANASONIC_JPEG_END, "PanasonicJPEGEnd"),
];

pub fn panasonic_alias(code: u16) -> Option<&'static str> {
    PANASONIC_ALIASES
        .iter()
        .find(|(alias_code, _)| *alias_code == code)
        .map(|(_, name)| *name)
}
