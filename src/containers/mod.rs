//! Container-specific decoders
//!
//! Each container format (TIFF, JPEG, XMP, CR3, RAF) has a decoder that knows
//! how to walk that byte structure. The RAW decoders hand the TIFF and JPEG
//! blocks they find to [`tiff::TiffDecoder`] and [`jpeg_io::JpegDecoder`]
//! instead of parsing them again.

use crate::{error::Result, metadata::Metadata, updates::ExtractOptions};

/// Container format, i.e. how a file is laid out in bytes
///
/// Several camera formats share a container: NEF, ARW, DNG, ORF and RW2 are
/// all [`ContainerKind::Tiff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Fujifilm RAF
    Fuji,
    /// Canon CR3 (ISO-BMFF)
    Cr3,
    /// TIFF and the TIFF-based RAW formats
    Tiff,
    /// JPEG with APP1 EXIF/XMP segments
    Jpeg,
    /// Bare XMP packet
    Xmp,
}

/// Decoder for one container format
pub trait ContainerIO<'a> {
    /// ContainerKind this decoder handles
    fn container_type() -> ContainerKind
    where
        Self: Sized;

    /// File extensions this decoder accepts (e.g., ["jpg", "jpeg"])
    fn extensions() -> &'static [&'static str]
    where
        Self: Sized;

    /// MIME types this decoder accepts
    fn mime_types() -> &'static [&'static str]
    where
        Self: Sized;

    /// Returns Some(ContainerKind) if `header` looks like this container
    fn detect(header: &[u8]) -> Option<ContainerKind>
    where
        Self: Sized;

    /// Creates a decoder; nothing is read until the first extraction
    fn with_options(bytes: &'a [u8], options: ExtractOptions) -> Self
    where
        Self: Sized;

    /// Flat tag map of everything the container carries
    fn extract_metadata(&self) -> Result<Metadata>;

    /// The best embedded preview as a standalone JPEG
    fn extract_jpeg(&self) -> Result<Vec<u8>>;
}

pub mod cr3_io;
pub mod fuji_io;
pub mod jpeg_io;
pub mod tiff;
pub mod xmp_io;

/// Register all supported container formats in one place
///
/// This macro generates:
/// - Decoder enum (zero-cost dispatch)
/// - detect() in registration order
/// - Extension and MIME type lookup
/// - ContainerKind methods for MIME types and extensions
macro_rules! register_containers {
    ($(
        $variant:ident => $module:ident :: $io:ident
    ),* $(,)?) => {
        /// A decoder for any supported container
        #[derive(Debug)]
        pub enum Decoder<'a> {
            $(
                $variant($module::$io<'a>),
            )*
        }

        impl<'a> Decoder<'a> {
            /// Detects the container of `bytes` and creates its decoder
            pub fn new(bytes: &'a [u8], options: ExtractOptions) -> $crate::Result<Self> {
                Ok(Self::for_kind(detect(bytes)?, bytes, options))
            }

            pub fn for_kind(kind: ContainerKind, bytes: &'a [u8], options: ExtractOptions) -> Self {
                match kind {
                    $(
                        ContainerKind::$variant => Decoder::$variant(
                            <$module::$io<'a> as ContainerIO<'a>>::with_options(bytes, options),
                        ),
                    )*
                }
            }

            pub fn container_type(&self) -> ContainerKind {
                match self {
                    $(
                        Decoder::$variant(_) => ContainerKind::$variant,
                    )*
                }
            }

            pub fn extract_metadata(&self) -> $crate::Result<Metadata> {
                match self {
                    $(
                        Decoder::$variant(d) => ContainerIO::extract_metadata(d),
                    )*
                }
            }

            pub fn extract_jpeg(&self) -> $crate::Result<Vec<u8>> {
                match self {
                    $(
                        Decoder::$variant(d) => ContainerIO::extract_jpeg(d),
                    )*
                }
            }
        }

        /// Detect container from the leading bytes
        ///
        /// Sniffers run in registration order and the first match wins.
        pub fn detect(bytes: &[u8]) -> $crate::Result<ContainerKind> {
            $(
                if let Some(container) = <$module::$io<'_> as ContainerIO<'_>>::detect(bytes) {
                    log::debug!("detected {container:?} container");
                    return Ok(container);
                }
            )*
            let head = &bytes[..bytes.len().min(8)];
            Err($crate::Error::UnrecognizedContainer(format!(
                "no decoder recognized leading bytes {}",
                hex::encode(head)
            )))
        }

        /// Detect container from file extension
        pub fn detect_from_extension(ext: &str) -> Option<ContainerKind> {
            let ext_lower = ext.trim_start_matches('.').to_lowercase();
            $(
                if <$module::$io<'_> as ContainerIO<'_>>::extensions().contains(&ext_lower.as_str()) {
                    return Some(<$module::$io<'_> as ContainerIO<'_>>::container_type());
                }
            )*
            None
        }

        /// Detect container from MIME type
        pub fn detect_from_mime(mime: &str) -> Option<ContainerKind> {
            $(
                if <$module::$io<'_> as ContainerIO<'_>>::mime_types().iter().any(|m| m.eq_ignore_ascii_case(mime)) {
                    return Some(<$module::$io<'_> as ContainerIO<'_>>::container_type());
                }
            )*
            None
        }

        impl ContainerKind {
            /// Primary MIME type for this container
            pub fn to_mime(&self) -> &'static str {
                self.mime_types()[0]
            }

            /// Primary file extension, without the dot
            pub fn to_extension(&self) -> &'static str {
                self.extensions()[0]
            }

            pub fn mime_types(&self) -> &'static [&'static str] {
                match self {
                    $(
                        ContainerKind::$variant => <$module::$io<'_> as ContainerIO<'_>>::mime_types(),
                    )*
                }
            }

            pub fn extensions(&self) -> &'static [&'static str] {
                match self {
                    $(
                        ContainerKind::$variant => <$module::$io<'_> as ContainerIO<'_>>::extensions(),
                    )*
                }
            }
        }

        impl std::fmt::Display for ContainerKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_mime())
            }
        }
    };
}

// Registration order is detection priority: the vendor magics are checked
// before the generic TIFF header, and XMP last.
register_containers! {
    Fuji => fuji_io::FujiDecoder,
    Cr3 => cr3_io::Cr3Decoder,
    Tiff => tiff::TiffDecoder,
    Jpeg => jpeg_io::JpegDecoder,
    Xmp => xmp_io::XmpDecoder,
}
