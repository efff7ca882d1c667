//! Mapping between content formats and file extensions.
//!
//! Extension choice has to be deterministic so that saving an item and
//! scanning the directory again reconstructs the same formats. Users can
//! override the built-in table, e.g. to load `.md` files as a custom format.
//!
//! # Lookup order
//!
//! - by file name: user overrides, then the built-in table
//! - by format: the extension already recorded on the item, then user
//!   overrides, then the built-in table

use serde::{Deserialize, Serialize};

use crate::model::{ExtensionMap, FORMAT_HTML, FORMAT_NOTES, FORMAT_TEXT, FORMAT_URI_LIST};
use crate::sync::types::Ext;

/// Suffix of the blob file holding formats without a dedicated extension.
pub const AUX_SUFFIX: &str = "_copyq.dat";

/// User format meaning "recognize these files but never import them".
pub const NO_IMPORT_FORMAT: &str = "-";

/// Built-in (extension, format) pairs, most specific suffixes first.
const BUILTIN_FORMATS: &[(&str, &str)] = &[
    ("_note.txt", FORMAT_NOTES),
    (".bmp", "image/bmp"),
    (".gif", "image/gif"),
    (".html", FORMAT_HTML),
    ("_inkscape.svg", "image/x-inkscape-svg-compressed"),
    (".jpg", "image/jpeg"),
    (".png", "image/png"),
    (".txt", FORMAT_TEXT),
    (".uri", FORMAT_URI_LIST),
    (".xml", "application/xml"),
    ("_xml.svg", "image/svg+xml"),
    (".xml", "text/xml"),
    (AUX_SUFFIX, ""),
];

/// User-defined mapping of file extensions to a content format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFormat {
    /// Extensions (suffixes) this entry matches.
    pub extensions: Vec<String>,
    /// Format the files are loaded as; empty means "no content",
    /// [`NO_IMPORT_FORMAT`] means "skip".
    #[serde(default)]
    pub item_format: String,
    /// Icon shown for matching items.
    #[serde(default)]
    pub icon: String,
}

impl FileFormat {
    #[must_use]
    pub fn new<I, S>(extensions: I, item_format: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            item_format: item_format.into(),
            icon: String::new(),
        }
    }

    /// Split a user-entered extension list on commas, semicolons and whitespace.
    #[must_use]
    pub fn parse_extensions(list: &str) -> Vec<String> {
        list.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|ext| !ext.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Make every extension start with a dot.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for ext in &mut self.extensions {
            if !ext.starts_with('.') {
                ext.insert(0, '.');
            }
        }
        self
    }

    fn is_importable(&self) -> bool {
        !self.item_format.is_empty() && self.item_format != NO_IMPORT_FORMAT
    }
}

/// Iterate over the built-in table.
pub fn builtin_formats() -> impl Iterator<Item = Ext> {
    BUILTIN_FORMATS
        .iter()
        .map(|(extension, format)| Ext::new(*extension, *format))
}

/// First built-in entry whose extension suffixes `file_name`.
#[must_use]
pub fn builtin_by_extension(file_name: &str) -> Option<Ext> {
    BUILTIN_FORMATS
        .iter()
        .find(|(extension, _)| file_name.ends_with(extension))
        .map(|(extension, format)| Ext::new(*extension, *format))
}

/// First built-in extension storing `format`.
#[must_use]
pub fn builtin_by_format(format: &str) -> Option<&'static str> {
    if format.is_empty() {
        return None;
    }
    BUILTIN_FORMATS
        .iter()
        .find(|(_, f)| *f == format)
        .map(|(extension, _)| *extension)
}

/// Resolves formats and extensions using the built-in table and user overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatResolver {
    user: Vec<FileFormat>,
}

impl FormatResolver {
    /// Create a resolver; extensions are normalized and empty entries dropped.
    #[must_use]
    pub fn new(user: Vec<FileFormat>) -> Self {
        let user = user
            .into_iter()
            .filter(|f| !f.extensions.is_empty())
            .map(FileFormat::normalized)
            .collect();
        Self { user }
    }

    /// User overrides, normalized.
    #[must_use]
    pub fn user_formats(&self) -> &[FileFormat] {
        &self.user
    }

    /// User override matching the end of `file_name`, with the matched extension.
    #[must_use]
    pub fn user_format_for(&self, file_name: &str) -> Option<(&FileFormat, &str)> {
        self.user.iter().find_map(|format| {
            format
                .extensions
                .iter()
                .find(|ext| file_name.ends_with(ext.as_str()))
                .map(|ext| (format, ext.as_str()))
        })
    }

    /// Resolve the extension and format of a file.
    ///
    /// Returns `None` for files that must not become (part of) an item: no
    /// match at all, or a user override mapping to [`NO_IMPORT_FORMAT`].
    #[must_use]
    pub fn by_extension(&self, file_name: &str) -> Option<Ext> {
        if let Some((format, ext)) = self.user_format_for(file_name) {
            if format.item_format == NO_IMPORT_FORMAT {
                return None;
            }
            if format.item_format.is_empty() {
                return builtin_by_extension(file_name).or_else(|| Some(Ext::new(ext, "")));
            }
            return Some(Ext::new(ext, format.item_format.clone()));
        }

        builtin_by_extension(file_name)
    }

    /// Resolve the extension a format is saved with.
    ///
    /// `recorded` is the item's current extension map; an extension already
    /// recorded there wins so renames never silently change the mapping.
    #[must_use]
    pub fn by_format(&self, format: &str, recorded: &ExtensionMap) -> Option<String> {
        if let Some(ext) = recorded.get(format) {
            return Some(ext.clone());
        }

        self.user
            .iter()
            .filter(|f| f.is_importable() && f.item_format == format)
            .find_map(|f| f.extensions.first().cloned())
            .or_else(|| builtin_by_format(format).map(ToString::to_string))
    }
}

/// Icon category shown next to a synchronized item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IconHint {
    /// Icon configured for a user extension.
    Custom(String),
    Video,
    Audio,
    Image,
    Archive,
    Text,
    File,
}

/// Icon implied by a content format, if any.
#[must_use]
pub fn icon_for_format(format: &str) -> Option<IconHint> {
    if format.starts_with("video/") {
        Some(IconHint::Video)
    } else if format.starts_with("audio/") {
        Some(IconHint::Audio)
    } else if format.starts_with("image/") {
        Some(IconHint::Image)
    } else if format.starts_with("text/") {
        Some(IconHint::Text)
    } else {
        None
    }
}

/// Icon implied by a file name: user override icon, else the extension category.
#[must_use]
pub fn icon_for_file_name(file_name: &str, resolver: &FormatResolver) -> Option<IconHint> {
    if let Some((format, _)) = resolver.user_format_for(file_name) {
        if !format.icon.is_empty() {
            return Some(IconHint::Custom(format.icon.clone()));
        }
    }

    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let ext = ext.as_str();
    match ext {
        "avi" | "mkv" | "mp4" | "mpg" | "mpeg" | "ogv" | "flv" => Some(IconHint::Video),
        "mp3" | "wav" | "ogg" | "m4a" => Some(IconHint::Audio),
        "png" | "jpg" | "gif" | "bmp" | "svg" | "tga" | "tiff" | "psd" | "xcf" | "ico"
        | "pbm" | "ppm" | "eps" | "pcx" | "jpx" | "jp2" => Some(IconHint::Image),
        "zip" | "7z" | "tar" | "rar" | "arj" => Some(IconHint::Archive),
        _ if is_split_archive(ext) => Some(IconHint::Archive),
        "txt" | "log" | "xml" | "html" | "htm" | "pdf" | "doc" | "docx" | "odt" | "xls"
        | "rtf" | "csv" | "ppt" => Some(IconHint::Text),
        _ => None,
    }
}

/// `r00`, `r01`, ... volumes of a split archive.
fn is_split_archive(ext: &str) -> bool {
    let bytes = ext.as_bytes();
    bytes.len() == 3 && bytes[0] == b'r' && bytes[1..].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markdown_resolver() -> FormatResolver {
        FormatResolver::new(vec![
            FileFormat::new(["md", ".markdown"], "text/markdown"),
            FileFormat::new([".log"], NO_IMPORT_FORMAT),
            FileFormat::new([".mp3"], ""),
        ])
    }

    #[test]
    fn test_parse_extensions() {
        assert_eq!(
            FileFormat::parse_extensions(".md, .markdown;txt  rst"),
            vec![".md", ".markdown", "txt", "rst"]
        );
    }

    #[test]
    fn test_user_extensions_normalized() {
        let resolver = markdown_resolver();
        assert_eq!(
            resolver.user_formats()[0].extensions,
            vec![".md".to_string(), ".markdown".to_string()]
        );
    }

    #[test]
    fn test_specific_suffix_before_generic() {
        let ext = builtin_by_extension("item_note.txt").unwrap();
        assert_eq!(ext.extension, "_note.txt");
        assert_eq!(ext.format, FORMAT_NOTES);

        let ext = builtin_by_extension("item.txt").unwrap();
        assert_eq!(ext.extension, ".txt");
        assert_eq!(ext.format, FORMAT_TEXT);
    }

    #[test]
    fn test_user_override_checked_first() {
        let resolver = markdown_resolver();
        let ext = resolver.by_extension("readme.md").unwrap();
        assert_eq!(ext, Ext::new(".md", "text/markdown"));
    }

    #[test]
    fn test_no_import_marker_skips_file() {
        let resolver = markdown_resolver();
        assert!(resolver.by_extension("server.log").is_none());
    }

    #[test]
    fn test_user_extension_without_format_is_contentless() {
        let resolver = markdown_resolver();
        assert_eq!(resolver.by_extension("song.mp3"), Some(Ext::new(".mp3", "")));
    }

    #[test]
    fn test_unknown_extension_not_resolved() {
        assert!(FormatResolver::default().by_extension("archive.zip").is_none());
    }

    #[test]
    fn test_aux_blob_resolved() {
        let ext = FormatResolver::default()
            .by_extension("item_copyq.dat")
            .unwrap();
        assert_eq!(ext.extension, AUX_SUFFIX);
        assert!(ext.format.is_empty());
    }

    #[test]
    fn test_by_format_prefers_recorded() {
        let resolver = FormatResolver::default();
        let mut recorded = ExtensionMap::new();
        recorded.insert(FORMAT_TEXT.into(), "_custom.txt".into());

        assert_eq!(
            resolver.by_format(FORMAT_TEXT, &recorded).as_deref(),
            Some("_custom.txt")
        );
        assert_eq!(
            resolver.by_format(FORMAT_TEXT, &ExtensionMap::new()).as_deref(),
            Some(".txt")
        );
    }

    #[test]
    fn test_by_format_prefers_user_over_builtin() {
        let resolver = FormatResolver::new(vec![FileFormat::new([".text"], FORMAT_TEXT)]);
        assert_eq!(
            resolver.by_format(FORMAT_TEXT, &ExtensionMap::new()).as_deref(),
            Some(".text")
        );
    }

    #[test]
    fn test_by_format_unknown() {
        let resolver = markdown_resolver();
        assert!(
            resolver
                .by_format("application/x-unknown", &ExtensionMap::new())
                .is_none()
        );
        assert_eq!(
            resolver
                .by_format("text/markdown", &ExtensionMap::new())
                .as_deref(),
            Some(".md")
        );
    }

    #[test]
    fn test_icons() {
        let mut resolver = markdown_resolver();
        resolver.user[0].icon = "M".into();

        assert_eq!(
            icon_for_file_name("notes.md", &resolver),
            Some(IconHint::Custom("M".into()))
        );
        assert_eq!(icon_for_file_name("clip.MP4", &resolver), Some(IconHint::Video));
        assert_eq!(icon_for_file_name("a.r01", &resolver), Some(IconHint::Archive));
        assert_eq!(icon_for_file_name("noext", &resolver), None);
        assert_eq!(icon_for_format("image/png"), Some(IconHint::Image));
        assert_eq!(icon_for_format("application/json"), None);
    }
}
