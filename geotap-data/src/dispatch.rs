//! Routing of source files to record producers by extension.

use geotap_core::record::base_name;

/// Extensions of the files making up one ESRI shapefile, primary first.
pub const SHAPEFILE_COMPONENTS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

/// Parsing family of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// OpenStreetMap XML (`.osm`).
    OsmXml,
    /// OpenStreetMap protocol buffers (`.pbf`).
    OsmPbf,
    /// Anything read through a vector driver.
    Vector,
}

impl SourceFormat {
    /// Classify `path` by its extension, ignoring case.
    ///
    /// # Examples
    /// ```
    /// use geotap_data::SourceFormat;
    ///
    /// assert_eq!(SourceFormat::from_path("s3://b/city.osm.PBF"), SourceFormat::OsmPbf);
    /// assert_eq!(SourceFormat::from_path("roads.shp"), SourceFormat::Vector);
    /// ```
    pub fn from_path(path: &str) -> Self {
        match extension(path).map(str::to_ascii_lowercase).as_deref() {
            Some("osm") => Self::OsmXml,
            Some("pbf") => Self::OsmPbf,
            _ => Self::Vector,
        }
    }

    /// Whether records from this format carry OSM identity slots.
    pub const fn is_osm(self) -> bool {
        matches!(self, Self::OsmXml | Self::OsmPbf)
    }
}

/// Extension of the final path segment, without the dot.
pub(crate) fn extension(path: &str) -> Option<&str> {
    let name = base_name(path);
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Replace the extension of `path` with `component`, following the case of
/// the original extension.
pub(crate) fn sibling_path(path: &str, component: &str) -> String {
    let Some(ext) = extension(path) else {
        return format!("{path}.{component}");
    };
    let is_upper = ext.chars().all(|ch| !ch.is_ascii_lowercase());
    if is_upper {
        with_extension(path, &component.to_ascii_uppercase())
    } else {
        with_extension(path, component)
    }
}

/// Remote names that may hold the `component` sibling of `path`.
///
/// The variant matching the primary's case comes first, then the lower- and
/// upper-case spellings.
pub(crate) fn sibling_candidates(path: &str, component: &str) -> Vec<String> {
    let mut candidates = vec![sibling_path(path, component)];
    for spelling in [
        component.to_ascii_lowercase(),
        component.to_ascii_uppercase(),
    ] {
        let candidate = with_extension(path, &spelling);
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Base name of `path` without its extension.
pub(crate) fn file_stem(path: &str) -> &str {
    let name = base_name(path);
    match extension(path) {
        Some(ext) => name
            .strip_suffix(ext)
            .and_then(|stem| stem.strip_suffix('.'))
            .unwrap_or(name),
        None => name,
    }
}

fn with_extension(path: &str, ext: &str) -> String {
    match extension(path) {
        Some(current) => format!("{}{ext}", path.strip_suffix(current).unwrap_or(path)),
        None => format!("{path}.{ext}"),
    }
}
