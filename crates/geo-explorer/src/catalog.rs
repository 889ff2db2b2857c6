//! Per-layer source locations, fixed at configuration time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::Layer;

/// Where a layer's data lives remotely and on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSource {
    /// Opaque asset identifier on the remote provider.
    pub asset_id: String,
    /// Local fallback GeoJSON file.
    pub local_path: PathBuf,
}

/// Mapping from every known layer to its sources.
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    sources: BTreeMap<Layer, LayerSource>,
}

impl LayerCatalog {
    /// Build a catalog. Layers missing from `sources` fall back to
    /// [`LayerCatalog::default_source`] under `data_dir`.
    pub fn new(data_dir: &Path, sources: impl IntoIterator<Item = (Layer, LayerSource)>) -> Self {
        let mut map: BTreeMap<Layer, LayerSource> = sources.into_iter().collect();
        for layer in Layer::ALL {
            map.entry(layer)
                .or_insert_with(|| Self::default_source(layer, data_dir));
        }
        Self { sources: map }
    }

    /// Catalog with the stock asset ids and file names under `data_dir`.
    pub fn with_defaults(data_dir: &Path) -> Self {
        Self::new(data_dir, std::iter::empty())
    }

    /// Stock sources for a layer.
    pub fn default_source(layer: Layer, data_dir: &Path) -> LayerSource {
        let (asset, file) = match layer {
            Layer::Counties => ("projects/ee-celestakim019/assets/counties", "gadm41_KEN_3.json"),
            Layer::Constituency => (
                "projects/ee-celestakim019/assets/Constituency",
                "Constituency.geojson",
            ),
            Layer::Kenya => ("projects/ee-celestakim019/assets/KENYA", "Kenya.geojson"),
        };
        LayerSource {
            asset_id: asset.to_string(),
            local_path: data_dir.join(file),
        }
    }

    /// Sources for a layer. Every layer is always present.
    pub fn source(&self, layer: Layer) -> &LayerSource {
        // `new` fills every layer, so indexing cannot miss.
        &self.sources[&layer]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Layer, &LayerSource)> {
        self.sources.iter().map(|(layer, source)| (*layer, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_layer() {
        let catalog = LayerCatalog::with_defaults(Path::new("static/data"));
        assert_eq!(catalog.iter().count(), Layer::ALL.len());
        assert_eq!(
            catalog.source(Layer::Counties).local_path,
            PathBuf::from("static/data/gadm41_KEN_3.json")
        );
    }

    #[test]
    fn test_override_keeps_other_defaults() {
        let custom = LayerSource {
            asset_id: "users/me/wards".into(),
            local_path: PathBuf::from("/srv/wards.geojson"),
        };
        let catalog = LayerCatalog::new(
            Path::new("/data"),
            [(Layer::Constituency, custom.clone())],
        );
        assert_eq!(catalog.source(Layer::Constituency), &custom);
        assert_eq!(
            catalog.source(Layer::Kenya).local_path,
            PathBuf::from("/data/Kenya.geojson")
        );
    }
}
