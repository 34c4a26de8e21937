// Item data payloads
//
// Only the fields needed to find service URLs are modelled; everything else in the
// item JSON is ignored.

use serde::Deserialize;

/// Web map / web scene definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebMapData {
    #[serde(default)]
    pub base_map: Option<BaseMap>,
    #[serde(default)]
    pub operational_layers: Vec<LayerReference>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseMap {
    /// Web scenes name this list `baseLayers`
    #[serde(default, alias = "baseLayers")]
    pub base_map_layers: Vec<LayerReference>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerReference {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Children of a group layer
    #[serde(default)]
    pub layers: Vec<LayerReference>,
}

impl LayerReference {
    pub fn service_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn layer_item_id(&self) -> Option<&str> {
        self.item_id.as_deref().filter(|id| !id.is_empty())
    }
}

impl WebMapData {
    /// Base-map layers followed by operational layers, group layers flattened
    pub fn layers(&self) -> Vec<&LayerReference> {
        let mut out = Vec::new();
        if let Some(base_map) = &self.base_map {
            for layer in &base_map.base_map_layers {
                flatten(layer, &mut out);
            }
        }
        for layer in &self.operational_layers {
            flatten(layer, &mut out);
        }
        out
    }
}

fn flatten<'a>(layer: &'a LayerReference, out: &mut Vec<&'a LayerReference>) {
    out.push(layer);
    for child in &layer.layers {
        flatten(child, out);
    }
}

/// Web mapping application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub values: AppValues,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppValues {
    #[serde(default)]
    pub webmap: Option<String>,
    #[serde(default)]
    pub webscene: Option<String>,
    #[serde(default)]
    pub story: Option<StoryData>,
}

impl AppValues {
    /// The web map or web scene the app is built on
    pub fn map_id(&self) -> Option<&str> {
        self.webmap
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.webscene.as_deref().filter(|id| !id.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoryData {
    #[serde(default)]
    pub sections: Option<Vec<StorySection>>,
    #[serde(default)]
    pub entries: Option<Vec<StorySection>>,
}

impl StoryData {
    /// Sections for section-based stories, entries for tabbed ones
    pub fn sections(&self) -> Option<&[StorySection]> {
        self.sections
            .as_deref()
            .or(self.entries.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorySection {
    #[serde(default)]
    pub media: StoryMedia,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoryMedia {
    #[serde(rename = "type", default)]
    pub media_type: String,
    #[serde(default)]
    pub webmap: Option<StoryWebMap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoryWebMap {
    #[serde(default)]
    pub id: String,
}

impl StorySection {
    /// Web map id when this section displays a web map
    pub fn webmap_id(&self) -> Option<&str> {
        if self.media.media_type != "webmap" {
            return None;
        }
        self.media
            .webmap
            .as_ref()
            .map(|w| w.id.as_str())
            .filter(|id| !id.is_empty())
    }
}
