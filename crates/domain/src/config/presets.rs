use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::Preset;

/// The preset catalogue: a small integer index to (venue, field type),
/// seeded from configuration. Immutable at runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetsConfig {
    #[serde(flatten)]
    pub presets: HashMap<i64, Preset>,
}

impl PresetsConfig {
    pub fn get(&self, index: i64) -> Option<&Preset> {
        self.presets.get(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalogue_has_no_presets() {
        assert!(PresetsConfig::default().get(13).is_none());
    }

    #[test]
    fn deserializes_indexed_map() {
        let json = r#"{"13": {"index": 13, "venue_id": "v1", "venue_name": "南洋北苑健身房", "field_type_id": "f1", "field_type_name": "篮球场"}}"#;
        let cfg: PresetsConfig = serde_json::from_str(json).unwrap();
        let preset = cfg.get(13).unwrap();
        assert_eq!(preset.venue_name, "南洋北苑健身房");
    }
}
