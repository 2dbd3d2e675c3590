use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_PROPERTY_KEY: &str = "title";

/// A host UI location where display names replace file names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Surface {
    Tabs,
    Explorer,
    Graph,
    Backlinks,
    WindowTitle,
    LinkInsertion,
    QuickSwitcher,
    Bookmarks,
}

impl Surface {
    pub const ALL: [Surface; 8] = [
        Surface::Tabs,
        Surface::Explorer,
        Surface::Graph,
        Surface::Backlinks,
        Surface::WindowTitle,
        Surface::LinkInsertion,
        Surface::QuickSwitcher,
        Surface::Bookmarks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Surface::Tabs => "tabs",
            Surface::Explorer => "explorer",
            Surface::Graph => "graph",
            Surface::Backlinks => "backlinks",
            Surface::WindowTitle => "window_title",
            Surface::LinkInsertion => "link_insertion",
            Surface::QuickSwitcher => "quick_switcher",
            Surface::Bookmarks => "bookmarks",
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceFlags {
    pub tabs: bool,
    pub explorer: bool,
    pub graph: bool,
    pub backlinks: bool,
    pub window_title: bool,
    pub link_insertion: bool,
    pub quick_switcher: bool,
    pub bookmarks: bool,
}

impl Default for SurfaceFlags {
    fn default() -> Self {
        Self {
            tabs: true,
            explorer: true,
            graph: true,
            backlinks: true,
            window_title: true,
            link_insertion: true,
            quick_switcher: true,
            bookmarks: true,
        }
    }
}

impl SurfaceFlags {
    pub fn get(&self, surface: Surface) -> bool {
        match surface {
            Surface::Tabs => self.tabs,
            Surface::Explorer => self.explorer,
            Surface::Graph => self.graph,
            Surface::Backlinks => self.backlinks,
            Surface::WindowTitle => self.window_title,
            Surface::LinkInsertion => self.link_insertion,
            Surface::QuickSwitcher => self.quick_switcher,
            Surface::Bookmarks => self.bookmarks,
        }
    }

    pub fn set(&mut self, surface: Surface, enabled: bool) {
        let flag = match surface {
            Surface::Tabs => &mut self.tabs,
            Surface::Explorer => &mut self.explorer,
            Surface::Graph => &mut self.graph,
            Surface::Backlinks => &mut self.backlinks,
            Surface::WindowTitle => &mut self.window_title,
            Surface::LinkInsertion => &mut self.link_insertion,
            Surface::QuickSwitcher => &mut self.quick_switcher,
            Surface::Bookmarks => &mut self.bookmarks,
        };
        *flag = enabled;
    }
}

/// Process-wide configuration, persisted as a JSON blob by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Frontmatter property supplying the display name.
    pub property_key: String,
    pub surfaces: SurfaceFlags,
    pub include_filename_in_search: bool,
    pub include_aliases_in_search: bool,
    pub use_simple_search: bool,
    /// Folder note file name; `{{folder}}` expands to the folder's name.
    /// Empty disables folder titles.
    pub folder_note_filename: String,
    pub mdx_support: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            property_key: DEFAULT_PROPERTY_KEY.to_string(),
            surfaces: SurfaceFlags::default(),
            include_filename_in_search: true,
            include_aliases_in_search: true,
            use_simple_search: false,
            folder_note_filename: String::new(),
            mdx_support: false,
        }
    }
}

impl Settings {
    /// Load from a persisted blob. Missing or ill-typed fields take their
    /// defaults individually; unknown fields are ignored.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(input) = value else {
            if !value.is_null() {
                tracing::warn!("Settings blob is not an object, using defaults");
            }
            return Self::default();
        };

        let mut input = input.clone();
        if let Some(Value::Object(flags)) = input.get("surfaces") {
            let flags = merge_fields::<SurfaceFlags>(flags, "surfaces.");
            input.insert("surfaces".to_string(), Value::Object(flags));
        }
        let merged = merge_fields::<Settings>(&input, "");

        serde_json::from_value::<Settings>(Value::Object(merged))
            .unwrap_or_default()
            .normalized()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Enforce invariants: the property key is trimmed and never empty.
    pub fn normalized(mut self) -> Self {
        let key = self.property_key.trim();
        self.property_key = if key.is_empty() {
            DEFAULT_PROPERTY_KEY.to_string()
        } else {
            key.to_string()
        };
        self
    }

    /// What changed between `self` and `next`, for selective propagation.
    pub fn diff(&self, next: &Settings) -> SettingsChange {
        SettingsChange {
            property_key: self.property_key != next.property_key,
            mdx_support: self.mdx_support != next.mdx_support,
            folder_note: self.folder_note_filename != next.folder_note_filename,
            search: self.include_filename_in_search != next.include_filename_in_search
                || self.include_aliases_in_search != next.include_aliases_in_search
                || self.use_simple_search != next.use_simple_search,
            surfaces: Surface::ALL
                .into_iter()
                .filter(|s| self.surfaces.get(*s) != next.surfaces.get(*s))
                .map(|s| (s, next.surfaces.get(s)))
                .collect(),
        }
    }
}

/// Overlay `input` on the defaults of `T` one key at a time, keeping the
/// default for any key whose value would not deserialize.
fn merge_fields<T>(input: &Map<String, Value>, scope: &str) -> Map<String, Value>
where
    T: Default + Serialize + DeserializeOwned,
{
    let mut merged = match serde_json::to_value(T::default()) {
        Ok(Value::Object(map)) => map,
        _ => return Map::new(),
    };
    for (key, field) in input {
        let Some(default) = merged.get(key).cloned() else {
            continue;
        };
        merged.insert(key.clone(), field.clone());
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            tracing::warn!("Ignoring invalid setting `{}{}`: {}", scope, key, field);
            merged.insert(key.clone(), default);
        }
    }
    merged
}

/// The parts of [`Settings`] a mutation touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub property_key: bool,
    pub mdx_support: bool,
    pub folder_note: bool,
    /// Search flags are read per query and need no rebuild.
    pub search: bool,
    /// Surfaces whose flag flipped, with the new value.
    pub surfaces: Vec<(Surface, bool)>,
}

impl SettingsChange {
    /// True when every display record must be recomputed.
    pub fn requires_rebuild(&self) -> bool {
        self.property_key || self.mdx_support
    }

    pub fn is_empty(&self) -> bool {
        *self == SettingsChange::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_take_defaults() {
        let settings = Settings::from_value(&json!({"property_key": "heading"}));
        assert_eq!(settings.property_key, "heading");
        assert!(settings.include_aliases_in_search);
        assert!(settings.surfaces.graph);
        assert_eq!(settings.folder_note_filename, "");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let settings = Settings::from_value(&json!({"legacy_option": 3, "mdx_support": true}));
        assert!(settings.mdx_support);
    }

    #[test]
    fn invalid_field_defaults_alone() {
        let settings = Settings::from_value(&json!({
            "use_simple_search": "yes",
            "include_filename_in_search": false
        }));
        assert!(!settings.use_simple_search);
        assert!(!settings.include_filename_in_search);
    }

    #[test]
    fn partial_surface_flags_default_per_flag() {
        let settings = Settings::from_value(&json!({"surfaces": {"graph": false}}));
        assert!(!settings.surfaces.graph);
        assert!(settings.surfaces.tabs);
    }

    #[test]
    fn invalid_surface_flag_keeps_its_siblings() {
        let settings = Settings::from_value(&json!({
            "surfaces": {"graph": "no", "tabs": false, "bookmarks": false}
        }));
        assert!(settings.surfaces.graph);
        assert!(!settings.surfaces.tabs);
        assert!(!settings.surfaces.bookmarks);
        assert!(settings.surfaces.explorer);
    }

    #[test]
    fn non_object_surfaces_default_as_a_whole() {
        let settings = Settings::from_value(&json!({"surfaces": 3, "mdx_support": true}));
        assert_eq!(settings.surfaces, SurfaceFlags::default());
        assert!(settings.mdx_support);
    }

    #[test]
    fn blank_property_key_becomes_title() {
        let settings = Settings::from_value(&json!({"property_key": "   "}));
        assert_eq!(settings.property_key, DEFAULT_PROPERTY_KEY);
    }

    #[test]
    fn non_object_blob_uses_defaults() {
        assert_eq!(Settings::from_value(&json!(null)), Settings::default());
        assert_eq!(Settings::from_value(&json!([1, 2])), Settings::default());
    }

    #[test]
    fn persisted_value_round_trips() {
        let mut settings = Settings::default();
        settings.surfaces.set(Surface::Bookmarks, false);
        settings.folder_note_filename = "index".into();
        assert_eq!(Settings::from_value(&settings.to_value()), settings);
    }

    #[test]
    fn diff_reports_only_what_changed() {
        let before = Settings::default();
        let mut after = before.clone();
        after.surfaces.set(Surface::Graph, false);
        after.use_simple_search = true;

        let change = before.diff(&after);
        assert_eq!(change.surfaces, vec![(Surface::Graph, false)]);
        assert!(change.search);
        assert!(!change.requires_rebuild());
        assert!(!change.folder_note);
        assert!(before.diff(&before).is_empty());
    }

    #[test]
    fn property_key_change_requires_rebuild() {
        let before = Settings::default();
        let after = Settings {
            property_key: "heading".into(),
            ..before.clone()
        };
        assert!(before.diff(&after).requires_rebuild());
    }
}
