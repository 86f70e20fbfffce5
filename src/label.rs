//! Label derivation from item identifiers.
//!
//! Identifiers follow the `<label>_<ordinal>` naming convention, optionally as
//! a file path (`images/golden_retriever_103.jpg`). The label is everything in
//! the base name before the last separator. Every component that needs ground
//! truth (matcher, split planner, evaluation) goes through [`LabelExtractor`]
//! so the derivation is identical everywhere.

use serde::{Deserialize, Serialize};

/// Default separator between a label and its trailing ordinal.
pub const DEFAULT_SEPARATOR: char = '_';

/// Derives a category label from an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelExtractor {
    separator: char,
}

impl LabelExtractor {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Label of `id`: the base name up to (not including) the last separator.
    ///
    /// With no separator in the base name the base name is returned whole.
    ///
    /// ```
    /// use pawmatch::LabelExtractor;
    ///
    /// let labels = LabelExtractor::default();
    /// assert_eq!(labels.label("images/great_pyrenees_17.jpg"), "great_pyrenees");
    /// assert_eq!(labels.label("poodle_01"), "poodle");
    /// assert_eq!(labels.label("poodle"), "poodle");
    /// ```
    pub fn label(&self, id: &str) -> String {
        let name = base_name(id);
        match name.rsplit_once(self.separator) {
            Some((label, _ordinal)) => label.to_string(),
            None => name.to_string(),
        }
    }
}

impl Default for LabelExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

/// File extensions removed from identifiers, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff"];

/// Strip directory components (either slash style) and a trailing image
/// extension.
///
/// Other dot suffixes stay part of the name, and a leading dot is never an
/// extension.
pub fn base_name(id: &str) -> &str {
    let file = id.rsplit(['/', '\\']).next().unwrap_or(id);
    match file.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_label_strips_ordinal() {
        let labels = LabelExtractor::default();
        assert_eq!(labels.label("poodle_01"), "poodle");
        assert_eq!(labels.label("american_pit_bull_terrier_12"), "american_pit_bull_terrier");
    }

    #[test]
    fn test_label_from_path() {
        let labels = LabelExtractor::default();
        assert_eq!(labels.label("/data/images/Bengal_101.jpg"), "Bengal");
        assert_eq!(labels.label(r"C:\data\images\Maine_Coon_7.jpg"), "Maine_Coon");
    }

    #[test]
    fn test_label_without_separator() {
        let labels = LabelExtractor::default();
        assert_eq!(labels.label("beagle"), "beagle");
        assert_eq!(labels.label("dir/beagle.jpg"), "beagle");
    }

    #[test]
    fn test_label_keeps_non_image_dots() {
        let labels = LabelExtractor::default();
        assert_eq!(labels.label("v1.5_3"), "v1.5");
        assert_eq!(labels.label("model.v2"), "model.v2");
        assert_eq!(labels.label("images/st.bernard_4.png"), "st.bernard");
    }

    #[test]
    fn test_custom_separator() {
        let labels = LabelExtractor::new('-');
        assert_eq!(labels.label("shiba-inu-3"), "shiba-inu");
        assert_eq!(labels.label("shiba_inu_3"), "shiba_inu_3");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/c_1.jpg"), "c_1");
        assert_eq!(base_name(".hidden"), ".hidden");
        assert_eq!(base_name(".jpg"), ".jpg");
        assert_eq!(base_name("x/Bengal_1.JPG"), "Bengal_1");
        assert_eq!(base_name("v1.5_3"), "v1.5_3");
        assert_eq!(base_name("plain"), "plain");
    }

    proptest! {
        #[test]
        fn prop_label_removes_final_suffix(prefix in "[a-zA-Z_]{0,12}", suffix in "[a-zA-Z0-9]{0,6}") {
            let id = format!("{}_{}", prefix, suffix);
            prop_assert_eq!(LabelExtractor::default().label(&id), prefix);
        }

        #[test]
        fn prop_label_is_identity_without_separator(id in "[a-zA-Z0-9]{1,16}") {
            prop_assert_eq!(LabelExtractor::default().label(&id), id);
        }

        #[test]
        fn prop_label_keeps_dotted_prefix(prefix in "[a-z]{1,6}(\\.[a-z0-9]{1,3}){1,2}", suffix in "[0-9]{1,4}") {
            let id = format!("{}_{}", prefix, suffix);
            prop_assert_eq!(LabelExtractor::default().label(&id), prefix);
        }

        #[test]
        fn prop_label_is_identity_for_dotted_names(id in "[a-z]{1,6}\\.[0-9]{1,4}") {
            prop_assert_eq!(LabelExtractor::default().label(&id), id);
        }
    }
}
