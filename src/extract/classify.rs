//! Keyword classifier that sorts listings into console families.

use crate::models::Category;

/// Ordered keyword table. Classification walks it top to bottom and the
/// first keyword contained in the text wins, so the order is part of the
/// behavior and must stay stable.
const KEYWORDS: &[(&str, Category)] = &[
    ("nintendo", Category::Nintendo),
    ("switch", Category::Nintendo),
    ("wii", Category::Nintendo),
    ("3ds", Category::Nintendo),
    ("game boy", Category::Nintendo),
    ("xbox", Category::Xbox),
    ("kinect", Category::Xbox),
    ("playstation", Category::PlayStation),
    ("play station", Category::PlayStation),
    ("ps5", Category::PlayStation),
    ("ps4", Category::PlayStation),
    ("ps3", Category::PlayStation),
    ("psp", Category::PlayStation),
    ("dualshock", Category::PlayStation),
];

/// Classifies free text (listing URL plus title, usually) into a console
/// family. Matching is case-insensitive substring containment; text that
/// matches nothing stays unclassified.
pub fn classify(text: &str) -> Option<Category> {
    let haystack = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, category)| *category)
}
