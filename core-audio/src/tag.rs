//! # Song Tags
//!
//! Metadata attached to songs and music chunks. A [`Tag`] is an ordered
//! list of typed items; merging lets a fresher source (stream or decoder)
//! override individual fields of an older one.

use std::fmt;

/// Kind of a single tag item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Title,
    Artist,
    Album,
    AlbumArtist,
    TrackNumber,
    DiscNumber,
    Genre,
    Date,
    Composer,
    Comment,
    MusicBrainzTrackId,
    MusicBrainzAlbumId,
}

/// One typed metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagItem {
    pub kind: TagKind,
    pub value: String,
}

/// An ordered collection of tag items, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    items: Vec<TagItem>,
}

impl Tag {
    /// Create an empty tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the item of the given kind.
    pub fn add_item(&mut self, kind: TagKind, value: impl Into<String>) {
        let value = value.into();
        if let Some(item) = self.items.iter_mut().find(|i| i.kind == kind) {
            item.value = value;
        } else {
            self.items.push(TagItem { kind, value });
        }
    }

    /// Builder-style [`add_item`](Self::add_item).
    pub fn with_item(mut self, kind: TagKind, value: impl Into<String>) -> Self {
        self.add_item(kind, value);
        self
    }

    /// Look up the value of a kind.
    pub fn get(&self, kind: TagKind) -> Option<&str> {
        self.items
            .iter()
            .find(|i| i.kind == kind)
            .map(|i| i.value.as_str())
    }

    /// Returns `true` if an item of this kind is present.
    pub fn has_kind(&self, kind: TagKind) -> bool {
        self.items.iter().any(|i| i.kind == kind)
    }

    /// All items, in insertion order.
    pub fn items(&self) -> &[TagItem] {
        &self.items
    }

    /// Returns `true` if the tag carries no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Merge two tags. Kinds present in `add` override the same kinds in
    /// `base`; all other `base` items survive. Callers pass the winning
    /// source last.
    pub fn merge(base: &Tag, add: &Tag) -> Tag {
        let mut items: Vec<TagItem> = base
            .items
            .iter()
            .filter(|i| !add.has_kind(i.kind))
            .cloned()
            .collect();
        items.extend(add.items.iter().cloned());
        Tag { items }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for item in &self.items {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{:?}={:?}", item.kind, item.value)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_replaces() {
        let mut tag = Tag::new();
        tag.add_item(TagKind::Title, "First");
        tag.add_item(TagKind::Title, "Second");
        assert_eq!(tag.get(TagKind::Title), Some("Second"));
        assert_eq!(tag.items().len(), 1);
    }

    #[test]
    fn test_merge_second_wins() {
        let base = Tag::new()
            .with_item(TagKind::Title, "Stream Title")
            .with_item(TagKind::Artist, "Stream Artist");
        let add = Tag::new()
            .with_item(TagKind::Title, "Decoder Title")
            .with_item(TagKind::Album, "Decoder Album");

        let merged = Tag::merge(&base, &add);
        assert_eq!(merged.get(TagKind::Title), Some("Decoder Title"));
        assert_eq!(merged.get(TagKind::Artist), Some("Stream Artist"));
        assert_eq!(merged.get(TagKind::Album), Some("Decoder Album"));
        assert_eq!(merged.items().len(), 3);
    }

    #[test]
    fn test_merge_with_empty() {
        let tag = Tag::new().with_item(TagKind::Genre, "Jazz");
        assert_eq!(Tag::merge(&tag, &Tag::new()), tag);
        assert_eq!(Tag::merge(&Tag::new(), &tag), tag);
    }
}
