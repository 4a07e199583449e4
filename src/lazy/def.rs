//! Which fields a selective decode captures.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::error::{DecodeError, TagPath};
use crate::wire;

/// A selection of field tags, optionally recursing into sub-messages.
///
/// Each declared tag maps either to "capture the value as-is" or to a nested
/// [`Def`] describing which fields to pick out of that length-delimited field.
/// A negated tag captures the field's raw, undecoded payload and may sit next
/// to a positive declaration of the same field, yielding both the opaque bytes
/// and decoded sub-fields from one pass.
///
/// ```
/// use protopick::Def;
///
/// // Top-level fields 1 and 2, plus fields 1 and 3 of the message in field 4,
/// // plus the raw bytes of field 4 itself.
/// let mut def = Def::new([1, 2, -4]);
/// def.nested(4, [1, 3]);
/// assert!(def.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Def {
    fields: BTreeMap<i32, Option<Def>>,
}

impl Def {
    /// A flat selection of `tags`.
    pub fn new<I: IntoIterator<Item = i32>>(tags: I) -> Self {
        let mut def = Def::default();
        def.extend(tags);
        def
    }

    /// Select `tag` as a plain field, keeping any nested selection it has.
    pub fn add(&mut self, tag: i32) -> &mut Self {
        self.fields.entry(tag).or_insert(None);
        self
    }

    /// Declare `tag` as a sub-message and select `tags` within it.
    ///
    /// Returns the nested definition so it can be refined further, to any
    /// depth. Calling this again for the same tag extends the same nested
    /// definition.
    pub fn nested<I: IntoIterator<Item = i32>>(&mut self, tag: i32, tags: I) -> &mut Def {
        let nested = self
            .fields
            .entry(tag)
            .or_insert(None)
            .get_or_insert_with(Def::default);
        nested.extend(tags);
        nested
    }

    /// Builder form of [`Def::nested`] taking a complete nested definition.
    ///
    /// Replaces whatever was declared for `tag` before.
    pub fn with_nested(mut self, tag: i32, nested: Def) -> Self {
        self.fields.insert(tag, Some(nested));
        self
    }

    /// Whether `tag` (exactly, sign included) is declared.
    #[inline]
    pub fn contains(&self, tag: i32) -> bool {
        self.fields.contains_key(&tag)
    }

    /// Looks up `tag`, returning its nested definition if it has one.
    ///
    /// `None` means undeclared, `Some(None)` declared without nesting.
    #[inline]
    pub fn get(&self, tag: i32) -> Option<Option<&Def>> {
        self.fields.get(&tag).map(Option::as_ref)
    }

    /// Every declared tag in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = i32> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check every tag in the tree.
    ///
    /// Fails with [`DecodeError::InvalidTag`] naming the first offending tag
    /// and the path of tags leading to it when a tag's magnitude is not a
    /// declarable field number (zero, above `2^29-1`, or within the reserved
    /// `19000..=19999`), or when a negated raw-capture tag carries a nested
    /// definition.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let mut path = Vec::new();
        self.validate_at(&mut path)
    }

    fn validate_at(&self, path: &mut Vec<i32>) -> Result<(), DecodeError> {
        for (&tag, nested) in &self.fields {
            let valid = wire::is_valid_field_number(tag.unsigned_abs());
            if !valid || (tag < 0 && nested.is_some()) {
                return Err(DecodeError::InvalidTag {
                    tag,
                    path: TagPath(path.clone()),
                });
            }
            if let Some(nested) = nested {
                path.push(tag);
                nested.validate_at(path)?;
                path.pop();
            }
        }
        Ok(())
    }
}

impl Extend<i32> for Def {
    fn extend<I: IntoIterator<Item = i32>>(&mut self, tags: I) {
        for tag in tags {
            self.add(tag);
        }
    }
}

impl FromIterator<i32> for Def {
    fn from_iter<I: IntoIterator<Item = i32>>(tags: I) -> Self {
        Def::new(tags)
    }
}
