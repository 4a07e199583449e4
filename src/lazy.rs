//! Selective decoding: extract a declared subset of fields in one pass.
//!
//! A [`Def`] names the tags to capture, recursing into sub-messages where
//! declared. The engine walks the encoded message once, skipping everything
//! undeclared, and records where each captured value lives. Interpretation is
//! deferred to the typed accessors on [`FieldData`].
//!
//! The captured structure is a flat tree: one node per decoded message,
//! each holding its fields, each field holding its occurrences as byte spans.
//! In [`Mode::Fast`] the spans point into the caller's input. In
//! [`Mode::Safe`] every captured payload is copied into an arena owned by the
//! tree, once, no matter how deeply it's nested.
//!
//! ```
//! use protopick::{Def, LazyDecoder};
//!
//! let data = [0x08, 0x01, 0x12, 0x04, b't', b'e', b's', b't'];
//! let decoder = LazyDecoder::new(Def::new([1, 2]))?;
//! let result = decoder.decode(&data)?;
//! assert!(result.get(1).bool_value()?);
//! assert_eq!(result.get(2).string_value()?, "test");
//! # Ok::<(), protopick::DecodeError>(())
//! ```

use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use smallvec::{smallvec, SmallVec};

use crate::decode::{Decoder, Mode};
use crate::error::DecodeError;
use crate::wire::WireType;

mod def;
mod field;
mod pool;

pub use def::Def;
pub use field::FieldData;
pub use pool::{DecodePool, PoolConfig};

type NodeId = usize;

const ROOT: NodeId = 0;

/// A byte range within a tree's source, either the input or the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    #[inline]
    fn range(self) -> Range<usize> {
        self.start..self.end
    }
}

/// One appearance of a field on the wire.
#[derive(Debug, Clone, Copy)]
struct Occurrence {
    wire_type: WireType,
    /// The value without its key or length prefix.
    span: Span,
    /// The sub-message decoded from this occurrence, if one was declared.
    nested: Option<NodeId>,
}

#[derive(Debug)]
struct Field {
    tag: i32,
    occurrences: SmallVec<[Occurrence; 1]>,
}

#[derive(Debug, Default)]
struct Node {
    /// Indexes into [`Tree::fields`], in the order first seen.
    fields: SmallVec<[usize; 8]>,
}

/// Everything one selective decode captured.
#[derive(Debug, Default)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
    fields: Vec<Field>,
    arena: Vec<u8>,
}

impl Tree {
    fn start(&mut self) {
        debug_assert!(self.nodes.is_empty());
        self.nodes.push(Node::default());
    }

    fn add_node(&mut self) -> NodeId {
        self.nodes.push(Node::default());
        self.nodes.len() - 1
    }

    fn push(&mut self, node: NodeId, tag: i32, occurrence: Occurrence) {
        let Tree { nodes, fields, .. } = self;
        let node = &mut nodes[node];
        match node.fields.iter().find(|&&idx| fields[idx].tag == tag) {
            Some(&idx) => fields[idx].occurrences.push(occurrence),
            None => {
                node.fields.push(fields.len());
                fields.push(Field {
                    tag,
                    occurrences: smallvec![occurrence],
                });
            }
        }
    }

    fn field(&self, node: NodeId, tag: i32) -> Option<&Field> {
        self.nodes[node]
            .fields
            .iter()
            .map(|&idx| &self.fields[idx])
            .find(|field| field.tag == tag)
    }

    /// Clear everything and give back capacity beyond `config`'s bounds.
    fn reset(&mut self, config: &PoolConfig) {
        self.nodes.clear();
        self.nodes.shrink_to(config.max_nodes);
        self.fields.clear();
        self.fields.shrink_to(config.max_fields);
        self.arena.clear();
        self.arena.shrink_to(config.max_arena_bytes);
    }
}

/// Where the bytes being walked end up in the tree's source.
#[derive(Debug, Clone, Copy)]
enum Base {
    /// Byte `i` of the walked slice is byte `offset + i` of the source.
    At(usize),
    /// The walked slice isn't part of the source, captures are copied.
    Copy,
}

impl Base {
    fn span(self, tree: &mut Tree, data: &[u8], range: Range<usize>) -> Span {
        match self {
            Base::At(offset) => Span {
                start: offset + range.start,
                end: offset + range.end,
            },
            Base::Copy => {
                let start = tree.arena.len();
                tree.arena.extend_from_slice(&data[range]);
                Span {
                    start,
                    end: tree.arena.len(),
                }
            }
        }
    }
}

/// Walk the message in `data`, capturing what `def` declares into `node`.
///
/// On failure `path` holds the chain of tags leading to the failing message.
fn walk(
    tree: &mut Tree,
    node: NodeId,
    data: &[u8],
    base: Base,
    def: &Def,
    path: &mut SmallVec<[i32; 8]>,
) -> Result<(), DecodeError> {
    // Keys are read right here, so skip never needs to re-check them.
    let mut dec = Decoder::with_mode(data, Mode::Fast);
    while dec.more() {
        let (wire_tag, wire_type) = dec.decode_tag()?;
        // Decoded tags are at most 2^29-1.
        #[allow(clippy::as_conversions)]
        let tag = wire_tag as i32;

        let declared = def.get(tag);
        let raw = def.contains(-tag);
        if declared.is_none() && !raw {
            dec.skip(wire_tag, wire_type)?;
            continue;
        }

        match wire_type {
            WireType::Varint | WireType::I64 | WireType::I32 => {
                let start = dec.offset();
                dec.skip(wire_tag, wire_type)?;
                let occurrence = Occurrence {
                    wire_type,
                    span: base.span(tree, data, start..dec.offset()),
                    nested: None,
                };
                if declared.is_some() {
                    tree.push(node, tag, occurrence);
                }
                if raw {
                    tree.push(node, -tag, occurrence);
                }
            }
            WireType::Len => {
                let payload = dec.decode_len_delimited()?;
                let end = dec.offset();
                let span = base.span(tree, data, end - payload.len()..end);
                let occurrence = Occurrence {
                    wire_type,
                    span,
                    nested: None,
                };

                match declared {
                    Some(Some(nested_def)) => {
                        let child = tree.add_node();
                        path.push(tag);
                        walk(tree, child, payload, Base::At(span.start), nested_def, path)?;
                        path.pop();
                        tree.push(
                            node,
                            tag,
                            Occurrence {
                                nested: Some(child),
                                ..occurrence
                            },
                        );
                    }
                    Some(None) => tree.push(node, tag, occurrence),
                    None => {}
                }
                if raw {
                    tree.push(node, -tag, occurrence);
                }
            }
            WireType::SGroup | WireType::EGroup => {
                return Err(DecodeError::unsupported_wire_type(wire_type));
            }
        }
    }
    Ok(())
}

/// Run a complete selective decode of `data` into an empty `tree`.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn fill(tree: &mut Tree, data: &[u8], def: &Def, mode: Mode) -> Result<(), DecodeError> {
    tree.start();
    let base = match mode {
        Mode::Safe => Base::Copy,
        Mode::Fast => Base::At(0),
    };
    let mut path = SmallVec::new();
    walk(tree, ROOT, data, base, def, &mut path).inspect_err(|err| {
        crate::util::debug!(path = ?path, error = %err, "selective decode failed");
    })
}

/// A validated [`Def`] ready to decode any number of messages.
#[derive(Debug, Clone)]
pub struct LazyDecoder {
    def: Def,
    mode: Mode,
}

impl LazyDecoder {
    /// Validate `def` once up front, decoding in [`Mode::Safe`].
    pub fn new(def: Def) -> Result<Self, DecodeError> {
        def.validate()?;
        Ok(LazyDecoder {
            def,
            mode: Mode::Safe,
        })
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn def(&self) -> &Def {
        &self.def
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Decode `data`, allocating a fresh tree.
    pub fn decode<'a>(&self, data: &'a [u8]) -> Result<DecodeResult<'a>, DecodeError> {
        self.decode_with(data, None)
    }

    /// Decode `data` with a tree taken from `pool`, returned when the result
    /// is dropped or closed.
    pub fn decode_in<'a>(
        &self,
        data: &'a [u8],
        pool: &'a DecodePool,
    ) -> Result<DecodeResult<'a>, DecodeError> {
        self.decode_with(data, Some(pool))
    }

    /// Decode `data` into a result that owns copies of everything captured,
    /// regardless of this decoder's mode.
    pub fn decode_owned(&self, data: &[u8]) -> Result<DecodeResult<'static>, DecodeError> {
        let mut tree = Tree::default();
        fill(&mut tree, data, &self.def, Mode::Safe)?;
        Ok(DecodeResult {
            tree,
            input: None,
            pool: None,
        })
    }

    fn decode_with<'a>(
        &self,
        data: &'a [u8],
        pool: Option<&'a DecodePool>,
    ) -> Result<DecodeResult<'a>, DecodeError> {
        let tree = pool.map_or_else(Tree::default, DecodePool::acquire);
        let mut result = DecodeResult {
            tree,
            input: match self.mode {
                Mode::Safe => None,
                Mode::Fast => Some(data),
            },
            pool,
        };
        // On failure `result` drops here, handing its tree back to the pool.
        fill(&mut result.tree, data, &self.def, self.mode)?;
        Ok(result)
    }
}

/// Validate `def` and selectively decode `data` in [`Mode::Safe`].
///
/// Prefer [`LazyDecoder`] when decoding many messages with one selection.
pub fn decode<'a>(data: &'a [u8], def: &Def) -> Result<DecodeResult<'a>, DecodeError> {
    def.validate()?;
    let mut tree = Tree::default();
    fill(&mut tree, data, def, Mode::Safe)?;
    Ok(DecodeResult {
        tree,
        input: None,
        pool: None,
    })
}

/// The fields captured by one selective decode.
///
/// In [`Mode::Fast`] the result borrows the input for `'a`, every value read
/// from it aliases the input. Values borrow the result itself, so none can
/// outlive [`DecodeResult::close`]. Dropping a pooled result returns its
/// storage to the pool.
pub struct DecodeResult<'a> {
    tree: Tree,
    /// The source spans index into, `None` when they index the arena.
    input: Option<&'a [u8]>,
    pool: Option<&'a DecodePool>,
}

impl<'a> DecodeResult<'a> {
    /// A view of the top-level message.
    pub fn root(&self) -> MessageView<'_> {
        let source = self.input.unwrap_or(self.tree.arena.as_slice());
        MessageView::new(&self.tree, source, ROOT)
    }

    /// Follow `path` through nested messages and return the field at its end.
    ///
    /// Each segment before the last must name a field decoded as a
    /// sub-message, its last occurrence is followed. Fails with
    /// [`DecodeError::TagNotFound`] at the first absent segment.
    pub fn field_data(&self, path: &[i32]) -> Result<FieldData<'_>, DecodeError> {
        self.root().field_data(path)
    }

    /// The field captured under `tag`, empty if none was.
    pub fn get(&self, tag: i32) -> FieldData<'_> {
        self.root().get(tag)
    }

    /// The last decoded occurrence of sub-message `tag`.
    pub fn nested(&self, tag: i32) -> Result<MessageView<'_>, DecodeError> {
        self.root().nested(tag)
    }

    /// Every decoded occurrence of sub-message `tag`.
    pub fn nested_all(&self, tag: i32) -> Result<Vec<MessageView<'_>>, DecodeError> {
        self.root().nested_all(tag)
    }

    /// Tags captured at the top level, in the order first seen.
    pub fn tags(&self) -> impl Iterator<Item = i32> + '_ {
        self.root().tags()
    }

    pub fn is_empty(&self) -> bool {
        self.root().is_empty()
    }

    /// Release the result, returning its storage to the pool it came from.
    ///
    /// Equivalent to dropping it.
    pub fn close(self) {}
}

impl Drop for DecodeResult<'_> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool {
            pool.release(core::mem::take(&mut self.tree));
        }
    }
}

impl fmt::Debug for DecodeResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeResult")
            .field("root", &self.root())
            .field("borrowed", &self.input.is_some())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

/// One decoded message within a [`DecodeResult`].
#[derive(Clone, Copy)]
pub struct MessageView<'r> {
    tree: &'r Tree,
    source: &'r [u8],
    node: NodeId,
}

impl<'r> MessageView<'r> {
    fn new(tree: &'r Tree, source: &'r [u8], node: NodeId) -> Self {
        MessageView { tree, source, node }
    }

    /// The field captured under `tag`, empty if none was.
    pub fn get(&self, tag: i32) -> FieldData<'r> {
        let occurrences = self
            .tree
            .field(self.node, tag)
            .map_or(&[][..], |field| &field.occurrences[..]);
        FieldData::new(tag, occurrences, self.tree, self.source)
    }

    /// Like [`MessageView::get`] but fails when nothing was captured.
    fn captured(&self, tag: i32) -> Result<FieldData<'r>, DecodeError> {
        let field = self.get(tag);
        if field.is_empty() {
            return Err(DecodeError::tag_not_found(tag));
        }
        Ok(field)
    }

    /// Follow `path` relative to this message, see [`DecodeResult::field_data`].
    pub fn field_data(&self, path: &[i32]) -> Result<FieldData<'r>, DecodeError> {
        let Some((&last, parents)) = path.split_last() else {
            return Err(DecodeError::tag_not_found(0));
        };
        let mut view = *self;
        for &tag in parents {
            view = view.nested(tag).map_err(|_| DecodeError::tag_not_found(tag))?;
        }
        view.captured(last)
    }

    pub fn nested(&self, tag: i32) -> Result<MessageView<'r>, DecodeError> {
        self.captured(tag)?.message()
    }

    pub fn nested_all(&self, tag: i32) -> Result<Vec<MessageView<'r>>, DecodeError> {
        self.captured(tag)?.messages()
    }

    /// Tags captured in this message, in the order first seen.
    pub fn tags(&self) -> impl Iterator<Item = i32> + 'r {
        let tree = self.tree;
        tree.nodes[self.node]
            .fields
            .iter()
            .map(move |&idx| tree.fields[idx].tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tree.nodes[self.node].fields.is_empty()
    }
}

impl fmt::Debug for MessageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tags().map(|tag| self.get(tag)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::encode::Encoder;

    fn encode_with(f: impl Fn(&mut Encoder<'_>)) -> Vec<u8> {
        let mut scratch = vec![0u8; 4096];
        let mut enc = Encoder::new(&mut scratch);
        f(&mut enc);
        enc.written().to_vec()
    }

    /// `{1: 150, 2: "outer", 3: {1: "inner", 2: [1, 2, 3] packed, 4: {5: true}}, 6: 7.5f}`
    fn sample() -> Vec<u8> {
        let leaf = encode_with(|enc| enc.encode_bool(5, true));
        let inner = encode_with(|enc| {
            enc.encode_string(1, "inner");
            enc.encode_packed_int32(2, &[1, 2, 3]);
            enc.encode_bytes(4, &leaf);
        });
        encode_with(|enc| {
            enc.encode_uint64(1, 150);
            enc.encode_string(2, "outer");
            enc.encode_bytes(3, &inner);
            enc.encode_float(6, 7.5);
        })
    }

    #[test]
    fn test_scenario() {
        let data = [0x08, 0x01, 0x12, 0x04, 0x74, 0x65, 0x73, 0x74];
        for mode in [Mode::Safe, Mode::Fast] {
            let decoder = LazyDecoder::new(Def::new([1, 2])).unwrap().with_mode(mode);
            let result = decoder.decode(&data).unwrap();
            assert!(result.get(1).bool_value().unwrap());
            assert_eq!(result.get(2).string_value().unwrap(), "test");
            assert_eq!(result.tags().collect::<Vec<_>>(), vec![1, 2]);
        }
    }

    #[test]
    fn test_nested_paths() {
        let data = sample();
        let mut def = Def::new([1, 6]);
        def.nested(3, [1, 2]).nested(4, [5]);

        for mode in [Mode::Safe, Mode::Fast] {
            let decoder = LazyDecoder::new(def.clone()).unwrap().with_mode(mode);
            let result = decoder.decode(&data).unwrap();

            assert_eq!(result.get(1).uint64_value().unwrap(), 150);
            assert_eq!(result.get(6).float_value().unwrap(), 7.5);
            assert_eq!(
                result.field_data(&[3, 1]).unwrap().string_value().unwrap(),
                "inner"
            );
            assert_eq!(
                result.field_data(&[3, 2]).unwrap().int32_values().unwrap(),
                vec![1, 2, 3]
            );
            assert!(result.field_data(&[3, 4, 5]).unwrap().bool_value().unwrap());

            // Undeclared fields are never captured.
            assert_eq!(result.field_data(&[2]).unwrap_err(), DecodeError::TagNotFound { tag: 2 });
            assert!(result.get(2).is_empty());
            assert_eq!(
                result.field_data(&[3, 9, 1]).unwrap_err(),
                DecodeError::TagNotFound { tag: 9 }
            );
        }
    }

    #[test]
    fn test_raw_capture_next_to_nested() {
        let data = sample();
        let mut def = Def::new([-3]);
        def.nested(3, [1]);
        let result = decode(&data, &def).unwrap();

        let raw = result.get(-3).bytes_value().unwrap();
        assert_eq!(result.get(3).bytes_value().unwrap(), raw);
        assert_eq!(
            result.nested(3).unwrap().get(1).string_value().unwrap(),
            "inner"
        );

        // The raw bytes decode as the sub-message they are.
        let again = decode(raw, &Def::new([1])).unwrap();
        assert_eq!(again.get(1).string_value().unwrap(), "inner");
    }

    #[test]
    fn test_raw_capture_only() {
        let data = sample();
        let result = decode(&data, &Def::new([-3])).unwrap();
        assert!(result.get(3).is_empty());
        assert_eq!(result.get(-3).len(), 1);
        assert_eq!(
            result.get(-3).message().unwrap_err(),
            DecodeError::TagNotFound { tag: -3 }
        );
    }

    #[test]
    fn test_fast_mode_aliases_input() {
        let data = sample();
        let decoder = LazyDecoder::new(Def::new([2])).unwrap().with_mode(Mode::Fast);
        let result = decoder.decode(&data).unwrap();
        let value = result.get(2).bytes_value().unwrap();
        let input = data.as_ptr_range();
        assert!(input.contains(&value.as_ptr()));

        let owned = decoder.decode_owned(&data).unwrap();
        let value = owned.get(2).bytes_value().unwrap();
        assert!(!input.contains(&value.as_ptr()));
        assert_eq!(value, b"outer");
    }

    #[test]
    fn test_owned_result_outlives_input() {
        let decoder = LazyDecoder::new(Def::new([1])).unwrap();
        let result = {
            let data = encode_with(|enc| enc.encode_string(1, "kept"));
            decoder.decode_owned(&data).unwrap()
        };
        assert_eq!(result.get(1).string_value().unwrap(), "kept");
    }

    #[test]
    fn test_repeated_nested_messages() {
        let first = encode_with(|enc| enc.encode_int32(1, 10));
        let second = encode_with(|enc| enc.encode_int32(1, 20));
        let data = encode_with(|enc| {
            enc.encode_bytes(4, &first);
            enc.encode_uint32(9, 1);
            enc.encode_bytes(4, &second);
        });

        let mut def = Def::default();
        def.nested(4, [1]);
        let result = decode(&data, &def).unwrap();

        let all = result.nested_all(4).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].get(1).int32_value().unwrap(), 10);
        assert_eq!(all[1].get(1).int32_value().unwrap(), 20);
        // Path navigation follows the last occurrence.
        assert_eq!(result.field_data(&[4, 1]).unwrap().int32_value().unwrap(), 20);
    }

    #[test]
    fn test_invalid_def_rejected_before_decoding() {
        // Garbage input, validation must fail first.
        let data = [0xff; 4];
        assert!(matches!(
            decode(&data, &Def::new([19_123])),
            Err(DecodeError::InvalidTag { tag: 19_123, .. })
        ));
        assert!(LazyDecoder::new(Def::new([0])).is_err());
    }

    #[test]
    fn test_errors_abort_the_walk() {
        // A group in a selected field.
        let data = [0x0b, 0x0c];
        assert_eq!(
            decode(&data, &Def::new([1])).unwrap_err(),
            DecodeError::UnsupportedWireType {
                wire_type: WireType::SGroup
            }
        );

        // A corrupted length inside a nested message.
        let inner = [0x0a, 0xff, 0xff, 0xff, 0xff, 0x0f, 0x00];
        let data = encode_with(|enc| enc.encode_bytes(3, &inner));
        let mut def = Def::default();
        def.nested(3, [1]);
        for mode in [Mode::Safe, Mode::Fast] {
            let decoder = LazyDecoder::new(def.clone()).unwrap().with_mode(mode);
            assert_eq!(
                decoder.decode(&data).unwrap_err(),
                DecodeError::UnexpectedEndOfBuffer
            );
        }
    }

    #[test]
    fn test_pool_reuse() {
        let pool = DecodePool::new();
        let decoder = LazyDecoder::new(Def::new([1, 2])).unwrap();

        for round in 0..3u64 {
            let data = encode_with(|enc| {
                enc.encode_uint64(1, round);
                enc.encode_string(2, "round");
            });
            let result = decoder.decode_in(&data, &pool).unwrap();
            assert_eq!(pool.retained(), 0);
            assert_eq!(result.get(1).uint64_value().unwrap(), round);
            assert_eq!(result.get(1).len(), 1);
            result.close();
            assert_eq!(pool.retained(), 1);
        }

        // A failed decode still hands its tree back.
        assert!(decoder.decode_in(&[0x12, 0x09], &pool).is_err());
        assert_eq!(pool.retained(), 1);
    }

    #[test]
    fn test_empty_inputs() {
        let result = decode(&[], &Def::new([1])).unwrap();
        assert!(result.is_empty());
        assert_eq!(
            result.get(1).bool_value().unwrap_err(),
            DecodeError::TagNotFound { tag: 1 }
        );
        assert_eq!(
            result.field_data(&[]).unwrap_err(),
            DecodeError::TagNotFound { tag: 0 }
        );

        // An empty sub-message still yields an (empty) view.
        let mut def = Def::default();
        def.nested(2, [1]);
        let result = decode(&[0x12, 0x00], &def).unwrap();
        assert!(result.nested(2).unwrap().is_empty());
    }
}
