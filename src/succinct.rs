//! Balanced-parenthesis encoding of a tree.
//!
//! A preorder walk writes `1` on entering a node and `0` on leaving it, so an
//! `n`-node tree takes exactly `2n` structure bits. Payloads are stored in a
//! parallel sequence in the same preorder. Bit `i` lives in byte `i / 8` at
//! position `i % 8`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::TreeConfig;
use crate::error::{Result, TreeError};
use crate::hot::INVALID_INDEX;
use crate::tree::{NaryTree, Storage};

/// Topology bits plus preorder payloads.
///
/// Deserializing goes through [`SuccinctEncoding::from_parts`], so a
/// persisted encoding is checked the same way as one built by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(
        try_from = "RawEncoding<T>",
        bound(deserialize = "T: Deserialize<'de>")
    )
)]
pub struct SuccinctEncoding<T> {
    structure: Vec<u8>,
    bit_len: usize,
    data: Vec<T>,
}

/// Unchecked wire form of [`SuccinctEncoding`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawEncoding<T> {
    structure: Vec<u8>,
    bit_len: usize,
    data: Vec<T>,
}

#[cfg(feature = "serde")]
impl<T> TryFrom<RawEncoding<T>> for SuccinctEncoding<T> {
    type Error = TreeError;

    fn try_from(raw: RawEncoding<T>) -> Result<Self> {
        Self::from_parts(raw.structure, raw.bit_len, raw.data)
    }
}

/// LSB-first bit packer.
struct BitWriter {
    bytes: Vec<u8>,
    len: usize,
}

impl BitWriter {
    fn with_bits(bits: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(bits.div_ceil(8))?;
        Ok(Self { bytes, len: 0 })
    }

    #[inline]
    fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (self.len % 8);
        }
        self.len += 1;
    }
}

impl<T> SuccinctEncoding<T> {
    /// Rebuild an encoding from persisted parts.
    ///
    /// Rejects a byte buffer that does not match `bit_len`, set padding bits,
    /// and a bit count other than twice the payload count.
    pub fn from_parts(structure: Vec<u8>, bit_len: usize, data: Vec<T>) -> Result<Self> {
        if structure.len() != bit_len.div_ceil(8) {
            return Err(TreeError::MalformedEncoding {
                bit: bit_len,
                reason: "byte length does not match bit length",
            });
        }
        if bit_len != data.len().saturating_mul(2) {
            return Err(TreeError::MalformedEncoding {
                bit: bit_len,
                reason: "bit length is not twice the payload count",
            });
        }
        let used = bit_len % 8;
        if used != 0 && structure[structure.len() - 1] >> used != 0 {
            return Err(TreeError::MalformedEncoding {
                bit: bit_len,
                reason: "padding bits set",
            });
        }
        Ok(Self {
            structure,
            bit_len,
            data,
        })
    }

    pub fn into_parts(self) -> (Vec<u8>, usize, Vec<T>) {
        (self.structure, self.bit_len, self.data)
    }

    /// Packed structure bits.
    #[inline]
    pub fn structure_bytes(&self) -> &[u8] {
        &self.structure
    }

    /// Number of structure bits, `2 * node_count()`.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Payloads in preorder.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Bit `i`: `true` enters a node, `false` leaves one.
    #[inline]
    pub fn bit(&self, i: usize) -> Option<bool> {
        (i < self.bit_len).then(|| (self.structure[i / 8] >> (i % 8)) & 1 == 1)
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bit_len).map(move |i| (self.structure[i / 8] >> (i % 8)) & 1 == 1)
    }

    /// Heap bytes held by the structure bits and the payload sequence.
    pub fn memory_usage(&self) -> usize {
        self.structure.capacity() + self.data.capacity() * std::mem::size_of::<T>()
    }

    /// Check the bit grammar and return each node's parent, both in preorder.
    /// The root's parent is `INVALID_INDEX`.
    fn parse_parents(&self) -> Result<Vec<u32>> {
        let malformed = |bit, reason| TreeError::MalformedEncoding { bit, reason };
        let mut parents: Vec<u32> = Vec::new();
        parents.try_reserve_exact(self.data.len())?;
        let mut open: Vec<u32> = Vec::new();

        for (i, bit) in self.bits().enumerate() {
            if bit {
                if parents.len() == self.data.len() {
                    return Err(malformed(i, "more nodes than payloads"));
                }
                let parent = match open.last() {
                    Some(&parent) => parent,
                    None if !parents.is_empty() => return Err(malformed(i, "second root")),
                    None => INVALID_INDEX,
                };
                open.push(parents.len() as u32);
                parents.push(parent);
            } else if open.pop().is_none() {
                return Err(malformed(i, "close without matching open"));
            }
        }

        if !open.is_empty() {
            return Err(malformed(self.bit_len, "unclosed node"));
        }
        if parents.len() < self.data.len() {
            return Err(malformed(self.bit_len, "unused payloads"));
        }
        Ok(parents)
    }
}

impl<T: Clone> SuccinctEncoding<T> {
    /// Decode into a tree with the default configuration.
    pub fn decode(&self) -> Result<NaryTree<T>> {
        self.decode_with(TreeConfig::default())
    }

    /// Decode into a tree laid out with `config`.
    pub fn decode_with(&self, config: TreeConfig) -> Result<NaryTree<T>> {
        let mut tree = NaryTree::with_config(config)?;
        let storage = self.decode_storage(&tree)?;
        tree.install(storage);
        Ok(tree)
    }

    /// Parse the whole bit sequence first, then insert level by level so
    /// every hot run is filled at the tail and nothing is relocated.
    fn decode_storage(&self, tree: &NaryTree<T>) -> Result<Storage<T>> {
        let mut storage = Storage::new();
        if self.is_empty() {
            return Ok(storage);
        }
        let parents = self.parse_parents()?;
        let n = parents.len();

        // Children of preorder node `p` are `children[offsets[p]..offsets[p + 1]]`.
        let mut offsets: Vec<u32> = Vec::new();
        offsets.try_reserve_exact(n + 1)?;
        offsets.resize(n + 1, 0);
        for &parent in &parents[1..] {
            offsets[parent as usize + 1] += 1;
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }
        let mut fill = offsets.clone();
        let mut children: Vec<u32> = Vec::new();
        children.try_reserve_exact(n - 1)?;
        children.resize(n - 1, 0);
        for (node, &parent) in parents.iter().enumerate().skip(1) {
            let at = &mut fill[parent as usize];
            children[*at as usize] = node as u32;
            *at += 1;
        }

        // Preorder indices in level order. Logical ids are handed out in the
        // same order, so a node's id is its position here.
        let mut order: Vec<u32> = Vec::new();
        order.try_reserve_exact(n)?;
        storage.slots.try_reserve_exact(n)?;
        storage.push_root(self.data[0].clone());
        order.push(0);

        let mut head = 0;
        while head < order.len() {
            let node = order[head] as usize;
            let range = offsets[node] as usize..offsets[node + 1] as usize;
            for &child in &children[range] {
                let payload = self.data[child as usize].clone();
                let id = storage.insert_child(head as u32, payload, tree.config(), tree.hot_capacity())?;
                debug_assert_eq!(id as usize, order.len());
                order.push(child);
            }
            head += 1;
        }
        Ok(storage)
    }
}

impl<T: Clone> NaryTree<T> {
    /// Encode topology and payloads. An empty tree gives an empty encoding.
    pub fn encode_succinct(&self) -> Result<SuccinctEncoding<T>> {
        let n = self.size();
        let mut bits = BitWriter::with_bits(2 * n)?;
        let mut data = Vec::new();
        data.try_reserve_exact(n)?;

        let mut open = 0;
        for visit in self.iter_preorder() {
            while open > visit.depth {
                bits.push(false);
                open -= 1;
            }
            bits.push(true);
            data.push(visit.payload.clone());
            open += 1;
        }
        for _ in 0..open {
            bits.push(false);
        }

        debug_assert_eq!(bits.len, 2 * n);
        Ok(SuccinctEncoding {
            structure: bits.bytes,
            bit_len: bits.len,
            data,
        })
    }

    /// Rebuild a tree from an encoding. Same as
    /// [`SuccinctEncoding::decode_with`].
    pub fn from_succinct(encoding: &SuccinctEncoding<T>, config: TreeConfig) -> Result<Self> {
        encoding.decode_with(config)
    }
}
