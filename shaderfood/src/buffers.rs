//! Shared geometry arrays and the cache that maps them to GPU buffers.
//!
//! Vertex and index arrays are reference counted so that the same
//! array can be handed to many draw calls cheaply.  The GPU copy of an
//! array is made once, the first time it is drawn, and looked up by
//! the identity of the shared allocation afterwards.

use std::collections::HashMap;
use std::sync::Arc;

/// A shared, immutable array of vertex attribute floats.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexData(Arc<[f32]>);

impl VertexData {
    pub fn new(data: impl Into<Arc<[f32]>>) -> Self {
        Self(data.into())
    }
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.0)
    }
}

impl From<Vec<f32>> for VertexData {
    fn from(v: Vec<f32>) -> Self {
        Self(v.into())
    }
}

impl From<&[f32]> for VertexData {
    fn from(v: &[f32]) -> Self {
        Self(v.into())
    }
}

/// A shared, immutable array of indices in one of the two GPU index formats.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexData {
    U16(Arc<[u16]>),
    U32(Arc<[u32]>),
}

impl IndexData {
    /// Builds index data from 32-bit indices, narrowing to 16 bits when every index fits.
    pub fn from_u32(indices: Vec<u32>) -> Self {
        if indices.iter().all(|&i| i <= u16::MAX as u32) {
            Self::U16(indices.into_iter().map(|i| i as u16).collect())
        } else {
            Self::U32(indices.into())
        }
    }
    pub fn len(&self) -> usize {
        match self {
            Self::U16(ix) => ix.len(),
            Self::U32(ix) => ix.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn format(&self) -> wgpu::IndexFormat {
        match self {
            Self::U16(_) => wgpu::IndexFormat::Uint16,
            Self::U32(_) => wgpu::IndexFormat::Uint32,
        }
    }
    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            Self::U16(ix) => ix.get(i).map(|&x| x as u32),
            Self::U32(ix) => ix.get(i).copied(),
        }
    }
    pub fn to_u32(&self) -> Vec<u32> {
        match self {
            Self::U16(ix) => ix.iter().map(|&x| x as u32).collect(),
            Self::U32(ix) => ix.to_vec(),
        }
    }
    /// Bytes suitable for an index buffer.  wgpu wants buffer sizes
    /// in multiples of four, so odd-length u16 arrays get one padding index.
    pub fn to_buffer_bytes(&self) -> Vec<u8> {
        match self {
            Self::U16(ix) => {
                let mut bytes = bytemuck::cast_slice::<u16, u8>(ix).to_vec();
                if bytes.len() % 4 != 0 {
                    bytes.extend_from_slice(&[0, 0]);
                }
                bytes
            }
            Self::U32(ix) => bytemuck::cast_slice(ix).to_vec(),
        }
    }
}

impl From<Vec<u16>> for IndexData {
    fn from(v: Vec<u16>) -> Self {
        Self::U16(v.into())
    }
}

impl From<Vec<u32>> for IndexData {
    fn from(v: Vec<u32>) -> Self {
        Self::U32(v.into())
    }
}

/// Data whose identity is its shared allocation.
pub trait SharedData: Clone {
    /// An address that stays unique for as long as this allocation lives.
    fn identity(&self) -> usize;
    /// Number of live handles to the allocation.
    fn handle_count(&self) -> usize;
}

impl SharedData for VertexData {
    fn identity(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
    fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl SharedData for IndexData {
    fn identity(&self) -> usize {
        match self {
            Self::U16(ix) => Arc::as_ptr(ix).cast::<()>() as usize,
            Self::U32(ix) => Arc::as_ptr(ix).cast::<()>() as usize,
        }
    }
    fn handle_count(&self) -> usize {
        match self {
            Self::U16(ix) => Arc::strong_count(ix),
            Self::U32(ix) => Arc::strong_count(ix),
        }
    }
}

/// Memoizes one `B` (usually a [`wgpu::Buffer`]) per shared data allocation.
///
/// Each entry holds a handle to its key data, which keeps the
/// allocation alive: an address in the cache can never be recycled
/// for a different array while its entry exists.
pub struct BufferCache<D: SharedData, B> {
    entries: HashMap<usize, (D, B)>,
}

impl<D: SharedData, B> Default for BufferCache<D, B> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<D: SharedData, B> BufferCache<D, B> {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the memoized value for `data`, calling `make` only the first time.
    pub fn get_or_insert_with(&mut self, data: &D, make: impl FnOnce(&D) -> B) -> &B {
        &self
            .entries
            .entry(data.identity())
            .or_insert_with(|| (data.clone(), make(data)))
            .1
    }
    pub fn get(&self, data: &D) -> Option<&B> {
        self.entries.get(&data.identity()).map(|(_, b)| b)
    }
    pub fn contains(&self, data: &D) -> bool {
        self.entries.contains_key(&data.identity())
    }
    /// Drops every entry whose data is no longer referenced outside the cache.
    pub fn release_unused(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (d, _)| d.handle_count() > 1);
        before - self.entries.len()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_computes_once_per_allocation() {
        let mut cache: BufferCache<VertexData, usize> = BufferCache::new();
        let a = VertexData::from(vec![1.0, 2.0, 3.0]);
        let a2 = a.clone();
        let mut made = 0;
        cache.get_or_insert_with(&a, |_| {
            made += 1;
            10
        });
        let got = *cache.get_or_insert_with(&a2, |_| {
            made += 1;
            20
        });
        assert_eq!(made, 1);
        assert_eq!(got, 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn equal_contents_in_different_allocations_are_distinct() {
        let mut cache: BufferCache<VertexData, usize> = BufferCache::new();
        let a = VertexData::from(vec![1.0, 2.0]);
        let b = VertexData::from(vec![1.0, 2.0]);
        cache.get_or_insert_with(&a, |_| 1);
        cache.get_or_insert_with(&b, |_| 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&b), Some(&2));
    }

    #[test]
    fn release_unused_keeps_live_data() {
        let mut cache: BufferCache<IndexData, ()> = BufferCache::new();
        let live = IndexData::from(vec![0u16, 1, 2]);
        cache.get_or_insert_with(&live, |_| ());
        {
            let dead = IndexData::from(vec![3u16, 4, 5]);
            cache.get_or_insert_with(&dead, |_| ());
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.release_unused(), 1);
        assert!(cache.contains(&live));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn index_data_narrows_when_it_fits() {
        let small = IndexData::from_u32(vec![0, 1, 65535]);
        assert_eq!(small.format(), wgpu::IndexFormat::Uint16);
        let big = IndexData::from_u32(vec![0, 65536]);
        assert_eq!(big.format(), wgpu::IndexFormat::Uint32);
        assert_eq!(big.get(1), Some(65536));
        assert_eq!(small.to_u32(), vec![0, 1, 65535]);
    }

    #[test]
    fn odd_u16_index_bytes_are_padded() {
        let ix = IndexData::from(vec![0u16, 1, 2]);
        assert_eq!(ix.to_buffer_bytes().len(), 8);
        let ix = IndexData::from(vec![0u16, 1]);
        assert_eq!(ix.to_buffer_bytes().len(), 4);
    }
}
