//! Hashed representation of a descriptor set
//!
//! A [`HashedSet`] is built in one pass from a descriptor matrix and is
//! read-only afterwards. It holds, index-parallel to the matrix rows:
//!
//! - the primary binary code of every descriptor (packed `u64` words);
//! - one bucket id per group for every descriptor;
//! - one bucket table per group mapping `bucket id → row indices`.
//!
//! Codes and bucket ids are stored in flat arrays with a fixed stride, the
//! same way the projection hyperplanes are.

/// Borrowed view of one hashed descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashedDescriptor<'a> {
    /// Primary binary code, `ceil(D / 64)` words.
    pub code: &'a [u64],
    /// Bucket id in each group.
    pub bucket_ids: &'a [u16],
}

/// Row indices sharing one bucket.
pub type Bucket = Vec<u32>;

/// Hashed descriptors plus their bucket tables.
#[derive(Clone, Debug)]
pub struct HashedSet {
    len: usize,
    dimensions: usize,
    code_words: usize,
    bucket_groups: usize,
    codes: Vec<u64>,
    bucket_ids: Vec<u16>,
    /// buckets[group][bucket_id] -> row indices, ascending
    buckets: Vec<Vec<Bucket>>,
}

impl HashedSet {
    /// Assemble a set from per-row codes and bucket ids.
    ///
    /// `codes` holds `len * code_words` words and `bucket_ids` holds
    /// `len * bucket_groups` ids, both row-major. Rows are appended to their
    /// buckets in ascending order.
    pub(crate) fn from_parts(
        dimensions: usize,
        code_words: usize,
        bucket_groups: usize,
        buckets_per_group: usize,
        codes: Vec<u64>,
        bucket_ids: Vec<u16>,
    ) -> Self {
        let len = if bucket_groups == 0 {
            0
        } else {
            bucket_ids.len() / bucket_groups
        };
        debug_assert_eq!(codes.len(), len * code_words);

        let mut buckets: Vec<Vec<Bucket>> = (0..bucket_groups)
            .map(|_| vec![Vec::new(); buckets_per_group])
            .collect();

        for (row, ids) in bucket_ids.chunks_exact(bucket_groups.max(1)).enumerate() {
            for (group, &id) in ids.iter().enumerate() {
                buckets[group][id as usize].push(row as u32);
            }
        }

        Self {
            len,
            dimensions,
            code_words,
            bucket_groups,
            codes,
            bucket_ids,
            buckets,
        }
    }

    /// Number of hashed descriptors.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the set holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of the descriptors that were hashed.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of bucket groups.
    pub fn bucket_groups(&self) -> usize {
        self.bucket_groups
    }

    /// Buckets per group.
    pub fn buckets_per_group(&self) -> usize {
        self.buckets.first().map(|g| g.len()).unwrap_or(0)
    }

    /// View of descriptor `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= len()`.
    #[inline]
    pub fn get(&self, row: usize) -> HashedDescriptor<'_> {
        HashedDescriptor {
            code: self.code(row),
            bucket_ids: &self.bucket_ids[row * self.bucket_groups..(row + 1) * self.bucket_groups],
        }
    }

    /// Primary code of descriptor `row`.
    #[inline]
    pub fn code(&self, row: usize) -> &[u64] {
        &self.codes[row * self.code_words..(row + 1) * self.code_words]
    }

    /// Row indices stored in `bucket_id` of `group`.
    #[inline]
    pub fn bucket(&self, group: usize, bucket_id: u16) -> &[u32] {
        &self.buckets[group][bucket_id as usize]
    }

    /// Occupancy of every bucket in `group`.
    pub fn bucket_sizes(&self, group: usize) -> Vec<usize> {
        self.buckets[group].iter().map(|b| b.len()).collect()
    }

    /// Iterate over all hashed descriptors in row order.
    pub fn iter(&self) -> impl Iterator<Item = HashedDescriptor<'_>> + '_ {
        (0..self.len).map(move |row| self.get(row))
    }
}
