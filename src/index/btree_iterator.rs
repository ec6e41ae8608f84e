use std::sync::Arc;

use crate::buffer::{BasicPageGuard, BufferPoolManager};
use crate::common::{PageId, RecordId, Result, INVALID_PAGE_ID};

use super::btree_page::LeafPageRef;

/// Forward iterator over the leaf chain of a B+ tree.
///
/// Holds a pin on the current leaf through a basic guard; advancing past a
/// leaf's last slot releases it and pins the next leaf. Two iterators are
/// equal iff they agree on (page id, offset); the end position is the
/// invalid page at offset 0.
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    guard: Option<BasicPageGuard>,
    page_id: PageId,
    offset: usize,
}

impl IndexIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, guard: BasicPageGuard, offset: usize) -> Self {
        let page_id = guard.page_id();
        Self {
            bpm,
            guard: Some(guard),
            page_id,
            offset,
        }
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            guard: None,
            page_id: INVALID_PAGE_ID,
            offset: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// Current (page id, slot offset) position.
    pub fn position(&self) -> (PageId, usize) {
        (self.page_id, self.offset)
    }

    /// Yields the current entry and advances, walking the sibling chain as
    /// leaves are exhausted. Returns Ok(None) at the end of the sequence.
    pub fn next(&mut self) -> Result<Option<(u32, RecordId)>> {
        loop {
            let Some(guard) = self.guard.as_ref() else {
                return Ok(None);
            };

            let (entry, next_page_id) = {
                let data = guard.data();
                let leaf = LeafPageRef::new(&data[..]);
                let entry = (self.offset < leaf.size())
                    .then(|| (leaf.key_at(self.offset), leaf.record_at(self.offset)));
                (entry, leaf.next_page_id())
            };

            if let Some(entry) = entry {
                self.offset += 1;
                return Ok(Some(entry));
            }

            if !next_page_id.is_valid() {
                self.guard = None;
                self.page_id = INVALID_PAGE_ID;
                self.offset = 0;
                return Ok(None);
            }

            let next_guard = self.bpm.fetch_page_basic(next_page_id)?;
            self.guard = Some(next_guard);
            self.page_id = next_page_id;
            self.offset = 0;
        }
    }
}

impl PartialEq for IndexIterator {
    fn eq(&self, other: &Self) -> bool {
        self.page_id == other.page_id && self.offset == other.offset
    }
}

impl Iterator for IndexIterator {
    type Item = Result<(u32, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match IndexIterator::next(self) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
