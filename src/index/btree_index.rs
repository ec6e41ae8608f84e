use std::fmt::Write as _;
use std::sync::Arc;

use log::debug;

use crate::buffer::{BasicPageGuard, BufferPoolManager};
use crate::common::{PageId, RecordId, Result, INVALID_PAGE_ID};

use super::btree_page::{
    BTreePageRef, HeaderPage, HeaderPageRef, InternalPage, InternalPageRef, LeafPage, LeafPageRef,
    INTERNAL_CAPACITY, LEAF_CAPACITY,
};
use super::btree_iterator::IndexIterator;

/// Disk-resident B+ tree index with unique u32 keys and RecordId values.
///
/// All node access goes through buffer pool page guards; inter-node links
/// are page IDs, never memory pointers. The root's identity lives in a
/// persistent header page, so an empty tree is just a header whose root
/// field is the invalid sentinel.
///
/// Lookups may run concurrently (they take read-latched guards page by
/// page); insert and remove assume they are serialized externally per tree.
pub struct BPlusTree {
    header_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    leaf_max_size: usize,
    internal_max_size: usize,
}

/// Ancestor trail recorded on the way down: each internal node visited,
/// together with the child slot the descent took.
type AncestorStack = Vec<(BasicPageGuard, usize)>;

impl BPlusTree {
    /// Creates a new, empty tree, allocating its header page.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let leaf_max_size = leaf_max_size.min(LEAF_CAPACITY);
        let internal_max_size = internal_max_size.min(INTERNAL_CAPACITY);
        assert!(leaf_max_size >= 2, "leaf_max_size must be at least 2");
        assert!(internal_max_size >= 3, "internal_max_size must be at least 3");

        let mut header_guard = bpm.new_page_guarded()?;
        let header_page_id = header_guard.page_id();
        HeaderPage::init(&mut header_guard.data_mut()[..]);
        drop(header_guard);

        Ok(Self {
            header_page_id,
            bpm,
            leaf_max_size,
            internal_max_size,
        })
    }

    /// Re-attaches to a tree by its persisted header page.
    pub fn open(
        header_page_id: PageId,
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        Self {
            header_page_id,
            bpm,
            leaf_max_size: leaf_max_size.min(LEAF_CAPACITY),
            internal_max_size: internal_max_size.min(INTERNAL_CAPACITY),
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn root_page_id(&self) -> Result<PageId> {
        let guard = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(HeaderPageRef::new(guard.data()).root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.root_page_id()?.is_valid())
    }

    /// Point lookup.
    pub fn get(&self, key: u32) -> Result<Option<RecordId>> {
        let root_id = self.root_page_id()?;
        if !root_id.is_valid() {
            return Ok(None);
        }

        let mut page_id = root_id;
        loop {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let data = guard.data();
            if BTreePageRef::new(data).is_leaf() {
                let leaf = LeafPageRef::new(data);
                return Ok(leaf.search_key(key).map(|slot| leaf.record_at(slot)));
            }
            let node = InternalPageRef::new(data);
            let idx = node.search_key(key) - 1;
            page_id = node.child_at(idx);
        }
    }

    /// Inserts a key/record pair. Returns Ok(false) without mutating
    /// anything if the key is already present.
    pub fn insert(&self, key: u32, rid: RecordId) -> Result<bool> {
        let mut header_guard = self.bpm.fetch_page_basic(self.header_page_id)?;
        let root_id = HeaderPageRef::new(&header_guard.data()[..]).root_page_id();

        // Empty tree: the new leaf becomes the root.
        if !root_id.is_valid() {
            let mut leaf_guard = self.bpm.new_page_guarded()?;
            let leaf_id = leaf_guard.page_id();
            {
                let mut data = leaf_guard.data_mut();
                let mut leaf = LeafPage::init(&mut data[..], self.leaf_max_size);
                leaf.insert(key, rid);
            }
            HeaderPage::new(&mut header_guard.data_mut()[..]).set_root_page_id(leaf_id);
            debug!("created root leaf {}", leaf_id);
            return Ok(true);
        }

        let (mut leaf_guard, mut stack) = self.descend(root_id, key)?;

        let has_room = {
            let data = leaf_guard.data();
            let leaf = LeafPageRef::new(&data[..]);
            if leaf.search_key(key).is_some() {
                return Ok(false);
            }
            leaf.size() < self.leaf_max_size
        };

        if has_room {
            let mut data = leaf_guard.data_mut();
            LeafPage::new(&mut data[..]).insert(key, rid);
            return Ok(true);
        }

        // Leaf is full: split it, then push the separator upward.
        let leaf_id = leaf_guard.page_id();
        let mut new_leaf_guard = self.bpm.new_page_guarded()?;
        let new_leaf_id = new_leaf_guard.page_id();

        let separator = {
            let mut old_data = leaf_guard.data_mut();
            let mut old_leaf = LeafPage::new(&mut old_data[..]);

            let divide = (self.leaf_max_size - 1) / 2;
            let moved = old_leaf.split_off(divide + 1);

            let mut new_data = new_leaf_guard.data_mut();
            let mut new_leaf = LeafPage::init(&mut new_data[..], self.leaf_max_size);
            new_leaf.extend(&moved);

            // The pending entry goes to whichever half owns its key range
            if key >= new_leaf.key_at(0) {
                new_leaf.insert(key, rid);
            } else {
                old_leaf.insert(key, rid);
            }

            new_leaf.set_next_page_id(old_leaf.next_page_id());
            old_leaf.set_next_page_id(new_leaf_id);
            new_leaf.key_at(0)
        };
        debug!(
            "split leaf {} -> new sibling {}, separator {}",
            leaf_id, new_leaf_id, separator
        );
        drop(new_leaf_guard);
        drop(leaf_guard);

        let mut pending = (separator, new_leaf_id);
        // Left node of the pending separator; becomes the old root's stand-in
        // once the stack runs dry.
        let mut split_left = leaf_id;

        while let Some((mut node_guard, _child_idx)) = stack.pop() {
            let has_room = {
                let data = node_guard.data();
                InternalPageRef::new(&data[..]).size() < self.internal_max_size
            };

            if has_room {
                let mut data = node_guard.data_mut();
                InternalPage::new(&mut data[..]).insert_entry(pending.0, pending.1);
                return Ok(true);
            }

            split_left = node_guard.page_id();
            pending = self.split_internal(&mut node_guard, pending)?;
        }

        // Propagation reached the old root: grow the tree by one level.
        let mut root_guard = self.bpm.new_page_guarded()?;
        let new_root_id = root_guard.page_id();
        {
            let mut data = root_guard.data_mut();
            let mut root = InternalPage::init(&mut data[..], self.internal_max_size);
            root.populate_root(split_left, pending.0, pending.1);
        }
        HeaderPage::new(&mut header_guard.data_mut()[..]).set_root_page_id(new_root_id);
        debug!("promoted new root {}", new_root_id);
        Ok(true)
    }

    /// Removes a key. Absent keys are a no-op.
    pub fn remove(&self, key: u32) -> Result<()> {
        let mut header_guard = self.bpm.fetch_page_basic(self.header_page_id)?;
        let root_id = HeaderPageRef::new(&header_guard.data()[..]).root_page_id();
        if !root_id.is_valid() {
            return Ok(());
        }

        let (mut leaf_guard, mut stack) = self.descend(root_id, key)?;
        let leaf_id = leaf_guard.page_id();

        let slot = {
            let data = leaf_guard.data();
            match LeafPageRef::new(&data[..]).search_key(key) {
                None => return Ok(()),
                Some(slot) => slot,
            }
        };

        let new_size = {
            let mut data = leaf_guard.data_mut();
            let mut leaf = LeafPage::new(&mut data[..]);
            leaf.remove_at(slot);
            leaf.size()
        };

        if leaf_id == root_id {
            // The root leaf may shrink below min occupancy; it is only
            // discarded once it is completely empty.
            if new_size == 0 {
                HeaderPage::new(&mut header_guard.data_mut()[..])
                    .set_root_page_id(INVALID_PAGE_ID);
                debug!("tree emptied, root leaf {} released", leaf_id);
                drop(leaf_guard);
                self.bpm.delete_page(leaf_id)?;
            }
            return Ok(());
        }

        if new_size >= self.leaf_max_size / 2 {
            return Ok(());
        }

        let (mut parent_guard, child_idx) = stack.pop().expect("non-root leaf has a parent");
        let merged = self.rebalance_leaf(leaf_guard, &mut parent_guard, child_idx)?;
        if !merged {
            return Ok(());
        }

        // A merge removed a separator from the parent; cascade upward while
        // internal nodes underflow.
        let mut current_guard = parent_guard;
        loop {
            let current_id = current_guard.page_id();
            let size = {
                let data = current_guard.data();
                InternalPageRef::new(&data[..]).size()
            };

            if stack.is_empty() {
                // current is the root; it collapses once a single child is left
                if size == 1 {
                    let child = {
                        let data = current_guard.data();
                        InternalPageRef::new(&data[..]).child_at(0)
                    };
                    HeaderPage::new(&mut header_guard.data_mut()[..]).set_root_page_id(child);
                    debug!("root {} collapsed into {}", current_id, child);
                    drop(current_guard);
                    self.bpm.delete_page(current_id)?;
                }
                return Ok(());
            }

            if size >= self.internal_max_size / 2 {
                return Ok(());
            }

            let (mut parent_guard, idx) = stack.pop().expect("stack checked non-empty");
            let merged = self.rebalance_internal(current_guard, &mut parent_guard, idx)?;
            if !merged {
                return Ok(());
            }
            current_guard = parent_guard;
        }
    }

    /// Forward iterator positioned at the smallest key.
    pub fn iter(&self) -> Result<IndexIterator> {
        let root_id = self.root_page_id()?;
        if !root_id.is_valid() {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }

        let mut page_id = root_id;
        loop {
            let guard = self.bpm.fetch_page_basic(page_id)?;
            let next = {
                let data = guard.data();
                if BTreePageRef::new(&data[..]).is_leaf() {
                    None
                } else {
                    Some(InternalPageRef::new(&data[..]).child_at(0))
                }
            };
            match next {
                None => return Ok(IndexIterator::new(Arc::clone(&self.bpm), guard, 0)),
                Some(child) => page_id = child,
            }
        }
    }

    /// Forward iterator positioned at the first key >= the probe.
    pub fn iter_from(&self, key: u32) -> Result<IndexIterator> {
        let root_id = self.root_page_id()?;
        if !root_id.is_valid() {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }

        let (leaf_guard, _stack) = self.descend(root_id, key)?;
        let offset = {
            let data = leaf_guard.data();
            LeafPageRef::new(&data[..]).lower_bound(key)
        };
        Ok(IndexIterator::new(Arc::clone(&self.bpm), leaf_guard, offset))
    }

    /// Renders the tree structure for debugging and tests.
    pub fn pretty_print(&self) -> Result<String> {
        let root_id = self.root_page_id()?;
        let mut out = String::new();
        if !root_id.is_valid() {
            out.push_str("(empty)\n");
            return Ok(out);
        }
        self.print_node(root_id, 0, &mut out)?;
        Ok(out)
    }

    fn print_node(&self, page_id: PageId, depth: usize, out: &mut String) -> Result<()> {
        let guard = self.bpm.fetch_page_basic(page_id)?;
        let (line, children) = {
            let data = guard.data();
            if BTreePageRef::new(&data[..]).is_leaf() {
                let leaf = LeafPageRef::new(&data[..]);
                let keys: Vec<String> = (0..leaf.size()).map(|i| leaf.key_at(i).to_string()).collect();
                (
                    format!(
                        "{}Leaf {} [{}] -> {}",
                        "  ".repeat(depth),
                        page_id,
                        keys.join(", "),
                        leaf.next_page_id()
                    ),
                    Vec::new(),
                )
            } else {
                let node = InternalPageRef::new(&data[..]);
                let keys: Vec<String> = (1..node.size()).map(|i| node.key_at(i).to_string()).collect();
                let children: Vec<PageId> = (0..node.size()).map(|i| node.child_at(i)).collect();
                (
                    format!("{}Internal {} [{}]", "  ".repeat(depth), page_id, keys.join(", ")),
                    children,
                )
            }
        };
        drop(guard);

        writeln!(out, "{}", line).expect("writing to a String cannot fail");
        for child in children {
            self.print_node(child, depth + 1, out)?;
        }
        Ok(())
    }

    /// Walks from the root to the leaf owning `key`, recording every internal
    /// node and the child slot taken.
    fn descend(&self, root_id: PageId, key: u32) -> Result<(BasicPageGuard, AncestorStack)> {
        let mut stack = AncestorStack::new();
        let mut guard = self.bpm.fetch_page_basic(root_id)?;

        loop {
            let step = {
                let data = guard.data();
                if BTreePageRef::new(&data[..]).is_leaf() {
                    None
                } else {
                    let node = InternalPageRef::new(&data[..]);
                    let idx = node.search_key(key) - 1;
                    Some((node.child_at(idx), idx))
                }
            };

            match step {
                None => return Ok((guard, stack)),
                Some((child_id, idx)) => {
                    let child_guard = self.bpm.fetch_page_basic(child_id)?;
                    stack.push((guard, idx));
                    guard = child_guard;
                }
            }
        }
    }

    /// Splits a full internal node around the pending separator and returns
    /// the promoted (separator, new node) pair for the next level up.
    ///
    /// The split is derived from the separator invariant: conceptually the
    /// pending entry joins the full entry array, the left node keeps the
    /// first divide+1 children, the entry after them is promoted, and its
    /// child seeds the right node's slot 0.
    fn split_internal(
        &self,
        guard: &mut BasicPageGuard,
        pending: (u32, PageId),
    ) -> Result<(u32, PageId)> {
        let mut new_guard = self.bpm.new_page_guarded()?;
        let new_id = new_guard.page_id();
        let node_id = guard.page_id();

        let promoted_key = {
            let mut data = guard.data_mut();
            let mut node = InternalPage::new(&mut data[..]);

            let mut entries = node.view().entries();
            let pos = entries[1..].partition_point(|&(k, _)| k <= pending.0) + 1;
            entries.insert(pos, pending);

            let divide = self.internal_max_size / 2;
            let promoted_key = entries[divide + 1].0;

            let mut new_data = new_guard.data_mut();
            let mut new_node = InternalPage::init(&mut new_data[..], self.internal_max_size);
            new_node.write_entries(&entries[divide + 1..]);
            node.write_entries(&entries[..divide + 1]);
            promoted_key
        };

        debug!(
            "split internal {} -> new sibling {}, separator {}",
            node_id, new_id, promoted_key
        );
        Ok((promoted_key, new_id))
    }

    /// Fixes a leaf underflow by borrowing from a sibling or merging with
    /// one. Returns true when a merge removed a separator from the parent.
    fn rebalance_leaf(
        &self,
        mut leaf_guard: BasicPageGuard,
        parent_guard: &mut BasicPageGuard,
        child_idx: usize,
    ) -> Result<bool> {
        let leaf_min = self.leaf_max_size / 2;
        let leaf_id = leaf_guard.page_id();

        let (left_id, right_id) = {
            let data = parent_guard.data();
            let parent = InternalPageRef::new(&data[..]);
            let left = (child_idx > 0).then(|| parent.child_at(child_idx - 1));
            let right = (child_idx + 1 < parent.size()).then(|| parent.child_at(child_idx + 1));
            (left, right)
        };

        let mut left_guard = match left_id {
            Some(id) => Some(self.bpm.fetch_page_basic(id)?),
            None => None,
        };
        let mut right_guard = match right_id {
            Some(id) => Some(self.bpm.fetch_page_basic(id)?),
            None => None,
        };

        let left_size = left_guard
            .as_ref()
            .map(|g| LeafPageRef::new(&g.data()[..]).size());
        let right_size = right_guard
            .as_ref()
            .map(|g| LeafPageRef::new(&g.data()[..]).size());

        // Borrow the left sibling's largest entry
        if let (Some(lg), Some(lsize)) = (left_guard.as_mut(), left_size) {
            if lsize > leaf_min {
                let (k, v) = {
                    let mut data = lg.data_mut();
                    let mut left = LeafPage::new(&mut data[..]);
                    let last = left.size() - 1;
                    let entry = (left.key_at(last), left.record_at(last));
                    left.remove_at(last);
                    entry
                };
                {
                    let mut data = leaf_guard.data_mut();
                    LeafPage::new(&mut data[..]).insert(k, v);
                }
                let mut data = parent_guard.data_mut();
                InternalPage::new(&mut data[..]).set_key_at(child_idx, k);
                debug!("leaf {} borrowed key {} from left sibling", leaf_id, k);
                return Ok(false);
            }
        }

        // Borrow the right sibling's smallest entry
        if let (Some(rg), Some(rsize)) = (right_guard.as_mut(), right_size) {
            if rsize > leaf_min {
                let (k, v, new_sep) = {
                    let mut data = rg.data_mut();
                    let mut right = LeafPage::new(&mut data[..]);
                    let entry = (right.key_at(0), right.record_at(0));
                    right.remove_at(0);
                    (entry.0, entry.1, right.key_at(0))
                };
                {
                    let mut data = leaf_guard.data_mut();
                    LeafPage::new(&mut data[..]).insert(k, v);
                }
                let mut data = parent_guard.data_mut();
                InternalPage::new(&mut data[..]).set_key_at(child_idx + 1, new_sep);
                debug!("leaf {} borrowed key {} from right sibling", leaf_id, k);
                return Ok(false);
            }
        }

        // No sibling can lend: merge with the larger one (ties go left).
        let merge_left = match (left_size, right_size) {
            (Some(l), Some(r)) => l >= r,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => unreachable!("non-root node always has a sibling"),
        };

        if merge_left {
            let lg = left_guard.as_mut().expect("merge_left requires a left sibling");
            let (entries, leaf_next) = {
                let data = leaf_guard.data();
                let leaf = LeafPageRef::new(&data[..]);
                (leaf.entries(), leaf.next_page_id())
            };
            {
                let mut data = lg.data_mut();
                let mut left = LeafPage::new(&mut data[..]);
                left.extend(&entries);
                left.set_next_page_id(leaf_next);
            }
            {
                let mut data = parent_guard.data_mut();
                InternalPage::new(&mut data[..]).remove_at(child_idx);
            }
            debug!("merged leaf {} into its left sibling", leaf_id);
            drop(leaf_guard);
            drop(left_guard);
            drop(right_guard);
            self.bpm.delete_page(leaf_id)?;
        } else {
            let rg = right_guard.as_mut().expect("checked above");
            let right_page_id = rg.page_id();
            let (entries, right_next) = {
                let data = rg.data();
                let right = LeafPageRef::new(&data[..]);
                (right.entries(), right.next_page_id())
            };
            {
                let mut data = leaf_guard.data_mut();
                let mut leaf = LeafPage::new(&mut data[..]);
                leaf.extend(&entries);
                leaf.set_next_page_id(right_next);
            }
            {
                let mut data = parent_guard.data_mut();
                InternalPage::new(&mut data[..]).remove_at(child_idx + 1);
            }
            debug!("merged right sibling {} into leaf {}", right_page_id, leaf_id);
            drop(leaf_guard);
            drop(left_guard);
            drop(right_guard);
            self.bpm.delete_page(right_page_id)?;
        }

        Ok(true)
    }

    /// Fixes an internal-node underflow. Returns true when a merge removed a
    /// separator from the parent.
    fn rebalance_internal(
        &self,
        mut node_guard: BasicPageGuard,
        parent_guard: &mut BasicPageGuard,
        child_idx: usize,
    ) -> Result<bool> {
        let internal_min = self.internal_max_size / 2;
        let node_id = node_guard.page_id();

        let (left_id, right_id) = {
            let data = parent_guard.data();
            let parent = InternalPageRef::new(&data[..]);
            let left = (child_idx > 0).then(|| parent.child_at(child_idx - 1));
            let right = (child_idx + 1 < parent.size()).then(|| parent.child_at(child_idx + 1));
            (left, right)
        };

        let mut left_guard = match left_id {
            Some(id) => Some(self.bpm.fetch_page_basic(id)?),
            None => None,
        };
        let mut right_guard = match right_id {
            Some(id) => Some(self.bpm.fetch_page_basic(id)?),
            None => None,
        };

        let left_size = left_guard
            .as_ref()
            .map(|g| InternalPageRef::new(&g.data()[..]).size());
        let right_size = right_guard
            .as_ref()
            .map(|g| InternalPageRef::new(&g.data()[..]).size());

        // Borrow the left sibling's last child; the parent separator rotates
        // down into this node and the left sibling's last key rotates up.
        if let (Some(lg), Some(lsize)) = (left_guard.as_mut(), left_size) {
            if lsize > internal_min {
                let (moved_key, moved_child) = {
                    let mut data = lg.data_mut();
                    let mut left = InternalPage::new(&mut data[..]);
                    let last = left.size() - 1;
                    let entry = (left.key_at(last), left.child_at(last));
                    left.remove_at(last);
                    entry
                };
                let old_sep = {
                    let data = parent_guard.data();
                    InternalPageRef::new(&data[..]).key_at(child_idx)
                };
                {
                    let mut data = node_guard.data_mut();
                    InternalPage::new(&mut data[..]).push_front(moved_child, old_sep);
                }
                let mut data = parent_guard.data_mut();
                InternalPage::new(&mut data[..]).set_key_at(child_idx, moved_key);
                debug!("internal {} borrowed a child from its left sibling", node_id);
                return Ok(false);
            }
        }

        // Borrow the right sibling's first child symmetrically.
        if let (Some(rg), Some(rsize)) = (right_guard.as_mut(), right_size) {
            if rsize > internal_min {
                let old_sep = {
                    let data = parent_guard.data();
                    InternalPageRef::new(&data[..]).key_at(child_idx + 1)
                };
                let (head_child, new_sep) = {
                    let mut data = rg.data_mut();
                    let mut right = InternalPage::new(&mut data[..]);
                    let new_sep = right.key_at(1);
                    let head = right.pop_front();
                    (head, new_sep)
                };
                {
                    let mut data = node_guard.data_mut();
                    InternalPage::new(&mut data[..]).push_back(old_sep, head_child);
                }
                let mut data = parent_guard.data_mut();
                InternalPage::new(&mut data[..]).set_key_at(child_idx + 1, new_sep);
                debug!("internal {} borrowed a child from its right sibling", node_id);
                return Ok(false);
            }
        }

        let merge_left = match (left_size, right_size) {
            (Some(l), Some(r)) => l >= r,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => unreachable!("non-root node always has a sibling"),
        };

        if merge_left {
            let lg = left_guard.as_mut().expect("merge_left requires a left sibling");
            let sep = {
                let data = parent_guard.data();
                InternalPageRef::new(&data[..]).key_at(child_idx)
            };
            let entries = {
                let data = node_guard.data();
                InternalPageRef::new(&data[..]).entries()
            };
            {
                let mut data = lg.data_mut();
                let mut left = InternalPage::new(&mut data[..]);
                // The separator becomes the key over the absorbed head child
                left.push_back(sep, entries[0].1);
                for &(k, c) in &entries[1..] {
                    left.push_back(k, c);
                }
            }
            {
                let mut data = parent_guard.data_mut();
                InternalPage::new(&mut data[..]).remove_at(child_idx);
            }
            debug!("merged internal {} into its left sibling", node_id);
            drop(node_guard);
            drop(left_guard);
            drop(right_guard);
            self.bpm.delete_page(node_id)?;
        } else {
            let rg = right_guard.as_mut().expect("checked above");
            let right_page_id = rg.page_id();
            let sep = {
                let data = parent_guard.data();
                InternalPageRef::new(&data[..]).key_at(child_idx + 1)
            };
            let entries = {
                let data = rg.data();
                InternalPageRef::new(&data[..]).entries()
            };
            {
                let mut data = node_guard.data_mut();
                let mut node = InternalPage::new(&mut data[..]);
                node.push_back(sep, entries[0].1);
                for &(k, c) in &entries[1..] {
                    node.push_back(k, c);
                }
            }
            {
                let mut data = parent_guard.data_mut();
                InternalPage::new(&mut data[..]).remove_at(child_idx + 1);
            }
            debug!("merged right sibling {} into internal {}", right_page_id, node_id);
            drop(node_guard);
            drop(left_guard);
            drop(right_guard);
            self.bpm.delete_page(right_page_id)?;
        }

        Ok(true)
    }
}
