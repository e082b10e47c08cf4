//! Paged heap backing progressively built objects

use crate::consts::DEFAULT_PAGE_SIZE;

struct Page {
    data: Vec<u8>,
    used: usize,
    next: Option<Box<Page>>,
}

impl Page {
    fn with_capacity(capacity: usize) -> Box<Self> {
        Box::new(Self {
            data: vec![0; capacity],
            used: 0,
            next: None,
        })
    }
}

/// Singly-linked chain of fixed-capacity byte pages.
///
/// The head of the chain is the page currently being written, so reading the
/// chain front-to-back visits pages in reverse allocation order; [`flip`]
/// reverses the chain once writing is over, after which page indices match
/// allocation order. There is no compaction and no per-element freeing.
///
/// [`flip`]: MemoryPage::flip
pub struct MemoryPage {
    head: Option<Box<Page>>,
    count: usize,
    default_size: usize,
    sealed: bool,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl MemoryPage {
    /// Empty chain; pages opened by [`allocate`](MemoryPage::allocate) get
    /// at least `default_size` bytes.
    pub fn new(default_size: usize) -> Self {
        Self {
            head: None,
            count: 0,
            default_size: default_size.max(1),
            sealed: false,
        }
    }

    /// Number of pages in the chain.
    pub const fn page_count(&self) -> usize {
        self.count
    }

    /// Capacity of the current page.
    pub fn capacity(&self) -> usize {
        self.head.as_ref().map_or(0, |page| page.data.len())
    }

    /// Bytes already written to the current page.
    pub fn used(&self) -> usize {
        self.head.as_ref().map_or(0, |page| page.used)
    }

    /// True when the current page can take `n` more bytes.
    pub fn fits(&self, n: usize) -> bool {
        !self.sealed
            && self
                .head
                .as_ref()
                .is_some_and(|page| page.data.len() - page.used >= n)
    }

    /// Reserves `n` bytes, opening a fresh page of `max(default, n)` bytes
    /// when the current one is sealed, full or absent. Returns the location
    /// as (page index in allocation order, byte offset).
    pub fn allocate(&mut self, n: usize) -> (usize, usize) {
        if !self.fits(n) {
            self.open(self.default_size.max(n));
        }
        // fits() guarantees a head page with room
        let page = match self.head.as_mut() {
            Some(page) => page,
            None => unreachable!(),
        };
        let offset = page.used;
        page.used += n;
        (self.count - 1, offset)
    }

    /// Reserves room for `bytes` and copies them in; returns the location.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> (usize, usize) {
        let (page_index, offset) = self.allocate(bytes.len());
        if let Some(page) = self.head.as_mut() {
            page.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        (page_index, offset)
    }

    /// Enlarges the current page to at least `capacity` bytes. Data in
    /// earlier pages keeps its location.
    pub fn grow(&mut self, capacity: usize) {
        if let Some(page) = self.head.as_mut() {
            if page.data.len() < capacity {
                page.data.resize(capacity, 0);
            }
        }
    }

    /// Closes the current page; the next allocation opens a fresh one.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Drops the unwritten tail of the current page.
    pub fn trim(&mut self) {
        if let Some(page) = self.head.as_mut() {
            page.data.truncate(page.used);
            page.data.shrink_to_fit();
        }
    }

    /// Reverses the chain so the first-allocated page comes first.
    pub fn flip(&mut self) {
        let mut reversed = None;
        let mut node = self.head.take();
        while let Some(mut page) = node {
            node = page.next.take();
            page.next = reversed;
            reversed = Some(page);
        }
        self.head = reversed;
    }

    /// Frees every page.
    pub fn clean(&mut self) {
        // drop iteratively so long chains cannot recurse
        let mut node = self.head.take();
        while let Some(mut page) = node {
            node = page.next.take();
        }
        self.count = 0;
        self.sealed = false;
    }

    /// Written bytes of page `index`, counted from the chain head.
    pub fn page(&self, index: usize) -> Option<&[u8]> {
        self.iter().nth(index)
    }

    /// Iterates the written bytes of each page, from the chain head.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        let mut node = self.head.as_deref();
        std::iter::from_fn(move || {
            let page = node?;
            node = page.next.as_deref();
            Some(&page.data[..page.used])
        })
    }

    fn open(&mut self, capacity: usize) {
        let mut page = Page::with_capacity(capacity);
        page.next = self.head.take();
        self.head = Some(page);
        self.count += 1;
        self.sealed = false;
    }
}

impl Drop for MemoryPage {
    fn drop(&mut self) {
        self.clean();
    }
}
