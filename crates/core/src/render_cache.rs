use std::collections::{HashMap, VecDeque};

/// Rendered page bitmaps keyed by page and zoom.
///
/// Each page holds at most one entry. Storing a render at a new zoom replaces the
/// page's previous render, and a lookup only hits when the zoom matches exactly.
#[derive(Debug, Clone)]
pub struct RenderCache<V> {
    capacity: usize,
    entries: HashMap<usize, (f32, V)>,
    order: VecDeque<usize>,
}

impl<V> RenderCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: HashMap::new(), order: VecDeque::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, page: usize, zoom: f32) -> Option<&V> {
        let hit = self.entries.get(&page).is_some_and(|(cached_zoom, _)| *cached_zoom == zoom);
        if !hit {
            return None;
        }

        self.touch(page);
        self.entries.get(&page).map(|(_, value)| value)
    }

    pub fn insert(&mut self, page: usize, zoom: f32, value: V) {
        if self.entries.insert(page, (zoom, value)).is_some() {
            self.touch(page);
            return;
        }

        self.order.push_back(page);
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Drops the page's entry if it was rendered at a different zoom.
    pub fn invalidate_stale(&mut self, page: usize, zoom: f32) {
        if self.entries.get(&page).is_some_and(|(cached_zoom, _)| *cached_zoom != zoom) {
            self.remove(page);
        }
    }

    pub fn remove(&mut self, page: usize) -> Option<V> {
        self.order.retain(|existing| *existing != page);
        self.entries.remove(&page).map(|(_, value)| value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn touch(&mut self, page: usize) {
        if let Some(index) = self.order.iter().position(|existing| *existing == page) {
            let Some(found) = self.order.remove(index) else {
                return;
            };
            self.order.push_back(found);
        }
    }
}
