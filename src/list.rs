use crate::error::ConsoleError;
use crate::input::{Action, KeySpec, Keymap};
use crate::model::PanelKind;
use crate::registry::Panel;
use chrono::{DateTime, Local};
use crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub title: &'static str,
    /// Width bounds as fractions of the panel width.
    pub min: f32,
    pub max: f32,
}

impl Column {
    pub const fn new(title: &'static str, min: f32, max: f32) -> Self {
        Self { title, min, max }
    }
}

/// Display snapshot of one backend object.
pub trait ResourceRow: Clone {
    type Source: Clone;

    const PANEL: PanelKind;
    const NOUN: &'static str;
    const COLUMNS: &'static [Column];

    fn from_source(source: &Self::Source) -> Self;

    /// Text the filter matches against.
    fn display_name(source: &Self::Source) -> String;

    fn cells(&self) -> Vec<String>;

    /// Row-type specific bindings layered over the shared list keys.
    fn bindings(keymap: Keymap) -> Keymap;
}

/// Case-insensitive substring filter that keeps backend order.
pub fn filter_rows<R: ResourceRow>(source: &[R::Source], filter: &str) -> Vec<R> {
    let needle = filter.to_lowercase();
    source
        .iter()
        .filter(|item| needle.is_empty() || R::display_name(item).to_lowercase().contains(&needle))
        .map(R::from_source)
        .collect()
}

/// Every column starts at its maximum share; when that overflows the panel
/// the columns give width back right to left, never below their minimum.
pub fn column_widths(columns: &[Column], total: u16) -> Vec<u16> {
    let total_f = f32::from(total);
    let mut widths = columns
        .iter()
        .map(|column| (column.max * total_f).floor() as u16)
        .collect::<Vec<_>>();
    let floors = columns
        .iter()
        .map(|column| (column.min * total_f).floor() as u16)
        .collect::<Vec<_>>();

    let mut overflow = widths
        .iter()
        .map(|width| u32::from(*width))
        .sum::<u32>()
        .saturating_sub(u32::from(total));
    for (width, floor) in widths.iter_mut().zip(floors.iter()).rev() {
        if overflow == 0 {
            break;
        }
        let give = u32::from(width.saturating_sub(*floor)).min(overflow);
        *width -= give as u16;
        overflow -= give;
    }
    widths
}

fn list_keymap() -> Keymap {
    Keymap::new()
        .with(&[KeySpec::char('j'), KeySpec::plain(KeyCode::Down)], Action::Down)
        .with(&[KeySpec::char('k'), KeySpec::plain(KeyCode::Up)], Action::Up)
        .with(&[KeySpec::plain(KeyCode::PageDown)], Action::PageDown)
        .with(&[KeySpec::plain(KeyCode::PageUp)], Action::PageUp)
        .with(&[KeySpec::plain(KeyCode::Home)], Action::Top)
        .with(&[KeySpec::plain(KeyCode::End)], Action::Bottom)
        .with(&[KeySpec::plain(KeyCode::Enter), KeySpec::char('o')], Action::Inspect)
        .with(&[KeySpec::ctrl('r')], Action::Refresh)
        .with(&[KeySpec::char('f')], Action::StartFilter)
}

#[derive(Debug, Clone)]
pub struct ListPanel<R: ResourceRow> {
    source: Vec<R::Source>,
    rows: Vec<R>,
    filter: String,
    live_filter: Option<String>,
    cursor: usize,
    origin: usize,
    viewport: usize,
    refreshed_at: Option<DateTime<Local>>,
    error: Option<String>,
    /// Sequence number of the newest fetch applied so far.
    applied: u64,
}

impl<R: ResourceRow> Default for ListPanel<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ResourceRow> Panel for ListPanel<R> {
    fn name(&self) -> &str {
        R::PANEL.name()
    }

    fn keymap(&self) -> Keymap {
        R::bindings(list_keymap())
    }
}

/// Row-type independent operations, so callers can drive either list through
/// one `&mut dyn ListControl`.
pub trait ListControl {
    fn len(&self) -> usize;
    fn filter(&self) -> &str;
    fn active_filter(&self) -> &str;
    fn error(&self) -> Option<&str>;

    /// Claims `seq` for the next snapshot. Returns false for a fetch that was
    /// issued before one already applied.
    fn admit(&mut self, seq: u64) -> bool;

    fn preview_filter(&mut self, text: &str);
    fn commit_filter(&mut self, text: &str);
    fn cancel_preview(&mut self);
    fn refresh_failed(&mut self, message: String);
    fn set_viewport(&mut self, height: usize);

    fn move_down(&mut self);
    fn move_up(&mut self);
    fn page_down(&mut self);
    fn page_up(&mut self);
    fn top(&mut self);
    fn bottom(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reset_filter(&mut self) {
        self.commit_filter("");
    }
}

impl<R: ResourceRow> ListPanel<R> {
    pub fn new() -> Self {
        Self {
            source: Vec::new(),
            rows: Vec::new(),
            filter: String::new(),
            live_filter: None,
            cursor: 0,
            origin: 0,
            viewport: 1,
            refreshed_at: None,
            error: None,
            applied: 0,
        }
    }

    /// Swaps in a fresh backend snapshot. The whole row set is rebuilt; the
    /// cursor stays where it was even if the list shrank beneath it.
    pub fn replace(&mut self, source: Vec<R::Source>) {
        self.source = source;
        self.rebuild();
        self.refreshed_at = Some(Local::now());
        self.error = None;
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    #[cfg(test)]
    pub fn viewport(&self) -> usize {
        self.viewport
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Local>> {
        self.refreshed_at
    }

    pub fn selected_index(&self) -> Option<usize> {
        let index = self.origin + self.cursor;
        (index < self.rows.len()).then_some(index)
    }

    pub fn selected(&self) -> Result<&R, ConsoleError> {
        self.selected_index()
            .map(|index| &self.rows[index])
            .ok_or(ConsoleError::NoSelection(R::NOUN))
    }

    #[cfg(test)]
    pub fn set_position(&mut self, origin: usize, cursor: usize) {
        self.origin = origin;
        self.cursor = cursor;
    }

    fn select(&mut self, index: usize) {
        if index < self.origin {
            self.origin = index;
            self.cursor = 0;
        } else if index >= self.origin + self.viewport {
            self.origin = index + 1 - self.viewport;
            self.cursor = self.viewport - 1;
        } else {
            self.cursor = index - self.origin;
        }
    }

    fn last_index(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    fn rebuild(&mut self) {
        let filter = self.active_filter().to_string();
        self.rows = filter_rows::<R>(&self.source, &filter);
    }
}

impl<R: ResourceRow> ListControl for ListPanel<R> {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn filter(&self) -> &str {
        &self.filter
    }

    fn active_filter(&self) -> &str {
        self.live_filter.as_deref().unwrap_or(&self.filter)
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn admit(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }

    fn preview_filter(&mut self, text: &str) {
        self.live_filter = Some(text.trim().to_string());
        self.rebuild();
    }

    fn commit_filter(&mut self, text: &str) {
        self.live_filter = None;
        self.filter = text.trim().to_string();
        self.cursor = 0;
        self.origin = 0;
        self.rebuild();
    }

    /// Drops an uncommitted preview and shows the committed filter again.
    fn cancel_preview(&mut self) {
        self.live_filter = None;
        self.rebuild();
    }

    /// A failed refresh keeps the last good rows.
    fn refresh_failed(&mut self, message: String) {
        self.error = Some(message);
    }

    fn set_viewport(&mut self, height: usize) {
        self.viewport = height.max(1);
        if self.cursor >= self.viewport {
            self.origin += self.cursor + 1 - self.viewport;
            self.cursor = self.viewport - 1;
        }
    }

    fn move_down(&mut self) {
        let Some(index) = self.selected_index() else {
            self.select(self.last_index());
            return;
        };
        if index + 1 >= self.rows.len() {
            return;
        }
        if self.cursor + 1 < self.viewport {
            self.cursor += 1;
        } else {
            self.origin += 1;
        }
    }

    fn move_up(&mut self) {
        if self.selected_index().is_none() {
            self.select(self.last_index());
            return;
        }
        if self.cursor > 0 {
            self.cursor -= 1;
        } else if self.origin > 0 {
            self.origin -= 1;
        }
    }

    fn page_down(&mut self) {
        let index = self.origin + self.cursor + self.viewport;
        self.select(index.min(self.last_index()));
    }

    fn page_up(&mut self) {
        let index = (self.origin + self.cursor).saturating_sub(self.viewport);
        self.select(index.min(self.last_index()));
    }

    fn top(&mut self) {
        self.select(0);
    }

    fn bottom(&mut self) {
        self.select(self.last_index());
    }
}
