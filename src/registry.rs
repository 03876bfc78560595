use crate::error::ConsoleError;
use crate::input::{Action, EditKey, KeySpec, Keymap};
use crossterm::event::KeyCode;
use ratatui::layout::Rect;
use tracing::debug;

/// A named screen region with its own key bindings.
pub trait Panel {
    fn name(&self) -> &str;

    /// One-time initialization: the bindings the panel wants while it is focused.
    fn keymap(&self) -> Keymap;

    /// Editable panels receive unbound printable keys as edits.
    fn editable(&self) -> bool {
        false
    }
}

/// Focus ring over the base panels, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusState {
    names: Vec<String>,
    index: usize,
}

impl FocusState {
    fn push(&mut self, name: &str) {
        self.names.push(name.to_string());
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn current(&self) -> Option<&str> {
        self.names.get(self.index).map(String::as_str)
    }

    fn advance(&mut self) -> Option<&str> {
        if self.names.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.names.len();
        self.current()
    }

    fn select(&mut self, name: &str) -> bool {
        match self.names.iter().position(|candidate| candidate == name) {
            Some(index) => {
                self.index = index;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
struct PanelEntry {
    name: String,
    rect: Rect,
    keymap: Keymap,
    editable: bool,
}

impl PanelEntry {
    fn from_panel(panel: &dyn Panel) -> Self {
        Self {
            name: panel.name().to_string(),
            rect: Rect::default(),
            keymap: panel.keymap(),
            editable: panel.editable(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanelRegistry {
    panels: Vec<PanelEntry>,
    overlays: Vec<PanelEntry>,
    focus: FocusState,
    overlay_focused: Option<String>,
    global: Keymap,
    ring_global: Keymap,
    sealed: bool,
}

impl Default for PanelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self {
            panels: Vec::new(),
            overlays: Vec::new(),
            focus: FocusState::default(),
            overlay_focused: None,
            global: Keymap::new().with(&[KeySpec::ctrl('q')], Action::Quit),
            ring_global: Keymap::new().with(&[KeySpec::plain(KeyCode::Tab)], Action::NextPanel),
            sealed: false,
        }
    }

    pub fn register(&mut self, panel: &dyn Panel) -> Result<(), ConsoleError> {
        let name = panel.name();
        if self.entry(name).is_some() {
            return Err(ConsoleError::DuplicatePanel(name.to_string()));
        }
        let entry = PanelEntry::from_panel(panel);
        debug!(panel = name, bindings = entry.keymap.len(), "registered panel");
        self.panels.push(entry);
        self.focus.push(name);
        Ok(())
    }

    /// Ends setup; from now on binding an already bound key is an error.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn bind(&mut self, panel: &str, key: KeySpec, action: Action) -> Result<(), ConsoleError> {
        let sealed = self.sealed;
        let entry = self
            .entry_mut(panel)
            .ok_or_else(|| ConsoleError::UnknownPanel(panel.to_string()))?;
        if sealed && entry.keymap.contains(&key) {
            return Err(ConsoleError::DuplicateBinding {
                panel: panel.to_string(),
                key: key.label(),
            });
        }
        if let Some(previous) = entry.keymap.bind(key, action) {
            debug!(panel, key = %key.label(), ?previous, ?action, "rebound key");
        }
        Ok(())
    }

    pub fn attach_overlay(&mut self, panel: &dyn Panel) -> Result<(), ConsoleError> {
        let name = panel.name();
        if self.entry(name).is_some() {
            return Err(ConsoleError::DuplicatePanel(name.to_string()));
        }
        let entry = PanelEntry::from_panel(panel);
        if entry.keymap.is_empty() && !entry.editable {
            debug!(panel = name, "overlay accepts only global keys");
        }
        self.overlays.push(entry);
        self.overlay_focused = Some(name.to_string());
        Ok(())
    }

    /// Removes an overlay together with every binding it registered.
    pub fn detach_overlay(&mut self, name: &str) -> bool {
        let Some(index) = self.overlays.iter().position(|entry| entry.name == name) else {
            return false;
        };
        self.overlays.remove(index);
        if self.overlay_focused.as_deref() == Some(name) {
            self.overlay_focused = self.overlays.last().map(|entry| entry.name.clone());
        }
        true
    }

    pub fn switch_focus(&mut self, name: &str) -> Result<(), ConsoleError> {
        if self.focus.select(name) {
            self.overlay_focused = None;
            return Ok(());
        }

        let index = self
            .overlays
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| ConsoleError::UnknownPanel(name.to_string()))?;
        let entry = self.overlays.remove(index);
        self.overlays.push(entry);
        self.overlay_focused = Some(name.to_string());
        Ok(())
    }

    pub fn advance_focus(&mut self) -> Option<&str> {
        self.overlay_focused = None;
        self.focus.advance()
    }

    pub fn focused(&self) -> &str {
        self.overlay_focused
            .as_deref()
            .or_else(|| self.focus.current())
            .unwrap_or_default()
    }

    pub fn focus_state(&self) -> &FocusState {
        &self.focus
    }

    pub fn dispatch_key(&self, panel: &str, key: KeySpec) -> Result<Option<Action>, ConsoleError> {
        let is_overlay = self.overlays.iter().any(|entry| entry.name == panel);
        let entry = self
            .entry(panel)
            .ok_or_else(|| ConsoleError::UnknownPanel(panel.to_string()))?;

        if let Some(action) = entry.keymap.get(&key) {
            return Ok(Some(action));
        }
        if let Some(action) = self.global.get(&key) {
            return Ok(Some(action));
        }
        if !is_overlay {
            if let Some(action) = self.ring_global.get(&key) {
                return Ok(Some(action));
            }
        }
        if entry.editable {
            return Ok(EditKey::from_spec(key).map(Action::Edit));
        }
        Ok(None)
    }

    pub fn place(&mut self, name: &str, rect: Rect) -> Result<(), ConsoleError> {
        let entry = self
            .entry_mut(name)
            .ok_or_else(|| ConsoleError::UnknownPanel(name.to_string()))?;
        entry.rect = rect;
        Ok(())
    }

    pub fn rect(&self, name: &str) -> Option<Rect> {
        self.entry(name).map(|entry| entry.rect)
    }

    #[cfg(test)]
    pub fn is_live(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    #[cfg(test)]
    pub fn overlay_names(&self) -> impl Iterator<Item = &str> {
        self.overlays.iter().map(|entry| entry.name.as_str())
    }

    fn entry(&self, name: &str) -> Option<&PanelEntry> {
        self.panels
            .iter()
            .chain(self.overlays.iter())
            .find(|entry| entry.name == name)
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut PanelEntry> {
        self.panels
            .iter_mut()
            .chain(self.overlays.iter_mut())
            .find(|entry| entry.name == name)
    }
}
