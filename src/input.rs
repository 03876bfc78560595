use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextPanel,
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    Refresh,
    StartFilter,
    Inspect,
    Remove,
    Start,
    Stop,
    Export,
    Commit,
    Rename,
    CreateContainer,
    Pull,
    RemoveDangling,
    Save,
    Import,
    Load,
    Affirm,
    Decline,
    Dismiss,
    Submit,
    NextField,
    PrevField,
    Edit(EditKey),
}

impl Action {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "quit" => Some(Self::Quit),
            "next-panel" | "next_panel" | "nextpanel" => Some(Self::NextPanel),
            "down" | "cursor-down" => Some(Self::Down),
            "up" | "cursor-up" => Some(Self::Up),
            "page-down" | "pagedown" => Some(Self::PageDown),
            "page-up" | "pageup" => Some(Self::PageUp),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            "refresh" => Some(Self::Refresh),
            "filter" => Some(Self::StartFilter),
            "inspect" | "detail" => Some(Self::Inspect),
            "remove" | "rm" | "delete" => Some(Self::Remove),
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "export" => Some(Self::Export),
            "commit" => Some(Self::Commit),
            "rename" => Some(Self::Rename),
            "create" | "create-container" => Some(Self::CreateContainer),
            "pull" => Some(Self::Pull),
            "remove-dangling" | "prune" => Some(Self::RemoveDangling),
            "save" => Some(Self::Save),
            "import" => Some(Self::Import),
            "load" => Some(Self::Load),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Insert(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
}

impl EditKey {
    pub fn from_spec(key: KeySpec) -> Option<Self> {
        let plain = key.modifiers.is_empty();
        match key.code {
            KeyCode::Char(c) if plain => Some(Self::Insert(c)),
            KeyCode::Backspace => Some(Self::Backspace),
            KeyCode::Delete => Some(Self::Delete),
            KeyCode::Left => Some(Self::Left),
            KeyCode::Right => Some(Self::Right),
            KeyCode::Home => Some(Self::Home),
            KeyCode::End => Some(Self::End),
            _ => None,
        }
    }
}

/// A key with its modifiers normalized so that bindings compare by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn char(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    pub fn from_event(key: KeyEvent) -> Self {
        let mut modifiers =
            key.modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT);
        let code = match key.code {
            // Some terminals deliver Enter as ctrl+m / ctrl+j.
            KeyCode::Char('m') | KeyCode::Char('j')
                if modifiers == KeyModifiers::CONTROL =>
            {
                modifiers = KeyModifiers::NONE;
                KeyCode::Enter
            }
            KeyCode::Char(c) => {
                modifiers.remove(KeyModifiers::SHIFT);
                if modifiers.contains(KeyModifiers::CONTROL) {
                    KeyCode::Char(c.to_ascii_lowercase())
                } else {
                    KeyCode::Char(c)
                }
            }
            KeyCode::BackTab => {
                modifiers.remove(KeyModifiers::SHIFT);
                KeyCode::BackTab
            }
            other => other,
        };
        Self { code, modifiers }
    }

    pub fn label(&self) -> String {
        let key_name = match self.code {
            KeyCode::Char(' ') => "space".to_string(),
            KeyCode::Char('+') => "plus".to_string(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Tab => "tab".to_string(),
            KeyCode::BackTab => "backtab".to_string(),
            KeyCode::Backspace => "backspace".to_string(),
            KeyCode::Delete => "delete".to_string(),
            KeyCode::Insert => "insert".to_string(),
            KeyCode::Esc => "esc".to_string(),
            KeyCode::Left => "left".to_string(),
            KeyCode::Right => "right".to_string(),
            KeyCode::Up => "up".to_string(),
            KeyCode::Down => "down".to_string(),
            KeyCode::Home => "home".to_string(),
            KeyCode::End => "end".to_string(),
            KeyCode::PageUp => "pageup".to_string(),
            KeyCode::PageDown => "pagedown".to_string(),
            KeyCode::F(n) => format!("f{n}"),
            _ => "?".to_string(),
        };

        let mut parts = Vec::new();
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            parts.push("ctrl".to_string());
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            parts.push("alt".to_string());
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            parts.push("shift".to_string());
        }
        parts.push(key_name);
        parts.join("+")
    }
}

pub fn parse_key_spec(spec: &str) -> Option<KeySpec> {
    let mut modifiers = KeyModifiers::NONE;
    let mut code: Option<KeyCode> = None;

    for token in spec
        .split('+')
        .map(|token| token.trim())
        .filter(|token| !token.is_empty())
    {
        match token.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
            "alt" => modifiers |= KeyModifiers::ALT,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            _ => code = Some(parse_key_code(token)?),
        }
    }

    let code = code?;
    let mut key = KeySpec::new(code, modifiers);
    if let KeyCode::Char(c) = key.code {
        key.modifiers.remove(KeyModifiers::SHIFT);
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            key.code = KeyCode::Char(c.to_ascii_lowercase());
        }
    }
    Some(key)
}

fn parse_key_code(token: &str) -> Option<KeyCode> {
    let lower = token.to_ascii_lowercase();
    let code = match lower.as_str() {
        "esc" | "escape" => KeyCode::Esc,
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "backtab" => KeyCode::BackTab,
        "space" => KeyCode::Char(' '),
        "plus" => KeyCode::Char('+'),
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "insert" | "ins" => KeyCode::Insert,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        _ if token.chars().count() == 1 => KeyCode::Char(token.chars().next()?),
        _ if lower.starts_with('f') => {
            let number = lower.trim_start_matches('f').parse::<u8>().ok()?;
            if !(1..=24).contains(&number) {
                return None;
            }
            KeyCode::F(number)
        }
        _ => return None,
    };
    Some(code)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keymap {
    bindings: HashMap<KeySpec, Action>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, keys: &[KeySpec], action: Action) -> Self {
        for key in keys {
            self.bind(*key, action);
        }
        self
    }

    /// Returns the action previously bound to `key`, if any.
    pub fn bind(&mut self, key: KeySpec, action: Action) -> Option<Action> {
        self.bindings.insert(key, action)
    }

    pub fn get(&self, key: &KeySpec) -> Option<Action> {
        self.bindings.get(key).copied()
    }

    pub fn contains(&self, key: &KeySpec) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, EditKey, KeySpec, Keymap, parse_key_spec};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn shifted_chars_drop_the_shift_modifier() {
        let key = KeySpec::from_event(KeyEvent::new(KeyCode::Char('Y'), KeyModifiers::SHIFT));
        assert_eq!(key, KeySpec::char('Y'));
    }

    #[test]
    fn ctrl_chars_are_lowercased() {
        let key = KeySpec::from_event(KeyEvent::new(
            KeyCode::Char('R'),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT,
        ));
        assert_eq!(key, KeySpec::ctrl('r'));
    }

    #[test]
    fn ctrl_m_and_ctrl_j_normalize_to_enter() {
        let ctrl_m = KeySpec::from_event(KeyEvent::new(KeyCode::Char('m'), KeyModifiers::CONTROL));
        let ctrl_j = KeySpec::from_event(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::CONTROL));
        assert_eq!(ctrl_m, KeySpec::plain(KeyCode::Enter));
        assert_eq!(ctrl_j, KeySpec::plain(KeyCode::Enter));
    }

    #[test]
    fn key_spec_parses_common_tokens() {
        assert_eq!(parse_key_spec("ctrl+R"), Some(KeySpec::ctrl('r')));
        assert_eq!(
            parse_key_spec("shift+tab"),
            Some(KeySpec::new(KeyCode::Tab, KeyModifiers::SHIFT))
        );
        assert_eq!(
            parse_key_spec("pgdn"),
            Some(KeySpec::plain(KeyCode::PageDown))
        );
        assert_eq!(parse_key_spec("f5"), Some(KeySpec::plain(KeyCode::F(5))));
        assert_eq!(parse_key_spec("ctrl+"), None);
        assert_eq!(parse_key_spec("f30"), None);
    }

    #[test]
    fn label_round_trips_through_parser() {
        let key = KeySpec::ctrl('d');
        assert_eq!(key.label(), "ctrl+d");
        assert_eq!(parse_key_spec(&key.label()), Some(key));
    }

    #[test]
    fn edit_keys_only_accept_unmodified_chars() {
        assert_eq!(
            EditKey::from_spec(KeySpec::char('x')),
            Some(EditKey::Insert('x'))
        );
        assert_eq!(EditKey::from_spec(KeySpec::ctrl('x')), None);
        assert_eq!(
            EditKey::from_spec(KeySpec::plain(KeyCode::Backspace)),
            Some(EditKey::Backspace)
        );
    }

    #[test]
    fn rebinding_returns_the_previous_action() {
        let mut keymap = Keymap::new().with(&[KeySpec::char('d')], Action::Remove);
        assert_eq!(
            keymap.bind(KeySpec::char('d'), Action::Inspect),
            Some(Action::Remove)
        );
        assert_eq!(keymap.get(&KeySpec::char('d')), Some(Action::Inspect));
        assert_eq!(keymap.len(), 1);
    }

    #[test]
    fn action_tokens_map_to_expected_actions() {
        assert_eq!(Action::from_token("rm"), Some(Action::Remove));
        assert_eq!(Action::from_token("Next-Panel"), Some(Action::NextPanel));
        assert_eq!(Action::from_token("prune"), Some(Action::RemoveDangling));
        assert_eq!(Action::from_token("explode"), None);
    }
}
