use crate::error::ConsoleError;
use crate::flow::FlowId;
use crate::form::{FormPurpose, InputForm};
use crate::input::{Action, KeySpec, Keymap};
use crate::model::PanelKind;
use crate::registry::{Panel, PanelRegistry};
use crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OverlayKind {
    Confirm,
    Status,
    Message,
    Detail,
    Form,
}

impl OverlayKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Status => "state",
            Self::Message => "message",
            Self::Detail => "detail",
            Self::Form => "form",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Confirm,
            Self::Status,
            Self::Message,
            Self::Detail,
            Self::Form,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }

    fn keymap(self) -> Keymap {
        match self {
            Self::Confirm => Keymap::new()
                .with(&[KeySpec::char('y')], Action::Affirm)
                .with(&[KeySpec::char('n')], Action::Decline),
            Self::Status => Keymap::new(),
            Self::Message => Keymap::new().with(
                &[KeySpec::plain(KeyCode::Enter), KeySpec::plain(KeyCode::Esc)],
                Action::Dismiss,
            ),
            Self::Detail => Keymap::new()
                .with(&[KeySpec::char('j'), KeySpec::plain(KeyCode::Down)], Action::Down)
                .with(&[KeySpec::char('k'), KeySpec::plain(KeyCode::Up)], Action::Up)
                .with(&[KeySpec::plain(KeyCode::PageDown)], Action::PageDown)
                .with(&[KeySpec::plain(KeyCode::PageUp)], Action::PageUp)
                .with(&[KeySpec::plain(KeyCode::Home)], Action::Top)
                .with(&[KeySpec::plain(KeyCode::End)], Action::Bottom)
                .with(
                    &[
                        KeySpec::plain(KeyCode::Enter),
                        KeySpec::plain(KeyCode::Esc),
                        KeySpec::char('q'),
                    ],
                    Action::Dismiss,
                ),
            Self::Form => Keymap::new()
                .with(&[KeySpec::plain(KeyCode::Enter)], Action::Submit)
                .with(&[KeySpec::plain(KeyCode::Esc)], Action::Dismiss)
                .with(
                    &[KeySpec::plain(KeyCode::Tab), KeySpec::plain(KeyCode::Down)],
                    Action::NextField,
                )
                .with(
                    &[KeySpec::plain(KeyCode::BackTab), KeySpec::plain(KeyCode::Up)],
                    Action::PrevField,
                ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayBody {
    Confirm { prompt: String },
    Status { text: String },
    Message { text: String, error: bool },
    Detail { text: String, scroll: u16 },
    Form { form: InputForm, purpose: FormPurpose },
}

/// A transient panel stacked over the lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub title: String,
    pub body: OverlayBody,
    pub flow: Option<FlowId>,
    /// Base panel that gets focus back when this overlay goes away.
    pub return_to: PanelKind,
}

impl Overlay {
    pub fn confirm(prompt: impl Into<String>, flow: FlowId, return_to: PanelKind) -> Self {
        Self {
            title: "confirm".to_string(),
            body: OverlayBody::Confirm {
                prompt: prompt.into(),
            },
            flow: Some(flow),
            return_to,
        }
    }

    pub fn status(text: impl Into<String>, flow: FlowId, return_to: PanelKind) -> Self {
        Self {
            title: "state".to_string(),
            body: OverlayBody::Status { text: text.into() },
            flow: Some(flow),
            return_to,
        }
    }

    pub fn message(text: impl Into<String>, error: bool, return_to: PanelKind) -> Self {
        Self {
            title: if error { "error" } else { "message" }.to_string(),
            body: OverlayBody::Message {
                text: text.into(),
                error,
            },
            flow: None,
            return_to,
        }
    }

    pub fn detail(title: impl Into<String>, text: String, return_to: PanelKind) -> Self {
        Self {
            title: title.into(),
            body: OverlayBody::Detail { text, scroll: 0 },
            flow: None,
            return_to,
        }
    }

    pub fn form(purpose: FormPurpose, form: InputForm, return_to: PanelKind) -> Self {
        Self {
            title: purpose.title().to_string(),
            body: OverlayBody::Form { form, purpose },
            flow: None,
            return_to,
        }
    }

    pub fn kind(&self) -> OverlayKind {
        match self.body {
            OverlayBody::Confirm { .. } => OverlayKind::Confirm,
            OverlayBody::Status { .. } => OverlayKind::Status,
            OverlayBody::Message { .. } => OverlayKind::Message,
            OverlayBody::Detail { .. } => OverlayKind::Detail,
            OverlayBody::Form { .. } => OverlayKind::Form,
        }
    }
}

impl Panel for Overlay {
    fn name(&self) -> &str {
        self.kind().name()
    }

    fn keymap(&self) -> Keymap {
        self.kind().keymap()
    }

    fn editable(&self) -> bool {
        self.kind() == OverlayKind::Form
    }
}

/// Shown overlays in z-order, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct OverlayStack {
    shown: Vec<Overlay>,
}

impl OverlayStack {
    /// Shows `overlay`, first tearing down any overlay of the same kind.
    /// Returns the replaced overlay.
    pub fn show(
        &mut self,
        registry: &mut PanelRegistry,
        overlay: Overlay,
    ) -> Result<Option<Overlay>, ConsoleError> {
        let replaced = self.dismiss(registry, overlay.kind());
        registry.attach_overlay(&overlay)?;
        self.shown.push(overlay);
        Ok(replaced)
    }

    /// Removes the overlay's view and every binding it registered.
    pub fn dismiss(&mut self, registry: &mut PanelRegistry, kind: OverlayKind) -> Option<Overlay> {
        let index = self.shown.iter().position(|overlay| overlay.kind() == kind)?;
        registry.detach_overlay(kind.name());
        Some(self.shown.remove(index))
    }

    pub fn get(&self, kind: OverlayKind) -> Option<&Overlay> {
        self.shown.iter().find(|overlay| overlay.kind() == kind)
    }

    pub fn get_mut(&mut self, kind: OverlayKind) -> Option<&mut Overlay> {
        self.shown.iter_mut().find(|overlay| overlay.kind() == kind)
    }

    pub fn is_shown(&self, kind: OverlayKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.shown.iter()
    }
}
