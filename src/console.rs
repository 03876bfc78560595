use crate::config::KeyBinding;
use crate::error::{BackendError, ConsoleError};
use crate::flow::{BackendCall, CallOutput, FlowBook, FlowId};
use crate::form::{
    CommitFields, CreateContainerFields, ExportFields, FormPurpose, FormValues, ImportFields,
    LoadFields, PullFields, RenameFields, SaveFields,
};
use crate::input::{Action, KeySpec};
use crate::list::{ListControl, ListPanel};
use crate::model::{ContainerRow, ImageRow, Listing, PanelKind};
use crate::overlay::{Overlay, OverlayBody, OverlayKind, OverlayStack};
use crate::registry::PanelRegistry;
use crate::serializer::Task;
use chrono::Local;
use crossterm::event::{KeyEvent, KeyEventKind};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Work the console wants done off the serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch(PanelKind),
    Call { flow: FlowId, call: BackendCall },
}

/// Owns every piece of display state. Only the serializer's consumer calls
/// into it, one task at a time.
#[derive(Debug)]
pub struct Console {
    registry: PanelRegistry,
    overlays: OverlayStack,
    images: ListPanel<ImageRow>,
    containers: ListPanel<ContainerRow>,
    flows: FlowBook,
    engine: String,
    status: String,
    running: bool,
}

impl Console {
    pub fn new(bindings: &[KeyBinding]) -> Result<Self, ConsoleError> {
        let images = ListPanel::<ImageRow>::new();
        let containers = ListPanel::<ContainerRow>::new();
        let mut registry = PanelRegistry::new();
        registry.register(&images)?;
        registry.register(&containers)?;

        let mut seen = HashSet::new();
        for binding in bindings {
            if !seen.insert((binding.panel, binding.key)) {
                return Err(ConsoleError::DuplicateBinding {
                    panel: binding.panel.name().to_string(),
                    key: binding.key.label(),
                });
            }
            registry.bind(binding.panel.name(), binding.key, binding.action)?;
        }
        registry.seal();

        Ok(Self {
            registry,
            overlays: OverlayStack::default(),
            images,
            containers,
            flows: FlowBook::default(),
            engine: String::new(),
            status: "Loading...".to_string(),
            running: true,
        })
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn set_engine(&mut self, version: impl Into<String>) {
        self.engine = version.into();
    }

    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PanelRegistry {
        &mut self.registry
    }

    pub fn overlays(&self) -> &OverlayStack {
        &self.overlays
    }

    pub fn images(&self) -> &ListPanel<ImageRow> {
        &self.images
    }

    pub fn containers(&self) -> &ListPanel<ContainerRow> {
        &self.containers
    }

    pub fn flows(&self) -> &FlowBook {
        &self.flows
    }

    pub fn list_mut(&mut self, panel: PanelKind) -> &mut dyn ListControl {
        match panel {
            PanelKind::Images => &mut self.images,
            PanelKind::Containers => &mut self.containers,
        }
    }

    /// The base panel keys fall back to once overlays are gone.
    pub fn focused_panel(&self) -> PanelKind {
        self.registry
            .focus_state()
            .current()
            .and_then(PanelKind::from_name)
            .unwrap_or(PanelKind::Images)
    }

    pub fn focused_overlay(&self) -> Option<OverlayKind> {
        OverlayKind::from_name(self.registry.focused())
            .filter(|kind| self.overlays.is_shown(*kind))
    }

    /// Applies one serialized task. User-facing failures end up in an error
    /// overlay; only broken invariants come back as `Err`.
    pub fn apply(&mut self, task: Task) -> Result<Vec<Effect>, ConsoleError> {
        match self.apply_task(task) {
            Err(error) if !error.is_fatal() => {
                let return_to = self.focused_panel();
                self.show_error(error.to_string(), return_to)?;
                Ok(Vec::new())
            }
            other => other,
        }
    }

    fn apply_task(&mut self, task: Task) -> Result<Vec<Effect>, ConsoleError> {
        match task {
            Task::Key(key) => self.handle_key(key),
            Task::Resize => Ok(Vec::new()),
            Task::Refresh(panel) => Ok(vec![Effect::Fetch(panel)]),
            Task::Listing { panel, seq, result } => {
                self.apply_listing(panel, seq, result);
                Ok(Vec::new())
            }
            Task::InputError(message) => {
                self.set_status(format!("terminal event error: {message}"));
                Ok(Vec::new())
            }
            Task::InputClosed => {
                self.set_status("terminal event stream closed");
                self.running = false;
                Ok(Vec::new())
            }
            Task::Finished { flow, result } => self.finish_flow(flow, result),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<Vec<Effect>, ConsoleError> {
        if key.kind == KeyEventKind::Release {
            return Ok(Vec::new());
        }
        let focused = self.registry.focused().to_string();
        match self.registry.dispatch_key(&focused, KeySpec::from_event(key))? {
            Some(action) => self.apply_action(action),
            None => Ok(Vec::new()),
        }
    }

    pub fn apply_action(&mut self, action: Action) -> Result<Vec<Effect>, ConsoleError> {
        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                Ok(Vec::new())
            }
            Action::NextPanel => {
                if let Some(name) = self.registry.advance_focus() {
                    debug!(panel = name, "focus advanced");
                }
                Ok(Vec::new())
            }
            _ => match self.focused_overlay() {
                Some(kind) => self.overlay_action(kind, action),
                None => {
                    let panel = self.focused_panel();
                    self.list_action(panel, action)
                }
            },
        }
    }

    fn list_action(&mut self, panel: PanelKind, action: Action) -> Result<Vec<Effect>, ConsoleError> {
        let list = self.list_mut(panel);
        match action {
            Action::Down => list.move_down(),
            Action::Up => list.move_up(),
            Action::PageDown => list.page_down(),
            Action::PageUp => list.page_up(),
            Action::Top => list.top(),
            Action::Bottom => list.bottom(),
            Action::Refresh => return Ok(vec![Effect::Fetch(panel)]),
            Action::StartFilter => {
                let form = FormPurpose::Filter(panel)
                    .form()
                    .with_value("Filter", list.filter());
                self.show(Overlay::form(FormPurpose::Filter(panel), form, panel))?;
            }
            _ => {
                return match panel {
                    PanelKind::Images => self.image_action(action),
                    PanelKind::Containers => self.container_action(action),
                };
            }
        }
        Ok(Vec::new())
    }

    fn container_action(&mut self, action: Action) -> Result<Vec<Effect>, ConsoleError> {
        let origin = PanelKind::Containers;
        let selected = match action {
            Action::Inspect
            | Action::Remove
            | Action::Start
            | Action::Stop
            | Action::Export
            | Action::Commit
            | Action::Rename => self.containers.selected()?.clone(),
            _ => {
                self.set_status(format!("{action:?} is not available on the {origin}"));
                return Ok(Vec::new());
            }
        };
        let target = if selected.name.is_empty() {
            selected.id.clone()
        } else {
            selected.name.clone()
        };

        let call = match action {
            Action::Inspect => BackendCall::InspectContainer {
                id: selected.id,
                name: target,
            },
            Action::Remove => BackendCall::RemoveContainer {
                id: selected.id,
                name: target,
            },
            Action::Start => BackendCall::StartContainer { id: selected.id },
            Action::Stop => BackendCall::StopContainer { id: selected.id },
            Action::Export => return self.open_form(FormPurpose::Export, "Container", &target, origin),
            Action::Commit => return self.open_form(FormPurpose::Commit, "Container", &target, origin),
            Action::Rename => return self.open_form(FormPurpose::Rename, "Container", &target, origin),
            _ => return Ok(Vec::new()),
        };
        self.begin(origin, call)
    }

    fn image_action(&mut self, action: Action) -> Result<Vec<Effect>, ConsoleError> {
        let origin = PanelKind::Images;
        match action {
            Action::Pull => return self.open_form(FormPurpose::Pull, "Name", "", origin),
            Action::Import => return self.open_form(FormPurpose::Import, "Tag", "latest", origin),
            Action::Load => return self.open_form(FormPurpose::Load, "Path", "", origin),
            Action::RemoveDangling => {
                if self.images.is_empty() {
                    return Err(ConsoleError::NoSelection("image"));
                }
                return self.begin(origin, BackendCall::RemoveDanglingImages);
            }
            Action::Inspect
            | Action::Remove
            | Action::CreateContainer
            | Action::Save => {}
            _ => {
                self.set_status(format!("{action:?} is not available on the {origin}"));
                return Ok(Vec::new());
            }
        }

        let selected = self.images.selected()?.clone();
        let reference = selected.reference();
        match action {
            Action::Inspect => self.begin(
                origin,
                BackendCall::InspectImage {
                    id: selected.id,
                    reference,
                },
            ),
            Action::Remove => self.begin(origin, BackendCall::RemoveImage { reference }),
            Action::CreateContainer => {
                self.open_form(FormPurpose::CreateContainer, "Image", &reference, origin)
            }
            Action::Save => self.open_form(FormPurpose::Save, "Image", &reference, origin),
            _ => Ok(Vec::new()),
        }
    }

    fn open_form(
        &mut self,
        purpose: FormPurpose,
        prefill: &str,
        value: &str,
        origin: PanelKind,
    ) -> Result<Vec<Effect>, ConsoleError> {
        let form = purpose.form().with_value(prefill, value);
        self.show(Overlay::form(purpose, form, origin))?;
        Ok(Vec::new())
    }

    /// Opens a flow for `call`: confirmation first when the call is destructive.
    fn begin(&mut self, origin: PanelKind, call: BackendCall) -> Result<Vec<Effect>, ConsoleError> {
        let prompt = call.confirmation_prompt();
        let id = self.flows.open(origin, call);
        match prompt {
            Some(prompt) => {
                if let Some(flow) = self.flows.get_mut(id) {
                    flow.confirm()?;
                }
                self.show(Overlay::confirm(prompt, id, origin))?;
                Ok(Vec::new())
            }
            None => self.launch(id),
        }
    }

    fn launch(&mut self, id: FlowId) -> Result<Vec<Effect>, ConsoleError> {
        let Some(flow) = self.flows.get_mut(id) else {
            warn!(flow = id, "launch requested for an unknown flow");
            return Ok(Vec::new());
        };
        flow.start()?;
        let origin = flow.origin;
        let call = flow.call.clone();
        self.set_status(call.progress_label());
        self.show(Overlay::status(call.progress_label(), id, origin))?;
        Ok(vec![Effect::Call { flow: id, call }])
    }

    fn overlay_action(&mut self, kind: OverlayKind, action: Action) -> Result<Vec<Effect>, ConsoleError> {
        match kind {
            OverlayKind::Confirm => self.confirm_action(action),
            OverlayKind::Status => Ok(Vec::new()),
            OverlayKind::Message => {
                if action != Action::Dismiss {
                    return Ok(Vec::new());
                }
                let Some(message) = self.dismiss(OverlayKind::Message) else {
                    return Ok(Vec::new());
                };
                self.restore_focus(message.return_to)?;
                Ok(vec![Effect::Fetch(message.return_to)])
            }
            OverlayKind::Detail => {
                if action == Action::Dismiss {
                    if let Some(detail) = self.dismiss(OverlayKind::Detail) {
                        self.restore_focus(detail.return_to)?;
                    }
                    return Ok(Vec::new());
                }
                if let Some(Overlay {
                    body: OverlayBody::Detail { text, scroll },
                    ..
                }) = self.overlays.get_mut(OverlayKind::Detail)
                {
                    let max = text.lines().count().saturating_sub(1) as u16;
                    *scroll = match action {
                        Action::Down => scroll.saturating_add(1),
                        Action::Up => scroll.saturating_sub(1),
                        Action::PageDown => scroll.saturating_add(10),
                        Action::PageUp => scroll.saturating_sub(10),
                        Action::Top => 0,
                        Action::Bottom => max,
                        _ => *scroll,
                    }
                    .min(max);
                }
                Ok(Vec::new())
            }
            OverlayKind::Form => self.form_action(action),
        }
    }

    fn confirm_action(&mut self, action: Action) -> Result<Vec<Effect>, ConsoleError> {
        if !matches!(action, Action::Affirm | Action::Decline) {
            return Ok(Vec::new());
        }
        // The dialog goes away on both branches before anything else runs.
        let Some(dialog) = self.dismiss(OverlayKind::Confirm) else {
            return Ok(Vec::new());
        };
        let Some(id) = dialog.flow else {
            self.restore_focus(dialog.return_to)?;
            return Ok(Vec::new());
        };

        if action == Action::Affirm {
            return self.launch(id);
        }

        if let Some(flow) = self.flows.get_mut(id) {
            flow.cancel()?;
        }
        self.flows.retire(id);
        self.set_status("Action cancelled");
        self.restore_focus(dialog.return_to)?;
        Ok(Vec::new())
    }

    fn form_action(&mut self, action: Action) -> Result<Vec<Effect>, ConsoleError> {
        match action {
            Action::Submit => {
                let Some(overlay) = self.dismiss(OverlayKind::Form) else {
                    return Ok(Vec::new());
                };
                let OverlayBody::Form { form, purpose } = overlay.body else {
                    return Ok(Vec::new());
                };
                self.restore_focus(overlay.return_to)?;
                self.submit_form(purpose, &form.values(), overlay.return_to)
            }
            Action::Dismiss => {
                let Some(overlay) = self.dismiss(OverlayKind::Form) else {
                    return Ok(Vec::new());
                };
                if let OverlayBody::Form {
                    purpose: FormPurpose::Filter(panel),
                    ..
                } = overlay.body
                {
                    self.list_mut(panel).reset_filter();
                }
                self.restore_focus(overlay.return_to)?;
                Ok(Vec::new())
            }
            Action::NextField | Action::PrevField | Action::Edit(_) => {
                let Some(Overlay {
                    body: OverlayBody::Form { form, purpose },
                    ..
                }) = self.overlays.get_mut(OverlayKind::Form)
                else {
                    return Ok(Vec::new());
                };
                match action {
                    Action::NextField => form.next_field(),
                    Action::PrevField => form.prev_field(),
                    Action::Edit(key) => form.edit(key),
                    _ => {}
                }
                if let FormPurpose::Filter(panel) = *purpose {
                    let text = form.active_value().to_string();
                    self.list_mut(panel).preview_filter(&text);
                }
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn submit_form(
        &mut self,
        purpose: FormPurpose,
        values: &FormValues,
        origin: PanelKind,
    ) -> Result<Vec<Effect>, ConsoleError> {
        let call = match purpose {
            FormPurpose::Filter(panel) => {
                let list = self.list_mut(panel);
                list.commit_filter(values.get("Filter"));
                let filter = list.filter().to_string();
                self.set_status(if filter.is_empty() {
                    format!("Filter cleared on {panel}")
                } else {
                    format!("Filter '{filter}' on {panel}")
                });
                return Ok(Vec::new());
            }
            FormPurpose::CreateContainer => {
                BackendCall::CreateContainer(CreateContainerFields::try_from(values)?)
            }
            FormPurpose::Pull => BackendCall::PullImage(PullFields::try_from(values)?),
            FormPurpose::Save => BackendCall::SaveImage(SaveFields::try_from(values)?),
            FormPurpose::Import => BackendCall::ImportImage(ImportFields::try_from(values)?),
            FormPurpose::Load => BackendCall::LoadImage(LoadFields::try_from(values)?),
            FormPurpose::Export => BackendCall::ExportContainer(ExportFields::try_from(values)?),
            FormPurpose::Commit => BackendCall::CommitContainer(CommitFields::try_from(values)?),
            FormPurpose::Rename => BackendCall::RenameContainer(RenameFields::try_from(values)?),
        };
        self.begin(origin, call)
    }

    /// Completion of a backend call. A completion that arrives after the
    /// operator moved on still updates state and pulls focus back.
    fn finish_flow(
        &mut self,
        id: FlowId,
        result: Result<CallOutput, BackendError>,
    ) -> Result<Vec<Effect>, ConsoleError> {
        let Some(flow) = self.flows.get_mut(id) else {
            debug!(flow = id, "completion for a retired flow");
            return Ok(Vec::new());
        };
        flow.finish(&result)?;
        let origin = flow.origin;
        let call = flow.call.clone();
        self.flows.retire(id);

        if self
            .overlays
            .get(OverlayKind::Status)
            .is_some_and(|overlay| overlay.flow == Some(id))
        {
            self.dismiss(OverlayKind::Status);
        }

        match result {
            Ok(CallOutput::Done) => {
                info!(flow = id, label = call.progress_label(), "backend call succeeded");
                self.set_status(format!(
                    "{} done at {}",
                    call.progress_label().trim_end_matches('.'),
                    Local::now().format("%H:%M:%S")
                ));
                self.restore_focus(origin)?;
                Ok(call.refreshes().iter().copied().map(Effect::Fetch).collect())
            }
            Ok(CallOutput::Detail { title, body }) => {
                self.set_status(title.clone());
                self.show(Overlay::detail(title, body, origin))?;
                Ok(Vec::new())
            }
            Err(error) => {
                warn!(flow = id, %error, "backend call failed");
                self.show_error(error.to_string(), origin)?;
                Ok(Vec::new())
            }
        }
    }

    fn apply_listing(
        &mut self,
        panel: PanelKind,
        seq: u64,
        result: Result<Listing, BackendError>,
    ) {
        if !self.list_mut(panel).admit(seq) {
            debug!(%panel, seq, "dropping listing from an older fetch");
            return;
        }
        match result {
            Ok(listing) => {
                if listing.kind() != panel {
                    warn!(%panel, listing = %listing.kind(), "listing delivered for another panel");
                }
                match listing {
                    Listing::Images(items) => self.images.replace(items),
                    Listing::Containers(items) => self.containers.replace(items),
                }
            }
            Err(error) => {
                let message = error.to_string();
                self.set_status(format!("Refresh of {panel} failed: {message}"));
                self.list_mut(panel).refresh_failed(message);
            }
        }
    }

    fn show(&mut self, overlay: Overlay) -> Result<(), ConsoleError> {
        if let Some(replaced) = self.overlays.show(&mut self.registry, overlay)? {
            debug!(kind = replaced.kind().name(), "replaced overlay");
            if let OverlayBody::Form {
                purpose: FormPurpose::Filter(panel),
                ..
            } = replaced.body
            {
                self.list_mut(panel).cancel_preview();
            }
        }
        Ok(())
    }

    fn show_error(&mut self, message: String, return_to: PanelKind) -> Result<(), ConsoleError> {
        self.set_status(format!("Error: {message}"));
        self.show(Overlay::message(message, true, return_to))
    }

    fn dismiss(&mut self, kind: OverlayKind) -> Option<Overlay> {
        self.overlays.dismiss(&mut self.registry, kind)
    }

    /// Gives focus back to a list once no overlay is left to hold it.
    fn restore_focus(&mut self, panel: PanelKind) -> Result<(), ConsoleError> {
        if self.overlays.is_empty() {
            self.registry.switch_focus(panel.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Console, Effect};
    use crate::backend::fake::{FakeBackend, image};
    use crate::backend::{ResourceBackend, list};
    use crate::config::KeyBinding;
    use crate::error::{BackendError, ConsoleError};
    use crate::flow::{BackendCall, CallOutput};
    use crate::input::{Action, EditKey, KeySpec};
    use crate::list::ListControl;
    use crate::model::PanelKind;
    use crate::overlay::{OverlayBody, OverlayKind};
    use crate::serializer::Task;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn key(code: KeyCode) -> Task {
        Task::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn char_key(c: char) -> Task {
        key(KeyCode::Char(c))
    }

    static FETCHES: AtomicU64 = AtomicU64::new(0);

    fn next_fetch() -> u64 {
        FETCHES.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Runs effects inline in emission order the way the worker would,
    /// feeding results back.
    fn drive(console: &mut Console, backend: &dyn ResourceBackend, effects: Vec<Effect>) {
        let mut pending = VecDeque::from(effects);
        while let Some(effect) = pending.pop_front() {
            let task = match effect {
                Effect::Fetch(panel) => Task::Listing {
                    panel,
                    seq: next_fetch(),
                    result: list(backend, panel),
                },
                Effect::Call { flow, call } => Task::Finished {
                    flow,
                    result: call.execute(backend),
                },
            };
            pending.extend(console.apply(task).unwrap());
        }
    }

    fn console_with(backend: &FakeBackend) -> Console {
        let mut console = Console::new(&[]).unwrap();
        drive(
            &mut console,
            backend,
            vec![
                Effect::Fetch(PanelKind::Images),
                Effect::Fetch(PanelKind::Containers),
            ],
        );
        console
    }

    fn focus_containers(console: &mut Console) {
        console.apply(key(KeyCode::Tab)).unwrap();
        assert_eq!(console.registry().focused(), "container list");
    }

    fn container_names(console: &Console) -> Vec<String> {
        console
            .containers()
            .rows()
            .iter()
            .map(|row| row.name.clone())
            .collect()
    }

    fn message_text(console: &Console) -> Option<String> {
        match &console.overlays().get(OverlayKind::Message)?.body {
            OverlayBody::Message { text, .. } => Some(text.clone()),
            _ => None,
        }
    }

    #[test]
    fn committing_a_filter_narrows_the_list() {
        let backend = FakeBackend::with_containers(&["alpha", "beta", "gamma"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        console.apply(char_key('f')).unwrap();
        assert_eq!(console.registry().focused(), "form");
        console.apply(char_key('a')).unwrap();
        assert_eq!(container_names(&console).len(), 3);
        console.apply(char_key('l')).unwrap();
        assert_eq!(container_names(&console), vec!["alpha"]);

        console.apply(key(KeyCode::Enter)).unwrap();
        assert_eq!(console.containers().filter(), "al");
        assert_eq!(console.registry().focused(), "container list");

        drive(&mut console, &backend, vec![Effect::Fetch(PanelKind::Containers)]);
        assert_eq!(container_names(&console), vec!["alpha"]);
    }

    #[test]
    fn escaping_the_filter_form_resets_the_filter() {
        let backend = FakeBackend::with_containers(&["alpha", "beta"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);
        console.list_mut(PanelKind::Containers).commit_filter("be");

        console.apply(char_key('f')).unwrap();
        console.apply(key(KeyCode::Esc)).unwrap();
        assert_eq!(console.containers().filter(), "");
        assert_eq!(container_names(&console), vec!["alpha", "beta"]);
        assert!(console.overlays().is_empty());
    }

    #[test]
    fn action_without_selection_shows_an_error_and_calls_nothing() {
        let backend = FakeBackend::with_containers(&[]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        let effects = console.apply(char_key('d')).unwrap();
        assert!(effects.is_empty());
        assert_eq!(message_text(&console).as_deref(), Some("no container selected"));
        assert!(console.containers().rows().is_empty());
        assert!(backend.calls().is_empty());
        assert!(!console.overlays().is_shown(OverlayKind::Confirm));
    }

    #[test]
    fn failed_remove_shows_backend_message_and_keeps_rows() {
        let backend = FakeBackend::with_containers(&["web", "db", "cache"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);
        console.list_mut(PanelKind::Containers).set_viewport(10);
        console.apply(char_key('j')).unwrap();
        let cursor = console.containers().cursor();

        console.apply(char_key('d')).unwrap();
        assert_eq!(console.registry().focused(), "confirm");
        backend.fail_with("not found");

        let effects = console.apply(char_key('y')).unwrap();
        assert!(console.overlays().is_shown(OverlayKind::Status));
        drive(&mut console, &backend, effects);

        assert_eq!(message_text(&console).as_deref(), Some("not found"));
        assert!(!console.overlays().is_shown(OverlayKind::Status));
        assert_eq!(container_names(&console), vec!["web", "db", "cache"]);
        assert_eq!(console.containers().cursor(), cursor);
        assert_eq!(backend.calls(), vec!["remove id-db".to_string()]);
    }

    #[test]
    fn successful_remove_refreshes_and_returns_focus() {
        let backend = FakeBackend::with_containers(&["web", "db"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        console.apply(char_key('d')).unwrap();
        let effects = console.apply(char_key('y')).unwrap();
        assert!(matches!(
            effects.as_slice(),
            [Effect::Call {
                call: BackendCall::RemoveContainer { .. },
                ..
            }]
        ));
        drive(&mut console, &backend, effects);

        assert!(console.overlays().is_empty());
        assert_eq!(container_names(&console), vec!["db"]);
        assert_eq!(console.registry().focused(), "container list");
        assert_eq!(console.flows().in_flight(), 0);
    }

    #[test]
    fn terminal_notices_arrive_as_tasks() {
        let mut console = Console::new(&[]).unwrap();
        console
            .apply(Task::InputError("broken pipe".to_string()))
            .unwrap();
        assert_eq!(console.status(), "terminal event error: broken pipe");
        assert!(console.running());

        console.apply(Task::InputClosed).unwrap();
        assert_eq!(console.status(), "terminal event stream closed");
        assert!(!console.running());
    }

    #[test]
    fn tick_listing_that_lands_after_a_remove_is_dropped() {
        let backend = FakeBackend::with_containers(&["web", "db"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        let tick = next_fetch();
        let before_remove = list(&backend, PanelKind::Containers);

        console.apply(char_key('d')).unwrap();
        let effects = console.apply(char_key('y')).unwrap();
        drive(&mut console, &backend, effects);
        assert_eq!(container_names(&console), vec!["db"]);

        console
            .apply(Task::Listing {
                panel: PanelKind::Containers,
                seq: tick,
                result: before_remove,
            })
            .unwrap();
        assert_eq!(container_names(&console), vec!["db"]);

        console
            .apply(Task::Listing {
                panel: PanelKind::Containers,
                seq: tick,
                result: Err(BackendError::Command("daemon gone".to_string())),
            })
            .unwrap();
        assert_eq!(console.containers().error(), None);
    }

    #[test]
    fn declining_tears_down_the_dialog_and_calls_nothing() {
        let backend = FakeBackend::with_containers(&["web"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        console.apply(char_key('d')).unwrap();
        let effects = console.apply(char_key('n')).unwrap();
        assert!(effects.is_empty());
        assert!(!console.registry().is_live("confirm"));
        assert_eq!(console.registry().focused(), "container list");
        assert!(backend.calls().is_empty());

        console.apply(char_key('d')).unwrap();
        assert!(console.overlays().is_shown(OverlayKind::Confirm));
    }

    #[test]
    fn affirming_tears_down_the_dialog_before_the_call() {
        let backend = FakeBackend::with_containers(&["web"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        console.apply(char_key('d')).unwrap();
        console.apply(char_key('y')).unwrap();
        assert!(!console.registry().is_live("confirm"));
        assert_eq!(console.registry().focused(), "state");

        let ignored = console.apply(char_key('y')).unwrap();
        assert!(ignored.is_empty());
    }

    #[test]
    fn status_overlay_swallows_list_keys_but_not_quit() {
        let backend = FakeBackend::with_containers(&["web"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);
        console.apply(char_key('u')).unwrap();
        assert_eq!(console.registry().focused(), "state");

        assert!(console.apply(char_key('d')).unwrap().is_empty());
        assert!(!console.overlays().is_shown(OverlayKind::Confirm));

        console
            .apply(Task::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL)))
            .unwrap();
        assert!(!console.running());
    }

    #[test]
    fn dismissing_an_error_refreshes_the_origin() {
        let backend = FakeBackend::with_containers(&[]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);
        console.apply(char_key('s')).unwrap();

        let effects = console.apply(key(KeyCode::Enter)).unwrap();
        assert_eq!(effects, vec![Effect::Fetch(PanelKind::Containers)]);
        assert!(console.overlays().is_empty());
        assert_eq!(console.registry().focused(), "container list");
    }

    #[test]
    fn inspect_opens_a_scrollable_detail_overlay() {
        let backend = FakeBackend::with_containers(&["web"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        let effects = console.apply(char_key('o')).unwrap();
        drive(&mut console, &backend, effects);
        assert_eq!(console.registry().focused(), "detail");
        let detail = console.overlays().get(OverlayKind::Detail).unwrap();
        assert_eq!(detail.title, "container web");

        console.apply(char_key('q')).unwrap();
        assert_eq!(console.registry().focused(), "container list");
    }

    #[test]
    fn pull_form_submits_a_typed_call() {
        let backend = FakeBackend::default();
        let mut console = console_with(&backend);

        console.apply(char_key('p')).unwrap();
        for c in "redis:7".chars() {
            console.apply(char_key(c)).unwrap();
        }
        let effects = console.apply(key(KeyCode::Enter)).unwrap();
        assert_eq!(effects.len(), 1);
        drive(&mut console, &backend, effects);
        assert_eq!(backend.calls(), vec!["pull redis:7".to_string()]);
        assert_eq!(console.registry().focused(), "image list");
    }

    #[test]
    fn invalid_form_input_becomes_an_error_overlay() {
        let backend = FakeBackend::default();
        backend.set_images(vec![image("sha256:1", "nginx", "latest")]);
        let mut console = console_with(&backend);

        console.apply(char_key('s')).unwrap();
        let effects = console.apply(key(KeyCode::Enter)).unwrap();
        assert!(effects.is_empty());
        assert_eq!(message_text(&console).as_deref(), Some("Path: required"));
        assert!(!console.overlays().is_shown(OverlayKind::Form));
    }

    #[test]
    fn list_keys_do_not_reach_the_list_under_a_form() {
        let backend = FakeBackend::with_containers(&["web", "db"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        console.apply(char_key('r')).unwrap();
        console.apply_action(Action::Remove).unwrap();
        assert_eq!(console.overlays().iter().count(), 1);
        assert!(!console.overlays().is_shown(OverlayKind::Confirm));
        assert_eq!(console.registry().overlay_names().count(), 1);
        assert_eq!(console.containers().cursor(), 0);
    }

    #[test]
    fn form_keys_edit_instead_of_reaching_the_list() {
        let backend = FakeBackend::with_containers(&["web"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        console.apply(char_key('r')).unwrap();
        for c in "dj".chars() {
            console.apply(char_key(c)).unwrap();
        }
        console.apply_action(Action::Edit(EditKey::Backspace)).unwrap();
        match &console.overlays().get(OverlayKind::Form).unwrap().body {
            OverlayBody::Form { form, .. } => {
                assert_eq!(form.values().get("NewName"), "d");
                assert_eq!(form.values().get("Container"), "web");
            }
            other => panic!("unexpected overlay {other:?}"),
        }
        assert!(!console.overlays().is_shown(OverlayKind::Confirm));
    }

    #[test]
    fn prune_with_empty_image_list_is_refused() {
        let backend = FakeBackend::default();
        let mut console = console_with(&backend);
        console
            .apply(Task::Key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL)))
            .unwrap();
        assert_eq!(message_text(&console).as_deref(), Some("no image selected"));
    }

    #[test]
    fn failed_refresh_keeps_rows_and_records_the_error() {
        let backend = FakeBackend::with_containers(&["web"]);
        let mut console = console_with(&backend);
        console
            .apply(Task::Listing {
                panel: PanelKind::Containers,
                seq: next_fetch(),
                result: Err(BackendError::Command("daemon gone".to_string())),
            })
            .unwrap();
        assert_eq!(container_names(&console), vec!["web"]);
        assert_eq!(console.containers().error(), Some("daemon gone"));
    }

    #[test]
    fn stale_completion_still_pulls_focus_back() {
        let backend = FakeBackend::with_containers(&["web"]);
        let mut console = console_with(&backend);
        focus_containers(&mut console);

        let effects = console.apply(char_key('u')).unwrap();
        let [Effect::Call { flow, .. }] = effects.as_slice() else {
            panic!("expected one call");
        };
        let flow = *flow;
        console.registry_mut().switch_focus("image list").unwrap();

        let refresh = console
            .apply(Task::Finished {
                flow,
                result: Ok(CallOutput::Done),
            })
            .unwrap();
        assert_eq!(refresh, vec![Effect::Fetch(PanelKind::Containers)]);
        assert!(console.overlays().is_empty());
        assert_eq!(console.registry().focused(), "container list");

        let late = console
            .apply(Task::Finished {
                flow,
                result: Ok(CallOutput::Done),
            })
            .unwrap();
        assert!(late.is_empty());
    }

    #[test]
    fn refresh_ticks_become_fetches() {
        let mut console = Console::new(&[]).unwrap();
        let effects = console.apply(Task::Refresh(PanelKind::Images)).unwrap();
        assert_eq!(effects, vec![Effect::Fetch(PanelKind::Images)]);
    }

    #[test]
    fn custom_bindings_override_defaults() {
        let bindings = [KeyBinding {
            panel: PanelKind::Containers,
            key: KeySpec::char('x'),
            action: Action::Remove,
        }];
        let console = Console::new(&bindings).unwrap();
        assert_eq!(
            console
                .registry()
                .dispatch_key("container list", KeySpec::char('x'))
                .unwrap(),
            Some(Action::Remove)
        );

        let twice = [bindings[0], bindings[0]];
        let error = Console::new(&twice).unwrap_err();
        assert!(matches!(error, ConsoleError::DuplicateBinding { .. }));
    }
}
