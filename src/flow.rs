use crate::backend::ResourceBackend;
use crate::error::{BackendError, ConsoleError};
use crate::form::{
    CommitFields, CreateContainerFields, ExportFields, ImportFields, LoadFields, PullFields,
    RenameFields, SaveFields,
};
use crate::model::PanelKind;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use tracing::warn;

pub type FlowId = u64;

const HISTORY_LIMIT: usize = 16;

/// One backend operation, fully resolved from the selection and form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    InspectContainer { id: String, name: String },
    RemoveContainer { id: String, name: String },
    StartContainer { id: String },
    StopContainer { id: String },
    ExportContainer(ExportFields),
    CommitContainer(CommitFields),
    RenameContainer(RenameFields),
    CreateContainer(CreateContainerFields),
    InspectImage { id: String, reference: String },
    RemoveImage { reference: String },
    RemoveDanglingImages,
    PullImage(PullFields),
    SaveImage(SaveFields),
    ImportImage(ImportFields),
    LoadImage(LoadFields),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    Done,
    Detail { title: String, body: String },
}

impl BackendCall {
    pub fn execute(&self, backend: &dyn ResourceBackend) -> Result<CallOutput, BackendError> {
        match self {
            Self::InspectContainer { id, name } => {
                let body = backend.inspect_container(id)?;
                return Ok(CallOutput::Detail {
                    title: format!("container {name}"),
                    body,
                });
            }
            Self::InspectImage { id, reference } => {
                let body = backend.inspect_image(id)?;
                return Ok(CallOutput::Detail {
                    title: format!("image {reference}"),
                    body,
                });
            }
            Self::RemoveContainer { id, .. } => backend.remove_container(id)?,
            Self::StartContainer { id } => backend.start_container(id)?,
            Self::StopContainer { id } => backend.stop_container(id)?,
            Self::ExportContainer(fields) => {
                backend.export_container(&fields.container, Path::new(&fields.path))?
            }
            Self::CommitContainer(fields) => {
                backend.commit_container(&fields.container, &fields.repository, &fields.tag)?
            }
            Self::RenameContainer(fields) => {
                backend.rename_container(&fields.container, &fields.new_name)?
            }
            Self::CreateContainer(fields) => backend.create_container(fields)?,
            Self::RemoveImage { reference } => backend.remove_image(reference)?,
            Self::RemoveDanglingImages => backend.remove_dangling_images()?,
            Self::PullImage(fields) => backend.pull_image(&fields.repository, &fields.tag)?,
            Self::SaveImage(fields) => backend.save_image(&fields.image, Path::new(&fields.path))?,
            Self::ImportImage(fields) => {
                backend.import_image(Path::new(&fields.path), &fields.repository, &fields.tag)?
            }
            Self::LoadImage(fields) => backend.load_image(Path::new(&fields.path))?,
        }
        Ok(CallOutput::Done)
    }

    /// Destructive calls ask first.
    pub fn confirmation_prompt(&self) -> Option<&'static str> {
        match self {
            Self::RemoveContainer { .. } => {
                Some("Are you sure you want to remove this container? (y/n)")
            }
            Self::RemoveImage { .. } => Some("Are you sure you want to remove this image? (y/n)"),
            Self::RemoveDanglingImages => {
                Some("Are you sure you want to remove dangling images? (y/n)")
            }
            _ => None,
        }
    }

    pub fn progress_label(&self) -> &'static str {
        match self {
            Self::InspectContainer { .. } => "container inspecting...",
            Self::RemoveContainer { .. } => "container removing...",
            Self::StartContainer { .. } => "container starting...",
            Self::StopContainer { .. } => "container stopping...",
            Self::ExportContainer(_) => "container exporting...",
            Self::CommitContainer(_) => "container committing...",
            Self::RenameContainer(_) => "container renaming...",
            Self::CreateContainer(_) => "container creating...",
            Self::InspectImage { .. } => "image inspecting...",
            Self::RemoveImage { .. } => "image removing...",
            Self::RemoveDanglingImages => "dangling images removing...",
            Self::PullImage(_) => "image pulling...",
            Self::SaveImage(_) => "image saving...",
            Self::ImportImage(_) => "image importing...",
            Self::LoadImage(_) => "image loading...",
        }
    }

    /// Lists whose contents change once the call succeeds.
    pub fn refreshes(&self) -> &'static [PanelKind] {
        match self {
            Self::InspectContainer { .. } | Self::InspectImage { .. } | Self::SaveImage(_) => &[],
            Self::RemoveContainer { .. }
            | Self::StartContainer { .. }
            | Self::StopContainer { .. }
            | Self::ExportContainer(_)
            | Self::RenameContainer(_)
            | Self::CreateContainer(_) => &[PanelKind::Containers],
            Self::CommitContainer(_)
            | Self::RemoveImage { .. }
            | Self::RemoveDanglingImages
            | Self::PullImage(_)
            | Self::ImportImage(_)
            | Self::LoadImage(_) => &[PanelKind::Images],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Confirming,
    InProgress,
    Done,
    Cancelled,
    Failed(String),
}

impl FlowState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Confirming => "confirming",
            Self::InProgress => "in progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed(_))
    }
}

/// `Idle -> [Confirming ->] InProgress -> Done | Failed`, with `Confirming -> Cancelled`
/// when the operator declines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFlow {
    pub id: FlowId,
    pub origin: PanelKind,
    pub call: BackendCall,
    state: FlowState,
}

impl ActionFlow {
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn confirm(&mut self) -> Result<(), ConsoleError> {
        self.transition(FlowState::Confirming, |state| matches!(state, FlowState::Idle))
    }

    pub fn start(&mut self) -> Result<(), ConsoleError> {
        self.transition(FlowState::InProgress, |state| {
            matches!(state, FlowState::Idle | FlowState::Confirming)
        })
    }

    pub fn cancel(&mut self) -> Result<(), ConsoleError> {
        self.transition(FlowState::Cancelled, |state| {
            matches!(state, FlowState::Confirming)
        })
    }

    pub fn finish(&mut self, result: &Result<CallOutput, BackendError>) -> Result<(), ConsoleError> {
        let next = match result {
            Ok(_) => FlowState::Done,
            Err(error) => FlowState::Failed(error.to_string()),
        };
        self.transition(next, |state| matches!(state, FlowState::InProgress))
    }

    fn transition(
        &mut self,
        next: FlowState,
        allowed_from: impl Fn(&FlowState) -> bool,
    ) -> Result<(), ConsoleError> {
        if !allowed_from(&self.state) {
            return Err(ConsoleError::InvalidTransition {
                from: self.state.label(),
                to: next.label(),
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Live flows by id plus a short history of finished ones.
#[derive(Debug, Clone, Default)]
pub struct FlowBook {
    next_id: FlowId,
    live: HashMap<FlowId, ActionFlow>,
    history: VecDeque<ActionFlow>,
}

impl FlowBook {
    pub fn open(&mut self, origin: PanelKind, call: BackendCall) -> FlowId {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(
            id,
            ActionFlow {
                id,
                origin,
                call,
                state: FlowState::Idle,
            },
        );
        id
    }

    #[cfg(test)]
    pub fn get(&self, id: FlowId) -> Option<&ActionFlow> {
        self.live.get(&id)
    }

    pub fn get_mut(&mut self, id: FlowId) -> Option<&mut ActionFlow> {
        self.live.get_mut(&id)
    }

    /// Moves a flow that reached a terminal state into history.
    pub fn retire(&mut self, id: FlowId) -> Option<ActionFlow> {
        let flow = self.live.remove(&id)?;
        if !flow.state.is_terminal() {
            warn!(flow = id, state = flow.state.label(), "retiring an unfinished flow");
        }
        self.history.push_back(flow.clone());
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
        Some(flow)
    }

    pub fn in_flight(&self) -> usize {
        self.live
            .values()
            .filter(|flow| flow.state == FlowState::InProgress)
            .count()
    }

    pub fn history(&self) -> impl Iterator<Item = &ActionFlow> {
        self.history.iter()
    }
}
