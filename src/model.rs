use crate::input::{Action, KeySpec, Keymap};
use crate::list::{Column, ResourceRow};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fmt::{Display, Formatter};

pub const NONE_TAG: &str = "<none>";
const SHORT_ID_LEN: usize = 12;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PanelKind {
    Images,
    Containers,
}

impl PanelKind {
    /// Registration order, which is also the focus ring order.
    pub const ALL: [Self; 2] = [Self::Images, Self::Containers];

    pub fn name(self) -> &'static str {
        match self {
            Self::Images => "image list",
            Self::Containers => "container list",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "image list" | "images" | "image" => Some(Self::Images),
            "container list" | "containers" | "container" => Some(Self::Containers),
            _ => None,
        }
    }
}

impl Display for PanelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub name: String,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "CreatedAt", default)]
    pub created_at: String,
    #[serde(rename = "Ports", default)]
    pub ports: String,
}

/// One line of `docker images --format '{{json .}}'`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageSummary {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Repository", default)]
    pub repository: String,
    #[serde(rename = "Tag", default)]
    pub tag: String,
    #[serde(rename = "CreatedAt", default)]
    pub created_at: String,
    #[serde(rename = "Size", default)]
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Images(Vec<ImageSummary>),
    Containers(Vec<ContainerSummary>),
}

impl Listing {
    pub fn kind(&self) -> PanelKind {
        match self {
            Self::Images(_) => PanelKind::Images,
            Self::Containers(_) => PanelKind::Containers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRow {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub created: String,
    pub ports: String,
}

impl ResourceRow for ContainerRow {
    type Source = ContainerSummary;

    const PANEL: PanelKind = PanelKind::Containers;
    const NOUN: &'static str = "container";
    const COLUMNS: &'static [Column] = &[
        Column::new("ID", 0.1, 0.2),
        Column::new("NAME", 0.1, 0.2),
        Column::new("IMAGE", 0.1, 0.2),
        Column::new("STATUS", 0.1, 0.1),
        Column::new("CREATED", 0.1, 0.1),
        Column::new("PORT", 0.1, 0.2),
    ];

    fn from_source(source: &ContainerSummary) -> Self {
        Self {
            id: source.id.clone(),
            name: source.name.clone(),
            image: source.image.clone(),
            status: source.status.clone(),
            created: format_created(&source.created_at),
            ports: source.ports.clone(),
        }
    }

    fn display_name(source: &ContainerSummary) -> String {
        source.name.clone()
    }

    fn cells(&self) -> Vec<String> {
        vec![
            short_id(&self.id).to_string(),
            self.name.clone(),
            self.image.clone(),
            self.status.clone(),
            self.created.clone(),
            self.ports.clone(),
        ]
    }

    fn bindings(keymap: Keymap) -> Keymap {
        keymap
            .with(&[KeySpec::char('d')], Action::Remove)
            .with(&[KeySpec::char('u')], Action::Start)
            .with(&[KeySpec::char('s')], Action::Stop)
            .with(&[KeySpec::char('e')], Action::Export)
            .with(&[KeySpec::char('c')], Action::Commit)
            .with(&[KeySpec::char('r')], Action::Rename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub created: String,
    pub size: String,
}

impl ImageRow {
    /// Name used when acting on the image; untagged images are addressed by id.
    pub fn reference(&self) -> String {
        if self.repository == NONE_TAG || self.tag == NONE_TAG {
            self.id.clone()
        } else {
            format!("{}:{}", self.repository, self.tag)
        }
    }
}

impl ResourceRow for ImageRow {
    type Source = ImageSummary;

    const PANEL: PanelKind = PanelKind::Images;
    const NOUN: &'static str = "image";
    const COLUMNS: &'static [Column] = &[
        Column::new("ID", 0.1, 0.2),
        Column::new("REPOSITORY", 0.1, 0.3),
        Column::new("TAG", 0.1, 0.1),
        Column::new("CREATED", 0.1, 0.2),
        Column::new("SIZE", 0.1, 0.2),
    ];

    fn from_source(source: &ImageSummary) -> Self {
        Self {
            id: source.id.clone(),
            repository: source.repository.clone(),
            tag: source.tag.clone(),
            created: format_created(&source.created_at),
            size: source.size.clone(),
        }
    }

    fn display_name(source: &ImageSummary) -> String {
        format!("{}:{}", source.repository, source.tag)
    }

    fn cells(&self) -> Vec<String> {
        vec![
            short_id(&self.id).to_string(),
            self.repository.clone(),
            self.tag.clone(),
            self.created.clone(),
            self.size.clone(),
        ]
    }

    fn bindings(keymap: Keymap) -> Keymap {
        keymap
            .with(&[KeySpec::char('c')], Action::CreateContainer)
            .with(&[KeySpec::char('p')], Action::Pull)
            .with(&[KeySpec::char('d')], Action::Remove)
            .with(&[KeySpec::ctrl('d')], Action::RemoveDangling)
            .with(&[KeySpec::char('s')], Action::Save)
            .with(&[KeySpec::char('i')], Action::Import)
            .with(&[KeySpec::ctrl('l')], Action::Load)
    }
}

pub fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((cut, _)) => &id[..cut],
        None => id,
    }
}

/// Docker prints `2024-01-05 10:11:12 +0000 UTC`; show it in local time.
pub fn format_created(raw: &str) -> String {
    let head = raw.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
    match DateTime::parse_from_str(&head, "%Y-%m-%d %H:%M:%S %z") {
        Ok(parsed) => parsed
            .with_timezone(&Local)
            .format("%Y/%m/%d %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}
