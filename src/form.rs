use crate::error::ConsoleError;
use crate::input::EditKey;
use crate::model::PanelKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    /// Caret position in characters.
    pub caret: usize,
}

/// Ordered fields; the order drives both layout and the submitted values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputForm {
    fields: Vec<FormField>,
    active: usize,
}

impl InputForm {
    pub fn new(labels: &[&'static str]) -> Self {
        Self {
            fields: labels
                .iter()
                .copied()
                .map(|label| FormField {
                    label,
                    value: String::new(),
                    caret: 0,
                })
                .collect(),
            active: 0,
        }
    }

    pub fn with_value(mut self, label: &str, value: impl Into<String>) -> Self {
        if let Some(field) = self.fields.iter_mut().find(|field| field.label == label) {
            field.value = value.into();
            field.caret = field.value.chars().count();
        }
        self
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn active_value(&self) -> &str {
        self.fields
            .get(self.active)
            .map(|field| field.value.as_str())
            .unwrap_or_default()
    }

    pub fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + 1) % self.fields.len();
        }
    }

    pub fn prev_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn edit(&mut self, key: EditKey) {
        let Some(field) = self.fields.get_mut(self.active) else {
            return;
        };
        let len = field.value.chars().count();
        match key {
            EditKey::Insert(c) => {
                let at = byte_offset(&field.value, field.caret);
                field.value.insert(at, c);
                field.caret += 1;
            }
            EditKey::Backspace if field.caret > 0 => {
                let at = byte_offset(&field.value, field.caret - 1);
                field.value.remove(at);
                field.caret -= 1;
            }
            EditKey::Delete if field.caret < len => {
                let at = byte_offset(&field.value, field.caret);
                field.value.remove(at);
            }
            EditKey::Left => field.caret = field.caret.saturating_sub(1),
            EditKey::Right => field.caret = (field.caret + 1).min(len),
            EditKey::Home => field.caret = 0,
            EditKey::End => field.caret = len,
            EditKey::Backspace | EditKey::Delete => {}
        }
    }

    pub fn values(&self) -> FormValues {
        FormValues {
            entries: self
                .fields
                .iter()
                .map(|field| (field.label, field.value.clone()))
                .collect(),
        }
    }
}

fn byte_offset(value: &str, chars: usize) -> usize {
    value
        .char_indices()
        .nth(chars)
        .map(|(offset, _)| offset)
        .unwrap_or(value.len())
}

/// Field name to text. Unknown or unset names read as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    entries: Vec<(&'static str, String)>,
}

impl FormValues {
    pub fn get(&self, label: &str) -> &str {
        self.entries
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    }

    fn required(&self, label: &'static str) -> Result<String, ConsoleError> {
        let value = self.get(label).trim();
        if value.is_empty() {
            return Err(ConsoleError::invalid_field(label, "required"));
        }
        Ok(value.to_string())
    }

    fn optional(&self, label: &str) -> Option<String> {
        let value = self.get(label).trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPurpose {
    Filter(PanelKind),
    CreateContainer,
    Pull,
    Save,
    Import,
    Load,
    Export,
    Commit,
    Rename,
}

impl FormPurpose {
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Self::Filter(_) => &["Filter"],
            Self::CreateContainer => &[
                "Name",
                "HostPort",
                "Port",
                "HostVolume",
                "Volume",
                "Image",
                "Attach",
                "Env",
                "Cmd",
            ],
            Self::Pull => &["Name"],
            Self::Save => &["Path", "Image"],
            Self::Import => &["Repository", "Path", "Tag"],
            Self::Load => &["Path"],
            Self::Export => &["Path", "Container"],
            Self::Commit => &["Repository", "Tag", "Container"],
            Self::Rename => &["NewName", "Container"],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Filter(_) => "filter",
            Self::CreateContainer => "create container",
            Self::Pull => "pull image",
            Self::Save => "save image",
            Self::Import => "import image",
            Self::Load => "load image",
            Self::Export => "export container",
            Self::Commit => "commit container",
            Self::Rename => "rename container",
        }
    }

    pub fn form(&self) -> InputForm {
        InputForm::new(self.labels())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainerFields {
    pub name: Option<String>,
    /// `(host, container)`; the host side may be left to the engine.
    pub port: Option<(Option<u16>, u16)>,
    pub volume: Option<(String, String)>,
    pub image: String,
    pub attach: bool,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
}

impl TryFrom<&FormValues> for CreateContainerFields {
    type Error = ConsoleError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        let host_port = values
            .optional("HostPort")
            .map(|port| parse_port("HostPort", &port))
            .transpose()?;
        let port = match values.optional("Port") {
            Some(port) => Some((host_port, parse_port("Port", &port)?)),
            None if host_port.is_some() => {
                return Err(ConsoleError::invalid_field(
                    "Port",
                    "required when HostPort is set",
                ));
            }
            None => None,
        };

        let volume = match (values.optional("HostVolume"), values.optional("Volume")) {
            (Some(host), Some(target)) => Some((host, target)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConsoleError::invalid_field(
                    "Volume",
                    "required when HostVolume is set",
                ));
            }
            (None, Some(_)) => {
                return Err(ConsoleError::invalid_field(
                    "HostVolume",
                    "required when Volume is set",
                ));
            }
        };

        let attach = match values.get("Attach").trim().to_ascii_lowercase().as_str() {
            "" | "false" | "no" | "n" => false,
            "true" | "yes" | "y" => true,
            other => {
                return Err(ConsoleError::invalid_field(
                    "Attach",
                    format!("expected true or false, got '{other}'"),
                ));
            }
        };

        let env = values
            .get("Env")
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                if pair.contains('=') {
                    Ok(pair.to_string())
                } else {
                    Err(ConsoleError::invalid_field(
                        "Env",
                        format!("'{pair}' is not KEY=VALUE"),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: values.optional("Name"),
            port,
            volume,
            image: values.required("Image")?,
            attach,
            env,
            cmd: values
                .get("Cmd")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        })
    }
}

fn parse_port(field: &'static str, raw: &str) -> Result<u16, ConsoleError> {
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConsoleError::invalid_field(
            field,
            format!("'{raw}' is not a port number"),
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullFields {
    pub repository: String,
    pub tag: String,
}

impl TryFrom<&FormValues> for PullFields {
    type Error = ConsoleError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        let name = values.required("Name")?;
        let (repository, tag) = match name.split_once(':') {
            Some((repository, tag)) if !tag.is_empty() => (repository, tag),
            Some((repository, _)) => (repository, "latest"),
            None => (name.as_str(), "latest"),
        };
        if repository.is_empty() {
            return Err(ConsoleError::invalid_field("Name", "missing repository"));
        }
        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFields {
    pub path: String,
    pub image: String,
}

impl TryFrom<&FormValues> for SaveFields {
    type Error = ConsoleError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        Ok(Self {
            path: values.required("Path")?,
            image: values.required("Image")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFields {
    pub repository: String,
    pub path: String,
    pub tag: String,
}

impl TryFrom<&FormValues> for ImportFields {
    type Error = ConsoleError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        Ok(Self {
            repository: values.required("Repository")?,
            path: values.required("Path")?,
            tag: values
                .optional("Tag")
                .unwrap_or_else(|| "latest".to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFields {
    pub path: String,
}

impl TryFrom<&FormValues> for LoadFields {
    type Error = ConsoleError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        Ok(Self {
            path: values.required("Path")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFields {
    pub path: String,
    pub container: String,
}

impl TryFrom<&FormValues> for ExportFields {
    type Error = ConsoleError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        Ok(Self {
            path: values.required("Path")?,
            container: values.required("Container")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFields {
    pub repository: String,
    pub tag: String,
    pub container: String,
}

impl TryFrom<&FormValues> for CommitFields {
    type Error = ConsoleError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        Ok(Self {
            repository: values.required("Repository")?,
            tag: values
                .optional("Tag")
                .unwrap_or_else(|| "latest".to_string()),
            container: values.required("Container")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameFields {
    pub new_name: String,
    pub container: String,
}

impl TryFrom<&FormValues> for RenameFields {
    type Error = ConsoleError;

    fn try_from(values: &FormValues) -> Result<Self, Self::Error> {
        Ok(Self {
            new_name: values.required("NewName")?,
            container: values.required("Container")?,
        })
    }
}
