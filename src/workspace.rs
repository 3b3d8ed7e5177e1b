//! The markdown document and editor settings, persisted through an injected
//! [`Storage`].
//!
//! Settings are plain values: every change produces a new `Settings` that the
//! shell passes into its render calls.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub const MIN_FONT_SIZE: u8 = 12;
pub const MAX_FONT_SIZE: u8 = 24;
pub const DEFAULT_FONT_SIZE: u8 = 16;

/// A preview font: display name and CSS font-family value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontChoice {
    pub name: &'static str,
    pub css: &'static str,
}

pub const FONTS: [FontChoice; 5] = [
    FontChoice { name: "Merriweather", css: "'Merriweather', serif" },
    FontChoice { name: "Inter", css: "'Inter', sans-serif" },
    FontChoice { name: "Lora", css: "'Lora', serif" },
    FontChoice { name: "Roboto", css: "'Roboto', sans-serif" },
    FontChoice { name: "Open Sans", css: "'Open Sans', sans-serif" },
];

pub const DEFAULT_MARKDOWN: &str = r#"# Welcome to Your Beautiful Editor

This is a simple, elegant Markdown editor.

## Features
- **Live Preview**: See your changes instantly.
- **Print Friendly**: Just click the print button to get a clean PDF.
- **Lovely Design**: Crafted for focus and readability.

> "Simplicity is the ultimate sophistication." - Leonardo da Vinci

Try writing some code:

```javascript
console.log('Hello, World!');
```

Or a list:
1. Write
2. Print
3. Enjoy
"#;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored state: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of one of [`FONTS`].
    pub font_family: String,
    pub font_size: u8,
    pub dark_mode: bool,
    pub eco_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size: DEFAULT_FONT_SIZE,
            dark_mode: false,
            eco_mode: false,
        }
    }
}

impl Settings {
    /// The selected font, falling back to Inter for unknown names.
    pub fn font(&self) -> FontChoice {
        FONTS
            .iter()
            .copied()
            .find(|font| font.name == self.font_family)
            .unwrap_or(FONTS[1])
    }

    /// Unknown font names are ignored.
    pub fn with_font_family(&self, name: &str) -> Self {
        if !FONTS.iter().any(|font| font.name == name) {
            log::warn!("Ignoring unknown font {:?}", name);
            return self.clone();
        }
        Self {
            font_family: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_font_size(&self, size: u8) -> Self {
        Self {
            font_size: size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
            ..self.clone()
        }
    }

    pub fn scaled_up(&self) -> Self {
        self.with_font_size(self.font_size.saturating_add(1))
    }

    pub fn scaled_down(&self) -> Self {
        self.with_font_size(self.font_size.saturating_sub(1))
    }

    pub fn toggled_dark_mode(&self) -> Self {
        Self {
            dark_mode: !self.dark_mode,
            ..self.clone()
        }
    }

    pub fn with_eco_mode(&self, eco_mode: bool) -> Self {
        Self {
            eco_mode,
            ..self.clone()
        }
    }

    /// Clamp values that may have been edited by hand in storage.
    fn normalized(self) -> Self {
        let font_family = self.font().name.to_string();
        Self {
            font_family,
            ..self.with_font_size(self.font_size)
        }
    }
}

/// The markdown buffer being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            text: DEFAULT_MARKDOWN.to_string(),
        }
    }
}

/// Everything the shell persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub document: Option<Document>,
    pub settings: Settings,
}

pub trait Storage {
    fn load(&self) -> Result<Option<PersistedState>, StorageError>;
    fn save(&mut self, state: &PersistedState) -> Result<(), StorageError>;
}

/// Keeps state in memory; for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Option<PersistedState>,
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedState>, StorageError> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        self.state = Some(state.clone());
        Ok(())
    }
}

/// Stores state as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Option<PersistedState>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// The document and settings, written through to storage on every change.
pub struct Workspace<S: Storage> {
    document: Document,
    settings: Settings,
    storage: S,
}

impl<S: Storage> Workspace<S> {
    /// Restore from `storage`, or start from the welcome document.
    ///
    /// Unreadable state is logged and replaced with defaults rather than
    /// blocking the editor from starting.
    pub fn load(storage: S) -> Self {
        let persisted = match storage.load() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                log::warn!("Discarding stored workspace: {}", e);
                PersistedState::default()
            }
        };

        Self {
            document: persisted.document.unwrap_or_default(),
            settings: persisted.settings.normalized(),
            storage,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Replace the markdown text.
    pub fn edit(&mut self, text: impl Into<String>) -> Result<(), StorageError> {
        self.document.text = text.into();
        self.persist()
    }

    /// Apply a settings change, e.g. `workspace.update_settings(Settings::scaled_up)`.
    pub fn update_settings(
        &mut self,
        change: impl FnOnce(&Settings) -> Settings,
    ) -> Result<&Settings, StorageError> {
        self.settings = change(&self.settings);
        self.persist()?;
        Ok(&self.settings)
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let state = PersistedState {
            document: Some(self.document.clone()),
            settings: self.settings.clone(),
        };
        self.storage.save(&state)
    }
}
